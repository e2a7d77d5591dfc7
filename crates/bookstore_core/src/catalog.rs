//! crates/bookstore_core/src/catalog.rs
//!
//! Author and book services. Plain CRUD with field validation; the only
//! cross-entity rule is that a book must reference an existing author.
//! Deleting an author does not check for books that still reference it.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::domain::{Author, AuthorUpdate, Book, BookUpdate, NewAuthor, NewBook};
use crate::error::{ServiceError, ValidationError};
use crate::ports::{AuthorRepository, BookRepository};
use crate::validation::{
    ensure_unique_name, require_non_negative, require_positive_id, require_text,
};

//=========================================================================================
// Authors
//=========================================================================================

const DUPLICATE_AUTHOR: &str = "author with the same name already exists";

pub struct AuthorService {
    repo: Arc<dyn AuthorRepository>,
}

impl AuthorService {
    pub fn new(repo: Arc<dyn AuthorRepository>) -> Self {
        Self { repo }
    }

    /// Creates an author whose name is unique, ignoring case.
    pub async fn create(&self, author: NewAuthor) -> Result<Author, ServiceError> {
        require_text(&author.name, "author name cannot be empty")?;
        let existing = self
            .repo
            .get_all_authors()
            .await
            .map_err(|e| ServiceError::from_port("list authors", e))?;
        ensure_unique_name(
            &author.name,
            existing.iter().map(|a| a.name.as_str()),
            DUPLICATE_AUTHOR,
        )?;

        let created = self
            .repo
            .create_author(&author, Utc::now())
            .await
            .map_err(|e| ServiceError::from_port("failed to create author", e))?;
        info!(author_id = created.id, "author created");
        Ok(created)
    }

    pub async fn get_all(&self) -> Result<Vec<Author>, ServiceError> {
        let authors = self
            .repo
            .get_all_authors()
            .await
            .map_err(|e| ServiceError::from_port("list authors", e))?;
        if authors.is_empty() {
            return Err(ServiceError::NotFound("no authors found".to_string()));
        }
        Ok(authors)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Author, ServiceError> {
        require_positive_id(id, "invalid author ID")?;
        self.repo
            .get_author_by_id(id)
            .await
            .map_err(|e| ServiceError::from_port(format!("get author {}", id), e))
    }

    /// Renames are held to the same case-insensitive uniqueness as `create`.
    pub async fn update_by_id(&self, update: AuthorUpdate) -> Result<Author, ServiceError> {
        require_positive_id(update.id, "invalid author ID")?;
        require_text(&update.name, "author name cannot be empty")?;
        let existing = self
            .repo
            .get_all_authors()
            .await
            .map_err(|e| ServiceError::from_port("list authors", e))?;
        ensure_unique_name(
            &update.name,
            existing
                .iter()
                .filter(|a| a.id != update.id)
                .map(|a| a.name.as_str()),
            DUPLICATE_AUTHOR,
        )?;

        self.repo
            .update_author(&update, Utc::now())
            .await
            .map_err(|e| ServiceError::from_port(format!("update author {}", update.id), e))?
            .ok_or_else(|| ServiceError::NotFound(format!("author_id {} does not exist", update.id)))
    }

    pub async fn delete_by_id(&self, id: i64) -> Result<Author, ServiceError> {
        require_positive_id(id, "invalid author ID")?;
        let deleted = self
            .repo
            .delete_author(id)
            .await
            .map_err(|e| ServiceError::from_port(format!("delete author {}", id), e))?;
        info!(author_id = deleted.id, "author deleted");
        Ok(deleted)
    }
}

//=========================================================================================
// Books
//=========================================================================================

pub struct BookService {
    repo: Arc<dyn BookRepository>,
}

impl BookService {
    pub fn new(repo: Arc<dyn BookRepository>) -> Self {
        Self { repo }
    }

    async fn ensure_author(&self, author_id: i64) -> Result<(), ServiceError> {
        let exists = self
            .repo
            .author_exists(author_id)
            .await
            .map_err(|e| ServiceError::from_port(format!("check author {}", author_id), e))?;
        if !exists {
            return Err(ServiceError::NotFound("author not found".to_string()));
        }
        Ok(())
    }

    pub async fn create(&self, book: NewBook) -> Result<Book, ServiceError> {
        if book.title.trim().is_empty() || book.author_id <= 0 {
            return Err(
                ValidationError::new("invalid book data: title and author_id required").into(),
            );
        }
        require_non_negative(book.stock, "book quantity cannot be negative")?;
        self.ensure_author(book.author_id).await?;

        let created = self
            .repo
            .create_book(&book, Utc::now())
            .await
            .map_err(|e| ServiceError::from_port("failed to create book", e))?;
        info!(book_id = created.id, stock = created.stock, "book created");
        Ok(created)
    }

    pub async fn get_all(&self) -> Result<Vec<Book>, ServiceError> {
        let books = self
            .repo
            .get_all_books()
            .await
            .map_err(|e| ServiceError::from_port("list books", e))?;
        if books.is_empty() {
            return Err(ServiceError::NotFound("no books found".to_string()));
        }
        Ok(books)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Book, ServiceError> {
        require_positive_id(id, "invalid book ID")?;
        self.repo
            .get_book_by_id(id)
            .await
            .map_err(|e| ServiceError::from_port(format!("get book {}", id), e))
    }

    /// Replaces title, stock and author. Takes the book's row lock, so it
    /// serialises with in-flight order placements.
    pub async fn update_by_id(&self, update: BookUpdate) -> Result<Book, ServiceError> {
        require_positive_id(update.id, "invalid book ID")?;
        require_text(&update.title, "book title is required")?;
        require_positive_id(update.author_id, "book author ID is required")?;
        require_non_negative(update.stock, "book quantity cannot be negative")?;
        self.ensure_author(update.author_id).await?;

        let updated = self
            .repo
            .update_book(&update, Utc::now())
            .await
            .map_err(|e| ServiceError::from_port(format!("update book {}", update.id), e))?
            .ok_or_else(|| ServiceError::NotFound("no book updated".to_string()))?;
        info!(book_id = updated.id, stock = updated.stock, "book updated");
        Ok(updated)
    }

    pub async fn delete_by_id(&self, id: i64) -> Result<Book, ServiceError> {
        require_positive_id(id, "invalid book ID")?;
        let deleted = self
            .repo
            .delete_book(id)
            .await
            .map_err(|e| ServiceError::from_port(format!("delete book {}", id), e))?;
        info!(book_id = deleted.id, "book deleted");
        Ok(deleted)
    }
}
