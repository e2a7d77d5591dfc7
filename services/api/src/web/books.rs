//! services/api/src/web/books.rs
//!
//! Handlers for `/books`. Reads are public; writes sit behind auth, the
//! `admin` role and the matching `book/*` permission (wired in `router`).

use axum::{
    extract::{rejection::JsonRejection, rejection::PathRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use bookstore_core::domain::{Book, BookUpdate, NewBook};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::web::state::AppState;
use crate::web::{json_body, path_id};

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct BookRequest {
    pub title: String,
    #[serde(default)]
    pub stock: i32,
    pub author_id: i64,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct BookResponse {
    pub id: i64,
    pub title: String,
    pub stock: i32,
    pub author_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Book> for BookResponse {
    fn from(book: Book) -> Self {
        Self {
            id: book.id,
            title: book.title,
            stock: book.stock,
            author_id: book.author_id,
            created_at: book.created_at,
            updated_at: book.updated_at,
        }
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// List every book.
#[utoipa::path(
    get,
    path = "/books",
    responses(
        (status = 200, description = "All books", body = [BookResponse]),
        (status = 404, description = "No books exist")
    )
)]
pub async fn list_books_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<BookResponse>>, ApiError> {
    let books = state.books.get_all().await?;
    Ok(Json(books.into_iter().map(BookResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/books/{id}",
    params(("id" = i64, Path, description = "Book id")),
    responses(
        (status = 200, description = "The book", body = BookResponse),
        (status = 400, description = "Invalid id"),
        (status = 404, description = "Book not found")
    )
)]
pub async fn get_book_handler(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<BookResponse>, ApiError> {
    let book = state.books.get_by_id(path_id(id)?).await?;
    Ok(Json(book.into()))
}

#[utoipa::path(
    post,
    path = "/books/add",
    request_body = BookRequest,
    responses(
        (status = 201, description = "Book created", body = BookResponse),
        (status = 400, description = "Invalid book data"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Not allowed"),
        (status = 404, description = "Author not found")
    ),
    security(("auth" = []))
)]
pub async fn create_book_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<BookRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let req = json_body(body)?;
    let book = state
        .books
        .create(NewBook {
            title: req.title,
            stock: req.stock,
            author_id: req.author_id,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(BookResponse::from(book))))
}

/// Replace a book's title, stock and author.
#[utoipa::path(
    put,
    path = "/books/{id}",
    params(("id" = i64, Path, description = "Book id")),
    request_body = BookRequest,
    responses(
        (status = 200, description = "Book updated", body = BookResponse),
        (status = 400, description = "Invalid book data"),
        (status = 404, description = "Book or author not found")
    ),
    security(("auth" = []))
)]
pub async fn update_book_handler(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
    body: Result<Json<BookRequest>, JsonRejection>,
) -> Result<Json<BookResponse>, ApiError> {
    let id = path_id(id)?;
    let req = json_body(body)?;
    let book = state
        .books
        .update_by_id(BookUpdate {
            id,
            title: req.title,
            stock: req.stock,
            author_id: req.author_id,
        })
        .await?;
    Ok(Json(book.into()))
}

#[utoipa::path(
    delete,
    path = "/books/{id}",
    params(("id" = i64, Path, description = "Book id")),
    responses(
        (status = 200, description = "The deleted book", body = BookResponse),
        (status = 404, description = "Book not found")
    ),
    security(("auth" = []))
)]
pub async fn delete_book_handler(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<BookResponse>, ApiError> {
    let book = state.books.delete_by_id(path_id(id)?).await?;
    Ok(Json(book.into()))
}
