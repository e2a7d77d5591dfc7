//! crates/bookstore_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or token formats.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    Author, AuthorUpdate, Book, BookUpdate, Identity, NewAuthor, NewBook, NewOrder, Order,
    OrderUpdate, User, UserCredentials,
};
use crate::error::AuthError;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all storage port operations.
/// This abstracts away the specific errors from external services (e.g., the database driver).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// A row lock could not be acquired within the storage layer's timeout.
    #[error("Timed out waiting for a row lock: {0}")]
    LockTimeout(String),
    #[error("Duplicate entry: {0}")]
    Duplicate(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Storage Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait AuthorRepository: Send + Sync {
    async fn get_all_authors(&self) -> PortResult<Vec<Author>>;

    /// Fails with `PortError::NotFound` when no author has this id.
    async fn get_author_by_id(&self, id: i64) -> PortResult<Author>;

    async fn create_author(&self, author: &NewAuthor, now: DateTime<Utc>) -> PortResult<Author>;

    /// Returns `None` when no row was updated.
    async fn update_author(
        &self,
        update: &AuthorUpdate,
        now: DateTime<Utc>,
    ) -> PortResult<Option<Author>>;

    /// Fetches then deletes. Books referencing the author are left untouched.
    async fn delete_author(&self, id: i64) -> PortResult<Author>;
}

#[async_trait]
pub trait BookRepository: Send + Sync {
    async fn get_all_books(&self) -> PortResult<Vec<Book>>;

    async fn get_book_by_id(&self, id: i64) -> PortResult<Book>;

    async fn author_exists(&self, author_id: i64) -> PortResult<bool>;

    async fn create_book(&self, book: &NewBook, now: DateTime<Utc>) -> PortResult<Book>;

    /// Returns `None` when no row was updated. Serialises with order placement
    /// on the same book row.
    async fn update_book(&self, update: &BookUpdate, now: DateTime<Utc>)
        -> PortResult<Option<Book>>;

    async fn delete_book(&self, id: i64) -> PortResult<Book>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn get_all_orders(&self) -> PortResult<Vec<Order>>;

    async fn get_order_by_id(&self, id: i64) -> PortResult<Order>;

    /// Full-row update. Returns `None` when the id did not exist.
    async fn update_order(
        &self,
        update: &OrderUpdate,
        now: DateTime<Utc>,
    ) -> PortResult<Option<Order>>;

    /// Fetches then deletes. Book stock is not restored.
    async fn delete_order(&self, id: i64) -> PortResult<Order>;

    /// Opens an atomic unit of work for placing an order.
    async fn begin(&self) -> PortResult<Box<dyn OrderUnitOfWork>>;
}

/// One storage transaction spanning the stock check, the order insert and
/// the stock decrement.
///
/// Dropping a unit of work without calling `commit` discards every staged
/// change and releases its row locks.
#[async_trait]
pub trait OrderUnitOfWork: Send {
    /// Reads the book while holding an exclusive lock on its row until the
    /// unit of work ends. Fails with `PortError::LockTimeout` when the lock
    /// cannot be acquired in time.
    async fn lock_book_for_update(&mut self, book_id: i64) -> PortResult<Option<Book>>;

    async fn insert_order(&mut self, order: &NewOrder, now: DateTime<Utc>) -> PortResult<Order>;

    async fn update_book_stock(&mut self, book_id: i64, new_stock: i32) -> PortResult<()>;

    async fn commit(self: Box<Self>) -> PortResult<()>;

    async fn rollback(self: Box<Self>) -> PortResult<()>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get_user_by_username(&self, username: &str) -> PortResult<User>;

    async fn get_credentials(&self, username: &str) -> PortResult<UserCredentials>;

    /// Fails with `PortError::Duplicate` when the username is taken.
    async fn create_user(
        &self,
        username: &str,
        hashed_password: &str,
        role: &str,
        now: DateTime<Utc>,
    ) -> PortResult<User>;
}

/// The persisted user -> role -> permission mapping.
#[async_trait]
pub trait PermissionRepository: Send + Sync {
    async fn has_access(&self, user_id: i64, permission: &str) -> PortResult<bool>;
}

//=========================================================================================
// Token Port
//=========================================================================================

/// Issues and verifies signed session tokens.
pub trait TokenService: Send + Sync {
    fn issue(&self, user_id: i64, username: &str, role: &str) -> Result<String, AuthError>;

    /// Every rejection collapses into `AuthError::InvalidToken`.
    fn validate(&self, token: &str) -> Result<Identity, AuthError>;
}
