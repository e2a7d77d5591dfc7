//! crates/bookstore_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};

/// An author in the catalogue. Books reference authors by id only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub id: i64,
    pub name: String,
    pub nationality: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAuthor {
    pub name: String,
    pub nationality: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorUpdate {
    pub id: i64,
    pub name: String,
    pub nationality: String,
}

/// A book and its available inventory.
///
/// `stock` is never negative. It changes through the order workflow or an
/// explicit update, and both paths take the book's row lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub stock: i32,
    pub author_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBook {
    pub title: String,
    pub stock: i32,
    pub author_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookUpdate {
    pub id: i64,
    pub title: String,
    pub stock: i32,
    pub author_id: i64,
}

/// A placed order. `ordered_at` is set once, when the order is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub id: i64,
    pub book_id: i64,
    pub user_id: i64,
    pub quantity: i32,
    pub status: String,
    pub ordered_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An order request as submitted by a client, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub book_id: i64,
    pub user_id: i64,
    pub quantity: i32,
    pub status: String,
}

/// A full-row replacement of an existing order's mutable fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderUpdate {
    pub id: i64,
    pub book_id: i64,
    pub user_id: i64,
    pub quantity: i32,
    pub status: String,
}

// Represents a user - used throughout app
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Only used internally for login - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub id: i64,
    pub username: String,
    pub role: String,
    pub hashed_password: String,
}

/// The verified claims of a session token. Lives for a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: i64,
    pub username: String,
    pub role: String,
}
