//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, the concrete implementation of
//! the storage ports from the `core` crate. It handles all interactions with
//! the PostgreSQL database using `sqlx`.
//!
//! Stock changes go through a transaction that holds the book's row lock
//! (`SELECT ... FOR UPDATE`). Every such transaction sets a local
//! `lock_timeout`, so a waiter gives up with SQLSTATE 55P03 instead of
//! blocking forever.

use std::time::Duration;

use async_trait::async_trait;
use bookstore_core::domain::{
    Author, AuthorUpdate, Book, BookUpdate, NewAuthor, NewBook, NewOrder, Order, OrderUpdate,
    User, UserCredentials,
};
use bookstore_core::ports::{
    AuthorRepository, BookRepository, OrderRepository, OrderUnitOfWork, PermissionRepository,
    PortError, PortResult, UserRepository,
};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, PgPool, Postgres, Transaction};

const LOCK_NOT_AVAILABLE: &str = "55P03";
const UNIQUE_VIOLATION: &str = "23505";

const BOOK_COLUMNS: &str = "id, title, stock, author_id, created_at, updated_at";
const AUTHOR_COLUMNS: &str = "id, name, nationality, created_at, updated_at";
const ORDER_COLUMNS: &str = "id, book_id, user_id, quantity, status, ordered_at, updated_at";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements every storage port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
    lock_timeout: Duration,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`. `lock_timeout` bounds every row-lock wait.
    pub fn new(pool: PgPool, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    /// Opens a transaction whose lock waits are bounded by `lock_timeout`.
    async fn begin_locking(&self) -> PortResult<Transaction<'static, Postgres>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        sqlx::query(&lock_timeout_statement(self.lock_timeout))
            .execute(&mut *tx)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(tx)
    }
}

/// `SET LOCAL` does not accept bind parameters, so the value is inlined.
fn lock_timeout_statement(timeout: Duration) -> String {
    format!("SET LOCAL lock_timeout = '{}ms'", timeout.as_millis().max(1))
}

/// Maps a driver error onto the port taxonomy. `resource` names the row
/// being touched and is the only text carried into lock-timeout and
/// duplicate messages; driver messages stay in `Unexpected`, which is
/// never shown to clients.
fn db_error(resource: &str, err: sqlx::Error) -> PortError {
    if let sqlx::Error::Database(db) = &err {
        match db.code().as_deref() {
            Some(LOCK_NOT_AVAILABLE) => return PortError::LockTimeout(resource.to_string()),
            Some(UNIQUE_VIOLATION) => {
                return PortError::Duplicate(format!("{} already exists", resource))
            }
            _ => {}
        }
    }
    PortError::Unexpected(err.to_string())
}

/// Name collisions on `authors_name_lower_idx` read like the service's own check.
fn author_write_error(err: sqlx::Error) -> PortError {
    match db_error("author", err) {
        PortError::Duplicate(_) => {
            PortError::Duplicate("author with the same name already exists".to_string())
        }
        other => other,
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct AuthorRecord {
    id: i64,
    name: String,
    nationality: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl AuthorRecord {
    fn to_domain(self) -> Author {
        Author {
            id: self.id,
            name: self.name,
            nationality: self.nationality,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct BookRecord {
    id: i64,
    title: String,
    stock: i32,
    author_id: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl BookRecord {
    fn to_domain(self) -> Book {
        Book {
            id: self.id,
            title: self.title,
            stock: self.stock,
            author_id: self.author_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct OrderRecord {
    id: i64,
    book_id: i64,
    user_id: i64,
    quantity: i32,
    status: String,
    ordered_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl OrderRecord {
    fn to_domain(self) -> Order {
        Order {
            id: self.id,
            book_id: self.book_id,
            user_id: self.user_id,
            quantity: self.quantity,
            status: self.status,
            ordered_at: self.ordered_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct UserRecord {
    id: i64,
    username: String,
    role: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            id: self.id,
            username: self.username,
            role: self.role,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    id: i64,
    username: String,
    role: String,
    hashed_password: String,
}
impl CredentialsRecord {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            id: self.id,
            username: self.username,
            role: self.role,
            hashed_password: self.hashed_password,
        }
    }
}

//=========================================================================================
// `AuthorRepository` Implementation
//=========================================================================================

#[async_trait]
impl AuthorRepository for DbAdapter {
    async fn get_all_authors(&self) -> PortResult<Vec<Author>> {
        let sql = format!("SELECT {} FROM authors ORDER BY id", AUTHOR_COLUMNS);
        let records = sqlx::query_as::<_, AuthorRecord>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("authors", e))?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_author_by_id(&self, id: i64) -> PortResult<Author> {
        let sql = format!("SELECT {} FROM authors WHERE id = $1", AUTHOR_COLUMNS);
        sqlx::query_as::<_, AuthorRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("authors", e))?
            .map(|r| r.to_domain())
            .ok_or_else(|| PortError::NotFound(format!("author with ID {} not found", id)))
    }

    async fn create_author(&self, author: &NewAuthor, now: DateTime<Utc>) -> PortResult<Author> {
        let sql = format!(
            "INSERT INTO authors (name, nationality, created_at, updated_at) \
             VALUES ($1, $2, $3, $3) RETURNING {}",
            AUTHOR_COLUMNS
        );
        let record = sqlx::query_as::<_, AuthorRecord>(&sql)
            .bind(&author.name)
            .bind(&author.nationality)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(author_write_error)?;
        Ok(record.to_domain())
    }

    async fn update_author(
        &self,
        update: &AuthorUpdate,
        now: DateTime<Utc>,
    ) -> PortResult<Option<Author>> {
        let sql = format!(
            "UPDATE authors SET name = $1, nationality = $2, updated_at = $3 \
             WHERE id = $4 RETURNING {}",
            AUTHOR_COLUMNS
        );
        let record = sqlx::query_as::<_, AuthorRecord>(&sql)
            .bind(&update.name)
            .bind(&update.nationality)
            .bind(now)
            .bind(update.id)
            .fetch_optional(&self.pool)
            .await
            .map_err(author_write_error)?;
        Ok(record.map(|r| r.to_domain()))
    }

    async fn delete_author(&self, id: i64) -> PortResult<Author> {
        let sql = format!("DELETE FROM authors WHERE id = $1 RETURNING {}", AUTHOR_COLUMNS);
        sqlx::query_as::<_, AuthorRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("authors", e))?
            .map(|r| r.to_domain())
            .ok_or_else(|| PortError::NotFound(format!("author with ID {} not found", id)))
    }
}

//=========================================================================================
// `BookRepository` Implementation
//=========================================================================================

#[async_trait]
impl BookRepository for DbAdapter {
    async fn get_all_books(&self) -> PortResult<Vec<Book>> {
        let sql = format!("SELECT {} FROM books ORDER BY id", BOOK_COLUMNS);
        let records = sqlx::query_as::<_, BookRecord>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("books", e))?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_book_by_id(&self, id: i64) -> PortResult<Book> {
        let sql = format!("SELECT {} FROM books WHERE id = $1", BOOK_COLUMNS);
        sqlx::query_as::<_, BookRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("books", e))?
            .map(|r| r.to_domain())
            .ok_or_else(|| PortError::NotFound(format!("book with ID {} not found", id)))
    }

    async fn author_exists(&self, author_id: i64) -> PortResult<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM authors WHERE id = $1)")
            .bind(author_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_error("authors", e))
    }

    async fn create_book(&self, book: &NewBook, now: DateTime<Utc>) -> PortResult<Book> {
        let sql = format!(
            "INSERT INTO books (title, stock, author_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $4) RETURNING {}",
            BOOK_COLUMNS
        );
        let record = sqlx::query_as::<_, BookRecord>(&sql)
            .bind(&book.title)
            .bind(book.stock)
            .bind(book.author_id)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_error("books", e))?;
        Ok(record.to_domain())
    }

    async fn update_book(
        &self,
        update: &BookUpdate,
        now: DateTime<Utc>,
    ) -> PortResult<Option<Book>> {
        let resource = format!("book {}", update.id);
        let mut tx = self.begin_locking().await?;
        let sql = format!(
            "UPDATE books SET title = $1, stock = $2, author_id = $3, updated_at = $4 \
             WHERE id = $5 RETURNING {}",
            BOOK_COLUMNS
        );
        let record = sqlx::query_as::<_, BookRecord>(&sql)
            .bind(&update.title)
            .bind(update.stock)
            .bind(update.author_id)
            .bind(now)
            .bind(update.id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| db_error(&resource, e))?;
        tx.commit().await.map_err(|e| db_error(&resource, e))?;
        Ok(record.map(|r| r.to_domain()))
    }

    async fn delete_book(&self, id: i64) -> PortResult<Book> {
        let resource = format!("book {}", id);
        let mut tx = self.begin_locking().await?;
        let sql = format!("DELETE FROM books WHERE id = $1 RETURNING {}", BOOK_COLUMNS);
        let record = sqlx::query_as::<_, BookRecord>(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| db_error(&resource, e))?
            .ok_or_else(|| PortError::NotFound(format!("book with ID {} not found", id)))?;
        tx.commit().await.map_err(|e| db_error(&resource, e))?;
        Ok(record.to_domain())
    }
}

//=========================================================================================
// `OrderRepository` Implementation
//=========================================================================================

#[async_trait]
impl OrderRepository for DbAdapter {
    async fn get_all_orders(&self) -> PortResult<Vec<Order>> {
        let sql = format!("SELECT {} FROM orders ORDER BY id", ORDER_COLUMNS);
        let records = sqlx::query_as::<_, OrderRecord>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("orders", e))?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_order_by_id(&self, id: i64) -> PortResult<Order> {
        let sql = format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS);
        sqlx::query_as::<_, OrderRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("orders", e))?
            .map(|r| r.to_domain())
            .ok_or_else(|| PortError::NotFound(format!("order with ID {} not found", id)))
    }

    async fn update_order(
        &self,
        update: &OrderUpdate,
        now: DateTime<Utc>,
    ) -> PortResult<Option<Order>> {
        let sql = format!(
            "UPDATE orders SET book_id = $1, user_id = $2, quantity = $3, status = $4, \
             updated_at = $5 WHERE id = $6 RETURNING {}",
            ORDER_COLUMNS
        );
        let record = sqlx::query_as::<_, OrderRecord>(&sql)
            .bind(update.book_id)
            .bind(update.user_id)
            .bind(update.quantity)
            .bind(&update.status)
            .bind(now)
            .bind(update.id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("orders", e))?;
        Ok(record.map(|r| r.to_domain()))
    }

    async fn delete_order(&self, id: i64) -> PortResult<Order> {
        let sql = format!("DELETE FROM orders WHERE id = $1 RETURNING {}", ORDER_COLUMNS);
        sqlx::query_as::<_, OrderRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("orders", e))?
            .map(|r| r.to_domain())
            .ok_or_else(|| PortError::NotFound(format!("order with ID {} not found", id)))
    }

    async fn begin(&self) -> PortResult<Box<dyn OrderUnitOfWork>> {
        let tx = self.begin_locking().await?;
        Ok(Box::new(PgOrderUnitOfWork { tx }))
    }
}

/// An order placement transaction. Dropping it without `commit` rolls back
/// and releases the row lock.
pub struct PgOrderUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

impl PgOrderUnitOfWork {
    fn conn(&mut self) -> &mut PgConnection {
        &mut self.tx
    }
}

#[async_trait]
impl OrderUnitOfWork for PgOrderUnitOfWork {
    async fn lock_book_for_update(&mut self, book_id: i64) -> PortResult<Option<Book>> {
        let sql = format!("SELECT {} FROM books WHERE id = $1 FOR UPDATE", BOOK_COLUMNS);
        let record = sqlx::query_as::<_, BookRecord>(&sql)
            .bind(book_id)
            .fetch_optional(self.conn())
            .await
            .map_err(|e| db_error(&format!("book {}", book_id), e))?;
        Ok(record.map(|r| r.to_domain()))
    }

    async fn insert_order(&mut self, order: &NewOrder, now: DateTime<Utc>) -> PortResult<Order> {
        let sql = format!(
            "INSERT INTO orders (book_id, user_id, quantity, status, ordered_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $5) RETURNING {}",
            ORDER_COLUMNS
        );
        let record = sqlx::query_as::<_, OrderRecord>(&sql)
            .bind(order.book_id)
            .bind(order.user_id)
            .bind(order.quantity)
            .bind(&order.status)
            .bind(now)
            .fetch_one(self.conn())
            .await
            .map_err(|e| db_error("orders", e))?;
        Ok(record.to_domain())
    }

    async fn update_book_stock(&mut self, book_id: i64, new_stock: i32) -> PortResult<()> {
        let result = sqlx::query("UPDATE books SET stock = $1, updated_at = now() WHERE id = $2")
            .bind(new_stock)
            .bind(book_id)
            .execute(self.conn())
            .await
            .map_err(|e| db_error(&format!("book {}", book_id), e))?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("book with ID {} not found", book_id)));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> PortResult<()> {
        let uow = *self;
        uow.tx
            .commit()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))
    }

    async fn rollback(self: Box<Self>) -> PortResult<()> {
        let uow = *self;
        uow.tx
            .rollback()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))
    }
}

//=========================================================================================
// `UserRepository` and `PermissionRepository` Implementations
//=========================================================================================

#[async_trait]
impl UserRepository for DbAdapter {
    async fn get_user_by_username(&self, username: &str) -> PortResult<User> {
        sqlx::query_as::<_, UserRecord>(
            "SELECT id, username, role, created_at, updated_at FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("users", e))?
        .map(|r| r.to_domain())
        .ok_or_else(|| PortError::NotFound(format!("user {} not found", username)))
    }

    async fn get_credentials(&self, username: &str) -> PortResult<UserCredentials> {
        sqlx::query_as::<_, CredentialsRecord>(
            "SELECT id, username, role, hashed_password FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("users", e))?
        .map(|r| r.to_domain())
        .ok_or_else(|| PortError::NotFound(format!("user {} not found", username)))
    }

    /// Inserts the user and links them to the role of the same name, if one exists.
    async fn create_user(
        &self,
        username: &str,
        hashed_password: &str,
        role: &str,
        now: DateTime<Utc>,
    ) -> PortResult<User> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (username, hashed_password, role, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $4) RETURNING id, username, role, created_at, updated_at",
        )
        .bind(username)
        .bind(hashed_password)
        .bind(role)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match db_error("users", e) {
            PortError::Duplicate(_) => {
                PortError::Duplicate(format!("username {} is taken", username))
            }
            other => other,
        })?;

        sqlx::query("INSERT INTO user_role (user_id, role_id) SELECT $1, id FROM roles WHERE role_name = $2")
            .bind(record.id)
            .bind(role)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error("user_role", e))?;

        tx.commit()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(record.to_domain())
    }
}

#[async_trait]
impl PermissionRepository for DbAdapter {
    async fn has_access(&self, user_id: i64, permission: &str) -> PortResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS ( \
                SELECT 1 FROM user_role ur \
                JOIN role_access ra ON ra.role_id = ur.role_id \
                JOIN access a ON a.id = ra.access_id \
                WHERE ur.user_id = $1 AND a.access_name = $2)",
        )
        .bind(user_id)
        .bind(permission)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("access", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_timeout_is_inlined_in_milliseconds() {
        assert_eq!(
            lock_timeout_statement(Duration::from_millis(250)),
            "SET LOCAL lock_timeout = '250ms'"
        );
        // Zero would disable the timeout in Postgres.
        assert_eq!(
            lock_timeout_statement(Duration::ZERO),
            "SET LOCAL lock_timeout = '1ms'"
        );
    }

    /// A stand-in for a Postgres error with a chosen SQLSTATE.
    #[derive(Debug)]
    struct FakePgError {
        code: &'static str,
        message: &'static str,
    }

    impl std::fmt::Display for FakePgError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(self.message)
        }
    }

    impl std::error::Error for FakePgError {}

    impl sqlx::error::DatabaseError for FakePgError {
        fn message(&self) -> &str {
            self.message
        }

        fn code(&self) -> Option<std::borrow::Cow<'_, str>> {
            Some(self.code.into())
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> sqlx::error::ErrorKind {
            sqlx::error::ErrorKind::Other
        }
    }

    fn pg_error(code: &'static str) -> sqlx::Error {
        sqlx::Error::Database(Box::new(FakePgError {
            code,
            message: "duplicate key value violates unique constraint \"authors_name_lower_idx\"",
        }))
    }

    #[test]
    fn unique_violation_never_carries_driver_text() {
        let err = db_error("users", pg_error(UNIQUE_VIOLATION));
        assert!(matches!(err, PortError::Duplicate(ref m) if m == "users already exists"));

        let err = author_write_error(pg_error(UNIQUE_VIOLATION));
        assert!(
            matches!(err, PortError::Duplicate(ref m) if m == "author with the same name already exists")
        );
    }

    #[test]
    fn lock_not_available_becomes_lock_timeout() {
        let err = db_error("book 3", pg_error(LOCK_NOT_AVAILABLE));
        assert!(matches!(err, PortError::LockTimeout(ref r) if r == "book 3"));
    }

    #[test]
    fn non_database_errors_are_unexpected() {
        let err = db_error("book 3", sqlx::Error::PoolTimedOut);
        assert!(matches!(err, PortError::Unexpected(_)));
    }
}
