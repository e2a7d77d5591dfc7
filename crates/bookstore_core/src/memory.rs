//! crates/bookstore_core/src/memory.rs
//!
//! An in-memory implementation of every storage port. Each book row has its
//! own async mutex standing in for a database row lock, so order placement
//! against this store has the same blocking behaviour as `SELECT ... FOR
//! UPDATE`: a unit of work holds the lock until it commits or is dropped.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex as RowLock, OwnedMutexGuard};

use crate::domain::{
    Author, AuthorUpdate, Book, BookUpdate, NewAuthor, NewBook, NewOrder, Order, OrderUpdate,
    User, UserCredentials,
};
use crate::ports::{
    AuthorRepository, BookRepository, OrderRepository, OrderUnitOfWork, PermissionRepository,
    PortError, PortResult, UserRepository,
};

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct Tables {
    authors: BTreeMap<i64, Author>,
    books: BTreeMap<i64, Book>,
    orders: BTreeMap<i64, Order>,
    users: BTreeMap<i64, (User, String)>,
    grants: HashSet<(i64, String)>,
    next_author_id: i64,
    next_book_id: i64,
    next_order_id: i64,
    next_user_id: i64,
}

fn next_id(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

struct Inner {
    tables: Mutex<Tables>,
    row_locks: Mutex<HashMap<i64, Arc<RowLock<()>>>>,
    lock_timeout: Duration,
    fail_stock_updates: AtomicBool,
    calls: AtomicUsize,
}

/// Shared, cloneable handle to the in-memory tables.
#[derive(Clone)]
pub struct InMemoryStore {
    inner: Arc<Inner>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                tables: Mutex::new(Tables::default()),
                row_locks: Mutex::new(HashMap::new()),
                lock_timeout,
                fail_stock_updates: AtomicBool::new(false),
                calls: AtomicUsize::new(0),
            }),
        }
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.inner
            .tables
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn row_lock(&self, book_id: i64) -> Arc<RowLock<()>> {
        let mut locks = self
            .inner
            .row_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        locks.entry(book_id).or_default().clone()
    }

    async fn acquire_row(&self, book_id: i64) -> PortResult<OwnedMutexGuard<()>> {
        tokio::time::timeout(self.inner.lock_timeout, self.row_lock(book_id).lock_owned())
            .await
            .map_err(|_| PortError::LockTimeout(format!("book {}", book_id)))
    }

    fn record_call(&self) {
        self.inner.calls.fetch_add(1, Ordering::SeqCst);
    }

    //-------------------------------------------------------------------------------------
    // Seeding and inspection helpers
    //-------------------------------------------------------------------------------------

    /// Number of repository calls served so far, seeding helpers excluded.
    pub fn storage_calls(&self) -> usize {
        self.inner.calls.load(Ordering::SeqCst)
    }

    /// Makes every subsequent `update_book_stock` inside a unit of work fail.
    pub fn fail_stock_updates(&self, fail: bool) {
        self.inner.fail_stock_updates.store(fail, Ordering::SeqCst);
    }

    pub fn insert_author(&self, name: &str, nationality: &str) -> Author {
        let now = Utc::now();
        let mut tables = self.tables();
        let author = Author {
            id: next_id(&mut tables.next_author_id),
            name: name.to_string(),
            nationality: nationality.to_string(),
            created_at: now,
            updated_at: now,
        };
        tables.authors.insert(author.id, author.clone());
        author
    }

    pub fn insert_book(&self, title: &str, stock: i32, author_id: i64) -> Book {
        let now = Utc::now();
        let mut tables = self.tables();
        let book = Book {
            id: next_id(&mut tables.next_book_id),
            title: title.to_string(),
            stock,
            author_id,
            created_at: now,
            updated_at: now,
        };
        tables.books.insert(book.id, book.clone());
        book
    }

    pub fn insert_user(&self, username: &str, hashed_password: &str, role: &str) -> User {
        let now = Utc::now();
        let mut tables = self.tables();
        let user = User {
            id: next_id(&mut tables.next_user_id),
            username: username.to_string(),
            role: role.to_string(),
            created_at: now,
            updated_at: now,
        };
        tables
            .users
            .insert(user.id, (user.clone(), hashed_password.to_string()));
        user
    }

    pub fn grant(&self, user_id: i64, permission: &str) {
        self.tables()
            .grants
            .insert((user_id, permission.to_string()));
    }

    pub fn book(&self, id: i64) -> Option<Book> {
        self.tables().books.get(&id).cloned()
    }

    pub fn order_count(&self) -> usize {
        self.tables().orders.len()
    }
}

//=========================================================================================
// Repository Implementations
//=========================================================================================

#[async_trait]
impl AuthorRepository for InMemoryStore {
    async fn get_all_authors(&self) -> PortResult<Vec<Author>> {
        self.record_call();
        Ok(self.tables().authors.values().cloned().collect())
    }

    async fn get_author_by_id(&self, id: i64) -> PortResult<Author> {
        self.record_call();
        self.tables()
            .authors
            .get(&id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("author with ID {} not found", id)))
    }

    async fn create_author(&self, author: &NewAuthor, now: DateTime<Utc>) -> PortResult<Author> {
        self.record_call();
        let mut tables = self.tables();
        let created = Author {
            id: next_id(&mut tables.next_author_id),
            name: author.name.clone(),
            nationality: author.nationality.clone(),
            created_at: now,
            updated_at: now,
        };
        tables.authors.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_author(
        &self,
        update: &AuthorUpdate,
        now: DateTime<Utc>,
    ) -> PortResult<Option<Author>> {
        self.record_call();
        let mut tables = self.tables();
        Ok(tables.authors.get_mut(&update.id).map(|author| {
            author.name = update.name.clone();
            author.nationality = update.nationality.clone();
            author.updated_at = now;
            author.clone()
        }))
    }

    async fn delete_author(&self, id: i64) -> PortResult<Author> {
        self.record_call();
        self.tables()
            .authors
            .remove(&id)
            .ok_or_else(|| PortError::NotFound(format!("author with ID {} not found", id)))
    }
}

#[async_trait]
impl BookRepository for InMemoryStore {
    async fn get_all_books(&self) -> PortResult<Vec<Book>> {
        self.record_call();
        Ok(self.tables().books.values().cloned().collect())
    }

    async fn get_book_by_id(&self, id: i64) -> PortResult<Book> {
        self.record_call();
        self.book(id)
            .ok_or_else(|| PortError::NotFound(format!("book with ID {} not found", id)))
    }

    async fn author_exists(&self, author_id: i64) -> PortResult<bool> {
        self.record_call();
        Ok(self.tables().authors.contains_key(&author_id))
    }

    async fn create_book(&self, book: &NewBook, now: DateTime<Utc>) -> PortResult<Book> {
        self.record_call();
        let mut tables = self.tables();
        let created = Book {
            id: next_id(&mut tables.next_book_id),
            title: book.title.clone(),
            stock: book.stock,
            author_id: book.author_id,
            created_at: now,
            updated_at: now,
        };
        tables.books.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_book(
        &self,
        update: &BookUpdate,
        now: DateTime<Utc>,
    ) -> PortResult<Option<Book>> {
        self.record_call();
        let _row = self.acquire_row(update.id).await?;
        let mut tables = self.tables();
        Ok(tables.books.get_mut(&update.id).map(|book| {
            book.title = update.title.clone();
            book.stock = update.stock;
            book.author_id = update.author_id;
            book.updated_at = now;
            book.clone()
        }))
    }

    async fn delete_book(&self, id: i64) -> PortResult<Book> {
        self.record_call();
        let _row = self.acquire_row(id).await?;
        self.tables()
            .books
            .remove(&id)
            .ok_or_else(|| PortError::NotFound(format!("book with ID {} not found", id)))
    }
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn get_all_orders(&self) -> PortResult<Vec<Order>> {
        self.record_call();
        Ok(self.tables().orders.values().cloned().collect())
    }

    async fn get_order_by_id(&self, id: i64) -> PortResult<Order> {
        self.record_call();
        self.tables()
            .orders
            .get(&id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("order with ID {} not found", id)))
    }

    async fn update_order(
        &self,
        update: &OrderUpdate,
        now: DateTime<Utc>,
    ) -> PortResult<Option<Order>> {
        self.record_call();
        let mut tables = self.tables();
        Ok(tables.orders.get_mut(&update.id).map(|order| {
            order.book_id = update.book_id;
            order.user_id = update.user_id;
            order.quantity = update.quantity;
            order.status = update.status.clone();
            order.updated_at = now;
            order.clone()
        }))
    }

    async fn delete_order(&self, id: i64) -> PortResult<Order> {
        self.record_call();
        self.tables()
            .orders
            .remove(&id)
            .ok_or_else(|| PortError::NotFound(format!("order with ID {} not found", id)))
    }

    async fn begin(&self) -> PortResult<Box<dyn OrderUnitOfWork>> {
        self.record_call();
        Ok(Box::new(MemoryUnitOfWork {
            store: self.clone(),
            row_guards: Vec::new(),
            staged_orders: Vec::new(),
            staged_stock: Vec::new(),
        }))
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn get_user_by_username(&self, username: &str) -> PortResult<User> {
        self.record_call();
        self.tables()
            .users
            .values()
            .find(|(user, _)| user.username == username)
            .map(|(user, _)| user.clone())
            .ok_or_else(|| PortError::NotFound(format!("user {} not found", username)))
    }

    async fn get_credentials(&self, username: &str) -> PortResult<UserCredentials> {
        self.record_call();
        self.tables()
            .users
            .values()
            .find(|(user, _)| user.username == username)
            .map(|(user, hash)| UserCredentials {
                id: user.id,
                username: user.username.clone(),
                role: user.role.clone(),
                hashed_password: hash.clone(),
            })
            .ok_or_else(|| PortError::NotFound(format!("user {} not found", username)))
    }

    async fn create_user(
        &self,
        username: &str,
        hashed_password: &str,
        role: &str,
        now: DateTime<Utc>,
    ) -> PortResult<User> {
        self.record_call();
        let mut tables = self.tables();
        if tables.users.values().any(|(user, _)| user.username == username) {
            return Err(PortError::Duplicate(format!("username {} is taken", username)));
        }
        let user = User {
            id: next_id(&mut tables.next_user_id),
            username: username.to_string(),
            role: role.to_string(),
            created_at: now,
            updated_at: now,
        };
        tables
            .users
            .insert(user.id, (user.clone(), hashed_password.to_string()));
        Ok(user)
    }
}

#[async_trait]
impl PermissionRepository for InMemoryStore {
    async fn has_access(&self, user_id: i64, permission: &str) -> PortResult<bool> {
        self.record_call();
        Ok(self
            .tables()
            .grants
            .contains(&(user_id, permission.to_string())))
    }
}

//=========================================================================================
// Unit of Work
//=========================================================================================

/// Stages writes until commit; holds row guards for its whole lifetime.
struct MemoryUnitOfWork {
    store: InMemoryStore,
    row_guards: Vec<OwnedMutexGuard<()>>,
    staged_orders: Vec<Order>,
    staged_stock: Vec<(i64, i32)>,
}

#[async_trait]
impl OrderUnitOfWork for MemoryUnitOfWork {
    async fn lock_book_for_update(&mut self, book_id: i64) -> PortResult<Option<Book>> {
        let guard = self.store.acquire_row(book_id).await?;
        self.row_guards.push(guard);
        Ok(self.store.book(book_id))
    }

    async fn insert_order(&mut self, order: &NewOrder, now: DateTime<Utc>) -> PortResult<Order> {
        let id = next_id(&mut self.store.tables().next_order_id);
        let staged = Order {
            id,
            book_id: order.book_id,
            user_id: order.user_id,
            quantity: order.quantity,
            status: order.status.clone(),
            ordered_at: now,
            updated_at: now,
        };
        self.staged_orders.push(staged.clone());
        Ok(staged)
    }

    async fn update_book_stock(&mut self, book_id: i64, new_stock: i32) -> PortResult<()> {
        if self.store.inner.fail_stock_updates.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected(format!(
                "failed to update stock for book {}",
                book_id
            )));
        }
        self.staged_stock.push((book_id, new_stock));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> PortResult<()> {
        let now = Utc::now();
        {
            let mut tables = self.store.tables();
            for (book_id, stock) in &self.staged_stock {
                let book = tables
                    .books
                    .get_mut(book_id)
                    .ok_or_else(|| PortError::NotFound(format!("book with ID {} not found", book_id)))?;
                book.stock = *stock;
                book.updated_at = now;
            }
            for order in &self.staged_orders {
                tables.orders.insert(order.id, order.clone());
            }
        }
        // Row guards are released only after the writes are visible.
        drop(self);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> PortResult<()> {
        drop(self);
        Ok(())
    }
}
