//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use bookstore_core::ports::{
    AuthorRepository, BookRepository, OrderRepository, PermissionRepository, TokenService,
    UserRepository,
};
use bookstore_core::{AccessGate, AuthorService, BookService, OrderService};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub authors: Arc<AuthorService>,
    pub books: Arc<BookService>,
    pub orders: Arc<OrderService>,
    pub users: Arc<dyn UserRepository>,
    pub gate: Arc<AccessGate>,
    pub tokens: Arc<dyn TokenService>,
}

/// The storage adapters the services are built on. One adapter may fill
/// every slot.
pub struct Repositories {
    pub authors: Arc<dyn AuthorRepository>,
    pub books: Arc<dyn BookRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub users: Arc<dyn UserRepository>,
    pub permissions: Arc<dyn PermissionRepository>,
}

impl Repositories {
    /// Uses a single adapter for every port.
    pub fn from_adapter<A>(adapter: A) -> Self
    where
        A: AuthorRepository
            + BookRepository
            + OrderRepository
            + UserRepository
            + PermissionRepository
            + 'static,
    {
        let adapter = Arc::new(adapter);
        Self {
            authors: adapter.clone(),
            books: adapter.clone(),
            orders: adapter.clone(),
            users: adapter.clone(),
            permissions: adapter,
        }
    }
}

impl AppState {
    pub fn new(config: Config, repos: Repositories, tokens: Arc<dyn TokenService>) -> Self {
        Self {
            config: Arc::new(config),
            authors: Arc::new(AuthorService::new(repos.authors)),
            books: Arc::new(BookService::new(repos.books)),
            orders: Arc::new(OrderService::new(repos.orders)),
            users: repos.users,
            gate: Arc::new(AccessGate::new(repos.permissions)),
            tokens,
        }
    }
}
