pub mod access;
pub mod catalog;
pub mod domain;
pub mod error;
pub mod orders;
pub mod ports;
pub mod validation;

#[cfg(any(test, feature = "test-utils"))]
pub mod memory;

pub use access::AccessGate;
pub use catalog::{AuthorService, BookService};
pub use domain::{
    Author, AuthorUpdate, Book, BookUpdate, Identity, NewAuthor, NewBook, NewOrder, Order,
    OrderUpdate, User, UserCredentials,
};
pub use error::{AuthError, ServiceError, ValidationError};
pub use orders::{OrderService, PlacementState};
pub use ports::{
    AuthorRepository, BookRepository, OrderRepository, OrderUnitOfWork, PermissionRepository,
    PortError, PortResult, TokenService, UserRepository,
};
