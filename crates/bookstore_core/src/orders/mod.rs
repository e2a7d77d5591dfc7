//! crates/bookstore_core/src/orders/mod.rs
//!
//! The order service. Placement (the only path that touches book stock)
//! lives in `placement`; lookups, updates and deletes live in `management`.

mod management;
mod placement;

use std::sync::Arc;

use crate::ports::OrderRepository;

pub use placement::PlacementState;

pub struct OrderService {
    repo: Arc<dyn OrderRepository>,
}

impl OrderService {
    pub fn new(repo: Arc<dyn OrderRepository>) -> Self {
        Self { repo }
    }
}
