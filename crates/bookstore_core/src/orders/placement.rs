//! crates/bookstore_core/src/orders/placement.rs
//!
//! Inventory-aware order placement.
//!
//! A request moves `Requested -> Validated -> StockReserved -> Persisted`.
//! It ends in `Rejected` when validation fails (no storage is touched) or in
//! `Aborted` when anything inside the unit of work fails, in which case the
//! unit of work is rolled back and neither the order nor the stock change
//! survives.

use std::fmt;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::OrderService;
use crate::domain::{NewOrder, Order};
use crate::error::{ServiceError, ValidationError};
use crate::ports::OrderUnitOfWork;
use crate::validation::{require_positive, require_positive_id, require_text};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementState {
    Requested,
    Validated,
    StockReserved,
    Persisted,
    Rejected,
    Aborted,
}

impl fmt::Display for PlacementState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Requested => "requested",
            Self::Validated => "validated",
            Self::StockReserved => "stock_reserved",
            Self::Persisted => "persisted",
            Self::Rejected => "rejected",
            Self::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

pub(crate) fn validate_new_order(order: &NewOrder) -> Result<(), ValidationError> {
    require_positive_id(order.book_id, "invalid book ID")?;
    require_positive_id(order.user_id, "invalid user ID")?;
    require_positive(order.quantity, "quantity must be greater than zero")?;
    require_text(&order.status, "status is required")?;
    Ok(())
}

impl OrderService {
    /// Places an order, decrementing the book's stock in the same unit of work.
    ///
    /// The book row stays locked from the stock read until commit or rollback,
    /// so concurrent placements against one book observe every committed
    /// decrement and stock never goes below zero.
    pub async fn create_order(&self, request: NewOrder) -> Result<Order, ServiceError> {
        debug!(book_id = request.book_id, state = %PlacementState::Requested, "placing order");

        if let Err(e) = validate_new_order(&request) {
            debug!(book_id = request.book_id, state = %PlacementState::Rejected, reason = %e, "order rejected");
            return Err(e.into());
        }
        debug!(book_id = request.book_id, state = %PlacementState::Validated, "order validated");

        let mut uow = self
            .repo
            .begin()
            .await
            .map_err(|e| ServiceError::from_port("begin order transaction", e))?;

        match reserve_and_insert(uow.as_mut(), &request).await {
            Ok(order) => {
                uow.commit()
                    .await
                    .map_err(|e| ServiceError::from_port("commit order transaction", e))?;
                info!(
                    order_id = order.id,
                    book_id = order.book_id,
                    quantity = order.quantity,
                    state = %PlacementState::Persisted,
                    "order placed"
                );
                Ok(order)
            }
            Err(err) => {
                if let Err(rollback_err) = uow.rollback().await {
                    warn!(book_id = request.book_id, "Failed to roll back order transaction: {:?}", rollback_err);
                }
                warn!(book_id = request.book_id, state = %PlacementState::Aborted, reason = %err, "order aborted");
                Err(err)
            }
        }
    }
}

/// Lock, check, insert, decrement. Any error leaves the caller to roll back.
async fn reserve_and_insert(
    uow: &mut dyn OrderUnitOfWork,
    request: &NewOrder,
) -> Result<Order, ServiceError> {
    let book_id = request.book_id;
    let book = uow
        .lock_book_for_update(book_id)
        .await
        .map_err(|e| ServiceError::from_port(format!("lock book {}", book_id), e))?
        .ok_or_else(|| ServiceError::NotFound(format!("book with ID {} not found", book_id)))?;

    if book.stock < request.quantity {
        return Err(ServiceError::InsufficientStock {
            book_id,
            requested: request.quantity,
            available: book.stock,
        });
    }
    debug!(book_id, stock = book.stock, state = %PlacementState::StockReserved, "stock reserved");

    let order = uow
        .insert_order(request, Utc::now())
        .await
        .map_err(|e| ServiceError::from_port("failed to create order", e))?;

    uow.update_book_stock(book_id, book.stock - request.quantity)
        .await
        .map_err(|e| ServiceError::from_port("failed to update book stock", e))?;

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use crate::ports::OrderRepository;
    use std::sync::Arc;
    use std::time::Duration;

    fn order(book_id: i64, quantity: i32) -> NewOrder {
        NewOrder {
            book_id,
            user_id: 7,
            quantity,
            status: "pending".to_string(),
        }
    }

    fn service(store: &InMemoryStore) -> OrderService {
        OrderService::new(Arc::new(store.clone()))
    }

    #[tokio::test]
    async fn successful_order_decrements_stock_exactly() {
        let store = InMemoryStore::new();
        let book = store.insert_book("Go 101", 5, 1);

        let placed = service(&store).create_order(order(book.id, 3)).await.unwrap();

        assert_eq!(placed.book_id, book.id);
        assert_eq!(placed.quantity, 3);
        assert_eq!(placed.ordered_at, placed.updated_at);
        assert_eq!(store.book(book.id).unwrap().stock, 2);
        assert_eq!(store.order_count(), 1);
    }

    #[tokio::test]
    async fn whole_stock_can_be_ordered() {
        let store = InMemoryStore::new();
        let book = store.insert_book("Go 101", 5, 1);

        service(&store).create_order(order(book.id, 5)).await.unwrap();

        assert_eq!(store.book(book.id).unwrap().stock, 0);
    }

    #[tokio::test]
    async fn insufficient_stock_has_no_side_effect() {
        let store = InMemoryStore::new();
        let book = store.insert_book("Go 101", 2, 1);

        let err = service(&store).create_order(order(book.id, 3)).await.unwrap_err();

        assert!(matches!(
            err,
            ServiceError::InsufficientStock { requested: 3, available: 2, .. }
        ));
        assert_eq!(err.to_string(), "not enough stock available");
        assert_eq!(store.book(book.id).unwrap().stock, 2);
        assert_eq!(store.order_count(), 0);
    }

    #[tokio::test]
    async fn missing_book_is_not_found() {
        let store = InMemoryStore::new();

        let err = service(&store).create_order(order(42, 1)).await.unwrap_err();

        assert!(matches!(err, ServiceError::NotFound(ref m) if m == "book with ID 42 not found"));
        assert_eq!(store.order_count(), 0);
    }

    #[tokio::test]
    async fn invalid_requests_never_reach_storage() {
        let store = InMemoryStore::new();
        let svc = service(&store);
        let cases = [
            (NewOrder { book_id: 0, ..order(1, 1) }, "invalid book ID"),
            (NewOrder { user_id: -3, ..order(1, 1) }, "invalid user ID"),
            (order(1, 0), "quantity must be greater than zero"),
            (order(1, -2), "quantity must be greater than zero"),
            (NewOrder { status: "  ".into(), ..order(1, 1) }, "status is required"),
        ];

        for (request, message) in cases {
            let err = svc.create_order(request).await.unwrap_err();
            assert!(matches!(err, ServiceError::Validation(_)));
            assert_eq!(err.to_string(), message);
        }
        assert_eq!(store.storage_calls(), 0);
    }

    #[tokio::test]
    async fn failed_stock_update_rolls_back_the_order() {
        let store = InMemoryStore::new();
        let book = store.insert_book("Go 101", 5, 1);
        store.fail_stock_updates(true);

        let err = service(&store).create_order(order(book.id, 1)).await.unwrap_err();

        assert!(matches!(err, ServiceError::Storage { ref context, .. } if context == "failed to update book stock"));
        assert_eq!(store.book(book.id).unwrap().stock, 5);
        assert_eq!(store.order_count(), 0);
    }

    #[tokio::test]
    async fn held_row_lock_surfaces_as_retryable_error() {
        let store = InMemoryStore::with_lock_timeout(Duration::from_millis(50));
        let book = store.insert_book("Go 101", 5, 1);

        let mut holder = store.begin().await.unwrap();
        holder.lock_book_for_update(book.id).await.unwrap();

        let err = service(&store).create_order(order(book.id, 1)).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(store.book(book.id).unwrap().stock, 5);

        holder.rollback().await.unwrap();
        service(&store).create_order(order(book.id, 1)).await.unwrap();
        assert_eq!(store.book(book.id).unwrap().stock, 4);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_orders_never_oversell() {
        for (requests, stock) in [(20_usize, 7_i32), (5, 12), (16, 16)] {
            let store = InMemoryStore::new();
            let book = store.insert_book("Go 101", stock, 1);
            let svc = Arc::new(service(&store));

            let tasks = (0..requests).map(|_| {
                let svc = Arc::clone(&svc);
                tokio::spawn(async move { svc.create_order(order(book.id, 1)).await })
            });
            let results = futures::future::join_all(tasks).await;

            let mut placed = 0;
            let mut short = 0;
            for result in results {
                match result.unwrap() {
                    Ok(_) => placed += 1,
                    Err(ServiceError::InsufficientStock { .. }) => short += 1,
                    Err(other) => panic!("unexpected error: {other}"),
                }
            }

            let expected = requests.min(stock as usize);
            assert_eq!(placed, expected);
            assert_eq!(short, requests - expected);
            assert_eq!(store.book(book.id).unwrap().stock, stock - expected as i32);
            assert_eq!(store.order_count(), expected);
        }
    }
}
