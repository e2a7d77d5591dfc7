//! crates/bookstore_core/src/orders/management.rs
//!
//! Lookup, listing, update and deletion of existing orders. None of these
//! touch book stock; deleting an order does not give its quantity back.

use chrono::Utc;
use tracing::info;

use super::OrderService;
use crate::domain::{Order, OrderUpdate};
use crate::error::{ServiceError, ValidationError};
use crate::validation::{require_positive, require_positive_id, require_text};

const INVALID_ORDER_ID: &str = "invalid order ID";

fn validate_update(update: &OrderUpdate) -> Result<(), ValidationError> {
    require_positive_id(update.id, INVALID_ORDER_ID)?;
    require_positive_id(update.book_id, "invalid book ID")?;
    require_positive_id(update.user_id, "invalid user ID")?;
    require_positive(update.quantity, "quantity must be greater than zero")?;
    require_text(&update.status, "status is required")?;
    Ok(())
}

impl OrderService {
    /// An empty table is reported as `NotFound`, distinct from a failed query.
    pub async fn get_all(&self) -> Result<Vec<Order>, ServiceError> {
        let orders = self
            .repo
            .get_all_orders()
            .await
            .map_err(|e| ServiceError::from_port("list orders", e))?;
        if orders.is_empty() {
            return Err(ServiceError::NotFound("no orders found".to_string()));
        }
        Ok(orders)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Order, ServiceError> {
        require_positive_id(id, INVALID_ORDER_ID)?;
        self.repo
            .get_order_by_id(id)
            .await
            .map_err(|e| ServiceError::from_port(format!("get order {}", id), e))
    }

    pub async fn update_by_id(&self, update: OrderUpdate) -> Result<Order, ServiceError> {
        validate_update(&update)?;
        let updated = self
            .repo
            .update_order(&update, Utc::now())
            .await
            .map_err(|e| ServiceError::from_port(format!("update order {}", update.id), e))?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("no order updated with id {}", update.id))
            })?;
        info!(order_id = updated.id, status = %updated.status, "order updated");
        Ok(updated)
    }

    pub async fn delete_by_id(&self, id: i64) -> Result<Order, ServiceError> {
        require_positive_id(id, INVALID_ORDER_ID)?;
        let deleted = self
            .repo
            .delete_order(id)
            .await
            .map_err(|e| ServiceError::from_port(format!("delete order {}", id), e))?;
        info!(order_id = deleted.id, "order deleted");
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NewOrder;
    use crate::memory::InMemoryStore;
    use crate::ports::{OrderRepository, OrderUnitOfWork, PortError, PortResult};
    use async_trait::async_trait;
    use chrono::DateTime;
    use std::sync::Arc;

    async fn seeded() -> (InMemoryStore, OrderService, Order) {
        let store = InMemoryStore::new();
        let book = store.insert_book("Go 101", 10, 1);
        let svc = OrderService::new(Arc::new(store.clone()));
        let order = svc
            .create_order(NewOrder {
                book_id: book.id,
                user_id: 7,
                quantity: 2,
                status: "pending".into(),
            })
            .await
            .unwrap();
        (store, svc, order)
    }

    fn update_of(order: &Order) -> OrderUpdate {
        OrderUpdate {
            id: order.id,
            book_id: order.book_id,
            user_id: order.user_id,
            quantity: order.quantity,
            status: order.status.clone(),
        }
    }

    #[tokio::test]
    async fn empty_listing_is_not_found() {
        let store = InMemoryStore::new();
        let svc = OrderService::new(Arc::new(store));
        let err = svc.get_all().await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(ref m) if m == "no orders found"));
    }

    #[tokio::test]
    async fn listing_returns_every_order() {
        let (_store, svc, order) = seeded().await;
        assert_eq!(svc.get_all().await.unwrap(), vec![order]);
    }

    #[tokio::test]
    async fn negative_id_is_rejected_without_storage_call() {
        let store = InMemoryStore::new();
        let svc = OrderService::new(Arc::new(store.clone()));

        let err = svc.get_by_id(-1).await.unwrap_err();

        assert!(matches!(err, ServiceError::Validation(_)));
        assert_eq!(err.to_string(), "invalid order ID");
        assert_eq!(store.storage_calls(), 0);
    }

    #[tokio::test]
    async fn missing_order_is_not_found() {
        let (_store, svc, _) = seeded().await;
        let err = svc.get_by_id(99).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(ref m) if m == "order with ID 99 not found"));
    }

    #[tokio::test]
    async fn empty_status_update_is_rejected_without_storage_call() {
        let (store, svc, order) = seeded().await;
        let before = store.storage_calls();

        let err = svc
            .update_by_id(OrderUpdate {
                status: "".into(),
                ..update_of(&order)
            })
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "status is required");
        assert_eq!(store.storage_calls(), before);
    }

    #[tokio::test]
    async fn each_invalid_field_has_its_own_message() {
        let (_store, svc, order) = seeded().await;
        let base = update_of(&order);
        let cases = [
            (OrderUpdate { id: 0, ..base.clone() }, "invalid order ID"),
            (OrderUpdate { book_id: 0, ..base.clone() }, "invalid book ID"),
            (OrderUpdate { user_id: 0, ..base.clone() }, "invalid user ID"),
            (OrderUpdate { quantity: 0, ..base.clone() }, "quantity must be greater than zero"),
        ];
        for (update, message) in cases {
            assert_eq!(svc.update_by_id(update).await.unwrap_err().to_string(), message);
        }
    }

    #[tokio::test]
    async fn update_replaces_fields_and_bumps_updated_at() {
        let (store, svc, order) = seeded().await;

        let updated = svc
            .update_by_id(OrderUpdate {
                status: "shipped".into(),
                quantity: 9,
                ..update_of(&order)
            })
            .await
            .unwrap();

        assert_eq!(updated.status, "shipped");
        assert_eq!(updated.quantity, 9);
        assert_eq!(updated.ordered_at, order.ordered_at);
        assert!(updated.updated_at >= order.updated_at);
        // Updates never touch stock.
        assert_eq!(store.book(order.book_id).unwrap().stock, 8);
    }

    #[tokio::test]
    async fn updating_unknown_order_reports_no_rows() {
        let (_store, svc, order) = seeded().await;
        let err = svc
            .update_by_id(OrderUpdate { id: 500, ..update_of(&order) })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(ref m) if m == "no order updated with id 500"));
    }

    #[tokio::test]
    async fn delete_returns_the_order_and_keeps_stock() {
        let (store, svc, order) = seeded().await;

        let deleted = svc.delete_by_id(order.id).await.unwrap();

        assert_eq!(deleted, order);
        assert_eq!(store.order_count(), 0);
        assert_eq!(store.book(order.book_id).unwrap().stock, 8);
        assert!(matches!(svc.delete_by_id(order.id).await, Err(ServiceError::NotFound(_))));
        assert!(matches!(svc.delete_by_id(0).await, Err(ServiceError::Validation(_))));
    }

    struct FailingOrders;

    #[async_trait]
    impl OrderRepository for FailingOrders {
        async fn get_all_orders(&self) -> PortResult<Vec<Order>> {
            Err(PortError::Unexpected("db error".into()))
        }
        async fn get_order_by_id(&self, _id: i64) -> PortResult<Order> {
            Err(PortError::Unexpected("db error".into()))
        }
        async fn update_order(
            &self,
            _update: &OrderUpdate,
            _now: DateTime<Utc>,
        ) -> PortResult<Option<Order>> {
            Err(PortError::Unexpected("db error".into()))
        }
        async fn delete_order(&self, _id: i64) -> PortResult<Order> {
            Err(PortError::Unexpected("db error".into()))
        }
        async fn begin(&self) -> PortResult<Box<dyn OrderUnitOfWork>> {
            Err(PortError::Unexpected("db error".into()))
        }
    }

    #[tokio::test]
    async fn storage_failures_are_wrapped_not_reported_as_missing() {
        let svc = OrderService::new(Arc::new(FailingOrders));

        let err = svc.get_all().await.unwrap_err();
        assert!(matches!(err, ServiceError::Storage { ref context, .. } if context == "list orders"));

        let err = svc.get_by_id(3).await.unwrap_err();
        assert!(matches!(err, ServiceError::Storage { ref context, .. } if context == "get order 3"));
    }
}
