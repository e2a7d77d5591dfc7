//! services/api/src/web/orders.rs
//!
//! Handlers for `/orders`. Placing an order is the one request that changes
//! book stock; the work happens in `OrderService::create_order`.

use axum::{
    extract::{rejection::JsonRejection, rejection::PathRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use bookstore_core::domain::{NewOrder, Order, OrderUpdate};
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

/// Missing fields decode to zero values and are rejected by validation.
#[derive(Deserialize, ToSchema)]
pub struct OrderRequest {
    #[serde(default)]
    pub book_id: i64,
    #[serde(default)]
    pub user_id: i64,
    #[serde(default)]
    pub quantity: i32,
    #[serde(default)]
    pub status: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    pub id: i64,
    pub book_id: i64,
    pub user_id: i64,
    pub quantity: i32,
    pub status: String,
    pub ordered_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            book_id: order.book_id,
            user_id: order.user_id,
            quantity: order.quantity,
            status: order.status,
            ordered_at: order.ordered_at,
            updated_at: order.updated_at,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct OrderCreatedResponse {
    pub message: String,
    pub order: OrderResponse,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// Place an order, reserving stock from the book.
#[utoipa::path(
    post,
    path = "/orders",
    request_body = OrderRequest,
    responses(
        (status = 201, description = "Order created", body = OrderCreatedResponse),
        (status = 400, description = "Invalid order or not enough stock"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Not allowed"),
        (status = 404, description = "Book not found"),
        (status = 503, description = "Book is locked by another order, retry")
    ),
    security(("auth" = []))
)]
pub async fn create_order_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<OrderRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let req = json_body(body)?;
    let order = state
        .orders
        .create_order(NewOrder {
            book_id: req.book_id,
            user_id: req.user_id,
            quantity: req.quantity,
            status: req.status,
        })
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(OrderCreatedResponse {
            message: "Order created successfully".to_string(),
            order: order.into(),
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/orders",
    responses(
        (status = 200, description = "All orders", body = [OrderResponse]),
        (status = 404, description = "No orders exist")
    )
)]
pub async fn list_orders_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let orders = state.orders.get_all().await?;
    Ok(Json(orders.into_iter().map(OrderResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/orders/{id}",
    params(("id" = i64, Path, description = "Order id")),
    responses(
        (status = 200, description = "The order", body = OrderResponse),
        (status = 400, description = "Invalid id"),
        (status = 404, description = "Order not found")
    )
)]
pub async fn get_order_handler(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state.orders.get_by_id(path_id(id)?).await?;
    Ok(Json(order.into()))
}

/// Replace an order's fields. Book stock is not adjusted.
#[utoipa::path(
    put,
    path = "/orders/{id}",
    params(("id" = i64, Path, description = "Order id")),
    request_body = OrderRequest,
    responses(
        (status = 200, description = "Order updated", body = OrderResponse),
        (status = 400, description = "Invalid order data"),
        (status = 404, description = "Order not found")
    ),
    security(("auth" = []))
)]
pub async fn update_order_handler(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
    body: Result<Json<OrderRequest>, JsonRejection>,
) -> Result<Json<OrderResponse>, ApiError> {
    let id = path_id(id)?;
    let req = json_body(body)?;
    let order = state
        .orders
        .update_by_id(OrderUpdate {
            id,
            book_id: req.book_id,
            user_id: req.user_id,
            quantity: req.quantity,
            status: req.status,
        })
        .await?;
    Ok(Json(order.into()))
}

/// Delete an order. The ordered quantity is not returned to stock.
#[utoipa::path(
    delete,
    path = "/orders/{id}",
    params(("id" = i64, Path, description = "Order id")),
    responses(
        (status = 200, description = "The deleted order", body = OrderResponse),
        (status = 404, description = "Order not found")
    ),
    security(("auth" = []))
)]
pub async fn delete_order_handler(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state.orders.delete_by_id(path_id(id)?).await?;
    Ok(Json(order.into()))
}
