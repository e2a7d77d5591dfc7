//! services/api/src/web/router.rs
//!
//! Builds the complete HTTP router.
//!
//! Reads are public. Every write passes `require_auth` and the `admin` role
//! check; book and author writes additionally need the matching persisted
//! permission. Guards are attached per method, so `GET /books/{id}` and
//! `PUT /books/{id}` share a path but not a policy.

use axum::{
    middleware::from_fn_with_state,
    routing::{delete, get, post, put, MethodRouter},
    Router,
};
use bookstore_core::access::{permissions, ADMIN_ROLE};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::web::middleware::{require_auth, require_permission, require_role};
use crate::web::state::AppState;
use crate::web::{auth, authors, books, orders, rest};

type Route = MethodRouter<Arc<AppState>>;

/// Token plus `admin` role.
fn admin_only(route: Route, state: &Arc<AppState>) -> Route {
    // The last layer added runs first.
    route
        .route_layer(from_fn_with_state(ADMIN_ROLE, require_role))
        .route_layer(from_fn_with_state(state.clone(), require_auth))
}

/// Token, `admin` role and the named permission.
fn admin_with(route: Route, state: &Arc<AppState>, permission: &'static str) -> Route {
    admin_only(
        route.route_layer(from_fn_with_state(
            (state.clone(), permission),
            require_permission,
        )),
        state,
    )
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let s = &state;

    let api = Router::new()
        .route("/health", get(rest::health_handler))
        // --- Books ---
        .route("/books", get(books::list_books_handler))
        .route(
            "/books/add",
            admin_with(post(books::create_book_handler), s, permissions::BOOK_CREATE),
        )
        .route(
            "/books/{id}",
            get(books::get_book_handler)
                .merge(admin_with(put(books::update_book_handler), s, permissions::BOOK_UPDATE))
                .merge(admin_with(delete(books::delete_book_handler), s, permissions::BOOK_DELETE)),
        )
        // --- Authors ---
        .route("/authors", get(authors::list_authors_handler))
        .route(
            "/authors/add",
            admin_with(post(authors::create_author_handler), s, permissions::AUTHOR_CREATE),
        )
        .route(
            "/authors/{id}",
            get(authors::get_author_handler)
                .merge(admin_with(put(authors::update_author_handler), s, permissions::AUTHOR_UPDATE))
                .merge(admin_with(delete(authors::delete_author_handler), s, permissions::AUTHOR_DELETE)),
        )
        // --- Orders ---
        .route(
            "/orders",
            get(orders::list_orders_handler).merge(admin_only(post(orders::create_order_handler), s)),
        )
        .route(
            "/orders/{id}",
            get(orders::get_order_handler)
                .merge(admin_only(put(orders::update_order_handler), s))
                .merge(admin_only(delete(orders::delete_order_handler), s)),
        )
        // --- Users ---
        .route("/users", get(auth::get_user_handler))
        .route("/user/login", post(auth::login_handler))
        .route("/user/register", post(auth::register_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    Router::new()
        .merge(api)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", rest::ApiDoc::openapi()))
}
