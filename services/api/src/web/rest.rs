//! services/api/src/web/rest.rs
//!
//! The health endpoint and the master definition for the OpenAPI
//! specification.

use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi, ToSchema};

use crate::web::{auth, authors, books, middleware::AUTH_HEADER, orders};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        books::list_books_handler,
        books::get_book_handler,
        books::create_book_handler,
        books::update_book_handler,
        books::delete_book_handler,
        authors::list_authors_handler,
        authors::get_author_handler,
        authors::create_author_handler,
        authors::update_author_handler,
        authors::delete_author_handler,
        orders::create_order_handler,
        orders::list_orders_handler,
        orders::get_order_handler,
        orders::update_order_handler,
        orders::delete_order_handler,
        auth::register_handler,
        auth::login_handler,
        auth::get_user_handler,
    ),
    components(
        schemas(
            HealthResponse,
            ErrorBody,
            books::BookRequest,
            books::BookResponse,
            authors::AuthorRequest,
            authors::AuthorResponse,
            orders::OrderRequest,
            orders::OrderResponse,
            orders::OrderCreatedResponse,
            auth::CredentialsRequest,
            auth::LoginResponse,
            auth::RegisterResponse,
            auth::UserResponse,
        )
    ),
    modifiers(&SessionTokenAddon),
    tags(
        (name = "Bookstore API", description = "Catalogue, inventory-aware ordering and user accounts.")
    )
)]
pub struct ApiDoc;

/// Registers the `auth: Bearer <token>` header as a security scheme.
struct SessionTokenAddon;

impl Modify for SessionTokenAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "auth",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
                    AUTH_HEADER,
                    "Bearer <token> from POST /user/login",
                ))),
            );
        }
    }
}

//=========================================================================================
// API Response Structs
//=========================================================================================

#[derive(Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

/// The body of every error response.
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

//=========================================================================================
// Handlers
//=========================================================================================

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}
