//! services/api/src/web/authors.rs
//!
//! Handlers for `/authors`.

use axum::{
    extract::{rejection::JsonRejection, rejection::PathRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use bookstore_core::domain::{Author, AuthorUpdate, NewAuthor};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::web::state::AppState;
use crate::web::{json_body, path_id};

#[derive(Deserialize, ToSchema)]
pub struct AuthorRequest {
    pub name: String,
    #[serde(default)]
    pub nationality: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct AuthorResponse {
    pub id: i64,
    pub name: String,
    pub nationality: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Author> for AuthorResponse {
    fn from(author: Author) -> Self {
        Self {
            id: author.id,
            name: author.name,
            nationality: author.nationality,
            created_at: author.created_at,
            updated_at: author.updated_at,
        }
    }
}

#[utoipa::path(
    get,
    path = "/authors",
    responses(
        (status = 200, description = "All authors", body = [AuthorResponse]),
        (status = 404, description = "No authors exist")
    )
)]
pub async fn list_authors_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<AuthorResponse>>, ApiError> {
    let authors = state.authors.get_all().await?;
    Ok(Json(authors.into_iter().map(AuthorResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/authors/{id}",
    params(("id" = i64, Path, description = "Author id")),
    responses(
        (status = 200, description = "The author", body = AuthorResponse),
        (status = 400, description = "Invalid id"),
        (status = 404, description = "Author not found")
    )
)]
pub async fn get_author_handler(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<AuthorResponse>, ApiError> {
    let author = state.authors.get_by_id(path_id(id)?).await?;
    Ok(Json(author.into()))
}

/// Create an author. Names are unique, ignoring case.
#[utoipa::path(
    post,
    path = "/authors/add",
    request_body = AuthorRequest,
    responses(
        (status = 201, description = "Author created", body = AuthorResponse),
        (status = 400, description = "Empty or duplicate name"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Not allowed")
    ),
    security(("auth" = []))
)]
pub async fn create_author_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<AuthorRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let req = json_body(body)?;
    let author = state
        .authors
        .create(NewAuthor {
            name: req.name,
            nationality: req.nationality,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(AuthorResponse::from(author))))
}

#[utoipa::path(
    put,
    path = "/authors/{id}",
    params(("id" = i64, Path, description = "Author id")),
    request_body = AuthorRequest,
    responses(
        (status = 200, description = "Author updated", body = AuthorResponse),
        (status = 400, description = "Invalid author data"),
        (status = 404, description = "Author not found")
    ),
    security(("auth" = []))
)]
pub async fn update_author_handler(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
    body: Result<Json<AuthorRequest>, JsonRejection>,
) -> Result<Json<AuthorResponse>, ApiError> {
    let id = path_id(id)?;
    let req = json_body(body)?;
    let author = state
        .authors
        .update_by_id(AuthorUpdate {
            id,
            name: req.name,
            nationality: req.nationality,
        })
        .await?;
    Ok(Json(author.into()))
}

/// Delete an author. Books that reference the author are kept.
#[utoipa::path(
    delete,
    path = "/authors/{id}",
    params(("id" = i64, Path, description = "Author id")),
    responses(
        (status = 200, description = "The deleted author", body = AuthorResponse),
        (status = 404, description = "Author not found")
    ),
    security(("auth" = []))
)]
pub async fn delete_author_handler(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<AuthorResponse>, ApiError> {
    let author = state.authors.delete_by_id(path_id(id)?).await?;
    Ok(Json(author.into()))
}
