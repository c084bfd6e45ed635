use crate::state::AppState;
use crate::web::api::middleware::AuthUser;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use opgave_common::models::todo::{
    Aggregation, ListRequest, ListResponse, PageInfo, Priority, Todo,
};
use opgave_db::{TodoRepo, TodoRow};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

const DEFAULT_PAGE_LIMIT: i64 = 50;

#[derive(Debug, Deserialize)]
pub struct CreateTodoRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub priority: Priority,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTodoRequest {
    pub id: Uuid,
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub completed: Option<bool>,
}

/// POST /todo/bulk -- single-item create; the plural route name is the wire
/// contract inherited from the original client
#[tracing::instrument(skip(state, req))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(req): Json<CreateTodoRequest>,
) -> impl IntoResponse {
    let title = req.title.trim();
    if title.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Title must not be empty"})),
        )
            .into_response();
    }

    let row = match TodoRepo::create(
        &state.pool,
        auth.user_id,
        title,
        &req.description,
        req.priority,
    )
    .await
    {
        Ok(r) => r,
        Err(e) => {
            tracing::error!("Failed to create todo: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Internal server error"})),
            )
                .into_response();
        }
    };

    match row.into_model() {
        Ok(todo) => (StatusCode::CREATED, Json(todo)).into_response(),
        Err(e) => {
            tracing::error!("Corrupt todo row: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Internal server error"})),
            )
                .into_response()
        }
    }
}

/// POST /todo/list -- filtered, paginated listing scoped to the caller. The
/// count comes from a separate query over the same predicate, so it reflects
/// the full match set rather than the returned page.
#[tracing::instrument(skip(state, req))]
pub async fn list(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(req): Json<ListRequest>,
) -> impl IntoResponse {
    let limit = req.pagination.limit.unwrap_or(DEFAULT_PAGE_LIMIT).max(0);
    let offset = req.pagination.offset.unwrap_or(0).max(0);

    let count = match TodoRepo::count(&state.pool, auth.user_id, &req.filters).await {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Failed to count todos: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Internal server error"})),
            )
                .into_response();
        }
    };

    let rows = match TodoRepo::list(&state.pool, auth.user_id, &req.filters, limit, offset).await {
        Ok(r) => r,
        Err(e) => {
            tracing::error!("Failed to list todos: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Internal server error"})),
            )
                .into_response();
        }
    };

    let results = match rows
        .into_iter()
        .map(TodoRow::into_model)
        .collect::<anyhow::Result<Vec<Todo>>>()
    {
        Ok(r) => r,
        Err(e) => {
            tracing::error!("Corrupt todo row: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Internal server error"})),
            )
                .into_response();
        }
    };

    Json(ListResponse {
        aggregation: Aggregation { count },
        filters: req.filters,
        pagination: PageInfo { limit, offset },
        results,
    })
    .into_response()
}

/// PUT /todo/bulk -- partial update of a single owned todo
#[tracing::instrument(skip(state, req))]
pub async fn update(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(req): Json<UpdateTodoRequest>,
) -> impl IntoResponse {
    let row = match TodoRepo::update(
        &state.pool,
        auth.user_id,
        req.id,
        req.title.as_deref(),
        req.description.as_deref(),
        req.priority,
        req.completed,
    )
    .await
    {
        Ok(Some(r)) => r,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({"error": "Todo not found"})),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!("Failed to update todo: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Internal server error"})),
            )
                .into_response();
        }
    };

    match row.into_model() {
        Ok(todo) => Json(todo).into_response(),
        Err(e) => {
            tracing::error!("Corrupt todo row: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Internal server error"})),
            )
                .into_response()
        }
    }
}

/// DELETE /todo/{id}
#[tracing::instrument(skip(state))]
pub async fn remove(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let id = match id.parse::<Uuid>() {
        Ok(id) => id,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "Invalid todo ID"})),
            )
                .into_response()
        }
    };

    match TodoRepo::delete(&state.pool, auth.user_id, id).await {
        Ok(true) => Json(json!({"deleted": true})).into_response(),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "Todo not found"})),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Failed to delete todo: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Internal server error"})),
            )
                .into_response()
        }
    }
}
