use crate::state::AppState;
use crate::web::api::auth::{is_reasonable_email, normalize_email};
use crate::web::api::middleware::AuthUser;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use opgave_db::{UserRepo, UserRow};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// The only shape a user ever takes in a response body
fn user_json(user: &UserRow) -> serde_json::Value {
    json!({
        "user_id": user.user_id,
        "name": user.name,
        "email": user.email,
        "created_at": user.created_at,
    })
}

/// GET /user/me -- resolves the caller from the access token subject
#[tracing::instrument(skip(state))]
pub async fn me(State(state): State<Arc<AppState>>, auth: AuthUser) -> impl IntoResponse {
    match UserRepo::get_by_id(&state.pool, auth.user_id).await {
        Ok(Some(user)) => Json(user_json(&user)).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "User not found"})),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Failed to get user: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Internal server error"})),
            )
                .into_response()
        }
    }
}

/// GET /user/{id}
#[tracing::instrument(skip(state, _auth))]
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let user_id = match id.parse::<Uuid>() {
        Ok(id) => id,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "Invalid user ID"})),
            )
                .into_response()
        }
    };

    match UserRepo::get_by_id(&state.pool, user_id).await {
        Ok(Some(user)) => Json(user_json(&user)).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "User not found"})),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Failed to get user: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Internal server error"})),
            )
                .into_response()
        }
    }
}

/// POST /user -- create a password-less profile; such accounts cannot sign in
/// until credentials exist
#[tracing::instrument(skip(state, _auth, req))]
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    Json(req): Json<CreateUserRequest>,
) -> impl IntoResponse {
    let email = normalize_email(&req.email);
    if !is_reasonable_email(&email) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Invalid email format"})),
        )
            .into_response();
    }

    match UserRepo::get_by_email(&state.pool, &email).await {
        Ok(Some(_)) => {
            return (
                StatusCode::CONFLICT,
                Json(json!({"error": "Email already registered"})),
            )
                .into_response()
        }
        Ok(None) => {}
        Err(e) => {
            tracing::error!("DB error during user create: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Internal server error"})),
            )
                .into_response();
        }
    }

    match UserRepo::create(&state.pool, Uuid::new_v4(), &email, None, Some(&req.name)).await {
        Ok(user) => (StatusCode::CREATED, Json(user_json(&user))).into_response(),
        Err(e) => {
            tracing::error!("Failed to create user: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Internal server error"})),
            )
                .into_response()
        }
    }
}

/// PATCH /user -- update the caller's own profile
#[tracing::instrument(skip(state, req))]
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(req): Json<UpdateUserRequest>,
) -> impl IntoResponse {
    let email = req.email.map(|e| normalize_email(&e));

    if let Some(email) = &email {
        if !is_reasonable_email(email) {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "Invalid email format"})),
            )
                .into_response();
        }
        match UserRepo::get_by_email(&state.pool, email).await {
            Ok(Some(existing)) if existing.user_id != auth.user_id => {
                return (
                    StatusCode::CONFLICT,
                    Json(json!({"error": "Email already registered"})),
                )
                    .into_response()
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!("DB error during user update: {}", e);
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"error": "Internal server error"})),
                )
                    .into_response();
            }
        }
    }

    match UserRepo::update(
        &state.pool,
        auth.user_id,
        req.name.as_deref(),
        email.as_deref(),
    )
    .await
    {
        Ok(Some(user)) => Json(user_json(&user)).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "User not found"})),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Failed to update user: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Internal server error"})),
            )
                .into_response()
        }
    }
}

/// DELETE /user -- delete the caller's account; owned todos cascade
#[tracing::instrument(skip(state))]
pub async fn delete_user(State(state): State<Arc<AppState>>, auth: AuthUser) -> impl IntoResponse {
    match UserRepo::delete(&state.pool, auth.user_id).await {
        Ok(true) => Json(json!({"deleted": true})).into_response(),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "User not found"})),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Failed to delete user: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Internal server error"})),
            )
                .into_response()
        }
    }
}
