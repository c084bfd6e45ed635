use crate::auth::{
    hash_password, issue_token_pair, validate_token, verify_password, DUMMY_PASSWORD_HASH,
};
use crate::state::AppState;
use crate::web::cookies::{
    clear_token_headers, get_cookie_value, token_pair_headers, REFRESH_TOKEN_COOKIE,
};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use opgave_db::UserRepo;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct AuthRequest {
    pub email: String,
    pub password: String,
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

pub(crate) fn is_reasonable_email(email: &str) -> bool {
    if email.len() < 5 || email.len() > 254 {
        return false;
    }
    let mut parts = email.split('@');
    let local = parts.next().unwrap_or_default();
    let domain = parts.next().unwrap_or_default();
    parts.next().is_none()
        && !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

/// Display name for fresh signups: the local part of the email
fn name_from_email(email: &str) -> String {
    email.split('@').next().unwrap_or(email).to_string()
}

/// POST /auth/signup
#[tracing::instrument(skip(state, req))]
pub async fn signup(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AuthRequest>,
) -> impl IntoResponse {
    let email = normalize_email(&req.email);
    if !is_reasonable_email(&email) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Invalid email format"})),
        )
            .into_response();
    }
    if req.password.len() < 8 || req.password.len() > 128 {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Password must be between 8 and 128 characters"})),
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
            tracing::error!("DB error during signup: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Internal server error"})),
            )
                .into_response();
        }
    }

    // argon2 is deliberately slow; keep it off the async workers
    let password = req.password.clone();
    let password_hash = match tokio::task::spawn_blocking(move || hash_password(&password)).await {
        Ok(Ok(h)) => h,
        Ok(Err(e)) => {
            tracing::error!("Failed to hash password: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Internal server error"})),
            )
                .into_response();
        }
        Err(e) => {
            tracing::error!("Password hashing task failed: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Internal server error"})),
            )
                .into_response();
        }
    };

    let name = name_from_email(&email);
    let user = match UserRepo::create(
        &state.pool,
        Uuid::new_v4(),
        &email,
        Some(&password_hash),
        Some(&name),
    )
    .await
    {
        Ok(u) => u,
        Err(e) => {
            tracing::error!("Failed to create user: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Internal server error"})),
            )
                .into_response();
        }
    };

    let pair = match issue_token_pair(&user, &state.config.auth) {
        Ok(p) => p,
        Err(e) => {
            tracing::error!("Failed to issue tokens: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Internal server error"})),
            )
                .into_response();
        }
    };

    let headers = token_pair_headers(&pair, &state.config.auth);
    (headers, Json(json!({"success": true}))).into_response()
}

/// POST /auth/signin
#[tracing::instrument(skip(state, req))]
pub async fn signin(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AuthRequest>,
) -> impl IntoResponse {
    let email = normalize_email(&req.email);

    // One generic rejection for unknown email and wrong password. The dummy
    // compare keeps the unknown-email path as slow as a real verification.
    let unauthorized = || {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "Invalid email or password"})),
        )
            .into_response()
    };

    let user = match UserRepo::get_by_email(&state.pool, &email).await {
        Ok(u) => u,
        Err(e) => {
            tracing::error!("DB error during signin: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Internal server error"})),
            )
                .into_response();
        }
    };

    let (user, password_hash) = match user {
        Some(u) => match u.password_hash.clone() {
            Some(h) => (Some(u), h),
            None => (None, DUMMY_PASSWORD_HASH.to_string()),
        },
        None => (None, DUMMY_PASSWORD_HASH.to_string()),
    };

    let password = req.password.clone();
    let valid =
        match tokio::task::spawn_blocking(move || verify_password(&password, &password_hash)).await
        {
            Ok(Ok(v)) => v,
            Ok(Err(e)) => {
                tracing::error!("Password verification error: {}", e);
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"error": "Internal server error"})),
                )
                    .into_response();
            }
            Err(e) => {
                tracing::error!("Password verification task failed: {}", e);
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"error": "Internal server error"})),
                )
                    .into_response();
            }
        };

    let user = match user {
        Some(u) if valid => u,
        _ => return unauthorized(),
    };

    let pair = match issue_token_pair(&user, &state.config.auth) {
        Ok(p) => p,
        Err(e) => {
            tracing::error!("Failed to issue tokens: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Internal server error"})),
            )
                .into_response();
        }
    };

    let headers = token_pair_headers(&pair, &state.config.auth);
    (headers, Json(json!({"success": true}))).into_response()
}

/// POST /auth/refresh -- reads the refresh cookie, never the access cookie.
/// On success both cookies are overwritten with a brand-new pair.
#[tracing::instrument(skip(state, headers))]
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let token = match get_cookie_value(&headers, REFRESH_TOKEN_COOKIE) {
        Some(t) => t,
        None => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": "Missing refresh token"})),
            )
                .into_response()
        }
    };

    let claims = match validate_token(&token, &state.config.auth.refresh_secret) {
        Ok(c) => c,
        Err(_) => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": "Invalid refresh token"})),
            )
                .into_response()
        }
    };

    let user_id = match claims.sub.parse::<Uuid>() {
        Ok(id) => id,
        Err(_) => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": "Invalid refresh token"})),
            )
                .into_response()
        }
    };

    // the account may have been deleted since the token was minted
    let user = match UserRepo::get_by_id(&state.pool, user_id).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": "User not found"})),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!("DB error during refresh: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Internal server error"})),
            )
                .into_response();
        }
    };

    let pair = match issue_token_pair(&user, &state.config.auth) {
        Ok(p) => p,
        Err(e) => {
            tracing::error!("Failed to issue tokens: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Internal server error"})),
            )
                .into_response();
        }
    };

    let out = token_pair_headers(&pair, &state.config.auth);
    (out, Json(json!({"success": true}))).into_response()
}

/// POST /auth/logout -- sessions are stateless, so logging out is just
/// expiring both cookies
pub async fn logout(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let headers = clear_token_headers(&state.config.auth);
    (headers, Json(json!({"success": true}))).into_response()
}
