use crate::auth::validate_token;
use crate::state::AppState;
use crate::web::cookies::{get_cookie_value, ACCESS_TOKEN_COOKIE};
use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use opgave_common::models::auth::Claims;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// Extractor that authenticates the access-token cookie and provides the
/// caller's identity. Handlers read the current user from here and nowhere
/// else; a client-supplied user id is never trusted.
#[derive(Debug)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub claims: Claims,
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = match get_cookie_value(&parts.headers, ACCESS_TOKEN_COOKIE) {
            Some(t) => t,
            None => {
                return Err((
                    StatusCode::UNAUTHORIZED,
                    Json(json!({"error": "Missing authentication token"})),
                )
                    .into_response())
            }
        };

        let claims = match validate_token(&token, &state.config.auth.access_secret) {
            Ok(claims) => claims,
            Err(_) => {
                return Err((
                    StatusCode::UNAUTHORIZED,
                    Json(json!({"error": "Invalid or expired token"})),
                )
                    .into_response())
            }
        };

        let user_id = match claims.sub.parse::<Uuid>() {
            Ok(id) => id,
            Err(_) => {
                return Err((
                    StatusCode::UNAUTHORIZED,
                    Json(json!({"error": "Invalid or expired token"})),
                )
                    .into_response())
            }
        };

        Ok(AuthUser { user_id, claims })
    }
}
