pub mod auth;
pub mod middleware;
pub mod todos;
pub mod users;

use crate::state::AppState;
use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;

pub fn build_api_routes(state: Arc<AppState>) -> Router {
    Router::new()
        // Auth routes
        .route("/auth/signup", post(auth::signup))
        .route("/auth/signin", post(auth::signin))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/logout", post(auth::logout))
        // Todo routes ("bulk" carries single items; the name is the contract)
        .route("/todo/bulk", post(todos::create).put(todos::update))
        .route("/todo/list", post(todos::list))
        .route("/todo/{id}", delete(todos::remove))
        // Profile routes
        .route(
            "/user",
            post(users::create_user)
                .patch(users::update_user)
                .delete(users::delete_user),
        )
        .route("/user/me", get(users::me))
        .route("/user/{id}", get(users::get_user))
        .with_state(state)
}
