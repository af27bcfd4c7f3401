/*
 * Responsibility
 * - v1 URL structure
 * - Each guarded route names the controller handler and action whose
 *   before-action callbacks run ahead of it
 */
use axum::{
    Router,
    routing::{delete, get, post},
};

use crate::api::v1::handlers::{admin, health::health, posts, session};
use crate::middleware::token_auth;
use crate::state::AppState;

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/session/{scope}", delete(session::sign_out))
        .route(
            "/posts",
            token_auth::apply(get(posts::index), state.posts.clone(), "index"),
        )
        .route(
            "/posts/public",
            token_auth::apply(get(posts::public), state.posts.clone(), "public"),
        )
        .route(
            "/admin/dashboard",
            token_auth::apply(get(admin::dashboard), state.dashboard.clone(), "show"),
        )
        .route(
            "/admin/tokens",
            token_auth::apply(post(admin::issue_token), state.tokens.clone(), "create"),
        )
}
