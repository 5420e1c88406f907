//! Route configuration.

use crate::auth::trace_id_middleware;
use crate::handlers;
use crate::state::AppState;
use axum::Router;
use axum::middleware;
use axum::routing::{delete, get, post};
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Unauthenticated
        .route("/health", get(handlers::health_check))
        .route("/users", post(handlers::create_user))
        .route(
            "/users/{user_id}/bookmarks",
            get(handlers::list_user_bookmarks),
        )
        // Authenticated via the AuthenticatedAccount extractor
        .route(
            "/bookmarks",
            post(handlers::create_bookmark)
                .get(handlers::list_bookmarks)
                .delete(handlers::delete_bookmark),
        )
        .route("/auth/regenerate-key", post(handlers::regenerate_api_key))
        .route("/auth/whoami", get(handlers::whoami))
        .route("/account", delete(handlers::delete_account))
        // Layers run outermost first: TraceLayer -> trace id -> handler
        .layer(middleware::from_fn(trace_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
