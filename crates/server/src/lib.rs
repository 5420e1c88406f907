//! HTTP API server for the Stash bookmark service.
//!
//! This crate provides the HTTP boundary:
//! - Account registration and key rotation
//! - Bookmark create, list and delete-by-title
//! - Account deletion together with its bookmarks
//! - The startup API key backfill

pub mod auth;
pub mod bootstrap;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use auth::{AuthenticatedAccount, TraceId};
pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
