//! Bookmark endpoints.

use crate::auth::AuthenticatedAccount;
use crate::error::{ApiError, ApiResult};
use crate::handlers::common::{format_timestamp, read_json_body};
use crate::state::AppState;
use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, Request, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use stash_core::NewBookmark;
use stash_metadata::accounts;
use stash_metadata::models::BookmarkRow;
use stash_metadata::repos::BookmarkRepo;

/// Bookmark as returned to clients.
#[derive(Debug, Serialize)]
pub struct BookmarkResponse {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub url: String,
    pub created_at: String,
}

impl TryFrom<BookmarkRow> for BookmarkResponse {
    type Error = ApiError;

    fn try_from(row: BookmarkRow) -> ApiResult<Self> {
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            url: row.url,
            created_at: format_timestamp(row.created_at)?,
        })
    }
}

fn to_responses(rows: Vec<BookmarkRow>) -> ApiResult<Vec<BookmarkResponse>> {
    rows.into_iter().map(BookmarkResponse::try_from).collect()
}

/// POST /bookmarks - Save a bookmark for the caller.
pub async fn create_bookmark(
    auth: AuthenticatedAccount,
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<(StatusCode, Json<BookmarkResponse>)> {
    let body: NewBookmark = read_json_body(req, state.config.server.max_body_bytes).await?;
    let body = body.validate()?;

    let row = state
        .metadata
        .create_bookmark(auth.id(), &body.title, &body.url)
        .await?;

    tracing::debug!(account_id = auth.id(), bookmark_id = row.id, "Bookmark created");

    Ok((StatusCode::CREATED, Json(BookmarkResponse::try_from(row)?)))
}

/// GET /bookmarks - List the caller's bookmarks in insertion order.
pub async fn list_bookmarks(
    auth: AuthenticatedAccount,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<BookmarkResponse>>> {
    let rows = state.metadata.list_bookmarks(auth.id()).await?;
    Ok(Json(to_responses(rows)?))
}

/// GET /users/{user_id}/bookmarks - List another account's bookmarks.
pub async fn list_user_bookmarks(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<Vec<BookmarkResponse>>> {
    let user_id: i64 = user_id
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid user id: {user_id}")))?;

    // Distinguish "no such account" from "no bookmarks".
    let account = accounts::get_account(state.metadata.as_ref(), user_id).await?;
    let rows = state.metadata.list_bookmarks(account.id).await?;
    Ok(Json(to_responses(rows)?))
}

/// Query for deleting bookmarks by title.
#[derive(Debug, Deserialize)]
pub struct DeleteBookmarkParams {
    pub title: String,
}

/// Response for a delete-by-title.
#[derive(Debug, Serialize)]
pub struct DeleteBookmarksResponse {
    pub deleted: u64,
}

/// DELETE /bookmarks?title=... - Delete the caller's bookmarks with an exact title.
///
/// Zero matches is a successful outcome.
pub async fn delete_bookmark(
    auth: AuthenticatedAccount,
    State(state): State<AppState>,
    params: Result<Query<DeleteBookmarkParams>, QueryRejection>,
) -> ApiResult<Json<DeleteBookmarksResponse>> {
    let Query(params) = params.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let title = params.title.trim();
    if title.is_empty() {
        return Err(ApiError::BadRequest("title must not be empty".to_string()));
    }

    let deleted = state
        .metadata
        .delete_bookmarks_by_title(auth.id(), title)
        .await?;

    tracing::debug!(account_id = auth.id(), deleted = deleted, "Bookmarks deleted by title");

    Ok(Json(DeleteBookmarksResponse { deleted }))
}
