//! Account endpoints: registration, identity, key rotation and deletion.

use crate::auth::AuthenticatedAccount;
use crate::error::{ApiError, ApiResult};
use crate::handlers::common::{format_timestamp, read_json_body};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use stash_core::NewAccount;
use stash_metadata::accounts;
use stash_metadata::models::AccountRow;
use stash_metadata::repos::AccountRepo;

/// Account as returned to clients. The key is present only when just issued.
#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl AccountResponse {
    fn from_row(row: AccountRow, api_key: Option<String>) -> ApiResult<Self> {
        Ok(Self {
            id: row.id,
            name: row.name,
            email: row.email,
            created_at: format_timestamp(row.created_at)?,
            api_key,
        })
    }
}

/// POST /users - Register an account and issue its first API key.
pub async fn create_user(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<(StatusCode, Json<AccountResponse>)> {
    let body: NewAccount = read_json_body(req, state.config.server.max_body_bytes).await?;
    let body = body.validate()?;

    let issued = accounts::create_account(state.metadata.as_ref(), &body.name, &body.email).await?;
    let response = AccountResponse::from_row(issued.account, Some(issued.api_key.into_inner()))?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /auth/whoami - Return the caller's account.
pub async fn whoami(auth: AuthenticatedAccount) -> ApiResult<Json<AccountResponse>> {
    Ok(Json(AccountResponse::from_row(auth.account, None)?))
}

/// Response for a key rotation.
#[derive(Debug, Serialize)]
pub struct RegenerateKeyResponse {
    pub api_key: String,
    pub message: &'static str,
}

/// POST /auth/regenerate-key - Replace the caller's API key.
///
/// The presented key stops working as soon as this returns.
pub async fn regenerate_api_key(
    auth: AuthenticatedAccount,
    State(state): State<AppState>,
) -> ApiResult<Json<RegenerateKeyResponse>> {
    let api_key = accounts::rotate_api_key(state.metadata.as_ref(), auth.id()).await?;

    Ok(Json(RegenerateKeyResponse {
        api_key: api_key.into_inner(),
        message: "API key regenerated successfully",
    }))
}

/// Request to delete the caller's account.
#[derive(Debug, Deserialize)]
pub struct DeleteAccountRequest {
    /// Must repeat the account's email.
    pub confirm_email: String,
}

/// Response for an account deletion.
#[derive(Debug, Serialize)]
pub struct DeleteAccountResponse {
    pub deleted: bool,
    pub bookmarks_deleted: u64,
}

/// DELETE /account - Remove the caller's account and all of its bookmarks.
pub async fn delete_account(
    auth: AuthenticatedAccount,
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<Json<DeleteAccountResponse>> {
    let body: DeleteAccountRequest =
        read_json_body(req, state.config.server.max_body_bytes).await?;

    if !body
        .confirm_email
        .trim()
        .eq_ignore_ascii_case(&auth.account.email)
    {
        return Err(ApiError::BadRequest(
            "confirm_email does not match the account email".to_string(),
        ));
    }

    let stats = state
        .metadata
        .delete_account_with_bookmarks(auth.id())
        .await?;

    tracing::info!(
        account_id = auth.id(),
        bookmarks_deleted = stats.bookmarks_deleted,
        "Account deleted"
    );

    Ok(Json(DeleteAccountResponse {
        deleted: true,
        bookmarks_deleted: stats.bookmarks_deleted,
    }))
}
