//! Account repository.

use crate::error::MetadataResult;
use crate::models::{AccountRow, CascadeDeleteStats};
use async_trait::async_trait;

/// Repository for account operations.
#[async_trait]
pub trait AccountRepo: Send + Sync {
    /// Insert an account. Fails with `EmailTaken` if the email is already used.
    async fn create_account(
        &self,
        name: &str,
        email: &str,
        api_key_hash: &str,
    ) -> MetadataResult<AccountRow>;

    /// Get an account by ID.
    async fn get_account(&self, account_id: i64) -> MetadataResult<Option<AccountRow>>;

    /// Get an account by email.
    async fn get_account_by_email(&self, email: &str) -> MetadataResult<Option<AccountRow>>;

    /// Get an account by the hash of its API key.
    async fn get_account_by_api_key_hash(
        &self,
        api_key_hash: &str,
    ) -> MetadataResult<Option<AccountRow>>;

    /// Overwrite the stored key hash. Fails with `NotFound` if the account is gone.
    async fn set_api_key_hash(&self, account_id: i64, api_key_hash: &str) -> MetadataResult<()>;

    /// IDs of accounts without an API key, in ID order.
    async fn list_accounts_missing_api_key(&self) -> MetadataResult<Vec<i64>>;

    /// Count all accounts.
    async fn count_accounts(&self) -> MetadataResult<u64>;

    /// Delete an account and all of its bookmarks in one transaction.
    /// Fails with `NotFound` (and deletes nothing) if the account does not exist.
    async fn delete_account_with_bookmarks(
        &self,
        account_id: i64,
    ) -> MetadataResult<CascadeDeleteStats>;
}
