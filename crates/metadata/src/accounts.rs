//! Account operations that involve API keys.
//!
//! Every function takes the store handle explicitly. Plaintext keys only
//! leave these functions on creation and rotation; the store sees hashes.

use crate::error::{MetadataError, MetadataResult};
use crate::models::AccountRow;
use crate::store::MetadataStore;
use stash_core::{ApiKey, hash_api_key};

/// A freshly created account together with its plaintext key.
#[derive(Debug)]
pub struct IssuedAccount {
    pub account: AccountRow,
    pub api_key: ApiKey,
}

/// Outcome of a key backfill sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackfillReport {
    pub accounts_updated: usize,
}

/// Create an account with a newly issued API key.
///
/// Fails with `EmailTaken` if another account already uses `email`.
pub async fn create_account(
    store: &dyn MetadataStore,
    name: &str,
    email: &str,
) -> MetadataResult<IssuedAccount> {
    let api_key = ApiKey::generate()?;
    let account = store.create_account(name, email, &api_key.hash()).await?;
    tracing::info!(account_id = account.id, "Account created");
    Ok(IssuedAccount { account, api_key })
}

/// Get an account by ID, or `NotFound`.
pub async fn get_account(store: &dyn MetadataStore, account_id: i64) -> MetadataResult<AccountRow> {
    store
        .get_account(account_id)
        .await?
        .ok_or_else(|| MetadataError::NotFound(format!("account {account_id} not found")))
}

/// Get an account by email, or `NotFound`.
pub async fn lookup_by_email(store: &dyn MetadataStore, email: &str) -> MetadataResult<AccountRow> {
    store
        .get_account_by_email(email)
        .await?
        .ok_or_else(|| MetadataError::NotFound("no account with that email".to_string()))
}

/// Resolve a presented API key to its account, or `InvalidApiKey`.
pub async fn resolve_api_key(
    store: &dyn MetadataStore,
    presented: &str,
) -> MetadataResult<AccountRow> {
    store
        .get_account_by_api_key_hash(&hash_api_key(presented))
        .await?
        .ok_or(MetadataError::InvalidApiKey)
}

/// Issue a new key for an account, replacing the old one immediately.
pub async fn rotate_api_key(store: &dyn MetadataStore, account_id: i64) -> MetadataResult<ApiKey> {
    let api_key = ApiKey::generate()?;
    store.set_api_key_hash(account_id, &api_key.hash()).await?;
    tracing::info!(account_id = account_id, "API key rotated");
    Ok(api_key)
}

/// Assign a key to every account that has none.
///
/// Stops at the first failure with `Backfill { account_id, .. }`. Accounts
/// updated before the failure keep their new keys.
pub async fn backfill_missing_api_keys(store: &dyn MetadataStore) -> MetadataResult<BackfillReport> {
    backfill_with(store, ApiKey::generate).await
}

pub(crate) async fn backfill_with<F>(
    store: &dyn MetadataStore,
    mut generate: F,
) -> MetadataResult<BackfillReport>
where
    F: FnMut() -> stash_core::Result<ApiKey>,
{
    let account_ids = store.list_accounts_missing_api_key().await?;
    let mut report = BackfillReport::default();

    for account_id in account_ids {
        let wrap = |source: MetadataError| MetadataError::Backfill {
            account_id,
            source: Box::new(source),
        };

        let api_key = generate().map_err(|e| wrap(e.into()))?;
        store
            .set_api_key_hash(account_id, &api_key.hash())
            .await
            .map_err(wrap)?;

        tracing::debug!(account_id = account_id, "Assigned API key to legacy account");
        report.accounts_updated += 1;
    }

    Ok(report)
}
