//! Startup tasks that run before the listener is bound.

use stash_core::config::BackfillConfig;
use stash_metadata::MetadataStore;
use stash_metadata::accounts::{self, BackfillReport};

/// Give every keyless account an API key.
///
/// A failed sweep is logged and startup continues. Accounts still without a
/// key cannot authenticate; the next start retries them.
pub async fn backfill_api_keys(
    metadata: &dyn MetadataStore,
    config: &BackfillConfig,
) -> Option<BackfillReport> {
    if !config.enabled {
        tracing::debug!("API key backfill disabled");
        return None;
    }

    match accounts::backfill_missing_api_keys(metadata).await {
        Ok(report) if report.accounts_updated > 0 => {
            tracing::info!(
                accounts_updated = report.accounts_updated,
                "Assigned API keys to existing accounts"
            );
            Some(report)
        }
        Ok(report) => {
            tracing::debug!("All accounts already have API keys");
            Some(report)
        }
        Err(e) => {
            tracing::warn!(error = %e, "API key backfill failed");
            None
        }
    }
}
