//! Metadata store error types.

use thiserror::Error;

/// Metadata store operation errors.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("email already in use")]
    EmailTaken,

    #[error("invalid API key")]
    InvalidApiKey,

    #[error("key generation failed: {0}")]
    KeyGeneration(#[from] stash_core::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("could not assign API key to account {account_id}: {source}")]
    Backfill {
        account_id: i64,
        #[source]
        source: Box<MetadataError>,
    },
}

impl MetadataError {
    /// Map an insert into `users` to `EmailTaken` when the email constraint fired.
    pub(crate) fn from_account_insert(err: sqlx::Error) -> Self {
        if is_unique_violation_on(
            &err,
            &["users_email_key", "users_email_lower_key", "users.email"],
        ) {
            Self::EmailTaken
        } else {
            Self::Database(err)
        }
    }

    /// Map an insert into `bookmarks` to `NotFound` when the owner is gone.
    pub(crate) fn from_bookmark_insert(err: sqlx::Error, user_id: i64) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                Self::NotFound(format!("account {user_id} not found"))
            }
            _ => Self::Database(err),
        }
    }
}

/// True if `err` is a unique violation naming one of `markers`.
///
/// PostgreSQL reports the constraint name; SQLite only reports
/// "UNIQUE constraint failed: table.column" in the message.
fn is_unique_violation_on(err: &sqlx::Error, markers: &[&str]) -> bool {
    let sqlx::Error::Database(db_err) = err else {
        return false;
    };
    if !db_err.is_unique_violation() {
        return false;
    }
    let constraint = db_err.constraint().unwrap_or_default();
    let message = db_err.message();
    markers
        .iter()
        .any(|marker| constraint == *marker || message.contains(marker))
}

/// Result type for metadata operations.
pub type MetadataResult<T> = std::result::Result<T, MetadataError>;
