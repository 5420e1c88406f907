//! Database models mapping to the metadata schema.

use sqlx::FromRow;
use time::OffsetDateTime;

/// Account record (`users` table).
#[derive(Debug, Clone, FromRow)]
pub struct AccountRow {
    pub id: i64,
    pub name: String,
    pub email: String,
    /// SHA-256 of the active API key; `None` for accounts that predate keys.
    pub api_key_hash: Option<String>,
    pub created_at: OffsetDateTime,
}

/// Bookmark record (`bookmarks` table).
#[derive(Debug, Clone, FromRow)]
pub struct BookmarkRow {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub url: String,
    /// Assigned by the database at insert time, truncated to the store's
    /// clock precision (milliseconds on SQLite, microseconds on PostgreSQL).
    /// Never earlier than the caller's clock read at that precision before
    /// the insert.
    pub created_at: OffsetDateTime,
}

/// Statistics from an account deletion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CascadeDeleteStats {
    pub bookmarks_deleted: u64,
}
