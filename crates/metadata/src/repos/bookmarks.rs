//! Bookmark repository.

use crate::error::MetadataResult;
use crate::models::BookmarkRow;
use async_trait::async_trait;

/// Repository for bookmark operations.
#[async_trait]
pub trait BookmarkRepo: Send + Sync {
    /// Insert a bookmark and return it with its ID and creation time.
    async fn create_bookmark(
        &self,
        account_id: i64,
        title: &str,
        url: &str,
    ) -> MetadataResult<BookmarkRow>;

    /// List an account's bookmarks in insertion order.
    async fn list_bookmarks(&self, account_id: i64) -> MetadataResult<Vec<BookmarkRow>>;

    /// Delete an account's bookmarks whose title matches exactly.
    /// Returns the number removed; zero means nothing matched.
    async fn delete_bookmarks_by_title(&self, account_id: i64, title: &str)
    -> MetadataResult<u64>;

    /// Count bookmarks owned by an account.
    async fn count_bookmarks(&self, account_id: i64) -> MetadataResult<u64>;
}
