//! Metadata store trait and the SQLite implementation.

use crate::error::{MetadataError, MetadataResult};
use crate::repos::{AccountRepo, BookmarkRepo};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use stash_core::hash_api_key;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Combined metadata store trait.
#[async_trait]
pub trait MetadataStore: AccountRepo + BookmarkRepo + Send + Sync {
    /// Create the schema if needed and bring older layouts up to date.
    async fn migrate(&self) -> MetadataResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> MetadataResult<()>;
}

/// SQLite-based metadata store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open (creating if missing) a SQLite database at `path`.
    ///
    /// `":memory:"` opens a private in-memory database.
    pub async fn new(path: impl AsRef<Path>, busy_timeout_secs: u64) -> MetadataResult<Self> {
        let path = path.as_ref();

        let opts = if path == Path::new(":memory:") {
            SqliteConnectOptions::from_str("sqlite::memory:")?
        } else {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        };

        let opts = opts
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(busy_timeout_secs));

        let pool = SqlitePoolOptions::new()
            // One connection: SQLite serializes writers anyway, and an
            // in-memory database only lives as long as its connection.
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;

        tracing::debug!(path = %path.display(), "SQLite metadata store opened");

        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Move keys from the legacy plaintext `api_key` column into
    /// `api_key_hash` and clear the plaintext. Existing holders keep working.
    async fn adopt_plaintext_keys(&self) -> MetadataResult<()> {
        let mut tx = self.pool.begin().await?;

        let legacy: Vec<(i64, String)> = sqlx::query_as(
            "SELECT id, api_key FROM users WHERE api_key IS NOT NULL AND api_key_hash IS NULL",
        )
        .fetch_all(&mut *tx)
        .await?;

        for (id, key) in &legacy {
            sqlx::query("UPDATE users SET api_key_hash = ?, api_key = NULL WHERE id = ?")
                .bind(hash_api_key(key))
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        if !legacy.is_empty() {
            tracing::info!(accounts = legacy.len(), "Hashed legacy plaintext API keys");
        }
        Ok(())
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn migrate(&self) -> MetadataResult<()> {
        // Databases from before key-based auth have a users table of
        // (id, name, email[, api_key]). SQLite has no ADD COLUMN IF NOT
        // EXISTS, so check first.
        let users_exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='users')",
        )
        .fetch_one(&self.pool)
        .await?;

        let mut has_plaintext_keys = false;

        if users_exists {
            let columns: Vec<String> =
                sqlx::query_scalar("SELECT name FROM pragma_table_info('users')")
                    .fetch_all(&self.pool)
                    .await?;
            let has = |column: &str| columns.iter().any(|name| name == column);

            if !has("api_key_hash") {
                tracing::info!("Adding api_key_hash column to legacy users table");
                sqlx::query("ALTER TABLE users ADD COLUMN api_key_hash TEXT")
                    .execute(&self.pool)
                    .await?;
            }

            if !has("created_at") {
                // ADD COLUMN only takes constant defaults, so inserts set
                // created_at explicitly and existing rows are stamped here.
                tracing::info!("Adding created_at column to legacy users table");
                sqlx::query("ALTER TABLE users ADD COLUMN created_at TEXT")
                    .execute(&self.pool)
                    .await?;
                sqlx::query(
                    "UPDATE users SET created_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') WHERE created_at IS NULL",
                )
                .execute(&self.pool)
                .await?;
            }

            has_plaintext_keys = has("api_key");
        }

        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;

        if has_plaintext_keys {
            self.adopt_plaintext_keys().await?;
        }

        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

mod sqlite_impl {
    use super::*;
    use crate::models::*;

    #[async_trait]
    impl AccountRepo for SqliteStore {
        async fn create_account(
            &self,
            name: &str,
            email: &str,
            api_key_hash: &str,
        ) -> MetadataResult<AccountRow> {
            // The UNIQUE constraint on email is the only uniqueness check.
            sqlx::query_as::<_, AccountRow>(
                r#"
                INSERT INTO users (name, email, api_key_hash, created_at)
                VALUES (?, ?, ?, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
                RETURNING id, name, email, api_key_hash, created_at
                "#,
            )
            .bind(name)
            .bind(email)
            .bind(api_key_hash)
            .fetch_one(&self.pool)
            .await
            .map_err(MetadataError::from_account_insert)
        }

        async fn get_account(&self, account_id: i64) -> MetadataResult<Option<AccountRow>> {
            let row = sqlx::query_as::<_, AccountRow>(
                "SELECT id, name, email, api_key_hash, created_at FROM users WHERE id = ?",
            )
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn get_account_by_email(&self, email: &str) -> MetadataResult<Option<AccountRow>> {
            let row = sqlx::query_as::<_, AccountRow>(
                "SELECT id, name, email, api_key_hash, created_at FROM users WHERE email = ? COLLATE NOCASE",
            )
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn get_account_by_api_key_hash(
            &self,
            api_key_hash: &str,
        ) -> MetadataResult<Option<AccountRow>> {
            let row = sqlx::query_as::<_, AccountRow>(
                "SELECT id, name, email, api_key_hash, created_at FROM users WHERE api_key_hash = ?",
            )
            .bind(api_key_hash)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn set_api_key_hash(
            &self,
            account_id: i64,
            api_key_hash: &str,
        ) -> MetadataResult<()> {
            let result = sqlx::query("UPDATE users SET api_key_hash = ? WHERE id = ?")
                .bind(api_key_hash)
                .bind(account_id)
                .execute(&self.pool)
                .await?;

            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!(
                    "account {account_id} not found"
                )));
            }
            Ok(())
        }

        async fn list_accounts_missing_api_key(&self) -> MetadataResult<Vec<i64>> {
            let ids = sqlx::query_scalar::<_, i64>(
                "SELECT id FROM users WHERE api_key_hash IS NULL ORDER BY id",
            )
            .fetch_all(&self.pool)
            .await?;
            Ok(ids)
        }

        async fn count_accounts(&self) -> MetadataResult<u64> {
            let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
                .fetch_one(&self.pool)
                .await?;
            Ok(count as u64)
        }

        async fn delete_account_with_bookmarks(
            &self,
            account_id: i64,
        ) -> MetadataResult<CascadeDeleteStats> {
            // Dropping `tx` without commit rolls back every statement below.
            let mut tx = self.pool.begin().await?;

            let bookmarks = sqlx::query("DELETE FROM bookmarks WHERE user_id = ?")
                .bind(account_id)
                .execute(&mut *tx)
                .await?;

            let account = sqlx::query("DELETE FROM users WHERE id = ?")
                .bind(account_id)
                .execute(&mut *tx)
                .await?;

            if account.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!(
                    "account {account_id} not found"
                )));
            }

            tx.commit().await?;

            Ok(CascadeDeleteStats {
                bookmarks_deleted: bookmarks.rows_affected(),
            })
        }
    }

    #[async_trait]
    impl BookmarkRepo for SqliteStore {
        async fn create_bookmark(
            &self,
            account_id: i64,
            title: &str,
            url: &str,
        ) -> MetadataResult<BookmarkRow> {
            // RETURNING reads back the store-assigned id and created_at in the
            // same statement; a missing row is an error, never a partial result.
            sqlx::query_as::<_, BookmarkRow>(
                r#"
                INSERT INTO bookmarks (user_id, title, url)
                VALUES (?, ?, ?)
                RETURNING id, user_id, title, url, created_at
                "#,
            )
            .bind(account_id)
            .bind(title)
            .bind(url)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| MetadataError::from_bookmark_insert(e, account_id))
        }

        async fn list_bookmarks(&self, account_id: i64) -> MetadataResult<Vec<BookmarkRow>> {
            let rows = sqlx::query_as::<_, BookmarkRow>(
                "SELECT id, user_id, title, url, created_at FROM bookmarks WHERE user_id = ? ORDER BY id",
            )
            .bind(account_id)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn delete_bookmarks_by_title(
            &self,
            account_id: i64,
            title: &str,
        ) -> MetadataResult<u64> {
            let result = sqlx::query("DELETE FROM bookmarks WHERE user_id = ? AND title = ?")
                .bind(account_id)
                .bind(title)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected())
        }

        async fn count_bookmarks(&self, account_id: i64) -> MetadataResult<u64> {
            let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bookmarks WHERE user_id = ?")
                .bind(account_id)
                .fetch_one(&self.pool)
                .await?;
            Ok(count as u64)
        }
    }
}

/// SQL schema for SQLite.
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    api_key_hash TEXT,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_users_api_key_hash ON users(api_key_hash);

-- Emails compare case-insensitively.
CREATE UNIQUE INDEX IF NOT EXISTS idx_users_email_nocase ON users(email COLLATE NOCASE);

CREATE TABLE IF NOT EXISTS bookmarks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id),
    title TEXT NOT NULL,
    url TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE INDEX IF NOT EXISTS idx_bookmarks_user_id ON bookmarks(user_id);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn creates_parent_directories() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("nested").join("stash.db");

        let store = SqliteStore::new(&db_path, 5).await.unwrap();
        store.health_check().await.unwrap();
        assert!(db_path.exists());
    }

    #[tokio::test]
    async fn migrate_is_idempotent() {
        let store = SqliteStore::new(":memory:", 5).await.unwrap();
        store.migrate().await.unwrap();
        store.migrate().await.unwrap();
        assert_eq!(store.count_accounts().await.unwrap(), 0);
    }

    /// Create a database whose users table has the pre-key layout
    /// `(id, name, email, api_key)`.
    async fn legacy_database(dir: &Path) -> std::path::PathBuf {
        let db_path = dir.join("legacy.db");
        let opts = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await
            .unwrap();
        sqlx::query(
            r#"
            CREATE TABLE users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                api_key TEXT UNIQUE
            );
            INSERT INTO users (name, email, api_key) VALUES ('Ada', 'ada@example.com', 'ada-legacy-key');
            INSERT INTO users (name, email) VALUES ('Grace', 'grace@example.com');
            "#,
        )
        .execute(&pool)
        .await
        .unwrap();
        pool.close().await;
        db_path
    }

    #[tokio::test]
    async fn legacy_users_table_is_brought_forward() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = legacy_database(temp_dir.path()).await;

        let store = SqliteStore::new(&db_path, 5).await.unwrap();

        // Only the keyless account is left for the backfill.
        let grace = store
            .get_account_by_email("grace@example.com")
            .await
            .unwrap()
            .unwrap();
        assert!(grace.api_key_hash.is_none());
        assert_eq!(
            store.list_accounts_missing_api_key().await.unwrap(),
            vec![grace.id]
        );

        // The existing plaintext key keeps working and is no longer stored.
        let ada = crate::accounts::resolve_api_key(&store, "ada-legacy-key")
            .await
            .unwrap();
        assert_eq!(ada.email, "ada@example.com");
        let plaintext: Option<String> = sqlx::query_scalar("SELECT api_key FROM users WHERE id = ?")
            .bind(ada.id)
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert!(plaintext.is_none());

        let report = crate::accounts::backfill_missing_api_keys(&store)
            .await
            .unwrap();
        assert_eq!(report.accounts_updated, 1);

        let issued = crate::accounts::create_account(&store, "Linus", "linus@example.com")
            .await
            .unwrap();
        let linus = crate::accounts::resolve_api_key(&store, issued.api_key.expose())
            .await
            .unwrap();
        assert_eq!(linus.id, issued.account.id);
        assert!(linus.created_at >= grace.created_at);

        // Reopening finds nothing left to migrate.
        store.pool().close().await;
        let store = SqliteStore::new(&db_path, 5).await.unwrap();
        assert_eq!(store.count_accounts().await.unwrap(), 3);
        assert!(store.list_accounts_missing_api_key().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn email_uniqueness_ignores_case() {
        let store = SqliteStore::new(":memory:", 5).await.unwrap();
        store
            .create_account("Ada", "ada@example.com", "hash-1")
            .await
            .unwrap();

        let err = store
            .create_account("Ada", "ADA@Example.com", "hash-2")
            .await
            .unwrap_err();
        assert!(matches!(err, MetadataError::EmailTaken), "got {err:?}");

        let found = store
            .get_account_by_email("Ada@EXAMPLE.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.email, "ada@example.com");
        assert_eq!(store.count_accounts().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn foreign_keys_are_enforced() {
        let store = SqliteStore::new(":memory:", 5).await.unwrap();
        let err = store
            .create_bookmark(999, "Orphan", "https://example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, MetadataError::NotFound(_)));
    }
}
