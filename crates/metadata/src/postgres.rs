//! PostgreSQL-based metadata store implementation.

use crate::error::{MetadataError, MetadataResult};
use crate::models::*;
use crate::repos::{AccountRepo, BookmarkRepo};
use crate::store::MetadataStore;
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode as SqlxPgSslMode};
use sqlx::{Pool, Postgres};
use stash_core::config::PgSslMode;
use stash_core::hash_api_key;
use std::str::FromStr;

/// PostgreSQL schema (embedded).
const POSTGRES_SCHEMA: &str = include_str!("postgres_schema.sql");

fn postgres_schema_statements(schema: &str) -> Vec<&str> {
    schema
        .split(';')
        .filter_map(|statement| {
            let trimmed = statement.trim();
            if trimmed.is_empty() {
                return None;
            }
            let has_sql = trimmed.lines().any(|line| {
                let line = line.trim();
                !line.is_empty() && !line.starts_with("--")
            });
            has_sql.then_some(trimmed)
        })
        .collect()
}

/// PostgreSQL-based metadata store.
pub struct PostgresStore {
    pool: Pool<Postgres>,
}

impl PostgresStore {
    /// Create a new PostgreSQL store from a connection URL.
    pub async fn from_url(
        url: &str,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> MetadataResult<Self> {
        let opts = PgConnectOptions::from_str(url)?;
        Self::connect(opts, max_connections, statement_timeout_ms).await
    }

    /// Create a new PostgreSQL store from individual connection parameters.
    ///
    /// Lets the password come from its own environment variable instead of a URL.
    #[allow(clippy::too_many_arguments)]
    pub async fn from_params(
        host: &str,
        port: u16,
        username: Option<&str>,
        password: Option<&str>,
        database: &str,
        ssl_mode: Option<PgSslMode>,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> MetadataResult<Self> {
        let mut opts = PgConnectOptions::new()
            .host(host)
            .port(port)
            .database(database);

        if let Some(user) = username {
            opts = opts.username(user);
        }

        if let Some(pass) = password {
            opts = opts.password(pass);
        }

        if let Some(mode) = ssl_mode {
            let sqlx_mode = match mode {
                PgSslMode::Disable => SqlxPgSslMode::Disable,
                PgSslMode::Prefer => SqlxPgSslMode::Prefer,
                PgSslMode::Require => SqlxPgSslMode::Require,
            };
            opts = opts.ssl_mode(sqlx_mode);
        }

        // Log connection info without password
        tracing::info!(
            host = host,
            port = port,
            database = database,
            username = username.unwrap_or("<none>"),
            ssl_mode = ?ssl_mode,
            "Connecting to PostgreSQL with individual parameters"
        );

        Self::connect(opts, max_connections, statement_timeout_ms).await
    }

    async fn connect(
        mut opts: PgConnectOptions,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> MetadataResult<Self> {
        if let Some(timeout_ms) = statement_timeout_ms {
            opts = opts.options([("statement_timeout", format!("{}ms", timeout_ms))]);
            tracing::info!("PostgreSQL statement_timeout set to {}ms", timeout_ms);
        }

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;

        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }

    /// Move keys from the legacy plaintext `api_key` column into
    /// `api_key_hash` and clear the plaintext.
    async fn adopt_plaintext_keys(&self) -> MetadataResult<()> {
        let mut tx = self.pool.begin().await?;

        let legacy: Vec<(i64, String)> = sqlx::query_as(
            "SELECT id, api_key FROM users WHERE api_key IS NOT NULL AND api_key_hash IS NULL FOR UPDATE",
        )
        .fetch_all(&mut *tx)
        .await?;

        for (id, key) in &legacy {
            sqlx::query("UPDATE users SET api_key_hash = $1, api_key = NULL WHERE id = $2")
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
impl MetadataStore for PostgresStore {
    async fn migrate(&self) -> MetadataResult<()> {
        for statement in postgres_schema_statements(POSTGRES_SCHEMA) {
            sqlx::query(statement).execute(&self.pool).await?;
        }

        let has_plaintext_keys: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM information_schema.columns
                WHERE table_schema = current_schema()
                  AND table_name = 'users'
                  AND column_name = 'api_key'
            )
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

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

#[async_trait]
impl AccountRepo for PostgresStore {
    async fn create_account(
        &self,
        name: &str,
        email: &str,
        api_key_hash: &str,
    ) -> MetadataResult<AccountRow> {
        sqlx::query_as::<_, AccountRow>(
            r#"
            INSERT INTO users (name, email, api_key_hash)
            VALUES ($1, $2, $3)
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
            "SELECT id, name, email, api_key_hash, created_at FROM users WHERE id = $1",
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn get_account_by_email(&self, email: &str) -> MetadataResult<Option<AccountRow>> {
        let row = sqlx::query_as::<_, AccountRow>(
            "SELECT id, name, email, api_key_hash, created_at FROM users WHERE lower(email) = lower($1)",
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
            "SELECT id, name, email, api_key_hash, created_at FROM users WHERE api_key_hash = $1",
        )
        .bind(api_key_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn set_api_key_hash(&self, account_id: i64, api_key_hash: &str) -> MetadataResult<()> {
        let result = sqlx::query("UPDATE users SET api_key_hash = $1 WHERE id = $2")
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
        let mut tx = self.pool.begin().await?;

        // Lock the account row so a concurrent bookmark insert cannot slip in
        // between the two deletes.
        let exists: Option<i64> =
            sqlx::query_scalar("SELECT id FROM users WHERE id = $1 FOR UPDATE")
                .bind(account_id)
                .fetch_optional(&mut *tx)
                .await?;

        if exists.is_none() {
            return Err(MetadataError::NotFound(format!(
                "account {account_id} not found"
            )));
        }

        let bookmarks = sqlx::query("DELETE FROM bookmarks WHERE user_id = $1")
            .bind(account_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(account_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(CascadeDeleteStats {
            bookmarks_deleted: bookmarks.rows_affected(),
        })
    }
}

#[async_trait]
impl BookmarkRepo for PostgresStore {
    async fn create_bookmark(
        &self,
        account_id: i64,
        title: &str,
        url: &str,
    ) -> MetadataResult<BookmarkRow> {
        sqlx::query_as::<_, BookmarkRow>(
            r#"
            INSERT INTO bookmarks (user_id, title, url)
            VALUES ($1, $2, $3)
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
            "SELECT id, user_id, title, url, created_at FROM bookmarks WHERE user_id = $1 ORDER BY id",
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn delete_bookmarks_by_title(&self, account_id: i64, title: &str) -> MetadataResult<u64> {
        let result = sqlx::query("DELETE FROM bookmarks WHERE user_id = $1 AND title = $2")
            .bind(account_id)
            .bind(title)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn count_bookmarks(&self, account_id: i64) -> MetadataResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bookmarks WHERE user_id = $1")
            .bind(account_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_statements_skip_comments_and_blanks() {
        let statements = postgres_schema_statements(POSTGRES_SCHEMA);
        assert_eq!(statements.len(), 7);
        assert!(statements[0].contains("CREATE TABLE IF NOT EXISTS users"));
        assert!(
            statements
                .iter()
                .all(|s| !s.lines().all(|l| l.trim().starts_with("--")))
        );
    }
}
