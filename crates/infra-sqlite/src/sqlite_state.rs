// SQLite PersistentState Implementation

use async_trait::async_trait;
use sqlx::SqlitePool;
use sysdebug_core::error::{StateError, StateResult};
use sysdebug_core::port::persistent_state::buckets_to_json;
use sysdebug_core::port::{ForEachFn, PersistentState};
use tracing::debug;

use crate::{create_pool, run_migrations};

type Entry = (Vec<u8>, Vec<u8>, Vec<u8>);

/// Flatten a sqlx error into StateError::Database, keeping the SQLite result code
pub(crate) fn map_sqlx_error(err: sqlx::Error) -> StateError {
    match err {
        sqlx::Error::Database(db_err) => match db_err.code() {
            Some(code) => StateError::Database(format!("sqlite [{}]: {}", code, db_err.message())),
            None => StateError::Database(format!("sqlite: {}", db_err.message())),
        },
        sqlx::Error::PoolClosed => StateError::Database("database is closed".to_string()),
        other => StateError::Database(other.to_string()),
    }
}

/// PersistentState stored in the `entries` table
pub struct SqliteState {
    pool: SqlitePool,
}

impl SqliteState {
    /// Wrap a pool whose schema is already migrated
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to `database_url` and apply pending migrations
    ///
    /// # Example
    /// ```ignore
    /// let state = SqliteState::open("sqlite://state.db").await?;
    /// ```
    pub async fn open(database_url: &str) -> StateResult<Self> {
        let pool = create_pool(database_url).await?;
        run_migrations(&pool).await?;
        Ok(Self::new(pool))
    }

    async fn all_entries(&self) -> StateResult<Vec<Entry>> {
        sqlx::query_as::<_, Entry>(
            "SELECT bucket, key, value FROM entries ORDER BY bucket, key",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)
    }
}

#[async_trait]
impl PersistentState for SqliteState {
    async fn close(&self) -> StateResult<()> {
        self.pool.close().await;
        debug!("SQLite pool closed");
        Ok(())
    }

    async fn copy_to(&self, dest: &dyn PersistentState) -> StateResult<()> {
        for (bucket, key, value) in self.all_entries().await? {
            dest.set(&bucket, &key, &value).await?;
        }
        Ok(())
    }

    async fn data(&self) -> StateResult<serde_json::Value> {
        let entries = self.all_entries().await?;
        Ok(buckets_to_json(entries.iter().map(|(bucket, key, value)| {
            (bucket.as_slice(), key.as_slice(), value.as_slice())
        })))
    }

    async fn delete(&self, bucket: &[u8], key: &[u8]) -> StateResult<()> {
        sqlx::query("DELETE FROM entries WHERE bucket = ? AND key = ?")
            .bind(bucket)
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &[u8]) -> StateResult<()> {
        sqlx::query("DELETE FROM entries WHERE bucket = ?")
            .bind(bucket)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn for_each(&self, bucket: &[u8], f: &mut ForEachFn<'_>) -> StateResult<()> {
        // BLOB comparison is memcmp, so keys come back in ascending byte order
        let rows = sqlx::query_as::<_, (Vec<u8>, Vec<u8>)>(
            "SELECT key, value FROM entries WHERE bucket = ? ORDER BY key",
        )
        .bind(bucket)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        for (key, value) in rows {
            f(&key, &value)?;
        }
        Ok(())
    }

    async fn get(&self, bucket: &[u8], key: &[u8]) -> StateResult<Option<Vec<u8>>> {
        sqlx::query_scalar::<_, Vec<u8>>(
            "SELECT value FROM entries WHERE bucket = ? AND key = ?",
        )
        .bind(bucket)
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)
    }

    async fn set(&self, bucket: &[u8], key: &[u8], value: &[u8]) -> StateResult<()> {
        sqlx::query(
            r#"
            INSERT INTO entries (bucket, key, value) VALUES (?, ?, ?)
            ON CONFLICT (bucket, key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(bucket)
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }
}
