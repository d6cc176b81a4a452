// SQLite Connection Pool Setup

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;
use sysdebug_core::error::{StateError, StateResult};

use crate::sqlite_state::map_sqlx_error;

/// Create SQLite connection pool with WAL mode
///
/// An in-memory database lives only as long as its connection, so
/// `sqlite::memory:` gets a single connection that is never recycled.
pub async fn create_pool(database_url: &str) -> StateResult<SqlitePool> {
    let in_memory = database_url.contains(":memory:");

    let mut options = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| StateError::Database(format!("Invalid database url: {}", e)))?
        .busy_timeout(Duration::from_secs(5))
        .create_if_missing(true);
    if !in_memory {
        options = options.journal_mode(SqliteJournalMode::Wal);
    }

    let mut pool_options = SqlitePoolOptions::new().max_connections(if in_memory { 1 } else { 4 });
    if in_memory {
        pool_options = pool_options.idle_timeout(None).max_lifetime(None);
    }

    pool_options
        .connect_with(options)
        .await
        .map_err(map_sqlx_error)
}
