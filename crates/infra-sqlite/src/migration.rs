// Schema bootstrap for the entries store

use sqlx::SqlitePool;
use sysdebug_core::error::{StateError, StateResult};
use tracing::{debug, info};

use crate::sqlite_state::map_sqlx_error;

/// Version written to `PRAGMA user_version` once the schema exists
pub const SCHEMA_VERSION: i64 = 1;

const SCHEMA: &str = include_str!("../migrations/schema.sql");

/// Create the schema on an empty database
///
/// Runs in one transaction: the tables and the version stamp land together.
///
/// # Errors
/// - StateError::Database if the file was written by a newer schema version
pub async fn run_migrations(pool: &SqlitePool) -> StateResult<()> {
    let mut tx = pool.begin().await.map_err(map_sqlx_error)?;

    let version: i64 = sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

    if version > SCHEMA_VERSION {
        return Err(StateError::Database(format!(
            "schema version {} is newer than supported version {}",
            version, SCHEMA_VERSION
        )));
    }
    if version == SCHEMA_VERSION {
        debug!(version, "schema up to date");
        return Ok(());
    }

    sqlx::raw_sql(SCHEMA)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;
    let stamp = format!("PRAGMA user_version = {}", SCHEMA_VERSION);
    sqlx::query(&stamp)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;
    tx.commit().await.map_err(map_sqlx_error)?;

    info!(from = version, to = SCHEMA_VERSION, "schema created");
    Ok(())
}
