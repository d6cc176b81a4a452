// Sysdebug Infrastructure - SQLite Adapter
// Implements: PersistentState (SqliteState)

mod connection;
mod migration;
mod sqlite_state;

pub use connection::create_pool;
pub use migration::{run_migrations, SCHEMA_VERSION};
pub use sqlite_state::SqliteState;
