// Port Layer - Interfaces for external capabilities

pub mod logger;
pub mod persistent_state;
pub mod system;

// Re-exports
pub use logger::{Logger, TracingLogger, LOG_TARGET};
pub use persistent_state::{ForEachFn, PersistentState};
pub use system::System;
