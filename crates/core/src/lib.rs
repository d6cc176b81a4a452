// Sysdebug Core - Capability ports, log support & instrumented decorators
// NO infrastructure dependencies (hexagonal architecture: adapters live in infra-* crates)

pub mod application;
pub mod domain;
pub mod error;
pub mod logging;
pub mod port;

pub use application::{InstrumentedPersistentState, InstrumentedSystem};
pub use error::{StateError, StateResult, SystemError, SystemResult};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
