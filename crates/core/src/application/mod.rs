// Application Layer - Instrumented decorators over the capability ports

pub mod instrumented_state;
pub mod instrumented_system;

// Re-exports
pub use instrumented_state::InstrumentedPersistentState;
pub use instrumented_system::InstrumentedSystem;
