// Domain Layer - value types consumed by the capability ports

pub mod fs;
pub mod interpreter;

// Re-exports
pub use fs::{DirEntry, FileInfo, FileKind, FsHandle, RunScriptOptions, ScriptCondition};
pub use interpreter::Interpreter;
