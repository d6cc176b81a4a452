// Central error types for the System and PersistentState ports

use std::fmt;
use std::io;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// State of a child process after it stopped running
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessState {
    pub pid: u32,
    /// `None` when the process was terminated before exiting (e.g. by a signal)
    pub exit_code: Option<i32>,
    pub signal: Option<i32>,
    /// Zero when unknown
    pub user_time: Duration,
    /// Zero when unknown
    pub system_time: Duration,
}

impl ProcessState {
    /// True if the process ran to completion and reported an exit code
    pub fn exited(&self) -> bool {
        self.exit_code.is_some()
    }
}

/// A process ended abnormally: non-zero exit code or terminated by a signal
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessExit {
    pub state: Option<ProcessState>,
    /// Captured stdout (or combined output) when the caller asked for it
    pub output: Vec<u8>,
    /// Captured stderr when the caller asked for it
    pub stderr: Vec<u8>,
}

impl fmt::Display for ProcessExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state {
            Some(ProcessState {
                exit_code: Some(code),
                ..
            }) => write!(f, "exit status {}", code),
            Some(ProcessState {
                signal: Some(signal),
                pid,
                ..
            }) => write!(f, "process {} terminated by signal {}", pid, signal),
            Some(ProcessState { pid, .. }) => write!(f, "process {} did not exit", pid),
            None => write!(f, "process exited abnormally"),
        }
    }
}

/// Errors returned by System implementations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SystemError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Invalid pattern: {0}")]
    Pattern(String),

    #[error("Spawn failed: {0}")]
    Spawn(String),

    #[error("{0}")]
    ProcessExit(ProcessExit),
}

impl SystemError {
    /// Convert an io::Error raised while operating on `path`
    pub fn from_io(path: &Path, err: io::Error) -> Self {
        let message = format!("{}: {}", path.display(), err);
        match err.kind() {
            io::ErrorKind::NotFound => SystemError::NotFound(message),
            io::ErrorKind::AlreadyExists => SystemError::AlreadyExists(message),
            io::ErrorKind::PermissionDenied => SystemError::PermissionDenied(message),
            _ => SystemError::Io(message),
        }
    }

    /// True if this error reports a missing file
    pub fn is_not_found(&self) -> bool {
        matches!(self, SystemError::NotFound(_))
    }
}

impl From<io::Error> for SystemError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => SystemError::NotFound(err.to_string()),
            io::ErrorKind::AlreadyExists => SystemError::AlreadyExists(err.to_string()),
            io::ErrorKind::PermissionDenied => SystemError::PermissionDenied(err.to_string()),
            _ => SystemError::Io(err.to_string()),
        }
    }
}

/// Errors returned by PersistentState implementations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Raised by a for_each callback to stop iteration
    #[error("Callback error: {0}")]
    Callback(String),
}

impl From<serde_json::Error> for StateError {
    fn from(err: serde_json::Error) -> Self {
        StateError::Serialization(err.to_string())
    }
}

pub type SystemResult<T> = std::result::Result<T, SystemError>;
pub type StateResult<T> = std::result::Result<T, StateError>;
