// Log support: records, typed attributes, payload sampling, exit decoding

pub mod attr;
pub mod command;
pub mod exit;
pub mod truncate;

// Re-exports
pub use attr::{Attr, Attrs, Value};
pub use command::{command_attr, CommandDescriptor};
pub use exit::{append_exit_error_attrs, exit_error_attrs};
pub use truncate::{first_few_bytes, output, CONTINUATION, FEW};

use crate::port::Logger;
use std::fmt;

/// Record severity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Error,
}

impl Level {
    /// Error if the call failed, info otherwise
    pub fn of<T, E>(result: &Result<T, E>) -> Self {
        if result.is_err() {
            Level::Error
        } else {
            Level::Info
        }
    }
}

/// One structured log record
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub level: Level,
    /// Name of the logged operation
    pub message: &'static str,
    pub attrs: Vec<Attr>,
}

impl LogRecord {
    pub fn new(level: Level, message: &'static str, attrs: Vec<Attr>) -> Self {
        Self {
            level,
            message,
            attrs,
        }
    }

    pub fn info(message: &'static str, attrs: Vec<Attr>) -> Self {
        Self::new(Level::Info, message, attrs)
    }

    pub fn error(message: &'static str, attrs: Vec<Attr>) -> Self {
        Self::new(Level::Error, message, attrs)
    }

    /// Value of the first attribute named `key`
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attrs.iter().find(|a| a.key == key).map(|a| &a.value)
    }

    /// Attribute keys in emission order
    pub fn keys(&self) -> Vec<&'static str> {
        self.attrs.iter().map(|a| a.key).collect()
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.attrs.is_empty() {
            f.write_str(self.message)
        } else {
            write!(f, "{} {}", self.message, Attrs(&self.attrs))
        }
    }
}

/// Emits `attrs` at info level, or at error level with a trailing `err`
/// attribute when `err` is set
pub fn info_or_error<E>(
    logger: &dyn Logger,
    message: &'static str,
    err: Option<&E>,
    mut attrs: Vec<Attr>,
) where
    E: fmt::Display + ?Sized,
{
    match err {
        Some(err) => {
            attrs.push(Attr::error(err));
            logger.log(LogRecord::error(message, attrs));
        }
        None => logger.log(LogRecord::info(message, attrs)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SystemError;
    use crate::port::logger::mocks::MemoryLogger;

    #[test]
    fn test_info_or_error_levels() {
        let logger = MemoryLogger::new();

        info_or_error(&logger, "Remove", None::<&SystemError>, vec![Attr::string("name", "a")]);
        let err = SystemError::NotFound("b".to_string());
        info_or_error(&logger, "Remove", Some(&err), vec![Attr::string("name", "b")]);

        let records = logger.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].level, Level::Info);
        assert_eq!(records[0].keys(), vec!["name"]);
        assert_eq!(records[1].level, Level::Error);
        assert_eq!(records[1].keys(), vec!["name", "err"]);
        assert_eq!(records[1].to_string(), r#"Remove name="b" err="Not found: b""#);
    }

    #[test]
    fn test_level_of_result() {
        let ok: Result<(), ()> = Ok(());
        assert_eq!(Level::of(&ok), Level::Info);
        assert_eq!(Level::of(&Err::<(), _>(())), Level::Error);
    }
}
