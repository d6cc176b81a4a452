// Logger Port (structured log sink)

use crate::logging::{Attrs, Level, LogRecord};

/// Target used for every record emitted by the instrumentation layer
pub const LOG_TARGET: &str = "sysdebug";

/// Structured log sink
///
/// Logging never fails a decorated call: implementations swallow their own errors.
pub trait Logger: Send + Sync {
    fn log(&self, record: LogRecord);
}

/// Forwards records to the process-wide `tracing` subscriber (production)
///
/// The operation name is the event message; the attributes travel in the
/// `attrs` field as one JSON object, so typed values (integers, nested
/// groups) survive into the subscriber. The subscriber is installed once at
/// startup by the binary.
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, record: LogRecord) {
        let attrs = Attrs(&record.attrs).to_json().to_string();
        match record.level {
            Level::Info => {
                tracing::info!(target: LOG_TARGET, attrs = attrs.as_str(), "{}", record.message)
            }
            Level::Error => {
                tracing::error!(target: LOG_TARGET, attrs = attrs.as_str(), "{}", record.message)
            }
        }
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// Collects records in memory
    #[derive(Default)]
    pub struct MemoryLogger {
        records: Mutex<Vec<LogRecord>>,
    }

    impl MemoryLogger {
        pub fn new() -> Self {
            Self::default()
        }
        pub fn records(&self) -> Vec<LogRecord> {
            self.records.lock().unwrap().clone()
        }
        pub fn len(&self) -> usize {
            self.records.lock().unwrap().len()
        }
        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }
        /// The most recent record, if any
        pub fn last(&self) -> Option<LogRecord> {
            self.records.lock().unwrap().last().cloned()
        }
        pub fn clear(&self) {
            self.records.lock().unwrap().clear();
        }
    }

    impl Logger for MemoryLogger {
        fn log(&self, record: LogRecord) {
            self.records.lock().unwrap().push(record);
        }
    }
}
