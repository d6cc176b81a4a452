// Sysdebug Infrastructure - System Adapters
// Implements: System (OsSystem), process execution and logging wrappers

pub mod exec;
pub mod http_log;
pub mod os_system;
pub mod process_log;

pub use http_log::log_http_request;
pub use os_system::OsSystem;
pub use process_log::{
    log_cmd_combined_output, log_cmd_output, log_cmd_run, log_cmd_start, log_cmd_wait,
};
