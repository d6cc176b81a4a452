// Process-exit decoding into log attributes

use super::attr::Attr;
use crate::error::SystemError;

/// Decodes exit-status attributes from the error returned by a process call
///
/// - no error: nothing
/// - any error other than a process exit: a single `err` attribute
/// - process exit: `exitCode` if the process ran to completion, `pid` if it
///   was terminated first, then `userTime` / `systemTime` when nonzero
pub fn exit_error_attrs(err: Option<&SystemError>) -> Vec<Attr> {
    let mut attrs = Vec::new();
    append_exit_error_attrs(&mut attrs, err);
    attrs
}

/// Appending form of [`exit_error_attrs`]
pub fn append_exit_error_attrs(attrs: &mut Vec<Attr>, err: Option<&SystemError>) {
    let Some(err) = err else {
        return;
    };
    let SystemError::ProcessExit(exit) = err else {
        attrs.push(Attr::error(err));
        return;
    };
    let Some(state) = &exit.state else {
        return;
    };

    match state.exit_code {
        Some(code) => attrs.push(Attr::int("exitCode", code)),
        None => attrs.push(Attr::int("pid", state.pid)),
    }
    if !state.user_time.is_zero() {
        attrs.push(Attr::duration("userTime", state.user_time));
    }
    if !state.system_time.is_zero() {
        attrs.push(Attr::duration("systemTime", state.system_time));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ProcessExit, ProcessState};
    use crate::logging::Value;
    use std::time::Duration;

    fn exit(exit_code: Option<i32>, user_ms: u64, system_ms: u64) -> SystemError {
        SystemError::ProcessExit(ProcessExit {
            state: Some(ProcessState {
                pid: 4242,
                exit_code,
                signal: exit_code.is_none().then_some(9),
                user_time: Duration::from_millis(user_ms),
                system_time: Duration::from_millis(system_ms),
            }),
            ..Default::default()
        })
    }

    fn keys(attrs: &[Attr]) -> Vec<&'static str> {
        attrs.iter().map(|a| a.key).collect()
    }

    #[test]
    fn test_no_error_no_attrs() {
        assert!(exit_error_attrs(None).is_empty());
    }

    #[test]
    fn test_opaque_error() {
        let err = SystemError::Spawn("nope: not found".to_string());
        let attrs = exit_error_attrs(Some(&err));
        assert_eq!(attrs, vec![Attr::string("err", "Spawn failed: nope: not found")]);
    }

    #[test]
    fn test_exit_code() {
        let attrs = exit_error_attrs(Some(&exit(Some(2), 0, 0)));
        assert_eq!(attrs, vec![Attr::int("exitCode", 2)]);
    }

    #[test]
    fn test_signalled_process_logs_pid() {
        let attrs = exit_error_attrs(Some(&exit(None, 0, 0)));
        assert_eq!(keys(&attrs), vec!["pid"]);
        assert_eq!(attrs[0].value, Value::Int(4242));
    }

    #[test]
    fn test_cpu_times_only_when_nonzero() {
        let attrs = exit_error_attrs(Some(&exit(Some(1), 5, 0)));
        assert_eq!(keys(&attrs), vec!["exitCode", "userTime"]);

        let attrs = exit_error_attrs(Some(&exit(None, 0, 3)));
        assert_eq!(keys(&attrs), vec!["pid", "systemTime"]);
        assert_eq!(attrs[1].value, Value::Duration(Duration::from_millis(3)));
    }

    #[test]
    fn test_exit_without_state() {
        let err = SystemError::ProcessExit(ProcessExit::default());
        assert!(exit_error_attrs(Some(&err)).is_empty());
    }
}
