// Logging wrappers around child process execution
//
// Each wrapper runs the matching `exec` function, emits one record and
// returns the result unchanged.

use chrono::Utc;
use std::time::Instant;
use tokio::process::{Child, Command};

use sysdebug_core::error::{SystemError, SystemResult};
use sysdebug_core::logging::{
    append_exit_error_attrs, command_attr, output, Attr, Level, LogRecord,
};
use sysdebug_core::port::Logger;

use crate::exec;

fn emit(
    logger: &dyn Logger,
    message: &'static str,
    level: Level,
    mut attrs: Vec<Attr>,
    err: Option<&SystemError>,
) {
    append_exit_error_attrs(&mut attrs, err);
    logger.log(LogRecord::new(level, message, attrs));
}

/// Bytes produced by an output call, whether it succeeded or not
fn produced(result: &SystemResult<Vec<u8>>) -> &[u8] {
    match result {
        Ok(data) => data,
        Err(SystemError::ProcessExit(exit)) => &exit.output,
        Err(_) => &[],
    }
}

/// [`exec::start`], logging the start time
pub fn log_cmd_start(logger: &dyn Logger, cmd: &mut Command) -> SystemResult<Child> {
    let start = Utc::now();
    let result = exec::start(cmd);
    emit(
        logger,
        "Start",
        Level::of(&result),
        vec![command_attr(cmd), Attr::time("start", start)],
        result.as_ref().err(),
    );
    result
}

/// [`exec::wait`], logging the end time
///
/// `cmd` is the command `child` was started from.
pub async fn log_cmd_wait(
    logger: &dyn Logger,
    cmd: &Command,
    child: &mut Child,
) -> SystemResult<()> {
    let result = exec::wait(child).await;
    let end = Utc::now();
    emit(
        logger,
        "Wait",
        Level::of(&result),
        vec![command_attr(cmd), Attr::time("end", end)],
        result.as_ref().err(),
    );
    result
}

/// [`exec::run`], logging the duration
pub async fn log_cmd_run(logger: &dyn Logger, cmd: &mut Command) -> SystemResult<()> {
    let start = Instant::now();
    let result = exec::run(cmd).await;
    emit(
        logger,
        "Run",
        Level::of(&result),
        vec![command_attr(cmd), Attr::duration("duration", start.elapsed())],
        result.as_ref().err(),
    );
    result
}

/// [`exec::output`], logging the duration and stdout
pub async fn log_cmd_output(logger: &dyn Logger, cmd: &mut Command) -> SystemResult<Vec<u8>> {
    let start = Instant::now();
    let result = exec::output(cmd).await;
    let duration = start.elapsed();
    let data = produced(&result);
    emit(
        logger,
        "Output",
        Level::of(&result),
        vec![
            command_attr(cmd),
            Attr::duration("duration", duration),
            Attr::bytes("output", output(data, result.as_ref().err())),
            Attr::size("size", data.len()),
        ],
        result.as_ref().err(),
    );
    result
}

/// [`exec::combined_output`], logging the duration and combined output
pub async fn log_cmd_combined_output(
    logger: &dyn Logger,
    cmd: &mut Command,
) -> SystemResult<Vec<u8>> {
    let start = Instant::now();
    let result = exec::combined_output(cmd).await;
    let duration = start.elapsed();
    let data = produced(&result);
    emit(
        logger,
        "CombinedOutput",
        Level::of(&result),
        vec![
            command_attr(cmd),
            Attr::duration("duration", duration),
            Attr::bytes("combinedOutput", output(data, result.as_ref().err())),
            Attr::size("size", data.len()),
        ],
        result.as_ref().err(),
    );
    result
}
