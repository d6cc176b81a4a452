// Child process execution with exit-status decoding
// reason: tokio::process for async process management, nix for child rusage (unix)

use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use sysdebug_core::error::{ProcessExit, ProcessState, SystemError, SystemResult};

const READ_CHUNK: usize = 8 * 1024;

/// CPU time consumed by reaped children of this process
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct CpuTimes {
    user: Duration,
    system: Duration,
}

impl CpuTimes {
    #[cfg(unix)]
    fn children() -> Self {
        use nix::sys::resource::{getrusage, UsageWho};
        use nix::sys::time::TimeVal;

        fn to_duration(tv: TimeVal) -> Duration {
            let secs = u64::try_from(tv.tv_sec()).unwrap_or(0);
            let micros = u64::try_from(tv.tv_usec()).unwrap_or(0);
            Duration::from_secs(secs) + Duration::from_micros(micros)
        }

        match getrusage(UsageWho::RUSAGE_CHILDREN) {
            Ok(usage) => Self {
                user: to_duration(usage.user_time()),
                system: to_duration(usage.system_time()),
            },
            Err(e) => {
                debug!(error = %e, "getrusage failed, CPU times unavailable");
                Self::default()
            }
        }
    }

    #[cfg(not(unix))]
    fn children() -> Self {
        Self::default()
    }

    /// Times accumulated since `earlier`
    ///
    /// Approximate when other children are reaped concurrently.
    fn since(self, earlier: Self) -> Self {
        Self {
            user: self.user.saturating_sub(earlier.user),
            system: self.system.saturating_sub(earlier.system),
        }
    }
}

#[cfg(unix)]
fn signal_of(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn signal_of(_: &ExitStatus) -> Option<i32> {
    None
}

/// Error for a child that exited unsuccessfully with `status`
fn process_exit(
    pid: u32,
    status: ExitStatus,
    times: CpuTimes,
    output: Vec<u8>,
    stderr: Vec<u8>,
) -> SystemError {
    SystemError::ProcessExit(ProcessExit {
        state: Some(ProcessState {
            pid,
            exit_code: status.code(),
            signal: signal_of(&status),
            user_time: times.user,
            system_time: times.system,
        }),
        output,
        stderr,
    })
}

fn spawn_error(cmd: &Command, err: io::Error) -> SystemError {
    let program = cmd.as_std().get_program().to_string_lossy().into_owned();
    match err.kind() {
        io::ErrorKind::NotFound => SystemError::NotFound(format!("{}: {}", program, err)),
        io::ErrorKind::PermissionDenied => {
            SystemError::PermissionDenied(format!("{}: {}", program, err))
        }
        _ => SystemError::Spawn(format!("{}: {}", program, err)),
    }
}

/// Start `cmd` without waiting for it
pub fn start(cmd: &mut Command) -> SystemResult<Child> {
    let child = cmd.spawn().map_err(|e| spawn_error(cmd, e))?;
    debug!(pid = ?child.id(), "Child process started");
    Ok(child)
}

/// Wait for a started child to exit
///
/// # Errors
/// - SystemError::ProcessExit if the child exits unsuccessfully
pub async fn wait(child: &mut Child) -> SystemResult<()> {
    let pid = child.id().unwrap_or_default();
    let before = CpuTimes::children();
    let status = child.wait().await?;
    if status.success() {
        return Ok(());
    }
    let times = CpuTimes::children().since(before);
    Err(process_exit(pid, status, times, Vec::new(), Vec::new()))
}

/// Start `cmd` and wait for it to exit
pub async fn run(cmd: &mut Command) -> SystemResult<()> {
    let mut child = start(cmd)?;
    wait(&mut child).await
}

/// Run `cmd` and return its stdout
///
/// # Errors
/// - SystemError::ProcessExit carrying stdout and stderr if the command fails
pub async fn output(cmd: &mut Command) -> SystemResult<Vec<u8>> {
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    let before = CpuTimes::children();
    let child = start(cmd)?;
    let pid = child.id().unwrap_or_default();

    let output = child.wait_with_output().await?;
    let times = CpuTimes::children().since(before);
    if output.status.success() {
        return Ok(output.stdout);
    }
    Err(process_exit(
        pid,
        output.status,
        times,
        output.stdout,
        output.stderr,
    ))
}

async fn read_chunk<R>(pipe: &mut Option<R>, buf: &mut [u8]) -> io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    match pipe {
        Some(pipe) => pipe.read(buf).await,
        None => std::future::pending().await,
    }
}

/// Read both pipes to EOF, appending chunks in arrival order
async fn interleave<O, E>(mut stdout: Option<O>, mut stderr: Option<E>) -> io::Result<Vec<u8>>
where
    O: AsyncRead + Unpin,
    E: AsyncRead + Unpin,
{
    let mut out_buf = vec![0u8; READ_CHUNK];
    let mut err_buf = vec![0u8; READ_CHUNK];
    let mut combined = Vec::new();

    while stdout.is_some() || stderr.is_some() {
        tokio::select! {
            read = read_chunk(&mut stdout, &mut out_buf) => match read? {
                0 => stdout = None,
                n => combined.extend_from_slice(&out_buf[..n]),
            },
            read = read_chunk(&mut stderr, &mut err_buf) => match read? {
                0 => stderr = None,
                n => combined.extend_from_slice(&err_buf[..n]),
            },
        }
    }
    Ok(combined)
}

/// Kill and reap `child` after its output could not be read
async fn abandon(child: &mut Child, err: io::Error) -> SystemError {
    if let Err(kill_err) = child.kill().await {
        warn!(error = %kill_err, "failed to kill child after read error");
    }
    SystemError::from(err)
}

/// Run `cmd` and return stdout and stderr interleaved in arrival order
///
/// # Errors
/// - SystemError::ProcessExit carrying the combined output if the command fails
/// - SystemError::Io if a pipe cannot be read; the child is killed first
pub async fn combined_output(cmd: &mut Command) -> SystemResult<Vec<u8>> {
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    let before = CpuTimes::children();
    let mut child = start(cmd)?;
    let pid = child.id().unwrap_or_default();

    let (stdout, stderr) = (child.stdout.take(), child.stderr.take());
    let combined = match interleave(stdout, stderr).await {
        Ok(combined) => combined,
        Err(err) => return Err(abandon(&mut child, err).await),
    };

    let status = child.wait().await?;
    let times = CpuTimes::children().since(before);
    if status.success() {
        return Ok(combined);
    }
    Err(process_exit(pid, status, times, combined, Vec::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    fn exit_state(err: SystemError) -> ProcessExit {
        match err {
            SystemError::ProcessExit(exit) => exit,
            other => panic!("expected process exit, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_run_success() {
        assert_ok!(run(&mut sh("true")).await);
    }

    #[tokio::test]
    async fn test_run_exit_code() {
        let exit = exit_state(run(&mut sh("exit 3")).await.unwrap_err());
        let state = exit.state.unwrap();

        assert_eq!(state.exit_code, Some(3));
        assert_eq!(state.signal, None);
        assert!(state.pid > 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_killed_by_signal() {
        let exit = exit_state(run(&mut sh("kill -9 $$")).await.unwrap_err());
        let state = exit.state.unwrap();

        assert_eq!(state.exit_code, None);
        assert_eq!(state.signal, Some(9));
        assert!(!state.exited());
    }

    #[tokio::test]
    async fn test_missing_program_is_not_found() {
        let err = run(&mut Command::new("/nonexistent/sysdebug-binary")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_output_returns_stdout() {
        let stdout = output(&mut sh("echo out; echo err >&2")).await.unwrap();
        assert_eq!(stdout, b"out\n");
    }

    #[tokio::test]
    async fn test_output_failure_carries_streams() {
        let exit = exit_state(output(&mut sh("echo out; echo err >&2; exit 1")).await.unwrap_err());

        assert_eq!(exit.output, b"out\n");
        assert_eq!(exit.stderr, b"err\n");
    }

    #[tokio::test]
    async fn test_combined_output_collects_both_streams() {
        let combined = combined_output(&mut sh("echo one; echo two >&2")).await.unwrap();
        let text = String::from_utf8(combined).unwrap();

        assert!(text.contains("one\n"));
        assert!(text.contains("two\n"));
        assert_eq!(text.len(), 8);
    }

    #[tokio::test]
    async fn test_combined_output_failure() {
        let err = assert_err!(combined_output(&mut sh("echo boom >&2; exit 4")).await);

        let exit = exit_state(err);
        assert_eq!(exit.output, b"boom\n");
        assert_eq!(exit.state.unwrap().exit_code, Some(4));
    }

    #[tokio::test]
    async fn test_interleave_stops_on_read_error() {
        let stdout = tokio_test::io::Builder::new()
            .read(b"partial")
            .read_error(io::Error::new(io::ErrorKind::BrokenPipe, "pipe broke"))
            .build();

        let err = assert_err!(interleave(Some(stdout), None::<tokio_test::io::Mock>).await);
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[tokio::test]
    async fn test_read_error_kills_child() {
        let mut child = start(&mut sh("sleep 30")).unwrap();

        let err = abandon(&mut child, io::Error::new(io::ErrorKind::BrokenPipe, "pipe broke")).await;

        assert!(matches!(err, SystemError::Io(_)));
        assert!(child.try_wait().unwrap().is_some(), "child left running");
    }

    #[tokio::test]
    async fn test_start_then_wait() {
        let mut child = start(&mut sh("exit 0")).unwrap();
        assert_ok!(wait(&mut child).await);
    }
}
