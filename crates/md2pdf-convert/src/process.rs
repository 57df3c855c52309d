//! External process execution with timeout and cancellation.
//!
//! Every tool invocation goes through [`run`]: output is captured through
//! pipes, and on timeout or cancellation the child's whole process group is
//! killed and the child reaped before the error is returned. Tools fork
//! workers (pandoc runs the LaTeX engine, mmdc runs a headless browser), and
//! those die with the group.

use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::ToolError;

/// Captured output of a successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Run `command` to completion.
///
/// - `limit`: kill the process after this long (`None` waits forever)
/// - `cancel`: kill the process as soon as the token fires
///
/// A missing executable yields [`ToolError::NotFound`]; a non-zero exit
/// yields [`ToolError::Failed`] with the captured stderr.
pub async fn run(
    tool: &'static str,
    mut command: Command,
    limit: Option<Duration>,
    cancel: &CancellationToken,
) -> Result<ProcessOutput, ToolError> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    command.process_group(0);

    let started = Instant::now();
    let mut child = command
        .spawn()
        .map_err(|e| ToolError::spawn(tool, command.as_std().get_program(), e))?;
    let pid = child.id();
    tracing::debug!(tool, pid, "Spawned process");

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let status = tokio::select! {
        biased;
        status = child.wait() => status.map_err(|e| ToolError::Wait { tool, source: e })?,
        () = cancel.cancelled() => {
            terminate(tool, &mut child, &stdout, &stderr).await;
            return Err(ToolError::Cancelled { tool });
        }
        () = sleep_for(limit) => {
            terminate(tool, &mut child, &stdout, &stderr).await;
            let limit = limit.unwrap_or_default();
            tracing::warn!(tool, pid, limit_ms = limit.as_millis(), "Process timed out");
            return Err(ToolError::Timeout { tool, limit });
        }
    };

    let stdout = collect(stdout).await;
    let stderr = collect(stderr).await;
    tracing::debug!(
        tool,
        pid,
        code = status.code(),
        elapsed_ms = started.elapsed().as_millis(),
        "Process exited"
    );

    check_status(tool, status, &stderr)?;
    Ok(ProcessOutput { stdout, stderr })
}

fn check_status(tool: &'static str, status: ExitStatus, stderr: &str) -> Result<(), ToolError> {
    if status.success() {
        return Ok(());
    }
    Err(ToolError::Failed {
        tool,
        code: status.code(),
        stderr: stderr.trim().to_owned(),
    })
}

/// Read a pipe to the end on a separate task so a chatty child never blocks
/// on a full pipe buffer.
fn drain<R>(pipe: Option<R>) -> JoinHandle<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            // Partial output is still useful for error messages
            let _ = pipe.read_to_end(&mut buf).await;
        }
        buf
    })
}

async fn collect(handle: JoinHandle<Vec<u8>>) -> String {
    let bytes = handle.await.unwrap_or_default();
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Kill the child's process group, then reap the child. Pipe readers are
/// aborted in case a worker escaped the group and still holds a write end.
async fn terminate(
    tool: &'static str,
    child: &mut Child,
    stdout: &JoinHandle<Vec<u8>>,
    stderr: &JoinHandle<Vec<u8>>,
) {
    kill_group(tool, child.id());
    if let Err(e) = child.kill().await {
        tracing::warn!(tool, error = %e, "Failed to kill process");
    }
    stdout.abort();
    stderr.abort();
}

/// Send SIGKILL to the process group led by `pid`.
#[cfg(unix)]
fn kill_group(tool: &'static str, pid: Option<u32>) {
    let Some(pgid) = pid.and_then(|pid| libc::pid_t::try_from(pid).ok()) else {
        return;
    };
    // SAFETY: kill(2) takes plain integers and touches no memory of ours
    let rc = unsafe { libc::kill(-pgid, libc::SIGKILL) };
    if rc != 0 {
        let error = std::io::Error::last_os_error();
        tracing::debug!(tool, pgid, %error, "Failed to kill process group");
    }
}

#[cfg(not(unix))]
fn kill_group(_tool: &'static str, _pid: Option<u32>) {}

async fn sleep_for(limit: Option<Duration>) {
    match limit {
        Some(limit) => tokio::time::sleep(limit).await,
        None => std::future::pending().await,
    }
}
