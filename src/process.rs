//! Child process execution with merged output, a deadline and cancellation.
//!
//! Both the executable plugins and the configured tool steps go through
//! [`run_captured`]. Stdout and stderr are read concurrently into a single
//! buffer in arrival order, which is as close to a shared pipe as the two
//! streams allow. Output beyond the cap is drained and discarded so the
//! child never blocks on a full pipe. Once the child has exited, output still
//! held open by its own background processes is read for [`DRAIN_GRACE`]
//! at most; the exit status is what counts.

use std::ffi::OsStr;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::interrupt::Interrupt;

const CHUNK_SIZE: usize = 8 * 1024;

/// How long to keep reading after the child exited
pub const DRAIN_GRACE: Duration = Duration::from_millis(500);

pub const TRUNCATION_MARKER: &str = "\n[output truncated]\n";

/// Limits applied to a single child process
#[derive(Debug, Clone)]
pub struct RunLimits {
    pub timeout: Duration,
    pub max_output_bytes: usize,
    pub interrupt: Interrupt,
}

/// A child that ran to completion
#[derive(Debug, Clone)]
pub struct Captured {
    pub status: ExitStatus,
    pub output: String,
    pub truncated: bool,
    pub elapsed: Duration,
}

impl Captured {
    /// Exit code, `None` when the child died from a signal
    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }
}

/// Why a child did not run to completion
#[derive(Debug)]
pub enum RunFailure {
    Spawn(std::io::Error),
    Io(std::io::Error),
    TimedOut,
    Interrupted,
}

/// Spawn `program` with `args`, wait for it under `limits`, and return its
/// exit status with merged stdout and stderr.
pub async fn run_captured<I, S>(
    program: &Path,
    args: I,
    cwd: Option<&Path>,
    limits: &RunLimits,
) -> Result<Captured, RunFailure>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let start = Instant::now();

    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        // Orphans must not outlive a cancelled gate
        .kill_on_drop(true);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }

    let mut child = command.spawn().map_err(RunFailure::Spawn)?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let finished = tokio::select! {
        result = tokio::time::timeout(
            limits.timeout,
            wait_with_merged_output(&mut child, stdout, stderr, limits.max_output_bytes),
        ) => match result {
            Ok(result) => Some(result),
            Err(_) => None,
        },
        _ = limits.interrupt.triggered() => {
            terminate(&mut child, program).await;
            return Err(RunFailure::Interrupted);
        }
    };

    match finished {
        Some(Ok((status, merged, truncated))) => {
            let elapsed = start.elapsed();
            debug!(
                program = %program.display(),
                ?status,
                output_bytes = merged.len(),
                elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                "child process exited"
            );
            let mut output = String::from_utf8_lossy(&merged).into_owned();
            if truncated {
                output.push_str(TRUNCATION_MARKER);
            }
            Ok(Captured {
                status,
                output,
                truncated,
                elapsed,
            })
        }
        Some(Err(err)) => {
            terminate(&mut child, program).await;
            Err(RunFailure::Io(err))
        }
        None => {
            warn!(
                program = %program.display(),
                timeout_secs = limits.timeout.as_secs(),
                "child process timed out, killing it"
            );
            terminate(&mut child, program).await;
            Err(RunFailure::TimedOut)
        }
    }
}

async fn terminate(child: &mut Child, program: &Path) {
    if let Err(err) = child.kill().await {
        debug!(program = %program.display(), error = %err, "failed to kill child process");
    }
}

async fn wait_with_merged_output(
    child: &mut Child,
    stdout: Option<impl AsyncRead + Unpin>,
    stderr: Option<impl AsyncRead + Unpin>,
    limit: usize,
) -> std::io::Result<(ExitStatus, Vec<u8>, bool)> {
    let mut merged = Vec::new();
    let mut truncated = false;

    let status = {
        let reading = read_merged(stdout, stderr, limit, &mut merged, &mut truncated);
        tokio::pin!(reading);

        tokio::select! {
            read = &mut reading => {
                read?;
                child.wait().await?
            }
            status = child.wait() => {
                let status = status?;
                match tokio::time::timeout(DRAIN_GRACE, &mut reading).await {
                    Ok(read) => read?,
                    Err(_) => debug!(
                        ?status,
                        "child exited but its output is still open, keeping what arrived"
                    ),
                }
                status
            }
        }
    };

    Ok((status, merged, truncated))
}

/// Read both streams until EOF, appending chunks in arrival order.
///
/// Chunks land in `merged` as they arrive, so a cancelled read keeps
/// everything read so far.
async fn read_merged(
    stdout: Option<impl AsyncRead + Unpin>,
    stderr: Option<impl AsyncRead + Unpin>,
    limit: usize,
    merged: &mut Vec<u8>,
    truncated: &mut bool,
) -> std::io::Result<()> {
    let mut out_open = stdout.is_some();
    let mut err_open = stderr.is_some();
    let mut stdout = stdout;
    let mut stderr = stderr;
    let mut out_buf = vec![0u8; CHUNK_SIZE];
    let mut err_buf = vec![0u8; CHUNK_SIZE];

    while out_open || err_open {
        tokio::select! {
            read = read_some(&mut stdout, &mut out_buf), if out_open => {
                let n = read?;
                if n == 0 {
                    out_open = false;
                } else {
                    append_capped(merged, &out_buf[..n], limit, truncated);
                }
            }
            read = read_some(&mut stderr, &mut err_buf), if err_open => {
                let n = read?;
                if n == 0 {
                    err_open = false;
                } else {
                    append_capped(merged, &err_buf[..n], limit, truncated);
                }
            }
        }
    }

    Ok(())
}

async fn read_some<R: AsyncRead + Unpin>(
    stream: &mut Option<R>,
    buf: &mut [u8],
) -> std::io::Result<usize> {
    match stream {
        Some(stream) => stream.read(buf).await,
        None => Ok(0),
    }
}

fn append_capped(merged: &mut Vec<u8>, chunk: &[u8], limit: usize, truncated: &mut bool) {
    let room = limit.saturating_sub(merged.len());
    if chunk.len() > room {
        *truncated = true;
    }
    merged.extend_from_slice(&chunk[..chunk.len().min(room)]);
}
