use std::ffi::{OsStr, OsString};
use std::path::PathBuf;
use std::process::{Output, Stdio};

use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::Command;
use tracing::debug;

use super::{ChangedFile, EMPTY_TREE, StagedSource};
use crate::error::{VcsQueryError, io_arc};

/// [`StagedSource`] backed by the `git` executable
#[derive(Debug, Clone)]
pub struct GitCli {
    program: PathBuf,
    workdir: PathBuf,
}

impl GitCli {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            program: PathBuf::from("git"),
            workdir: workdir.into(),
        }
    }

    fn command<I, S>(&self, args: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut command = Command::new(&self.program);
        command
            .args(args)
            .current_dir(&self.workdir)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        command
    }

    async fn output(&self, args: &[&str]) -> Result<Output, VcsQueryError> {
        let command_line = describe(args.iter().map(OsStr::new));
        debug!(command = %command_line, "running git");

        self.command(args)
            .output()
            .await
            .map_err(|err| VcsQueryError::Spawn {
                command: command_line,
                source: io_arc(err),
            })
    }

    /// Whether `HEAD` resolves to a commit (false before the first commit)
    async fn has_head(&self) -> Result<bool, VcsQueryError> {
        let output = self
            .output(&["rev-parse", "--verify", "--quiet", "HEAD^{commit}"])
            .await?;
        Ok(output.status.success())
    }
}

impl StagedSource for GitCli {
    async fn list_changed_files(&self) -> Result<Vec<ChangedFile>, VcsQueryError> {
        let base = if self.has_head().await? { "HEAD" } else { EMPTY_TREE };
        let args = [
            "diff-index",
            "--cached",
            "--diff-filter=AM",
            "--name-only",
            "-z",
            base,
        ];

        let output = self.output(&args).await?;
        if !output.status.success() {
            return Err(VcsQueryError::Failed {
                command: describe(args.iter().map(OsStr::new)),
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let files = parse_name_list(&output.stdout);
        debug!(count = files.len(), %base, "listed staged files");
        Ok(files)
    }

    async fn copy_staged_content<W>(
        &self,
        file: &ChangedFile,
        sink: &mut W,
    ) -> Result<u64, VcsQueryError>
    where
        W: AsyncWrite + Unpin + Send,
    {
        // Stage 0 is the merged entry; `:<path>` alone would be ambiguous
        // during a conflicted merge
        let mut object = OsString::from(":0:");
        object.push(file.path().as_os_str());
        let args = [OsStr::new("cat-file"), OsStr::new("blob"), object.as_os_str()];
        let command_line = describe(args);

        let io_error = |err: std::io::Error| VcsQueryError::Io {
            command: command_line.clone(),
            source: io_arc(err),
        };

        let mut child = self
            .command(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| VcsQueryError::Spawn {
                command: command_line.clone(),
                source: io_arc(err),
            })?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| io_error(std::io::Error::other("stdout was not captured")))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| io_error(std::io::Error::other("stderr was not captured")))?;

        let mut stderr_bytes = Vec::new();
        let (copied, stderr_read) = tokio::join!(
            tokio::io::copy(&mut stdout, sink),
            stderr.read_to_end(&mut stderr_bytes)
        );
        let copied = copied.map_err(io_error)?;
        stderr_read.map_err(io_error)?;
        sink.flush().await.map_err(io_error)?;

        let status = child.wait().await.map_err(io_error)?;
        if !status.success() {
            return Err(VcsQueryError::Failed {
                command: command_line,
                status: status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&stderr_bytes).trim().to_string(),
            });
        }

        Ok(copied)
    }
}

fn describe<I, S>(args: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut line = String::from("git");
    for arg in args {
        line.push(' ');
        line.push_str(&arg.as_ref().to_string_lossy());
    }
    line
}

/// Split NUL-terminated `--name-only -z` output
fn parse_name_list(stdout: &[u8]) -> Vec<ChangedFile> {
    stdout
        .split(|byte| *byte == 0)
        .filter(|name| !name.is_empty())
        .map(|name| ChangedFile::new(path_from_bytes(name)))
        .collect()
}

#[cfg(unix)]
fn path_from_bytes(bytes: &[u8]) -> PathBuf {
    use std::os::unix::ffi::OsStrExt;
    PathBuf::from(OsStr::from_bytes(bytes))
}

#[cfg(not(unix))]
fn path_from_bytes(bytes: &[u8]) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(bytes).into_owned())
}
