//! Error taxonomy for the commit gate
//!
//! Only failures that prevent a well-defined file list or a well-defined temp
//! workspace are fatal to a run. Everything scoped to a single file or a
//! single plugin is downgraded by the gate and recorded in the run result.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// The version-control system could not list or read staged content.
#[derive(Debug, Clone, Error)]
pub enum VcsQueryError {
    /// The VCS command could not be started at all.
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: Arc<std::io::Error>,
    },

    /// The VCS command exited non-zero.
    #[error("`{command}` exited with status {status}: {stderr}")]
    Failed {
        command: String,
        status: i32,
        stderr: String,
    },

    /// Reading the command output or writing it to the sink failed.
    #[error("I/O error while running `{command}`: {source}")]
    Io {
        command: String,
        #[source]
        source: Arc<std::io::Error>,
    },

    /// The repository could not be located.
    #[error("not inside a git repository: {message}")]
    NoRepository { message: String },
}

/// The temp mirror tree could not be created or populated.
#[derive(Debug, Clone, Error)]
pub enum WorkspaceError {
    #[error("failed to create temporary workspace: {0}")]
    Create(#[source] Arc<std::io::Error>),

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },

    /// The changed-file path would land outside the workspace root.
    #[error("refusing to materialize path outside the workspace: {0}")]
    UnsafePath(PathBuf),

    #[error("failed to remove temporary workspace {path}: {source}")]
    Destroy {
        path: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },
}

/// A single plugin invocation failed before producing an exit code.
///
/// Never fatal: the invoker turns every variant into an `Error` verdict.
#[derive(Debug, Clone, Error)]
pub enum PluginError {
    #[error("plugin '{name}' failed to start: {source}")]
    Launch {
        name: String,
        #[source]
        source: Arc<std::io::Error>,
    },

    #[error("plugin '{name}' timed out after {}s", .timeout.as_secs())]
    Timeout { name: String, timeout: Duration },

    #[error("plugin '{name}' was interrupted")]
    Interrupted { name: String },

    #[error("I/O error communicating with plugin '{name}': {source}")]
    Io {
        name: String,
        #[source]
        source: Arc<std::io::Error>,
    },
}

/// Installing or validating the hook failed.
#[derive(Debug, Clone, Error)]
pub enum InstallError {
    #[error("installation declined")]
    Declined,

    #[error("failed to copy {source_path} to {dest}: {source}")]
    Copy {
        source_path: PathBuf,
        dest: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },

    #[error("failed to read metadata of {path}: {source}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },

    #[error("no hook installed at {0}")]
    NotInstalled(PathBuf),

    /// The repository copy is newer than the installed hook.
    #[error(
        "{source_path} has been updated, please run the repository's copy to update your installed hook at {installed}"
    )]
    Stale {
        source_path: PathBuf,
        installed: PathBuf,
    },

    #[error("could not determine the running executable: {0}")]
    CurrentExe(#[source] Arc<std::io::Error>),

    #[error("prompt failed: {0}")]
    Prompt(String),
}

/// Fatal errors that abort a gate run without a commit decision.
#[derive(Debug, Clone, Error)]
pub enum GateError {
    #[error("couldn't determine changed files: {0}")]
    Vcs(#[from] VcsQueryError),

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
}

pub(crate) fn io_arc(err: std::io::Error) -> Arc<std::io::Error> {
    Arc::new(err)
}
