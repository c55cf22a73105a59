//! Checker plugins and the contract they honor
//!
//! Every plugin is invoked in one of two modes:
//!
//! ```text
//! <plugin> install
//! <plugin> check <real_path> <temp_path> <mime_type>
//! ```
//!
//! and answers with an exit code: `0` accepts the file, `10` vetoes the
//! commit, anything else is a malfunction that is reported and ignored. The
//! merged stdout/stderr is the diagnostic shown to the user on a veto or a
//! malfunction.
//!
//! The gate only ever sees the [`Plugin`] trait. Concrete variants are the
//! executables discovered in the plugin directory ([`ExecutablePlugin`]) and
//! the tool wrappers declared in configuration ([`CommandChecker`],
//! [`CompositeChecker`]).

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::error::PluginError;
use crate::process::{RunFailure, RunLimits};

mod checker;
mod executable;
mod invoker;
mod registry;

pub use checker::{CommandChecker, CompositeChecker, FileFilter, ToolStep};
pub use executable::ExecutablePlugin;
pub use invoker::PluginInvoker;
pub use registry::{Discovery, PluginRegistry};

/// Exit code for "no blocking findings"
pub const EXIT_OK: i32 = 0;

/// Exit code for "this file must not be committed"
pub const EXIT_VETO: i32 = 10;

/// Exit code synthesized by built-in checkers for a malfunction
pub const EXIT_MALFUNCTION: i32 = 1;

/// Outcome of one plugin invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Ok,
    Veto,
    Error,
}

impl Verdict {
    /// Map a raw exit code; `None` (killed by a signal) is a malfunction
    pub fn from_exit_code(code: Option<i32>) -> Self {
        match code {
            Some(EXIT_OK) => Verdict::Ok,
            Some(EXIT_VETO) => Verdict::Veto,
            _ => Verdict::Error,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Ok => write!(f, "OK"),
            Verdict::Veto => write!(f, "VETO"),
            Verdict::Error => write!(f, "ERROR"),
        }
    }
}

/// Arguments of a `check` invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckRequest {
    /// Repository-relative path of the staged file
    pub real_path: PathBuf,
    /// Materialized copy of the staged content
    pub temp_path: PathBuf,
    pub mime_type: String,
}

#[derive(Debug, Clone)]
pub enum InvocationMode {
    Install,
    Check(CheckRequest),
}

impl InvocationMode {
    pub fn label(&self) -> &'static str {
        match self {
            InvocationMode::Install => "install",
            InvocationMode::Check(_) => "check",
        }
    }
}

/// Environment shared by every invocation of a run
#[derive(Debug, Clone)]
pub struct InvokeContext {
    pub limits: RunLimits,
    /// Working directory for plugin processes (the working tree)
    pub cwd: Option<PathBuf>,
}

/// What a plugin reported before the verdict is derived
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawOutcome {
    pub exit_code: Option<i32>,
    pub output: String,
}

impl RawOutcome {
    pub fn new(exit_code: i32, output: impl Into<String>) -> Self {
        Self {
            exit_code: Some(exit_code),
            output: output.into(),
        }
    }

    pub fn ok() -> Self {
        Self::new(EXIT_OK, String::new())
    }
}

/// One plugin's verdict for one file (or for its install step)
#[derive(Debug, Clone, Serialize)]
pub struct PluginOutcome {
    pub plugin: String,
    pub verdict: Verdict,
    pub output: String,
    #[serde(skip)]
    pub elapsed: Duration,
}

/// The single interface the gate depends on
#[async_trait]
pub trait Plugin: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    async fn invoke(
        &self,
        mode: &InvocationMode,
        ctx: &InvokeContext,
    ) -> Result<RawOutcome, PluginError>;
}

pub type PluginSet = Vec<Arc<dyn Plugin>>;

pub(crate) fn plugin_error(name: &str, failure: RunFailure, timeout: Duration) -> PluginError {
    match failure {
        RunFailure::Spawn(err) => PluginError::Launch {
            name: name.to_string(),
            source: Arc::new(err),
        },
        RunFailure::Io(err) => PluginError::Io {
            name: name.to_string(),
            source: Arc::new(err),
        },
        RunFailure::TimedOut => PluginError::Timeout {
            name: name.to_string(),
            timeout,
        },
        RunFailure::Interrupted => PluginError::Interrupted {
            name: name.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_mapping() {
        assert_eq!(Verdict::from_exit_code(Some(0)), Verdict::Ok);
        assert_eq!(Verdict::from_exit_code(Some(10)), Verdict::Veto);
        assert_eq!(Verdict::from_exit_code(Some(1)), Verdict::Error);
        assert_eq!(Verdict::from_exit_code(Some(11)), Verdict::Error);
        assert_eq!(Verdict::from_exit_code(Some(-10)), Verdict::Error);
        assert_eq!(Verdict::from_exit_code(None), Verdict::Error);
    }

    #[test]
    fn test_spawn_failure_becomes_launch_error() {
        let err = plugin_error(
            "check-python",
            RunFailure::Spawn(std::io::Error::from(std::io::ErrorKind::PermissionDenied)),
            Duration::from_secs(5),
        );
        assert!(matches!(err, PluginError::Launch { .. }));
        assert!(err.to_string().contains("check-python"));
    }
}
