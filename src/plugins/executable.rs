//! Plugins discovered as executables in the plugin directory.

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use super::{InvocationMode, InvokeContext, Plugin, RawOutcome, plugin_error};
use crate::error::PluginError;
use crate::process;

/// An external executable honoring the install/check contract
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutablePlugin {
    name: String,
    path: PathBuf,
}

impl ExecutablePlugin {
    /// The plugin is named after its file name
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self { name, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn arguments(mode: &InvocationMode) -> Vec<OsString> {
        match mode {
            InvocationMode::Install => vec![OsString::from("install")],
            InvocationMode::Check(request) => vec![
                OsString::from("check"),
                request.real_path.clone().into_os_string(),
                request.temp_path.clone().into_os_string(),
                OsString::from(&request.mime_type),
            ],
        }
    }
}

#[async_trait]
impl Plugin for ExecutablePlugin {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(
        &self,
        mode: &InvocationMode,
        ctx: &InvokeContext,
    ) -> Result<RawOutcome, PluginError> {
        let args = Self::arguments(mode);
        tracing::debug!(plugin = %self.name, path = %self.path.display(), ?args, "invoking plugin");

        let captured = process::run_captured(&self.path, &args, ctx.cwd.as_deref(), &ctx.limits)
            .await
            .map_err(|failure| plugin_error(&self.name, failure, ctx.limits.timeout))?;

        Ok(RawOutcome {
            exit_code: captured.code(),
            output: captured.output,
        })
    }
}
