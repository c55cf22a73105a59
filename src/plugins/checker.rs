//! Built-in checkers that wrap third-party syntax and style tools.
//!
//! A [`CommandChecker`] runs one tool against the materialized file and
//! translates the tool's exit status into the plugin contract. A
//! [`CompositeChecker`] runs several checkers for the same file type, the
//! way a language usually gets a syntax pass followed by a lint pass, and
//! reports the findings of all of them.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

use super::{
    CheckRequest, EXIT_MALFUNCTION, EXIT_OK, EXIT_VETO, InvocationMode, InvokeContext, Plugin,
    RawOutcome, plugin_error,
};
use crate::config::{CheckerConfig, StepConfig, StepKind};
use crate::error::PluginError;
use crate::process;

/// Which files a checker cares about
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileFilter {
    extensions: Vec<String>,
    mime_types: Vec<String>,
}

impl FileFilter {
    pub fn new(extensions: Vec<String>, mime_types: Vec<String>) -> Self {
        let extensions = extensions
            .into_iter()
            .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
            .collect();
        Self {
            extensions,
            mime_types,
        }
    }

    /// An empty filter matches everything
    pub fn matches(&self, request: &CheckRequest) -> bool {
        if self.extensions.is_empty() && self.mime_types.is_empty() {
            return true;
        }
        has_extension(&request.real_path, &self.extensions)
            || self.mime_types.iter().any(|mime| *mime == request.mime_type)
    }
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
}

/// One tool invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolStep {
    pub kind: StepKind,
    pub command: Vec<String>,
    pub blocking: bool,
    pub ignore_output: Vec<String>,
}

impl From<&StepConfig> for ToolStep {
    fn from(step: &StepConfig) -> Self {
        Self {
            kind: step.kind,
            command: step.command.clone(),
            blocking: step.is_blocking(),
            ignore_output: step.ignore_output.clone(),
        }
    }
}

impl ToolStep {
    fn program(&self) -> Option<&str> {
        self.command.first().map(String::as_str)
    }

    fn kind_label(&self) -> &'static str {
        self.kind.as_str()
    }

    /// Substitute `{path}`, `{temp}` and `{mime}` in the arguments
    fn render_args(&self, request: &CheckRequest) -> Vec<String> {
        let real = request.real_path.to_string_lossy();
        let temp = request.temp_path.to_string_lossy();
        self.command
            .iter()
            .skip(1)
            .map(|arg| {
                arg.replace("{path}", &real)
                    .replace("{temp}", &temp)
                    .replace("{mime}", &request.mime_type)
            })
            .collect()
    }

    /// Drop ignored lines and report findings against the real path
    fn clean_output(&self, output: &str, request: &CheckRequest) -> String {
        let real = request.real_path.to_string_lossy();
        let temp = request.temp_path.to_string_lossy();
        output
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter(|line| !self.ignore_output.iter().any(|pattern| line.contains(pattern)))
            .map(|line| format!("    {}", line.replace(temp.as_ref(), &real)))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Runs a single tool step against matching files
#[derive(Debug, Clone)]
pub struct CommandChecker {
    name: String,
    filter: FileFilter,
    step: ToolStep,
}

impl CommandChecker {
    pub fn new(name: impl Into<String>, filter: FileFilter, step: ToolStep) -> Self {
        Self {
            name: name.into(),
            filter,
            step,
        }
    }

    fn install(&self) -> RawOutcome {
        let Some(program) = self.step.program() else {
            return RawOutcome::new(EXIT_MALFUNCTION, format!("{}: empty command", self.name));
        };
        match which::which(program) {
            Ok(path) => RawOutcome::new(EXIT_OK, format!("using {}", path.display())),
            Err(_) => RawOutcome::new(
                EXIT_MALFUNCTION,
                format!("missing {program}, install it to enable the {} check", self.name),
            ),
        }
    }

    async fn check(
        &self,
        request: &CheckRequest,
        ctx: &InvokeContext,
    ) -> Result<RawOutcome, PluginError> {
        if !self.filter.matches(request) {
            return Ok(RawOutcome::ok());
        }
        let Some(program) = self.step.program() else {
            return Ok(RawOutcome::new(
                EXIT_MALFUNCTION,
                format!("{}: empty command", self.name),
            ));
        };

        let args = self.step.render_args(request);
        tracing::debug!(checker = %self.name, %program, ?args, "running tool");

        let captured =
            process::run_captured(Path::new(program), &args, ctx.cwd.as_deref(), &ctx.limits)
                .await
                .map_err(|failure| plugin_error(&self.name, failure, ctx.limits.timeout))?;

        let findings = self.step.clean_output(&captured.output, request);
        let report = format!("{} {} check failed:\n{findings}", self.name, self.step.kind_label());

        Ok(match captured.code() {
            Some(EXIT_OK) => RawOutcome::ok(),
            // Killed by a signal: the tool malfunctioned, the file is not at fault
            None => RawOutcome {
                exit_code: None,
                output: report,
            },
            Some(_) if self.step.blocking => RawOutcome::new(EXIT_VETO, report),
            Some(_) => RawOutcome::new(EXIT_OK, report),
        })
    }
}

#[async_trait]
impl Plugin for CommandChecker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(
        &self,
        mode: &InvocationMode,
        ctx: &InvokeContext,
    ) -> Result<RawOutcome, PluginError> {
        match mode {
            InvocationMode::Install => Ok(self.install()),
            InvocationMode::Check(request) => self.check(request, ctx).await,
        }
    }
}

/// Runs every member checker; a veto wins over malfunctions
#[derive(Debug, Clone)]
pub struct CompositeChecker {
    name: String,
    members: Vec<Arc<dyn Plugin>>,
}

impl CompositeChecker {
    pub fn new(name: impl Into<String>, members: Vec<Arc<dyn Plugin>>) -> Self {
        Self {
            name: name.into(),
            members,
        }
    }

    /// Build the plugin for a configured checker
    pub fn from_config(config: &CheckerConfig) -> Arc<dyn Plugin> {
        let filter = FileFilter::new(config.extensions.clone(), config.mime_types.clone());
        let mut members: Vec<Arc<dyn Plugin>> = config
            .steps
            .iter()
            .map(|step| {
                let step = ToolStep::from(step);
                let name = if config.steps.len() == 1 {
                    config.name.clone()
                } else {
                    format!("{}/{}", config.name, step.kind_label())
                };
                Arc::new(CommandChecker::new(name, filter.clone(), step)) as Arc<dyn Plugin>
            })
            .collect();

        if members.len() == 1 {
            if let Some(single) = members.pop() {
                return single;
            }
        }
        Arc::new(Self::new(config.name.clone(), members))
    }
}

#[async_trait]
impl Plugin for CompositeChecker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(
        &self,
        mode: &InvocationMode,
        ctx: &InvokeContext,
    ) -> Result<RawOutcome, PluginError> {
        let mut vetoed = false;
        let mut malfunction: Option<Option<i32>> = None;
        let mut sections = Vec::new();

        for member in &self.members {
            match member.invoke(mode, ctx).await {
                Ok(raw) => {
                    match raw.exit_code {
                        Some(EXIT_OK) => {}
                        Some(EXIT_VETO) => vetoed = true,
                        other => {
                            malfunction.get_or_insert(other);
                        }
                    }
                    if !raw.output.trim().is_empty() {
                        sections.push(raw.output);
                    }
                }
                Err(err @ PluginError::Interrupted { .. }) => return Err(err),
                Err(err) => {
                    malfunction.get_or_insert(Some(EXIT_MALFUNCTION));
                    sections.push(err.to_string());
                }
            }
        }

        let exit_code = if vetoed {
            Some(EXIT_VETO)
        } else {
            malfunction.unwrap_or(Some(EXIT_OK))
        };
        Ok(RawOutcome {
            exit_code,
            output: sections.join("\n"),
        })
    }
}
