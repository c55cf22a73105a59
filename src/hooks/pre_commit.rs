//! Pre-commit hook implementation
//!
//! Checks the installed hook against the repository copy, runs the gate over
//! the staged files and prints the report git shows the committer.

use anyhow::{Context, Result};
use tracing::warn;

use super::Installer;
use crate::cli::{Exit, Output};
use crate::config::GateConfig;
use crate::error::InstallError;
use crate::gate::{CommitGate, GateOutcome, RunResult};
use crate::git::GitRepo;
use crate::interrupt::Interrupt;
use crate::plugins::PluginRegistry;

/// Everything one hook run needs
pub struct HookContext {
    pub repo: GitRepo,
    pub config: GateConfig,
    pub interrupt: Interrupt,
}

/// Per-run switches set from the command line
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub check_staleness: bool,
    /// Print the run result as JSON on stdout instead of the styled report
    pub json: bool,
}

/// Execute the pre-commit hook
pub async fn execute(context: &HookContext, output: &Output, options: RunOptions) -> Result<Exit> {
    let HookContext {
        repo,
        config,
        interrupt,
    } = context;

    if options.check_staleness {
        match Installer::new(repo, config).check_freshness() {
            Ok(_) => {}
            Err(InstallError::NotInstalled(path)) => {
                warn!(hook = %path.display(), "Running without an installed hook");
            }
            Err(err) => return Err(err.into()),
        }
    }

    let workdir = repo
        .workdir()
        .context("The pre-commit hook needs a working tree")?;
    let plugins = PluginRegistry::new(config.plugin_dir(workdir)).load(config);
    if plugins.is_empty() {
        output.verbose("No plugins enabled, nothing to check");
    }

    let gate = CommitGate::new(
        repo.staged_source()?,
        plugins,
        config,
        Some(workdir.to_path_buf()),
        interrupt.clone(),
    );
    let outcome = gate.run().await?;

    if options.json {
        let json = serde_json::to_string_pretty(outcome.result())
            .context("Failed to serialize run result")?;
        println!("{json}");
        return Ok(exit_for(&outcome));
    }

    render(outcome.result(), output);
    match &outcome {
        GateOutcome::Accepted(result) => output.success(&summary(result)),
        GateOutcome::Rejected(result) => output.critical(&format!(
            "Found {} error(s), aborting commit.",
            result.bad_file_count()
        )),
        GateOutcome::Aborted(_) => output.critical("Interrupted, commit aborted"),
    }
    Ok(exit_for(&outcome))
}

fn exit_for(outcome: &GateOutcome) -> Exit {
    match outcome {
        GateOutcome::Accepted(_) => Exit::Success,
        GateOutcome::Rejected(_) => Exit::Rejected,
        GateOutcome::Aborted(_) => Exit::Interrupted,
    }
}

fn render(result: &RunResult, output: &Output) {
    for file in &result.files {
        let path = file.path.display().to_string();

        if let Some(error) = &file.materialize_error {
            output.warning(&format!("{path}: staged content unavailable, not checked"));
            output.indent(error);
        }
        for outcome in file.malfunctions() {
            output.warning(&format!("{}: plugin {} malfunctioned", path, outcome.plugin));
            output.indent(outcome.output.trim_end());
        }
        if output.is_verbose() {
            for outcome in file.notes() {
                output.info(&format!("{}: {}", path, outcome.plugin));
                output.indent(outcome.output.trim_end());
            }
        }
    }

    for file in result.bad_files() {
        let plugins: Vec<&str> = file.vetoes().map(|o| o.plugin.as_str()).collect();
        output.failed_file(&file.path.display().to_string(), &plugins.join(", "));
        for outcome in file.vetoes() {
            if !outcome.output.trim().is_empty() {
                output.diagnostic(outcome.output.trim_end());
            }
        }
    }
}

fn summary(result: &RunResult) -> String {
    let files = result.files.len();
    let mut line = format!(
        "Checked {} file{} with {} plugin{}",
        files,
        if files == 1 { "" } else { "s" },
        result.plugin_count,
        if result.plugin_count == 1 { "" } else { "s" },
    );
    let malfunctions = result.malfunction_count();
    if malfunctions > 0 {
        line.push_str(&format!(", {malfunctions} plugin malfunction(s) ignored"));
    }
    line
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;
    use std::process::Command;
    use tempfile::TempDir;

    fn git(dir: &Path, args: &[&str]) {
        let status = Command::new("git")
            .args(["-c", "user.name=Test", "-c", "user.email=test@example.com"])
            .args(args)
            .current_dir(dir)
            .env_remove("GIT_DIR")
            .env_remove("GIT_INDEX_FILE")
            .status()
            .unwrap();
        assert!(status.success(), "git {args:?} failed");
    }

    fn plugin(dir: &Path, name: &str, body: &str) {
        let plugins = dir.join("pre-commit-plugins");
        fs::create_dir_all(&plugins).unwrap();
        let path = plugins.join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    fn context(dir: &Path) -> HookContext {
        let mut config = GateConfig::default();
        config.gate.mime_command = vec!["sh".into(), "-c".into(), "echo text/plain".into()];
        HookContext {
            repo: GitRepo::open(dir).unwrap(),
            config,
            interrupt: Interrupt::never(),
        }
    }

    fn staged_repo() -> TempDir {
        let temp = TempDir::new().unwrap();
        git(temp.path(), &["init", "-q"]);
        fs::write(temp.path().join("a.txt"), "hello\n").unwrap();
        git(temp.path(), &["add", "a.txt"]);
        temp
    }

    #[tokio::test]
    async fn test_veto_rejects_commit() {
        let temp = staged_repo();
        plugin(temp.path(), "deny", "[ \"$1\" = install ] && exit 0\necho nope\nexit 10");

        let quiet = Output::new(false, true);
        let exit = execute(&context(temp.path()), &quiet, RunOptions::default())
            .await
            .unwrap();
        assert_eq!(exit, Exit::Rejected);
    }

    #[tokio::test]
    async fn test_malfunction_does_not_reject() {
        let temp = staged_repo();
        plugin(temp.path(), "broken", "exit 3");
        plugin(temp.path(), "fine", "exit 0");

        let quiet = Output::new(false, true);
        let exit = execute(&context(temp.path()), &quiet, RunOptions::default())
            .await
            .unwrap();
        assert_eq!(exit, Exit::Success);
    }

    #[tokio::test]
    async fn test_stale_hook_fails_before_checking() {
        let temp = staged_repo();
        plugin(temp.path(), "deny", "exit 10");

        let ctx = context(temp.path());
        let hooks = temp.path().join(".git/hooks");
        fs::create_dir_all(&hooks).unwrap();
        fs::write(hooks.join("pre-commit"), "old").unwrap();
        // Repository copy newer than the installed one
        let source = temp.path().join("pre-commit");
        fs::write(&source, "new").unwrap();
        let later = std::time::SystemTime::now() + std::time::Duration::from_secs(60);
        fs::File::options()
            .write(true)
            .open(&source)
            .unwrap()
            .set_modified(later)
            .unwrap();

        let options = RunOptions {
            check_staleness: true,
            json: false,
        };
        let err = execute(&ctx, &Output::new(false, true), options)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("has been updated"));
    }

    #[test]
    fn test_summary_pluralization() {
        let result = RunResult {
            files: Vec::new(),
            plugin_count: 1,
            interrupted: false,
            workspace_root: std::path::PathBuf::new(),
        };
        assert_eq!(summary(&result), "Checked 0 files with 1 plugin");
    }
}
