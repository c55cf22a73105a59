//! Install the running binary as the pre-commit hook
//!
//! After the copy, every plugin gets a chance to check its own prerequisites
//! through its `install` mode.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;

use crate::cli::{Exit, Output};
use crate::config::GateConfig;
use crate::error::InstallError;
use crate::git::GitRepo;
use crate::hooks::{Installer, run_plugin_installs};
use crate::interrupt::Interrupt;
use crate::plugins::{PluginInvoker, PluginRegistry, Verdict};
use crate::process::RunLimits;

#[derive(Args, Debug, Default)]
pub struct InstallArgs {
    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Do not run the plugins' install step
    #[arg(long)]
    pub skip_plugins: bool,
}

pub async fn execute(args: InstallArgs, config: &GateConfig, output: &Output) -> Result<Exit> {
    let repo = GitRepo::discover().context("Not in a git repository")?;
    let installer = Installer::new(&repo, config);
    let hook = installer.hook_path();

    if !args.yes {
        let prompt = format!("Install this pre-commit hook to {}?", hook.display());
        let confirmed = output
            .confirm(&prompt, true)
            .map_err(|err| InstallError::Prompt(err.to_string()))?;
        if !confirmed {
            return Err(InstallError::Declined.into());
        }
    }

    let installed = installer.install().context("Failed to install the hook")?;
    output.success(&format!("Installed pre-commit hook at {}", installed.display()));

    if args.skip_plugins {
        return Ok(Exit::Success);
    }

    let workdir = repo.workdir()?;
    install_plugins(config, workdir, output).await;
    Ok(Exit::Success)
}

/// Run every plugin's install step and print what each one reported
pub(crate) async fn install_plugins(config: &GateConfig, workdir: &Path, output: &Output) {
    let plugins = PluginRegistry::new(config.plugin_dir(workdir)).load(config);
    if plugins.is_empty() {
        output.info("No plugins to install");
        return;
    }

    let invoker = PluginInvoker::new(
        RunLimits {
            timeout: config.timeout(),
            max_output_bytes: config.gate.max_output_bytes,
            interrupt: Interrupt::never(),
        },
        Some(workdir.to_path_buf()),
    );

    output.header("Plugins");
    for outcome in run_plugin_installs(&plugins, &invoker).await {
        let ok = outcome.verdict == Verdict::Ok;
        let status = if ok { "ok" } else { "failed" };
        output.status_indicator(status, &outcome.plugin, ok);
        if !outcome.output.trim().is_empty() {
            output.indent(outcome.output.trim_end());
        }
    }
}
