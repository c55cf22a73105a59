//! List discovered plugins and configured checkers

use anyhow::{Context, Result};
use clap::Args;

use crate::cli::{Exit, Output};
use crate::config::GateConfig;
use crate::git::GitRepo;
use crate::plugins::{Plugin, PluginRegistry};

#[derive(Args, Debug, Default)]
pub struct PluginsArgs {
    /// Also run every plugin's install step
    #[arg(long)]
    pub install: bool,
}

pub async fn execute(args: PluginsArgs, config: &GateConfig, output: &Output) -> Result<Exit> {
    let repo = GitRepo::discover().context("Not in a git repository")?;
    let workdir = repo.workdir()?;
    let registry = PluginRegistry::new(config.plugin_dir(workdir));

    output.header("Executable plugins");
    output.table_row("Directory", &registry.dir().display().to_string());
    let mut found = 0;
    for plugin in registry.discover() {
        found += 1;
        let enabled = config.is_plugin_enabled(plugin.name());
        output.status_indicator(
            if enabled { "enabled" } else { "disabled" },
            &plugin.path().display().to_string(),
            enabled,
        );
    }
    if found == 0 {
        output.info("No executable plugins found");
    }

    output.header("Checkers");
    for checker in &config.checkers {
        let active = config.is_checker_active(checker);
        let kinds: Vec<&str> = checker.steps.iter().map(|s| s.kind.as_str()).collect();
        output.status_indicator(
            if active { "enabled" } else { "disabled" },
            &format!("{} ({})", checker.name, kinds.join(", ")),
            active,
        );
    }
    if config.checkers.is_empty() {
        output.info("No checkers configured");
    }

    if args.install {
        super::install::install_plugins(config, workdir, output).await;
    }
    Ok(Exit::Success)
}
