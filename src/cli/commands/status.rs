//! Show repository, hook and plugin status

use anyhow::{Context, Result};

use crate::cli::{Exit, Output};
use crate::config::GateConfig;
use crate::error::InstallError;
use crate::git::GitRepo;
use crate::hooks::{self, Freshness, Installer};
use crate::plugins::PluginRegistry;

pub fn execute(config: &GateConfig, output: &Output) -> Result<Exit> {
    let repo = GitRepo::discover().context("Not in a git repository")?;
    let installer = Installer::new(&repo, config);

    output.header("Repository");
    output.table_row("Git directory", &repo.git_dir().display().to_string());
    match repo.workdir() {
        Ok(workdir) => output.table_row("Working tree", &workdir.display().to_string()),
        Err(_) => output.table_row("Working tree", "none (bare repository)"),
    }
    output.table_row("Hooks directory", &repo.hooks_dir().display().to_string());
    output.table_row("Has HEAD", if repo.has_head() { "yes" } else { "no (initial commit)" });

    output.header("Hook");
    let hook = installer.hook_path();
    output.status_indicator(
        if installer.is_installed() { "installed" } else { "missing" },
        &hook.display().to_string(),
        installer.is_installed(),
    );
    match installer.check_freshness() {
        Ok(Freshness::Fresh) => output.status_indicator("fresh", "matches the repository copy", true),
        Ok(Freshness::SourceMissing(source)) => {
            output.info(&format!("No repository copy at {}", source.display()));
        }
        Ok(Freshness::NoWorkTree) => output.info("No working tree, staleness check skipped"),
        Err(InstallError::NotInstalled(_)) => {}
        Err(err) => output.status_indicator("stale", &err.to_string(), false),
    }
    output.table_row(
        "Hook mode",
        if hooks::is_hook_invocation(config) { "yes" } else { "no" },
    );

    let Ok(workdir) = repo.workdir() else {
        return Ok(Exit::Success);
    };
    let registry = PluginRegistry::new(config.plugin_dir(workdir));
    output.header("Plugins");
    output.table_row("Directory", &registry.dir().display().to_string());
    let plugins = registry.load(config);
    if plugins.is_empty() {
        output.info("No plugins enabled");
    }
    for plugin in &plugins {
        output.list_item(plugin.name());
    }

    Ok(Exit::Success)
}
