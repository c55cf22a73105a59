use anyhow::{Context, Result};
use clap::Args;

use crate::cli::{Exit, Output};
use crate::config::GateConfig;
use crate::error::InstallError;
use crate::git::GitRepo;
use crate::hooks::Installer;

#[derive(Args, Debug, Default)]
pub struct UninstallArgs {
    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

pub fn execute(args: UninstallArgs, config: &GateConfig, output: &Output) -> Result<Exit> {
    let repo = GitRepo::discover().context("Not in a git repository")?;
    let installer = Installer::new(&repo, config);
    let hook = installer.hook_path();

    if !installer.is_installed() {
        output.info(&format!("No hook installed at {}", hook.display()));
        return Ok(Exit::Success);
    }

    if !args.yes {
        let prompt = format!("Remove the pre-commit hook at {}?", hook.display());
        let confirmed = output
            .confirm(&prompt, false)
            .map_err(|err| InstallError::Prompt(err.to_string()))?;
        if !confirmed {
            output.info("Uninstall cancelled");
            return Ok(Exit::Success);
        }
    }

    if installer.uninstall()? {
        output.success(&format!("Removed {}", hook.display()));
    }
    Ok(Exit::Success)
}
