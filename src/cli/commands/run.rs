use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use crate::cli::{Exit, Output};
use crate::config::GateConfig;
use crate::git::GitRepo;
use crate::hooks::{self, HookContext, RunOptions};
use crate::interrupt;

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Do not compare the installed hook with the repository's copy
    #[arg(long)]
    pub skip_stale_check: bool,

    /// Plugin directory, overriding gate.plugin_dir
    #[arg(long, value_name = "DIR")]
    pub plugin_dir: Option<PathBuf>,

    /// Print the result as JSON instead of the styled report
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: RunArgs, mut config: GateConfig, output: &Output) -> Result<Exit> {
    if let Some(dir) = args.plugin_dir {
        config.gate.plugin_dir = dir;
    }
    let options = RunOptions {
        check_staleness: hooks::is_hook_invocation(&config) && !args.skip_stale_check,
        json: args.json,
    };

    let repo = GitRepo::discover().context("Not in a git repository")?;
    let (trigger, interrupt) = interrupt::channel();
    let ctrl_c = trigger.spawn_ctrl_c();

    let context = HookContext {
        repo,
        config,
        interrupt,
    };
    let result = hooks::pre_commit::execute(&context, output, options).await;

    ctrl_c.abort();
    result
}
