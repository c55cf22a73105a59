//! Command-line interface for stagegate
//!
//! Without a subcommand the binary decides from its environment: started by
//! git as a hook it runs the gate, started by hand it installs itself.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::config::GateConfig;
use crate::hooks;

mod commands;
mod output;

pub use output::Output;

/// Pre-commit gate running checker plugins against staged content
#[derive(Parser)]
#[command(
    name = "stagegate",
    author,
    version,
    about,
    long_about = "stagegate checks the staged version of every added or modified file with \
                  the executable plugins of the repository before a commit is created. \
                  Run it by hand to install it as the repository's pre-commit hook."
)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Run as if started in <DIR> instead of the current working directory
    #[arg(short = 'C', long = "directory", value_name = "DIR", global = true)]
    pub directory: Option<PathBuf>,

    /// Increase verbosity (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Use custom configuration file
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Install this binary as the repository's pre-commit hook
    Install(commands::install::InstallArgs),
    /// Check the staged files now
    Run(commands::run::RunArgs),
    /// Show repository, hook and plugin status
    Status,
    /// Remove the installed hook
    Uninstall(commands::uninstall::UninstallArgs),
    /// List the plugins a run would invoke
    Plugins(commands::plugins::PluginsArgs),
    /// Configuration management
    #[command(subcommand)]
    Config(commands::config::ConfigCommands),
}

/// Process exit status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// Commit accepted, or the command succeeded
    Success,
    /// At least one file was vetoed
    Rejected,
    /// Nothing was decided: listing, workspace, install or configuration failed
    Failure,
    Interrupted,
}

impl Exit {
    pub fn code(self) -> u8 {
        match self {
            Exit::Success => 0,
            Exit::Rejected => 1,
            Exit::Failure => 2,
            Exit::Interrupted => 130,
        }
    }
}

impl From<Exit> for ExitCode {
    fn from(exit: Exit) -> Self {
        ExitCode::from(exit.code())
    }
}

impl Cli {
    pub async fn run(self) -> ExitCode {
        let Cli {
            directory,
            verbose,
            quiet,
            config: config_path,
            command,
        } = self;

        if let Some(dir) = &directory {
            if let Err(err) = std::env::set_current_dir(dir) {
                Output::new(false, quiet)
                    .error(&format!("Cannot change to {}: {err}", dir.display()));
                return Exit::Failure.into();
            }
        }

        let config = match GateConfig::load(config_path.as_deref()) {
            Ok(config) => config,
            Err(err) => {
                Output::new(false, quiet).error(&format!("{err:#}"));
                return Exit::Failure.into();
            }
        };

        setup_logging(verbose, quiet, config.debug);
        let output = Output::new(verbose > 0 || config.debug, quiet);

        // `config` inspects a broken configuration instead of refusing it
        if !matches!(command, Some(Commands::Config(_))) {
            let problems = config.validate();
            if !problems.is_empty() {
                output.error(&format!("Invalid configuration, {} problem(s):", problems.len()));
                for problem in &problems {
                    output.diagnostic(problem);
                }
                return Exit::Failure.into();
            }
        }

        let result = dispatch(command, config, config_path, &output).await;
        match result {
            Ok(exit) => exit.into(),
            Err(err) => {
                output.error(&format!("{err:#}"));
                Exit::Failure.into()
            }
        }
    }
}

async fn dispatch(
    command: Option<Commands>,
    config: GateConfig,
    config_path: Option<PathBuf>,
    output: &Output,
) -> Result<Exit> {
    match command {
        Some(Commands::Install(args)) => commands::install::execute(args, &config, output).await,
        Some(Commands::Run(args)) => commands::run::execute(args, config, output).await,
        Some(Commands::Status) => commands::status::execute(&config, output),
        Some(Commands::Uninstall(args)) => commands::uninstall::execute(args, &config, output),
        Some(Commands::Plugins(args)) => commands::plugins::execute(args, &config, output).await,
        Some(Commands::Config(cmd)) => {
            commands::config::execute(cmd, &config, config_path.as_deref(), output)
        }
        None if hooks::is_hook_invocation(&config) => {
            commands::run::execute(commands::run::RunArgs::default(), config, output).await
        }
        None => {
            commands::install::execute(commands::install::InstallArgs::default(), &config, output)
                .await
        }
    }
}

fn setup_logging(verbose: u8, quiet: bool, debug: bool) {
    if quiet {
        return;
    }

    let level = if debug { verbose.max(2) } else { verbose };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        match level {
            0 => tracing_subscriber::EnvFilter::new("warn"),
            1 => tracing_subscriber::EnvFilter::new("info"),
            2 => tracing_subscriber::EnvFilter::new("debug"),
            _ => tracing_subscriber::EnvFilter::new("trace"),
        }
    });

    // try_init: a second initialization (tests) is not an error
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
