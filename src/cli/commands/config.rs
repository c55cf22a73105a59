//! Configuration command implementations

use std::path::Path;

use anyhow::{Context, Result};
use clap::{Subcommand, ValueEnum};

use crate::cli::{Exit, Output};
use crate::config::{GateConfig, REPO_CONFIG_FILE};

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the merged configuration
    Show {
        #[arg(long, value_enum, default_value_t = Format::Toml)]
        format: Format,
    },
    /// Check the merged configuration for problems
    Validate,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Toml,
    Json,
}

pub fn execute(
    cmd: ConfigCommands,
    config: &GateConfig,
    config_path: Option<&Path>,
    output: &Output,
) -> Result<Exit> {
    match cmd {
        ConfigCommands::Show { format } => {
            let rendered = match format {
                Format::Toml => config.to_toml()?,
                Format::Json => serde_json::to_string_pretty(config)
                    .context("Failed to serialize configuration")?,
            };
            println!("{}", rendered.trim_end());
            Ok(Exit::Success)
        }
        ConfigCommands::Validate => {
            let source = config_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| format!("defaults + {REPO_CONFIG_FILE}"));
            let problems = config.validate();
            if problems.is_empty() {
                output.success(&format!("Configuration is valid ({source})"));
                return Ok(Exit::Success);
            }

            output.error(&format!("Configuration has {} problem(s) ({source})", problems.len()));
            for problem in &problems {
                output.diagnostic(problem);
            }
            Ok(Exit::Failure)
        }
    }
}
