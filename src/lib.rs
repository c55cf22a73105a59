//! # stagegate - Plugin-driven pre-commit gate
//!
//! stagegate checks exactly what is about to be committed. Every added or
//! modified file is copied out of the git index into a private temporary
//! tree, and each executable in the repository's plugin directory is asked
//! about it:
//!
//! ```text
//! <plugin> check <real path> <temp path> <mime type>
//! ```
//!
//! Exit status 0 accepts the file, 10 vetoes it, anything else is reported as
//! a plugin malfunction and does not block the commit.
//!
//! ## Quick Start
//!
//! ```bash
//! # Install the running binary as .git/hooks/pre-commit
//! stagegate install
//!
//! # Check the staged files without committing
//! stagegate run
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod gate;
pub mod git;
pub mod hooks;
pub mod interrupt;
pub mod mime;
pub mod parallel;
pub mod plugins;
pub mod process;
pub mod workspace;

pub use cli::{Cli, Exit, Output};
pub use config::GateConfig;
pub use gate::{CommitGate, GateOutcome, RunResult};
pub use plugins::{Plugin, PluginRegistry, Verdict};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
