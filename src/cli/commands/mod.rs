//! Command implementations for the stagegate CLI
//!
//! Each command is organized into its own module and returns the process
//! [`Exit`](super::Exit) status.

pub mod config;
pub mod install;
pub mod plugins;
pub mod run;
pub mod status;
pub mod uninstall;
