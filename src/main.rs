use std::process::ExitCode;

use clap::Parser;
use stagegate::cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    cli.run().await
}
