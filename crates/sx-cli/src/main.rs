//! sx CLI - provision tenant projects.
//!
//! The main entry point for the `sx` binary.

use anyhow::Result;
use clap::Parser;

use sx_cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.config()?;

    sx_core::init_logging(config.settings.log_format);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        match cli.command {
            Commands::Provision(args) => sx_cli::commands::provision::execute(args, &config).await,
            Commands::Status(args) => sx_cli::commands::status::execute(args, &config).await,
            Commands::Pools => sx_cli::commands::pools::execute(&config).await,
        }
    })
}
