//! # sx-cli
//!
//! Command-line interface for provisioning tenant projects.
//!
//! ## Commands
//!
//! - `sx provision <project-id> <resource-pool-id>` - Provision (or resume) a project
//! - `sx status <project-id>` - Show a project's checkpoint and pending steps
//! - `sx pools` - List the configured resource pools
//!
//! ## Configuration
//!
//! Settings come from `SX_*` environment variables (see
//! [`sx_provision::Config`]); the flags below override them:
//!
//! - `SX_STATE_BUCKET` / `--state-bucket` - Checkpoint location (`gs://` or `file://`, required)
//! - `SX_RESOURCE_POOLS_FILE` / `--resource-pools-file` - Resource pool catalog

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
// CLI uses print! macros intentionally
#![allow(clippy::print_stdout)]
#![allow(clippy::print_stderr)]

pub mod commands;
pub mod wiring;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

/// sx provisioner command-line interface.
#[derive(Debug, Parser)]
#[command(name = "sx")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Object-store URL for checkpoints (`gs://bucket/prefix` or `file:///path`).
    #[arg(long, global = true)]
    pub state_bucket: Option<String>,

    /// JSON file listing resource pools.
    #[arg(long, global = true)]
    pub resource_pools_file: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Effective configuration: environment first, then flags.
    ///
    /// # Errors
    ///
    /// Returns an error if an `SX_*` variable holds an invalid value.
    pub fn config(&self) -> Result<Config> {
        let settings = sx_provision::Config::from_env().context("invalid SX_* configuration")?;
        Ok(self.apply(settings))
    }

    fn apply(&self, mut settings: sx_provision::Config) -> Config {
        if let Some(bucket) = &self.state_bucket {
            settings.state_bucket = Some(bucket.clone());
        }
        if let Some(file) = &self.resource_pools_file {
            settings.resource_pools_file = Some(file.clone());
        }
        Config {
            settings,
            format: self.format.clone(),
        }
    }
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Provision every resource of a project, resuming earlier progress.
    Provision(commands::provision::ProvisionArgs),
    /// Show a project's provisioning checkpoint.
    Status(commands::status::StatusArgs),
    /// List resource pools.
    Pools,
}

/// Output format.
#[derive(Debug, Clone, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output.
    Json,
    /// Table output.
    Table,
}

/// CLI configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Provisioner settings.
    pub settings: sx_provision::Config,
    /// Output format.
    pub format: OutputFormat,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_settings() {
        let cli = Cli::parse_from([
            "sx",
            "--state-bucket",
            "gs://acme-state/sx",
            "--resource-pools-file",
            "/etc/sx/pools.json",
            "--format",
            "json",
            "status",
            "42",
        ]);

        let config = cli.apply(sx_provision::Config::default());
        assert_eq!(
            config.settings.state_bucket.as_deref(),
            Some("gs://acme-state/sx")
        );
        assert_eq!(
            config.settings.resource_pools_file.as_deref(),
            Some("/etc/sx/pools.json")
        );
        assert!(matches!(config.format, OutputFormat::Json));
        assert!(matches!(cli.command, Commands::Status(_)));
    }

    #[test]
    fn settings_survive_without_flags() {
        let cli = Cli::parse_from(["sx", "pools"]);
        let mut settings = sx_provision::Config::default();
        settings.resource_pools_file = Some("pools.json".into());
        settings.state_bucket = Some("file:///var/lib/sx".into());

        let config = cli.apply(settings);
        assert_eq!(config.settings.state_bucket.as_deref(), Some("file:///var/lib/sx"));
        assert_eq!(config.settings.resource_pools_file.as_deref(), Some("pools.json"));
        assert!(matches!(config.format, OutputFormat::Text));
    }

    #[test]
    fn provision_parses_ids() {
        let cli = Cli::parse_from(["sx", "provision", "42", "eu-pool"]);
        let Commands::Provision(args) = cli.command else {
            panic!("expected provision");
        };
        assert_eq!(args.project_id.get(), 42);
        assert_eq!(args.resource_pool_id.as_str(), "eu-pool");
    }

    #[test]
    fn rejects_zero_project() {
        assert!(Cli::try_parse_from(["sx", "provision", "0", "eu-pool"]).is_err());
    }
}
