//! Status command - show a project's checkpoint.

use anyhow::{Context, Result};
use clap::Args;
use owo_colors::OwoColorize;
use sx_core::ProjectId;
use sx_provision::{PLAN, ProvisioningStatus, load_status};

use crate::{Config, OutputFormat, wiring};

/// Arguments for the status command.
#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Project to inspect.
    #[arg()]
    pub project_id: ProjectId,
}

/// Execute the status command.
///
/// # Errors
///
/// Returns an error if the checkpoint store cannot be opened or read.
pub async fn execute(args: StatusArgs, config: &Config) -> Result<()> {
    let store = wiring::state_store(config)?;
    let status = load_status(&store, args.project_id)
        .await
        .with_context(|| format!("failed to read checkpoint for project {}", args.project_id))?;

    render(&status, config)
}

fn render(status: &ProvisioningStatus, config: &Config) -> Result<()> {
    match config.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(status)?);
        }
        OutputFormat::Text => {
            let Some(state) = &status.state else {
                println!("Project {} has not been provisioned", status.project_id);
                return Ok(());
            };

            println!("Project: {}", state.project_id);
            println!("Stream: {}", state.stream_id);
            println!("Provider project: {}", state.provider_project_id);
            if let Some(location) = &state.warehouse.dataset_location {
                println!("Location: {location}");
            }
            println!("Updated: {}", state.updated_at.format("%Y-%m-%d %H:%M:%S"));
            println!();
            for step in PLAN {
                match state.get(step.field()) {
                    Some(id) => println!("  {} {:<34} {id}", "✓".green(), step.name()),
                    None => println!("  {} {}", "·".yellow(), step.name()),
                }
            }
            println!();
            if status.is_complete() {
                println!("{}", "Complete".green());
            } else {
                println!("{}", format!("{} step(s) pending", status.pending.len()).yellow());
            }
        }
        OutputFormat::Table => {
            use tabled::{Table, Tabled};

            #[derive(Tabled)]
            struct FieldRow {
                #[tabled(rename = "Step")]
                step: String,
                #[tabled(rename = "Field")]
                field: String,
                #[tabled(rename = "Resource")]
                resource: String,
            }

            let rows: Vec<_> = PLAN
                .iter()
                .map(|step| FieldRow {
                    step: step.name().to_string(),
                    field: step.field().path().to_string(),
                    resource: status
                        .state
                        .as_ref()
                        .and_then(|s| s.get(step.field()))
                        .unwrap_or("-")
                        .to_string(),
                })
                .collect();
            println!("{}", Table::new(rows));
        }
    }
    Ok(())
}
