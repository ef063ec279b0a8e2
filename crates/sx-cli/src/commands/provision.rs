//! Provision command - create or resume a project's resources.

use anyhow::Result;
use clap::Args;
use owo_colors::OwoColorize;
use sx_core::{ProjectId, ResourcePoolId};
use sx_provision::{ProvisionError, ProvisionReport, StepOutcome};

use crate::{Config, OutputFormat, wiring};

/// Arguments for the provision command.
#[derive(Debug, Args)]
pub struct ProvisionArgs {
    /// Tenant project to provision.
    #[arg()]
    pub project_id: ProjectId,

    /// Resource pool hosting the project.
    #[arg()]
    pub resource_pool_id: ResourcePoolId,
}

/// Execute the provision command.
///
/// # Errors
///
/// Returns an error if the provisioner cannot be configured or the
/// invocation fails.
pub async fn execute(args: ProvisionArgs, config: &Config) -> Result<()> {
    let provisioner = wiring::provisioner(config).await?;

    match provisioner
        .provision(args.project_id, &args.resource_pool_id)
        .await
    {
        Ok(report) => {
            print_report(&report, config)?;
            Ok(())
        }
        Err(err) => {
            print_failure(&err, config)?;
            anyhow::bail!("provisioning project {} failed", args.project_id)
        }
    }
}

fn print_report(report: &ProvisionReport, config: &Config) -> Result<()> {
    match config.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        OutputFormat::Text => {
            println!(
                "Project {} provisioned in {}",
                report.project_id.bold(),
                report.resource_pool_id
            );
            println!("Invocation: {}", report.invocation_id);
            println!();
            for record in &report.steps {
                println!(
                    "  {:<34} {:<8} {}",
                    record.step.name(),
                    format_outcome_colored(record.outcome),
                    record.resource_id
                );
            }
            if report.is_noop() {
                println!();
                println!("{}", "Nothing to do, all resources already recorded".dimmed());
            }
        }
        OutputFormat::Table => {
            use tabled::{Table, Tabled};

            #[derive(Tabled)]
            struct StepRow {
                #[tabled(rename = "Step")]
                step: String,
                #[tabled(rename = "Outcome")]
                outcome: String,
                #[tabled(rename = "Resource")]
                resource: String,
            }

            let rows: Vec<_> = report
                .steps
                .iter()
                .map(|r| StepRow {
                    step: r.step.name().to_string(),
                    outcome: r.outcome.to_string(),
                    resource: r.resource_id.clone(),
                })
                .collect();
            println!("{}", Table::new(rows));
        }
    }
    Ok(())
}

fn print_failure(err: &ProvisionError, config: &Config) -> Result<()> {
    match config.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&err.body())?);
        }
        OutputFormat::Text | OutputFormat::Table => {
            eprintln!(
                "{} {} ({})",
                "error:".red().bold(),
                err.message(),
                err.code()
            );
        }
    }
    Ok(())
}

fn format_outcome_colored(outcome: StepOutcome) -> String {
    let label = outcome.as_str();
    match outcome {
        StepOutcome::Created => label.green().to_string(),
        StepOutcome::Adopted => label.yellow().to_string(),
        StepOutcome::Skipped => label.dimmed().to_string(),
    }
}
