//! Pools command - list configured resource pools.

use anyhow::Result;
use sx_provision::metadata::ResourcePoolDirectory;

use crate::{Config, OutputFormat, wiring};

/// Execute the pools command.
///
/// # Errors
///
/// Returns an error if the pool catalog is missing or invalid.
pub async fn execute(config: &Config) -> Result<()> {
    let pools = wiring::resource_pools(config).await?.list_available().await?;

    match config.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&pools)?);
        }
        OutputFormat::Text => {
            if pools.is_empty() {
                println!("No resource pools configured");
                return Ok(());
            }
            for pool in &pools {
                println!(
                    "  {} {} ({}, {})",
                    pool.id,
                    pool.name,
                    pool.provider_project_id(),
                    pool.resources.gcloud_multi_region_location
                );
            }
        }
        OutputFormat::Table => {
            use tabled::{Table, Tabled};

            #[derive(Tabled)]
            struct PoolRow {
                #[tabled(rename = "Pool ID")]
                id: String,
                #[tabled(rename = "Name")]
                name: String,
                #[tabled(rename = "Provider Project")]
                project: String,
                #[tabled(rename = "Location")]
                location: String,
            }

            let rows: Vec<_> = pools
                .iter()
                .map(|p| PoolRow {
                    id: p.id.to_string(),
                    name: p.name.clone(),
                    project: p.provider_project_id().to_string(),
                    location: p.resources.gcloud_multi_region_location.to_string(),
                })
                .collect();
            println!("{}", Table::new(rows));
        }
    }

    Ok(())
}
