//! Builds the provisioner from configuration.

use std::sync::Arc;

use anyhow::{Context, Result};
use sx_provision::metadata::pools::StaticResourcePools;
use sx_provision::store::object::ObjectStateStore;
use sx_provision::{GcpClientFactory, Provisioner};

use crate::Config;

/// Loads the resource pool catalog named by the configuration.
///
/// # Errors
///
/// Returns an error if no catalog is configured or it cannot be loaded.
pub async fn resource_pools(config: &Config) -> Result<StaticResourcePools> {
    let path = config.settings.resource_pools_file.as_deref().context(
        "Resource pool catalog is required. Set SX_RESOURCE_POOLS_FILE or use --resource-pools-file",
    )?;
    StaticResourcePools::from_file(path)
        .await
        .with_context(|| format!("failed to load resource pools from {path}"))
}

/// Opens the checkpoint store named by the configuration.
///
/// Each `sx` invocation is its own process, so a `memory://` store would
/// drop every checkpoint on exit and is refused.
///
/// # Errors
///
/// Returns an error if no bucket is configured, it is in-memory, or it
/// cannot be opened.
pub fn state_store(config: &Config) -> Result<ObjectStateStore> {
    let bucket = config.settings.state_bucket.as_deref().context(
        "Checkpoint bucket is required. Set SX_STATE_BUCKET or use --state-bucket",
    )?;
    if bucket.trim_start().starts_with("memory:") {
        anyhow::bail!(
            "Checkpoint bucket '{bucket}' does not outlive the process. Use a gs:// or file:// URL"
        );
    }
    config
        .settings
        .state_store()
        .with_context(|| format!("failed to open checkpoint store {bucket}"))
}

/// Builds a provisioner backed by BigQuery, Pub/Sub and the configured stores.
///
/// # Errors
///
/// Returns an error if any collaborator cannot be configured.
pub async fn provisioner(config: &Config) -> Result<Provisioner> {
    let settings = &config.settings;
    tracing::debug!(
        state_bucket = ?settings.state_bucket,
        serialize_per_project = settings.serialize_per_project,
        "building provisioner"
    );
    let pools = resource_pools(config).await?;
    let tenants = settings
        .tenant_directory()
        .context("failed to configure tenant lookup")?;
    let store = state_store(config)?;
    let reporter = settings
        .failure_reporter()
        .context("failed to configure failure reporter")?;

    Ok(Provisioner::new(
        Arc::new(pools),
        Arc::new(tenants),
        Arc::new(store),
        Arc::new(GcpClientFactory),
        reporter,
    )
    .with_service_name(settings.service_name.clone())
    .with_project_serialization(settings.serialize_per_project))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_bucket(bucket: Option<&str>) -> Config {
        let mut config = Config::default();
        config.settings.state_bucket = bucket.map(str::to_string);
        config
    }

    #[test]
    fn state_store_requires_bucket() {
        let err = state_store(&with_bucket(None)).unwrap_err();
        assert!(err.to_string().contains("SX_STATE_BUCKET"));
    }

    #[test]
    fn state_store_refuses_in_memory_bucket() {
        let err = state_store(&with_bucket(Some("memory://"))).unwrap_err();
        assert!(err.to_string().contains("does not outlive the process"));
    }

    #[test]
    fn state_store_opens_file_bucket() {
        let dir = std::env::temp_dir().join(format!("sx-wiring-{}", std::process::id()));
        let opened = state_store(&with_bucket(Some(&format!("file://{}", dir.display()))));
        std::fs::remove_dir_all(&dir).ok();
        assert!(opened.is_ok());
    }

    #[tokio::test]
    async fn provisioner_requires_bucket() {
        let dir = std::env::temp_dir().join(format!("sx-wiring-pools-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let pools = dir.join("pools.json");
        std::fs::write(&pools, "[]").unwrap();

        let mut config = with_bucket(None);
        config.settings.resource_pools_file = Some(pools.display().to_string());
        config.settings.api_gateway_host = Some("https://gw.example.com".into());
        let err = provisioner(&config).await.unwrap_err();
        std::fs::remove_dir_all(&dir).ok();
        assert!(err.to_string().contains("SX_STATE_BUCKET"));
    }
}
