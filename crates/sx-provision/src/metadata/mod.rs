//! Read-only metadata providers consulted before provisioning.
//!
//! - [`TenantDirectory`]: tenant project lookup (seeds `stream_id`)
//! - [`ResourcePoolDirectory`]: resource pool lookup (provider project and location)
//!
//! Both return `Ok(None)` for "not found"; `Err` is reserved for lookups
//! that could not be answered.

pub mod http;
pub mod memory;
pub mod pools;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sx_core::{ProjectId, ResourcePoolId};
use sx_gcloud::MultiRegionLocation;

use crate::error::Result;

/// Tenant project as known to the tenant registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantMetadata {
    /// Tenant project id.
    pub id: ProjectId,
    /// Event stream id of the project.
    pub stream_id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Owning organization id.
    #[serde(default)]
    pub organization_id: Option<u64>,
    /// Owning organization name.
    #[serde(default)]
    pub organization_name: Option<String>,
    /// IANA timezone of the project.
    #[serde(default)]
    pub timezone: Option<String>,
    /// Reporting currency of the project.
    #[serde(default)]
    pub currency: Option<String>,
}

/// Provider resources backing a pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolResources {
    /// Provider project resources are created in.
    pub gcloud_project_id: String,
    /// Dataset location.
    pub gcloud_multi_region_location: MultiRegionLocation,
    /// Single region for regional resources.
    #[serde(default)]
    pub gcloud_single_region_location: Option<String>,
}

/// A named environment tenant resources are provisioned into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcePool {
    /// Pool id.
    pub id: ResourcePoolId,
    /// Display name.
    pub name: String,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Provider resources.
    pub resources: PoolResources,
}

impl ResourcePool {
    /// Provider project resources are created in.
    #[must_use]
    pub fn provider_project_id(&self) -> &str {
        &self.resources.gcloud_project_id
    }

    /// Dataset location.
    #[must_use]
    pub const fn location(&self) -> MultiRegionLocation {
        self.resources.gcloud_multi_region_location
    }
}

/// Tenant project lookup.
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    /// Returns the tenant's metadata, or `None` if the project is unknown.
    async fn get_project_info(&self, project_id: ProjectId) -> Result<Option<TenantMetadata>>;
}

/// Resource pool lookup.
#[async_trait]
pub trait ResourcePoolDirectory: Send + Sync {
    /// Returns the pool, or `None` if the id does not resolve.
    async fn find_by_id(&self, id: &ResourcePoolId) -> Result<Option<ResourcePool>>;

    /// Lists every pool projects can be provisioned into.
    async fn list_available(&self) -> Result<Vec<ResourcePool>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_metadata_reads_gateway_payload() {
        let json = r#"{
            "id": 42,
            "streamId": "st-42",
            "name": "Acme",
            "organizationId": 7,
            "organizationName": "Acme Inc",
            "timezone": "Europe/Berlin",
            "currency": "EUR"
        }"#;
        let tenant: TenantMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(tenant.id.get(), 42);
        assert_eq!(tenant.stream_id, "st-42");
        assert_eq!(tenant.organization_id, Some(7));
    }

    #[test]
    fn resource_pool_reads_nested_resources() {
        let json = r#"{
            "id": "eu-pool",
            "name": "EU",
            "resources": {
                "gcloud_project_id": "acme-eu",
                "gcloud_multi_region_location": "EU",
                "gcloud_single_region_location": "europe-west1"
            }
        }"#;
        let pool: ResourcePool = serde_json::from_str(json).unwrap();
        assert_eq!(pool.provider_project_id(), "acme-eu");
        assert_eq!(pool.location(), MultiRegionLocation::Eu);
        assert!(pool.description.is_none());
    }
}
