//! Static resource-pool catalog loaded from a JSON file.
//!
//! The file holds an array of pools:
//!
//! ```json
//! [
//!   {
//!     "id": "eu-pool",
//!     "name": "EU",
//!     "resources": {
//!       "gcloud_project_id": "acme-eu",
//!       "gcloud_multi_region_location": "EU",
//!       "gcloud_single_region_location": "europe-west1"
//!     }
//!   }
//! ]
//! ```

use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use sx_core::ResourcePoolId;

use super::{ResourcePool, ResourcePoolDirectory};
use crate::error::{Error, Result};

/// Immutable resource-pool catalog.
#[derive(Debug, Clone, Default)]
pub struct StaticResourcePools {
    pools: Vec<ResourcePool>,
}

impl StaticResourcePools {
    /// Creates a catalog from pools.
    ///
    /// # Errors
    ///
    /// Returns an error if two pools share an id or a pool has an empty
    /// provider project.
    pub fn new(pools: Vec<ResourcePool>) -> Result<Self> {
        let mut seen = HashSet::new();
        for pool in &pools {
            if !seen.insert(pool.id.clone()) {
                return Err(Error::InvalidInput(format!(
                    "duplicate resource pool id '{}'",
                    pool.id
                )));
            }
            if pool.provider_project_id().trim().is_empty() {
                return Err(Error::InvalidInput(format!(
                    "resource pool '{}' has an empty gcloud_project_id",
                    pool.id
                )));
            }
        }
        Ok(Self { pools })
    }

    /// Parses a catalog from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or fails validation.
    pub fn from_json(json: &str) -> Result<Self> {
        let pools: Vec<ResourcePool> = serde_json::from_str(json)
            .map_err(|e| Error::InvalidInput(format!("invalid resource pool catalog: {e}")))?;
        Self::new(pools)
    }

    /// Reads a catalog from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::InvalidInput(format!(
                "failed to read resource pool catalog {}: {e}",
                path.display()
            ))
        })?;
        Self::from_json(&json)
    }

    /// Number of pools in the catalog.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pools.len()
    }

    /// Returns true if the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }
}

#[async_trait]
impl ResourcePoolDirectory for StaticResourcePools {
    async fn find_by_id(&self, id: &ResourcePoolId) -> Result<Option<ResourcePool>> {
        Ok(self.pools.iter().find(|p| &p.id == id).cloned())
    }

    async fn list_available(&self) -> Result<Vec<ResourcePool>> {
        Ok(self.pools.clone())
    }
}
