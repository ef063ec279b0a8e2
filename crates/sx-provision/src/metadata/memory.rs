//! In-memory metadata providers for testing.
//!
//! Both record every lookup so tests can assert which lookups ran.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use sx_core::{ProjectId, ResourcePoolId};

use super::{ResourcePool, ResourcePoolDirectory, TenantDirectory, TenantMetadata};
use crate::error::{Error, Result};

fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::Metadata("metadata lock poisoned".into())
}

#[derive(Debug, Default)]
struct TenantState {
    tenants: BTreeMap<ProjectId, TenantMetadata>,
    lookups: Vec<ProjectId>,
    unavailable: bool,
}

/// In-memory tenant registry.
#[derive(Debug, Default)]
pub struct InMemoryTenantDirectory {
    state: RwLock<TenantState>,
}

impl InMemoryTenantDirectory {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tenant.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn insert(&self, tenant: TenantMetadata) -> Result<()> {
        self.state
            .write()
            .map_err(poison_err)?
            .tenants
            .insert(tenant.id, tenant);
        Ok(())
    }

    /// Makes every lookup fail as if the registry were unreachable.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn set_unavailable(&self, unavailable: bool) -> Result<()> {
        self.state.write().map_err(poison_err)?.unavailable = unavailable;
        Ok(())
    }

    /// Projects looked up so far, in order.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn lookups(&self) -> Result<Vec<ProjectId>> {
        Ok(self.state.read().map_err(poison_err)?.lookups.clone())
    }
}

#[async_trait]
impl TenantDirectory for InMemoryTenantDirectory {
    async fn get_project_info(&self, project_id: ProjectId) -> Result<Option<TenantMetadata>> {
        let mut state = self.state.write().map_err(poison_err)?;
        state.lookups.push(project_id);
        if state.unavailable {
            return Err(Error::Metadata("tenant registry unavailable".into()));
        }
        Ok(state.tenants.get(&project_id).cloned())
    }
}

#[derive(Debug, Default)]
struct PoolState {
    pools: BTreeMap<ResourcePoolId, ResourcePool>,
    lookups: Vec<ResourcePoolId>,
}

/// In-memory resource-pool registry.
#[derive(Debug, Default)]
pub struct InMemoryResourcePools {
    state: RwLock<PoolState>,
}

impl InMemoryResourcePools {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn insert(&self, pool: ResourcePool) -> Result<()> {
        self.state
            .write()
            .map_err(poison_err)?
            .pools
            .insert(pool.id.clone(), pool);
        Ok(())
    }

    /// Pool ids looked up so far, in order.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn lookups(&self) -> Result<Vec<ResourcePoolId>> {
        Ok(self.state.read().map_err(poison_err)?.lookups.clone())
    }
}

#[async_trait]
impl ResourcePoolDirectory for InMemoryResourcePools {
    async fn find_by_id(&self, id: &ResourcePoolId) -> Result<Option<ResourcePool>> {
        let mut state = self.state.write().map_err(poison_err)?;
        state.lookups.push(id.clone());
        Ok(state.pools.get(id).cloned())
    }

    async fn list_available(&self) -> Result<Vec<ResourcePool>> {
        Ok(self
            .state
            .read()
            .map_err(poison_err)?
            .pools
            .values()
            .cloned()
            .collect())
    }
}
