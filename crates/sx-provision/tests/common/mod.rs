//! Shared fixtures for provisioning integration tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use sx_core::{ProjectId, ResourcePoolId};
use sx_gcloud::MultiRegionLocation;
use sx_gcloud::messaging::memory::InMemoryMessaging;
use sx_gcloud::warehouse::memory::InMemoryWarehouse;
use sx_provision::metadata::memory::{InMemoryResourcePools, InMemoryTenantDirectory};
use sx_provision::metadata::{PoolResources, ResourcePool, TenantMetadata};
use sx_provision::reporter::InMemoryFailureReporter;
use sx_provision::store::memory::InMemoryStateStore;
use sx_provision::{FixedClientFactory, Provisioner, StateStore};

pub const PROJECT: u64 = 42;
pub const POOL: &str = "eu-pool";
pub const PROVIDER_PROJECT: &str = "acme-eu";

pub fn project() -> ProjectId {
    ProjectId::new(PROJECT).unwrap()
}

pub fn pool_id() -> ResourcePoolId {
    ResourcePoolId::new(POOL).unwrap()
}

pub fn eu_pool() -> ResourcePool {
    ResourcePool {
        id: pool_id(),
        name: "EU".into(),
        description: Some("Default EU pool".into()),
        resources: PoolResources {
            gcloud_project_id: PROVIDER_PROJECT.into(),
            gcloud_multi_region_location: MultiRegionLocation::Eu,
            gcloud_single_region_location: Some("europe-west1".into()),
        },
    }
}

pub fn tenant(id: u64) -> TenantMetadata {
    TenantMetadata {
        id: ProjectId::new(id).unwrap(),
        stream_id: format!("st-{id}"),
        name: format!("Tenant {id}"),
        organization_id: Some(7),
        organization_name: Some("Acme Inc".into()),
        timezone: Some("Europe/Berlin".into()),
        currency: Some("EUR".into()),
    }
}

/// In-memory collaborators plus a provisioner wired to them.
pub struct Harness {
    pub pools: Arc<InMemoryResourcePools>,
    pub tenants: Arc<InMemoryTenantDirectory>,
    pub store: Arc<InMemoryStateStore>,
    pub warehouse: Arc<InMemoryWarehouse>,
    pub messaging: Arc<InMemoryMessaging>,
    pub reporter: Arc<InMemoryFailureReporter>,
    pub provisioner: Provisioner,
}

impl Harness {
    /// Pool `eu-pool` and tenant 42 registered, nothing provisioned.
    pub fn new() -> Self {
        Self::with_store(Arc::new(InMemoryStateStore::new()))
    }

    pub fn with_store(store: Arc<InMemoryStateStore>) -> Self {
        let pools = Arc::new(InMemoryResourcePools::new());
        pools.insert(eu_pool()).unwrap();
        let tenants = Arc::new(InMemoryTenantDirectory::new());
        tenants.insert(tenant(PROJECT)).unwrap();
        let warehouse = Arc::new(InMemoryWarehouse::new(PROVIDER_PROJECT, "EU"));
        let messaging = Arc::new(InMemoryMessaging::new(PROVIDER_PROJECT));
        let reporter = Arc::new(InMemoryFailureReporter::new());

        let provisioner = Provisioner::new(
            pools.clone(),
            tenants.clone(),
            store.clone() as Arc<dyn StateStore>,
            Arc::new(FixedClientFactory::new(warehouse.clone(), messaging.clone())),
            reporter.clone(),
        );

        Self {
            pools,
            tenants,
            store,
            warehouse,
            messaging,
            reporter,
            provisioner,
        }
    }

    pub fn create_call_count(&self) -> usize {
        self.warehouse.create_calls().unwrap().len() + self.messaging.create_calls().unwrap().len()
    }

    pub fn remote_call_count(&self) -> usize {
        self.warehouse.calls().unwrap().len() + self.messaging.calls().unwrap().len()
    }

    pub async fn stored(&self) -> sx_provision::ProvisioningState {
        self.store
            .find(project())
            .await
            .unwrap()
            .expect("checkpoint exists")
    }
}
