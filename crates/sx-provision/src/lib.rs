//! # sx-provision
//!
//! Checkpointed, resumable provisioning of the remote resources every tenant
//! project needs: a warehouse dataset with its tables and view, a collector
//! topic, and the subscriptions reading from it.
//!
//! ## Model
//!
//! Each project has one [`ProvisioningState`] checkpoint. The
//! [`Provisioner`] walks the fixed [`PLAN`](steps::PLAN); every step is
//! skipped when its identifier is already recorded, adopts the remote
//! resource when it already exists, and creates it otherwise. The checkpoint
//! is saved after every step, so a failed invocation can simply be repeated.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use sx_core::{ProjectId, ResourcePoolId};
//! use sx_gcloud::MultiRegionLocation;
//! use sx_gcloud::messaging::memory::InMemoryMessaging;
//! use sx_gcloud::warehouse::memory::InMemoryWarehouse;
//! use sx_provision::metadata::memory::{InMemoryResourcePools, InMemoryTenantDirectory};
//! use sx_provision::metadata::{PoolResources, ResourcePool, TenantMetadata};
//! use sx_provision::reporter::InMemoryFailureReporter;
//! use sx_provision::store::memory::InMemoryStateStore;
//! use sx_provision::{FixedClientFactory, Provisioner};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let pools = InMemoryResourcePools::new();
//! pools.insert(ResourcePool {
//!     id: ResourcePoolId::new("eu-pool")?,
//!     name: "EU".into(),
//!     description: None,
//!     resources: PoolResources {
//!         gcloud_project_id: "acme-eu".into(),
//!         gcloud_multi_region_location: MultiRegionLocation::Eu,
//!         gcloud_single_region_location: None,
//!     },
//! })?;
//!
//! let tenants = InMemoryTenantDirectory::new();
//! tenants.insert(TenantMetadata {
//!     id: ProjectId::new(42)?,
//!     stream_id: "st-42".into(),
//!     name: "Acme".into(),
//!     organization_id: None,
//!     organization_name: None,
//!     timezone: None,
//!     currency: None,
//! })?;
//!
//! let provisioner = Provisioner::new(
//!     Arc::new(pools),
//!     Arc::new(tenants),
//!     Arc::new(InMemoryStateStore::new()),
//!     Arc::new(FixedClientFactory::new(
//!         Arc::new(InMemoryWarehouse::new("acme-eu", "EU")),
//!         Arc::new(InMemoryMessaging::new("acme-eu")),
//!     )),
//!     Arc::new(InMemoryFailureReporter::new()),
//! );
//!
//! let report = provisioner
//!     .provision(ProjectId::new(42)?, &ResourcePoolId::new("eu-pool")?)
//!     .await?;
//! assert_eq!(report.created().len(), 8);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod locks;
pub mod metadata;
pub mod naming;
pub mod orchestrator;
pub mod reporter;
pub mod state;
pub mod steps;
pub mod store;

pub use config::Config;
pub use error::{Error, ErrorBody, ProvisionError, Result};
pub use orchestrator::{
    ClientFactory, FixedClientFactory, GcpClientFactory, ProvisionReport, Provisioner,
    ProvisioningStatus, load_status,
};
pub use reporter::{FailureReport, FailureReporter};
pub use state::{ProvisioningState, ResourceField};
pub use steps::{PLAN, StepKind, StepOutcome, StepRecord};
pub use store::StateStore;
