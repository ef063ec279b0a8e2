//! The provisioning orchestrator.
//!
//! [`Provisioner::provision`] resolves the resource pool and tenant, loads or
//! seeds the project's checkpoint, then runs [`PLAN`] step by step. Every
//! failure is logged, reported best-effort, and surfaced to the caller as a
//! [`ProvisionError`]. Progress saved before a failure is kept, so calling
//! again with the same arguments resumes at the first unset field.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sx_core::{InvocationId, ProjectId, ResourcePoolId, provisioning_span};
use sx_gcloud::{
    BigQueryClient, BigQueryConfig, MessagingClient, PubSubClient, PubSubConfig, WarehouseClient,
};
use tracing::Instrument;

use crate::error::{Error, ProvisionError, Result};
use crate::locks::ProjectLocks;
use crate::metadata::{ResourcePool, ResourcePoolDirectory, TenantDirectory};
use crate::reporter::{FailureReport, FailureReporter, error_chain, report_best_effort};
use crate::state::ProvisioningState;
use crate::steps::{Clients, PLAN, StepKind, StepOutcome, StepRecord, run_step};
use crate::store::StateStore;

/// Default `service_name` on failure reports.
pub const DEFAULT_SERVICE_NAME: &str = "sx-provisioner";

/// Error name reported when a pool or tenant lookup finds nothing.
pub const LOOKUP_NOT_FOUND: &str = "LookupNotFound";

/// Builds the remote clients for a resource pool.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    /// Warehouse client bound to the pool's provider project and location.
    async fn warehouse(&self, pool: &ResourcePool) -> Result<Arc<dyn WarehouseClient>>;

    /// Messaging client bound to the pool's provider project.
    async fn messaging(&self, pool: &ResourcePool) -> Result<Arc<dyn MessagingClient>>;
}

/// Factory creating BigQuery and Pub/Sub clients per pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct GcpClientFactory;

#[async_trait]
impl ClientFactory for GcpClientFactory {
    async fn warehouse(&self, pool: &ResourcePool) -> Result<Arc<dyn WarehouseClient>> {
        let config = BigQueryConfig::new(pool.provider_project_id(), pool.location().as_str());
        Ok(Arc::new(BigQueryClient::new(config).await?))
    }

    async fn messaging(&self, pool: &ResourcePool) -> Result<Arc<dyn MessagingClient>> {
        let config = PubSubConfig::new(pool.provider_project_id());
        Ok(Arc::new(PubSubClient::new(config).await?))
    }
}

/// Factory handing out the same pair of clients for every pool.
#[derive(Clone)]
pub struct FixedClientFactory {
    warehouse: Arc<dyn WarehouseClient>,
    messaging: Arc<dyn MessagingClient>,
}

impl FixedClientFactory {
    /// Creates a factory over existing clients.
    #[must_use]
    pub fn new(warehouse: Arc<dyn WarehouseClient>, messaging: Arc<dyn MessagingClient>) -> Self {
        Self {
            warehouse,
            messaging,
        }
    }
}

impl std::fmt::Debug for FixedClientFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixedClientFactory")
            .field("warehouse_project", &self.warehouse.project_id())
            .field("messaging_project", &self.messaging.project_id())
            .finish()
    }
}

#[async_trait]
impl ClientFactory for FixedClientFactory {
    async fn warehouse(&self, _pool: &ResourcePool) -> Result<Arc<dyn WarehouseClient>> {
        Ok(Arc::clone(&self.warehouse))
    }

    async fn messaging(&self, _pool: &ResourcePool) -> Result<Arc<dyn MessagingClient>> {
        Ok(Arc::clone(&self.messaging))
    }
}

/// Outcome of a successful invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionReport {
    /// Tenant project.
    pub project_id: ProjectId,
    /// Pool the project was provisioned into.
    pub resource_pool_id: ResourcePoolId,
    /// Invocation id stamped on this call's logs.
    pub invocation_id: InvocationId,
    /// One record per step, in plan order.
    pub steps: Vec<StepRecord>,
}

impl ProvisionReport {
    /// Steps that created a remote resource.
    #[must_use]
    pub fn created(&self) -> Vec<StepKind> {
        self.steps_with(StepOutcome::Created)
    }

    /// Steps that adopted an existing remote resource.
    #[must_use]
    pub fn adopted(&self) -> Vec<StepKind> {
        self.steps_with(StepOutcome::Adopted)
    }

    /// Returns true if every step was skipped.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.steps
            .iter()
            .all(|r| r.outcome == StepOutcome::Skipped)
    }

    fn steps_with(&self, outcome: StepOutcome) -> Vec<StepKind> {
        self.steps
            .iter()
            .filter(|r| r.outcome == outcome)
            .map(|r| r.step)
            .collect()
    }
}

/// Read-only view of a project's provisioning progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningStatus {
    /// Tenant project.
    pub project_id: ProjectId,
    /// Stored checkpoint, if the project was ever provisioned.
    pub state: Option<ProvisioningState>,
    /// Steps whose field is still unset, in plan order.
    pub pending: Vec<StepKind>,
}

impl ProvisioningStatus {
    /// Returns true once every step has recorded its resource.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.state.is_some() && self.pending.is_empty()
    }
}

/// Reads a project's progress straight from a state store.
///
/// # Errors
///
/// Returns an error if the checkpoint cannot be read.
pub async fn load_status(
    store: &dyn StateStore,
    project_id: ProjectId,
) -> Result<ProvisioningStatus> {
    let state = store.find(project_id).await?;
    let pending = PLAN
        .iter()
        .copied()
        .filter(|step| state.as_ref().is_none_or(|s| !s.is_set(step.field())))
        .collect();
    Ok(ProvisioningStatus {
        project_id,
        state,
        pending,
    })
}

/// Why an invocation stopped.
enum Failure {
    PoolNotFound,
    TenantNotFound,
    Failed {
        step: Option<StepKind>,
        completed: Vec<StepRecord>,
        error: Error,
    },
}

impl Failure {
    fn before_steps(error: Error) -> Self {
        Self::Failed {
            step: None,
            completed: Vec::new(),
            error,
        }
    }
}

/// Runs the provisioning plan for tenant projects.
pub struct Provisioner {
    pools: Arc<dyn ResourcePoolDirectory>,
    tenants: Arc<dyn TenantDirectory>,
    store: Arc<dyn StateStore>,
    clients: Arc<dyn ClientFactory>,
    reporter: Arc<dyn FailureReporter>,
    service_name: String,
    locks: Option<ProjectLocks>,
}

impl std::fmt::Debug for Provisioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provisioner")
            .field("service_name", &self.service_name)
            .field("serialize_per_project", &self.locks.is_some())
            .finish_non_exhaustive()
    }
}

impl Provisioner {
    /// Creates a provisioner with per-project serialization enabled.
    #[must_use]
    pub fn new(
        pools: Arc<dyn ResourcePoolDirectory>,
        tenants: Arc<dyn TenantDirectory>,
        store: Arc<dyn StateStore>,
        clients: Arc<dyn ClientFactory>,
        reporter: Arc<dyn FailureReporter>,
    ) -> Self {
        Self {
            pools,
            tenants,
            store,
            clients,
            reporter,
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            locks: Some(ProjectLocks::new()),
        }
    }

    /// Sets the `service_name` carried by failure reports.
    #[must_use]
    pub fn with_service_name(mut self, service_name: impl Into<String>) -> Self {
        self.service_name = service_name.into();
        self
    }

    /// Enables or disables in-process serialization per project.
    #[must_use]
    pub fn with_project_serialization(mut self, enabled: bool) -> Self {
        self.locks = enabled.then(ProjectLocks::new);
        self
    }

    /// Provisions every resource of `project_id` into `resource_pool_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::ResourcePoolNotFound`] or
    /// [`ProvisionError::TenantNotFound`] when a lookup misses, and
    /// [`ProvisionError::ProvisioningFailed`] for every other failure.
    pub async fn provision(
        &self,
        project_id: ProjectId,
        resource_pool_id: &ResourcePoolId,
    ) -> std::result::Result<ProvisionReport, ProvisionError> {
        let invocation_id = InvocationId::generate();
        let span = provisioning_span(
            "provision",
            &invocation_id.to_string(),
            project_id.get(),
            resource_pool_id.as_str(),
        );

        async move {
            let _guard = match &self.locks {
                Some(locks) => Some(locks.acquire(project_id).await),
                None => None,
            };

            match self.run(project_id, resource_pool_id, invocation_id).await {
                Ok(report) => {
                    tracing::info!(
                        created = report.created().len(),
                        adopted = report.adopted().len(),
                        "provisioning complete"
                    );
                    Ok(report)
                }
                Err(failure) => Err(self
                    .fail(project_id, resource_pool_id, invocation_id, failure)
                    .await),
            }
        }
        .instrument(span)
        .await
    }

    /// Returns the stored checkpoint and the steps still pending.
    ///
    /// # Errors
    ///
    /// Returns an error if the checkpoint cannot be read.
    pub async fn status(&self, project_id: ProjectId) -> Result<ProvisioningStatus> {
        load_status(self.store.as_ref(), project_id).await
    }

    async fn run(
        &self,
        project_id: ProjectId,
        resource_pool_id: &ResourcePoolId,
        invocation_id: InvocationId,
    ) -> std::result::Result<ProvisionReport, Failure> {
        let pool = self
            .pools
            .find_by_id(resource_pool_id)
            .await
            .map_err(Failure::before_steps)?
            .ok_or(Failure::PoolNotFound)?;

        let tenant = self
            .tenants
            .get_project_info(project_id)
            .await
            .map_err(Failure::before_steps)?
            .ok_or(Failure::TenantNotFound)?;

        let mut state = self
            .load_or_seed(project_id, &tenant.stream_id, &pool)
            .await
            .map_err(Failure::before_steps)?;

        let warehouse = self
            .clients
            .warehouse(&pool)
            .await
            .map_err(Failure::before_steps)?;
        let messaging = self
            .clients
            .messaging(&pool)
            .await
            .map_err(Failure::before_steps)?;
        let clients = Clients {
            warehouse: warehouse.as_ref(),
            messaging: messaging.as_ref(),
        };

        let mut steps = Vec::with_capacity(PLAN.len());
        for step in PLAN {
            match run_step(step, &mut state, &pool, clients, self.store.as_ref()).await {
                Ok(record) => {
                    tracing::info!(
                        step = %record.step,
                        resource_id = %record.resource_id,
                        outcome = %record.outcome,
                        "provisioning step finished"
                    );
                    steps.push(record);
                }
                Err(error) => {
                    return Err(Failure::Failed {
                        step: Some(step),
                        completed: steps,
                        error,
                    });
                }
            }
        }

        Ok(ProvisionReport {
            project_id,
            resource_pool_id: resource_pool_id.clone(),
            invocation_id,
            steps,
        })
    }

    async fn load_or_seed(
        &self,
        project_id: ProjectId,
        stream_id: &str,
        pool: &ResourcePool,
    ) -> Result<ProvisioningState> {
        if let Some(state) = self.store.find(project_id).await? {
            if state.provider_project_id != pool.provider_project_id() {
                return Err(Error::InvalidInput(format!(
                    "project {project_id} is provisioned in provider project '{}', \
                     resource pool '{}' targets '{}'",
                    state.provider_project_id,
                    pool.id,
                    pool.provider_project_id()
                )));
            }
            tracing::debug!(missing = state.missing_fields().len(), "resuming from checkpoint");
            return Ok(state);
        }

        tracing::debug!("seeding new checkpoint");
        self.store
            .create(ProvisioningState::new(
                project_id,
                stream_id,
                pool.provider_project_id(),
                Utc::now(),
            ))
            .await
    }

    async fn fail(
        &self,
        project_id: ProjectId,
        resource_pool_id: &ResourcePoolId,
        invocation_id: InvocationId,
        failure: Failure,
    ) -> ProvisionError {
        let base = FailureReport {
            service_name: self.service_name.clone(),
            error_name: LOOKUP_NOT_FOUND.to_string(),
            project_id: Some(project_id.get()),
            process_info: json!({
                "operation": "provision",
                "invocation_id": invocation_id.to_string(),
                "step": null,
            }),
            input_data: json!({
                "project_id": project_id.get(),
                "resource_pool_id": resource_pool_id.as_str(),
            }),
            error_data: serde_json::Value::Null,
            error_stack: None,
        };

        let (report, error) = match failure {
            Failure::PoolNotFound => {
                tracing::warn!("resource pool not found");
                let report = FailureReport {
                    error_data: json!({
                        "message": format!("resource pool {resource_pool_id} not found"),
                    }),
                    ..base
                };
                let error = ProvisionError::ResourcePoolNotFound {
                    resource_pool_id: resource_pool_id.clone(),
                };
                (report, error)
            }
            Failure::TenantNotFound => {
                tracing::warn!("project not found in tenant registry");
                let report = FailureReport {
                    error_data: json!({
                        "message": format!("project {project_id} not found"),
                    }),
                    ..base
                };
                (report, ProvisionError::TenantNotFound { project_id })
            }
            Failure::Failed {
                step,
                completed,
                error,
            } => {
                tracing::error!(
                    step = step.map(StepKind::name),
                    error_name = error.kind(),
                    error = %error,
                    "provisioning failed"
                );
                let completed: Vec<&str> = completed.iter().map(|r| r.step.name()).collect();
                let report = FailureReport {
                    error_name: error.kind().to_string(),
                    process_info: json!({
                        "operation": "provision",
                        "invocation_id": invocation_id.to_string(),
                        "step": step.map(StepKind::name),
                        "completed_steps": completed,
                    }),
                    error_data: json!({ "message": error.to_string() }),
                    error_stack: Some(error_chain(&error)),
                    ..base
                };
                (report, ProvisionError::ProvisioningFailed)
            }
        };

        report_best_effort(self.reporter.as_ref(), &report).await;
        error
    }
}
