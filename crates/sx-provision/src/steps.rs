//! The declarative provisioning plan.
//!
//! [`PLAN`] lists the eight steps in dependency order. Each [`StepKind`]
//! names the state field it fills and knows how to build a [`ResourceSpec`]
//! from the current checkpoint; [`run_step`] is the single guarded runner
//! applied to every step:
//!
//! 1. field already set: skip
//! 2. remote resource exists: adopt its identifier
//! 3. otherwise: create it
//! 4. record the identifier and save the checkpoint before returning

use std::collections::BTreeMap;
use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sx_gcloud::schemas;
use sx_gcloud::{
    DatasetSpec, MessagingClient, PullSubscriptionConfig, SinkSubscriptionConfig, SinkTable,
    TableField, TableSpec, TopicSpec, ViewSpec, WarehouseClient,
};

use crate::error::{Error, Result};
use crate::metadata::ResourcePool;
use crate::naming;
use crate::state::{ProvisioningState, ResourceField};
use crate::store::StateStore;

/// Ack deadline of the processor subscription.
pub const PROCESSOR_ACK_DEADLINE_SECONDS: u32 = 60;

/// One provisioning step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// Per-project dataset.
    CreateDataset,
    /// Raw-events table.
    CreateRawEventsTable,
    /// Identified-events table.
    CreateIdentifiedEventsTable,
    /// Excluded-referrers view.
    CreateExcludedReferrersView,
    /// Ad-costs table.
    CreateAdCostsTable,
    /// Collector topic.
    CreateCollectorTopic,
    /// Subscription streaming the topic into the raw-events table.
    CreateWarehouseSinkSubscription,
    /// Pull subscription for the event processor.
    CreateProcessorSubscription,
}

/// Every step, in execution order.
pub const PLAN: [StepKind; 8] = [
    StepKind::CreateDataset,
    StepKind::CreateRawEventsTable,
    StepKind::CreateIdentifiedEventsTable,
    StepKind::CreateExcludedReferrersView,
    StepKind::CreateAdCostsTable,
    StepKind::CreateCollectorTopic,
    StepKind::CreateWarehouseSinkSubscription,
    StepKind::CreateProcessorSubscription,
];

impl StepKind {
    /// Stable step name used in logs and failure reports.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::CreateDataset => "create_dataset",
            Self::CreateRawEventsTable => "create_raw_events_table",
            Self::CreateIdentifiedEventsTable => "create_identified_events_table",
            Self::CreateExcludedReferrersView => "create_excluded_referrers_view",
            Self::CreateAdCostsTable => "create_ad_costs_table",
            Self::CreateCollectorTopic => "create_collector_topic",
            Self::CreateWarehouseSinkSubscription => "create_warehouse_sink_subscription",
            Self::CreateProcessorSubscription => "create_processor_subscription",
        }
    }

    /// State field this step fills.
    #[must_use]
    pub const fn field(self) -> ResourceField {
        match self {
            Self::CreateDataset => ResourceField::DatasetId,
            Self::CreateRawEventsTable => ResourceField::RawEventsTableId,
            Self::CreateIdentifiedEventsTable => ResourceField::IdentifiedEventsTableId,
            Self::CreateExcludedReferrersView => ResourceField::ExcludedReferrersViewId,
            Self::CreateAdCostsTable => ResourceField::AdCostsTableId,
            Self::CreateCollectorTopic => ResourceField::CollectorTopicId,
            Self::CreateWarehouseSinkSubscription => ResourceField::WarehouseSinkSubscriptionId,
            Self::CreateProcessorSubscription => ResourceField::ProcessorSubscriptionId,
        }
    }

    /// Fields that must be recorded before this step may run.
    #[must_use]
    pub const fn requires(self) -> &'static [ResourceField] {
        match self {
            Self::CreateDataset | Self::CreateCollectorTopic => &[],
            Self::CreateRawEventsTable
            | Self::CreateIdentifiedEventsTable
            | Self::CreateExcludedReferrersView
            | Self::CreateAdCostsTable => &[ResourceField::DatasetId],
            Self::CreateWarehouseSinkSubscription => &[
                ResourceField::CollectorTopicId,
                ResourceField::DatasetId,
                ResourceField::RawEventsTableId,
            ],
            Self::CreateProcessorSubscription => &[ResourceField::CollectorTopicId],
        }
    }

    /// Builds the resource this step provisions.
    ///
    /// Identifiers of parents are read from `state`, so an adopted parent is
    /// referenced under exactly the identifier that was recorded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DependencyMissing`] if a required field is unset.
    pub fn resource_spec(
        self,
        state: &ProvisioningState,
        pool: &ResourcePool,
    ) -> Result<ResourceSpec> {
        for field in self.requires() {
            if !state.is_set(*field) {
                return Err(Error::DependencyMissing {
                    step: self.name(),
                    requires: field.path(),
                });
            }
        }

        let project_id = state.project_id;
        let labels = naming::resource_labels(project_id);
        let dataset = || require(state, self, ResourceField::DatasetId);
        let topic = || require(state, self, ResourceField::CollectorTopicId);

        let spec = match self {
            Self::CreateDataset => ResourceSpec::Dataset(DatasetSpec {
                location: Some(pool.location().as_str().to_string()),
                description: Some(format!("Event data of project {project_id}")),
                labels,
                ..DatasetSpec::new(naming::dataset_id(project_id))
            }),
            Self::CreateRawEventsTable => ResourceSpec::Table(partitioned_table(
                dataset()?,
                naming::RAW_EVENTS_TABLE_ID,
                schemas::raw_events(),
                labels,
            )),
            Self::CreateIdentifiedEventsTable => ResourceSpec::Table(partitioned_table(
                dataset()?,
                naming::IDENTIFIED_EVENTS_TABLE_ID,
                schemas::identified_events(),
                labels,
            )),
            Self::CreateExcludedReferrersView => ResourceSpec::View(ViewSpec {
                dataset_id: dataset()?.to_string(),
                view_id: naming::EXCLUDED_REFERRERS_VIEW_ID.to_string(),
                query: schemas::EXCLUDED_REFERRERS_VIEW_QUERY.to_string(),
                description: Some("Referrer hosts excluded from attribution".to_string()),
                labels,
            }),
            Self::CreateAdCostsTable => ResourceSpec::Table(partitioned_table(
                dataset()?,
                naming::AD_COSTS_TABLE_ID,
                schemas::ad_costs(),
                labels,
            )),
            Self::CreateCollectorTopic => ResourceSpec::Topic(TopicSpec {
                labels,
                ..TopicSpec::new(naming::collector_topic_id(project_id))
            }),
            Self::CreateWarehouseSinkSubscription => ResourceSpec::SinkSubscription {
                topic_id: topic()?.to_string(),
                subscription_id: naming::warehouse_sink_subscription_id(project_id),
                table: SinkTable::new(
                    state.provider_project_id.clone(),
                    dataset()?,
                    require(state, self, ResourceField::RawEventsTableId)?,
                ),
                config: SinkSubscriptionConfig {
                    write_metadata: false,
                    drop_unknown_fields: true,
                    use_table_schema: true,
                    labels,
                    ..SinkSubscriptionConfig::default()
                },
            },
            Self::CreateProcessorSubscription => ResourceSpec::PullSubscription {
                topic_id: topic()?.to_string(),
                subscription_id: naming::processor_subscription_id(project_id),
                config: PullSubscriptionConfig {
                    ack_deadline_seconds: PROCESSOR_ACK_DEADLINE_SECONDS,
                    labels,
                    ..PullSubscriptionConfig::default()
                },
            },
        };
        Ok(spec)
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn require(state: &ProvisioningState, step: StepKind, field: ResourceField) -> Result<&str> {
    state.get(field).ok_or(Error::DependencyMissing {
        step: step.name(),
        requires: field.path(),
    })
}

fn partitioned_table(
    dataset_id: &str,
    table_id: &str,
    schema: Vec<TableField>,
    labels: BTreeMap<String, String>,
) -> TableSpec {
    let time_partitioning = schema
        .iter()
        .any(|f| f.name == "date")
        .then(schemas::date_partitioning);
    TableSpec {
        dataset_id: dataset_id.to_string(),
        table_id: table_id.to_string(),
        schema,
        time_partitioning,
        clustering: Vec::new(),
        description: None,
        labels,
    }
}

/// What a step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    /// The identifier was already recorded; no remote call was made.
    Skipped,
    /// The resource already existed remotely and was recorded.
    Adopted,
    /// The resource was created.
    Created,
}

impl StepOutcome {
    /// Lowercase name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Skipped => "skipped",
            Self::Adopted => "adopted",
            Self::Created => "created",
        }
    }
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A remote resource ready to be checked or created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceSpec {
    /// Warehouse dataset.
    Dataset(DatasetSpec),
    /// Physical table.
    Table(TableSpec),
    /// View.
    View(ViewSpec),
    /// Topic.
    Topic(TopicSpec),
    /// Pull subscription.
    PullSubscription {
        /// Bound topic.
        topic_id: String,
        /// Subscription id.
        subscription_id: String,
        /// Creation options.
        config: PullSubscriptionConfig,
    },
    /// Subscription writing into a warehouse table.
    SinkSubscription {
        /// Bound topic.
        topic_id: String,
        /// Subscription id.
        subscription_id: String,
        /// Target table.
        table: SinkTable,
        /// Creation options.
        config: SinkSubscriptionConfig,
    },
}

impl ResourceSpec {
    /// Identifier recorded in state once the resource exists.
    #[must_use]
    pub fn resource_id(&self) -> &str {
        match self {
            Self::Dataset(spec) => &spec.dataset_id,
            Self::Table(spec) => &spec.table_id,
            Self::View(spec) => &spec.view_id,
            Self::Topic(spec) => &spec.topic_id,
            Self::PullSubscription {
                subscription_id, ..
            }
            | Self::SinkSubscription {
                subscription_id, ..
            } => subscription_id,
        }
    }

    async fn exists(&self, clients: &Clients<'_>) -> Result<bool> {
        let exists = match self {
            Self::Dataset(spec) => clients.warehouse.dataset_exists(&spec.dataset_id).await?,
            Self::Table(spec) => {
                clients
                    .warehouse
                    .table_exists(&spec.dataset_id, &spec.table_id)
                    .await?
            }
            Self::View(spec) => {
                clients
                    .warehouse
                    .table_exists(&spec.dataset_id, &spec.view_id)
                    .await?
            }
            Self::Topic(spec) => clients.messaging.topic_exists(&spec.topic_id).await?,
            Self::PullSubscription {
                subscription_id, ..
            }
            | Self::SinkSubscription {
                subscription_id, ..
            } => clients.messaging.subscription_exists(subscription_id).await?,
        };
        Ok(exists)
    }

    async fn create(&self, clients: &Clients<'_>) -> Result<()> {
        match self {
            Self::Dataset(spec) => {
                clients.warehouse.create_dataset(spec).await?;
            }
            Self::Table(spec) => {
                clients.warehouse.create_table(spec).await?;
            }
            Self::View(spec) => {
                clients.warehouse.create_view(spec).await?;
            }
            Self::Topic(spec) => {
                clients.messaging.create_topic(spec).await?;
            }
            Self::PullSubscription {
                topic_id,
                subscription_id,
                config,
            } => {
                clients
                    .messaging
                    .create_pull_subscription(topic_id, subscription_id, config)
                    .await?;
            }
            Self::SinkSubscription {
                topic_id,
                subscription_id,
                table,
                config,
            } => {
                clients
                    .messaging
                    .create_sink_subscription(topic_id, subscription_id, table, config)
                    .await?;
            }
        }
        Ok(())
    }
}

/// Remote clients bound to one resource pool.
#[derive(Clone, Copy)]
pub struct Clients<'a> {
    /// Warehouse client.
    pub warehouse: &'a dyn WarehouseClient,
    /// Messaging client.
    pub messaging: &'a dyn MessagingClient,
}

impl fmt::Debug for Clients<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Clients")
            .field("warehouse_project", &self.warehouse.project_id())
            .field("messaging_project", &self.messaging.project_id())
            .finish()
    }
}

/// Result of one executed step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Step that ran.
    pub step: StepKind,
    /// What it did.
    pub outcome: StepOutcome,
    /// Identifier recorded for the step.
    pub resource_id: String,
}

/// Runs one guarded step against `state`, saving the checkpoint on change.
///
/// # Errors
///
/// Returns an error if a dependency is unset, a remote call fails, or the
/// checkpoint cannot be saved. On error nothing has been saved for this step.
pub async fn run_step(
    step: StepKind,
    state: &mut ProvisioningState,
    pool: &ResourcePool,
    clients: Clients<'_>,
    store: &dyn StateStore,
) -> Result<StepRecord> {
    let field = step.field();
    if let Some(existing) = state.get(field) {
        return Ok(StepRecord {
            step,
            outcome: StepOutcome::Skipped,
            resource_id: existing.to_string(),
        });
    }

    let spec = step.resource_spec(state, pool)?;
    let outcome = if spec.exists(&clients).await? {
        StepOutcome::Adopted
    } else {
        spec.create(&clients).await?;
        StepOutcome::Created
    };

    let resource_id = spec.resource_id().to_string();
    let mut next = state.clone();
    next.record(field, resource_id.clone())?;
    if step == StepKind::CreateDataset {
        next.warehouse.dataset_location = Some(pool.location().as_str().to_string());
    }
    next.touch(Utc::now());
    store.save(&next).await?;
    *state = next;

    Ok(StepRecord {
        step,
        outcome,
        resource_id,
    })
}
