//! The provisioning checkpoint.
//!
//! One [`ProvisioningState`] per tenant project. Every resource identifier is
//! `None` until the corresponding remote resource has been created or adopted;
//! a `Some` value means the resource exists under exactly that identifier.
//!
//! Dependency invariants enforced by [`ProvisioningState::record`]:
//! - table and view identifiers require `warehouse.dataset_id`
//! - subscription identifiers require `messaging.collector_topic_id`

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sx_core::ProjectId;

use crate::error::{Error, Result};

/// Warehouse identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseResources {
    /// Dataset holding every table and view below.
    pub dataset_id: Option<String>,
    /// Location the dataset was created in.
    pub dataset_location: Option<String>,
    /// Raw collected events.
    pub raw_events_table_id: Option<String>,
    /// Events with resolved identities.
    pub identified_events_table_id: Option<String>,
    /// Referrer hosts excluded from attribution.
    pub excluded_referrers_view_id: Option<String>,
    /// Ad network spend.
    pub ad_costs_table_id: Option<String>,
}

/// Messaging identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagingResources {
    /// Topic the event collector publishes to.
    pub collector_topic_id: Option<String>,
    /// Subscription streaming the topic into the raw-events table.
    pub warehouse_sink_subscription_id: Option<String>,
    /// Pull subscription for downstream processing.
    pub processor_subscription_id: Option<String>,
}

/// Per-project provisioning checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningState {
    /// Tenant project.
    pub project_id: ProjectId,
    /// Stream id copied from tenant metadata at creation.
    pub stream_id: String,
    /// Provider project copied from the resource pool at creation.
    pub provider_project_id: String,
    /// Warehouse identifiers.
    #[serde(default)]
    pub warehouse: WarehouseResources,
    /// Messaging identifiers.
    #[serde(default)]
    pub messaging: MessagingResources,
    /// When the record was first created.
    pub created_at: DateTime<Utc>,
    /// When the record was last saved.
    pub updated_at: DateTime<Utc>,
}

/// A single resource identifier slot in [`ProvisioningState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceField {
    /// `warehouse.dataset_id`
    DatasetId,
    /// `warehouse.raw_events_table_id`
    RawEventsTableId,
    /// `warehouse.identified_events_table_id`
    IdentifiedEventsTableId,
    /// `warehouse.excluded_referrers_view_id`
    ExcludedReferrersViewId,
    /// `warehouse.ad_costs_table_id`
    AdCostsTableId,
    /// `messaging.collector_topic_id`
    CollectorTopicId,
    /// `messaging.warehouse_sink_subscription_id`
    WarehouseSinkSubscriptionId,
    /// `messaging.processor_subscription_id`
    ProcessorSubscriptionId,
}

impl ResourceField {
    /// Dotted path of the field in the persisted record.
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::DatasetId => "warehouse.dataset_id",
            Self::RawEventsTableId => "warehouse.raw_events_table_id",
            Self::IdentifiedEventsTableId => "warehouse.identified_events_table_id",
            Self::ExcludedReferrersViewId => "warehouse.excluded_referrers_view_id",
            Self::AdCostsTableId => "warehouse.ad_costs_table_id",
            Self::CollectorTopicId => "messaging.collector_topic_id",
            Self::WarehouseSinkSubscriptionId => "messaging.warehouse_sink_subscription_id",
            Self::ProcessorSubscriptionId => "messaging.processor_subscription_id",
        }
    }

    /// Field that must be set before this one may be.
    #[must_use]
    pub const fn parent(self) -> Option<Self> {
        match self {
            Self::DatasetId | Self::CollectorTopicId => None,
            Self::RawEventsTableId
            | Self::IdentifiedEventsTableId
            | Self::ExcludedReferrersViewId
            | Self::AdCostsTableId => Some(Self::DatasetId),
            Self::WarehouseSinkSubscriptionId | Self::ProcessorSubscriptionId => {
                Some(Self::CollectorTopicId)
            }
        }
    }
}

impl fmt::Display for ResourceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

impl ProvisioningState {
    /// Creates an empty checkpoint for a project.
    #[must_use]
    pub fn new(
        project_id: ProjectId,
        stream_id: impl Into<String>,
        provider_project_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            project_id,
            stream_id: stream_id.into(),
            provider_project_id: provider_project_id.into(),
            warehouse: WarehouseResources::default(),
            messaging: MessagingResources::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns the identifier recorded for `field`.
    #[must_use]
    pub fn get(&self, field: ResourceField) -> Option<&str> {
        let slot = match field {
            ResourceField::DatasetId => &self.warehouse.dataset_id,
            ResourceField::RawEventsTableId => &self.warehouse.raw_events_table_id,
            ResourceField::IdentifiedEventsTableId => &self.warehouse.identified_events_table_id,
            ResourceField::ExcludedReferrersViewId => &self.warehouse.excluded_referrers_view_id,
            ResourceField::AdCostsTableId => &self.warehouse.ad_costs_table_id,
            ResourceField::CollectorTopicId => &self.messaging.collector_topic_id,
            ResourceField::WarehouseSinkSubscriptionId => {
                &self.messaging.warehouse_sink_subscription_id
            }
            ResourceField::ProcessorSubscriptionId => &self.messaging.processor_subscription_id,
        };
        slot.as_deref()
    }

    /// Returns whether `field` is recorded.
    #[must_use]
    pub fn is_set(&self, field: ResourceField) -> bool {
        self.get(field).is_some()
    }

    fn slot_mut(&mut self, field: ResourceField) -> &mut Option<String> {
        match field {
            ResourceField::DatasetId => &mut self.warehouse.dataset_id,
            ResourceField::RawEventsTableId => &mut self.warehouse.raw_events_table_id,
            ResourceField::IdentifiedEventsTableId => {
                &mut self.warehouse.identified_events_table_id
            }
            ResourceField::ExcludedReferrersViewId => {
                &mut self.warehouse.excluded_referrers_view_id
            }
            ResourceField::AdCostsTableId => &mut self.warehouse.ad_costs_table_id,
            ResourceField::CollectorTopicId => &mut self.messaging.collector_topic_id,
            ResourceField::WarehouseSinkSubscriptionId => {
                &mut self.messaging.warehouse_sink_subscription_id
            }
            ResourceField::ProcessorSubscriptionId => {
                &mut self.messaging.processor_subscription_id
            }
        }
    }

    /// Records the identifier of a provisioned resource.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DependencyMissing`] if the field's parent is unset.
    pub fn record(&mut self, field: ResourceField, id: impl Into<String>) -> Result<()> {
        if let Some(parent) = field.parent() {
            if !self.is_set(parent) {
                return Err(Error::DependencyMissing {
                    step: field.path(),
                    requires: parent.path(),
                });
            }
        }
        *self.slot_mut(field) = Some(id.into());
        Ok(())
    }

    /// Fields still unset, in declaration order.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<ResourceField> {
        ALL_FIELDS
            .iter()
            .copied()
            .filter(|f| !self.is_set(*f))
            .collect()
    }

    /// Returns true once every resource identifier is recorded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        ALL_FIELDS.iter().all(|f| self.is_set(*f))
    }

    /// Bumps `updated_at`.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

/// Every resource field, warehouse first.
pub const ALL_FIELDS: [ResourceField; 8] = [
    ResourceField::DatasetId,
    ResourceField::RawEventsTableId,
    ResourceField::IdentifiedEventsTableId,
    ResourceField::ExcludedReferrersViewId,
    ResourceField::AdCostsTableId,
    ResourceField::CollectorTopicId,
    ResourceField::WarehouseSinkSubscriptionId,
    ResourceField::ProcessorSubscriptionId,
];
