//! Messaging resource client: topics, pull subscriptions and warehouse-sink subscriptions.
//!
//! A [`MessagingClient`] is bound to one provider project. Topic and
//! subscription ids passed to it are short ids (`collector_42`); the client
//! expands them into fully qualified names.

pub mod memory;
pub mod pubsub;

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Default acknowledgement deadline for new subscriptions.
pub const DEFAULT_ACK_DEADLINE_SECONDS: u32 = 10;

/// Parameters for creating a topic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicSpec {
    /// Topic identifier.
    pub topic_id: String,
    /// How long published messages are retained by the topic.
    pub message_retention: Option<Duration>,
    /// Resource labels.
    pub labels: BTreeMap<String, String>,
}

impl TopicSpec {
    /// Creates a topic spec with only an identifier.
    #[must_use]
    pub fn new(topic_id: impl Into<String>) -> Self {
        Self {
            topic_id: topic_id.into(),
            ..Self::default()
        }
    }
}

/// Dead-letter routing for messages that exceed the delivery attempt limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetterPolicy {
    /// Topic id (in the same project) receiving dead-lettered messages.
    pub dead_letter_topic: String,
    /// Delivery attempts before a message is dead-lettered (5..=100).
    pub max_delivery_attempts: u32,
}

/// Redelivery backoff bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Lower backoff bound.
    pub minimum_backoff: Duration,
    /// Upper backoff bound.
    pub maximum_backoff: Duration,
}

/// When an idle subscription is deleted by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpirationPolicy {
    /// Delete after this much inactivity.
    Ttl(Duration),
    /// Never delete.
    Never,
}

/// Options recognized when creating a pull subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullSubscriptionConfig {
    /// Acknowledgement deadline in seconds.
    pub ack_deadline_seconds: u32,
    /// How long unacknowledged messages are retained.
    pub message_retention: Option<Duration>,
    /// Whether acknowledged messages are retained too.
    pub retain_acked_messages: bool,
    /// Whether messages with the same ordering key are delivered in order.
    pub enable_message_ordering: bool,
    /// Whether exactly-once delivery is enabled.
    pub enable_exactly_once_delivery: bool,
    /// Only deliver messages whose attributes match this filter.
    pub filter: Option<String>,
    /// Dead-letter routing.
    pub dead_letter_policy: Option<DeadLetterPolicy>,
    /// Redelivery backoff bounds.
    pub retry_policy: Option<RetryPolicy>,
    /// Idle expiration.
    pub expiration_policy: Option<ExpirationPolicy>,
    /// Resource labels.
    pub labels: BTreeMap<String, String>,
}

impl Default for PullSubscriptionConfig {
    fn default() -> Self {
        Self {
            ack_deadline_seconds: DEFAULT_ACK_DEADLINE_SECONDS,
            message_retention: None,
            retain_acked_messages: false,
            enable_message_ordering: false,
            enable_exactly_once_delivery: false,
            filter: None,
            dead_letter_policy: None,
            retry_policy: None,
            expiration_policy: None,
            labels: BTreeMap::new(),
        }
    }
}

/// Options recognized when creating a warehouse-sink subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkSubscriptionConfig {
    /// Acknowledgement deadline in seconds.
    pub ack_deadline_seconds: u32,
    /// How long unacknowledged messages are retained.
    pub message_retention: Option<Duration>,
    /// Whether acknowledged messages are retained too.
    pub retain_acked_messages: bool,
    /// Whether messages with the same ordering key are delivered in order.
    pub enable_message_ordering: bool,
    /// Only deliver messages whose attributes match this filter.
    pub filter: Option<String>,
    /// Dead-letter routing.
    pub dead_letter_policy: Option<DeadLetterPolicy>,
    /// Redelivery backoff bounds.
    pub retry_policy: Option<RetryPolicy>,
    /// Idle expiration.
    pub expiration_policy: Option<ExpirationPolicy>,
    /// Write subscription name, message id, publish time and attributes columns.
    pub write_metadata: bool,
    /// Drop message fields that have no matching column.
    pub drop_unknown_fields: bool,
    /// Map JSON message fields onto table columns.
    pub use_table_schema: bool,
    /// Map message fields using the topic's schema.
    pub use_topic_schema: bool,
    /// Resource labels.
    pub labels: BTreeMap<String, String>,
}

impl Default for SinkSubscriptionConfig {
    fn default() -> Self {
        Self {
            ack_deadline_seconds: DEFAULT_ACK_DEADLINE_SECONDS,
            message_retention: None,
            retain_acked_messages: false,
            enable_message_ordering: false,
            filter: None,
            dead_letter_policy: None,
            retry_policy: None,
            expiration_policy: None,
            write_metadata: true,
            drop_unknown_fields: false,
            use_table_schema: false,
            use_topic_schema: false,
            labels: BTreeMap::new(),
        }
    }
}

/// Warehouse table a sink subscription writes into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkTable {
    /// Provider project owning the table.
    pub project_id: String,
    /// Dataset containing the table.
    pub dataset_id: String,
    /// Table identifier.
    pub table_id: String,
}

impl SinkTable {
    /// Creates a sink table reference.
    #[must_use]
    pub fn new(
        project_id: impl Into<String>,
        dataset_id: impl Into<String>,
        table_id: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            dataset_id: dataset_id.into(),
            table_id: table_id.into(),
        }
    }
}

/// Renders as `project.dataset.table`.
impl fmt::Display for SinkTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.project_id, self.dataset_id, self.table_id)
    }
}

/// A topic as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicInfo {
    /// Fully qualified name (`projects/{p}/topics/{t}`).
    pub name: String,
    /// Short topic id.
    pub topic_id: String,
    /// Resource labels.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

/// How a subscription delivers messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionKind {
    /// Consumers pull messages.
    Pull,
    /// The provider streams messages into a warehouse table.
    Sink,
}

/// A subscription as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionInfo {
    /// Fully qualified name (`projects/{p}/subscriptions/{s}`).
    pub name: String,
    /// Short subscription id.
    pub subscription_id: String,
    /// Fully qualified name of the bound topic.
    pub topic: String,
    /// Delivery kind.
    pub kind: SubscriptionKind,
}

/// Client for topics and subscriptions.
#[async_trait]
pub trait MessagingClient: Send + Sync {
    /// Provider project this client operates in.
    fn project_id(&self) -> &str;

    /// Returns whether the topic exists; `Ok(false)` when not found.
    async fn topic_exists(&self, topic_id: &str) -> Result<bool>;

    /// Creates a topic.
    async fn create_topic(&self, spec: &TopicSpec) -> Result<TopicInfo>;

    /// Returns whether the subscription exists; `Ok(false)` when not found.
    async fn subscription_exists(&self, subscription_id: &str) -> Result<bool>;

    /// Creates a pull subscription bound to `topic_id`.
    async fn create_pull_subscription(
        &self,
        topic_id: &str,
        subscription_id: &str,
        config: &PullSubscriptionConfig,
    ) -> Result<SubscriptionInfo>;

    /// Creates a subscription that streams messages from `topic_id` into `sink_table`.
    async fn create_sink_subscription(
        &self,
        topic_id: &str,
        subscription_id: &str,
        sink_table: &SinkTable,
        config: &SinkSubscriptionConfig,
    ) -> Result<SubscriptionInfo>;
}

/// Fully qualified topic name.
#[must_use]
pub fn topic_name(project_id: &str, topic_id: &str) -> String {
    format!("projects/{project_id}/topics/{topic_id}")
}

/// Fully qualified subscription name.
#[must_use]
pub fn subscription_name(project_id: &str, subscription_id: &str) -> String {
    format!("projects/{project_id}/subscriptions/{subscription_id}")
}
