//! Pub/Sub implementation of [`MessagingClient`].
//!
//! Uses the Pub/Sub v1 REST API, where create is an idempotent-looking `PUT`
//! on the resource name that fails with `ALREADY_EXISTS` for duplicates:
//!
//! - `GET|PUT /v1/projects/{p}/topics/{t}`
//! - `GET|PUT /v1/projects/{p}/subscriptions/{s}`

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::MessagingClient;
use crate::error::{Error, Result};

const DEFAULT_ENDPOINT: &str = "https://pubsub.googleapis.com/v1";

/// Configuration for a [`PubSubClient`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PubSubConfig {
    /// Provider project topics and subscriptions live in.
    pub project_id: String,
    /// API base URL.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Per-request transport timeout.
    #[serde(default = "default_request_timeout")]
    pub request_timeout: Duration,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(60)
}

impl PubSubConfig {
    /// Creates a config for `project_id`.
    #[must_use]
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            endpoint: default_endpoint(),
            request_timeout: default_request_timeout(),
        }
    }

    /// Overrides the API base URL (e.g. the Pub/Sub emulator).
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the per-request transport timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.project_id.trim().is_empty() {
            return Err(Error::configuration("project_id cannot be empty"));
        }
        Ok(())
    }
}

#[cfg_attr(not(feature = "gcp"), allow(dead_code))]
impl PubSubConfig {
    fn topic_url(&self, topic_id: &str) -> String {
        format!("{}/{}", self.endpoint, super::topic_name(&self.project_id, topic_id))
    }

    fn subscription_url(&self, subscription_id: &str) -> String {
        format!(
            "{}/{}",
            self.endpoint,
            super::subscription_name(&self.project_id, subscription_id)
        )
    }
}

/// REST request and response bodies.
#[cfg_attr(not(feature = "gcp"), allow(dead_code))]
mod wire {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Serialize};

    use crate::messaging::{
        DeadLetterPolicy, ExpirationPolicy, PullSubscriptionConfig, RetryPolicy,
        SinkSubscriptionConfig, SinkTable, SubscriptionInfo, SubscriptionKind, TopicInfo,
        TopicSpec, topic_name,
    };
    use crate::transport::format_duration;

    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct TopicResource {
        #[serde(skip_serializing_if = "Option::is_none")]
        message_retention_duration: Option<String>,
        #[serde(skip_serializing_if = "BTreeMap::is_empty")]
        labels: BTreeMap<String, String>,
    }

    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct SubscriptionResource {
        topic: String,
        ack_deadline_seconds: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        message_retention_duration: Option<String>,
        retain_acked_messages: bool,
        enable_message_ordering: bool,
        enable_exactly_once_delivery: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        filter: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        dead_letter_policy: Option<DeadLetterPolicyResource>,
        #[serde(skip_serializing_if = "Option::is_none")]
        retry_policy: Option<RetryPolicyResource>,
        #[serde(skip_serializing_if = "Option::is_none")]
        expiration_policy: Option<ExpirationPolicyResource>,
        #[serde(skip_serializing_if = "Option::is_none")]
        bigquery_config: Option<BigQueryConfigResource>,
        #[serde(skip_serializing_if = "BTreeMap::is_empty")]
        labels: BTreeMap<String, String>,
    }

    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct DeadLetterPolicyResource {
        dead_letter_topic: String,
        max_delivery_attempts: u32,
    }

    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct RetryPolicyResource {
        minimum_backoff: String,
        maximum_backoff: String,
    }

    /// An empty object means "never expire".
    #[derive(Debug, Serialize)]
    pub(super) struct ExpirationPolicyResource {
        #[serde(skip_serializing_if = "Option::is_none")]
        ttl: Option<String>,
    }

    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct BigQueryConfigResource {
        table: String,
        use_topic_schema: bool,
        use_table_schema: bool,
        write_metadata: bool,
        drop_unknown_fields: bool,
    }

    #[derive(Debug, Deserialize)]
    pub(super) struct TopicResponse {
        name: String,
        #[serde(default)]
        labels: BTreeMap<String, String>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct SubscriptionResponse {
        name: String,
        topic: String,
        #[serde(default)]
        bigquery_config: Option<serde_json::Value>,
    }

    /// Settings shared by pull and sink subscriptions.
    struct Common<'a> {
        ack_deadline_seconds: u32,
        message_retention: Option<std::time::Duration>,
        retain_acked_messages: bool,
        enable_message_ordering: bool,
        filter: Option<&'a String>,
        dead_letter_policy: Option<&'a DeadLetterPolicy>,
        retry_policy: Option<&'a RetryPolicy>,
        expiration_policy: Option<ExpirationPolicy>,
        labels: &'a BTreeMap<String, String>,
    }

    fn subscription_body(
        project_id: &str,
        topic_id: &str,
        common: &Common<'_>,
        enable_exactly_once_delivery: bool,
        bigquery_config: Option<BigQueryConfigResource>,
    ) -> SubscriptionResource {
        SubscriptionResource {
            topic: topic_name(project_id, topic_id),
            ack_deadline_seconds: common.ack_deadline_seconds,
            message_retention_duration: common.message_retention.map(format_duration),
            retain_acked_messages: common.retain_acked_messages,
            enable_message_ordering: common.enable_message_ordering,
            enable_exactly_once_delivery,
            filter: common.filter.cloned(),
            dead_letter_policy: common.dead_letter_policy.map(|p| DeadLetterPolicyResource {
                dead_letter_topic: topic_name(project_id, &p.dead_letter_topic),
                max_delivery_attempts: p.max_delivery_attempts,
            }),
            retry_policy: common.retry_policy.map(|p| RetryPolicyResource {
                minimum_backoff: format_duration(p.minimum_backoff),
                maximum_backoff: format_duration(p.maximum_backoff),
            }),
            expiration_policy: common.expiration_policy.map(|p| match p {
                ExpirationPolicy::Ttl(ttl) => ExpirationPolicyResource {
                    ttl: Some(format_duration(ttl)),
                },
                ExpirationPolicy::Never => ExpirationPolicyResource { ttl: None },
            }),
            bigquery_config,
            labels: common.labels.clone(),
        }
    }

    pub(super) fn topic_body(spec: &TopicSpec) -> TopicResource {
        TopicResource {
            message_retention_duration: spec.message_retention.map(format_duration),
            labels: spec.labels.clone(),
        }
    }

    pub(super) fn pull_body(
        project_id: &str,
        topic_id: &str,
        config: &PullSubscriptionConfig,
    ) -> SubscriptionResource {
        let common = Common {
            ack_deadline_seconds: config.ack_deadline_seconds,
            message_retention: config.message_retention,
            retain_acked_messages: config.retain_acked_messages,
            enable_message_ordering: config.enable_message_ordering,
            filter: config.filter.as_ref(),
            dead_letter_policy: config.dead_letter_policy.as_ref(),
            retry_policy: config.retry_policy.as_ref(),
            expiration_policy: config.expiration_policy,
            labels: &config.labels,
        };
        subscription_body(
            project_id,
            topic_id,
            &common,
            config.enable_exactly_once_delivery,
            None,
        )
    }

    pub(super) fn sink_body(
        project_id: &str,
        topic_id: &str,
        sink_table: &SinkTable,
        config: &SinkSubscriptionConfig,
    ) -> SubscriptionResource {
        let common = Common {
            ack_deadline_seconds: config.ack_deadline_seconds,
            message_retention: config.message_retention,
            retain_acked_messages: config.retain_acked_messages,
            enable_message_ordering: config.enable_message_ordering,
            filter: config.filter.as_ref(),
            dead_letter_policy: config.dead_letter_policy.as_ref(),
            retry_policy: config.retry_policy.as_ref(),
            expiration_policy: config.expiration_policy,
            labels: &config.labels,
        };
        let bigquery_config = BigQueryConfigResource {
            table: sink_table.to_string(),
            use_topic_schema: config.use_topic_schema,
            use_table_schema: config.use_table_schema,
            write_metadata: config.write_metadata,
            drop_unknown_fields: config.drop_unknown_fields,
        };
        subscription_body(project_id, topic_id, &common, false, Some(bigquery_config))
    }

    impl TopicResponse {
        pub(super) fn into_info(self, topic_id: &str) -> TopicInfo {
            TopicInfo {
                name: self.name,
                topic_id: topic_id.to_string(),
                labels: self.labels,
            }
        }
    }

    impl SubscriptionResponse {
        pub(super) fn into_info(self, subscription_id: &str) -> SubscriptionInfo {
            SubscriptionInfo {
                name: self.name,
                subscription_id: subscription_id.to_string(),
                topic: self.topic,
                kind: if self.bigquery_config.is_some() {
                    SubscriptionKind::Sink
                } else {
                    SubscriptionKind::Pull
                },
            }
        }
    }
}

// ============================================================================
// GCP Feature-Gated Implementation
// ============================================================================

#[cfg(feature = "gcp")]
mod gcp_impl {
    use async_trait::async_trait;
    use reqwest::Method;

    use super::wire::{self, SubscriptionResponse, TopicResponse};
    use super::{MessagingClient, PubSubConfig, Result};
    use crate::messaging::{
        PullSubscriptionConfig, SinkSubscriptionConfig, SinkTable, SubscriptionInfo, TopicInfo,
        TopicSpec, subscription_name, topic_name,
    };
    use crate::transport::http::GcpTransport;

    const SCOPE: &str = "https://www.googleapis.com/auth/pubsub";

    /// Pub/Sub messaging client.
    #[derive(Debug)]
    pub struct PubSubClient {
        config: PubSubConfig,
        transport: GcpTransport,
    }

    impl PubSubClient {
        /// Creates a client, discovering credentials from the environment.
        ///
        /// # Errors
        ///
        /// Returns an error if the configuration is invalid or GCP
        /// authentication cannot be initialized.
        pub async fn new(config: PubSubConfig) -> Result<Self> {
            config.validate()?;
            let transport = GcpTransport::new(SCOPE, config.request_timeout).await?;
            Ok(Self { config, transport })
        }

        fn topic_resource(&self, topic_id: &str) -> String {
            format!("topic {}", topic_name(&self.config.project_id, topic_id))
        }

        fn subscription_resource(&self, subscription_id: &str) -> String {
            format!(
                "subscription {}",
                subscription_name(&self.config.project_id, subscription_id)
            )
        }
    }

    #[async_trait]
    impl MessagingClient for PubSubClient {
        fn project_id(&self) -> &str {
            &self.config.project_id
        }

        async fn topic_exists(&self, topic_id: &str) -> Result<bool> {
            self.transport
                .exists(
                    &self.topic_resource(topic_id),
                    &self.config.topic_url(topic_id),
                )
                .await
        }

        async fn create_topic(&self, spec: &TopicSpec) -> Result<TopicInfo> {
            let created: TopicResponse = self
                .transport
                .create(
                    Method::PUT,
                    &self.topic_resource(&spec.topic_id),
                    &self.config.topic_url(&spec.topic_id),
                    &wire::topic_body(spec),
                )
                .await?;
            tracing::debug!(topic_id = %spec.topic_id, "Pub/Sub topic created");
            Ok(created.into_info(&spec.topic_id))
        }

        async fn subscription_exists(&self, subscription_id: &str) -> Result<bool> {
            self.transport
                .exists(
                    &self.subscription_resource(subscription_id),
                    &self.config.subscription_url(subscription_id),
                )
                .await
        }

        async fn create_pull_subscription(
            &self,
            topic_id: &str,
            subscription_id: &str,
            config: &PullSubscriptionConfig,
        ) -> Result<SubscriptionInfo> {
            let body = wire::pull_body(&self.config.project_id, topic_id, config);
            let created: SubscriptionResponse = self
                .transport
                .create(
                    Method::PUT,
                    &self.subscription_resource(subscription_id),
                    &self.config.subscription_url(subscription_id),
                    &body,
                )
                .await?;
            tracing::debug!(topic_id, subscription_id, "Pub/Sub pull subscription created");
            Ok(created.into_info(subscription_id))
        }

        async fn create_sink_subscription(
            &self,
            topic_id: &str,
            subscription_id: &str,
            sink_table: &SinkTable,
            config: &SinkSubscriptionConfig,
        ) -> Result<SubscriptionInfo> {
            let body = wire::sink_body(&self.config.project_id, topic_id, sink_table, config);
            let created: SubscriptionResponse = self
                .transport
                .create(
                    Method::PUT,
                    &self.subscription_resource(subscription_id),
                    &self.config.subscription_url(subscription_id),
                    &body,
                )
                .await?;
            tracing::debug!(
                topic_id,
                subscription_id,
                table = %sink_table,
                "Pub/Sub BigQuery subscription created"
            );
            Ok(created.into_info(subscription_id))
        }
    }
}

// ============================================================================
// Non-GCP Placeholder Implementation
// ============================================================================

#[cfg(not(feature = "gcp"))]
mod placeholder_impl {
    use async_trait::async_trait;

    use super::{Error, MessagingClient, PubSubConfig, Result};
    use crate::messaging::{
        PullSubscriptionConfig, SinkSubscriptionConfig, SinkTable, SubscriptionInfo, TopicInfo,
        TopicSpec,
    };

    const FEATURE_HINT: &str = "PubSubClient requires the 'gcp' feature to be enabled. \
         Add `sx-gcloud = { features = [\"gcp\"] }` to your Cargo.toml.";

    /// Placeholder Pub/Sub client (GCP feature not enabled).
    #[derive(Debug)]
    pub struct PubSubClient {
        config: PubSubConfig,
    }

    impl PubSubClient {
        /// Creates a new placeholder client.
        ///
        /// # Errors
        ///
        /// Returns an error if configuration is invalid.
        #[allow(clippy::unused_async)]
        pub async fn new(config: PubSubConfig) -> Result<Self> {
            config.validate()?;
            Ok(Self { config })
        }
    }

    #[async_trait]
    impl MessagingClient for PubSubClient {
        fn project_id(&self) -> &str {
            &self.config.project_id
        }

        async fn topic_exists(&self, _topic_id: &str) -> Result<bool> {
            Err(Error::configuration(FEATURE_HINT))
        }

        async fn create_topic(&self, _spec: &TopicSpec) -> Result<TopicInfo> {
            Err(Error::configuration(FEATURE_HINT))
        }

        async fn subscription_exists(&self, _subscription_id: &str) -> Result<bool> {
            Err(Error::configuration(FEATURE_HINT))
        }

        async fn create_pull_subscription(
            &self,
            _topic_id: &str,
            _subscription_id: &str,
            _config: &PullSubscriptionConfig,
        ) -> Result<SubscriptionInfo> {
            Err(Error::configuration(FEATURE_HINT))
        }

        async fn create_sink_subscription(
            &self,
            _topic_id: &str,
            _subscription_id: &str,
            _sink_table: &SinkTable,
            _config: &SinkSubscriptionConfig,
        ) -> Result<SubscriptionInfo> {
            Err(Error::configuration(FEATURE_HINT))
        }
    }
}

#[cfg(feature = "gcp")]
pub use gcp_impl::PubSubClient;

#[cfg(not(feature = "gcp"))]
pub use placeholder_impl::PubSubClient;

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::{PubSubConfig, wire};
    use crate::messaging::{
        DeadLetterPolicy, ExpirationPolicy, PullSubscriptionConfig, RetryPolicy,
        SinkSubscriptionConfig, SinkTable, TopicSpec,
    };

    #[test]
    fn config_urls() {
        let config = PubSubConfig::new("acme-eu");
        assert_eq!(
            config.topic_url("collector_42"),
            "https://pubsub.googleapis.com/v1/projects/acme-eu/topics/collector_42"
        );
        let emulator = config.with_endpoint("http://localhost:8085/v1/");
        assert_eq!(
            emulator.subscription_url("collector_42_processor"),
            "http://localhost:8085/v1/projects/acme-eu/subscriptions/collector_42_processor"
        );
        assert!(PubSubConfig::new("").validate().is_err());
    }

    #[test]
    fn topic_body_formats_retention() {
        let mut spec = TopicSpec::new("collector_42");
        spec.message_retention = Some(Duration::from_secs(86_400));
        let body = serde_json::to_value(wire::topic_body(&spec)).unwrap();
        assert_eq!(body, json!({"messageRetentionDuration": "86400s"}));
    }

    #[test]
    fn pull_body_carries_all_options() {
        let config = PullSubscriptionConfig {
            ack_deadline_seconds: 60,
            message_retention: Some(Duration::from_secs(600)),
            retain_acked_messages: true,
            enable_message_ordering: true,
            enable_exactly_once_delivery: true,
            filter: Some("attributes.kind = \"event\"".into()),
            dead_letter_policy: Some(DeadLetterPolicy {
                dead_letter_topic: "collector_42_dead".into(),
                max_delivery_attempts: 5,
            }),
            retry_policy: Some(RetryPolicy {
                minimum_backoff: Duration::from_secs(10),
                maximum_backoff: Duration::from_secs(600),
            }),
            expiration_policy: Some(ExpirationPolicy::Never),
            labels: [("managed_by".to_string(), "sx-provisioner".to_string())].into(),
        };

        let body =
            serde_json::to_value(wire::pull_body("acme-eu", "collector_42", &config)).unwrap();
        assert_eq!(body["topic"], "projects/acme-eu/topics/collector_42");
        assert_eq!(body["ackDeadlineSeconds"], 60);
        assert_eq!(body["messageRetentionDuration"], "600s");
        assert_eq!(body["retainAckedMessages"], true);
        assert_eq!(body["enableMessageOrdering"], true);
        assert_eq!(body["enableExactlyOnceDelivery"], true);
        assert_eq!(body["filter"], "attributes.kind = \"event\"");
        assert_eq!(
            body["deadLetterPolicy"],
            json!({
                "deadLetterTopic": "projects/acme-eu/topics/collector_42_dead",
                "maxDeliveryAttempts": 5
            })
        );
        assert_eq!(
            body["retryPolicy"],
            json!({"minimumBackoff": "10s", "maximumBackoff": "600s"})
        );
        assert_eq!(body["expirationPolicy"], json!({}));
        assert_eq!(body["labels"]["managed_by"], "sx-provisioner");
        assert!(body.get("bigqueryConfig").is_none());
    }

    #[test]
    fn sink_body_points_at_table() {
        let config = SinkSubscriptionConfig {
            use_table_schema: true,
            drop_unknown_fields: true,
            write_metadata: false,
            expiration_policy: Some(ExpirationPolicy::Ttl(Duration::from_secs(3600))),
            ..SinkSubscriptionConfig::default()
        };
        let table = SinkTable::new("acme-eu", "sx_42", "raw_events");

        let body = serde_json::to_value(wire::sink_body("acme-eu", "collector_42", &table, &config))
            .unwrap();
        assert_eq!(
            body["bigqueryConfig"],
            json!({
                "table": "acme-eu.sx_42.raw_events",
                "useTopicSchema": false,
                "useTableSchema": true,
                "writeMetadata": false,
                "dropUnknownFields": true
            })
        );
        assert_eq!(body["expirationPolicy"], json!({"ttl": "3600s"}));
        assert_eq!(body["enableExactlyOnceDelivery"], false);
    }
}
