//! In-memory messaging implementation for testing.

use std::collections::{BTreeMap, HashSet};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use super::{
    MessagingClient, PullSubscriptionConfig, SinkSubscriptionConfig, SinkTable, SubscriptionInfo,
    SubscriptionKind, TopicInfo, TopicSpec, subscription_name, topic_name,
};
use crate::error::{Error, Result};

/// One call received by an [`InMemoryMessaging`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessagingCall {
    /// `topic_exists(topic_id)`.
    TopicExists(String),
    /// `create_topic(topic_id)`.
    CreateTopic(String),
    /// `subscription_exists(subscription_id)`.
    SubscriptionExists(String),
    /// `create_pull_subscription(topic_id, subscription_id)`.
    CreatePullSubscription {
        /// Bound topic id.
        topic_id: String,
        /// New subscription id.
        subscription_id: String,
    },
    /// `create_sink_subscription(topic_id, subscription_id, table)`.
    CreateSinkSubscription {
        /// Bound topic id.
        topic_id: String,
        /// New subscription id.
        subscription_id: String,
        /// Target table as `project.dataset.table`.
        table: String,
    },
}

impl MessagingCall {
    /// Returns true for create calls.
    #[must_use]
    pub const fn is_create(&self) -> bool {
        matches!(
            self,
            Self::CreateTopic(_)
                | Self::CreatePullSubscription { .. }
                | Self::CreateSinkSubscription { .. }
        )
    }
}

#[derive(Debug, Default)]
struct MessagingState {
    topics: BTreeMap<String, TopicInfo>,
    subscriptions: BTreeMap<String, SubscriptionInfo>,
    pull_configs: BTreeMap<String, PullSubscriptionConfig>,
    sink_configs: BTreeMap<String, (SinkTable, SinkSubscriptionConfig)>,
    calls: Vec<MessagingCall>,
    failing_creates: HashSet<String>,
}

/// In-memory messaging for testing.
///
/// Records every call; creates of existing resources fail with `Already Exists`
/// and subscriptions on a missing topic fail with `Not found`.
#[derive(Debug)]
pub struct InMemoryMessaging {
    project_id: String,
    state: RwLock<MessagingState>,
}

fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::Internal {
        message: "messaging lock poisoned".into(),
    }
}

impl InMemoryMessaging {
    /// Creates empty messaging for `project_id`.
    #[must_use]
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            state: RwLock::new(MessagingState::default()),
        }
    }

    /// Seeds a topic as if it had been created out of band.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn insert_topic(&self, topic_id: &str) -> Result<()> {
        let info = TopicInfo {
            name: topic_name(&self.project_id, topic_id),
            topic_id: topic_id.to_string(),
            labels: BTreeMap::new(),
        };
        self.state
            .write()
            .map_err(poison_err)?
            .topics
            .insert(topic_id.to_string(), info);
        Ok(())
    }

    /// Seeds a pull subscription as if it had been created out of band.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn insert_subscription(&self, topic_id: &str, subscription_id: &str) -> Result<()> {
        let info = SubscriptionInfo {
            name: subscription_name(&self.project_id, subscription_id),
            subscription_id: subscription_id.to_string(),
            topic: topic_name(&self.project_id, topic_id),
            kind: SubscriptionKind::Pull,
        };
        self.state
            .write()
            .map_err(poison_err)?
            .subscriptions
            .insert(subscription_id.to_string(), info);
        Ok(())
    }

    /// Makes every create call for `resource_id` (topic or subscription id) fail.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn fail_creates_of(&self, resource_id: &str) -> Result<()> {
        self.state
            .write()
            .map_err(poison_err)?
            .failing_creates
            .insert(resource_id.to_string());
        Ok(())
    }

    /// Clears injected create failures.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn clear_failures(&self) -> Result<()> {
        self.state
            .write()
            .map_err(poison_err)?
            .failing_creates
            .clear();
        Ok(())
    }

    /// Returns every call received so far, in order.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn calls(&self) -> Result<Vec<MessagingCall>> {
        Ok(self.state.read().map_err(poison_err)?.calls.clone())
    }

    /// Returns only the create calls received so far, in order.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn create_calls(&self) -> Result<Vec<MessagingCall>> {
        Ok(self
            .calls()?
            .into_iter()
            .filter(MessagingCall::is_create)
            .collect())
    }

    /// Returns the subscription, if it exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn subscription(&self, subscription_id: &str) -> Result<Option<SubscriptionInfo>> {
        Ok(self
            .state
            .read()
            .map_err(poison_err)?
            .subscriptions
            .get(subscription_id)
            .cloned())
    }

    /// Returns the config a pull subscription was created with.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn pull_config(&self, subscription_id: &str) -> Result<Option<PullSubscriptionConfig>> {
        Ok(self
            .state
            .read()
            .map_err(poison_err)?
            .pull_configs
            .get(subscription_id)
            .cloned())
    }

    /// Returns the target table and config a sink subscription was created with.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn sink_config(
        &self,
        subscription_id: &str,
    ) -> Result<Option<(SinkTable, SinkSubscriptionConfig)>> {
        Ok(self
            .state
            .read()
            .map_err(poison_err)?
            .sink_configs
            .get(subscription_id)
            .cloned())
    }

    fn check_subscription_create(
        &self,
        state: &MessagingState,
        topic_id: &str,
        subscription_id: &str,
    ) -> Result<()> {
        let resource = format!(
            "subscription {}",
            subscription_name(&self.project_id, subscription_id)
        );
        if state.failing_creates.contains(subscription_id) {
            return Err(Error::remote_create(resource, "injected failure"));
        }
        if !state.topics.contains_key(topic_id) {
            return Err(Error::remote_create(
                resource,
                format!("Resource not found (resource={topic_id})"),
            ));
        }
        if state.subscriptions.contains_key(subscription_id) {
            return Err(Error::remote_create(resource, "Resource already exists"));
        }
        Ok(())
    }

    fn subscription_info(
        &self,
        topic_id: &str,
        subscription_id: &str,
        kind: SubscriptionKind,
    ) -> SubscriptionInfo {
        SubscriptionInfo {
            name: subscription_name(&self.project_id, subscription_id),
            subscription_id: subscription_id.to_string(),
            topic: topic_name(&self.project_id, topic_id),
            kind,
        }
    }
}

#[async_trait]
impl MessagingClient for InMemoryMessaging {
    fn project_id(&self) -> &str {
        &self.project_id
    }

    async fn topic_exists(&self, topic_id: &str) -> Result<bool> {
        let mut state = self.state.write().map_err(poison_err)?;
        state
            .calls
            .push(MessagingCall::TopicExists(topic_id.to_string()));
        Ok(state.topics.contains_key(topic_id))
    }

    async fn create_topic(&self, spec: &TopicSpec) -> Result<TopicInfo> {
        let name = topic_name(&self.project_id, &spec.topic_id);
        let mut state = self.state.write().map_err(poison_err)?;
        state
            .calls
            .push(MessagingCall::CreateTopic(spec.topic_id.clone()));

        if state.failing_creates.contains(&spec.topic_id) {
            return Err(Error::remote_create(format!("topic {name}"), "injected failure"));
        }
        if state.topics.contains_key(&spec.topic_id) {
            return Err(Error::remote_create(
                format!("topic {name}"),
                "Resource already exists",
            ));
        }

        let info = TopicInfo {
            name,
            topic_id: spec.topic_id.clone(),
            labels: spec.labels.clone(),
        };
        state.topics.insert(spec.topic_id.clone(), info.clone());
        drop(state);
        Ok(info)
    }

    async fn subscription_exists(&self, subscription_id: &str) -> Result<bool> {
        let mut state = self.state.write().map_err(poison_err)?;
        state
            .calls
            .push(MessagingCall::SubscriptionExists(subscription_id.to_string()));
        Ok(state.subscriptions.contains_key(subscription_id))
    }

    async fn create_pull_subscription(
        &self,
        topic_id: &str,
        subscription_id: &str,
        config: &PullSubscriptionConfig,
    ) -> Result<SubscriptionInfo> {
        let mut state = self.state.write().map_err(poison_err)?;
        state.calls.push(MessagingCall::CreatePullSubscription {
            topic_id: topic_id.to_string(),
            subscription_id: subscription_id.to_string(),
        });
        self.check_subscription_create(&state, topic_id, subscription_id)?;

        let info = self.subscription_info(topic_id, subscription_id, SubscriptionKind::Pull);
        state
            .subscriptions
            .insert(subscription_id.to_string(), info.clone());
        state
            .pull_configs
            .insert(subscription_id.to_string(), config.clone());
        drop(state);
        Ok(info)
    }

    async fn create_sink_subscription(
        &self,
        topic_id: &str,
        subscription_id: &str,
        sink_table: &SinkTable,
        config: &SinkSubscriptionConfig,
    ) -> Result<SubscriptionInfo> {
        let mut state = self.state.write().map_err(poison_err)?;
        state.calls.push(MessagingCall::CreateSinkSubscription {
            topic_id: topic_id.to_string(),
            subscription_id: subscription_id.to_string(),
            table: sink_table.to_string(),
        });
        self.check_subscription_create(&state, topic_id, subscription_id)?;

        let info = self.subscription_info(topic_id, subscription_id, SubscriptionKind::Sink);
        state
            .subscriptions
            .insert(subscription_id.to_string(), info.clone());
        state.sink_configs.insert(
            subscription_id.to_string(),
            (sink_table.clone(), config.clone()),
        );
        drop(state);
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscription_requires_topic() {
        let messaging = InMemoryMessaging::new("acme-eu");
        let err = messaging
            .create_pull_subscription(
                "collector_42",
                "collector_42_processor",
                &PullSubscriptionConfig::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RemoteCreate { .. }));
    }

    #[tokio::test]
    async fn creates_topic_and_subscriptions() -> Result<()> {
        let messaging = InMemoryMessaging::new("acme-eu");
        messaging.create_topic(&TopicSpec::new("collector_42")).await?;
        assert!(messaging.topic_exists("collector_42").await?);

        let sink = messaging
            .create_sink_subscription(
                "collector_42",
                "collector_42_warehouse_sink",
                &SinkTable::new("acme-eu", "sx_42", "raw_events"),
                &SinkSubscriptionConfig::default(),
            )
            .await?;
        assert_eq!(sink.kind, SubscriptionKind::Sink);
        assert_eq!(sink.topic, "projects/acme-eu/topics/collector_42");

        let pull = messaging
            .create_pull_subscription(
                "collector_42",
                "collector_42_processor",
                &PullSubscriptionConfig::default(),
            )
            .await?;
        assert_eq!(pull.kind, SubscriptionKind::Pull);
        assert!(messaging.subscription_exists("collector_42_processor").await?);
        assert_eq!(messaging.create_calls()?.len(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_topic_is_rejected() -> Result<()> {
        let messaging = InMemoryMessaging::new("acme-eu");
        messaging.insert_topic("collector_42")?;
        assert!(
            messaging
                .create_topic(&TopicSpec::new("collector_42"))
                .await
                .is_err()
        );
        Ok(())
    }
}
