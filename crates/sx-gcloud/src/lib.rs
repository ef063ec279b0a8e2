//! # sx-gcloud
//!
//! Remote resource clients used by sx provisioning.
//!
//! - [`warehouse`]: BigQuery datasets, tables and views ([`WarehouseClient`])
//! - [`messaging`]: Pub/Sub topics, pull and BigQuery-sink subscriptions
//!   ([`MessagingClient`])
//! - [`schemas`]: the fixed table schemas and view queries every tenant gets
//!
//! Both clients are existence-check friendly: `*_exists` calls return
//! `Ok(false)` for "not found" and only fail on other provider errors, while
//! `create_*` calls fail with [`Error::RemoteCreate`] on rejection. No call is
//! retried.
//!
//! ## Features
//!
//! - `gcp`: enables the REST implementations ([`BigQueryClient`],
//!   [`PubSubClient`]). Without it those types are placeholders that fail
//!   every call with a configuration error.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod messaging;
pub mod schemas;
mod transport;
pub mod warehouse;

pub use error::{Error, Result};
pub use messaging::pubsub::{PubSubClient, PubSubConfig};
pub use messaging::{
    DeadLetterPolicy, ExpirationPolicy, MessagingClient, PullSubscriptionConfig, RetryPolicy,
    SinkSubscriptionConfig, SinkTable, SubscriptionInfo, SubscriptionKind, TopicInfo, TopicSpec,
};
pub use warehouse::bigquery::{BigQueryClient, BigQueryConfig};
pub use warehouse::{
    DatasetInfo, DatasetSpec, FieldMode, FieldType, MultiRegionLocation, TableField, TableInfo,
    TableKind, TableSpec, TimePartitioning, ViewSpec, WarehouseClient,
};
