//! BigQuery implementation of [`WarehouseClient`].
//!
//! Talks to the BigQuery v2 REST API:
//!
//! - `GET  /projects/{p}/datasets/{d}` and `POST /projects/{p}/datasets`
//! - `GET  /projects/{p}/datasets/{d}/tables/{t}` and `POST .../tables`
//!
//! Only compiled against the real API when the `gcp` feature is enabled;
//! otherwise [`BigQueryClient`] is a placeholder that rejects every call.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{DatasetSpec, WarehouseClient};
use crate::error::{Error, Result};

const DEFAULT_ENDPOINT: &str = "https://bigquery.googleapis.com/bigquery/v2";

/// Configuration for a [`BigQueryClient`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BigQueryConfig {
    /// Provider project datasets are created in.
    pub project_id: String,
    /// Default dataset location (`EU`, `US`, or a single region).
    pub location: String,
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

impl BigQueryConfig {
    /// Creates a config for `project_id` with datasets defaulting to `location`.
    #[must_use]
    pub fn new(project_id: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            location: location.into(),
            endpoint: default_endpoint(),
            request_timeout: default_request_timeout(),
        }
    }

    /// Overrides the API base URL.
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
        if self.location.trim().is_empty() {
            return Err(Error::configuration("location cannot be empty"));
        }
        Ok(())
    }
}

#[cfg_attr(not(feature = "gcp"), allow(dead_code))]
impl BigQueryConfig {
    fn datasets_url(&self) -> String {
        format!("{}/projects/{}/datasets", self.endpoint, self.project_id)
    }

    fn dataset_url(&self, dataset_id: &str) -> String {
        format!("{}/{dataset_id}", self.datasets_url())
    }

    fn tables_url(&self, dataset_id: &str) -> String {
        format!("{}/tables", self.dataset_url(dataset_id))
    }

    fn table_url(&self, dataset_id: &str, table_id: &str) -> String {
        format!("{}/{table_id}", self.tables_url(dataset_id))
    }

    fn dataset_resource(&self, dataset_id: &str) -> String {
        format!("dataset {}:{dataset_id}", self.project_id)
    }

    fn table_resource(&self, dataset_id: &str, table_id: &str) -> String {
        format!("table {}:{dataset_id}.{table_id}", self.project_id)
    }
}

/// REST request and response bodies.
#[cfg_attr(not(feature = "gcp"), allow(dead_code))]
mod wire {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Serialize};

    use crate::warehouse::{
        DatasetInfo, DatasetSpec, TableField, TableInfo, TableKind, TableSpec, ViewSpec,
    };

    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct DatasetResource {
        dataset_reference: DatasetReference,
        location: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        default_table_expiration_ms: Option<String>,
        #[serde(skip_serializing_if = "BTreeMap::is_empty")]
        labels: BTreeMap<String, String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct DatasetReference {
        project_id: String,
        dataset_id: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct TableReference {
        project_id: String,
        dataset_id: String,
        table_id: String,
    }

    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct TableResource {
        table_reference: TableReference,
        #[serde(skip_serializing_if = "Option::is_none")]
        schema: Option<TableSchema>,
        #[serde(skip_serializing_if = "Option::is_none")]
        time_partitioning: Option<TimePartitioningResource>,
        #[serde(skip_serializing_if = "Option::is_none")]
        require_partition_filter: Option<bool>,
        #[serde(skip_serializing_if = "Option::is_none")]
        clustering: Option<Clustering>,
        #[serde(skip_serializing_if = "Option::is_none")]
        view: Option<ViewDefinition>,
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(skip_serializing_if = "BTreeMap::is_empty")]
        labels: BTreeMap<String, String>,
    }

    #[derive(Debug, Serialize)]
    pub(super) struct TableSchema {
        fields: Vec<TableFieldSchema>,
    }

    #[derive(Debug, Serialize)]
    pub(super) struct TableFieldSchema {
        name: String,
        #[serde(rename = "type")]
        field_type: &'static str,
        mode: &'static str,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        fields: Vec<TableFieldSchema>,
    }

    impl From<&TableField> for TableFieldSchema {
        fn from(field: &TableField) -> Self {
            Self {
                name: field.name.clone(),
                field_type: field.field_type.as_str(),
                mode: field.mode.as_str(),
                fields: field.fields.iter().map(Self::from).collect(),
            }
        }
    }

    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct TimePartitioningResource {
        #[serde(rename = "type")]
        partition_type: &'static str,
        field: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        expiration_ms: Option<String>,
    }

    #[derive(Debug, Serialize)]
    pub(super) struct Clustering {
        fields: Vec<String>,
    }

    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct ViewDefinition {
        query: String,
        use_legacy_sql: bool,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct DatasetResponse {
        dataset_reference: DatasetReference,
        #[serde(default)]
        location: Option<String>,
        #[serde(default)]
        labels: BTreeMap<String, String>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct TableResponse {
        table_reference: TableReference,
        #[serde(rename = "type", default)]
        kind: Option<String>,
    }

    pub(super) fn dataset_body(
        project_id: &str,
        default_location: &str,
        spec: &DatasetSpec,
    ) -> DatasetResource {
        DatasetResource {
            dataset_reference: DatasetReference {
                project_id: project_id.to_string(),
                dataset_id: spec.dataset_id.clone(),
            },
            location: spec
                .location
                .clone()
                .unwrap_or_else(|| default_location.to_string()),
            description: spec.description.clone(),
            default_table_expiration_ms: spec
                .default_table_expiration
                .map(|d| d.as_millis().to_string()),
            labels: spec.labels.clone(),
        }
    }

    pub(super) fn table_body(project_id: &str, spec: &TableSpec) -> TableResource {
        TableResource {
            table_reference: TableReference {
                project_id: project_id.to_string(),
                dataset_id: spec.dataset_id.clone(),
                table_id: spec.table_id.clone(),
            },
            schema: Some(TableSchema {
                fields: spec.schema.iter().map(TableFieldSchema::from).collect(),
            }),
            time_partitioning: spec.time_partitioning.as_ref().map(|p| {
                TimePartitioningResource {
                    partition_type: "DAY",
                    field: p.field.clone(),
                    expiration_ms: p.expiration.map(|d| d.as_millis().to_string()),
                }
            }),
            require_partition_filter: spec
                .time_partitioning
                .as_ref()
                .map(|p| p.require_partition_filter),
            clustering: (!spec.clustering.is_empty()).then(|| Clustering {
                fields: spec.clustering.clone(),
            }),
            view: None,
            description: spec.description.clone(),
            labels: spec.labels.clone(),
        }
    }

    pub(super) fn view_body(project_id: &str, spec: &ViewSpec) -> TableResource {
        TableResource {
            table_reference: TableReference {
                project_id: project_id.to_string(),
                dataset_id: spec.dataset_id.clone(),
                table_id: spec.view_id.clone(),
            },
            schema: None,
            time_partitioning: None,
            require_partition_filter: None,
            clustering: None,
            view: Some(ViewDefinition {
                query: spec.query.clone(),
                use_legacy_sql: false,
            }),
            description: spec.description.clone(),
            labels: spec.labels.clone(),
        }
    }

    impl DatasetResponse {
        pub(super) fn into_info(self, fallback_location: &str) -> DatasetInfo {
            DatasetInfo {
                project_id: self.dataset_reference.project_id,
                dataset_id: self.dataset_reference.dataset_id,
                location: self
                    .location
                    .unwrap_or_else(|| fallback_location.to_string()),
                labels: self.labels,
            }
        }
    }

    impl TableResponse {
        pub(super) fn into_info(self) -> TableInfo {
            let kind = match self.kind.as_deref() {
                Some("VIEW") => TableKind::View,
                _ => TableKind::Table,
            };
            TableInfo {
                project_id: self.table_reference.project_id,
                dataset_id: self.table_reference.dataset_id,
                table_id: self.table_reference.table_id,
                kind,
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

    use super::wire::{self, DatasetResponse, TableResponse};
    use super::{BigQueryConfig, DatasetSpec, Result, WarehouseClient};
    use crate::transport::http::GcpTransport;
    use crate::warehouse::{DatasetInfo, TableInfo, TableSpec, ViewSpec};

    const SCOPE: &str = "https://www.googleapis.com/auth/bigquery";

    /// BigQuery warehouse client.
    #[derive(Debug)]
    pub struct BigQueryClient {
        config: BigQueryConfig,
        transport: GcpTransport,
    }

    impl BigQueryClient {
        /// Creates a client, discovering credentials from the environment.
        ///
        /// # Errors
        ///
        /// Returns an error if the configuration is invalid or GCP
        /// authentication cannot be initialized.
        pub async fn new(config: BigQueryConfig) -> Result<Self> {
            config.validate()?;
            let transport = GcpTransport::new(SCOPE, config.request_timeout).await?;
            Ok(Self { config, transport })
        }
    }

    #[async_trait]
    impl WarehouseClient for BigQueryClient {
        fn project_id(&self) -> &str {
            &self.config.project_id
        }

        async fn dataset_exists(&self, dataset_id: &str) -> Result<bool> {
            self.transport
                .exists(
                    &self.config.dataset_resource(dataset_id),
                    &self.config.dataset_url(dataset_id),
                )
                .await
        }

        async fn create_dataset(&self, spec: &DatasetSpec) -> Result<DatasetInfo> {
            let body = wire::dataset_body(&self.config.project_id, &self.config.location, spec);
            let created: DatasetResponse = self
                .transport
                .create(
                    Method::POST,
                    &self.config.dataset_resource(&spec.dataset_id),
                    &self.config.datasets_url(),
                    &body,
                )
                .await?;
            tracing::debug!(dataset_id = %spec.dataset_id, "BigQuery dataset created");
            Ok(created.into_info(&self.config.location))
        }

        async fn table_exists(&self, dataset_id: &str, table_id: &str) -> Result<bool> {
            self.transport
                .exists(
                    &self.config.table_resource(dataset_id, table_id),
                    &self.config.table_url(dataset_id, table_id),
                )
                .await
        }

        async fn create_table(&self, spec: &TableSpec) -> Result<TableInfo> {
            let body = wire::table_body(&self.config.project_id, spec);
            let created: TableResponse = self
                .transport
                .create(
                    Method::POST,
                    &self.config.table_resource(&spec.dataset_id, &spec.table_id),
                    &self.config.tables_url(&spec.dataset_id),
                    &body,
                )
                .await?;
            tracing::debug!(
                dataset_id = %spec.dataset_id,
                table_id = %spec.table_id,
                "BigQuery table created"
            );
            Ok(created.into_info())
        }

        async fn create_view(&self, spec: &ViewSpec) -> Result<TableInfo> {
            let body = wire::view_body(&self.config.project_id, spec);
            let created: TableResponse = self
                .transport
                .create(
                    Method::POST,
                    &self.config.table_resource(&spec.dataset_id, &spec.view_id),
                    &self.config.tables_url(&spec.dataset_id),
                    &body,
                )
                .await?;
            tracing::debug!(
                dataset_id = %spec.dataset_id,
                view_id = %spec.view_id,
                "BigQuery view created"
            );
            Ok(created.into_info())
        }
    }
}

// ============================================================================
// Non-GCP Placeholder Implementation
// ============================================================================

#[cfg(not(feature = "gcp"))]
mod placeholder_impl {
    use async_trait::async_trait;

    use super::{BigQueryConfig, DatasetSpec, Error, Result, WarehouseClient};
    use crate::warehouse::{DatasetInfo, TableInfo, TableSpec, ViewSpec};

    const FEATURE_HINT: &str = "BigQueryClient requires the 'gcp' feature to be enabled. \
         Add `sx-gcloud = { features = [\"gcp\"] }` to your Cargo.toml.";

    /// Placeholder BigQuery client (GCP feature not enabled).
    #[derive(Debug)]
    pub struct BigQueryClient {
        config: BigQueryConfig,
    }

    impl BigQueryClient {
        /// Creates a new placeholder client.
        ///
        /// # Errors
        ///
        /// Returns an error if configuration is invalid.
        #[allow(clippy::unused_async)]
        pub async fn new(config: BigQueryConfig) -> Result<Self> {
            config.validate()?;
            Ok(Self { config })
        }
    }

    #[async_trait]
    impl WarehouseClient for BigQueryClient {
        fn project_id(&self) -> &str {
            &self.config.project_id
        }

        async fn dataset_exists(&self, _dataset_id: &str) -> Result<bool> {
            Err(Error::configuration(FEATURE_HINT))
        }

        async fn create_dataset(&self, _spec: &DatasetSpec) -> Result<DatasetInfo> {
            Err(Error::configuration(FEATURE_HINT))
        }

        async fn table_exists(&self, _dataset_id: &str, _table_id: &str) -> Result<bool> {
            Err(Error::configuration(FEATURE_HINT))
        }

        async fn create_table(&self, _spec: &TableSpec) -> Result<TableInfo> {
            Err(Error::configuration(FEATURE_HINT))
        }

        async fn create_view(&self, _spec: &ViewSpec) -> Result<TableInfo> {
            Err(Error::configuration(FEATURE_HINT))
        }
    }
}

#[cfg(feature = "gcp")]
pub use gcp_impl::BigQueryClient;

#[cfg(not(feature = "gcp"))]
pub use placeholder_impl::BigQueryClient;

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::{BigQueryConfig, wire};
    use crate::warehouse::{
        DatasetSpec, FieldType, TableField, TableSpec, TimePartitioning, ViewSpec,
    };

    #[test]
    fn config_urls() {
        let config = BigQueryConfig::new("acme-eu", "EU");
        assert_eq!(
            config.dataset_url("sx_42"),
            "https://bigquery.googleapis.com/bigquery/v2/projects/acme-eu/datasets/sx_42"
        );
        assert_eq!(
            config.table_url("sx_42", "raw_events"),
            "https://bigquery.googleapis.com/bigquery/v2/projects/acme-eu/datasets/sx_42/tables/raw_events"
        );

        let local = config.with_endpoint("http://localhost:9050/bigquery/v2/");
        assert_eq!(
            local.datasets_url(),
            "http://localhost:9050/bigquery/v2/projects/acme-eu/datasets"
        );
    }

    #[test]
    fn config_rejects_empty_project() {
        assert!(BigQueryConfig::new("", "EU").validate().is_err());
        assert!(BigQueryConfig::new("acme-eu", " ").validate().is_err());
        assert!(BigQueryConfig::new("acme-eu", "EU").validate().is_ok());
    }

    #[test]
    fn dataset_body_uses_default_location() {
        let mut spec = DatasetSpec::new("sx_42");
        spec.labels.insert("managed_by".into(), "sx-provisioner".into());
        spec.default_table_expiration = Some(Duration::from_secs(3600));

        let body = serde_json::to_value(wire::dataset_body("acme-eu", "EU", &spec)).unwrap();
        assert_eq!(
            body,
            json!({
                "datasetReference": {"projectId": "acme-eu", "datasetId": "sx_42"},
                "location": "EU",
                "defaultTableExpirationMs": "3600000",
                "labels": {"managed_by": "sx-provisioner"}
            })
        );
    }

    #[test]
    fn table_body_carries_partitioning_and_nested_schema() {
        let spec = TableSpec {
            dataset_id: "sx_42".into(),
            table_id: "ad_costs".into(),
            schema: vec![
                TableField::new("date", FieldType::Date).required(),
                TableField::record(
                    "url_params",
                    vec![
                        TableField::new("key", FieldType::String),
                        TableField::new("value", FieldType::String),
                    ],
                )
                .repeated(),
            ],
            time_partitioning: Some(TimePartitioning::daily("date")),
            clustering: vec!["source".into()],
            description: None,
            labels: Default::default(),
        };

        let body = serde_json::to_value(wire::table_body("acme-eu", &spec)).unwrap();
        assert_eq!(body["tableReference"]["tableId"], "ad_costs");
        assert_eq!(
            body["timePartitioning"],
            json!({"type": "DAY", "field": "date"})
        );
        assert_eq!(body["requirePartitionFilter"], true);
        assert_eq!(body["clustering"], json!({"fields": ["source"]}));
        assert_eq!(body["schema"]["fields"][0]["mode"], "REQUIRED");
        assert_eq!(body["schema"]["fields"][1]["type"], "RECORD");
        assert_eq!(body["schema"]["fields"][1]["mode"], "REPEATED");
        assert_eq!(body["schema"]["fields"][1]["fields"][1]["name"], "value");
        assert!(body.get("view").is_none());
    }

    #[test]
    fn view_body_uses_standard_sql() {
        let spec = ViewSpec {
            dataset_id: "sx_42".into(),
            view_id: "excluded_referrers".into(),
            query: "select 1".into(),
            description: None,
            labels: Default::default(),
        };

        let body = serde_json::to_value(wire::view_body("acme-eu", &spec)).unwrap();
        assert_eq!(
            body["view"],
            json!({"query": "select 1", "useLegacySql": false})
        );
        assert!(body.get("schema").is_none());
    }

    #[cfg(not(feature = "gcp"))]
    mod placeholder_tests {
        use super::BigQueryConfig;
        use crate::error::Error;
        use crate::warehouse::WarehouseClient;
        use crate::warehouse::bigquery::BigQueryClient;

        #[tokio::test]
        async fn placeholder_rejects_calls() {
            let client = BigQueryClient::new(BigQueryConfig::new("acme-eu", "EU"))
                .await
                .unwrap();
            assert_eq!(client.project_id(), "acme-eu");
            assert!(matches!(
                client.dataset_exists("sx_42").await,
                Err(Error::Configuration(_))
            ));
        }
    }
}
