//! Warehouse resource client: datasets, tables and views.
//!
//! A [`WarehouseClient`] is bound to one provider project and one default
//! dataset location. Callers check existence first and only create what is
//! missing; the client itself never retries.

pub mod bigquery;
pub mod memory;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Multi-region location a dataset can live in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MultiRegionLocation {
    /// European Union.
    #[serde(rename = "EU")]
    Eu,
    /// United States.
    #[serde(rename = "US")]
    Us,
}

impl MultiRegionLocation {
    /// Returns the provider's location code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eu => "EU",
            Self::Us => "US",
        }
    }
}

impl fmt::Display for MultiRegionLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MultiRegionLocation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "EU" => Ok(Self::Eu),
            "US" => Ok(Self::Us),
            other => Err(Error::configuration(format!(
                "unknown multi-region location '{other}' (expected EU or US)"
            ))),
        }
    }
}

/// Column type of a table field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldType {
    /// UTF-8 string.
    String,
    /// 64-bit signed integer.
    Integer,
    /// 64-bit float.
    Float,
    /// Boolean.
    Boolean,
    /// Microsecond-precision instant.
    Timestamp,
    /// Calendar date.
    Date,
    /// Nested record; children live in [`TableField::fields`].
    Record,
    /// Raw bytes.
    Bytes,
    /// JSON document.
    Json,
}

impl FieldType {
    /// Returns the provider's type name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "STRING",
            Self::Integer => "INTEGER",
            Self::Float => "FLOAT",
            Self::Boolean => "BOOLEAN",
            Self::Timestamp => "TIMESTAMP",
            Self::Date => "DATE",
            Self::Record => "RECORD",
            Self::Bytes => "BYTES",
            Self::Json => "JSON",
        }
    }
}

/// Column mode of a table field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldMode {
    /// Value may be null.
    #[default]
    Nullable,
    /// Value must be present.
    Required,
    /// Array of values.
    Repeated,
}

impl FieldMode {
    /// Returns the provider's mode name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Nullable => "NULLABLE",
            Self::Required => "REQUIRED",
            Self::Repeated => "REPEATED",
        }
    }
}

/// One column of a table schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableField {
    /// Column name.
    pub name: String,
    /// Column type.
    pub field_type: FieldType,
    /// Column mode.
    pub mode: FieldMode,
    /// Children of a `RECORD` column.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<TableField>,
}

impl TableField {
    /// Creates a nullable scalar column.
    #[must_use]
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            mode: FieldMode::Nullable,
            fields: Vec::new(),
        }
    }

    /// Creates a nullable `RECORD` column.
    #[must_use]
    pub fn record(name: impl Into<String>, fields: Vec<Self>) -> Self {
        Self {
            name: name.into(),
            field_type: FieldType::Record,
            mode: FieldMode::Nullable,
            fields,
        }
    }

    /// Marks the column `REQUIRED`.
    #[must_use]
    pub const fn required(mut self) -> Self {
        self.mode = FieldMode::Required;
        self
    }

    /// Marks the column `REPEATED`.
    #[must_use]
    pub const fn repeated(mut self) -> Self {
        self.mode = FieldMode::Repeated;
        self
    }
}

/// Daily time partitioning on a date-valued column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimePartitioning {
    /// Partitioning column.
    pub field: String,
    /// Partition expiration, if partitions should be dropped after a while.
    pub expiration: Option<Duration>,
    /// Whether queries must filter on the partitioning column.
    pub require_partition_filter: bool,
}

impl TimePartitioning {
    /// Partitions by day on `field`, requiring a partition filter.
    #[must_use]
    pub fn daily(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            expiration: None,
            require_partition_filter: true,
        }
    }
}

/// Parameters for creating a dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetSpec {
    /// Dataset identifier.
    pub dataset_id: String,
    /// Location override; the client's default location is used when `None`.
    pub location: Option<String>,
    /// Human-readable description.
    pub description: Option<String>,
    /// Default expiration applied to new tables.
    pub default_table_expiration: Option<Duration>,
    /// Resource labels.
    pub labels: BTreeMap<String, String>,
}

impl DatasetSpec {
    /// Creates a dataset spec with only an identifier.
    #[must_use]
    pub fn new(dataset_id: impl Into<String>) -> Self {
        Self {
            dataset_id: dataset_id.into(),
            location: None,
            description: None,
            default_table_expiration: None,
            labels: BTreeMap::new(),
        }
    }
}

/// Parameters for creating a physical table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    /// Dataset the table belongs to.
    pub dataset_id: String,
    /// Table identifier.
    pub table_id: String,
    /// Column definitions.
    pub schema: Vec<TableField>,
    /// Optional daily partitioning.
    pub time_partitioning: Option<TimePartitioning>,
    /// Clustering columns, in order.
    pub clustering: Vec<String>,
    /// Human-readable description.
    pub description: Option<String>,
    /// Resource labels.
    pub labels: BTreeMap<String, String>,
}

/// Parameters for creating a view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewSpec {
    /// Dataset the view belongs to.
    pub dataset_id: String,
    /// View identifier.
    pub view_id: String,
    /// Standard SQL query backing the view.
    pub query: String,
    /// Human-readable description.
    pub description: Option<String>,
    /// Resource labels.
    pub labels: BTreeMap<String, String>,
}

/// A dataset as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetInfo {
    /// Provider project owning the dataset.
    pub project_id: String,
    /// Dataset identifier.
    pub dataset_id: String,
    /// Dataset location.
    pub location: String,
    /// Resource labels.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

/// Kind of a table-like resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TableKind {
    /// Physical table.
    Table,
    /// Saved query.
    View,
}

/// A table or view as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    /// Provider project owning the table.
    pub project_id: String,
    /// Dataset containing the table.
    pub dataset_id: String,
    /// Table identifier.
    pub table_id: String,
    /// Table or view.
    pub kind: TableKind,
}

/// Client for warehouse datasets, tables and views.
///
/// Implementations are bound to a single provider project and default location.
#[async_trait]
pub trait WarehouseClient: Send + Sync {
    /// Provider project this client operates in.
    fn project_id(&self) -> &str;

    /// Returns whether the dataset exists.
    ///
    /// Returns `Ok(false)` when the dataset is not found.
    async fn dataset_exists(&self, dataset_id: &str) -> Result<bool>;

    /// Creates a dataset.
    ///
    /// Fails with [`Error::RemoteCreate`] if the provider rejects the call.
    async fn create_dataset(&self, spec: &DatasetSpec) -> Result<DatasetInfo>;

    /// Returns whether a table or view exists in the dataset.
    async fn table_exists(&self, dataset_id: &str, table_id: &str) -> Result<bool>;

    /// Creates a physical table.
    async fn create_table(&self, spec: &TableSpec) -> Result<TableInfo>;

    /// Creates a view.
    async fn create_view(&self, spec: &ViewSpec) -> Result<TableInfo>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_parses_case_insensitively() {
        assert_eq!(
            "eu".parse::<MultiRegionLocation>().unwrap(),
            MultiRegionLocation::Eu
        );
        assert_eq!(
            "US".parse::<MultiRegionLocation>().unwrap(),
            MultiRegionLocation::Us
        );
        assert!("asia".parse::<MultiRegionLocation>().is_err());
    }

    #[test]
    fn location_serializes_as_provider_code() {
        assert_eq!(
            serde_json::to_string(&MultiRegionLocation::Eu).unwrap(),
            "\"EU\""
        );
    }

    #[test]
    fn field_builders_set_mode() {
        let field = TableField::new("event_id", FieldType::String).required();
        assert_eq!(field.mode, FieldMode::Required);

        let params = TableField::record(
            "event_params",
            vec![TableField::new("key", FieldType::String)],
        )
        .repeated();
        assert_eq!(params.field_type, FieldType::Record);
        assert_eq!(params.mode, FieldMode::Repeated);
        assert_eq!(params.fields.len(), 1);
    }

    #[test]
    fn daily_partitioning_requires_filter() {
        let partitioning = TimePartitioning::daily("date");
        assert_eq!(partitioning.field, "date");
        assert!(partitioning.require_partition_filter);
        assert!(partitioning.expiration.is_none());
    }
}
