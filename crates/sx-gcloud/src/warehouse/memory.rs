//! In-memory warehouse implementation for testing.
//!
//! [`InMemoryWarehouse`] keeps datasets and tables in a map and records every
//! call it receives, so tests can assert which remote operations a caller
//! made and in what order. Creates of already-existing resources fail the way
//! the provider does (`Already Exists`).

use std::collections::{BTreeMap, HashSet};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use super::{DatasetInfo, DatasetSpec, TableInfo, TableKind, TableSpec, ViewSpec, WarehouseClient};
use crate::error::{Error, Result};

/// One call received by an [`InMemoryWarehouse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarehouseCall {
    /// `dataset_exists(dataset_id)`.
    DatasetExists(String),
    /// `create_dataset(dataset_id)`.
    CreateDataset(String),
    /// `table_exists(dataset_id, table_id)`.
    TableExists(String, String),
    /// `create_table(dataset_id, table_id)`.
    CreateTable(String, String),
    /// `create_view(dataset_id, view_id)`.
    CreateView(String, String),
}

impl WarehouseCall {
    /// Returns true for create calls.
    #[must_use]
    pub const fn is_create(&self) -> bool {
        matches!(
            self,
            Self::CreateDataset(_) | Self::CreateTable(..) | Self::CreateView(..)
        )
    }
}

#[derive(Debug, Default)]
struct WarehouseState {
    datasets: BTreeMap<String, DatasetInfo>,
    tables: BTreeMap<(String, String), TableInfo>,
    table_specs: BTreeMap<(String, String), TableSpec>,
    views: BTreeMap<(String, String), ViewSpec>,
    calls: Vec<WarehouseCall>,
    failing_creates: HashSet<String>,
}

/// In-memory warehouse for testing.
#[derive(Debug)]
pub struct InMemoryWarehouse {
    project_id: String,
    location: String,
    state: RwLock<WarehouseState>,
}

fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::Internal {
        message: "warehouse lock poisoned".into(),
    }
}

impl InMemoryWarehouse {
    /// Creates an empty warehouse for `project_id` with datasets defaulting to `location`.
    #[must_use]
    pub fn new(project_id: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            location: location.into(),
            state: RwLock::new(WarehouseState::default()),
        }
    }

    /// Seeds a dataset as if it had been created out of band.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn insert_dataset(&self, dataset_id: &str) -> Result<()> {
        let mut state = self.state.write().map_err(poison_err)?;
        state.datasets.insert(
            dataset_id.to_string(),
            DatasetInfo {
                project_id: self.project_id.clone(),
                dataset_id: dataset_id.to_string(),
                location: self.location.clone(),
                labels: BTreeMap::new(),
            },
        );
        drop(state);
        Ok(())
    }

    /// Seeds a table as if it had been created out of band.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn insert_table(&self, dataset_id: &str, table_id: &str, kind: TableKind) -> Result<()> {
        let mut state = self.state.write().map_err(poison_err)?;
        state.tables.insert(
            (dataset_id.to_string(), table_id.to_string()),
            TableInfo {
                project_id: self.project_id.clone(),
                dataset_id: dataset_id.to_string(),
                table_id: table_id.to_string(),
                kind,
            },
        );
        drop(state);
        Ok(())
    }

    /// Makes every create call for `resource_id` (dataset, table or view id) fail.
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
    pub fn calls(&self) -> Result<Vec<WarehouseCall>> {
        Ok(self.state.read().map_err(poison_err)?.calls.clone())
    }

    /// Returns only the create calls received so far, in order.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn create_calls(&self) -> Result<Vec<WarehouseCall>> {
        Ok(self
            .calls()?
            .into_iter()
            .filter(WarehouseCall::is_create)
            .collect())
    }

    /// Returns the dataset, if it exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn dataset(&self, dataset_id: &str) -> Result<Option<DatasetInfo>> {
        Ok(self
            .state
            .read()
            .map_err(poison_err)?
            .datasets
            .get(dataset_id)
            .cloned())
    }

    /// Returns the spec a table was created with.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn table_spec(&self, dataset_id: &str, table_id: &str) -> Result<Option<TableSpec>> {
        Ok(self
            .state
            .read()
            .map_err(poison_err)?
            .table_specs
            .get(&(dataset_id.to_string(), table_id.to_string()))
            .cloned())
    }

    /// Returns the spec a view was created with.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn view_spec(&self, dataset_id: &str, view_id: &str) -> Result<Option<ViewSpec>> {
        Ok(self
            .state
            .read()
            .map_err(poison_err)?
            .views
            .get(&(dataset_id.to_string(), view_id.to_string()))
            .cloned())
    }

    fn table_resource(&self, dataset_id: &str, table_id: &str) -> String {
        format!("table {}:{dataset_id}.{table_id}", self.project_id)
    }

    fn insert_table_like(
        &self,
        dataset_id: &str,
        table_id: &str,
        kind: TableKind,
        call: WarehouseCall,
    ) -> Result<(TableInfo, std::sync::RwLockWriteGuard<'_, WarehouseState>)> {
        let resource = self.table_resource(dataset_id, table_id);
        let mut state = self.state.write().map_err(poison_err)?;
        state.calls.push(call);

        if state.failing_creates.contains(table_id) {
            return Err(Error::remote_create(resource, "injected failure"));
        }
        if !state.datasets.contains_key(dataset_id) {
            return Err(Error::remote_create(
                resource,
                format!("Not found: Dataset {}:{dataset_id}", self.project_id),
            ));
        }
        let key = (dataset_id.to_string(), table_id.to_string());
        if state.tables.contains_key(&key) {
            return Err(Error::remote_create(resource, "Already Exists"));
        }

        let info = TableInfo {
            project_id: self.project_id.clone(),
            dataset_id: dataset_id.to_string(),
            table_id: table_id.to_string(),
            kind,
        };
        state.tables.insert(key, info.clone());
        Ok((info, state))
    }
}

#[async_trait]
impl WarehouseClient for InMemoryWarehouse {
    fn project_id(&self) -> &str {
        &self.project_id
    }

    async fn dataset_exists(&self, dataset_id: &str) -> Result<bool> {
        let mut state = self.state.write().map_err(poison_err)?;
        state
            .calls
            .push(WarehouseCall::DatasetExists(dataset_id.to_string()));
        Ok(state.datasets.contains_key(dataset_id))
    }

    async fn create_dataset(&self, spec: &DatasetSpec) -> Result<DatasetInfo> {
        let resource = format!("dataset {}:{}", self.project_id, spec.dataset_id);
        let mut state = self.state.write().map_err(poison_err)?;
        state
            .calls
            .push(WarehouseCall::CreateDataset(spec.dataset_id.clone()));

        if state.failing_creates.contains(&spec.dataset_id) {
            return Err(Error::remote_create(resource, "injected failure"));
        }
        if state.datasets.contains_key(&spec.dataset_id) {
            return Err(Error::remote_create(resource, "Already Exists"));
        }

        let info = DatasetInfo {
            project_id: self.project_id.clone(),
            dataset_id: spec.dataset_id.clone(),
            location: spec
                .location
                .clone()
                .unwrap_or_else(|| self.location.clone()),
            labels: spec.labels.clone(),
        };
        state.datasets.insert(spec.dataset_id.clone(), info.clone());
        drop(state);
        Ok(info)
    }

    async fn table_exists(&self, dataset_id: &str, table_id: &str) -> Result<bool> {
        let mut state = self.state.write().map_err(poison_err)?;
        state.calls.push(WarehouseCall::TableExists(
            dataset_id.to_string(),
            table_id.to_string(),
        ));
        Ok(state
            .tables
            .contains_key(&(dataset_id.to_string(), table_id.to_string())))
    }

    async fn create_table(&self, spec: &TableSpec) -> Result<TableInfo> {
        let (info, mut state) = self.insert_table_like(
            &spec.dataset_id,
            &spec.table_id,
            TableKind::Table,
            WarehouseCall::CreateTable(spec.dataset_id.clone(), spec.table_id.clone()),
        )?;
        state.table_specs.insert(
            (spec.dataset_id.clone(), spec.table_id.clone()),
            spec.clone(),
        );
        drop(state);
        Ok(info)
    }

    async fn create_view(&self, spec: &ViewSpec) -> Result<TableInfo> {
        let (info, mut state) = self.insert_table_like(
            &spec.dataset_id,
            &spec.view_id,
            TableKind::View,
            WarehouseCall::CreateView(spec.dataset_id.clone(), spec.view_id.clone()),
        )?;
        state
            .views
            .insert((spec.dataset_id.clone(), spec.view_id.clone()), spec.clone());
        drop(state);
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::warehouse::{FieldType, TableField};

    fn table(dataset_id: &str, table_id: &str) -> TableSpec {
        TableSpec {
            dataset_id: dataset_id.into(),
            table_id: table_id.into(),
            schema: vec![TableField::new("id", FieldType::String)],
            time_partitioning: None,
            clustering: Vec::new(),
            description: None,
            labels: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn create_then_exists() -> Result<()> {
        let warehouse = InMemoryWarehouse::new("acme-eu", "EU");
        assert!(!warehouse.dataset_exists("sx_42").await?);

        let info = warehouse.create_dataset(&DatasetSpec::new("sx_42")).await?;
        assert_eq!(info.location, "EU");
        assert!(warehouse.dataset_exists("sx_42").await?);

        warehouse.create_table(&table("sx_42", "raw_events")).await?;
        assert!(warehouse.table_exists("sx_42", "raw_events").await?);
        assert_eq!(
            warehouse.create_calls()?,
            vec![
                WarehouseCall::CreateDataset("sx_42".into()),
                WarehouseCall::CreateTable("sx_42".into(), "raw_events".into()),
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_create_is_rejected() -> Result<()> {
        let warehouse = InMemoryWarehouse::new("acme-eu", "EU");
        warehouse.create_dataset(&DatasetSpec::new("sx_42")).await?;
        let err = warehouse
            .create_dataset(&DatasetSpec::new("sx_42"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RemoteCreate { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn table_requires_dataset() {
        let warehouse = InMemoryWarehouse::new("acme-eu", "EU");
        let err = warehouse
            .create_table(&table("sx_42", "raw_events"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Not found"));
    }

    #[tokio::test]
    async fn injected_failures_apply_until_cleared() -> Result<()> {
        let warehouse = InMemoryWarehouse::new("acme-eu", "EU");
        warehouse.insert_dataset("sx_42")?;
        warehouse.fail_creates_of("raw_events")?;
        assert!(warehouse.create_table(&table("sx_42", "raw_events")).await.is_err());
        assert!(!warehouse.table_exists("sx_42", "raw_events").await?);

        warehouse.clear_failures()?;
        warehouse.create_table(&table("sx_42", "raw_events")).await?;
        assert!(warehouse.table_spec("sx_42", "raw_events")?.is_some());
        Ok(())
    }
}
