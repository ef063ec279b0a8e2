//! In-memory state store for testing.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use sx_core::ProjectId;

use super::StateStore;
use crate::error::{Error, Result};
use crate::state::ProvisioningState;

fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::persistence("state store lock poisoned")
}

#[derive(Debug, Default)]
struct StoreState {
    records: HashMap<ProjectId, ProvisioningState>,
    history: Vec<ProvisioningState>,
    failing_saves: bool,
}

/// In-memory state store.
///
/// Keeps every saved version in a history so tests can inspect the
/// checkpoint sequence an invocation produced.
#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    state: RwLock<StoreState>,
}

impl InMemoryStateStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a checkpoint directly, bypassing history.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn insert(&self, state: ProvisioningState) -> Result<()> {
        self.state
            .write()
            .map_err(poison_err)?
            .records
            .insert(state.project_id, state);
        Ok(())
    }

    /// Makes every subsequent `save` fail until reset.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn fail_saves(&self, failing: bool) -> Result<()> {
        self.state.write().map_err(poison_err)?.failing_saves = failing;
        Ok(())
    }

    /// Every version written by `create` and `save`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn history(&self) -> Result<Vec<ProvisioningState>> {
        Ok(self.state.read().map_err(poison_err)?.history.clone())
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn find(&self, project_id: ProjectId) -> Result<Option<ProvisioningState>> {
        Ok(self
            .state
            .read()
            .map_err(poison_err)?
            .records
            .get(&project_id)
            .cloned())
    }

    async fn create(&self, initial: ProvisioningState) -> Result<ProvisioningState> {
        let mut state = self.state.write().map_err(poison_err)?;
        if state.records.contains_key(&initial.project_id) {
            return Err(Error::persistence(format!(
                "provisioning state for project {} already exists",
                initial.project_id
            )));
        }
        state.records.insert(initial.project_id, initial.clone());
        state.history.push(initial.clone());
        drop(state);
        Ok(initial)
    }

    async fn save(&self, record: &ProvisioningState) -> Result<()> {
        let mut state = self.state.write().map_err(poison_err)?;
        if state.failing_saves {
            return Err(Error::persistence(format!(
                "injected save failure for project {}",
                record.project_id
            )));
        }
        state.records.insert(record.project_id, record.clone());
        state.history.push(record.clone());
        drop(state);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn initial() -> ProvisioningState {
        ProvisioningState::new(ProjectId::new(42).unwrap(), "st-42", "acme-eu", Utc::now())
    }

    #[tokio::test]
    async fn create_find_save() -> Result<()> {
        let store = InMemoryStateStore::new();
        let project = ProjectId::new(42)?;
        assert!(store.find(project).await?.is_none());

        let mut state = store.create(initial()).await?;
        assert!(store.create(initial()).await.is_err());

        state.warehouse.dataset_id = Some("sx_42".into());
        store.save(&state).await?;
        assert_eq!(store.find(project).await?, Some(state));
        assert_eq!(store.history()?.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn injected_save_failures() -> Result<()> {
        let store = InMemoryStateStore::new();
        let state = store.create(initial()).await?;
        store.fail_saves(true)?;
        assert!(matches!(
            store.save(&state).await,
            Err(Error::Persistence { .. })
        ));
        store.fail_saves(false)?;
        store.save(&state).await?;
        Ok(())
    }
}
