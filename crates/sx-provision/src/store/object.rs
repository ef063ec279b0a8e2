//! Object-storage state store.
//!
//! Each checkpoint is a JSON document at
//! `projects/project={project_id}/provisioning_state.json`. The initial
//! write is create-only so two first-time invocations cannot both seed a
//! record; later writes overwrite.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use sx_core::{ProjectId, StorageBackend, WritePrecondition, WriteResult};

use super::StateStore;
use crate::error::{Error, Result};
use crate::state::ProvisioningState;

/// Path of a project's checkpoint object.
#[must_use]
pub fn state_path(project_id: ProjectId) -> String {
    format!("projects/project={project_id}/provisioning_state.json")
}

/// State store over a [`StorageBackend`].
#[derive(Clone)]
pub struct ObjectStateStore {
    backend: Arc<dyn StorageBackend>,
}

impl std::fmt::Debug for ObjectStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStateStore").finish_non_exhaustive()
    }
}

impl ObjectStateStore {
    /// Creates a store over `backend`.
    #[must_use]
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    fn encode(state: &ProvisioningState) -> Result<Bytes> {
        serde_json::to_vec_pretty(state)
            .map(Bytes::from)
            .map_err(|e| Error::persistence_with_source("failed to encode provisioning state", e))
    }
}

#[async_trait]
impl StateStore for ObjectStateStore {
    async fn find(&self, project_id: ProjectId) -> Result<Option<ProvisioningState>> {
        let path = state_path(project_id);
        let data = match self.backend.get(&path).await {
            Ok(data) => data,
            Err(sx_core::Error::NotFound(_)) => return Ok(None),
            Err(e) => {
                return Err(Error::persistence_with_source(
                    format!("failed to read {path}"),
                    e,
                ));
            }
        };

        let state = serde_json::from_slice(&data)
            .map_err(|e| Error::persistence_with_source(format!("corrupt checkpoint {path}"), e))?;
        Ok(Some(state))
    }

    async fn create(&self, initial: ProvisioningState) -> Result<ProvisioningState> {
        let path = state_path(initial.project_id);
        let result = self
            .backend
            .put(&path, Self::encode(&initial)?, WritePrecondition::DoesNotExist)
            .await
            .map_err(|e| Error::persistence_with_source(format!("failed to write {path}"), e))?;

        match result {
            WriteResult::Success { version } => {
                tracing::debug!(%path, %version, "provisioning state created");
                Ok(initial)
            }
            WriteResult::PreconditionFailed => Err(Error::persistence(format!(
                "provisioning state for project {} already exists",
                initial.project_id
            ))),
        }
    }

    async fn save(&self, state: &ProvisioningState) -> Result<()> {
        let path = state_path(state.project_id);
        let result = self
            .backend
            .put(&path, Self::encode(state)?, WritePrecondition::None)
            .await
            .map_err(|e| Error::persistence_with_source(format!("failed to write {path}"), e))?;

        match result {
            WriteResult::Success { version } => {
                tracing::debug!(%path, %version, "provisioning state saved");
                Ok(())
            }
            WriteResult::PreconditionFailed => Err(Error::persistence(format!(
                "unconditional write to {path} reported a precondition failure"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sx_core::MemoryBackend;

    fn store() -> (ObjectStateStore, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new());
        (ObjectStateStore::new(backend.clone()), backend)
    }

    #[test]
    fn path_layout() {
        assert_eq!(
            state_path(ProjectId::new(42).unwrap()),
            "projects/project=42/provisioning_state.json"
        );
    }

    #[tokio::test]
    async fn roundtrip_through_backend() -> Result<()> {
        let (store, backend) = store();
        let project = ProjectId::new(42)?;
        assert!(store.find(project).await?.is_none());

        let mut state = store
            .create(ProvisioningState::new(project, "st-42", "acme-eu", Utc::now()))
            .await?;
        state.warehouse.dataset_id = Some("sx_42".into());
        state.warehouse.dataset_location = Some("EU".into());
        store.save(&state).await?;

        assert_eq!(store.find(project).await?, Some(state));

        let raw = backend.get(&state_path(project)).await?;
        let json: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(json["warehouse"]["dataset_id"], "sx_42");
        Ok(())
    }

    #[tokio::test]
    async fn create_is_exclusive() -> Result<()> {
        let (store, _) = store();
        let project = ProjectId::new(42)?;
        let initial = ProvisioningState::new(project, "st-42", "acme-eu", Utc::now());
        store.create(initial.clone()).await?;
        assert!(matches!(
            store.create(initial).await,
            Err(Error::Persistence { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn corrupt_checkpoint_is_an_error() -> Result<()> {
        let (store, backend) = store();
        let project = ProjectId::new(42)?;
        backend
            .put(
                &state_path(project),
                Bytes::from_static(b"not json"),
                WritePrecondition::None,
            )
            .await?;
        assert!(store.find(project).await.is_err());
        Ok(())
    }
}
