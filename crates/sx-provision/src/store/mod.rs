//! Durable storage of provisioning checkpoints.
//!
//! A [`StateStore`] holds one [`ProvisioningState`] per project. `save` must
//! be durable when it returns: the orchestrator moves to the next step only
//! after the previous step's checkpoint has been written.

pub mod memory;
pub mod object;

use async_trait::async_trait;
use sx_core::ProjectId;

use crate::error::Result;
use crate::state::ProvisioningState;

/// Checkpoint storage.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Loads the checkpoint for a project, if one exists.
    async fn find(&self, project_id: ProjectId) -> Result<Option<ProvisioningState>>;

    /// Stores the initial checkpoint for a project.
    ///
    /// Fails with a persistence error if a checkpoint already exists.
    async fn create(&self, initial: ProvisioningState) -> Result<ProvisioningState>;

    /// Overwrites the checkpoint for a project.
    async fn save(&self, state: &ProvisioningState) -> Result<()>;
}
