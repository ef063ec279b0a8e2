//! In-process serialization of invocations for the same project.
//!
//! Invocations for different projects never contend. Exclusion across
//! processes is not provided here.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use sx_core::ProjectId;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Per-project async locks.
#[derive(Debug, Clone, Default)]
pub struct ProjectLocks {
    locks: Arc<Mutex<HashMap<ProjectId, Arc<AsyncMutex<()>>>>>,
}

/// Held while an invocation owns its project.
#[derive(Debug)]
pub struct ProjectGuard {
    _guard: OwnedMutexGuard<()>,
}

impl ProjectLocks {
    /// Creates an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no other invocation holds `project_id`.
    pub async fn acquire(&self, project_id: ProjectId) -> ProjectGuard {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            // Drop entries nobody holds or waits on.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(project_id).or_default())
        };
        ProjectGuard {
            _guard: lock.lock_owned().await,
        }
    }

    /// Number of projects currently tracked.
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_project_waits() {
        let locks = ProjectLocks::new();
        let project = ProjectId::new(42).unwrap();

        let guard = locks.acquire(project).await;
        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(project).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn different_projects_do_not_contend() {
        let locks = ProjectLocks::new();
        let _a = locks.acquire(ProjectId::new(1).unwrap()).await;
        let _b = tokio::time::timeout(
            Duration::from_secs(1),
            locks.acquire(ProjectId::new(2).unwrap()),
        )
        .await
        .unwrap();
        assert_eq!(locks.tracked(), 2);
    }

    #[tokio::test]
    async fn released_entries_are_pruned() {
        let locks = ProjectLocks::new();
        drop(locks.acquire(ProjectId::new(1).unwrap()).await);
        drop(locks.acquire(ProjectId::new(2).unwrap()).await);
        assert_eq!(locks.tracked(), 1);
    }
}
