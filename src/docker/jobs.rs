//! Execution limiter for lifecycle operations.
//!
//! Every lifecycle operation declares an operation name, a concurrency group
//! (usually the container's own name), and an [`ExecutionLimit`]. The registry
//! enforces at-most-one-active or queue-and-wait semantics per group without
//! ever serializing unrelated groups against each other.

use crate::docker::{DockerError, Result};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

/// Concurrency policy for one lifecycle operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionLimit {
    /// No coordination
    Unrestricted,
    /// At most one such operation in the whole process; concurrent calls fail
    Once,
    /// At most one operation per group; concurrent calls to the same group
    /// fail fast with a job conflict
    GroupOnce,
    /// Operations on the same group serialize in FIFO admission order
    GroupWait,
}

/// Held for the duration of one admitted operation.
///
/// Dropping the slot releases the group on every exit path — success, error,
/// or cancellation.
pub struct JobSlot {
    _guard: Option<OwnedMutexGuard<()>>,
}

impl JobSlot {
    fn unrestricted() -> Self {
        Self { _guard: None }
    }
}

/// Process-wide registry of concurrency groups.
///
/// Groups are created on first use, keyed by resource name, and live for the
/// process lifetime.
#[derive(Default)]
pub struct JobRegistry {
    groups: DashMap<String, Arc<Mutex<()>>>,
    global: Arc<Mutex<()>>,
}

impl JobRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, group: &str) -> Arc<Mutex<()>> {
        self.groups
            .entry(group.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Admit `operation` under `limit` for `group`.
    ///
    /// # Errors
    ///
    /// Returns [`DockerError::JobConflict`] when a once-style slot is already
    /// held. Group-wait admission never fails; it blocks until its turn.
    pub async fn acquire(
        &self,
        operation: &str,
        group: &str,
        limit: ExecutionLimit,
    ) -> Result<JobSlot> {
        match limit {
            ExecutionLimit::Unrestricted => Ok(JobSlot::unrestricted()),
            ExecutionLimit::Once => match self.global.clone().try_lock_owned() {
                Ok(guard) => Ok(JobSlot {
                    _guard: Some(guard),
                }),
                Err(_) => Err(DockerError::JobConflict {
                    operation: operation.to_string(),
                    group: "global".to_string(),
                }),
            },
            ExecutionLimit::GroupOnce => match self.slot(group).try_lock_owned() {
                Ok(guard) => Ok(JobSlot {
                    _guard: Some(guard),
                }),
                Err(_) => {
                    debug!("Rejecting concurrent '{}' on group '{}'", operation, group);
                    Err(DockerError::JobConflict {
                        operation: operation.to_string(),
                        group: group.to_string(),
                    })
                }
            },
            ExecutionLimit::GroupWait => {
                let guard = self.slot(group).lock_owned().await;
                Ok(JobSlot {
                    _guard: Some(guard),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_group_once_rejects_concurrent_call() {
        let registry = JobRegistry::new();

        let slot = registry
            .acquire("stop", "hearth_audio", ExecutionLimit::GroupOnce)
            .await
            .unwrap();

        let conflict = registry
            .acquire("remove", "hearth_audio", ExecutionLimit::GroupOnce)
            .await;
        match conflict {
            Err(DockerError::JobConflict { operation, group }) => {
                assert_eq!(operation, "remove");
                assert_eq!(group, "hearth_audio");
            }
            other => panic!("expected job conflict, got {:?}", other.is_ok()),
        }

        drop(slot);
        registry
            .acquire("remove", "hearth_audio", ExecutionLimit::GroupOnce)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_groups_are_independent() {
        let registry = JobRegistry::new();

        let _audio = registry
            .acquire("stop", "hearth_audio", ExecutionLimit::GroupOnce)
            .await
            .unwrap();
        // A different group is not affected
        registry
            .acquire("stop", "hearth_dns", ExecutionLimit::GroupOnce)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_group_wait_serializes_without_rejecting() {
        let registry = Arc::new(JobRegistry::new());
        let active = Arc::new(AtomicUsize::new(0));
        let max_active = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let registry = registry.clone();
            let active = active.clone();
            let max_active = max_active.clone();
            handles.push(tokio::spawn(async move {
                let _slot = registry
                    .acquire("attach", "hearth_core", ExecutionLimit::GroupWait)
                    .await
                    .unwrap();
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                max_active.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(max_active.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_group_wait_waits_behind_group_once() {
        let registry = Arc::new(JobRegistry::new());

        let slot = registry
            .acquire("update", "hearth_core", ExecutionLimit::GroupOnce)
            .await
            .unwrap();

        let waiter = {
            let registry = registry.clone();
            tokio::spawn(async move {
                registry
                    .acquire("attach", "hearth_core", ExecutionLimit::GroupWait)
                    .await
                    .unwrap();
            })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        drop(slot);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_once_is_global() {
        let registry = JobRegistry::new();

        let _slot = registry
            .acquire("import", "a", ExecutionLimit::Once)
            .await
            .unwrap();
        assert!(
            registry
                .acquire("import", "b", ExecutionLimit::Once)
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_unrestricted_never_blocks() {
        let registry = JobRegistry::new();
        let _a = registry
            .acquire("logs", "hearth_cli", ExecutionLimit::Unrestricted)
            .await
            .unwrap();
        let _b = registry
            .acquire("logs", "hearth_cli", ExecutionLimit::Unrestricted)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_slot_released_when_task_is_cancelled() {
        let registry = Arc::new(JobRegistry::new());

        let holder = {
            let registry = registry.clone();
            tokio::spawn(async move {
                let _slot = registry
                    .acquire("install", "hearth_audio", ExecutionLimit::GroupOnce)
                    .await
                    .unwrap();
                tokio::time::sleep(Duration::from_secs(60)).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        holder.abort();
        let _ = holder.await;

        // The aborted task's guard was dropped; the group is free again
        registry
            .acquire("install", "hearth_audio", ExecutionLimit::GroupOnce)
            .await
            .unwrap();
    }
}
