//! Cleanup registry: accumulate created projects, drain them once
//!
//! Every project successfully created during a run is registered here
//! immediately after the create returns, so a failure at any later stage
//! still triggers its deletion. Draining is best-effort: a failed delete
//! is logged and never replaces the run's primary outcome.

use tracing::{debug, info, warn};

use crossflow_common::types::TenantId;

use crate::surface::ApiSurface;

/// Ordered (project id, owning tenant) pairs owned by exactly one run
#[derive(Debug, Default)]
pub struct CleanupRegistry {
    entries: Vec<(i64, TenantId)>,
}

impl CleanupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, project_id: i64, tenant: TenantId) {
        debug!(project_id, %tenant, "registered for cleanup");
        self.entries.push((project_id, tenant));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Attempt deletion of every registered project under its original
    /// tenant. Empties the registry, so re-entry is a harmless no-op.
    /// Returns the ids whose deletion was attempted.
    pub async fn drain<A: ApiSurface + ?Sized>(&mut self, api: &A) -> Vec<i64> {
        let mut attempted = Vec::with_capacity(self.entries.len());
        for (project_id, tenant) in self.entries.drain(..) {
            attempted.push(project_id);
            match api.delete_project(project_id, &tenant).await {
                Ok(true) => info!(project_id, %tenant, "cleaned up project"),
                Ok(false) => warn!(project_id, %tenant, "cleanup delete reported failure"),
                Err(e) => warn!(project_id, %tenant, "cleanup delete errored: {e}"),
            }
        }
        attempted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    use crossflow_common::types::{Credentials, Project};
    use crossflow_common::{Error, Result};

    #[derive(Default)]
    struct RecordingApi {
        deleted: Mutex<Vec<i64>>,
        fail_deletes: bool,
    }

    #[async_trait]
    impl ApiSurface for RecordingApi {
        async fn authenticate(&self, _c: &Credentials) -> Result<()> {
            Ok(())
        }
        async fn create_project(&self, p: &Project, _t: &TenantId) -> Result<Project> {
            Ok(p.clone())
        }
        async fn get_project(&self, id: i64, _t: &TenantId) -> Result<Project> {
            Err(Error::NotFound { kind: "project".into(), id: id.to_string() })
        }
        async fn delete_project(&self, id: i64, _t: &TenantId) -> Result<bool> {
            self.deleted.lock().push(id);
            if self.fail_deletes {
                Err(Error::Transient("connection refused".into()))
            } else {
                Ok(true)
            }
        }
        async fn find_project(&self, _n: &str, _t: &TenantId) -> Result<Option<Project>> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn drains_every_entry_exactly_once() {
        let api = RecordingApi::default();
        let mut registry = CleanupRegistry::new();
        registry.register(1, TenantId::from("company1"));
        registry.register(2, TenantId::from("company1"));

        let attempted = registry.drain(&api).await;
        assert_eq!(attempted, vec![1, 2]);
        assert_eq!(*api.deleted.lock(), vec![1, 2]);

        // Re-entry is a no-op
        let again = registry.drain(&api).await;
        assert!(again.is_empty());
        assert_eq!(api.deleted.lock().len(), 2);
    }

    #[tokio::test]
    async fn delete_failures_never_escalate() {
        let api = RecordingApi { fail_deletes: true, ..Default::default() };
        let mut registry = CleanupRegistry::new();
        registry.register(7, TenantId::from("company1"));

        // drain returns normally despite the failing delete
        let attempted = registry.drain(&api).await;
        assert_eq!(attempted, vec![7]);
        assert!(registry.is_empty());
    }
}
