//! Concurrent creation coordinator
//!
//! Launches N independent creation workers in parallel. Every worker gets
//! its own API client and authenticates on its own; sessions are never
//! shared, which would defeat the point of tenant-scoped verification.
//! Outcomes are collected over a channel without ordering requirements,
//! and every successfully created project is best-effort deleted afterwards
//! regardless of the batch verdict.

use std::future::Future;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crossflow_common::config::TenantAccount;
use crossflow_common::types::Project;
use crossflow_common::{Error, Result};

use crate::surface::ApiSurface;

/// Outcome of one creation worker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerOutcome {
    pub worker: usize,
    pub success: bool,
    pub project_id: Option<i64>,
    pub error: Option<String>,
}

/// Batch outcome, ordered by worker id for stable reporting
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConcurrentReport {
    pub outcomes: Vec<WorkerOutcome>,
}

impl ConcurrentReport {
    pub fn success_ratio(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 0.0;
        }
        let successes = self.outcomes.iter().filter(|o| o.success).count();
        successes as f64 / self.outcomes.len() as f64
    }

    pub fn created_ids(&self) -> Vec<i64> {
        self.outcomes.iter().filter_map(|o| o.project_id).collect()
    }

    pub fn ensure_ratio(&self, threshold: f64) -> Result<f64> {
        let ratio = self.success_ratio();
        if ratio >= threshold {
            Ok(ratio)
        } else {
            Err(Error::AggregateThreshold {
                ratio,
                threshold,
                failed: self
                    .outcomes
                    .iter()
                    .filter(|o| !o.success)
                    .map(|o| format!("worker {}", o.worker))
                    .collect(),
            })
        }
    }
}

/// Run `worker_count` independent creation attempts in parallel. A worker
/// yields the created project id on success; a worker's error or panic is
/// its own failure and never aborts siblings.
pub async fn run_concurrent<F, Fut>(worker_count: usize, worker: F) -> ConcurrentReport
where
    F: Fn(usize) -> Fut,
    Fut: Future<Output = Result<Option<i64>>> + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<WorkerOutcome>(worker_count.max(1));

    let mut handles = Vec::with_capacity(worker_count);
    for worker_id in 0..worker_count {
        let fut = worker(worker_id);
        let tx = tx.clone();
        handles.push(tokio::spawn(async move {
            let outcome = match fut.await {
                Ok(project_id) => WorkerOutcome {
                    worker: worker_id,
                    success: true,
                    project_id,
                    error: None,
                },
                Err(e) => {
                    error!(worker = worker_id, "creation worker failed: {e}");
                    WorkerOutcome {
                        worker: worker_id,
                        success: false,
                        project_id: None,
                        error: Some(e.to_string()),
                    }
                }
            };
            let _ = tx.send(outcome).await;
        }));
    }
    drop(tx);

    let mut outcomes = Vec::with_capacity(worker_count);
    while let Some(outcome) = rx.recv().await {
        outcomes.push(outcome);
    }

    for (worker_id, handle) in handles.into_iter().enumerate() {
        if let Err(e) = handle.await {
            if !outcomes.iter().any(|o| o.worker == worker_id) {
                outcomes.push(WorkerOutcome {
                    worker: worker_id,
                    success: false,
                    project_id: None,
                    error: Some(format!("task panicked: {e}")),
                });
            }
        }
    }

    outcomes.sort_by_key(|o| o.worker);
    let report = ConcurrentReport { outcomes };
    info!(
        workers = worker_count,
        ratio = report.success_ratio(),
        "concurrent creation complete"
    );
    report
}

/// Concrete coordinator: each worker connects and authenticates its own
/// API client, then creates one uniquely-named project.
pub struct ConcurrentCreator<M, A>
where
    M: Fn() -> Result<A> + Send + Sync,
    A: ApiSurface + 'static,
{
    make_api: M,
    account: TenantAccount,
    name_prefix: String,
}

impl<M, A> ConcurrentCreator<M, A>
where
    M: Fn() -> Result<A> + Send + Sync,
    A: ApiSurface + 'static,
{
    pub fn new(make_api: M, account: TenantAccount, name_prefix: impl Into<String>) -> Self {
        Self { make_api, account, name_prefix: name_prefix.into() }
    }

    pub async fn run(&self, worker_count: usize) -> ConcurrentReport {
        let report = run_concurrent(worker_count, |worker_id| {
            let api = (self.make_api)();
            let account = self.account.clone();
            let prefix = format!("{} {}", self.name_prefix, worker_id);
            async move {
                let api = api?;
                api.authenticate(&account.credentials).await?;
                let project = Project::unique(&prefix, account.tenant.clone());
                let created = api.create_project(&project, &account.tenant).await?;
                Ok(created.id)
            }
        })
        .await;

        self.cleanup(&report).await;
        report
    }

    /// Best-effort deletion of every created project, regardless of the
    /// batch verdict. Failures are logged, never raised.
    async fn cleanup(&self, report: &ConcurrentReport) {
        let ids = report.created_ids();
        if ids.is_empty() {
            return;
        }

        let api = match (self.make_api)() {
            Ok(api) => api,
            Err(e) => {
                warn!("cleanup client unavailable, leaking {} projects: {e}", ids.len());
                return;
            }
        };
        if let Err(e) = api.authenticate(&self.account.credentials).await {
            warn!("cleanup authentication failed, leaking {} projects: {e}", ids.len());
            return;
        }

        for id in ids {
            match api.delete_project(id, &self.account.tenant).await {
                Ok(true) => info!(project_id = id, "cleaned up concurrent project"),
                Ok(false) => warn!(project_id = id, "cleanup delete reported failure"),
                Err(e) => warn!(project_id = id, "cleanup delete errored: {e}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn one_failed_worker_out_of_five_is_the_threshold_boundary() {
        let report = run_concurrent(5, |worker_id| async move {
            if worker_id == 2 {
                Err(Error::Auth("login rejected".into()))
            } else {
                Ok(Some(worker_id as i64 + 100))
            }
        })
        .await;

        assert_eq!(report.success_ratio(), 0.8);
        assert_eq!(report.ensure_ratio(0.8).unwrap(), 0.8);
        assert_eq!(report.created_ids(), vec![100, 101, 103, 104]);
        assert!(!report.outcomes[2].success);
    }

    #[tokio::test]
    async fn two_failures_out_of_five_breach_the_threshold() {
        let report = run_concurrent(5, |worker_id| async move {
            if worker_id < 2 {
                Err(Error::Transient("timeout".into()))
            } else {
                Ok(Some(worker_id as i64))
            }
        })
        .await;

        let err = report.ensure_ratio(0.8).unwrap_err();
        match err {
            Error::AggregateThreshold { ratio, failed, .. } => {
                assert_eq!(ratio, 0.6);
                assert_eq!(failed, vec!["worker 0", "worker 1"]);
            }
            other => panic!("expected AggregateThreshold, got {other}"),
        }
    }

    #[tokio::test]
    async fn collection_does_not_depend_on_completion_order() {
        let report = run_concurrent(4, |worker_id| async move {
            // Later workers finish first
            tokio::time::sleep(std::time::Duration::from_millis(40 - worker_id as u64 * 10)).await;
            Ok(Some(worker_id as i64))
        })
        .await;

        let workers: Vec<_> = report.outcomes.iter().map(|o| o.worker).collect();
        assert_eq!(workers, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn a_panicking_worker_is_its_own_failure() {
        let report = run_concurrent(3, |worker_id| async move {
            if worker_id == 1 {
                panic!("worker exploded");
            }
            Ok(Some(worker_id as i64))
        })
        .await;

        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(report.success_ratio(), 2.0 / 3.0);
    }
}
