//! Cross-platform fan-out runner
//!
//! Runs the same verification once per platform profile, one task per
//! profile, collecting outcomes over a channel. A profile's error or panic
//! is recorded as that profile's failure and never aborts its siblings.
//! The acceptance threshold is the caller's policy, not the runner's.

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info};

use crossflow_common::types::PlatformProfile;
use crossflow_common::{Error, Result};

/// Verification outcome for one platform profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformOutcome {
    pub label: String,
    pub passed: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// Per-profile outcomes in declared matrix order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FanOutReport {
    pub outcomes: Vec<PlatformOutcome>,
}

impl FanOutReport {
    pub fn success_ratio(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 0.0;
        }
        self.passed_count() as f64 / self.outcomes.len() as f64
    }

    pub fn passed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.passed).count()
    }

    pub fn all_passed(&self) -> bool {
        self.outcomes.iter().all(|o| o.passed)
    }

    pub fn failed_labels(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter(|o| !o.passed)
            .map(|o| o.label.clone())
            .collect()
    }

    pub fn results_by_label(&self) -> BTreeMap<String, bool> {
        self.outcomes
            .iter()
            .map(|o| (o.label.clone(), o.passed))
            .collect()
    }

    /// Apply the caller's acceptance threshold. The boundary is inclusive:
    /// a ratio exactly equal to the threshold passes.
    pub fn ensure_ratio(&self, threshold: f64) -> Result<f64> {
        let ratio = self.success_ratio();
        if ratio >= threshold {
            Ok(ratio)
        } else {
            Err(Error::AggregateThreshold {
                ratio,
                threshold,
                failed: self.failed_labels(),
            })
        }
    }
}

/// Run `verify` once per profile, in parallel, isolating failures.
pub async fn run_across_platforms<F, Fut>(profiles: &[PlatformProfile], verify: F) -> FanOutReport
where
    F: Fn(PlatformProfile) -> Fut,
    Fut: Future<Output = Result<bool>> + Send + 'static,
{
    let total = profiles.len();
    let (tx, mut rx) = mpsc::channel::<(usize, PlatformOutcome)>(total.max(1));

    let mut handles = Vec::with_capacity(total);
    for (idx, profile) in profiles.iter().enumerate() {
        let label = profile.label.clone();
        let fut = verify(profile.clone());
        let tx = tx.clone();
        handles.push(tokio::spawn(async move {
            let start = Instant::now();
            let outcome = match fut.await {
                Ok(passed) => PlatformOutcome {
                    label: label.clone(),
                    passed,
                    error: None,
                    duration_ms: start.elapsed().as_millis() as u64,
                },
                Err(e) => {
                    error!(profile = %label, "platform verification errored: {e}");
                    PlatformOutcome {
                        label: label.clone(),
                        passed: false,
                        error: Some(e.to_string()),
                        duration_ms: start.elapsed().as_millis() as u64,
                    }
                }
            };
            let _ = tx.send((idx, outcome)).await;
        }));
    }
    drop(tx);

    let mut slots: Vec<Option<PlatformOutcome>> = (0..total).map(|_| None).collect();
    while let Some((idx, outcome)) = rx.recv().await {
        slots[idx] = Some(outcome);
    }

    // A panicked task never sent its outcome; record it as that profile's
    // failure rather than letting it take down the run.
    for (idx, handle) in handles.into_iter().enumerate() {
        if let Err(e) = handle.await {
            if slots[idx].is_none() {
                error!(profile = %profiles[idx].label, "platform task panicked: {e}");
                slots[idx] = Some(PlatformOutcome {
                    label: profiles[idx].label.clone(),
                    passed: false,
                    error: Some(format!("task panicked: {e}")),
                    duration_ms: 0,
                });
            }
        }
    }

    let report = FanOutReport {
        outcomes: slots.into_iter().flatten().collect(),
    };
    info!(
        passed = report.passed_count(),
        total,
        ratio = report.success_ratio(),
        "fan-out complete"
    );
    report
}
