//! JSON run report written to the output directory
//!
//! Formatting beyond this dump is an external concern; the harness just
//! hands over the raw per-stage and per-unit outcomes.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crossflow_common::types::WorkflowResult;
use crossflow_common::Result;

use crate::concurrent::ConcurrentReport;

const REPORT_FILE: &str = "crossflow-results.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: String,
    pub duration_ms: u64,
    pub workflow: WorkflowResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrent: Option<ConcurrentReport>,
}

impl RunReport {
    pub fn passed(&self, concurrent_threshold: f64) -> bool {
        self.workflow.passed()
            && self
                .concurrent
                .as_ref()
                .map(|c| c.ensure_ratio(concurrent_threshold).is_ok())
                .unwrap_or(true)
    }
}

/// Write the report as pretty JSON, creating the output directory if needed.
pub fn write_report(output_dir: &Path, report: &RunReport) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)?;
    let path = output_dir.join(REPORT_FILE);
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(&path, json)?;
    info!("results written to {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_round_trips_through_the_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let report = RunReport {
            started_at: chrono::Utc::now().to_rfc3339(),
            duration_ms: 1234,
            workflow: WorkflowResult::empty(),
            concurrent: None,
        };

        let path = write_report(dir.path(), &report).unwrap();
        let loaded: RunReport =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(loaded.duration_ms, 1234);
        assert!(loaded.concurrent.is_none());
    }

    #[test]
    fn pass_verdict_requires_both_halves() {
        let mut workflow = WorkflowResult::empty();
        workflow.created = true;
        let mut report = RunReport {
            started_at: chrono::Utc::now().to_rfc3339(),
            duration_ms: 0,
            workflow,
            concurrent: None,
        };
        assert!(report.passed(0.8));

        report.concurrent = Some(ConcurrentReport {
            outcomes: vec![crate::concurrent::WorkerOutcome {
                worker: 0,
                success: false,
                project_id: None,
                error: Some("auth".into()),
            }],
        });
        assert!(!report.passed(0.8));
    }
}
