//! Core types for Crossflow

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque tenant identifier. All API and UI operations are scoped by one of
/// these; it is always passed explicitly, never inferred from a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TenantId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Login credentials for one tenant account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// The unit of work whose cross-surface visibility is under test.
///
/// Immutable after creation: `id` is absent until the API create succeeds
/// and nothing mutates the project afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub collaborators: Vec<String>,
    pub tenant: TenantId,
}

impl Project {
    /// Build a project with a run-unique name so a retried create can be
    /// guarded by a lookup instead of blindly re-posted.
    pub fn unique(prefix: &str, tenant: TenantId) -> Self {
        let suffix = &Uuid::new_v4().simple().to_string()[..8];
        Self {
            id: None,
            name: format!("{} {}", prefix, suffix),
            description: format!(
                "Verification project created at {}",
                chrono::Utc::now().format("%Y-%m-%d %H:%M:%S")
            ),
            collaborators: Vec::new(),
            tenant,
        }
    }

    pub fn with_collaborators(mut self, collaborators: Vec<String>) -> Self {
        self.collaborators = collaborators;
        self
    }
}

/// Detail fields read back from a UI surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectDetail {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub collaborators: Vec<String>,
}

impl ProjectDetail {
    /// Check the detail fields against the declared project. Collaborator
    /// order is not significant on the UI side; containment is.
    pub fn matches(&self, project: &Project) -> bool {
        self.name == project.name
            && self.description == project.description
            && project
                .collaborators
                .iter()
                .all(|c| self.collaborators.contains(c))
    }
}

/// Browser engine used for a profile
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileKind {
    Desktop,
    Mobile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// A statically declared browser/device target. Read-only; parameterizes
/// the UI surface adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformProfile {
    pub label: String,
    pub kind: ProfileKind,
    #[serde(default)]
    pub browser: Browser,
    pub viewport: Viewport,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default = "default_scale_factor")]
    pub device_scale_factor: u32,
    #[serde(default)]
    pub has_touch: bool,
}

fn default_scale_factor() -> u32 {
    1
}

impl PlatformProfile {
    pub fn is_mobile(&self) -> bool {
        self.kind == ProfileKind::Mobile
    }

    /// The default desktop + mobile matrix
    pub fn default_matrix() -> Vec<Self> {
        vec![
            PlatformProfile {
                label: "chrome_desktop".into(),
                kind: ProfileKind::Desktop,
                browser: Browser::Chromium,
                viewport: Viewport { width: 1920, height: 1080 },
                user_agent: None,
                device_scale_factor: 1,
                has_touch: false,
            },
            PlatformProfile {
                label: "safari_desktop".into(),
                kind: ProfileKind::Desktop,
                browser: Browser::Webkit,
                viewport: Viewport { width: 1440, height: 900 },
                user_agent: None,
                device_scale_factor: 2,
                has_touch: false,
            },
            PlatformProfile {
                label: "iphone".into(),
                kind: ProfileKind::Mobile,
                browser: Browser::Webkit,
                viewport: Viewport { width: 375, height: 812 },
                user_agent: Some(
                    "Mozilla/5.0 (iPhone; CPU iPhone OS 15_0 like Mac OS X) \
                     AppleWebKit/605.1.15 (KHTML, like Gecko) Version/15.0 \
                     Mobile/15E148 Safari/604.1"
                        .into(),
                ),
                device_scale_factor: 3,
                has_touch: true,
            },
            PlatformProfile {
                label: "android".into(),
                kind: ProfileKind::Mobile,
                browser: Browser::Chromium,
                viewport: Viewport { width: 360, height: 760 },
                user_agent: Some(
                    "Mozilla/5.0 (Linux; Android 11; SM-G975F) AppleWebKit/537.36 \
                     (KHTML, like Gecko) Chrome/91.0.4472.120 Mobile Safari/537.36"
                        .into(),
                ),
                device_scale_factor: 3,
                has_touch: true,
            },
        ]
    }
}

/// Workflow stages, in transition order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Init,
    Created,
    UiVerified,
    MobileVerified,
    IsolationVerified,
    PlatformVerified,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Init => "init",
            Stage::Created => "created",
            Stage::UiVerified => "ui_verified",
            Stage::MobileVerified => "mobile_verified",
            Stage::IsolationVerified => "isolation_verified",
            Stage::PlatformVerified => "platform_verified",
            Stage::Done => "done",
        };
        f.write_str(s)
    }
}

/// Which transition failed, and whether the failure is security-class
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageFailure {
    pub stage: Stage,
    pub reason: String,
    #[serde(default)]
    pub security: bool,
}

/// Per-run outcome built incrementally by the orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub created: bool,
    pub ui_verified: bool,
    pub mobile_verified: BTreeMap<String, bool>,
    pub isolation_verified: bool,
    pub platform_results: BTreeMap<String, bool>,
    pub aggregate_success_ratio: f64,
    pub failure: Option<StageFailure>,
    pub attempted_deletions: Vec<i64>,
    pub duration_ms: u64,
}

impl WorkflowResult {
    pub fn empty() -> Self {
        Self {
            created: false,
            ui_verified: false,
            mobile_verified: BTreeMap::new(),
            isolation_verified: false,
            platform_results: BTreeMap::new(),
            aggregate_success_ratio: 0.0,
            failure: None,
            attempted_deletions: Vec::new(),
            duration_ms: 0,
        }
    }

    pub fn passed(&self) -> bool {
        self.failure.is_none() && self.created
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_projects_get_distinct_names() {
        let a = Project::unique("Test Project", TenantId::from("company1"));
        let b = Project::unique("Test Project", TenantId::from("company1"));
        assert_ne!(a.name, b.name);
        assert!(a.name.starts_with("Test Project "));
        assert!(a.id.is_none());
    }

    #[test]
    fn detail_matching_ignores_collaborator_order() {
        let project = Project {
            id: Some(1),
            name: "P1".into(),
            description: "desc".into(),
            collaborators: vec!["a@x.com".into(), "b@x.com".into()],
            tenant: TenantId::from("company1"),
        };
        let detail = ProjectDetail {
            name: "P1".into(),
            description: "desc".into(),
            collaborators: vec!["b@x.com".into(), "a@x.com".into()],
        };
        assert!(detail.matches(&project));

        let missing = ProjectDetail {
            collaborators: vec!["b@x.com".into()],
            ..detail
        };
        assert!(!missing.matches(&project));
    }

    #[test]
    fn default_matrix_has_two_mobile_profiles() {
        let matrix = PlatformProfile::default_matrix();
        assert_eq!(matrix.iter().filter(|p| p.is_mobile()).count(), 2);
        assert_eq!(matrix.len(), 4);
    }
}
