//! Capability traits for the surfaces a project can be observed through
//!
//! The orchestrator and fan-out runner depend only on these interfaces;
//! the REST adapter and the Playwright-backed browser adapter are the
//! production implementations, and tests substitute in-memory fakes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crossflow_common::types::{Credentials, PlatformProfile, Project, ProjectDetail, TenantId};
use crossflow_common::Result;

/// Touch interactions exercised on mobile profiles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gesture {
    Tap,
    SwipeLeft,
}

/// The REST API capability. Every call is explicitly tenant-scoped.
#[async_trait]
pub trait ApiSurface: Send + Sync {
    /// Obtain a session for subsequent calls. Sessions are never shared
    /// across workers or runs.
    async fn authenticate(&self, credentials: &Credentials) -> Result<()>;

    /// Create a project owned by `tenant`. The returned project carries
    /// the backend-assigned id.
    async fn create_project(&self, project: &Project, tenant: &TenantId) -> Result<Project>;

    /// Read a project. Denials surface as `NotFound` or `Forbidden`.
    async fn get_project(&self, id: i64, tenant: &TenantId) -> Result<Project>;

    /// Delete a project. Idempotent: deleting an absent project reports
    /// success.
    async fn delete_project(&self, id: i64, tenant: &TenantId) -> Result<bool>;

    /// Look a project up by its exact name. The uniqueness guard for
    /// retried creates.
    async fn find_project(&self, name: &str, tenant: &TenantId) -> Result<Option<Project>>;
}

/// A browser-rendered surface (desktop or mobile web UI).
#[async_trait]
pub trait UiSurface: Send + Sync {
    async fn login(&self, credentials: &Credentials) -> Result<()>;

    /// Whether the named project becomes visible within `deadline`.
    /// Non-visibility is an `Ok(false)` verification outcome, not an error.
    async fn is_project_visible(&self, name: &str, deadline: Duration) -> Result<bool>;

    async fn read_project_detail(&self, name: &str) -> Result<ProjectDetail>;

    async fn perform_gesture(&self, target: &str, gesture: Gesture) -> Result<()>;
}

/// Mints a UI surface per platform profile so the fan-out runner can give
/// every profile its own browser context.
pub trait UiSurfaceFactory: Send + Sync {
    fn surface_for(&self, profile: &PlatformProfile) -> Arc<dyn UiSurface>;
}
