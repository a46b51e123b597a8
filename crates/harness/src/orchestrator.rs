//! Workflow orchestrator
//!
//! Sequences the verification stages for one project:
//! `Init → Created → UiVerified → MobileVerified → IsolationVerified →
//! PlatformVerified → Done`, with cleanup drained on every exit path.
//! Stages are strictly sequential; each one consumes the previous stage's
//! output (project id, project name), so nothing here is reorderable.

use std::future::Future;
use std::time::Instant;

use tracing::{error, info};

use crossflow_common::config::HarnessConfig;
use crossflow_common::types::{
    PlatformProfile, Project, Stage, StageFailure, WorkflowResult,
};
use crossflow_common::{Error, Result};

use crate::cleanup::CleanupRegistry;
use crate::fanout::{run_across_platforms, FanOutReport};
use crate::isolation::{IsolationCheck, IsolationVerifier};
use crate::retry::{with_retry, RetrySpec};
use crate::surface::{ApiSurface, Gesture, UiSurfaceFactory};

pub struct Orchestrator<A, F>
where
    A: ApiSurface,
    F: UiSurfaceFactory,
{
    config: HarnessConfig,
    api: A,
    ui: F,
}

impl<A, F> Orchestrator<A, F>
where
    A: ApiSurface,
    F: UiSurfaceFactory,
{
    pub fn new(config: HarnessConfig, api: A, ui: F) -> Self {
        Self { config, api, ui }
    }

    fn retry_spec(&self) -> RetrySpec {
        RetrySpec::new(
            self.config.timing.retry_attempts,
            self.config.timing.retry_delay(),
        )
    }

    /// Run the full workflow for `project`. Whatever happens in the stage
    /// pipeline, the cleanup registry is drained before this returns, and
    /// cleanup failures never replace the primary failure reason.
    pub async fn run(&self, project: &Project) -> WorkflowResult {
        let start = Instant::now();
        let mut result = WorkflowResult::empty();
        let mut registry = CleanupRegistry::new();

        if let Err(failure) = self.run_stages(project, &mut result, &mut registry).await {
            error!(stage = %failure.stage, security = failure.security, "workflow failed: {}", failure.reason);
            result.failure = Some(failure);
        } else {
            info!(name = %project.name, "workflow reached done");
        }

        result.attempted_deletions = registry.drain(&self.api).await;
        result.duration_ms = start.elapsed().as_millis() as u64;
        result
    }

    async fn run_stages(
        &self,
        project: &Project,
        result: &mut WorkflowResult,
        registry: &mut CleanupRegistry,
    ) -> std::result::Result<(), StageFailure> {
        // Init → Created
        let (id, created) = self
            .stage_create(project, registry)
            .await
            .map_err(|e| fail(Stage::Created, &e))?;
        result.created = true;
        info!(id, name = %created.name, "stage created passed");

        // Created → UiVerified
        self.stage_ui_verify(&created)
            .await
            .map_err(|e| fail(Stage::UiVerified, &e))?;
        result.ui_verified = true;
        info!("stage ui_verified passed");

        // UiVerified → MobileVerified: every declared mobile profile must
        // individually pass, not a ratio.
        let mobile = self.fan_out(&self.config.mobile_profiles(), &created).await;
        result.mobile_verified = mobile.results_by_label();
        if !mobile.all_passed() {
            return Err(StageFailure {
                stage: Stage::MobileVerified,
                reason: format!("mobile profiles failed: {}", mobile.failed_labels().join(", ")),
                security: false,
            });
        }
        info!("stage mobile_verified passed");

        // MobileVerified → IsolationVerified
        let authorized = &self.config.tenants.authorized.tenant;
        let unauthorized = &self.config.tenants.unauthorized.tenant;
        match IsolationVerifier::new(&self.api)
            .check(id, authorized, unauthorized)
            .await
        {
            IsolationCheck::Isolated => {
                result.isolation_verified = true;
                info!("stage isolation_verified passed");
            }
            IsolationCheck::Leaked => {
                let e = Error::SecurityViolation {
                    project_id: id,
                    tenant: unauthorized.clone(),
                };
                return Err(StageFailure {
                    stage: Stage::IsolationVerified,
                    reason: e.to_string(),
                    security: true,
                });
            }
            IsolationCheck::AuthorizedReadFailed(reason)
            | IsolationCheck::Indeterminate(reason) => {
                return Err(StageFailure {
                    stage: Stage::IsolationVerified,
                    reason,
                    security: false,
                });
            }
        }

        // IsolationVerified → PlatformVerified: full matrix, ratio-based.
        let report = self.fan_out(&self.config.profiles, &created).await;
        result.platform_results = report.results_by_label();
        result.aggregate_success_ratio = report.success_ratio();
        report
            .ensure_ratio(self.config.thresholds.platform_ratio)
            .map_err(|e| fail(Stage::PlatformVerified, &e))?;
        info!(ratio = result.aggregate_success_ratio, "stage platform_verified passed");

        Ok(())
    }

    /// Init → Created: authenticate, create under a uniqueness guard, and
    /// register for cleanup before any later stage can run.
    async fn stage_create(
        &self,
        project: &Project,
        registry: &mut CleanupRegistry,
    ) -> Result<(i64, Project)> {
        let retry = self.retry_spec();
        let account = &self.config.tenants.authorized;

        with_retry(retry, "api authenticate", || {
            self.api.authenticate(&account.credentials)
        })
        .await?;

        // A re-attempted create first looks the name up, so a backend that
        // partially succeeded cannot end up with duplicates.
        let created = with_retry(retry, "create project", || async {
            if let Some(existing) = self.api.find_project(&project.name, &account.tenant).await? {
                return Ok(existing);
            }
            self.api.create_project(project, &account.tenant).await
        })
        .await?;

        let id = created.id.ok_or_else(|| Error::Api {
            status: 200,
            message: "create returned no project id".into(),
        })?;
        registry.register(id, account.tenant.clone());
        Ok((id, created))
    }

    /// Created → UiVerified: login, visibility within the desktop deadline,
    /// then detail fields against the declared project.
    async fn stage_ui_verify(&self, project: &Project) -> Result<()> {
        let profile = self.desktop_profile();
        let surface = self.ui.surface_for(&profile);
        let credentials = &self.config.tenants.authorized.credentials;

        with_retry(self.retry_spec(), "ui login", || surface.login(credentials)).await?;

        let deadline = self.config.timing.ui_visibility_deadline();
        if !surface.is_project_visible(&project.name, deadline).await? {
            return Err(Error::VerificationTimeout {
                what: format!("project '{}' in dashboard", project.name),
                waited_ms: deadline.as_millis() as u64,
            });
        }

        let detail = surface.read_project_detail(&project.name).await?;
        if !detail.matches(project) {
            return Err(Error::Verification(format!(
                "detail fields for '{}' do not match the created project: {detail:?}",
                project.name
            )));
        }
        Ok(())
    }

    fn desktop_profile(&self) -> PlatformProfile {
        self.config
            .profiles
            .iter()
            .find(|p| !p.is_mobile())
            .cloned()
            .unwrap_or_else(|| PlatformProfile::default_matrix().swap_remove(0))
    }

    async fn fan_out(&self, profiles: &[PlatformProfile], project: &Project) -> FanOutReport {
        run_across_platforms(profiles, |profile| self.profile_check(profile, project)).await
    }

    /// One profile's verification: login, visibility, then a touch gesture
    /// on mobile or a detail read on desktop. Everything is cloned in so
    /// the future can run on its own task.
    fn profile_check(
        &self,
        profile: PlatformProfile,
        project: &Project,
    ) -> impl Future<Output = Result<bool>> + Send + 'static {
        let surface = self.ui.surface_for(&profile);
        let credentials = self.config.tenants.authorized.credentials.clone();
        let project = project.clone();
        let retry = self.retry_spec();
        let deadline = if profile.is_mobile() {
            self.config.timing.mobile_visibility_deadline()
        } else {
            self.config.timing.ui_visibility_deadline()
        };
        let mobile = profile.is_mobile();

        async move {
            with_retry(retry, "ui login", || surface.login(&credentials)).await?;

            if !surface.is_project_visible(&project.name, deadline).await? {
                return Ok(false);
            }

            if mobile {
                surface.perform_gesture(&project.name, Gesture::Tap).await?;
                Ok(true)
            } else {
                let detail = surface.read_project_detail(&project.name).await?;
                Ok(detail.matches(&project))
            }
        }
    }
}

fn fail(stage: Stage, e: &Error) -> StageFailure {
    StageFailure {
        stage,
        reason: e.to_string(),
        security: e.is_security(),
    }
}
