//! Harness configuration loaded from YAML, with CLI overrides applied on top

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{Credentials, PlatformProfile, TenantId};

/// One tenant account: the isolation boundary plus credentials that can
/// log in on its behalf.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantAccount {
    pub tenant: TenantId,
    pub credentials: Credentials,
}

/// The authorized/unauthorized pair used for isolation verification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantPair {
    pub authorized: TenantAccount,
    pub unauthorized: TenantAccount,
}

impl Default for TenantPair {
    fn default() -> Self {
        Self {
            authorized: TenantAccount {
                tenant: TenantId::from("company1"),
                credentials: Credentials {
                    email: "admin@company1.com".into(),
                    password: "password123".into(),
                },
            },
            unauthorized: TenantAccount {
                tenant: TenantId::from("company2"),
                credentials: Credentials {
                    email: "user@company2.com".into(),
                    password: "password123".into(),
                },
            },
        }
    }
}

/// Acceptance thresholds, fractions in [0, 1]
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Thresholds {
    #[serde(default = "default_ratio")]
    pub platform_ratio: f64,
    #[serde(default = "default_ratio")]
    pub concurrent_ratio: f64,
}

fn default_ratio() -> f64 {
    0.8
}

impl Default for Thresholds {
    fn default() -> Self {
        Self { platform_ratio: 0.8, concurrent_ratio: 0.8 }
    }
}

/// Deadline and retry constants, all in milliseconds
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Timing {
    #[serde(default = "default_api_timeout_ms")]
    pub api_timeout_ms: u64,
    #[serde(default = "default_ui_deadline_ms")]
    pub ui_visibility_deadline_ms: u64,
    /// Mobile loads are slower; the original matrix allowed 45s here
    #[serde(default = "default_mobile_deadline_ms")]
    pub mobile_visibility_deadline_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_api_timeout_ms() -> u64 {
    30_000
}
fn default_ui_deadline_ms() -> u64 {
    30_000
}
fn default_mobile_deadline_ms() -> u64 {
    45_000
}
fn default_poll_interval_ms() -> u64 {
    500
}
fn default_retry_attempts() -> u32 {
    3
}
fn default_retry_delay_ms() -> u64 {
    2_000
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            api_timeout_ms: default_api_timeout_ms(),
            ui_visibility_deadline_ms: default_ui_deadline_ms(),
            mobile_visibility_deadline_ms: default_mobile_deadline_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl Timing {
    pub fn api_timeout(&self) -> Duration {
        Duration::from_millis(self.api_timeout_ms)
    }
    pub fn ui_visibility_deadline(&self) -> Duration {
        Duration::from_millis(self.ui_visibility_deadline_ms)
    }
    pub fn mobile_visibility_deadline(&self) -> Duration {
        Duration::from_millis(self.mobile_visibility_deadline_ms)
    }
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Top-level harness configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_web_base_url")]
    pub web_base_url: String,
    #[serde(default)]
    pub tenants: TenantPair,
    #[serde(default = "PlatformProfile::default_matrix")]
    pub profiles: Vec<PlatformProfile>,
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default)]
    pub timing: Timing,
}

fn default_api_base_url() -> String {
    "https://app.workflowpro.example/api/v1".into()
}

fn default_web_base_url() -> String {
    "https://app.workflowpro.example".into()
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            web_base_url: default_web_base_url(),
            tenants: TenantPair::default(),
            profiles: PlatformProfile::default_matrix(),
            thresholds: Thresholds::default(),
            timing: Timing::default(),
        }
    }
}

impl HarnessConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_base_url.is_empty() || self.web_base_url.is_empty() {
            return Err(Error::InvalidConfig("base URLs must be non-empty".into()));
        }
        for ratio in [self.thresholds.platform_ratio, self.thresholds.concurrent_ratio] {
            if !(0.0..=1.0).contains(&ratio) {
                return Err(Error::InvalidConfig(format!(
                    "threshold {ratio} outside [0, 1]"
                )));
            }
        }
        if !self.profiles.iter().any(|p| p.is_mobile()) {
            return Err(Error::InvalidConfig(
                "profile matrix needs at least one mobile profile".into(),
            ));
        }
        if self.timing.retry_attempts == 0 {
            return Err(Error::InvalidConfig("retry_attempts must be >= 1".into()));
        }
        Ok(())
    }

    pub fn mobile_profiles(&self) -> Vec<PlatformProfile> {
        self.profiles.iter().filter(|p| p.is_mobile()).cloned().collect()
    }
}
