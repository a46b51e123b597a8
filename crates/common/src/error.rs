//! Error taxonomy for Crossflow

use thiserror::Error;

use crate::types::TenantId;

/// Result type alias using the Crossflow Error
pub type Result<T> = std::result::Result<T, Error>;

/// Crossflow error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("API error: status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("{kind} {id} not found")]
    NotFound { kind: String, id: String },

    #[error("Access denied for tenant {tenant}")]
    Forbidden { tenant: TenantId },

    #[error("Transient failure: {0}")]
    Transient(String),

    #[error("Timed out waiting for {what} after {waited_ms}ms")]
    VerificationTimeout { what: String, waited_ms: u64 },

    #[error("Verification failed: {0}")]
    Verification(String),

    #[error("SECURITY VIOLATION: project {project_id} readable by unauthorized tenant {tenant}")]
    SecurityViolation { project_id: i64, tenant: TenantId },

    #[error(
        "Success ratio {ratio:.2} below threshold {threshold:.2}; failed: {}",
        failed.join(", ")
    )]
    AggregateThreshold {
        ratio: f64,
        threshold: f64,
        failed: Vec<String>,
    },

    #[error("{operation} failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        #[source]
        source: Box<Error>,
    },

    #[error("Operation not supported by this surface: {0}")]
    Unsupported(String),

    #[error("Browser driver error: {0}")]
    BrowserDriver(String),

    #[error("node not found. Playwright scripts require a node runtime on PATH")]
    NodeNotFound,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Whether the retry policy may re-attempt an operation that failed
    /// with this error. Security violations, denials, and exhausted waits
    /// are terminal; network flake and auth hiccups are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Transient(_) | Error::Auth(_) | Error::BrowserDriver(_) => true,
            Error::Http(e) => e.is_timeout() || e.is_connect(),
            Error::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Security-class failures are reported distinctly and never absorbed
    /// by aggregate thresholds.
    pub fn is_security(&self) -> bool {
        matches!(self, Error::SecurityViolation { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(Error::Transient("connection refused".into()).is_retryable());
        assert!(Error::Auth("flaky login".into()).is_retryable());
        assert!(Error::Api { status: 503, message: "unavailable".into() }.is_retryable());
        assert!(!Error::Api { status: 400, message: "bad request".into() }.is_retryable());
        assert!(!Error::Forbidden { tenant: TenantId::from("company2") }.is_retryable());
        assert!(!Error::VerificationTimeout { what: "dashboard".into(), waited_ms: 30000 }
            .is_retryable());
        assert!(!Error::SecurityViolation {
            project_id: 1,
            tenant: TenantId::from("company2")
        }
        .is_retryable());
    }

    #[test]
    fn security_classification() {
        assert!(Error::SecurityViolation {
            project_id: 7,
            tenant: TenantId::from("company2")
        }
        .is_security());
        assert!(!Error::Transient("timeout".into()).is_security());
    }
}
