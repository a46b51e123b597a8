//! Crossflow verification harness
//!
//! Drives a multi-tenant web application through its REST API, desktop web
//! UI, and mobile web UI, and asserts that a project created on one surface
//! is consistently visible on the others, scoped to its owning tenant, and
//! reachable across a browser/device matrix.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Workflow Orchestrator                     │
//! │  Init → Created → UiVerified → MobileVerified                │
//! │       → IsolationVerified → PlatformVerified → Done          │
//! │  (Cleanup drained on every exit path)                        │
//! ├───────────────┬───────────────┬──────────────┬───────────────┤
//! │  ApiSurface   │   UiSurface   │  Isolation   │   Fan-Out     │
//! │  (reqwest)    │  (Playwright  │  Verifier    │   Runner      │
//! │               │   via node)   │              │               │
//! ├───────────────┴───────────────┴──────────────┴───────────────┤
//! │            Wait Policy          │        Retry Policy        │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The concurrent creation coordinator is a parallel sibling of the
//! orchestrator: it launches N independent authenticated workers and judges
//! the batch against a success-ratio threshold.

pub mod api;
pub mod browser;
pub mod cleanup;
pub mod concurrent;
pub mod fanout;
pub mod isolation;
pub mod orchestrator;
pub mod report;
pub mod retry;
pub mod surface;
pub mod waits;

pub use api::ApiClient;
pub use browser::{BrowserSurface, PlaywrightFactory};
pub use cleanup::CleanupRegistry;
pub use concurrent::{run_concurrent, ConcurrentCreator, ConcurrentReport};
pub use fanout::{run_across_platforms, FanOutReport, PlatformOutcome};
pub use isolation::{IsolationCheck, IsolationVerifier};
pub use orchestrator::Orchestrator;
pub use retry::{with_retry, RetrySpec};
pub use surface::{ApiSurface, Gesture, UiSurface, UiSurfaceFactory};
pub use waits::{wait_for_value, wait_until, WaitSpec};
