//! Common types and utilities for Crossflow

pub mod config;
pub mod error;
pub mod types;

pub use config::HarnessConfig;
pub use error::{Error, Result};
