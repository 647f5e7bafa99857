//! Tracing and logging setup shared by every binary embedding the write side.
//!
//! Library crates only emit through the `tracing` facade; installing a
//! subscriber is the host's decision and happens here.

pub mod config;
pub mod tracing;

pub use config::{LogFormat, ObservabilityConfig, ParseLogFormatError};

/// Initialize process-wide tracing from the environment.
///
/// Safe to call multiple times; only the first successful call installs a
/// subscriber.
pub fn init() -> anyhow::Result<()> {
    let config = ObservabilityConfig::from_env()?;
    tracing::init_with(&config)
}

pub use crate::tracing::init_with;
