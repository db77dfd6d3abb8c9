//! Shared building blocks for TerraWatch: configuration, the error hierarchy,
//! coordinates and payload types, and the upstream provider trait.

pub mod config;
pub mod error;
pub mod provider;
pub mod types;

pub use config::{CityConfig, Config, ProvidersConfig, ValidationResult};
pub use error::{
    AggregationError, AppError, CacheError, ConfigError, NetworkError, ProviderError,
    ReqwestErrorExt, SchedulerError,
};
pub use provider::{EnvironmentProvider, ProviderSet};
pub use types::{Coordinates, Insight, Payload, ProviderKind};

use anyhow::Result;

/// Initialize tracing/logging.
///
/// Honors `RUST_LOG`; defaults to `info`.
pub fn init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;

    tracing::info!("TerraWatch core initialized");
    Ok(())
}
