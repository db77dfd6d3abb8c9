//! Centralized error types for TerraWatch.
//!
//! Provider and aggregation failures are recorded by the refresh machinery and
//! never take the process down. Cache lookups surface [`CacheError`] so callers
//! can pick a fallback.

use thiserror::Error;

use crate::ProviderKind;

/// Top-level error type.
///
/// Use `user_message()` to get a message suitable for API consumers.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Aggregation error: {0}")]
    Aggregation(#[from] AggregationError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Network(e) => e.user_message(),
            AppError::Provider(e) => e.user_message(),
            AppError::Aggregation(_) => {
                "Environmental data is temporarily incomplete. Please try again later."
            }
            AppError::Cache(e) => e.user_message(),
            AppError::Config(e) => e.user_message(),
            AppError::Scheduler(e) => e.user_message(),
            AppError::Other(_) => "An unexpected error occurred. Please try again.",
        }
    }
}

/// Network-related errors (HTTP, connectivity).
#[derive(Debug, Clone, Error)]
pub enum NetworkError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl NetworkError {
    pub fn user_message(&self) -> &'static str {
        match self {
            NetworkError::ConnectionFailed(_) => "Unable to reach an upstream data source.",
            NetworkError::Timeout => "An upstream data source timed out.",
            NetworkError::ServerError { status, .. } if *status >= 500 => {
                "An upstream data source is experiencing issues."
            }
            NetworkError::ServerError { .. } => "An upstream data source rejected the request.",
            NetworkError::InvalidResponse(_) => {
                "An upstream data source returned an unexpected response."
            }
        }
    }
}

/// A single upstream source did not return usable data.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("{provider}: API key not configured")]
    MissingApiKey { provider: ProviderKind },

    #[error("{provider}: {source}")]
    Network {
        provider: ProviderKind,
        #[source]
        source: NetworkError,
    },

    #[error("{provider}: invalid payload: {message}")]
    InvalidPayload {
        provider: ProviderKind,
        message: String,
    },
}

impl ProviderError {
    pub fn network(provider: ProviderKind, source: NetworkError) -> Self {
        ProviderError::Network { provider, source }
    }

    pub fn invalid_payload(provider: ProviderKind, message: impl Into<String>) -> Self {
        ProviderError::InvalidPayload {
            provider,
            message: message.into(),
        }
    }

    /// The provider that failed.
    pub fn provider(&self) -> ProviderKind {
        match self {
            ProviderError::MissingApiKey { provider }
            | ProviderError::Network { provider, .. }
            | ProviderError::InvalidPayload { provider, .. } => *provider,
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            ProviderError::MissingApiKey { .. } => {
                "A data source is not configured. Check API keys in settings."
            }
            ProviderError::Network { source, .. } => source.user_message(),
            ProviderError::InvalidPayload { .. } => {
                "A data source returned data that could not be read."
            }
        }
    }
}

/// One or more required providers failed while aggregating a key.
///
/// `provider` names the first failure in provider order; `failures` keeps all
/// of them for diagnostics.
#[derive(Debug, Clone, Error)]
#[error("aggregation for '{key}' failed at {provider} ({} provider(s) failed)", .failures.len())]
pub struct AggregationError {
    pub key: String,
    pub provider: ProviderKind,
    pub failures: Vec<ProviderError>,
}

impl AggregationError {
    /// Build from collected failures. Returns `None` when nothing failed.
    pub fn from_failures(key: impl Into<String>, mut failures: Vec<ProviderError>) -> Option<Self> {
        failures.sort_by_key(ProviderError::provider);
        let provider = failures.first()?.provider();
        Some(Self {
            key: key.into(),
            provider,
            failures,
        })
    }

    /// Every provider that failed.
    pub fn failed_providers(&self) -> Vec<ProviderKind> {
        self.failures.iter().map(ProviderError::provider).collect()
    }
}

/// Cache lookup errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("Unknown key: {0}")]
    UnknownKey(String),

    #[error("No data loaded yet for key: {0}")]
    NotLoaded(String),
}

impl CacheError {
    pub fn user_message(&self) -> &'static str {
        match self {
            CacheError::UnknownKey(_) => "This location is not monitored.",
            CacheError::NotLoaded(_) => "Data for this location is still loading.",
        }
    }
}

/// Refresh scheduler lifecycle errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    #[error("Refresh scheduler is already running")]
    AlreadyRunning,
}

impl SchedulerError {
    pub fn user_message(&self) -> &'static str {
        match self {
            SchedulerError::AlreadyRunning => "Background refresh is already running.",
        }
    }
}

/// Errors loading, saving or validating the config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No config directory available: {0}")]
    NotFound(String),

    #[error("Config file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config file is not valid TOML: {0}")]
    ParseError(String),

    #[error("Config failed validation: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::NotFound(_) => "Set TERRAWATCH_CONFIG to a config file path.",
            ConfigError::Io(_) => "The config file could not be read or written.",
            ConfigError::ParseError(_) => "The config file has a syntax error.",
            ConfigError::Invalid(_) => "The config file has invalid settings.",
        }
    }
}

/// Extension trait for converting reqwest errors to our error types.
pub trait ReqwestErrorExt {
    fn into_network_error(self) -> NetworkError;
}

impl ReqwestErrorExt for reqwest::Error {
    fn into_network_error(self) -> NetworkError {
        if self.is_timeout() {
            NetworkError::Timeout
        } else if self.is_connect() {
            NetworkError::ConnectionFailed(self.to_string())
        } else if let Some(status) = self.status() {
            NetworkError::ServerError {
                status: status.as_u16(),
                message: self.to_string(),
            }
        } else if self.is_decode() {
            NetworkError::InvalidResponse(self.to_string())
        } else {
            NetworkError::ConnectionFailed(self.to_string())
        }
    }
}
