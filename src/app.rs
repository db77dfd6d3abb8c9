use std::sync::Arc;

use terrawatch_cache::{EnvironmentCache, RefreshHandle};
use terrawatch_core::{AppError, Config, ProviderSet};

/// Service state and lifecycle: config, the cache and its refresh loop.
pub struct App {
    config: Arc<Config>,
    cache: EnvironmentCache,
    refresh: Option<RefreshHandle>,
}

impl App {
    /// Load configuration and build the provider clients and cache.
    pub fn new() -> Result<Self, AppError> {
        let (config, _) = Config::load_validated()?;
        Self::with_config(config)
    }

    pub fn with_config(config: Config) -> Result<Self, AppError> {
        let providers = terrawatch_providers::build_providers(&config.providers)?;
        Ok(Self::with_providers(config, providers))
    }

    pub fn with_providers(config: Config, providers: ProviderSet) -> Self {
        tracing::debug!("Providers: {:?}", providers);
        let cache = EnvironmentCache::new(providers, config.refresh_interval());

        Self {
            config: Arc::new(config),
            cache,
            refresh: None,
        }
    }

    /// Populate the cache once, then start background refresh.
    pub async fn initialize(&mut self) -> Result<(), AppError> {
        let targets = self.config.targets();
        tracing::info!(
            "Initializing cache for {} locations, refresh every {} min",
            targets.len(),
            self.config.refresh_minutes
        );

        let report = self.cache.initialize(&targets).await;
        for failure in &report.failed {
            tracing::warn!(key = %failure.key, "Not loaded at startup: {}", failure);
        }

        self.refresh = Some(self.cache.start_refresh()?);
        tracing::info!("Application initialized successfully");
        Ok(())
    }

    /// Stop the refresh loop, letting an in-flight cycle finish.
    pub async fn shutdown(&mut self) -> Result<(), AppError> {
        tracing::info!("Shutting down application");

        if let Some(handle) = self.refresh.take() {
            handle.stop().await;
        }

        Ok(())
    }

    pub fn is_refreshing(&self) -> bool {
        self.cache.scheduler().is_running()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &EnvironmentCache {
        &self.cache
    }
}
