//! Upstream environmental data clients.
//!
//! - NASA POWER daily point API (agroclimatology)
//! - OpenWeatherMap current weather and air pollution
//! - NASA FIRMS active fire detections

pub mod firms;
pub mod nasa_power;
pub mod openweather;
pub mod retry;
pub mod types;

mod http;

pub use firms::FirmsClient;
pub use nasa_power::NasaPowerClient;
pub use openweather::{AirQualityProvider, CurrentWeatherProvider, OpenWeatherClient};
pub use retry::RetryConfig;
pub use types::*;

use std::sync::Arc;

use terrawatch_core::provider::ProviderSet;
use terrawatch_core::{NetworkError, ProvidersConfig};

/// Build the four production providers from configuration.
pub fn build_providers(config: &ProvidersConfig) -> Result<ProviderSet, NetworkError> {
    let retry = RetryConfig::default();
    let openweather = Arc::new(OpenWeatherClient::new(config, retry.clone())?);

    Ok(ProviderSet {
        climate: Arc::new(NasaPowerClient::new(config, retry.clone())?),
        weather: Arc::new(CurrentWeatherProvider::new(openweather.clone())),
        air_quality: Arc::new(AirQualityProvider::new(openweather)),
        fires: Arc::new(FirmsClient::new(config, retry)?),
    })
}
