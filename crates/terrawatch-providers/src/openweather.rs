//! OpenWeatherMap client: current weather and air pollution.
//!
//! One HTTP client backs two providers, [`CurrentWeatherProvider`] and
//! [`AirQualityProvider`], since both endpoints share a base URL and key.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use terrawatch_core::{
    Coordinates, EnvironmentProvider, NetworkError, Payload, ProviderError, ProviderKind,
    ProvidersConfig,
};

use crate::http;
use crate::retry::RetryConfig;
use crate::types::{AirQualityRecord, AqiCategory, CurrentWeatherRecord, PollutantComponents};

#[derive(Debug, Deserialize)]
struct WeatherResponse {
    #[serde(default)]
    weather: Vec<WeatherCondition>,
    main: WeatherMain,
    #[serde(default)]
    wind: Option<WeatherWind>,
    #[serde(default)]
    clouds: Option<WeatherClouds>,
    visibility: Option<f64>,
    dt: i64,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WeatherCondition {
    main: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct WeatherMain {
    temp: f64,
    feels_like: f64,
    temp_min: f64,
    temp_max: f64,
    pressure: f64,
    humidity: f64,
}

#[derive(Debug, Deserialize)]
struct WeatherWind {
    speed: f64,
    deg: Option<f64>,
    gust: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct WeatherClouds {
    all: f64,
}

#[derive(Debug, Deserialize)]
struct AirPollutionResponse {
    list: Vec<AirPollutionEntry>,
}

#[derive(Debug, Deserialize)]
struct AirPollutionEntry {
    main: AirPollutionIndex,
    #[serde(default)]
    components: PollutantComponents,
    dt: i64,
}

#[derive(Debug, Deserialize)]
struct AirPollutionIndex {
    aqi: u8,
}

#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    retry: RetryConfig,
}

impl OpenWeatherClient {
    pub fn new(config: &ProvidersConfig, retry: RetryConfig) -> Result<Self, NetworkError> {
        Ok(Self {
            client: http::build_client(config.timeout())?,
            base_url: config.openweather_url.trim_end_matches('/').to_string(),
            api_key: config.openweather_api_key.clone(),
            retry,
        })
    }

    /// `GET /weather` in metric units.
    pub async fn current_weather(
        &self,
        coordinates: Coordinates,
    ) -> Result<CurrentWeatherRecord, ProviderError> {
        let kind = ProviderKind::Weather;
        let api_key = http::require_key(kind, &self.api_key)?;
        let url = format!("{}/weather", self.base_url);
        let lat = coordinates.latitude.to_string();
        let lon = coordinates.longitude.to_string();

        let response: WeatherResponse = http::get_json(kind, &self.retry, || {
            self.client.get(&url).query(&[
                ("lat", lat.as_str()),
                ("lon", lon.as_str()),
                ("appid", api_key.as_str()),
                ("units", "metric"),
            ])
        })
        .await?;

        let (condition, description) = response
            .weather
            .into_iter()
            .next()
            .map(|w| (w.main, w.description))
            .unwrap_or_default();

        Ok(CurrentWeatherRecord {
            temperature_c: response.main.temp,
            feels_like_c: response.main.feels_like,
            temp_min_c: response.main.temp_min,
            temp_max_c: response.main.temp_max,
            pressure_hpa: response.main.pressure,
            humidity_pct: response.main.humidity,
            wind_speed_ms: response.wind.as_ref().map_or(0.0, |w| w.speed),
            wind_direction_deg: response.wind.as_ref().and_then(|w| w.deg),
            wind_gust_ms: response.wind.as_ref().and_then(|w| w.gust),
            cloudiness_pct: response.clouds.map(|c| c.all),
            visibility_m: response.visibility,
            condition,
            description,
            station: response.name.filter(|n| !n.is_empty()),
            observed_at: timestamp(kind, response.dt)?,
        })
    }

    /// `GET /air_pollution`; uses the first (current) entry.
    pub async fn air_quality(
        &self,
        coordinates: Coordinates,
    ) -> Result<AirQualityRecord, ProviderError> {
        let kind = ProviderKind::AirQuality;
        let api_key = http::require_key(kind, &self.api_key)?;
        let url = format!("{}/air_pollution", self.base_url);
        let lat = coordinates.latitude.to_string();
        let lon = coordinates.longitude.to_string();

        let response: AirPollutionResponse = http::get_json(kind, &self.retry, || {
            self.client.get(&url).query(&[
                ("lat", lat.as_str()),
                ("lon", lon.as_str()),
                ("appid", api_key.as_str()),
            ])
        })
        .await?;

        let entry = response
            .list
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::invalid_payload(kind, "empty air pollution list"))?;

        let category = AqiCategory::from_index(entry.main.aqi).ok_or_else(|| {
            ProviderError::invalid_payload(kind, format!("AQI out of range: {}", entry.main.aqi))
        })?;

        Ok(AirQualityRecord {
            aqi: entry.main.aqi,
            category,
            components: entry.components,
            measured_at: timestamp(kind, entry.dt)?,
        })
    }
}

fn timestamp(kind: ProviderKind, unix: i64) -> Result<DateTime<Utc>, ProviderError> {
    DateTime::from_timestamp(unix, 0)
        .ok_or_else(|| ProviderError::invalid_payload(kind, format!("bad timestamp: {}", unix)))
}

/// Current weather slot, backed by [`OpenWeatherClient`].
#[derive(Debug, Clone)]
pub struct CurrentWeatherProvider {
    client: Arc<OpenWeatherClient>,
}

impl CurrentWeatherProvider {
    pub fn new(client: Arc<OpenWeatherClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EnvironmentProvider for CurrentWeatherProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Weather
    }

    fn name(&self) -> &str {
        "openweather-current"
    }

    async fn fetch(&self, coordinates: Coordinates) -> Result<Payload, ProviderError> {
        let record = self.client.current_weather(coordinates).await?;
        Payload::encode(&record)
            .map_err(|e| ProviderError::invalid_payload(self.kind(), e.to_string()))
    }
}

/// Air quality slot, backed by [`OpenWeatherClient`].
#[derive(Debug, Clone)]
pub struct AirQualityProvider {
    client: Arc<OpenWeatherClient>,
}

impl AirQualityProvider {
    pub fn new(client: Arc<OpenWeatherClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EnvironmentProvider for AirQualityProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::AirQuality
    }

    fn name(&self) -> &str {
        "openweather-air-pollution"
    }

    async fn fetch(&self, coordinates: Coordinates) -> Result<Payload, ProviderError> {
        let record = self.client.air_quality(coordinates).await?;
        Payload::encode(&record)
            .map_err(|e| ProviderError::invalid_payload(self.kind(), e.to_string()))
    }
}
