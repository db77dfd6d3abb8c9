use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::{ConfigError, Coordinates};

/// Environment variable pointing at an explicit config file.
pub const CONFIG_PATH_ENV: &str = "TERRAWATCH_CONFIG";
pub const OPENWEATHER_API_KEY_ENV: &str = "OPENWEATHER_API_KEY";
pub const FIRMS_API_KEY_ENV: &str = "FIRMS_API_KEY";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a single-line summary of all errors
    pub fn error_summary(&self) -> String {
        if self.errors.is_empty() {
            return String::new();
        }
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Background refresh interval in minutes. Also the staleness threshold.
    #[serde(default = "default_refresh_minutes")]
    pub refresh_minutes: u32,

    /// Monitored locations
    #[serde(default = "default_cities")]
    pub cities: Vec<CityConfig>,

    /// Upstream provider settings
    #[serde(default)]
    pub providers: ProvidersConfig,
}

/// A monitored location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityConfig {
    /// Stable cache key, e.g. `almaty`
    pub id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl CityConfig {
    pub fn new(id: &str, name: &str, latitude: f64, longitude: f64) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            latitude,
            longitude,
        }
    }

    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// NASA POWER daily point endpoint
    #[serde(default = "default_nasa_power_url")]
    pub nasa_power_url: String,

    /// Days of history requested from NASA POWER (ends yesterday)
    #[serde(default = "default_climate_lookback_days")]
    pub climate_lookback_days: u32,

    /// OpenWeatherMap 2.5 API base
    #[serde(default = "default_openweather_url")]
    pub openweather_url: String,

    /// OpenWeatherMap key (overridden by `OPENWEATHER_API_KEY`)
    #[serde(default)]
    pub openweather_api_key: Option<String>,

    /// NASA FIRMS API base
    #[serde(default = "default_firms_url")]
    pub firms_url: String,

    /// NASA FIRMS map key (overridden by `FIRMS_API_KEY`)
    #[serde(default)]
    pub firms_api_key: Option<String>,

    #[serde(default = "default_firms_source")]
    pub firms_source: String,

    /// Named FIRMS area, used when `firms_bbox_degrees` is unset
    #[serde(default = "default_firms_region")]
    pub firms_region: String,

    /// Half-width of a bounding box around each location. When set, fires are
    /// requested for that box instead of `firms_region`.
    #[serde(default)]
    pub firms_bbox_degrees: Option<f64>,

    /// Days back for active fires (1-10)
    #[serde(default = "default_firms_days")]
    pub firms_days: u32,

    /// Fire records kept per snapshot
    #[serde(default = "default_max_fires")]
    pub max_fires: usize,
}

fn default_refresh_minutes() -> u32 {
    20
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_nasa_power_url() -> String {
    "https://power.larc.nasa.gov/api/temporal/daily/point".to_string()
}

fn default_climate_lookback_days() -> u32 {
    14
}

fn default_openweather_url() -> String {
    "https://api.openweathermap.org/data/2.5".to_string()
}

fn default_firms_url() -> String {
    "https://firms.modaps.eosdis.nasa.gov/api".to_string()
}

fn default_firms_source() -> String {
    "VIIRS_SNPP_NRT".to_string()
}

fn default_firms_region() -> String {
    "World".to_string()
}

fn default_firms_days() -> u32 {
    1
}

fn default_max_fires() -> usize {
    100
}

fn default_cities() -> Vec<CityConfig> {
    vec![
        CityConfig::new("almaty", "Almaty", 43.2220, 76.8512),
        CityConfig::new("astana", "Astana", 51.1694, 71.4491),
        CityConfig::new("pavlodar", "Pavlodar", 52.2873, 76.9665),
        CityConfig::new("ekibastuz", "Ekibastuz", 51.7244, 75.3232),
        CityConfig::new("aktau", "Aktau", 43.6506, 51.1603),
        CityConfig::new("los-angeles", "Los Angeles", 34.0522, -118.2437),
        CityConfig::new("miami", "Miami", 25.7617, -80.1918),
        CityConfig::new("sydney", "Sydney", -33.8688, 151.2093),
        CityConfig::new("perth", "Perth", -31.9505, 115.8605),
        CityConfig::new("london", "London", 51.5074, -0.1278),
        CityConfig::new("paris", "Paris", 48.8566, 2.3522),
        CityConfig::new("barcelona", "Barcelona", 41.3851, 2.1734),
        CityConfig::new("tokyo", "Tokyo", 35.6762, 139.6503),
        CityConfig::new("singapore", "Singapore", 1.3521, 103.8198),
        CityConfig::new("dubai", "Dubai", 25.2048, 55.2708),
        CityConfig::new("sao-paulo", "São Paulo", -23.5505, -46.6333),
        CityConfig::new("buenos-aires", "Buenos Aires", -34.6037, -58.3816),
        CityConfig::new("cairo", "Cairo", 30.0444, 31.2357),
        CityConfig::new("cape-town", "Cape Town", -33.9249, 18.4241),
    ]
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            nasa_power_url: default_nasa_power_url(),
            climate_lookback_days: default_climate_lookback_days(),
            openweather_url: default_openweather_url(),
            openweather_api_key: None,
            firms_url: default_firms_url(),
            firms_api_key: None,
            firms_source: default_firms_source(),
            firms_region: default_firms_region(),
            firms_bbox_degrees: None,
            firms_days: default_firms_days(),
            max_fires: default_max_fires(),
        }
    }
}

impl ProvidersConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            refresh_minutes: default_refresh_minutes(),
            cities: default_cities(),
            providers: ProvidersConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the resolved path, creating a default file if
    /// none exists. API keys from the environment take precedence.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path()?;
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from an explicit path, writing defaults if missing.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let config = Self::default();
            config.save_to(path)?;
            tracing::info!("Wrote default configuration to {}", path.display());
            return Ok(config);
        }

        let contents = std::fs::read_to_string(path)?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Load configuration and validate it
    ///
    /// Returns the config along with any validation warnings.
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated() -> Result<(Self, ValidationResult), ConfigError> {
        Self::load()?.validated()
    }

    /// Run [`validate`](Self::validate), failing on errors and logging warnings.
    pub fn validated(self) -> Result<(Self, ValidationResult), ConfigError> {
        let validation = self.validate();

        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()));
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((self, validation))
    }

    /// Replace API keys with `OPENWEATHER_API_KEY` / `FIRMS_API_KEY` when set.
    pub fn apply_env_overrides(&mut self) {
        if let Some(key) = non_empty_env(OPENWEATHER_API_KEY_ENV) {
            self.providers.openweather_api_key = Some(key);
        }
        if let Some(key) = non_empty_env(FIRMS_API_KEY_ENV) {
            self.providers.firms_api_key = Some(key);
        }
    }

    /// Refresh interval; doubles as the staleness threshold.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.refresh_minutes) * 60)
    }

    /// The (key, coordinates) pairs to track.
    pub fn targets(&self) -> Vec<(String, Coordinates)> {
        self.cities
            .iter()
            .map(|c| (c.id.clone(), c.coordinates()))
            .collect()
    }

    /// Validate the configuration
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        if self.refresh_minutes == 0 {
            result.add_error("refresh_minutes", "Refresh interval must be greater than 0");
        } else if self.refresh_minutes > 1440 {
            result.add_warning(
                "refresh_minutes",
                "Refresh interval is more than 24 hours",
            );
        }

        if self.cities.is_empty() {
            result.add_warning("cities", "No cities configured - nothing will be cached");
        }

        let mut seen = HashSet::new();
        for (i, city) in self.cities.iter().enumerate() {
            let field = format!("cities[{}]", i);
            if city.id.trim().is_empty() {
                result.add_error(format!("{}.id", field), "City id must not be empty");
            } else if !seen.insert(city.id.as_str()) {
                result.add_error(
                    format!("{}.id", field),
                    format!("Duplicate city id: {}", city.id),
                );
            }
            if !city.coordinates().is_valid() {
                result.add_error(
                    field,
                    format!(
                        "Coordinates out of range: {}, {}",
                        city.latitude, city.longitude
                    ),
                );
            }
        }

        let providers = &self.providers;
        self.validate_url(&providers.nasa_power_url, "providers.nasa_power_url", &mut result);
        self.validate_url(&providers.openweather_url, "providers.openweather_url", &mut result);
        self.validate_url(&providers.firms_url, "providers.firms_url", &mut result);

        if providers.timeout_secs == 0 {
            result.add_error("providers.timeout_secs", "Timeout must be greater than 0");
        }

        if !(1..=10).contains(&providers.firms_days) {
            result.add_error("providers.firms_days", "FIRMS days must be between 1 and 10");
        }

        if let Some(degrees) = providers.firms_bbox_degrees {
            if !(degrees > 0.0 && degrees <= 90.0) {
                result.add_error(
                    "providers.firms_bbox_degrees",
                    "Bounding box half-width must be in (0, 90] degrees",
                );
            }
        }

        if providers.climate_lookback_days == 0 {
            result.add_error(
                "providers.climate_lookback_days",
                "Climate lookback must be at least 1 day",
            );
        }

        if is_blank(&providers.openweather_api_key) {
            result.add_warning(
                "providers.openweather_api_key",
                "OpenWeatherMap key not configured - weather and air quality will fail",
            );
        }

        if is_blank(&providers.firms_api_key) {
            result.add_warning(
                "providers.firms_api_key",
                "FIRMS key not configured - fire data will fail",
            );
        }

        result
    }

    /// Validate a URL field
    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Save configuration to a file
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        std::fs::write(path, contents)?;

        Ok(())
    }

    /// Get the path to the configuration file
    fn config_path() -> Result<PathBuf, ConfigError> {
        if let Some(path) = non_empty_env(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }

        let config_dir = dirs::config_dir()
            .ok_or_else(|| {
                ConfigError::NotFound(format!("platform config dir unset; use {}", CONFIG_PATH_ENV))
            })?
            .join("terrawatch");

        Ok(config_dir.join("config.toml"))
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}
