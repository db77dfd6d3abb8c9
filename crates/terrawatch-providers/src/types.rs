use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// NASA POWER fill value for missing observations.
pub const POWER_FILL_VALUE: f64 = -999.0;

/// Daily agroclimatology series for one point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClimateRecord {
    pub latitude: f64,
    pub longitude: f64,
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Parameter code (e.g. `T2M`) -> date (`YYYYMMDD`) -> value.
    /// Fill values are dropped.
    pub series: BTreeMap<String, BTreeMap<String, f64>>,
    /// Parameter code -> unit label
    #[serde(default)]
    pub units: BTreeMap<String, String>,
}

impl ClimateRecord {
    /// Most recent value of a parameter.
    pub fn latest(&self, parameter: &str) -> Option<f64> {
        self.series
            .get(parameter)
            .and_then(|days| days.values().next_back().copied())
    }
}

/// Current conditions from OpenWeatherMap (metric units).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentWeatherRecord {
    pub temperature_c: f64,
    pub feels_like_c: f64,
    pub temp_min_c: f64,
    pub temp_max_c: f64,
    pub pressure_hpa: f64,
    pub humidity_pct: f64,
    pub wind_speed_ms: f64,
    pub wind_direction_deg: Option<f64>,
    pub wind_gust_ms: Option<f64>,
    pub cloudiness_pct: Option<f64>,
    pub visibility_m: Option<f64>,
    /// Short condition group, e.g. `Clear`, `Rain`
    pub condition: String,
    pub description: String,
    pub station: Option<String>,
    pub observed_at: DateTime<Utc>,
}

/// OpenWeatherMap air quality index (1 = good .. 5 = very poor).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AqiCategory {
    Good,
    Fair,
    Moderate,
    Poor,
    VeryPoor,
}

impl AqiCategory {
    pub fn from_index(aqi: u8) -> Option<Self> {
        match aqi {
            1 => Some(Self::Good),
            2 => Some(Self::Fair),
            3 => Some(Self::Moderate),
            4 => Some(Self::Poor),
            5 => Some(Self::VeryPoor),
            _ => None,
        }
    }
}

/// Pollutant concentrations in μg/m³.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PollutantComponents {
    #[serde(default)]
    pub co: f64,
    #[serde(default)]
    pub no: f64,
    #[serde(default)]
    pub no2: f64,
    #[serde(default)]
    pub o3: f64,
    #[serde(default)]
    pub so2: f64,
    #[serde(default)]
    pub pm2_5: f64,
    #[serde(default)]
    pub pm10: f64,
    #[serde(default)]
    pub nh3: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirQualityRecord {
    pub aqi: u8,
    pub category: AqiCategory,
    pub components: PollutantComponents,
    pub measured_at: DateTime<Utc>,
}

/// One active fire detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FireRecord {
    pub latitude: f64,
    pub longitude: f64,
    /// Brightness temperature (K); `bright_ti4` for VIIRS, `brightness` for MODIS
    pub brightness: Option<f64>,
    /// Fire radiative power (MW)
    pub frp: Option<f64>,
    pub acq_date: String,
    pub acq_time: String,
    pub satellite: Option<String>,
    pub confidence: Option<String>,
    pub daynight: Option<String>,
}

/// Active fires for the requested area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FireList {
    /// Detections, truncated to the configured maximum
    pub fires: Vec<FireRecord>,
    /// Total detections before truncation
    pub count: usize,
    pub source: String,
    pub area: String,
    pub days: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aqi_category_from_index() {
        assert_eq!(AqiCategory::from_index(1), Some(AqiCategory::Good));
        assert_eq!(AqiCategory::from_index(5), Some(AqiCategory::VeryPoor));
        assert_eq!(AqiCategory::from_index(0), None);
        assert_eq!(AqiCategory::from_index(6), None);
    }

    #[test]
    fn test_climate_latest_uses_last_date() {
        let mut t2m = BTreeMap::new();
        t2m.insert("20241001".to_string(), 10.0);
        t2m.insert("20241003".to_string(), 12.5);
        t2m.insert("20241002".to_string(), 11.0);

        let record = ClimateRecord {
            latitude: 43.2,
            longitude: 76.8,
            start: NaiveDate::from_ymd_opt(2024, 10, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 10, 3).unwrap(),
            series: BTreeMap::from([("T2M".to_string(), t2m)]),
            units: BTreeMap::new(),
        };

        assert_eq!(record.latest("T2M"), Some(12.5));
        assert_eq!(record.latest("RH2M"), None);
    }
}
