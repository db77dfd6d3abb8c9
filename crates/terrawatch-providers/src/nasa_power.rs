//! NASA POWER daily point API client (agroclimatology community).

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{Days, NaiveDate, Utc};
use reqwest::Client;
use serde::Deserialize;
use terrawatch_core::{
    Coordinates, EnvironmentProvider, NetworkError, Payload, ProviderError, ProviderKind,
    ProvidersConfig,
};

use crate::http;
use crate::retry::RetryConfig;
use crate::types::{ClimateRecord, POWER_FILL_VALUE};

/// Temperature (mean/max/min), corrected precipitation, humidity, wind at 2 m.
pub const CLIMATE_PARAMETERS: &str = "T2M,T2M_MAX,T2M_MIN,PRECTOTCORR,RH2M,WS2M";

const DATE_FORMAT: &str = "%Y%m%d";
const KIND: ProviderKind = ProviderKind::Climate;

#[derive(Debug, Deserialize)]
struct PowerResponse {
    properties: PowerProperties,
    #[serde(default)]
    parameters: BTreeMap<String, PowerParameterInfo>,
}

#[derive(Debug, Deserialize)]
struct PowerProperties {
    parameter: BTreeMap<String, BTreeMap<String, f64>>,
}

#[derive(Debug, Deserialize)]
struct PowerParameterInfo {
    units: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NasaPowerClient {
    client: Client,
    base_url: String,
    lookback_days: u32,
    retry: RetryConfig,
}

impl NasaPowerClient {
    pub fn new(config: &ProvidersConfig, retry: RetryConfig) -> Result<Self, NetworkError> {
        Ok(Self {
            client: http::build_client(config.timeout())?,
            base_url: config.nasa_power_url.clone(),
            lookback_days: config.climate_lookback_days,
            retry,
        })
    }

    /// Request window ending yesterday: POWER has no data for the current day
    /// and lags a few days, so a wider window still yields about a week of points.
    pub fn default_window(today: NaiveDate, lookback_days: u32) -> (NaiveDate, NaiveDate) {
        let end = today.checked_sub_days(Days::new(1)).unwrap_or(today);
        let start = today
            .checked_sub_days(Days::new(u64::from(lookback_days.max(1))))
            .unwrap_or(end);
        (start, end)
    }

    /// Fetch the daily series for an explicit date range.
    pub async fn daily_point(
        &self,
        coordinates: Coordinates,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<ClimateRecord, ProviderError> {
        let start_param = start.format(DATE_FORMAT).to_string();
        let end_param = end.format(DATE_FORMAT).to_string();
        let latitude = coordinates.latitude.to_string();
        let longitude = coordinates.longitude.to_string();

        let response: PowerResponse = http::get_json(KIND, &self.retry, || {
            self.client.get(&self.base_url).query(&[
                ("parameters", CLIMATE_PARAMETERS),
                ("community", "AG"),
                ("latitude", latitude.as_str()),
                ("longitude", longitude.as_str()),
                ("start", start_param.as_str()),
                ("end", end_param.as_str()),
                ("format", "JSON"),
            ])
        })
        .await?;

        if response.properties.parameter.is_empty() {
            return Err(ProviderError::invalid_payload(KIND, "response has no parameters"));
        }

        let series = response
            .properties
            .parameter
            .into_iter()
            .map(|(name, days)| {
                let days = days
                    .into_iter()
                    .filter(|(_, value)| *value != POWER_FILL_VALUE)
                    .collect();
                (name, days)
            })
            .collect();

        let units = response
            .parameters
            .into_iter()
            .filter_map(|(name, info)| info.units.map(|u| (name, u)))
            .collect();

        Ok(ClimateRecord {
            latitude: coordinates.latitude,
            longitude: coordinates.longitude,
            start,
            end,
            series,
            units,
        })
    }
}

#[async_trait]
impl EnvironmentProvider for NasaPowerClient {
    fn kind(&self) -> ProviderKind {
        KIND
    }

    fn name(&self) -> &str {
        "nasa-power"
    }

    async fn fetch(&self, coordinates: Coordinates) -> Result<Payload, ProviderError> {
        let (start, end) = Self::default_window(Utc::now().date_naive(), self.lookback_days);
        let record = self.daily_point(coordinates, start, end).await?;
        Payload::encode(&record).map_err(|e| ProviderError::invalid_payload(KIND, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_window_ends_yesterday() {
        let today = NaiveDate::from_ymd_opt(2024, 10, 15).unwrap();
        let (start, end) = NasaPowerClient::default_window(today, 14);
        assert_eq!(end, NaiveDate::from_ymd_opt(2024, 10, 14).unwrap());
        assert_eq!(start, NaiveDate::from_ymd_opt(2024, 10, 1).unwrap());
    }

    #[test]
    fn test_default_window_minimum_one_day() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let (start, end) = NasaPowerClient::default_window(today, 0);
        assert_eq!(start, end);
        assert_eq!(end, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
    }
}
