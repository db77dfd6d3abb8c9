//! NASA FIRMS active fire client (area CSV endpoint).

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use terrawatch_core::{
    Coordinates, EnvironmentProvider, NetworkError, Payload, ProviderError, ProviderKind,
    ProvidersConfig,
};

use crate::http;
use crate::retry::RetryConfig;
use crate::types::{FireList, FireRecord};

const KIND: ProviderKind = ProviderKind::Fires;

#[derive(Debug, Clone)]
pub struct FirmsClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    source: String,
    region: String,
    bbox_degrees: Option<f64>,
    days: u32,
    max_fires: usize,
    retry: RetryConfig,
}

impl FirmsClient {
    pub fn new(config: &ProvidersConfig, retry: RetryConfig) -> Result<Self, NetworkError> {
        Ok(Self {
            client: http::build_client(config.timeout())?,
            base_url: config.firms_url.trim_end_matches('/').to_string(),
            api_key: config.firms_api_key.clone(),
            source: config.firms_source.clone(),
            region: config.firms_region.clone(),
            bbox_degrees: config.firms_bbox_degrees,
            days: config.firms_days,
            max_fires: config.max_fires,
            retry,
        })
    }

    /// Area segment of the request path: a `west,south,east,north` box around
    /// the point when configured, otherwise the named region.
    pub fn area_for(&self, coordinates: Coordinates) -> String {
        match self.bbox_degrees {
            Some(d) => format!(
                "{:.4},{:.4},{:.4},{:.4}",
                (coordinates.longitude - d).max(-180.0),
                (coordinates.latitude - d).max(-90.0),
                (coordinates.longitude + d).min(180.0),
                (coordinates.latitude + d).min(90.0),
            ),
            None => self.region.clone(),
        }
    }

    pub async fn active_fires(&self, coordinates: Coordinates) -> Result<FireList, ProviderError> {
        let api_key = http::require_key(KIND, &self.api_key)?;
        let area = self.area_for(coordinates);
        let url = format!(
            "{}/area/csv/{}/{}/{}/{}",
            self.base_url, api_key, self.source, area, self.days
        );

        let body = http::get_text(KIND, &self.retry, || self.client.get(&url)).await?;
        let mut fires = parse_fire_csv(&body)?;
        let count = fires.len();
        fires.truncate(self.max_fires);

        Ok(FireList {
            fires,
            count,
            source: self.source.clone(),
            area,
            days: self.days,
        })
    }
}

/// Parse the FIRMS CSV body. An empty body means no detections.
///
/// Rows without parseable coordinates are skipped. A body whose header lacks
/// `latitude`/`longitude` (FIRMS reports key problems as plain text) is an
/// invalid payload.
pub fn parse_fire_csv(body: &str) -> Result<Vec<FireRecord>, ProviderError> {
    let mut lines = body.lines().map(str::trim).filter(|l| !l.is_empty());

    let Some(header) = lines.next() else {
        return Ok(Vec::new());
    };

    let columns: HashMap<&str, usize> = header
        .split(',')
        .enumerate()
        .map(|(i, name)| (name.trim(), i))
        .collect();

    let (Some(&lat_idx), Some(&lon_idx)) = (columns.get("latitude"), columns.get("longitude"))
    else {
        return Err(ProviderError::invalid_payload(
            KIND,
            format!("unexpected FIRMS response: {}", header),
        ));
    };

    let fires = lines
        .filter_map(|line| {
            let values: Vec<&str> = line.split(',').map(str::trim).collect();
            let field = |name: &str| {
                columns
                    .get(name)
                    .and_then(|&i| values.get(i).copied())
                    .filter(|v| !v.is_empty())
            };
            let number = |name: &str| field(name).and_then(|v| v.parse::<f64>().ok());

            let latitude = values.get(lat_idx)?.parse::<f64>().ok()?;
            let longitude = values.get(lon_idx)?.parse::<f64>().ok()?;

            Some(FireRecord {
                latitude,
                longitude,
                brightness: number("bright_ti4").or_else(|| number("brightness")),
                frp: number("frp"),
                acq_date: field("acq_date").unwrap_or_default().to_string(),
                acq_time: field("acq_time").unwrap_or_default().to_string(),
                satellite: field("satellite").map(str::to_string),
                confidence: field("confidence").map(str::to_string),
                daynight: field("daynight").map(str::to_string),
            })
        })
        .collect();

    Ok(fires)
}

#[async_trait]
impl EnvironmentProvider for FirmsClient {
    fn kind(&self) -> ProviderKind {
        KIND
    }

    fn name(&self) -> &str {
        "nasa-firms"
    }

    async fn fetch(&self, coordinates: Coordinates) -> Result<Payload, ProviderError> {
        let list = self.active_fires(coordinates).await?;
        Payload::encode(&list).map_err(|e| ProviderError::invalid_payload(KIND, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIIRS_CSV: &str = "\
latitude,longitude,bright_ti4,scan,track,acq_date,acq_time,satellite,instrument,confidence,version,bright_ti5,frp,daynight
34.05221,-118.24371,325.5,0.39,0.36,2024-10-04,1234,N,VIIRS,n,2.0NRT,295.0,12.5,D
37.77490,-122.41940,340.2,0.41,0.37,2024-10-04,1456,N,VIIRS,h,2.0NRT,300.0,,N
";

    #[test]
    fn test_parse_viirs_rows() {
        let fires = parse_fire_csv(VIIRS_CSV).unwrap();
        assert_eq!(fires.len(), 2);
        assert_eq!(fires[0].latitude, 34.05221);
        assert_eq!(fires[0].brightness, Some(325.5));
        assert_eq!(fires[0].frp, Some(12.5));
        assert_eq!(fires[0].acq_date, "2024-10-04");
        assert_eq!(fires[0].daynight.as_deref(), Some("D"));
        assert_eq!(fires[1].frp, None);
        assert_eq!(fires[1].confidence.as_deref(), Some("h"));
    }

    #[test]
    fn test_parse_modis_brightness_column() {
        let csv = "latitude,longitude,brightness,acq_date,acq_time,confidence,frp\n\
                   -33.9,18.4,310.1,2024-10-05,0930,80,4.2\n";
        let fires = parse_fire_csv(csv).unwrap();
        assert_eq!(fires[0].brightness, Some(310.1));
        assert_eq!(fires[0].satellite, None);
    }

    #[test]
    fn test_parse_empty_body() {
        assert!(parse_fire_csv("").unwrap().is_empty());
        assert!(parse_fire_csv("latitude,longitude,frp\n").unwrap().is_empty());
    }

    #[test]
    fn test_parse_skips_malformed_rows() {
        let csv = "latitude,longitude,frp\nnot-a-number,1.0,2.0\n10.0,20.0,3.0\n10.0\n";
        let fires = parse_fire_csv(csv).unwrap();
        assert_eq!(fires.len(), 1);
        assert_eq!(fires[0].longitude, 20.0);
    }

    #[test]
    fn test_parse_rejects_plain_text_error() {
        let err = parse_fire_csv("Invalid MAP_KEY.").unwrap_err();
        assert!(matches!(err, ProviderError::InvalidPayload { .. }));
    }

    #[test]
    fn test_area_for_bbox_and_region() {
        let mut config = ProvidersConfig::default();
        let client = FirmsClient::new(&config, RetryConfig::disabled()).unwrap();
        assert_eq!(client.area_for(Coordinates::new(43.2, 76.8)), "World");

        config.firms_bbox_degrees = Some(1.0);
        let client = FirmsClient::new(&config, RetryConfig::disabled()).unwrap();
        assert_eq!(
            client.area_for(Coordinates::new(43.2, 76.8)),
            "75.8000,42.2000,77.8000,44.2000"
        );
        assert_eq!(
            client.area_for(Coordinates::new(89.5, 179.5)),
            "178.5000,88.5000,180.0000,90.0000"
        );
    }
}
