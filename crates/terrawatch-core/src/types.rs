use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize, Serializer};

/// Geographic point a monitored location is tracked at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// True when both components are finite and inside WGS84 bounds.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4},{:.4}", self.latitude, self.longitude)
    }
}

/// Upstream data sources that make up one snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Climate,
    Weather,
    AirQuality,
    Fires,
}

impl ProviderKind {
    /// Every provider a complete snapshot requires.
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::Climate,
        ProviderKind::Weather,
        ProviderKind::AirQuality,
        ProviderKind::Fires,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Climate => "climate",
            Self::Weather => "weather",
            Self::AirQuality => "air_quality",
            Self::Fires => "fires",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque structured result produced by a provider.
///
/// Provider clients build typed records and encode them here; the cache only
/// moves payloads around. Cloning is cheap (shared immutable JSON tree).
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    value: Arc<serde_json::Value>,
}

impl Payload {
    /// Encode a typed record.
    pub fn encode<T: Serialize>(record: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::from_value(serde_json::to_value(record)?))
    }

    pub fn from_value(value: serde_json::Value) -> Self {
        Self {
            value: Arc::new(value),
        }
    }

    /// Decode back into the record type the provider produced.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(self.value.as_ref())
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.value
    }
}

impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.value.as_ref().serialize(serializer)
    }
}

/// Derived value computed by a caller from a snapshot and cached back.
pub type Insight = Payload;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Reading {
        aqi: u8,
        label: String,
    }

    #[test]
    fn test_coordinates_bounds() {
        assert!(Coordinates::new(43.222, 76.8512).is_valid());
        assert!(Coordinates::new(-90.0, 180.0).is_valid());
        assert!(!Coordinates::new(91.0, 0.0).is_valid());
        assert!(!Coordinates::new(0.0, -180.5).is_valid());
        assert!(!Coordinates::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_payload_decodes_typed_record() {
        let payload = Payload::encode(&Reading {
            aqi: 2,
            label: "fair".into(),
        })
        .unwrap();

        assert_eq!(payload.as_value()["aqi"], 2);
        let back: Reading = payload.decode().unwrap();
        assert_eq!(back.label, "fair");
    }

    #[test]
    fn test_payload_clone_shares_value() {
        let payload = Payload::from_value(serde_json::json!({"fires": []}));
        let copy = payload.clone();
        assert!(Arc::ptr_eq(&payload.value, &copy.value));
    }

    #[test]
    fn test_provider_kind_names() {
        assert_eq!(ProviderKind::AirQuality.to_string(), "air_quality");
        let json = serde_json::to_string(&ProviderKind::Fires).unwrap();
        assert_eq!(json, "\"fires\"");
        assert_eq!(ProviderKind::ALL.len(), 4);
    }
}
