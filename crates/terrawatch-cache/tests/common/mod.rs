//! Scriptable in-process providers for cache tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use terrawatch_core::{
    Coordinates, EnvironmentProvider, NetworkError, Payload, ProviderError, ProviderKind,
    ProviderSet,
};

pub const ALMATY: Coordinates = Coordinates {
    latitude: 43.222,
    longitude: 76.8512,
};

pub const TOKYO: Coordinates = Coordinates {
    latitude: 35.6762,
    longitude: 139.6503,
};

/// Sleeps `delay`, then returns a payload stamped with a per-provider call
/// number, or fails for any coordinates listed in `failing`.
pub struct ScriptedProvider {
    kind: ProviderKind,
    delay: Duration,
    calls: AtomicU64,
    failing: Mutex<Vec<Coordinates>>,
}

impl ScriptedProvider {
    pub fn new(kind: ProviderKind, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            kind,
            delay,
            calls: AtomicU64::new(0),
            failing: Mutex::new(Vec::new()),
        })
    }

    pub fn fail_for(&self, coordinates: Coordinates) {
        self.failing.lock().push(coordinates);
    }

    pub fn recover(&self) {
        self.failing.lock().clear();
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EnvironmentProvider for ScriptedProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn name(&self) -> &str {
        self.kind.as_str()
    }

    async fn fetch(&self, coordinates: Coordinates) -> Result<Payload, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.delay).await;

        if self.failing.lock().contains(&coordinates) {
            return Err(ProviderError::network(
                self.kind,
                NetworkError::ServerError {
                    status: 503,
                    message: "unavailable".to_string(),
                },
            ));
        }

        Ok(Payload::from_value(serde_json::json!({
            "provider": self.kind.as_str(),
            "call": call,
            "latitude": coordinates.latitude,
        })))
    }
}

/// One scripted provider per slot, all with the same latency.
pub struct Providers {
    pub climate: Arc<ScriptedProvider>,
    pub weather: Arc<ScriptedProvider>,
    pub air_quality: Arc<ScriptedProvider>,
    pub fires: Arc<ScriptedProvider>,
}

impl Providers {
    pub fn new(delay: Duration) -> Self {
        Self {
            climate: ScriptedProvider::new(ProviderKind::Climate, delay),
            weather: ScriptedProvider::new(ProviderKind::Weather, delay),
            air_quality: ScriptedProvider::new(ProviderKind::AirQuality, delay),
            fires: ScriptedProvider::new(ProviderKind::Fires, delay),
        }
    }

    pub fn set(&self) -> ProviderSet {
        ProviderSet {
            climate: self.climate.clone(),
            weather: self.weather.clone(),
            air_quality: self.air_quality.clone(),
            fires: self.fires.clone(),
        }
    }

    pub fn all(&self) -> [&Arc<ScriptedProvider>; 4] {
        [&self.climate, &self.weather, &self.air_quality, &self.fires]
    }

    pub fn fail_everything(&self, coordinates: Coordinates) {
        for provider in self.all() {
            provider.fail_for(coordinates);
        }
    }

    pub fn recover(&self) {
        for provider in self.all() {
            provider.recover();
        }
    }
}

pub fn targets() -> Vec<(String, Coordinates)> {
    vec![
        ("almaty".to_string(), ALMATY),
        ("tokyo".to_string(), TOKYO),
    ]
}

/// Call number the weather provider stamped on this payload.
pub fn weather_call(snapshot: &terrawatch_cache::Snapshot) -> u64 {
    snapshot
        .payload(ProviderKind::Weather)
        .and_then(|p| p.as_value()["call"].as_u64())
        .unwrap_or_default()
}
