//! Concurrent fan-out to every provider for one key.

use std::collections::BTreeMap;

use terrawatch_core::{
    AggregationError, Coordinates, Payload, ProviderError, ProviderKind, ProviderSet,
};
use tokio::time::Instant;

use crate::snapshot::Snapshot;

/// Builds complete snapshots from a [`ProviderSet`].
#[derive(Debug, Clone)]
pub struct Aggregator {
    providers: ProviderSet,
}

impl Aggregator {
    pub fn new(providers: ProviderSet) -> Self {
        Self { providers }
    }

    /// Query all providers concurrently and combine the results.
    ///
    /// Every provider is awaited even after one fails, so the error lists all
    /// failures. Succeeds only when all four return data.
    pub async fn aggregate(
        &self,
        key: &str,
        coordinates: Coordinates,
    ) -> Result<Snapshot, AggregationError> {
        let started = Instant::now();

        let (climate, weather, air_quality, fires) = tokio::join!(
            self.fetch(ProviderKind::Climate, coordinates),
            self.fetch(ProviderKind::Weather, coordinates),
            self.fetch(ProviderKind::AirQuality, coordinates),
            self.fetch(ProviderKind::Fires, coordinates),
        );

        let mut payloads = BTreeMap::new();
        let mut failures = Vec::new();
        for (kind, result) in [
            (ProviderKind::Climate, climate),
            (ProviderKind::Weather, weather),
            (ProviderKind::AirQuality, air_quality),
            (ProviderKind::Fires, fires),
        ] {
            match result {
                Ok(payload) => {
                    payloads.insert(kind, payload);
                }
                Err(e) => failures.push(e),
            }
        }

        if let Some(err) = AggregationError::from_failures(key, failures) {
            tracing::warn!(
                key = %key,
                failed = ?err.failed_providers(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Aggregation failed: {}",
                err
            );
            return Err(err);
        }

        tracing::debug!(
            key = %key,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Aggregated all providers"
        );
        Ok(Snapshot::new(key, coordinates, payloads))
    }

    async fn fetch(
        &self,
        kind: ProviderKind,
        coordinates: Coordinates,
    ) -> Result<Payload, ProviderError> {
        let provider = self.providers.get(kind);
        let result = provider.fetch(coordinates).await;
        if let Err(e) = &result {
            tracing::debug!(provider = provider.name(), %coordinates, "Provider fetch failed: {}", e);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use terrawatch_core::{EnvironmentProvider, NetworkError};

    struct StaticProvider {
        kind: ProviderKind,
        fail: bool,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl StaticProvider {
        fn new(kind: ProviderKind, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                kind,
                fail,
                delay: Duration::from_secs(1),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl EnvironmentProvider for StaticProvider {
        fn kind(&self) -> ProviderKind {
            self.kind
        }

        fn name(&self) -> &str {
            self.kind.as_str()
        }

        async fn fetch(&self, coordinates: Coordinates) -> Result<Payload, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.fail {
                return Err(ProviderError::network(self.kind, NetworkError::Timeout));
            }
            Ok(Payload::from_value(serde_json::json!({
                "kind": self.kind.as_str(),
                "lat": coordinates.latitude,
            })))
        }
    }

    fn set(providers: &[Arc<StaticProvider>; 4]) -> ProviderSet {
        ProviderSet {
            climate: providers[0].clone(),
            weather: providers[1].clone(),
            air_quality: providers[2].clone(),
            fires: providers[3].clone(),
        }
    }

    fn providers(failing: &[ProviderKind]) -> [Arc<StaticProvider>; 4] {
        ProviderKind::ALL.map(|k| StaticProvider::new(k, failing.contains(&k)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_aggregate_combines_all_providers_concurrently() {
        let providers = providers(&[]);
        let aggregator = Aggregator::new(set(&providers));

        let started = Instant::now();
        let snapshot = aggregator
            .aggregate("almaty", Coordinates::new(43.222, 76.8512))
            .await
            .unwrap();

        assert!(snapshot.is_complete());
        assert_eq!(snapshot.key, "almaty");
        assert_eq!(
            snapshot.payload(ProviderKind::Fires).unwrap().as_value()["kind"],
            "fires"
        );
        // four one-second fetches overlap
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_failure_fails_whole_snapshot() {
        let providers = providers(&[ProviderKind::AirQuality]);
        let aggregator = Aggregator::new(set(&providers));

        let err = aggregator
            .aggregate("almaty", Coordinates::new(43.222, 76.8512))
            .await
            .unwrap_err();

        assert_eq!(err.key, "almaty");
        assert_eq!(err.provider, ProviderKind::AirQuality);
        assert_eq!(err.failed_providers(), vec![ProviderKind::AirQuality]);
        for provider in &providers {
            assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_multiple_failures_are_all_reported() {
        let providers = providers(&[ProviderKind::Fires, ProviderKind::Weather]);
        let aggregator = Aggregator::new(set(&providers));

        let err = aggregator
            .aggregate("almaty", Coordinates::new(43.222, 76.8512))
            .await
            .unwrap_err();

        assert_eq!(err.provider, ProviderKind::Weather);
        assert_eq!(
            err.failed_providers(),
            vec![ProviderKind::Weather, ProviderKind::Fires]
        );
    }
}
