use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use terrawatch_core::{Coordinates, Insight, Payload, ProviderKind};
use tokio::time::Instant;

/// Identity of one stored snapshot, unique within a [`crate::CacheStore`].
///
/// Insight writes carry the id of the snapshot they were derived from so a
/// write racing a refresh can be detected and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SnapshotId(pub(crate) u64);

impl SnapshotId {
    pub fn get(&self) -> u64 {
        self.0
    }
}

/// Aggregated provider results for one key at one point in time.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub key: String,
    pub coordinates: Coordinates,
    /// One payload per provider, keyed by provider name
    pub payloads: BTreeMap<ProviderKind, Payload>,
    /// Wall-clock completion time of the aggregation
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    captured_at: Instant,
}

impl Snapshot {
    /// Stamp a snapshot with the current time.
    pub fn new(
        key: impl Into<String>,
        coordinates: Coordinates,
        payloads: BTreeMap<ProviderKind, Payload>,
    ) -> Self {
        Self {
            key: key.into(),
            coordinates,
            payloads,
            created_at: Utc::now(),
            captured_at: Instant::now(),
        }
    }

    pub fn payload(&self, kind: ProviderKind) -> Option<&Payload> {
        self.payloads.get(&kind)
    }

    /// True when every provider contributed.
    pub fn is_complete(&self) -> bool {
        ProviderKind::ALL.iter().all(|k| self.payloads.contains_key(k))
    }

    /// Monotonic capture time; drives staleness and write ordering.
    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }
}

/// The unit stored per key. Never mutated in place: refreshes and insight
/// writes both swap in a new entry.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub(crate) id: SnapshotId,
    pub(crate) snapshot: Arc<Snapshot>,
    pub(crate) insight: Option<Insight>,
}

impl CacheEntry {
    pub fn id(&self) -> SnapshotId {
        self.id
    }

    pub fn snapshot(&self) -> &Arc<Snapshot> {
        &self.snapshot
    }

    pub fn insight(&self) -> Option<&Insight> {
        self.insight.as_ref()
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.snapshot.created_at
    }

    /// Staleness at `now`. Exactly `interval` old still counts as fresh.
    pub fn is_stale_at(&self, now: Instant, interval: Duration) -> bool {
        now.saturating_duration_since(self.snapshot.captured_at) > interval
    }

    pub(crate) fn with_insight(&self, insight: Insight) -> Self {
        Self {
            id: self.id,
            snapshot: self.snapshot.clone(),
            insight: Some(insight),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payloads() -> BTreeMap<ProviderKind, Payload> {
        ProviderKind::ALL
            .iter()
            .map(|k| (*k, Payload::from_value(serde_json::json!({ "source": k.as_str() }))))
            .collect()
    }

    #[test]
    fn test_snapshot_completeness() {
        let full = Snapshot::new("paris", Coordinates::new(48.8566, 2.3522), payloads());
        assert!(full.is_complete());

        let mut partial = payloads();
        partial.remove(&ProviderKind::Fires);
        let partial = Snapshot::new("paris", Coordinates::new(48.8566, 2.3522), partial);
        assert!(!partial.is_complete());
        assert!(partial.payload(ProviderKind::Fires).is_none());
    }

    #[test]
    fn test_snapshot_serializes_payloads_by_provider() {
        let snapshot = Snapshot::new("paris", Coordinates::new(48.8566, 2.3522), payloads());
        let json = serde_json::to_value(&snapshot).unwrap();

        assert_eq!(json["key"], "paris");
        assert_eq!(json["payloads"]["air_quality"]["source"], "air_quality");
        assert!(json.get("captured_at").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_staleness_boundary() {
        let snapshot = Snapshot::new("paris", Coordinates::new(48.8566, 2.3522), payloads());
        let entry = CacheEntry {
            id: SnapshotId(1),
            snapshot: Arc::new(snapshot),
            insight: None,
        };
        let interval = Duration::from_secs(60);
        let at = entry.snapshot().captured_at();

        assert!(!entry.is_stale_at(at + interval - Duration::from_millis(1), interval));
        assert!(!entry.is_stale_at(at + interval, interval));
        assert!(entry.is_stale_at(at + interval + Duration::from_millis(1), interval));
    }
}
