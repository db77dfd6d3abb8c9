//! Keyed snapshot storage with atomic replacement and fenced insight writes.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use terrawatch_core::{CacheError, Coordinates, Insight};
use tokio::time::Instant;

use crate::snapshot::{CacheEntry, Snapshot, SnapshotId};

/// Result of [`CacheStore::put`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Stored(SnapshotId),
    /// A snapshot captured later is already stored; the write was dropped.
    Superseded,
}

/// Result of [`CacheStore::set_insight`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsightWrite {
    Stored,
    /// The entry was refreshed after the insight was requested.
    Stale,
    /// Nothing is cached for the key.
    Missing,
}

/// Concurrent map from key to the latest [`CacheEntry`].
///
/// Readers get an `Arc` to a complete entry and never observe a partially
/// written one. Locks are held only for the map operation itself.
#[derive(Debug)]
pub struct CacheStore {
    pub(crate) refresh_interval: Duration,
    pub(crate) targets: RwLock<BTreeMap<String, Coordinates>>,
    pub(crate) entries: RwLock<HashMap<String, Arc<CacheEntry>>>,
    next_id: AtomicU64,
}

impl CacheStore {
    pub fn new(refresh_interval: Duration) -> Self {
        Self {
            refresh_interval,
            targets: RwLock::new(BTreeMap::new()),
            entries: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    /// Start tracking a key. A key's coordinates never change once registered;
    /// returns `false` if the key was already known.
    pub fn register(&self, key: impl Into<String>, coordinates: Coordinates) -> bool {
        let key = key.into();
        let mut targets = self.targets.write();
        match targets.get(&key) {
            Some(existing) => {
                if *existing != coordinates {
                    tracing::warn!(
                        key = %key,
                        registered = %existing,
                        requested = %coordinates,
                        "Ignoring new coordinates for an already registered key"
                    );
                }
                false
            }
            None => {
                targets.insert(key, coordinates);
                true
            }
        }
    }

    pub fn is_registered(&self, key: &str) -> bool {
        self.targets.read().contains_key(key)
    }

    pub fn coordinates(&self, key: &str) -> Option<Coordinates> {
        self.targets.read().get(key).copied()
    }

    /// Every registered key with its coordinates, ordered by key.
    pub fn targets(&self) -> Vec<(String, Coordinates)> {
        self.targets
            .read()
            .iter()
            .map(|(k, c)| (k.clone(), *c))
            .collect()
    }

    /// Latest entry for a key, if any.
    pub fn get(&self, key: &str) -> Option<Arc<CacheEntry>> {
        self.entries.read().get(key).cloned()
    }

    /// Like [`get`](Self::get) but distinguishes a key that is not tracked
    /// from one that has not been loaded yet.
    pub fn lookup(&self, key: &str) -> Result<Arc<CacheEntry>, CacheError> {
        if let Some(entry) = self.get(key) {
            return Ok(entry);
        }
        if self.is_registered(key) {
            Err(CacheError::NotLoaded(key.to_string()))
        } else {
            Err(CacheError::UnknownKey(key.to_string()))
        }
    }

    /// Atomically replace the entry for `key`, clearing any insight.
    ///
    /// Writes are ordered by snapshot capture time: a snapshot captured before
    /// the one already stored is dropped. Unregistered keys are registered with
    /// the snapshot's coordinates.
    pub fn put(&self, key: &str, snapshot: Snapshot) -> PutOutcome {
        if !self.is_registered(key) {
            self.register(key, snapshot.coordinates);
        }

        let mut entries = self.entries.write();
        if let Some(current) = entries.get(key) {
            if current.snapshot.captured_at() > snapshot.captured_at() {
                tracing::debug!(key = %key, "Dropping snapshot older than the stored one");
                return PutOutcome::Superseded;
            }
        }

        let id = SnapshotId(self.next_id.fetch_add(1, Ordering::Relaxed));
        entries.insert(
            key.to_string(),
            Arc::new(CacheEntry {
                id,
                snapshot: Arc::new(snapshot),
                insight: None,
            }),
        );
        PutOutcome::Stored(id)
    }

    /// True when no entry exists or the entry is older than the refresh interval.
    pub fn is_stale(&self, key: &str) -> bool {
        self.is_stale_at(key, Instant::now())
    }

    pub(crate) fn is_stale_at(&self, key: &str, now: Instant) -> bool {
        match self.get(key) {
            Some(entry) => entry.is_stale_at(now, self.refresh_interval),
            None => true,
        }
    }

    /// Attach an insight derived from snapshot `basis`.
    ///
    /// The write only lands if `basis` is still the stored snapshot for the key.
    pub fn set_insight(&self, key: &str, basis: SnapshotId, insight: Insight) -> InsightWrite {
        let mut entries = self.entries.write();
        let Some(current) = entries.get(key) else {
            tracing::debug!(key = %key, "Dropping insight for a key with no cached data");
            return InsightWrite::Missing;
        };

        if current.id != basis {
            tracing::debug!(
                key = %key,
                basis = basis.get(),
                current = current.id.get(),
                "Dropping insight derived from a replaced snapshot"
            );
            return InsightWrite::Stale;
        }

        let updated = Arc::new(current.with_insight(insight));
        entries.insert(key.to_string(), updated);
        InsightWrite::Stored
    }

    pub fn get_insight(&self, key: &str) -> Option<Insight> {
        self.get(key).and_then(|entry| entry.insight.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use terrawatch_core::{Payload, ProviderKind};

    fn snapshot(key: &str, marker: u64) -> Snapshot {
        let payloads = ProviderKind::ALL
            .iter()
            .map(|k| (*k, Payload::from_value(serde_json::json!({ "marker": marker }))))
            .collect();
        Snapshot::new(key, Coordinates::new(43.222, 76.8512), payloads)
    }

    fn marker(entry: &CacheEntry) -> u64 {
        entry
            .snapshot()
            .payload(ProviderKind::Weather)
            .and_then(|p| p.as_value()["marker"].as_u64())
            .unwrap()
    }

    fn insight(text: &str) -> Insight {
        Payload::from_value(serde_json::json!({ "summary": text }))
    }

    #[tokio::test]
    async fn test_absent_key_is_stale() {
        let store = CacheStore::new(Duration::from_secs(60));
        assert!(store.is_empty());
        assert!(store.get("almaty").is_none());
        assert!(store.is_stale("almaty"));
        assert!(store.get_insight("almaty").is_none());
    }

    #[tokio::test]
    async fn test_put_then_get_returns_snapshot() {
        let store = CacheStore::new(Duration::from_secs(60));
        let outcome = store.put("almaty", snapshot("almaty", 1));

        let entry = store.get("almaty").unwrap();
        assert_eq!(outcome, PutOutcome::Stored(entry.id()));
        assert_eq!(marker(&entry), 1);
        assert!(entry.insight().is_none());
        assert!(!store.is_stale("almaty"));
        assert!(store.is_registered("almaty"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_staleness_follows_interval() {
        let store = CacheStore::new(Duration::from_secs(60));
        store.put("almaty", snapshot("almaty", 1));

        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(!store.is_stale("almaty"));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(store.is_stale("almaty"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_put_replaces_and_clears_insight() {
        let store = CacheStore::new(Duration::from_secs(60));
        let PutOutcome::Stored(first) = store.put("almaty", snapshot("almaty", 1)) else {
            panic!("first put should be stored");
        };
        assert_eq!(store.set_insight("almaty", first, insight("calm")), InsightWrite::Stored);
        assert!(store.get_insight("almaty").is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        store.put("almaty", snapshot("almaty", 2));

        let entry = store.get("almaty").unwrap();
        assert_eq!(marker(&entry), 2);
        assert!(entry.insight().is_none());
        assert_ne!(entry.id(), first);
    }

    #[tokio::test(start_paused = true)]
    async fn test_older_snapshot_is_superseded() {
        let store = CacheStore::new(Duration::from_secs(60));
        let older = snapshot("almaty", 1);
        tokio::time::advance(Duration::from_secs(5)).await;
        let newer = snapshot("almaty", 2);

        assert!(matches!(store.put("almaty", newer), PutOutcome::Stored(_)));
        assert_eq!(store.put("almaty", older), PutOutcome::Superseded);
        assert_eq!(marker(&store.get("almaty").unwrap()), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_insight_for_replaced_snapshot_is_dropped() {
        let store = CacheStore::new(Duration::from_secs(60));
        let PutOutcome::Stored(basis) = store.put("almaty", snapshot("almaty", 1)) else {
            panic!("first put should be stored");
        };

        tokio::time::advance(Duration::from_secs(1)).await;
        store.put("almaty", snapshot("almaty", 2));

        assert_eq!(store.set_insight("almaty", basis, insight("old")), InsightWrite::Stale);
        assert!(store.get_insight("almaty").is_none());
    }

    #[tokio::test]
    async fn test_insight_without_entry_is_missing() {
        let store = CacheStore::new(Duration::from_secs(60));
        assert_eq!(
            store.set_insight("almaty", SnapshotId(1), insight("none")),
            InsightWrite::Missing
        );
    }

    #[tokio::test]
    async fn test_lookup_distinguishes_unknown_and_not_loaded() {
        let store = CacheStore::new(Duration::from_secs(60));
        store.register("paris", Coordinates::new(48.8566, 2.3522));

        assert_eq!(
            store.lookup("tokyo").unwrap_err(),
            CacheError::UnknownKey("tokyo".to_string())
        );
        assert_eq!(
            store.lookup("paris").unwrap_err(),
            CacheError::NotLoaded("paris".to_string())
        );
    }

    #[test]
    fn test_register_keeps_first_coordinates() {
        let store = CacheStore::new(Duration::from_secs(60));
        assert!(store.register("paris", Coordinates::new(48.8566, 2.3522)));
        assert!(!store.register("paris", Coordinates::new(0.0, 0.0)));
        assert_eq!(
            store.coordinates("paris"),
            Some(Coordinates::new(48.8566, 2.3522))
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_puts_for_distinct_keys() {
        let store = Arc::new(CacheStore::new(Duration::from_secs(60)));
        let mut handles = Vec::new();

        for i in 0..32u64 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let key = format!("city-{i}");
                store.put(&key, snapshot(&key, i));
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.len(), 32);
        for i in 0..32u64 {
            let entry = store.get(&format!("city-{i}")).unwrap();
            assert_eq!(marker(&entry), i);
            assert!(entry.snapshot().is_complete());
        }
    }
}
