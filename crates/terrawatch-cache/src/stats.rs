use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;

use crate::store::CacheStore;

/// Point-in-time summary of the cache.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    /// Keys with a cached entry, sorted
    pub known_keys: Vec<String>,
    pub count: usize,
    /// Keys registered for refresh, loaded or not
    pub registered_keys: Vec<String>,
    pub last_updates: BTreeMap<String, DateTime<Utc>>,
    /// When each entry turns stale
    pub expires_at: BTreeMap<String, DateTime<Utc>>,
    pub stale_keys: Vec<String>,
    pub refresh_interval_ms: u64,
}

impl CacheStats {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn update_interval_minutes(&self) -> f64 {
        self.refresh_interval_ms as f64 / 60_000.0
    }
}

impl CacheStore {
    /// Summarize the cache. Takes a copy of the entry map and never waits on
    /// an aggregation in progress.
    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let entries: Vec<_> = self
            .entries
            .read()
            .iter()
            .map(|(k, e)| (k.clone(), e.clone()))
            .collect();
        let registered_keys = self.targets.read().keys().cloned().collect();

        let interval = self.refresh_interval;
        let ttl = chrono::Duration::from_std(interval).unwrap_or(chrono::Duration::MAX);

        let mut last_updates = BTreeMap::new();
        let mut expires_at = BTreeMap::new();
        let mut stale_keys = Vec::new();
        for (key, entry) in &entries {
            let updated = entry.updated_at();
            last_updates.insert(key.clone(), updated);
            expires_at.insert(
                key.clone(),
                updated.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
            );
            if entry.is_stale_at(now, interval) {
                stale_keys.push(key.clone());
            }
        }
        stale_keys.sort();

        CacheStats {
            known_keys: last_updates.keys().cloned().collect(),
            count: entries.len(),
            registered_keys,
            last_updates,
            expires_at,
            stale_keys,
            refresh_interval_ms: u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
        }
    }
}
