//! [`EnvironmentCache`]: the store, aggregator and scheduler wired together.

use std::sync::Arc;
use std::time::Duration;

use terrawatch_core::{
    AggregationError, AppError, CacheError, Coordinates, Insight, ProviderSet, SchedulerError,
};

use crate::aggregator::Aggregator;
use crate::scheduler::{CycleReport, RefreshHandle, RefreshScheduler};
use crate::snapshot::{CacheEntry, Snapshot, SnapshotId};
use crate::stats::CacheStats;
use crate::store::{CacheStore, InsightWrite, PutOutcome};

/// Where [`EnvironmentCache::snapshot_or_fetch`] got its data.
#[derive(Debug, Clone)]
pub enum Lookup {
    Cached(Arc<CacheEntry>),
    /// Aggregated on demand for a key with no entry; not stored.
    Fetched(Arc<Snapshot>),
}

impl Lookup {
    pub fn snapshot(&self) -> &Arc<Snapshot> {
        match self {
            Lookup::Cached(entry) => entry.snapshot(),
            Lookup::Fetched(snapshot) => snapshot,
        }
    }

    pub fn is_cached(&self) -> bool {
        matches!(self, Lookup::Cached(_))
    }
}

/// Shared handle to the environmental data cache.
#[derive(Debug, Clone)]
pub struct EnvironmentCache {
    store: Arc<CacheStore>,
    aggregator: Aggregator,
    scheduler: RefreshScheduler,
}

impl EnvironmentCache {
    pub fn new(providers: ProviderSet, refresh_interval: Duration) -> Self {
        let store = Arc::new(CacheStore::new(refresh_interval));
        let aggregator = Aggregator::new(providers);
        let scheduler = RefreshScheduler::new(store.clone(), aggregator.clone());
        Self {
            store,
            aggregator,
            scheduler,
        }
    }

    pub fn scheduler(&self) -> &RefreshScheduler {
        &self.scheduler
    }

    /// Load every target once, concurrently.
    pub async fn initialize(&self, targets: &[(String, Coordinates)]) -> CycleReport {
        self.scheduler.populate(targets).await
    }

    /// Start the refresh loop over every registered key.
    pub fn start_refresh(&self) -> Result<RefreshHandle, SchedulerError> {
        self.scheduler.start(&self.store.targets())
    }

    pub fn get(&self, key: &str) -> Option<Arc<CacheEntry>> {
        self.store.get(key)
    }

    pub fn lookup(&self, key: &str) -> Result<Arc<CacheEntry>, CacheError> {
        self.store.lookup(key)
    }

    pub fn is_stale(&self, key: &str) -> bool {
        self.store.is_stale(key)
    }

    pub fn set_insight(&self, key: &str, basis: SnapshotId, insight: Insight) -> InsightWrite {
        self.store.set_insight(key, basis, insight)
    }

    pub fn get_insight(&self, key: &str) -> Option<Insight> {
        self.store.get_insight(key)
    }

    pub fn stats(&self) -> CacheStats {
        self.store.stats()
    }

    /// Re-aggregate one registered key outside the schedule.
    ///
    /// On failure the existing entry is left untouched.
    pub async fn refresh_key(&self, key: &str) -> Result<Arc<CacheEntry>, AppError> {
        let coordinates = self
            .store
            .coordinates(key)
            .ok_or_else(|| CacheError::UnknownKey(key.to_string()))?;

        let snapshot = self.aggregator.aggregate(key, coordinates).await?;
        if let PutOutcome::Superseded = self.store.put(key, snapshot) {
            tracing::debug!(key = %key, "On-demand refresh lost to a newer snapshot");
        }

        Ok(self.store.lookup(key)?)
    }

    /// Serve the cached entry, or aggregate on demand when nothing is cached.
    ///
    /// A stale entry is still served. On-demand results are returned but not
    /// stored, so only the scheduler changes what is cached.
    pub async fn snapshot_or_fetch(
        &self,
        key: &str,
        coordinates: Coordinates,
    ) -> Result<Lookup, AggregationError> {
        if let Some(entry) = self.store.get(key) {
            return Ok(Lookup::Cached(entry));
        }

        tracing::debug!(key = %key, "Cache miss, aggregating on demand");
        let snapshot = self.aggregator.aggregate(key, coordinates).await?;
        Ok(Lookup::Fetched(Arc::new(snapshot)))
    }
}
