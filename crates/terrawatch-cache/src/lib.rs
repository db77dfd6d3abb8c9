//! In-memory environmental data cache.
//!
//! Each monitored key maps to one [`CacheEntry`]: a complete [`Snapshot`] of
//! every provider's data plus an optional derived insight. Entries are built by
//! the [`Aggregator`], seeded once at startup, and replaced wholesale by the
//! [`RefreshScheduler`] on a fixed interval. Readers only ever touch the
//! [`CacheStore`].

pub mod aggregator;
pub mod scheduler;
pub mod service;
pub mod snapshot;
pub mod stats;
pub mod store;

pub use aggregator::Aggregator;
pub use scheduler::{CycleReport, RefreshHandle, RefreshScheduler};
pub use service::{EnvironmentCache, Lookup};
pub use snapshot::{CacheEntry, Snapshot, SnapshotId};
pub use stats::CacheStats;
pub use store::{CacheStore, InsightWrite, PutOutcome};
