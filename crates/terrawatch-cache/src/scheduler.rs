//! Initial population and the periodic refresh loop.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use terrawatch_core::{AggregationError, Coordinates, SchedulerError};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::aggregator::Aggregator;
use crate::store::{CacheStore, PutOutcome};

/// Outcome of one population or refresh pass.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    /// Keys whose entry was replaced
    pub refreshed: Vec<String>,
    /// Keys whose result lost to a later snapshot
    pub superseded: Vec<String>,
    /// Keys whose aggregation failed; the previous entry was kept
    pub failed: Vec<AggregationError>,
    /// Aggregation tasks that panicked or were cancelled
    pub aborted: usize,
    pub elapsed: Duration,
}

impl CycleReport {
    pub fn attempted(&self) -> usize {
        self.refreshed.len() + self.superseded.len() + self.failed.len() + self.aborted
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.aborted == 0
    }
}

#[derive(Debug, Default)]
struct SchedulerState {
    running: AtomicBool,
    cycles: AtomicU64,
    last_report: Mutex<Option<CycleReport>>,
}

/// Clears the running flag when the loop exits, including by panic.
struct RunningGuard(Arc<SchedulerState>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.running.store(false, Ordering::SeqCst);
    }
}

/// Drives [`Aggregator`] over every registered key and writes into the store.
#[derive(Debug, Clone)]
pub struct RefreshScheduler {
    store: Arc<CacheStore>,
    aggregator: Aggregator,
    interval: Duration,
    state: Arc<SchedulerState>,
}

impl RefreshScheduler {
    /// Uses the store's refresh interval as the loop period.
    pub fn new(store: Arc<CacheStore>, aggregator: Aggregator) -> Self {
        let interval = store.refresh_interval();
        Self {
            store,
            aggregator,
            interval,
            state: Arc::new(SchedulerState::default()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::SeqCst)
    }

    /// Completed scheduled cycles since creation. Initial population is not counted.
    pub fn cycles_completed(&self) -> u64 {
        self.state.cycles.load(Ordering::SeqCst)
    }

    pub fn last_report(&self) -> Option<CycleReport> {
        self.state.last_report.lock().clone()
    }

    /// Register `targets` and aggregate all of them concurrently, once.
    ///
    /// Failures are logged and skipped; the failed keys stay registered so the
    /// refresh loop retries them.
    pub async fn populate(&self, targets: &[(String, Coordinates)]) -> CycleReport {
        for (key, coordinates) in targets {
            self.store.register(key.clone(), *coordinates);
        }

        tracing::info!(keys = targets.len(), "Populating cache");
        let report = self.refresh(targets.to_vec()).await;
        tracing::info!(
            loaded = report.refreshed.len(),
            failed = report.failed.len(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Initial population complete"
        );
        report
    }

    /// Refresh every registered key once and record the result as a cycle.
    pub async fn run_cycle(&self) -> CycleReport {
        let targets = self.store.targets();
        let report = self.refresh(targets).await;

        let cycle = self.state.cycles.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!(
            cycle,
            keys = report.attempted(),
            refreshed = report.refreshed.len(),
            failed = report.failed.len(),
            aborted = report.aborted,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Refresh cycle complete"
        );
        *self.state.last_report.lock() = Some(report.clone());
        report
    }

    /// Register `targets` and start the background loop.
    ///
    /// The loop sleeps one interval, refreshes every registered key, and
    /// repeats. Cancellation is observed between cycles only: a cycle already
    /// in flight finishes and its writes land before the loop exits.
    pub fn start(&self, targets: &[(String, Coordinates)]) -> Result<RefreshHandle, SchedulerError> {
        if self
            .state
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SchedulerError::AlreadyRunning);
        }

        for (key, coordinates) in targets {
            self.store.register(key.clone(), *coordinates);
        }

        let cancel = CancellationToken::new();
        let guard = RunningGuard(self.state.clone());
        let task = tokio::spawn(self.clone().run_loop(cancel.clone(), guard));

        Ok(RefreshHandle {
            _drop_guard: cancel.clone().drop_guard(),
            cancel,
            task,
            state: self.state.clone(),
        })
    }

    async fn run_loop(self, cancel: CancellationToken, _running: RunningGuard) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            keys = self.store.targets().len(),
            "Refresh loop started"
        );

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }

            self.run_cycle().await;

            if cancel.is_cancelled() {
                break;
            }
        }

        tracing::info!(cycles = self.cycles_completed(), "Refresh loop stopped");
    }

    /// Aggregate each target in its own task and store results in completion order.
    async fn refresh(&self, targets: Vec<(String, Coordinates)>) -> CycleReport {
        let started = Instant::now();
        let mut tasks = JoinSet::new();

        for (key, coordinates) in targets {
            let aggregator = self.aggregator.clone();
            tasks.spawn(async move {
                let result = aggregator.aggregate(&key, coordinates).await;
                (key, result)
            });
        }

        let mut report = CycleReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((key, Ok(snapshot))) => match self.store.put(&key, snapshot) {
                    PutOutcome::Stored(_) => report.refreshed.push(key),
                    PutOutcome::Superseded => report.superseded.push(key),
                },
                Ok((_, Err(e))) => report.failed.push(e),
                Err(e) => {
                    tracing::error!("Aggregation task aborted: {}", e);
                    report.aborted += 1;
                }
            }
        }

        report.refreshed.sort();
        report.superseded.sort();
        report.failed.sort_by(|a, b| a.key.cmp(&b.key));
        report.elapsed = started.elapsed();
        report
    }
}

/// Control handle for a running refresh loop.
///
/// Dropping the handle cancels the loop without waiting for it.
#[derive(Debug)]
pub struct RefreshHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
    state: Arc<SchedulerState>,
    _drop_guard: DropGuard,
}

impl RefreshHandle {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub fn cycles_completed(&self) -> u64 {
        self.state.cycles.load(Ordering::SeqCst)
    }

    /// Cancel the loop and wait for it to exit. An in-flight cycle completes first.
    pub async fn stop(self) {
        let RefreshHandle { cancel, task, .. } = self;
        cancel.cancel();
        if let Err(e) = task.await {
            tracing::warn!("Refresh loop ended abnormally: {}", e);
        }
    }
}
