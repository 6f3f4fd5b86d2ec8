//! Periodic Sweep Background Task
//!
//! Keeps every registered city warm without waiting for a lookup to find it
//! stale. On each tick the task lists the active cities and schedules a
//! background refresh for each one, exactly as a stale-classified lookup
//! would. The refresh itself (clean sweep plus provider query) happens in the
//! refresh consumer, so a slow provider never delays the next tick.

use crate::constants::DEFAULT_SWEEP_INTERVAL_SECS;
use poppin_storage::RefreshDispatcher;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for the periodic sweep background task.
#[derive(Debug, Clone)]
pub struct PeriodicSweepConfig {
    /// Time between sweeps (default: 6 hours)
    pub interval: Duration,

    /// Whether the binary spawns the task at all (default: true)
    pub enabled: bool,
}

impl Default for PeriodicSweepConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            enabled: true,
        }
    }
}

// ============================================================================
// METRICS
// ============================================================================

/// Counters for periodic sweep activity.
#[derive(Debug, Default)]
pub struct PeriodicSweepMetrics {
    /// Sweep cycles completed
    pub cycles: AtomicU64,

    /// Background refreshes handed to the trigger
    pub cities_scheduled: AtomicU64,

    /// Cycles or cities that could not be scheduled
    pub errors: AtomicU64,
}

impl PeriodicSweepMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get current snapshot of all metrics.
    pub fn snapshot(&self) -> PeriodicSweepSnapshot {
        PeriodicSweepSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            cities_scheduled: self.cities_scheduled.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of sweep metrics at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodicSweepSnapshot {
    pub cycles: u64,
    pub cities_scheduled: u64,
    pub errors: u64,
}

// ============================================================================
// BACKGROUND TASK
// ============================================================================

/// Background task that periodically schedules refreshes for active cities.
///
/// The first sweep runs one full interval after start; restarts do not
/// re-query every city. Runs until the shutdown signal is received and
/// returns the metrics collected over its lifetime.
///
/// # Example
///
/// ```ignore
/// let (shutdown_tx, shutdown_rx) = watch::channel(false);
/// let handle = tokio::spawn(periodic_sweep_task(dispatcher, config, shutdown_rx));
///
/// // Later, trigger shutdown
/// let _ = shutdown_tx.send(true);
/// let metrics = handle.await?;
/// ```
pub async fn periodic_sweep_task(
    dispatcher: RefreshDispatcher,
    config: PeriodicSweepConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<PeriodicSweepMetrics> {
    let metrics = Arc::new(PeriodicSweepMetrics::new());

    let mut sweep_interval = interval_at(Instant::now() + config.interval, config.interval);
    sweep_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        interval_secs = config.interval.as_secs(),
        "Periodic sweep task started"
    );

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                // A dropped sender also means shutdown.
                if changed.is_err() || *shutdown_rx.borrow() {
                    tracing::info!("Periodic sweep task shutting down");
                    break;
                }
            }

            _ = sweep_interval.tick() => {
                sweep_once(&dispatcher, &metrics).await;
            }
        }
    }

    let snapshot = metrics.snapshot();
    tracing::info!(
        cycles = snapshot.cycles,
        cities_scheduled = snapshot.cities_scheduled,
        errors = snapshot.errors,
        "Periodic sweep task completed"
    );

    metrics
}

/// Run one sweep cycle: schedule a background refresh for every active city.
pub async fn sweep_once(dispatcher: &RefreshDispatcher, metrics: &PeriodicSweepMetrics) {
    let cities = match dispatcher.store().active_cities().await {
        Ok(cities) => cities,
        Err(e) => {
            tracing::error!(error = %e, "Failed to list active cities");
            metrics.errors.fetch_add(1, Ordering::Relaxed);
            metrics.cycles.fetch_add(1, Ordering::Relaxed);
            return;
        }
    };

    let mut scheduled = 0u64;
    for city in &cities {
        if dispatcher.schedule_refresh(city) {
            scheduled += 1;
        } else {
            metrics.errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    metrics
        .cities_scheduled
        .fetch_add(scheduled, Ordering::Relaxed);
    metrics.cycles.fetch_add(1, Ordering::Relaxed);

    tracing::info!(
        active = cities.len(),
        scheduled,
        "Periodic sweep scheduled background refreshes"
    );
}
