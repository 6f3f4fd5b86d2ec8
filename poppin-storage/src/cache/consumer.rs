//! Consumer side of the background trigger.
//!
//! Every delivered message is an independent unit of work: it gets its own
//! task, and a failure in one never affects another. Failures are logged and
//! the message is dropped; redelivery is the trigger's business.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use poppin_core::{ContentDiscoveryProvider, PoppinResult};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use super::sweep::{CleanSweepReplacer, SweepReport};
use super::trigger::RefreshMessage;

/// Point-in-time view of consumer counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    pub received: u64,
    pub dropped: u64,
    pub completed: u64,
    pub failed: u64,
}

#[derive(Debug, Default)]
struct Counters {
    received: AtomicU64,
    dropped: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
}

/// Runs a clean sweep for every refresh request it receives.
pub struct RefreshConsumer {
    sweeper: CleanSweepReplacer,
    provider: Arc<dyn ContentDiscoveryProvider>,
    counters: Counters,
}

impl RefreshConsumer {
    pub fn new(sweeper: CleanSweepReplacer, provider: Arc<dyn ContentDiscoveryProvider>) -> Self {
        Self {
            sweeper,
            provider,
            counters: Counters::default(),
        }
    }

    pub fn stats(&self) -> ConsumerStats {
        ConsumerStats {
            received: self.counters.received.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }

    /// Handle one payload.
    ///
    /// Returns `Ok(None)` when the payload names no city; such messages are
    /// dropped without touching the store.
    pub async fn handle(&self, payload: &[u8]) -> PoppinResult<Option<SweepReport>> {
        self.counters.received.fetch_add(1, Ordering::Relaxed);

        let Some(message) = RefreshMessage::decode(payload) else {
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            warn!(
                payload = %String::from_utf8_lossy(payload),
                "Dropping refresh message without a city"
            );
            return Ok(None);
        };

        match self
            .sweeper
            .refresh_from(&message.city, self.provider.as_ref())
            .await
        {
            Ok(report) => {
                self.counters.completed.fetch_add(1, Ordering::Relaxed);
                Ok(Some(report))
            }
            Err(e) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    async fn process(&self, payload: Vec<u8>) {
        match self.handle(&payload).await {
            Ok(Some(report)) => info!(
                deleted = report.deleted,
                ingested = report.ingested,
                "Background refresh finished"
            ),
            Ok(None) => {}
            Err(e) if e.is_degradable() => {
                warn!(error = %e, "Background refresh produced no events")
            }
            Err(e) => error!(error = %e, "Background refresh failed; message dropped"),
        }
    }

    /// Drain `receiver` until every sender is gone, then wait for in-flight
    /// sweeps to finish.
    pub async fn run(self: Arc<Self>, mut receiver: mpsc::UnboundedReceiver<Vec<u8>>) {
        let mut in_flight = JoinSet::new();
        info!("Refresh consumer started");

        loop {
            tokio::select! {
                next = receiver.recv() => match next {
                    Some(payload) => {
                        let consumer = Arc::clone(&self);
                        in_flight.spawn(async move { consumer.process(payload).await });
                    }
                    None => break,
                },
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "Refresh task panicked");
                    }
                }
            }
        }

        while let Some(joined) = in_flight.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Refresh task panicked");
            }
        }
        info!(stats = ?self.stats(), "Refresh consumer stopped");
    }
}

impl std::fmt::Debug for RefreshConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshConsumer")
            .field("provider", &self.provider.name())
            .field("stats", &self.stats())
            .finish()
    }
}
