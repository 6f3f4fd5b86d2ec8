//! Cache freshness and refresh-dispatch engine.
//!
//! A lookup for a partition goes through [`RefreshDispatcher::resolve`],
//! which reads the stored records, classifies them with [`classify`], and
//! then either serves them, refreshes synchronously through
//! [`ContentIngestor`], or serves them stale while a [`BackgroundTrigger`]
//! message asks a [`RefreshConsumer`] to run a [`CleanSweepReplacer`].
//!
//! # Example
//!
//! ```ignore
//! let (trigger, receiver) = InProcessTrigger::channel("fetch-events");
//! let dispatcher = RefreshDispatcher::new(store.clone(), provider.clone(), Arc::new(trigger));
//!
//! let sweeper = CleanSweepReplacer::new(ContentIngestor::new(store));
//! tokio::spawn(Arc::new(RefreshConsumer::new(sweeper, provider)).run(receiver));
//!
//! let resolution = dispatcher.resolve("Braunschweig", false).await?;
//! ```

pub mod consumer;
pub mod dispatcher;
pub mod freshness;
pub mod ingest;
pub mod sweep;
pub mod trigger;

pub use consumer::{ConsumerStats, RefreshConsumer};
pub use dispatcher::{RefreshDispatcher, RefreshPath, Resolution};
pub use freshness::{classify, classify_at, Freshness, StaleReason};
pub use ingest::ContentIngestor;
pub use sweep::{CleanSweepReplacer, SweepReport};
pub use trigger::{BackgroundTrigger, ChannelGuard, ChannelStatus, InProcessTrigger, RefreshMessage};
