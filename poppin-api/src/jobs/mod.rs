//! Background Jobs for the Poppin API
//!
//! - `periodic_sweep`: schedules background refreshes for every active city
//!
//! # Usage
//!
//! ```ignore
//! use poppin_api::jobs::{periodic_sweep_task, PeriodicSweepConfig};
//! use tokio::sync::watch;
//!
//! let (shutdown_tx, shutdown_rx) = watch::channel(false);
//! tokio::spawn(periodic_sweep_task(dispatcher.clone(), PeriodicSweepConfig::default(), shutdown_rx));
//!
//! // On shutdown
//! let _ = shutdown_tx.send(true);
//! ```

pub mod periodic_sweep;

pub use periodic_sweep::{
    periodic_sweep_task, sweep_once, PeriodicSweepConfig, PeriodicSweepMetrics,
    PeriodicSweepSnapshot,
};
