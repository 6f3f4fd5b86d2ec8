//! Poppin API - HTTP surface of the nearby-events cache
//!
//! Exposes the refresh engine from `poppin-storage` over REST (Axum), runs
//! the periodic sweep job, and wires the binary's collaborators together.

pub mod config;
pub mod constants;
pub mod error;
pub mod jobs;
pub mod macros;
pub mod routes;
pub mod state;
pub mod telemetry;

// Re-export commonly used types
pub use config::{ServiceConfig, StoreBackend};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use routes::create_api_router;
pub use state::{AppState, LookupSettings};
