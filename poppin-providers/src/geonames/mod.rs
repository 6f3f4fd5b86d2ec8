//! GeoNames reverse geocoding.

pub mod client;
pub mod types;

pub use client::{GeoNamesResolver, DEFAULT_BASE_URL};
