//! Poppin Providers - HTTP Collaborators
//!
//! Concrete implementations of the collaborator contracts in poppin-core:
//! - [`GeminiDiscoveryProvider`]: asks a Gemini model, grounded with Google
//!   Search, for upcoming events in a place
//! - [`GeoNamesResolver`]: reverse-geocodes coordinates to nearby cities

pub mod gemini;
pub mod geonames;

pub use gemini::{GeminiClient, GeminiDiscoveryProvider};
pub use geonames::GeoNamesResolver;
