//! Gemini provider implementation
//!
//! This module provides grounded event discovery through the Gemini
//! `generateContent` API.

pub mod client;
pub mod discovery;
pub mod types;

pub use client::GeminiClient;
pub use discovery::{build_prompt, GeminiDiscoveryProvider, DEFAULT_MODEL};
