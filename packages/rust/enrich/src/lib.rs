//! Best-effort entity enrichment against an external lookup service.
//!
//! This crate provides:
//! - [`normalize`] — entity-name normalization and alias resolution
//! - [`EnrichmentCache`] — the shared, injectable lookup cache
//! - [`EnrichmentClient`] — remote lookup with retry and deterministic fallback

mod cache;
mod client;
pub mod normalize;

pub use cache::{CacheStats, EnrichmentCache};
pub use client::EnrichmentClient;
pub use normalize::normalize;
