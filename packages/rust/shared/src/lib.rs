//! Shared types, error model, and configuration for tabreport.
//!
//! This crate is the foundation depended on by all other tabreport crates.
//! It provides:
//! - [`TabreportError`] — the unified error type
//! - Domain types ([`CanonicalRecord`], [`WireRequest`], [`WireResponse`],
//!   [`EnrichmentData`], [`WebhookNotification`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BucketConfig, DocumentConfig, EnrichmentConfig, MapperConfig, PollerConfig,
    WebhookConfig, WireConfig, config_dir, config_file_path, init_config, load_config,
    load_config_from, resolve_store_key,
};
pub use error::{Result, TabreportError};
pub use types::{
    CanonicalRecord, EnrichmentData, NUMERIC_SENTINEL, SENTINEL, WebhookNotification,
    WireRequest, WireResponse, WireStatus,
};
