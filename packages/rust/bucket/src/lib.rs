//! Object-store access and FIFO capacity management.
//!
//! This crate provides:
//! - [`ObjectStoreClient`] — thin HTTP client for the shared object store
//! - [`BucketFifoManager`] — consumption tracking and oldest-first eviction

mod fifo;
mod store;

pub use fifo::BucketFifoManager;
pub use store::{ObjectInfo, ObjectStoreClient};

/// File extension recognized by the pipeline.
pub const CSV_EXTENSION: &str = ".csv";
