//! Pipeline orchestration.
//!
//! This crate provides:
//! - [`DocumentService`] — build → validate → persist state machine behind
//!   the wire server
//! - [`Notifier`] — asynchronous terminal-status webhook delivery
//! - [`Poller`] — bucket monitoring loop feeding the wire client
//! - [`admin_router`] — cache admin and webhook-receiver HTTP surface

mod admin;
mod notify;
mod poller;
mod service;

pub use admin::admin_router;
pub use notify::Notifier;
pub use poller::Poller;
pub use service::DocumentService;
