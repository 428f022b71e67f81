//! Length-prefixed JSON transport between the poller and the document service.
//!
//! This crate provides:
//! - [`frame`] — the 4-byte big-endian length framing shared by both ends
//! - [`WireClient`] — submit one request, await the single response
//! - [`serve`] — accept loop that hands decoded requests to an async handler

pub mod frame;

mod client;
mod server;

pub use client::WireClient;
pub use server::serve;
