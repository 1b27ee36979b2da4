//! Blocking Rust client for YakAPI streams.
//!
//! The crate is organized by transport surface:
//! - `client`: synchronous facade used by robot programs.
//! - `stream`: chunked HTTP subscriptions, framing, and the pull handle.
//! - `publish`: HTTP publisher with automatic event ids.
//! - `executor`: background thread hosting every async operation.
//! - `retry`: backoff policies and transport retry utilities.

/// Synchronous client facade.
pub mod client;
/// Client configuration and defaults.
pub mod config;
/// Event and payload types.
pub mod event;
/// Dedicated background runtime and cross-thread handoff.
pub mod executor;
/// Stream publisher.
pub mod publish;
/// Backoff policies and retry helpers.
pub mod retry;
/// Stream subscriptions: subscriber workers, framing, and delivery.
pub mod stream;

pub use client::{Client, ClientError};
pub use config::{ClientConfig, ClientDefaults};
pub use event::{Event, Payload};
pub use stream::framing::Framing;
pub use stream::status::{StatusBoard, StreamState, StreamStatus};
pub use stream::subscription::{Delivery, Subscription};
