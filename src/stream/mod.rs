//! Stream subscription modules.
//!
//! - `client`: fans subscribers for several streams into one subscription.
//! - `framing`: turns chunked response bodies into events.
//! - `status`: per-stream connection state snapshots.
//! - `subscriber`: chunked GET, reconnect, and backoff for one stream.
//! - `subscription`: blocking pull handle with idle-timeout markers.

/// Subscription multiplexer.
pub mod client;
/// Chunk and newline framing.
pub mod framing;
/// Connection state reporting.
pub mod status;
/// Per-stream connection worker.
pub mod subscriber;
/// Consumer-facing delivery handle.
pub mod subscription;
