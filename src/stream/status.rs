//! Per-stream connection state.
//!
//! A subscriber is the only writer of its probe; consumers read snapshots
//! through a [`StatusBoard`].

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Lifecycle of one stream subscription.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamState {
    /// Issuing the GET and waiting for response headers.
    Connecting,
    /// Headers received; reading chunks.
    Streaming,
    /// Waiting out the backoff delay after a failure.
    BackingOff,
    /// Gave up or was cancelled. No further events.
    Terminated,
}

impl StreamState {
    fn as_u8(self) -> u8 {
        match self {
            Self::Connecting => 0,
            Self::Streaming => 1,
            Self::BackingOff => 2,
            Self::Terminated => 3,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Connecting,
            1 => Self::Streaming,
            2 => Self::BackingOff,
            _ => Self::Terminated,
        }
    }
}

/// Point-in-time view of a subscriber.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct StreamStatus {
    pub state: StreamState,
    /// Consecutive failures counted against the backoff policy.
    pub retry_count: u32,
    /// Connection attempts issued so far, including the first.
    pub attempts: u32,
}

#[derive(Debug)]
pub(crate) struct StreamProbe {
    state: AtomicU8,
    retry_count: AtomicU32,
    attempts: AtomicU32,
}

impl Default for StreamProbe {
    fn default() -> Self {
        Self {
            state: AtomicU8::new(StreamState::Connecting.as_u8()),
            retry_count: AtomicU32::new(0),
            attempts: AtomicU32::new(0),
        }
    }
}

impl StreamProbe {
    pub(crate) fn set_state(&self, state: StreamState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    pub(crate) fn set_retry_count(&self, retry_count: u32) {
        self.retry_count.store(retry_count, Ordering::Release);
    }

    /// Records a new connection attempt and returns its 1-based number.
    pub(crate) fn begin_attempt(&self) -> u32 {
        self.attempts.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub(crate) fn snapshot(&self) -> StreamStatus {
        StreamStatus {
            state: StreamState::from_u8(self.state.load(Ordering::Acquire)),
            retry_count: self.retry_count.load(Ordering::Acquire),
            attempts: self.attempts.load(Ordering::Acquire),
        }
    }
}

/// Read-only view over the subscribers of one subscription.
///
/// Cloning is cheap and the board stays readable after the subscription is
/// closed.
#[derive(Clone, Debug, Default)]
pub struct StatusBoard {
    probes: Arc<BTreeMap<String, Arc<StreamProbe>>>,
}

impl StatusBoard {
    pub(crate) fn new(probes: BTreeMap<String, Arc<StreamProbe>>) -> Self {
        Self {
            probes: Arc::new(probes),
        }
    }

    /// Status of one stream, if it belongs to this subscription.
    pub fn get(&self, stream: &str) -> Option<StreamStatus> {
        self.probes.get(stream).map(|probe| probe.snapshot())
    }

    /// Stream names in sorted order.
    pub fn streams(&self) -> impl Iterator<Item = &str> {
        self.probes.keys().map(String::as_str)
    }

    pub fn snapshot(&self) -> BTreeMap<String, StreamStatus> {
        self.probes
            .iter()
            .map(|(name, probe)| (name.clone(), probe.snapshot()))
            .collect()
    }

    /// True once every subscriber has reached [`StreamState::Terminated`].
    pub fn all_terminated(&self) -> bool {
        self.probes
            .values()
            .all(|probe| probe.snapshot().state == StreamState::Terminated)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use super::{StatusBoard, StreamProbe, StreamState};

    #[test]
    fn probe_starts_connecting_with_no_attempts() {
        let status = StreamProbe::default().snapshot();
        assert_eq!(status.state, StreamState::Connecting);
        assert_eq!(status.retry_count, 0);
        assert_eq!(status.attempts, 0);
    }

    #[test]
    fn probe_tracks_updates() {
        let probe = StreamProbe::default();
        assert_eq!(probe.begin_attempt(), 1);
        assert_eq!(probe.begin_attempt(), 2);
        probe.set_retry_count(1);
        probe.set_state(StreamState::BackingOff);

        let status = probe.snapshot();
        assert_eq!(status.state, StreamState::BackingOff);
        assert_eq!(status.retry_count, 1);
        assert_eq!(status.attempts, 2);
    }

    #[test]
    fn board_reports_termination_of_all_streams() {
        let a = Arc::new(StreamProbe::default());
        let b = Arc::new(StreamProbe::default());
        let board = StatusBoard::new(BTreeMap::from([
            ("a".to_string(), Arc::clone(&a)),
            ("b".to_string(), Arc::clone(&b)),
        ]));

        a.set_state(StreamState::Terminated);
        assert!(!board.all_terminated());
        b.set_state(StreamState::Terminated);
        assert!(board.all_terminated());
        assert_eq!(board.streams().collect::<Vec<_>>(), vec!["a", "b"]);
        assert!(board.get("missing").is_none());
    }

    #[test]
    fn state_serializes_snake_case() {
        let text = serde_json::to_string(&StreamState::BackingOff).expect("serialize");
        assert_eq!(text, "\"backing_off\"");
    }
}
