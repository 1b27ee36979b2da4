//! Blocking pull handle over a multiplexed subscription.
//!
//! Subscribers running on the background executor push into one shared
//! unbounded queue. The consumer pulls from it on its own thread; when an idle
//! timeout is configured, a [`Delivery::Timeout`] is synthesized whenever
//! nothing arrived within that window since the previous item. A zero idle
//! timeout disables markers, the same as `None`.

use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use tokio_util::sync::CancellationToken;

use crate::event::Event;
use crate::stream::status::{StatusBoard, StreamStatus};

/// Stream name reported for synthesized idle markers.
pub const TIMEOUT_STREAM: &str = "timeout";
/// Message carried by synthesized idle markers.
pub const TIMEOUT_MESSAGE: &str = "Timeout occurred";

/// One item pulled from a subscription.
#[derive(Clone, Debug, PartialEq)]
pub enum Delivery {
    /// An event received on one of the subscribed streams.
    Event(Event),
    /// Nothing arrived within the idle timeout.
    Timeout { message: String },
    /// The named stream exhausted its retries and will produce nothing more.
    StreamTerminated { stream: String },
}

impl Delivery {
    /// Stream the item is attributed to; `"timeout"` for idle markers.
    pub fn stream(&self) -> &str {
        match self {
            Self::Event(event) => event.stream(),
            Self::Timeout { .. } => TIMEOUT_STREAM,
            Self::StreamTerminated { stream } => stream,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    pub fn as_event(&self) -> Option<&Event> {
        match self {
            Self::Event(event) => Some(event),
            _ => None,
        }
    }

    pub fn into_event(self) -> Option<Event> {
        match self {
            Self::Event(event) => Some(event),
            _ => None,
        }
    }
}

/// Consumer side of a subscription.
///
/// Iterating yields deliveries until every subscriber has exited. Dropping or
/// [closing](Subscription::close) the handle cancels the subscribers; a new
/// subscription starts over with fresh retry counters.
#[derive(Debug)]
pub struct Subscription {
    receiver: Receiver<Delivery>,
    idle_timeout: Option<Duration>,
    last_delivery: Instant,
    cancel: CancellationToken,
    status: StatusBoard,
}

impl Subscription {
    pub(crate) fn new(
        receiver: Receiver<Delivery>,
        idle_timeout: Option<Duration>,
        cancel: CancellationToken,
        status: StatusBoard,
    ) -> Self {
        Self {
            receiver,
            idle_timeout: idle_timeout.filter(|idle| !idle.is_zero()),
            last_delivery: Instant::now(),
            cancel,
            status,
        }
    }

    /// Blocks until the next delivery.
    ///
    /// Returns `None` once all subscribers have exited and the queue is
    /// drained.
    pub fn recv(&mut self) -> Option<Delivery> {
        let deadline = self
            .idle_timeout
            .and_then(|idle| self.last_delivery.checked_add(idle));
        let delivery = match deadline {
            None => self.receiver.recv().ok()?,
            Some(deadline) => match self.receiver.recv_deadline(deadline) {
                Ok(delivery) => delivery,
                Err(RecvTimeoutError::Timeout) => Delivery::Timeout {
                    message: TIMEOUT_MESSAGE.to_string(),
                },
                Err(RecvTimeoutError::Disconnected) => return None,
            },
        };
        self.last_delivery = Instant::now();
        Some(delivery)
    }

    /// Returns a queued delivery without blocking.
    ///
    /// Idle markers are never synthesized here.
    pub fn try_recv(&mut self) -> Result<Delivery, TryRecvError> {
        let delivery = self.receiver.try_recv()?;
        self.last_delivery = Instant::now();
        Ok(delivery)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout
    }

    /// Current status of one subscribed stream.
    pub fn status(&self, stream: &str) -> Option<StreamStatus> {
        self.status.get(stream)
    }

    /// Shareable status view that outlives this handle.
    pub fn status_board(&self) -> StatusBoard {
        self.status.clone()
    }

    /// Cancels every subscriber of this subscription.
    pub fn close(self) {}
}

impl Iterator for Subscription {
    type Item = Delivery;

    fn next(&mut self) -> Option<Self::Item> {
        self.recv()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
