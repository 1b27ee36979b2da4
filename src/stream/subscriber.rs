//! Per-stream subscriber worker.
//!
//! Each worker owns one long-lived `GET {base_url}/v1/stream/{name}` and walks
//! the connection state machine:
//!
//! ```text
//! Connecting --headers--> Streaming --chunk--> Streaming
//!     ^                       |
//!     |                 error / close
//!     |                       v
//!     +------delay------ BackingOff --give up--> Terminated
//! ```
//!
//! Cancellation moves the worker to `Terminated` from any state and drops the
//! in-flight response, which closes the connection.

use std::sync::Arc;

use crossbeam_channel::Sender;
use reqwest::{Client, Response, StatusCode};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use crate::event::{Event, Payload};
use crate::retry::{BackoffPolicy, RetryDecision};
use crate::stream::framing::{FrameDecoder, Framing};
use crate::stream::status::{StreamProbe, StreamState};
use crate::stream::subscription::Delivery;

/// Subscribe-side transport failures.
///
/// These never reach the consumer; they are logged and counted against the
/// backoff policy.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("http status {0}")]
    HttpStatus(StatusCode),

    #[error("stream closed by server")]
    Closed,
}

enum SessionOutcome {
    Failed(StreamError),
    ConsumerGone,
}

enum Exit {
    GaveUp,
    Cancelled,
    ConsumerGone,
}

struct TerminateOnDrop(Arc<StreamProbe>);

impl Drop for TerminateOnDrop {
    fn drop(&mut self) {
        self.0.set_state(StreamState::Terminated);
    }
}

pub(crate) struct StreamSubscriber {
    pub(crate) stream: String,
    pub(crate) url: String,
    pub(crate) http: Client,
    pub(crate) backoff: Arc<dyn BackoffPolicy>,
    pub(crate) framing: Framing,
    pub(crate) deliveries: Sender<Delivery>,
    pub(crate) probe: Arc<StreamProbe>,
    pub(crate) cancel: CancellationToken,
}

impl StreamSubscriber {
    pub(crate) async fn run(self) {
        // Executor shutdown drops this future mid-await.
        let _terminated = TerminateOnDrop(Arc::clone(&self.probe));
        let mut retry_count: u32 = 0;

        let exit = loop {
            self.probe.set_state(StreamState::Connecting);
            let attempt = self.probe.begin_attempt();
            debug!(event = "stream_connecting", stream = %self.stream, attempt);

            let mut delivered = 0usize;
            let outcome = tokio::select! {
                _ = self.cancel.cancelled() => break Exit::Cancelled,
                outcome = self.run_session(&mut delivered) => outcome,
            };

            let err = match outcome {
                SessionOutcome::ConsumerGone => break Exit::ConsumerGone,
                SessionOutcome::Failed(err) => err,
            };

            if delivered > 0 {
                retry_count = 0;
            }
            retry_count += 1;
            self.probe.set_retry_count(retry_count);
            error!(
                event = "stream_attempt_failed",
                stream = %self.stream,
                attempt,
                retry_count,
                error = %err
            );

            match self.backoff.decide(retry_count) {
                RetryDecision::GiveUp => {
                    error!(
                        event = "stream_retries_exhausted",
                        stream = %self.stream,
                        retry_count
                    );
                    break Exit::GaveUp;
                }
                RetryDecision::Retry(delay) => {
                    self.probe.set_state(StreamState::BackingOff);
                    info!(
                        event = "stream_retry_scheduled",
                        stream = %self.stream,
                        retry_count,
                        delay_ms = delay.as_millis() as u64
                    );
                    tokio::select! {
                        _ = self.cancel.cancelled() => break Exit::Cancelled,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        };

        self.probe.set_state(StreamState::Terminated);
        match exit {
            Exit::GaveUp => {
                let _ = self.deliveries.send(Delivery::StreamTerminated {
                    stream: self.stream.clone(),
                });
            }
            Exit::Cancelled => info!(event = "stream_cancelled", stream = %self.stream),
            Exit::ConsumerGone => debug!(event = "stream_consumer_gone", stream = %self.stream),
        }
    }

    async fn run_session(&self, delivered: &mut usize) -> SessionOutcome {
        let mut response = match self.connect().await {
            Ok(response) => response,
            Err(err) => return SessionOutcome::Failed(err),
        };
        self.probe.set_state(StreamState::Streaming);
        debug!(
            event = "stream_connected",
            stream = %self.stream,
            status = response.status().as_u16()
        );

        let mut decoder = FrameDecoder::new(self.framing);
        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    trace!(event = "stream_chunk_received", stream = %self.stream, len = chunk.len());
                    for payload in decoder.push(&chunk) {
                        if !self.deliver(payload, delivered) {
                            return SessionOutcome::ConsumerGone;
                        }
                    }
                }
                Ok(None) => {
                    if let Some(payload) = decoder.finish() {
                        if !self.deliver(payload, delivered) {
                            return SessionOutcome::ConsumerGone;
                        }
                    }
                    return SessionOutcome::Failed(StreamError::Closed);
                }
                Err(err) => return SessionOutcome::Failed(StreamError::Transport(err)),
            }
        }
    }

    async fn connect(&self) -> Result<Response, StreamError> {
        let response = self.http.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(StreamError::HttpStatus(status));
        }
        Ok(response)
    }

    fn deliver(&self, payload: Payload, delivered: &mut usize) -> bool {
        let event = Event::new(self.stream.clone(), payload);
        if self.deliveries.send(Delivery::Event(event)).is_err() {
            return false;
        }
        if *delivered == 0 {
            self.probe.set_retry_count(0);
        }
        *delivered += 1;
        true
    }
}
