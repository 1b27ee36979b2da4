//! Subscription multiplexer.
//!
//! [`StreamClient`] fans N stream subscribers into one delivery queue. All
//! subscribers of one call share a cancellation token owned by the returned
//! [`Subscription`].

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::ClientConfig;
use crate::retry::BackoffPolicy;
use crate::stream::framing::Framing;
use crate::stream::status::{StatusBoard, StreamProbe};
use crate::stream::subscriber::StreamSubscriber;
use crate::stream::subscription::Subscription;

/// Entry point for creating stream subscriptions.
#[derive(Clone, Debug)]
pub struct StreamClient {
    http: Client,
    config: ClientConfig,
    backoff: Arc<dyn BackoffPolicy>,
}

impl StreamClient {
    /// Creates a stream client sharing an existing HTTP connection pool.
    pub fn new(http: Client, config: &ClientConfig) -> Self {
        Self {
            http,
            backoff: config.backoff_policy(),
            config: config.clone(),
        }
    }

    pub fn framing(&self) -> Framing {
        self.config.framing
    }

    /// Spawns one subscriber per distinct stream name on `runtime`.
    ///
    /// Duplicate names collapse into a single subscriber. Subscribing to no
    /// streams returns a subscription that ends immediately.
    pub fn subscribe_on<I, S>(
        &self,
        runtime: &Handle,
        streams: I,
        idle_timeout: Option<Duration>,
    ) -> Subscription
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: BTreeSet<String> = streams.into_iter().map(Into::into).collect();
        let (deliveries, receiver) = crossbeam_channel::unbounded();
        let cancel = CancellationToken::new();
        let mut probes = BTreeMap::new();

        for name in names {
            let probe = Arc::new(StreamProbe::default());
            probes.insert(name.clone(), Arc::clone(&probe));

            let subscriber = StreamSubscriber {
                url: self.config.stream_url(&name),
                stream: name,
                http: self.http.clone(),
                backoff: Arc::clone(&self.backoff),
                framing: self.config.framing,
                deliveries: deliveries.clone(),
                probe,
                cancel: cancel.child_token(),
            };
            runtime.spawn(subscriber.run());
        }

        debug!(
            event = "subscription_started",
            streams = probes.len(),
            idle_timeout_ms = idle_timeout.map(|d| d.as_millis() as u64)
        );
        Subscription::new(receiver, idle_timeout, cancel, StatusBoard::new(probes))
    }
}
