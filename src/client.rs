//! Synchronous client facade.
//!
//! [`Client`] owns a [`BackgroundExecutor`] and hands every subscribe and
//! publish into it. The calling thread never runs async code: subscriptions
//! come back as blocking pull handles, and publish waits for the executor to
//! report the outcome.

use std::time::Duration;

use thiserror::Error;

use crate::config::{build_http_client, ClientConfig};
use crate::event::{Event, Payload};
use crate::executor::{BackgroundExecutor, ExecutorError};
use crate::publish::{PublishError, Publisher};
use crate::stream::client::StreamClient;
use crate::stream::subscription::Subscription;

/// Errors surfaced by the synchronous client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The HTTP client could not be built.
    #[error("failed to build http client: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Executor(#[from] ExecutorError),

    #[error(transparent)]
    Publish(#[from] PublishError),
}

/// YakAPI client with a blocking API.
///
/// Dropping the client (or calling [`Client::shutdown`]) stops the background
/// executor, which cancels every subscriber and ends all open subscriptions.
#[derive(Debug)]
pub struct Client {
    config: ClientConfig,
    streams: StreamClient,
    publisher: Publisher,
    executor: BackgroundExecutor,
}

impl Client {
    /// Creates a client for `base_url` with default settings.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_config(ClientConfig::new(base_url))
    }

    pub fn with_config(config: ClientConfig) -> Result<Self, ClientError> {
        let http = build_http_client(&config)?;
        let executor = BackgroundExecutor::start()?;

        Ok(Self {
            streams: StreamClient::new(http.clone(), &config),
            publisher: Publisher::new(http, &config),
            config,
            executor,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Subscribes to `streams` using the configured idle timeout.
    pub fn subscribe<I, S>(&self, streams: I) -> Subscription
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.streams
            .subscribe_on(self.executor.handle(), streams, self.config.idle_timeout)
    }

    /// Subscribes to `streams`, synthesizing a timeout marker whenever nothing
    /// arrives for `idle_timeout`. `Duration::ZERO` disables markers.
    pub fn subscribe_with_idle_timeout<I, S>(
        &self,
        streams: I,
        idle_timeout: Duration,
    ) -> Subscription
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.streams
            .subscribe_on(self.executor.handle(), streams, Some(idle_timeout))
    }

    /// Publishes one event, blocking until the service answers.
    ///
    /// Returns the event as transmitted, including any assigned id.
    pub fn publish(
        &self,
        stream: impl Into<String>,
        payload: impl Into<Payload>,
    ) -> Result<Event, ClientError> {
        let publisher = self.publisher.clone();
        let stream = stream.into();
        let payload = payload.into();
        let event = self
            .executor
            .run(async move { publisher.publish(&stream, payload).await })??;
        Ok(event)
    }

    /// Async publisher sharing this client's connection pool.
    pub fn publisher(&self) -> Publisher {
        self.publisher.clone()
    }

    /// Stops the background executor and waits for its thread to exit.
    pub fn shutdown(self) {
        self.executor.shutdown();
    }
}
