use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::config::{build_http_client, stream_url, ClientConfig};
use crate::event::{Event, Payload};
use crate::retry::{retry_async, RetryPolicy};

const ERROR_BODY_SNIPPET_LEN: usize = 220;

/// Posts events to named streams.
///
/// Cloning is cheap; clones share the HTTP connection pool and may publish
/// concurrently.
#[derive(Clone, Debug)]
pub struct Publisher {
    http: Client,
    base_url: String,
    attempt_timeout: Duration,
    retry_policy: Option<RetryPolicy>,
}

impl Publisher {
    pub fn new(http: Client, config: &ClientConfig) -> Self {
        Self {
            http,
            base_url: config.base_url.clone(),
            attempt_timeout: config.publish_timeout,
            retry_policy: config.publish_retry.clone(),
        }
    }

    /// Builds a publisher with its own HTTP client.
    pub fn from_config(config: &ClientConfig) -> Result<Self, PublishError> {
        let http = build_http_client(config).map_err(PublishError::Transport)?;
        Ok(Self::new(http, config))
    }

    /// Publishes one event and returns it as transmitted.
    ///
    /// Structured objects without an `id` get one before sending. Any non-2xx
    /// response fails the call; retries only happen when a transport retry
    /// policy is configured.
    pub async fn publish(
        &self,
        stream: &str,
        payload: impl Into<Payload>,
    ) -> Result<Event, PublishError> {
        let payload = payload.into().with_assigned_id();
        let body = payload.to_body().map_err(PublishError::Encode)?;
        let content_type = payload.content_type();
        let endpoint = self.endpoint(stream);

        match &self.retry_policy {
            None => self.send_attempt(&endpoint, content_type, body).await?,
            Some(policy) => {
                retry_async(
                    policy,
                    |_| {
                        let endpoint = endpoint.clone();
                        let body = body.clone();
                        async move { self.send_attempt(&endpoint, content_type, body).await }
                    },
                    PublishError::is_retryable,
                )
                .await?
            }
        }

        debug!(event = "event_published", stream, id = payload.id());
        Ok(Event::new(stream, payload))
    }

    fn endpoint(&self, stream: &str) -> String {
        stream_url(&self.base_url, stream)
    }

    async fn send_attempt(
        &self,
        endpoint: &str,
        content_type: &'static str,
        body: Vec<u8>,
    ) -> Result<(), PublishError> {
        let response = self
            .http
            .post(endpoint)
            .timeout(self.attempt_timeout)
            .header(CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await
            .map_err(PublishError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::HttpStatus {
                status,
                body: summarize_error_body(&body),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("request failed: {0}")]
    Transport(reqwest::Error),

    #[error("http status {status}: {body}")]
    HttpStatus { status: StatusCode, body: String },

    #[error("failed to encode payload: {0}")]
    Encode(serde_json::Error),
}

impl PublishError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(err) => err.is_timeout() || err.is_connect(),
            Self::HttpStatus { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            Self::Encode(_) => false,
        }
    }

    /// HTTP status returned by the service, if the request got that far.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            Self::Transport(err) => err.status(),
            Self::Encode(_) => None,
        }
    }
}

fn summarize_error_body(body: &str) -> String {
    #[derive(Debug, Deserialize)]
    struct ErrorBody {
        #[serde(default)]
        error: Option<String>,
        #[serde(default)]
        message: Option<String>,
    }

    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        if let Some(message) = parsed.error.or(parsed.message) {
            return message;
        }
    }

    body.trim().chars().take(ERROR_BODY_SNIPPET_LEN).collect()
}
