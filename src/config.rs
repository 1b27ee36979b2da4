//! Client configuration.

use std::sync::Arc;
use std::time::Duration;

use crate::retry::{BackoffPolicy, FixedBackoff, RetryPolicy};
use crate::stream::framing::Framing;

/// Local development endpoint of the YakAPI service.
pub const LOCAL_BASE_URL: &str = "http://localhost:8080";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ClientDefaults;

impl ClientDefaults {
    pub const MAX_RETRIES: u32 = 5;
    pub const RETRY_DELAY: Duration = Duration::from_secs(5);
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
    pub const PUBLISH_TIMEOUT: Duration = Duration::from_secs(30);
    pub const USER_AGENT: &'static str =
        concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
}

/// Settings shared by every subscription and publish issued by a client.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Service root, without the `/v1/stream` path.
    pub base_url: String,
    /// Failed connection attempts tolerated per stream before it terminates.
    pub max_retries: u32,
    /// Delay between stream reconnect attempts.
    pub retry_delay: Duration,
    /// Default idle timeout applied by [`crate::Client::subscribe`].
    pub idle_timeout: Option<Duration>,
    /// `User-Agent` header sent with every request.
    pub user_agent: String,
    pub connect_timeout: Duration,
    /// Whole-request timeout for a single publish attempt.
    pub publish_timeout: Duration,
    /// How response bodies are split into events.
    pub framing: Framing,
    /// Transport-level retry for publish. `None` means a single attempt.
    pub publish_retry: Option<RetryPolicy>,
    /// Replaces the fixed reconnect schedule derived from `max_retries` and
    /// `retry_delay`.
    pub backoff: Option<Arc<dyn BackoffPolicy>>,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: normalize_base_url(&base_url.into()),
            max_retries: ClientDefaults::MAX_RETRIES,
            retry_delay: ClientDefaults::RETRY_DELAY,
            idle_timeout: None,
            user_agent: ClientDefaults::USER_AGENT.to_string(),
            connect_timeout: ClientDefaults::CONNECT_TIMEOUT,
            publish_timeout: ClientDefaults::PUBLISH_TIMEOUT,
            framing: Framing::default(),
            publish_retry: None,
            backoff: None,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Idle window after which subscriptions yield a timeout marker. Zero
    /// disables markers.
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = Some(idle_timeout);
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    pub fn with_publish_timeout(mut self, publish_timeout: Duration) -> Self {
        self.publish_timeout = publish_timeout;
        self
    }

    pub fn with_framing(mut self, framing: Framing) -> Self {
        self.framing = framing;
        self
    }

    /// Enables bounded transport-level retry for publish.
    ///
    /// Only timeouts, connect failures, `429`, and `5xx` responses are retried.
    pub fn with_publish_retry(mut self, policy: RetryPolicy) -> Self {
        self.publish_retry = Some(policy);
        self
    }

    pub fn with_backoff(mut self, backoff: Arc<dyn BackoffPolicy>) -> Self {
        self.backoff = Some(backoff);
        self
    }

    /// Reconnect policy used by stream subscribers.
    pub fn backoff_policy(&self) -> Arc<dyn BackoffPolicy> {
        match &self.backoff {
            Some(policy) => Arc::clone(policy),
            None => Arc::new(FixedBackoff {
                max_retries: self.max_retries,
                delay: self.retry_delay,
            }),
        }
    }

    /// Full URL of a named stream.
    pub fn stream_url(&self, stream: &str) -> String {
        stream_url(&self.base_url, stream)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(LOCAL_BASE_URL)
    }
}

/// Builds the HTTP client shared by subscribers and the publisher.
///
/// No overall request timeout is set: stream responses stay open
/// indefinitely. Publish attempts apply their own per-request timeout.
pub fn build_http_client(config: &ClientConfig) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .no_proxy()
        .user_agent(config.user_agent.clone())
        .connect_timeout(config.connect_timeout)
        .build()
}

/// URL of the stream endpoint under an already normalized base URL. Shared
/// by subscribers and the publisher.
pub(crate) fn stream_url(base_url: &str, stream: &str) -> String {
    format!("{base_url}/v1/stream/{stream}")
}

fn normalize_base_url(base_url: &str) -> String {
    base_url.trim().trim_end_matches('/').to_string()
}
