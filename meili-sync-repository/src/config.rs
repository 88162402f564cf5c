//! Configuration types for the search engine client.

use std::time::Duration;

/// Default Meilisearch URL.
pub const DEFAULT_URL: &str = "http://localhost:7700";

/// Configuration for the Meilisearch client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the Meilisearch instance.
    pub url: String,
    /// API key sent as a bearer token. `None` for unprotected instances.
    pub api_key: Option<String>,
    /// Timeout applied to every HTTP request.
    pub request_timeout: Duration,
    /// Delay between two polls while waiting for a task.
    pub task_poll_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            api_key: None,
            request_timeout: Duration::from_secs(30),
            task_poll_interval: Duration::from_millis(50),
        }
    }
}

impl ClientConfig {
    /// Create a config for the given URL with default timeouts.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Set the API key.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the task poll interval.
    pub fn with_task_poll_interval(mut self, interval: Duration) -> Self {
        self.task_poll_interval = interval;
        self
    }
}
