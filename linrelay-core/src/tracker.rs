//! Tracker API client
//!
//! The tracker is an external collaborator; the engine consumes exactly two
//! operations, expressed by [`TrackerClient`]. [`HttpTrackerClient`] is the
//! production implementation over the tracker's REST surface.

use std::future::Future;
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Serialize;

use crate::activity::{Activity, PlanItem};
use crate::config::TrackerConfig;
use crate::error::{Error, Result};

/// The two tracker writes the engine performs.
///
/// Both are rate-limited by the caller and failure-tolerant: the projector
/// logs errors and moves on.
pub trait TrackerClient {
    fn create_activity(&self, activity: &Activity) -> impl Future<Output = Result<()>>;

    fn update_session_plan(
        &self,
        session_id: &str,
        plan: &[PlanItem],
    ) -> impl Future<Output = Result<()>>;
}

/// HTTP client for the tracker's agent-session API
pub struct HttpTrackerClient {
    http_client: reqwest::Client,
    base_url: String,
    max_retries: usize,
}

impl HttpTrackerClient {
    /// Create a new client from configuration.
    ///
    /// Returns an error if the configuration is invalid or missing required
    /// fields.
    pub fn new(config: &TrackerConfig) -> Result<Self> {
        config.validate()?;

        let base_url = config
            .server_url
            .clone()
            .ok_or_else(|| Error::Config("tracker.server_url is required".to_string()))?
            .trim_end_matches('/')
            .to_string();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let api_key = config
            .resolved_api_key()
            .ok_or_else(|| Error::Config("tracker.api_key is required".to_string()))?;
        let auth_value = format!("Bearer {}", api_key);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth_value)
                .map_err(|e| Error::Config(format!("invalid api_key: {}", e)))?,
        );

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url,
            max_retries: config.max_retries,
        })
    }

    async fn post_json<T: Serialize + ?Sized>(&self, url: &str, body: &T) -> Result<()> {
        let response = self
            .http_client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Tracker(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown".to_string());
        Err(Error::Tracker(format!(
            "API error ({}): {}",
            status, error_text
        )))
    }

    /// Post with retry for transient failures (5xx, timeouts), exponential
    /// backoff. Retries run inside the single rate-limiter token the caller
    /// already acquired.
    async fn post_json_with_retry<T: Serialize + ?Sized>(&self, url: &str, body: &T) -> Result<()> {
        let mut last_error = None;
        let mut delay = Duration::from_millis(500);

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tracing::debug!(
                    url,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying tracker write"
                );
                tokio::time::sleep(delay).await;
                delay = std::cmp::min(delay * 2, Duration::from_secs(30));
            }

            match self.post_json(url, body).await {
                Ok(()) => return Ok(()),
                Err(e) if is_retryable_error(&e) => {
                    tracing::warn!(error = %e, "Transient tracker error");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| Error::Tracker("max retries exceeded".to_string())))
    }
}

impl TrackerClient for HttpTrackerClient {
    async fn create_activity(&self, activity: &Activity) -> Result<()> {
        let url = format!(
            "{}/sessions/{}/activities",
            self.base_url, activity.agent_session_id
        );
        self.post_json_with_retry(&url, activity).await
    }

    async fn update_session_plan(&self, session_id: &str, plan: &[PlanItem]) -> Result<()> {
        let url = format!("{}/sessions/{}/plan", self.base_url, session_id);
        let body = serde_json::json!({ "plan": plan });
        self.post_json_with_retry(&url, &body).await
    }
}

/// Check if an error is retryable (transient)
fn is_retryable_error(error: &Error) -> bool {
    match error {
        Error::Tracker(msg) => {
            // Retry on 5xx errors
            msg.contains("50") && (msg.contains("API error") || msg.contains("HTTP"))
                // Retry on network/timeout errors
                || msg.contains("timeout")
                || msg.contains("connection")
                || msg.contains("request failed")
        }
        _ => false,
    }
}
