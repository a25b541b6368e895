//! Event ingestion client
//!
//! Sends tracking events to the data plane extracted from the console UI.
//! Transport failures and retryable statuses are retried on a linear
//! schedule; the final verdict is always a [`SendOutcome`], never a panic,
//! so negative-path scenarios can assert on failed sends.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use pipecheck_common::config::ApiSettings;
use pipecheck_common::{Result, TrackEvent};

/// Statuses worth retrying: rate limiting and transient server errors
pub const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Linear retry schedule
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub attempts: u32,

    /// Backoff factor; the delay after failed attempt `n` is `backoff * n`
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn from_settings(settings: &ApiSettings) -> Self {
        Self {
            attempts: settings.retry_attempts.max(1),
            backoff: Duration::from_secs(settings.retry_backoff_secs),
        }
    }

    /// Delay to wait after the 1-based attempt `attempt` failed
    pub fn delay_after_attempt(&self, attempt: u32) -> Duration {
        self.backoff * attempt
    }
}

/// Structured verdict of a send
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendOutcome {
    pub success: bool,
    pub status_code: Option<u16>,
    pub error: Option<String>,

    /// Message id attached to the payload, for log correlation
    pub event_id: Option<String>,

    /// HTTP attempts actually made
    pub attempts: u32,
}

impl SendOutcome {
    fn rejected(reason: String) -> Self {
        Self {
            success: false,
            status_code: None,
            error: Some(reason),
            event_id: None,
            attempts: 0,
        }
    }
}

/// Client for the `/v1/track` ingestion endpoint
pub struct IngestClient {
    client: reqwest::Client,
    data_plane_url: String,
    write_key: String,
    retry: RetryPolicy,
}

impl IngestClient {
    pub fn new(
        data_plane_url: impl Into<String>,
        write_key: impl Into<String>,
        settings: &ApiSettings,
    ) -> Result<Self> {
        // The data plane URL is scraped from the console UI, not typed
        // by an operator.
        let data_plane_url = data_plane_url.into();
        url::Url::parse(&data_plane_url)?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            data_plane_url: data_plane_url.trim_end_matches('/').to_string(),
            write_key: write_key.into(),
            retry: RetryPolicy::from_settings(settings),
        })
    }

    pub fn track_url(&self) -> String {
        format!("{}/v1/track", self.data_plane_url)
    }

    /// HTTP Basic credential: write key as username, empty password
    fn auth_header(&self) -> String {
        format!("Basic {}", STANDARD.encode(format!("{}:", self.write_key)))
    }

    /// Send one event, retrying transient failures
    pub async fn send_event(&self, event: &TrackEvent) -> SendOutcome {
        if let Err(e) = event.validate() {
            return SendOutcome::rejected(e.to_string());
        }

        let event_id = Uuid::new_v4().to_string();
        let mut payload = match serde_json::to_value(event) {
            Ok(serde_json::Value::Object(map)) => map,
            Ok(_) | Err(_) => {
                return SendOutcome::rejected("event did not serialize to an object".to_string())
            }
        };
        payload.insert("messageId".to_string(), event_id.clone().into());

        let url = self.track_url();
        let mut last_status: Option<u16> = None;
        let mut last_error: Option<String> = None;

        for attempt in 1..=self.retry.attempts {
            let response = self
                .client
                .post(&url)
                .header(reqwest::header::AUTHORIZATION, self.auth_header())
                .json(&payload)
                .send()
                .await;

            match response {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if resp.status().is_success() {
                        debug!(event = %event.event, status, attempt, "event accepted");
                        return SendOutcome {
                            success: true,
                            status_code: Some(status),
                            error: None,
                            event_id: Some(event_id),
                            attempts: attempt,
                        };
                    }

                    let body = resp.text().await.unwrap_or_default();
                    let snippet: String = body.chars().take(200).collect();
                    last_status = Some(status);
                    last_error = Some(format!("status {}: {}", status, snippet));

                    if !RETRYABLE_STATUSES.contains(&status) {
                        warn!(event = %event.event, status, "rejected by ingestion endpoint");
                        return SendOutcome {
                            success: false,
                            status_code: Some(status),
                            error: last_error,
                            event_id: Some(event_id),
                            attempts: attempt,
                        };
                    }
                    warn!(
                        event = %event.event,
                        status,
                        attempt,
                        max_attempts = self.retry.attempts,
                        "retryable status from ingestion endpoint"
                    );
                }
                Err(e) => {
                    last_error = Some(e.to_string());
                    warn!(
                        event = %event.event,
                        attempt,
                        max_attempts = self.retry.attempts,
                        error = %e,
                        "send failed"
                    );
                }
            }

            if attempt < self.retry.attempts {
                let delay = self.retry.delay_after_attempt(attempt);
                if !delay.is_zero() {
                    debug!(delay_ms = delay.as_millis() as u64, "backing off before retry");
                    tokio::time::sleep(delay).await;
                }
            }
        }

        SendOutcome {
            success: false,
            status_code: last_status,
            error: last_error,
            event_id: Some(event_id),
            attempts: self.retry.attempts,
        }
    }

    /// Send events one at a time, preserving order
    pub async fn send_batch(&self, events: &[TrackEvent]) -> Vec<SendOutcome> {
        let mut outcomes = Vec::with_capacity(events.len());
        for event in events {
            outcomes.push(self.send_event(event).await);
        }
        outcomes
    }
}
