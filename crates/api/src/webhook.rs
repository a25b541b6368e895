//! Webhook receiver client
//!
//! The webhook destination forwards events to a request-bin style
//! receiver. Its request log is the out-of-band view of delivery, used to
//! cross-check what the console UI reports.

use serde_json::Value;
use tracing::debug;

use pipecheck_common::{Error, EventCounts, PollOutcome, Poller, Result};

/// One request logged by the receiver
#[derive(Debug, Clone)]
pub struct ReceivedEvent {
    /// Status the receiver answered with; 200 counts as delivered
    pub status_code: u16,
    pub method: Option<String>,
    pub received_at: Option<String>,
    pub body: Option<Value>,
}

/// Client for the receiver's request log
pub struct WebhookProbe {
    client: reqwest::Client,
    url: String,
}

impl WebhookProbe {
    pub fn new(url: impl Into<String>, timeout: std::time::Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Fetch the most recent logged requests
    pub async fn fetch_events(&self, limit: usize) -> Result<Vec<ReceivedEvent>> {
        let url = format!("{}/requests", self.url);
        let response = self
            .client
            .get(&url)
            .query(&[("limit", limit.to_string())])
            .send()
            .await?
            .error_for_status()?;

        let body: Value = response.json().await?;
        let entries = match &body {
            // Receivers differ: some wrap the log in {"data": [...]},
            // others return a bare array.
            Value::Object(map) => map.get("data").and_then(Value::as_array).cloned(),
            Value::Array(entries) => Some(entries.clone()),
            _ => None,
        }
        .ok_or_else(|| Error::Scrape(format!("unrecognized request log shape from {}", url)))?;

        let events = entries.iter().map(parse_entry).collect::<Vec<_>>();
        debug!(count = events.len(), "fetched receiver request log");
        Ok(events)
    }

    /// Delivery counters derived from the request log
    pub async fn stats(&self) -> Result<EventCounts> {
        let events = self.fetch_events(100).await?;
        Ok(EventCounts::from_statuses(
            events.iter().map(|e| e.status_code.to_string()),
        ))
    }

    /// Poll the request log until it holds at least `minimum` entries
    pub async fn await_events(
        &self,
        minimum: u64,
        poller: &Poller,
    ) -> PollOutcome<EventCounts, Error> {
        poller
            .run(|| self.stats(), |counts| counts.total >= minimum)
            .await
    }
}

fn parse_entry(entry: &Value) -> ReceivedEvent {
    let status_code = entry
        .get("status_code")
        .or_else(|| entry.get("status"))
        .and_then(Value::as_u64)
        .unwrap_or(200) as u16;

    ReceivedEvent {
        status_code,
        method: entry
            .get("method")
            .and_then(Value::as_str)
            .map(str::to_string),
        received_at: entry
            .get("created_at")
            .or_else(|| entry.get("received_at"))
            .and_then(Value::as_str)
            .map(str::to_string),
        body: entry.get("content").or_else(|| entry.get("body")).cloned(),
    }
}
