//! Tracking event model

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// A single tracking event in ingestion wire shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackEvent {
    /// Event name, e.g. `product_viewed`
    pub event: String,

    /// Originating user id
    #[serde(rename = "userId")]
    pub user_id: String,

    /// Free-form event properties
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub properties: Map<String, Value>,

    /// Client context (page, locale, screen, campaign)
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub context: Map<String, Value>,

    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

impl TrackEvent {
    /// Start building an event with the given name
    pub fn builder(event: impl Into<String>) -> EventBuilder {
        EventBuilder::new(event)
    }

    /// Check the event is sendable
    pub fn validate(&self) -> Result<()> {
        if self.event.trim().is_empty() {
            return Err(Error::InvalidEvent("event name is empty".to_string()));
        }
        if self.user_id.trim().is_empty() {
            return Err(Error::InvalidEvent("user id is empty".to_string()));
        }
        if self.timestamp <= 0 {
            return Err(Error::InvalidEvent(format!(
                "timestamp {} is not a positive epoch-millisecond value",
                self.timestamp
            )));
        }
        Ok(())
    }
}

/// Chainable builder for [`TrackEvent`]
#[derive(Debug, Clone)]
pub struct EventBuilder {
    event: String,
    user_id: String,
    properties: Map<String, Value>,
    context: Map<String, Value>,
    timestamp: Option<i64>,
}

impl EventBuilder {
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            user_id: "anonymous".to_string(),
            properties: Map::new(),
            context: Map::new(),
            timestamp: None,
        }
    }

    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn properties(mut self, properties: Map<String, Value>) -> Self {
        self.properties.extend(properties);
        self
    }

    pub fn context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Override the timestamp; defaults to now at build time
    pub fn timestamp(mut self, epoch_ms: i64) -> Self {
        self.timestamp = Some(epoch_ms);
        self
    }

    pub fn build(self) -> TrackEvent {
        TrackEvent {
            event: self.event,
            user_id: self.user_id,
            properties: self.properties,
            context: self.context,
            timestamp: self.timestamp.unwrap_or_else(|| Utc::now().timestamp_millis()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_chains() {
        let event = TrackEvent::builder("add_to_cart")
            .user_id("user_42")
            .property("price", 19.99)
            .property("quantity", 2)
            .context("locale", "en-US")
            .timestamp(1_700_000_000_000)
            .build();

        assert_eq!(event.event, "add_to_cart");
        assert_eq!(event.user_id, "user_42");
        assert_eq!(event.properties["quantity"], json!(2));
        assert_eq!(event.context["locale"], json!("en-US"));
        assert_eq!(event.timestamp, 1_700_000_000_000);
    }

    #[test]
    fn test_build_defaults_timestamp_to_now() {
        let before = Utc::now().timestamp_millis();
        let event = TrackEvent::builder("page_view").user_id("u1").build();
        let after = Utc::now().timestamp_millis();

        assert!(event.timestamp >= before && event.timestamp <= after);
    }

    #[test]
    fn test_wire_shape() {
        let event = TrackEvent::builder("purchase")
            .user_id("user_7")
            .property("total", 120.5)
            .timestamp(1_700_000_000_000)
            .build();

        let wire = serde_json::to_value(&event).unwrap();
        assert_eq!(wire["event"], json!("purchase"));
        assert_eq!(wire["userId"], json!("user_7"));
        assert_eq!(wire["timestamp"], json!(1_700_000_000_000i64));
        // Empty context is omitted from the payload
        assert!(wire.get("context").is_none());
    }

    #[test]
    fn test_validate_rejects_bad_events() {
        let no_name = TrackEvent::builder("  ").user_id("u1").build();
        assert!(no_name.validate().is_err());

        let no_user = TrackEvent::builder("page_view").user_id("").build();
        assert!(no_user.validate().is_err());

        let bad_ts = TrackEvent::builder("page_view").user_id("u1").timestamp(0).build();
        assert!(bad_ts.validate().is_err());

        let good = TrackEvent::builder("page_view").user_id("u1").build();
        assert!(good.validate().is_ok());
    }
}
