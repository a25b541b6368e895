//! Delivery counters for a webhook destination
//!
//! Counters come from two unsynchronized places: summary badges and the
//! per-event table. `total` is therefore always derived as
//! `delivered + failed`; a conflicting total reported by the UI is logged
//! and discarded.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Statuses that count as a successful delivery, lowercased
const DELIVERED_STATUSES: [&str; 3] = ["delivered", "success", "200"];

/// Delivery counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EventCounts {
    pub delivered: u64,
    pub failed: u64,
    pub total: u64,
}

impl EventCounts {
    /// Build counters from the two source values; `total` is derived
    pub fn new(delivered: u64, failed: u64) -> Self {
        Self {
            delivered,
            failed,
            total: delivered + failed,
        }
    }

    /// Classify per-event statuses into counters
    pub fn from_statuses<I, S>(statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut delivered = 0;
        let mut failed = 0;
        for status in statuses {
            if status_is_delivered(status.as_ref()) {
                delivered += 1;
            } else {
                failed += 1;
            }
        }
        Self::new(delivered, failed)
    }

    /// Build counters, checking a UI-reported total against the derived one
    pub fn reconcile(delivered: u64, failed: u64, reported_total: Option<u64>) -> Self {
        let counts = Self::new(delivered, failed);
        if let Some(reported) = reported_total {
            if reported != counts.total {
                warn!(
                    reported,
                    derived = counts.total,
                    "total badge disagrees with delivered + failed, using derived value"
                );
            }
        }
        counts
    }

    /// True when the invariant `total == delivered + failed` holds
    pub fn is_consistent(&self) -> bool {
        self.total == self.delivered + self.failed
    }
}

/// One row of the destination's event table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub status: String,
    pub timestamp: Option<String>,
    pub payload: Option<String>,
}

impl EventRecord {
    pub fn is_delivered(&self) -> bool {
        status_is_delivered(&self.status)
    }
}

fn status_is_delivered(status: &str) -> bool {
    let status = status.trim().to_lowercase();
    DELIVERED_STATUSES.iter().any(|s| status == *s)
}

/// Counters plus a success-rate percentage
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeliveryStats {
    #[serde(flatten)]
    pub counts: EventCounts,

    /// Delivered share of total, in percent, two decimals
    pub success_rate: f64,
}

impl DeliveryStats {
    pub fn from_counts(counts: EventCounts) -> Self {
        let success_rate = if counts.total == 0 {
            0.0
        } else {
            let rate = counts.delivered as f64 / counts.total as f64 * 100.0;
            (rate * 100.0).round() / 100.0
        };
        Self { counts, success_rate }
    }
}
