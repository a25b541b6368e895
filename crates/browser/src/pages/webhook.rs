//! Webhook destination detail page: delivery counters and the event table.
//!
//! Counters come from summary badges when the console renders them, and
//! from classifying event-table rows when it does not. Since each script
//! run navigates afresh, every poll tick observes a fully reloaded page.

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info, warn};

use pipecheck_common::{
    DeliveryStats, Error, EventCounts, EventRecord, PollOutcome, Poller, Result,
};

use super::rows_script;
use crate::driver::{js_string, js_string_array, BrowserSession};

const DELIVERED_BADGES: [&str; 3] = [
    "[data-testid=\"delivered-count\"]",
    ".delivered-count",
    ".metric-delivered .value",
];

const FAILED_BADGES: [&str; 3] = [
    "[data-testid=\"failed-count\"]",
    ".failed-count",
    ".metric-failed .value",
];

const TOTAL_BADGES: [&str; 3] = [
    "[data-testid=\"total-count\"]",
    ".total-count",
    ".metric-total .value",
];

const EVENTS_TAB: [&str; 3] = [
    "[data-testid=\"events-tab\"]",
    "[role=\"tab\"]:has-text(\"Events\")",
    "button:has-text(\"Events\")",
];

const EVENT_ROWS: [&str; 3] = ["[data-testid=\"event-row\"]", ".event-row", "tbody tr"];

const REFRESH_BUTTONS: [&str; 2] = [
    "[data-testid=\"refresh-events\"]",
    "button:has-text(\"Refresh\")",
];

const STATUS_CELLS: &str = "[data-testid=\"event-status\"], .event-status, .status";
const TIME_CELLS: &str = "[data-testid=\"event-time\"], .event-timestamp, time";
const PAYLOAD_CELLS: &str = "[data-testid=\"event-payload\"], .event-payload, pre, code";

const EVENT_FIELDS: [(&str, &str); 3] = [
    ("status", STATUS_CELLS),
    ("timestamp", TIME_CELLS),
    ("payload", PAYLOAD_CELLS),
];

/// Row text fragments that mark a delivery as successful.
const DELIVERED_MARKERS: [&str; 3] = ["delivered", "success", "200"];

#[derive(Debug, Deserialize)]
struct CountsScrape {
    delivered: Option<String>,
    failed: Option<String>,
    total: Option<String>,
    statuses: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct EventRow {
    status: Option<String>,
    timestamp: Option<String>,
    payload: Option<String>,
    text: String,
}

pub struct WebhookDestinationPage<'s> {
    session: &'s BrowserSession,
    detail_url: String,
}

impl<'s> WebhookDestinationPage<'s> {
    /// `detail_url` is the destination detail page, usually captured from
    /// [`ConnectionsPage::open_webhook_destination`].
    ///
    /// [`ConnectionsPage::open_webhook_destination`]: super::ConnectionsPage::open_webhook_destination
    pub fn new(session: &'s BrowserSession, detail_url: impl Into<String>) -> Self {
        Self {
            session,
            detail_url: detail_url.into(),
        }
    }

    pub fn detail_url(&self) -> &str {
        &self.detail_url
    }

    /// Switch to the events tab; a no-op on consoles that land there.
    pub async fn open_events_tab(&self) -> Result<()> {
        let body = format!(
            "await page.goto({url}, {{ waitUntil: 'networkidle' }});\n\
             const tab = await firstPresent({tabs});\n\
             if (!tab) return 'absent';\n\
             await tab.click();\n\
             await page.waitForLoadState('networkidle');\n\
             return 'clicked';",
            url = js_string(&self.detail_url),
            tabs = js_string_array(&EVENTS_TAB),
        );
        let value = self
            .session
            .eval_with_retry(&body, "open events tab")
            .await
            .map_err(|e| Error::Navigation {
                page: "webhook destination".to_string(),
                reason: e.to_string(),
            })?;
        debug!(tab = value.as_str().unwrap_or("?"), "events tab ready");
        Ok(())
    }

    /// Reload the detail page, clicking the refresh control when one exists.
    pub async fn refresh(&self) -> Result<()> {
        let body = format!(
            "await page.goto({url}, {{ waitUntil: 'networkidle' }});\n\
             const refresh = await firstPresent({buttons});\n\
             if (refresh) {{ await refresh.click(); await page.waitForLoadState('networkidle'); }}\n\
             return true;",
            url = js_string(&self.detail_url),
            buttons = js_string_array(&REFRESH_BUTTONS),
        );
        self.session.eval(&body).await?;
        Ok(())
    }

    /// Current delivery counters, from badges or from the event table.
    pub async fn event_counts(&self) -> Result<EventCounts> {
        let body = counts_script(&self.detail_url);
        let value = self.session.eval(&body).await?;
        let scrape: CountsScrape = serde_json::from_value(value)
            .map_err(|e| Error::Scrape(format!("delivery counters: {e}")))?;
        let counts = parse_counts(scrape);
        debug!(
            delivered = counts.delivered,
            failed = counts.failed,
            total = counts.total,
            "delivery counters scraped"
        );
        Ok(counts)
    }

    /// All rows of the event table, newest first as the console renders them.
    pub async fn events(&self) -> Result<Vec<EventRecord>> {
        let body = rows_script(&self.detail_url, &EVENT_ROWS, &EVENT_FIELDS);
        let value = self.session.eval(&body).await?;
        let rows: Vec<EventRow> = serde_json::from_value(value)
            .map_err(|e| Error::Scrape(format!("event rows: {e}")))?;
        Ok(rows.into_iter().map(EventRecord::from).collect())
    }

    /// The most recent event row, if the table has any.
    pub async fn latest_event(&self) -> Result<Option<EventRecord>> {
        Ok(self.events().await?.into_iter().next())
    }

    /// Counters plus the derived success rate.
    pub async fn delivery_stats(&self) -> Result<DeliveryStats> {
        Ok(DeliveryStats::from_counts(self.event_counts().await?))
    }

    /// Poll the counters until at least `expected` events show as delivered.
    ///
    /// Scrape errors are tolerated or fatal per the poller's probe policy.
    pub async fn verify_event_delivery(
        &self,
        expected: u64,
        poller: &Poller,
    ) -> PollOutcome<EventCounts, Error> {
        info!(
            expected,
            interval_secs = poller.interval().as_secs(),
            timeout_secs = poller.timeout().as_secs(),
            "verifying event delivery"
        );
        let outcome = poller
            .run(|| self.event_counts(), move |c| c.delivered >= expected)
            .await;
        match &outcome {
            PollOutcome::Satisfied { state, ticks, .. } => {
                info!(delivered = state.delivered, ticks, "delivery confirmed");
            }
            other => {
                warn!(
                    verdict = other.label(),
                    last_delivered = ?other.state().map(|c| c.delivered),
                    "delivery not confirmed"
                );
            }
        }
        outcome
    }

    /// Poll until any event beyond the current total arrives.
    ///
    /// The baseline is read once before polling starts; a failure to read
    /// it is an error, not a timeout.
    pub async fn wait_for_event(&self, poller: &Poller) -> Result<PollOutcome<EventCounts, Error>> {
        let baseline = self.event_counts().await?.total;
        debug!(baseline, "waiting for a new event");
        Ok(poller
            .run(|| self.event_counts(), move |c| c.total > baseline)
            .await)
    }
}

impl From<EventRow> for EventRecord {
    fn from(row: EventRow) -> Self {
        let status = row
            .status
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| normalize_row_status(&row.text));
        Self {
            status,
            timestamp: row.timestamp.filter(|t| !t.is_empty()),
            payload: row.payload.filter(|p| !p.is_empty()),
        }
    }
}

fn counts_script(detail_url: &str) -> String {
    format!(
        "await page.goto({url}, {{ waitUntil: 'networkidle' }});\n\
         const textOrNull = async (sels) => {{\n\
           const el = await firstPresent(sels);\n\
           return el ? await textOf(el) : null;\n\
         }};\n\
         const delivered = await textOrNull({delivered});\n\
         const failed = await textOrNull({failed});\n\
         const total = await textOrNull({total});\n\
         if (delivered !== null && failed !== null) return {{ delivered, failed, total, statuses: null }};\n\
         const tab = await firstPresent({tabs});\n\
         if (tab) {{ await tab.click(); await page.waitForLoadState('networkidle'); }}\n\
         const statuses = [];\n\
         for (const sel of {rows}) {{\n\
           const locs = page.locator(sel);\n\
           const count = await locs.count();\n\
           if (count === 0) continue;\n\
           for (let i = 0; i < count; i++) {{\n\
             const row = locs.nth(i);\n\
             const cell = row.locator({status_cells}).first();\n\
             const raw = (await cell.count()) > 0 ? await cell.textContent() : await row.textContent();\n\
             statuses.push((raw || '').trim());\n\
           }}\n\
           break;\n\
         }}\n\
         return {{ delivered: null, failed: null, total: null, statuses }};",
        url = js_string(detail_url),
        delivered = js_string_array(&DELIVERED_BADGES),
        failed = js_string_array(&FAILED_BADGES),
        total = js_string_array(&TOTAL_BADGES),
        tabs = js_string_array(&EVENTS_TAB),
        rows = js_string_array(&EVENT_ROWS),
        status_cells = js_string(STATUS_CELLS),
    )
}

fn parse_counts(scrape: CountsScrape) -> EventCounts {
    if let (Some(delivered), Some(failed)) = (scrape.delivered.as_deref(), scrape.failed.as_deref())
    {
        let ui_total = scrape.total.as_deref().and_then(find_number);
        return EventCounts::reconcile(badge_count(delivered), badge_count(failed), ui_total);
    }
    let statuses: Vec<String> = scrape
        .statuses
        .unwrap_or_default()
        .iter()
        .map(|s| normalize_row_status(s))
        .collect();
    EventCounts::from_statuses(&statuses)
}

/// Parse a counter badge, treating unreadable text as zero.
fn badge_count(text: &str) -> u64 {
    match find_number(text) {
        Some(n) => n,
        None => {
            warn!(text, "counter badge did not contain a number, treating as 0");
            0
        }
    }
}

/// First integer in a blob of badge text, tolerating thousands separators.
fn find_number(text: &str) -> Option<u64> {
    let re = Regex::new(r"\d[\d,]*").ok()?;
    let m = re.find(text)?;
    m.as_str().replace(',', "").parse().ok()
}

/// Collapse raw row text onto the delivered/failed axis.
fn normalize_row_status(text: &str) -> String {
    let text = text.to_lowercase();
    if DELIVERED_MARKERS.iter().any(|m| text.contains(m)) {
        "delivered".to_string()
    } else {
        "failed".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_numbers_with_separators() {
        assert_eq!(find_number("1,234 events"), Some(1234));
        assert_eq!(find_number("Delivered: 42"), Some(42));
        assert_eq!(find_number("none yet"), None);
    }

    #[test]
    fn unreadable_badge_counts_as_zero() {
        assert_eq!(badge_count("--"), 0);
        assert_eq!(badge_count("7"), 7);
    }

    #[test]
    fn badge_counts_win_and_total_is_derived() {
        let counts = parse_counts(CountsScrape {
            delivered: Some("4 delivered".to_string()),
            failed: Some("1".to_string()),
            total: Some("4".to_string()),
            statuses: None,
        });
        assert_eq!(counts, EventCounts::new(4, 1));
        assert_eq!(counts.total, 5);
    }

    #[test]
    fn falls_back_to_classifying_rows() {
        let counts = parse_counts(CountsScrape {
            delivered: None,
            failed: None,
            total: None,
            statuses: Some(vec![
                "evt_1 purchase Delivered 2m ago".to_string(),
                "evt_2 page_view 500 Internal Server Error".to_string(),
                "evt_3 add_to_cart success".to_string(),
            ]),
        });
        assert_eq!(counts, EventCounts::new(2, 1));
    }

    #[test]
    fn empty_table_means_zero_counts() {
        let counts = parse_counts(CountsScrape {
            delivered: None,
            failed: None,
            total: None,
            statuses: Some(Vec::new()),
        });
        assert_eq!(counts, EventCounts::default());
    }

    #[test]
    fn row_status_normalization() {
        assert_eq!(normalize_row_status("HTTP 200 OK"), "delivered");
        assert_eq!(normalize_row_status("evt Success"), "delivered");
        assert_eq!(normalize_row_status("timeout after 3 retries"), "failed");
    }

    #[test]
    fn event_row_conversion_prefers_the_status_cell() {
        let explicit = EventRecord::from(EventRow {
            status: Some("Delivered".to_string()),
            timestamp: Some("2026-08-22T10:00:00Z".to_string()),
            payload: None,
            text: "whatever".to_string(),
        });
        assert_eq!(explicit.status, "Delivered");
        assert!(explicit.is_delivered());

        let fallback = EventRecord::from(EventRow {
            status: None,
            timestamp: None,
            payload: Some("{}".to_string()),
            text: "evt_9 purchase delivered".to_string(),
        });
        assert_eq!(fallback.status, "delivered");
    }
}
