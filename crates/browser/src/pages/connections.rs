//! Connections page: sources, destinations, and the data plane URL.

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use pipecheck_common::{Error, Result};

use super::rows_script;
use crate::driver::{js_string, js_string_array, BrowserSession};

const CONNECTIONS_VIEW: [&str; 3] = [
    "[data-testid=\"connections-view\"]",
    ".connections-page",
    "h1:has-text(\"Connections\")",
];

const CONNECTIONS_NAV: [&str; 2] = [
    "[data-testid=\"nav-connections\"]",
    "a[href*=\"connections\"]",
];

const DATA_PLANE_LABELS: [&str; 3] = [
    "[data-testid=\"data-plane-url\"]",
    ".data-plane-url",
    "code:has-text(\"https://\")",
];

const SOURCE_ROWS: [&str; 3] = [
    "[data-testid=\"source-row\"]",
    ".source-item",
    "tr[data-source-id]",
];

const DESTINATION_ROWS: [&str; 3] = [
    "[data-testid=\"destination-row\"]",
    ".destination-item",
    "tr[data-destination-id]",
];

const DESTINATION_DETAIL: [&str; 3] = [
    "[data-testid=\"destination-detail\"]",
    ".destination-detail",
    "h1:has-text(\"Destination\")",
];

const SOURCE_FIELDS: [(&str, &str); 3] = [
    ("name", "[data-testid=\"source-name\"], .source-name"),
    ("kind", "[data-testid=\"source-type\"], .source-type"),
    ("write_key", "[data-testid=\"write-key\"], .write-key"),
];

const DESTINATION_FIELDS: [(&str, &str); 3] = [
    ("name", "[data-testid=\"destination-name\"], .destination-name"),
    ("kind", "[data-testid=\"destination-type\"], .destination-type"),
    (
        "status",
        "[data-testid=\"destination-status\"], .destination-status, .status",
    ),
];

/// Source kinds that accept events over the HTTP ingestion API.
const HTTP_LIKE_KINDS: [&str; 3] = ["http", "webhook", "api"];

const KIND_MARKERS: [&str; 6] = ["webhook", "http", "javascript", "android", "ios", "api"];

/// A source row as shown in the connections list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceInfo {
    pub name: String,
    pub kind: String,
    pub write_key: Option<String>,
}

/// A destination row as shown in the connections list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DestinationInfo {
    pub name: String,
    pub kind: String,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SourceRow {
    name: Option<String>,
    kind: Option<String>,
    write_key: Option<String>,
    text: String,
}

#[derive(Debug, Deserialize)]
struct DestinationRow {
    name: Option<String>,
    kind: Option<String>,
    status: Option<String>,
    text: String,
}

#[derive(Debug, Deserialize)]
struct DataPlaneScrape {
    label: Option<String>,
    body: Option<String>,
}

pub struct ConnectionsPage<'s> {
    session: &'s BrowserSession,
    base_url: String,
}

impl<'s> ConnectionsPage<'s> {
    pub fn new(session: &'s BrowserSession, base_url: impl Into<String>) -> Self {
        Self {
            session,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn connections_url(&self) -> String {
        format!("{}/connections", self.base_url)
    }

    /// Navigate to the connections view, falling back to the nav link when
    /// the direct route redirects elsewhere.
    pub async fn open(&self) -> Result<()> {
        let body = open_script(&self.connections_url());
        let value = self
            .session
            .eval_with_retry(&body, "open connections page")
            .await
            .map_err(|e| Error::Navigation {
                page: "connections".to_string(),
                reason: e.to_string(),
            })?;
        debug!(via = value.as_str().unwrap_or("?"), "connections page rendered");
        Ok(())
    }

    /// The data plane base URL shown on the connections page, if any.
    pub async fn data_plane_url(&self) -> Result<Option<String>> {
        let body = data_plane_script(&self.connections_url());
        let value = self.session.eval(&body).await?;
        let scrape: DataPlaneScrape = serde_json::from_value(value)
            .map_err(|e| Error::Scrape(format!("data plane scrape: {e}")))?;

        let found = scrape
            .label
            .as_deref()
            .and_then(extract_url)
            .or_else(|| scrape.body.as_deref().and_then(extract_url));
        match &found {
            Some(url) => info!(%url, "data plane URL extracted"),
            None => warn!("no data plane URL visible on the connections page"),
        }
        Ok(found)
    }

    /// All source rows in the connections list.
    pub async fn sources(&self) -> Result<Vec<SourceInfo>> {
        let body = rows_script(&self.connections_url(), &SOURCE_ROWS, &SOURCE_FIELDS);
        let value = self.session.eval(&body).await?;
        let rows: Vec<SourceRow> = serde_json::from_value(value)
            .map_err(|e| Error::Scrape(format!("source rows: {e}")))?;
        let sources: Vec<SourceInfo> = rows.into_iter().map(SourceInfo::from_row).collect();
        debug!(count = sources.len(), "scraped source list");
        Ok(sources)
    }

    /// All destination rows in the connections list.
    pub async fn destinations(&self) -> Result<Vec<DestinationInfo>> {
        let body = rows_script(
            &self.connections_url(),
            &DESTINATION_ROWS,
            &DESTINATION_FIELDS,
        );
        let value = self.session.eval(&body).await?;
        let rows: Vec<DestinationRow> = serde_json::from_value(value)
            .map_err(|e| Error::Scrape(format!("destination rows: {e}")))?;
        let destinations: Vec<DestinationInfo> =
            rows.into_iter().map(DestinationInfo::from_row).collect();
        debug!(count = destinations.len(), "scraped destination list");
        Ok(destinations)
    }

    /// The write key of the first source that accepts HTTP ingestion.
    pub async fn http_source_write_key(&self) -> Result<Option<String>> {
        let sources = self.sources().await?;
        for source in &sources {
            if !is_http_like(&source.kind) {
                continue;
            }
            if let Some(key) = &source.write_key {
                info!(source = %source.name, "write key located");
                return Ok(Some(key.clone()));
            }
        }
        warn!(scanned = sources.len(), "no HTTP-like source exposes a write key");
        Ok(None)
    }

    /// Click through to the first webhook destination and return its detail
    /// page URL, so later polls can navigate straight back to it.
    pub async fn open_webhook_destination(&self) -> Result<String> {
        let body = open_webhook_script(&self.connections_url());
        let value = self
            .session
            .eval_with_retry(&body, "open webhook destination detail")
            .await
            .map_err(|e| Error::Navigation {
                page: "destinations".to_string(),
                reason: e.to_string(),
            })?;
        let url = value
            .as_str()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::Scrape("destination detail returned no URL".to_string()))?
            .to_string();
        info!(%url, "webhook destination detail open");
        Ok(url)
    }
}

impl SourceInfo {
    fn from_row(row: SourceRow) -> Self {
        let kind = row
            .kind
            .filter(|k| !k.is_empty())
            .unwrap_or_else(|| infer_kind(&row.text));
        let write_key = row
            .write_key
            .filter(|k| !k.is_empty())
            .or_else(|| extract_write_key(&row.text));
        let name = row
            .name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| first_line(&row.text));
        Self { name, kind, write_key }
    }
}

impl DestinationInfo {
    fn from_row(row: DestinationRow) -> Self {
        let kind = row
            .kind
            .filter(|k| !k.is_empty())
            .unwrap_or_else(|| infer_kind(&row.text));
        let name = row
            .name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| first_line(&row.text));
        Self {
            name,
            kind,
            status: row.status.filter(|s| !s.is_empty()),
        }
    }
}

fn open_script(connections_url: &str) -> String {
    format!(
        "await page.goto({url}, {{ waitUntil: 'domcontentloaded' }});\n\
         if (await firstPresent({view})) return 'direct';\n\
         const link = await firstPresent({nav});\n\
         if (!link) throw new Error('connections view unreachable: no nav link');\n\
         await link.click();\n\
         await page.waitForLoadState('networkidle');\n\
         if (await firstPresent({view})) return 'nav-link';\n\
         throw new Error('connections view did not render');",
        url = js_string(connections_url),
        view = js_string_array(&CONNECTIONS_VIEW),
        nav = js_string_array(&CONNECTIONS_NAV),
    )
}

fn data_plane_script(connections_url: &str) -> String {
    format!(
        "await page.goto({url}, {{ waitUntil: 'networkidle' }});\n\
         const label = await firstPresent({labels});\n\
         const labelText = label ? await textOf(label) : null;\n\
         const bodyText = await page.evaluate(() => document.body.innerText);\n\
         return {{ label: labelText, body: bodyText }};",
        url = js_string(connections_url),
        labels = js_string_array(&DATA_PLANE_LABELS),
    )
}

fn open_webhook_script(connections_url: &str) -> String {
    format!(
        "await page.goto({url}, {{ waitUntil: 'networkidle' }});\n\
         for (const sel of {rows}) {{\n\
           const locs = page.locator(sel);\n\
           const count = await locs.count();\n\
           if (count === 0) continue;\n\
           for (let i = 0; i < count; i++) {{\n\
             const row = locs.nth(i);\n\
             const text = ((await row.textContent()) || '').toLowerCase();\n\
             if (!text.includes('webhook')) continue;\n\
             await row.click();\n\
             await page.waitForLoadState('networkidle');\n\
             if (!(await firstPresent({detail}))) throw new Error('destination detail did not render');\n\
             return page.url();\n\
           }}\n\
           break;\n\
         }}\n\
         throw new Error('no webhook destination configured');",
        url = js_string(connections_url),
        rows = js_string_array(&DESTINATION_ROWS),
        detail = js_string_array(&DESTINATION_DETAIL),
    )
}

/// First http(s) URL embedded in a blob of page text.
fn extract_url(text: &str) -> Option<String> {
    let re = Regex::new(r#"https?://[^\s<>"']+"#).ok()?;
    re.find(text).map(|m| m.as_str().to_string())
}

/// Write keys are long unbroken alphanumeric tokens, unlike anything else
/// that shows up in a source row.
fn extract_write_key(text: &str) -> Option<String> {
    let re = Regex::new(r"\b[A-Za-z0-9]{20,}\b").ok()?;
    re.find(text).map(|m| m.as_str().to_string())
}

fn is_http_like(kind: &str) -> bool {
    let kind = kind.to_lowercase();
    HTTP_LIKE_KINDS.iter().any(|m| kind.contains(m))
}

fn infer_kind(text: &str) -> String {
    let text = text.to_lowercase();
    KIND_MARKERS
        .iter()
        .find(|m| text.contains(**m))
        .map(|m| m.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn first_line(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("(unnamed)")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_url_from_surrounding_text() {
        let text = "Data plane: https://hosted.pipeboard.io/v2 (click to copy)";
        assert_eq!(
            extract_url(text).as_deref(),
            Some("https://hosted.pipeboard.io/v2")
        );
        assert_eq!(extract_url("no urls here"), None);
    }

    #[test]
    fn extracts_write_key_from_row_text() {
        let text = "Main HTTP Source\nhttp\nKey: q7wLp0ZxKc4Vn2RbY8tJd6mS1";
        assert_eq!(
            extract_write_key(text).as_deref(),
            Some("q7wLp0ZxKc4Vn2RbY8tJd6mS1")
        );
        assert_eq!(extract_write_key("short tok3n only"), None);
    }

    #[test]
    fn infers_kind_from_row_text() {
        assert_eq!(infer_kind("Webhook destination (active)"), "webhook");
        assert_eq!(infer_kind("Primary HTTP source"), "http");
        assert_eq!(infer_kind("Postgres sink"), "unknown");
    }

    #[test]
    fn http_like_kinds_match_loosely() {
        assert!(is_http_like("HTTP"));
        assert!(is_http_like("http-api"));
        assert!(is_http_like("Webhook"));
        assert!(!is_http_like("android"));
    }

    #[test]
    fn source_row_falls_back_to_row_text() {
        let row = SourceRow {
            name: None,
            kind: None,
            write_key: None,
            text: "My HTTP Source\nhttp\nq7wLp0ZxKc4Vn2RbY8tJd6".to_string(),
        };
        let info = SourceInfo::from_row(row);
        assert_eq!(info.name, "My HTTP Source");
        assert_eq!(info.kind, "http");
        assert_eq!(info.write_key.as_deref(), Some("q7wLp0ZxKc4Vn2RbY8tJd6"));
    }

    #[test]
    fn explicit_cells_win_over_fallbacks() {
        let row = SourceRow {
            name: Some("Checkout".to_string()),
            kind: Some("JavaScript".to_string()),
            write_key: Some("".to_string()),
            text: "Checkout JavaScript q7wLp0ZxKc4Vn2RbY8tJd6".to_string(),
        };
        let info = SourceInfo::from_row(row);
        assert_eq!(info.name, "Checkout");
        assert_eq!(info.kind, "JavaScript");
        // empty cell text falls through to the regex
        assert_eq!(info.write_key.as_deref(), Some("q7wLp0ZxKc4Vn2RbY8tJd6"));
    }

    #[test]
    fn open_script_falls_back_to_the_nav_link() {
        let script = open_script("https://app.example.io/connections");
        assert!(script.contains("return 'direct';"));
        assert!(script.contains("return 'nav-link';"));
        assert!(script.contains("a[href*=\\\"connections\\\"]"));
    }
}
