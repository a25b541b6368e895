//! Playwright browser sessions
//!
//! Scripts are generated per interaction, written to a temp file, and run
//! with `node`. Each script launches a persistent context against the
//! session's profile directory, so cookies and storage survive from one
//! script to the next and a login carries into later page visits. The
//! script prints a single JSON envelope on its last stdout line; that
//! envelope is the only protocol between Rust and the browser.

use std::process::{Command, Stdio};
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tempfile::TempDir;
use tokio::process::Command as TokioCommand;
use tracing::{debug, warn};

use pipecheck_common::config::BrowserSettings;
use pipecheck_common::{BrowserKind, Error, Result};

/// Browser session configuration
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    pub kind: BrowserKind,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,

    /// Default timeout for navigations and locator waits
    pub nav_timeout: Duration,

    /// Wall-clock cap for one `node` run
    pub script_timeout: Duration,

    /// Attempts for flaky click interactions
    pub click_retries: u32,
    pub click_retry_delay: Duration,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self::from_settings(&BrowserSettings::default())
    }
}

impl BrowserConfig {
    pub fn from_settings(settings: &BrowserSettings) -> Self {
        Self {
            kind: settings.kind,
            headless: settings.headless,
            viewport_width: settings.viewport_width,
            viewport_height: settings.viewport_height,
            nav_timeout: Duration::from_secs(settings.nav_timeout_secs),
            script_timeout: Duration::from_secs(settings.script_timeout_secs),
            click_retries: settings.click_retries,
            click_retry_delay: Duration::from_millis(settings.click_retry_delay_ms),
        }
    }
}

/// Envelope printed by every generated script
#[derive(Debug, Deserialize)]
struct ScriptEnvelope {
    ok: bool,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    error: Option<String>,
}

/// One browser profile and the machinery to run scripts against it
pub struct BrowserSession {
    config: BrowserConfig,
    profile_dir: TempDir,
}

impl BrowserSession {
    /// Create a session with a fresh profile directory
    pub fn new(config: BrowserConfig) -> Result<Self> {
        Self::check_playwright_installed()?;
        let profile_dir = tempfile::tempdir()?;
        Ok(Self { config, profile_dir })
    }

    /// Check if Playwright is installed
    pub fn check_playwright_installed() -> Result<()> {
        let output = Command::new("npx")
            .args(["playwright", "--version"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match output {
            Ok(status) if status.success() => Ok(()),
            _ => Err(Error::PlaywrightNotFound),
        }
    }

    pub fn config(&self) -> &BrowserConfig {
        &self.config
    }

    /// Run a script body and return the value it produced.
    ///
    /// The body runs inside an async function with `page`, `firstPresent`,
    /// and `textOf` in scope; whatever it returns comes back as JSON.
    pub async fn eval(&self, body: &str) -> Result<Value> {
        let script = self.build_script(body);
        self.run_script(&script).await
    }

    /// Re-run a flaky interaction a few times before giving up
    pub async fn eval_with_retry(&self, body: &str, what: &str) -> Result<Value> {
        let attempts = self.config.click_retries.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match self.eval(body).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!(what, attempt, max_attempts = attempts, error = %e, "interaction failed");
                    last_error = Some(e);
                }
            }
            if attempt < attempts {
                tokio::time::sleep(self.config.click_retry_delay).await;
            }
        }

        Err(last_error.unwrap_or_else(|| Error::Driver(format!("{} failed", what))))
    }

    /// Wrap a script body in the session bootstrap
    fn build_script(&self, body: &str) -> String {
        format!(
            r#"
const {{ chromium, firefox, webkit }} = require('playwright');

(async () => {{
  const engine = {{ chromium, firefox, webkit }}[{engine}];
  const context = await engine.launchPersistentContext({profile}, {{
    headless: {headless},
    viewport: {{ width: {width}, height: {height} }}
  }});
  const page = context.pages()[0] || await context.newPage();
  page.setDefaultTimeout({timeout_ms});
  page.setDefaultNavigationTimeout({timeout_ms});

  const firstPresent = async (selectors) => {{
    for (const sel of selectors) {{
      const loc = page.locator(sel).first();
      if (await loc.count() > 0) return loc;
    }}
    return null;
  }};
  const textOf = async (loc) => ((await loc.textContent()) || '').trim();

  try {{
    const value = await (async () => {{
{body}
    }})();
    console.log(JSON.stringify({{ ok: true, value: value === undefined ? null : value }}));
  }} catch (error) {{
    console.log(JSON.stringify({{ ok: false, error: String((error && error.message) || error) }}));
    process.exitCode = 1;
  }} finally {{
    await context.close();
  }}
}})();
"#,
            engine = js_string(self.config.kind.as_str()),
            profile = js_string(&self.profile_dir.path().to_string_lossy()),
            headless = self.config.headless,
            width = self.config.viewport_width,
            height = self.config.viewport_height,
            timeout_ms = self.config.nav_timeout.as_millis(),
            body = body,
        )
    }

    /// Write the script to a temp file, run it with node, parse the envelope
    async fn run_script(&self, script: &str) -> Result<Value> {
        let temp_dir = tempfile::tempdir()?;
        let script_path = temp_dir.path().join("session.js");
        std::fs::write(&script_path, script)?;

        debug!(script = %script_path.display(), "running browser script");

        // The script file lives in a temp dir, so module resolution would
        // walk up /tmp and miss the checkout's node_modules without NODE_PATH.
        let node_path = std::env::var_os("NODE_PATH").unwrap_or_else(|| {
            std::env::current_dir()
                .map(|dir| dir.join("node_modules").into_os_string())
                .unwrap_or_default()
        });
        let run = TokioCommand::new("node")
            .arg(&script_path)
            .env("NODE_PATH", node_path)
            .output();
        let output = tokio::time::timeout(self.config.script_timeout, run)
            .await
            .map_err(|_| Error::Timeout {
                operation: "browser script".to_string(),
                seconds: self.config.script_timeout.as_secs(),
            })??;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let envelope = stdout
            .lines()
            .rev()
            .find_map(|line| serde_json::from_str::<ScriptEnvelope>(line.trim()).ok());

        match envelope {
            Some(ScriptEnvelope { ok: true, value, .. }) => Ok(value),
            Some(ScriptEnvelope { ok: false, error, .. }) => Err(Error::Script(
                error.unwrap_or_else(|| "script reported failure".to_string()),
            )),
            None => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(Error::Driver(format!(
                    "no result envelope from browser script (exit: {:?})\nstdout: {}\nstderr: {}",
                    output.status.code(),
                    tail(&stdout, 500),
                    tail(&stderr, 500)
                )))
            }
        }
    }
}

/// Quote a Rust string as a JS string literal
pub fn js_string(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

/// Quote a selector list as a JS array literal
pub fn js_string_array(items: &[&str]) -> String {
    Value::Array(items.iter().map(|s| Value::String(s.to_string())).collect()).to_string()
}

fn tail(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let start = s.len() - max;
        let start = s.char_indices().map(|(i, _)| i).find(|i| *i >= start).unwrap_or(0);
        format!("...{}", &s[start..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_with_defaults() -> BrowserSession {
        BrowserSession {
            config: BrowserConfig::default(),
            profile_dir: tempfile::tempdir().unwrap(),
        }
    }

    #[test]
    fn test_js_string_escapes_quotes() {
        assert_eq!(js_string(r#"pa"ss'wd"#), r#""pa\"ss'wd""#);
    }

    #[test]
    fn test_js_string_array() {
        assert_eq!(
            js_string_array(&["#email", "input[name=\"email\"]"]),
            r#"["#email","input[name=\"email\"]"]"#
        );
    }

    #[test]
    fn test_build_script_embeds_config() {
        let session = session_with_defaults();
        let script = session.build_script("return 1;");

        assert!(script.contains("launchPersistentContext"));
        assert!(script.contains("\"chromium\""));
        assert!(script.contains("width: 1920, height: 1080"));
        assert!(script.contains("return 1;"));
        // Bootstrap helpers are always in scope for page scripts
        assert!(script.contains("const firstPresent"));
        assert!(script.contains("const textOf"));
    }

    #[test]
    fn test_envelope_parsing() {
        let ok: ScriptEnvelope = serde_json::from_str(r#"{"ok":true,"value":{"n":3}}"#).unwrap();
        assert!(ok.ok);
        assert_eq!(ok.value["n"], 3);

        let err: ScriptEnvelope =
            serde_json::from_str(r#"{"ok":false,"error":"selector missing"}"#).unwrap();
        assert!(!err.ok);
        assert_eq!(err.error.as_deref(), Some("selector missing"));
    }

    #[test]
    fn test_tail_truncates_long_output() {
        let long = "x".repeat(1000);
        let clipped = tail(&long, 100);
        assert!(clipped.starts_with("..."));
        assert!(clipped.len() <= 104);
        assert_eq!(tail("short", 100), "short");
    }
}
