//! Suite configuration
//!
//! Settings load from a TOML file, take `PIPECHECK_*` environment
//! overrides, and are validated before a run starts. They are constructed
//! at the binary edge and passed down by reference; nothing in the suite
//! reads configuration from global state.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};

/// Target environment for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TargetEnv {
    #[default]
    Dev,
    Qa,
    Prod,
}

impl fmt::Display for TargetEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetEnv::Dev => write!(f, "dev"),
            TargetEnv::Qa => write!(f, "qa"),
            TargetEnv::Prod => write!(f, "prod"),
        }
    }
}

impl FromStr for TargetEnv {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(TargetEnv::Dev),
            "qa" => Ok(TargetEnv::Qa),
            "prod" => Ok(TargetEnv::Prod),
            other => Err(Error::InvalidConfig(format!(
                "unknown environment '{}' (expected dev, qa, or prod)",
                other
            ))),
        }
    }
}

/// Browser engine driving the console
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BrowserKind {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl BrowserKind {
    /// Playwright module name for this engine
    pub fn as_str(&self) -> &'static str {
        match self {
            BrowserKind::Chromium => "chromium",
            BrowserKind::Firefox => "firefox",
            BrowserKind::Webkit => "webkit",
        }
    }
}

impl fmt::Display for BrowserKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BrowserKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "chromium" | "chrome" => Ok(BrowserKind::Chromium),
            "firefox" => Ok(BrowserKind::Firefox),
            "webkit" | "safari" => Ok(BrowserKind::Webkit),
            other => Err(Error::InvalidConfig(format!(
                "unknown browser '{}' (expected chromium, firefox, or webkit)",
                other
            ))),
        }
    }
}

/// Suite configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    /// Environment selected for this run
    pub environment: TargetEnv,

    /// Console login credentials
    pub credentials: Credentials,

    /// Console base URLs per environment
    pub environments: EnvironmentUrls,

    /// Ingestion API client settings
    pub api: ApiSettings,

    /// Browser session settings
    pub browser: BrowserSettings,

    /// Webhook destination polling settings
    pub webhook: WebhookSettings,

    /// Report output settings
    pub report: ReportSettings,
}

/// Console login credentials
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Credentials {
    pub email: String,
    /// Never logged; rendered output masks it.
    pub password: String,
}

/// Console base URLs per environment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentUrls {
    pub dev: String,
    pub qa: String,
    pub prod: String,
}

impl Default for EnvironmentUrls {
    fn default() -> Self {
        Self {
            dev: "https://app.dev.pipeboard.io".to_string(),
            qa: "https://app.qa.pipeboard.io".to_string(),
            prod: "https://app.pipeboard.io".to_string(),
        }
    }
}

/// Ingestion API client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// Attempts for retryable failures (429 and 5xx)
    pub retry_attempts: u32,

    /// Linear backoff factor in seconds
    pub retry_backoff_secs: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            retry_attempts: 3,
            retry_backoff_secs: 2,
        }
    }
}

/// Browser session settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    pub kind: BrowserKind,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,

    /// Navigation timeout in seconds
    pub nav_timeout_secs: u64,

    /// Wall-clock cap for a single browser script run
    pub script_timeout_secs: u64,

    /// Attempts for flaky click interactions
    pub click_retries: u32,
    pub click_retry_delay_ms: u64,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            kind: BrowserKind::Chromium,
            headless: true,
            viewport_width: 1920,
            viewport_height: 1080,
            nav_timeout_secs: 30,
            script_timeout_secs: 90,
            click_retries: 3,
            click_retry_delay_ms: 500,
        }
    }
}

/// Webhook destination polling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookSettings {
    /// Receiver inspection URL (a request-bin endpoint), if configured
    pub url: Option<String>,

    /// Seconds between poll ticks
    pub poll_interval_secs: u64,

    /// Deadline for delivery count verification
    pub delivery_timeout_secs: u64,

    /// Deadline for a new event to appear at all
    pub event_wait_timeout_secs: u64,
}

impl Default for WebhookSettings {
    fn default() -> Self {
        Self {
            url: None,
            poll_interval_secs: 2,
            delivery_timeout_secs: 30,
            event_wait_timeout_secs: 60,
        }
    }
}

/// Report output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportSettings {
    pub output_dir: PathBuf,
    pub json: bool,
    pub html: bool,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("test-results"),
            json: true,
            html: true,
        }
    }
}

impl Settings {
    /// Load configuration from file, falling back to defaults when the
    /// file does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let settings: Self = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration and apply `PIPECHECK_*` environment overrides
    pub fn load_with_env(path: &Path) -> Result<Self> {
        let mut settings = Self::load(path)?;
        settings.apply_env_overrides();
        Ok(settings)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply environment variable overrides on top of file values
    pub fn apply_env_overrides(&mut self) {
        if let Ok(email) = std::env::var("PIPECHECK_EMAIL") {
            self.credentials.email = email;
        }
        if let Ok(password) = std::env::var("PIPECHECK_PASSWORD") {
            self.credentials.password = password;
        }
        if let Ok(env) = std::env::var("PIPECHECK_ENV") {
            if let Ok(parsed) = env.parse() {
                self.environment = parsed;
            }
        }
        if let Ok(url) = std::env::var("PIPECHECK_WEBHOOK_URL") {
            self.webhook.url = Some(url);
        }
        if let Ok(headless) = std::env::var("PIPECHECK_HEADLESS") {
            self.browser.headless = matches!(headless.as_str(), "1" | "true" | "yes");
        }
    }

    /// Console base URL for the selected environment
    pub fn base_url(&self) -> &str {
        match self.environment {
            TargetEnv::Dev => &self.environments.dev,
            TargetEnv::Qa => &self.environments.qa,
            TargetEnv::Prod => &self.environments.prod,
        }
    }

    /// Validate the full configuration, collecting every violation
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        if self.credentials.email.is_empty() {
            problems.push("credentials.email is required".to_string());
        } else if !self.credentials.email.contains('@') {
            problems.push(format!(
                "credentials.email '{}' is not an email address",
                self.credentials.email
            ));
        }
        if self.credentials.password.is_empty() {
            problems.push("credentials.password is required".to_string());
        }

        for (name, value) in [
            ("environments.dev", &self.environments.dev),
            ("environments.qa", &self.environments.qa),
            ("environments.prod", &self.environments.prod),
        ] {
            if let Err(e) = validate_http_url(value) {
                problems.push(format!("{}: {}", name, e));
            }
        }
        if let Some(url) = &self.webhook.url {
            if let Err(e) = validate_http_url(url) {
                problems.push(format!("webhook.url: {}", e));
            }
        }

        if self.api.timeout_secs == 0 {
            problems.push("api.timeout_secs must be positive".to_string());
        }
        if self.api.retry_attempts == 0 {
            problems.push("api.retry_attempts must be at least 1".to_string());
        }
        if self.webhook.poll_interval_secs == 0 {
            problems.push("webhook.poll_interval_secs must be positive".to_string());
        }
        if self.webhook.delivery_timeout_secs == 0 {
            problems.push("webhook.delivery_timeout_secs must be positive".to_string());
        }
        if self.webhook.event_wait_timeout_secs == 0 {
            problems.push("webhook.event_wait_timeout_secs must be positive".to_string());
        }
        if self.browser.viewport_width == 0 || self.browser.viewport_height == 0 {
            problems.push("browser viewport dimensions must be positive".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::InvalidConfig(problems.join("; ")))
        }
    }

    /// Poll tick interval
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.webhook.poll_interval_secs)
    }

    /// Deadline for delivery count verification
    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_secs(self.webhook.delivery_timeout_secs)
    }

    /// Deadline for a new event to appear
    pub fn event_wait_timeout(&self) -> Duration {
        Duration::from_secs(self.webhook.event_wait_timeout_secs)
    }
}

fn validate_http_url(value: &str) -> std::result::Result<(), String> {
    match url::Url::parse(value) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => Ok(()),
        Ok(url) => Err(format!("unsupported scheme '{}'", url.scheme())),
        Err(e) => Err(e.to_string()),
    }
}
