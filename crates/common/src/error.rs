//! Error types for pipecheck

use thiserror::Error;

/// Result type alias using pipecheck Error
pub type Result<T> = std::result::Result<T, Error>;

/// Pipecheck error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    #[error("Navigation failed on {page}: {reason}")]
    Navigation { page: String, reason: String },

    #[error("Browser driver error: {0}")]
    Driver(String),

    #[error("Playwright not found (run `npm install playwright` and `npx playwright install`)")]
    PlaywrightNotFound,

    #[error("Browser script failed: {0}")]
    Script(String),

    #[error("Scrape failed: {0}")]
    Scrape(String),

    #[error("Operation timed out after {seconds}s: {operation}")]
    Timeout { operation: String, seconds: u64 },

    #[error("Scenario not found: {0}")]
    ScenarioNotFound(String),

    #[error("Assertion failed: {0}")]
    Assertion(String),
}
