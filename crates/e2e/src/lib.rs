//! Pipecheck E2E Scenario Suite
//!
//! This crate drives complete validation passes against a Pipeboard
//! deployment:
//! - Logs in to the console through a real browser session
//! - Extracts the data plane URL and a write key from the connections page
//! - Sends tracking events through the HTTP ingestion API
//! - Polls delivery counters until they converge or a deadline passes
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                   Scenario Runner (Rust)                 │
//! ├──────────────────────────────────────────────────────────┤
//! │  SuiteRunner                                             │
//! │    ├── run_all / run_marked / run_named                  │
//! │    └── ScenarioCtx (fresh per scenario)                  │
//! │          ├── BrowserSession (Playwright via node)        │
//! │          ├── IngestClient  (data plane HTTP API)         │
//! │          ├── WebhookProbe  (external receiver endpoint)  │
//! │          └── Poller        (deadline-bounded conditions) │
//! ├──────────────────────────────────────────────────────────┤
//! │  Scenario catalog                                        │
//! │    ├── basic_flow         [smoke, integration]           │
//! │    ├── event_tracking     [regression]                   │
//! │    ├── error_handling     [regression]                   │
//! │    └── webhook_delivery   [integration]                  │
//! └──────────────────────────────────────────────────────────┘
//! ```

pub mod report;
pub mod runner;
pub mod scenario;

pub use runner::{ScenarioCtx, ScenarioResult, StepResult, SuiteResult, SuiteRunner};
pub use scenario::{catalog, find, Scenario};
