//! Scenario runner: per-scenario browser sessions, step recording, and
//! suite-level aggregation.

use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use pipecheck_api::{IngestClient, WebhookProbe};
use pipecheck_browser::{BrowserConfig, BrowserSession};
use pipecheck_common::{Error, Poller, Result, Settings};

use crate::scenario::{catalog, find, Scenario};

/// Outcome of one recorded step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub name: String,
    pub success: bool,
    pub duration_ms: u64,
    pub error: Option<String>,
}

/// Outcome of one scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,
    pub success: bool,
    pub skipped: bool,
    pub duration_ms: u64,
    pub steps: Vec<StepResult>,
    pub error: Option<String>,
}

impl ScenarioResult {
    fn skipped(name: &str, reason: &str) -> Self {
        Self {
            name: name.to_string(),
            success: false,
            skipped: true,
            duration_ms: 0,
            steps: Vec::new(),
            error: Some(reason.to_string()),
        }
    }
}

/// Outcome of a whole run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteResult {
    pub environment: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    pub results: Vec<ScenarioResult>,
}

impl SuiteResult {
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

/// Everything a scenario needs: validated settings, a fresh browser
/// session, poller and client factories, and the step recorder.
pub struct ScenarioCtx {
    settings: Settings,
    session: BrowserSession,
    cancel: CancellationToken,
    steps: Mutex<Vec<StepResult>>,
}

impl ScenarioCtx {
    pub fn new(settings: Settings, cancel: CancellationToken) -> Result<Self> {
        let session = BrowserSession::new(BrowserConfig::from_settings(&settings.browser))?;
        Ok(Self {
            settings,
            session,
            cancel,
            steps: Mutex::new(Vec::new()),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn session(&self) -> &BrowserSession {
        &self.session
    }

    /// Console base URL for the selected environment
    pub fn base_url(&self) -> &str {
        self.settings.base_url()
    }

    /// Poller sized for delivery count verification
    pub fn delivery_poller(&self) -> Poller {
        self.poller(self.settings.delivery_timeout())
    }

    /// Poller sized for waiting on a new event to appear at all
    pub fn event_wait_poller(&self) -> Poller {
        self.poller(self.settings.event_wait_timeout())
    }

    /// Poller with a custom deadline, wired to the suite abort token
    pub fn poller(&self, timeout: Duration) -> Poller {
        Poller::new(timeout)
            .with_interval(self.settings.poll_interval())
            .with_cancellation(self.cancel.clone())
    }

    /// Ingestion client for a data plane discovered during the scenario
    pub fn ingest_client(&self, data_plane_url: &str, write_key: &str) -> Result<IngestClient> {
        IngestClient::new(data_plane_url, write_key, &self.settings.api)
    }

    /// Probe for the external webhook receiver, when one is configured
    pub fn webhook_probe(&self) -> Result<Option<WebhookProbe>> {
        match self.settings.webhook.url.as_deref() {
            Some(url) if !url.is_empty() => Ok(Some(WebhookProbe::new(
                url,
                Duration::from_secs(self.settings.api.timeout_secs),
            )?)),
            _ => Ok(None),
        }
    }

    /// Run one step of a scenario, recording its outcome under `name`.
    ///
    /// The step's error is returned unchanged so scenarios can bail with
    /// `?`; the recorder keeps every step seen so far either way.
    pub async fn step<T>(&self, name: &str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        let start = Instant::now();
        let result = fut.await;
        let duration_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => {
                debug!("step '{}' ok ({} ms)", name, duration_ms);
                self.record(StepResult {
                    name: name.to_string(),
                    success: true,
                    duration_ms,
                    error: None,
                });
            }
            Err(e) => {
                error!("step '{}' failed: {}", name, e);
                self.record(StepResult {
                    name: name.to_string(),
                    success: false,
                    duration_ms,
                    error: Some(e.to_string()),
                });
            }
        }
        result
    }

    fn record(&self, step: StepResult) {
        match self.steps.lock() {
            Ok(mut guard) => guard.push(step),
            Err(poisoned) => poisoned.into_inner().push(step),
        }
    }

    /// Drain recorded steps; called once by the runner after the scenario.
    pub(crate) fn take_steps(&self) -> Vec<StepResult> {
        match self.steps.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

/// Runs catalog scenarios against one environment.
///
/// Each scenario gets a fresh browser session so login state never leaks
/// between them.
pub struct SuiteRunner {
    settings: Settings,
    cancel: CancellationToken,
}

impl SuiteRunner {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            cancel: CancellationToken::new(),
        }
    }

    /// Tie the suite to an external abort signal
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run every scenario in the catalog
    pub async fn run_all(&self) -> Result<SuiteResult> {
        self.settings.validate()?;
        let selected: Vec<&Scenario> = catalog().iter().collect();
        Ok(self.run_scenarios(&selected).await)
    }

    /// Run scenarios carrying `marker`
    pub async fn run_marked(&self, marker: &str) -> Result<SuiteResult> {
        self.settings.validate()?;
        let selected: Vec<&Scenario> = catalog()
            .iter()
            .filter(|s| s.markers.iter().any(|m| *m == marker))
            .collect();
        if selected.is_empty() {
            return Err(Error::ScenarioNotFound(format!(
                "no scenarios marked '{}'",
                marker
            )));
        }
        Ok(self.run_scenarios(&selected).await)
    }

    /// Run a single scenario by name
    pub async fn run_named(&self, name: &str) -> Result<SuiteResult> {
        self.settings.validate()?;
        let scenario = find(name).ok_or_else(|| Error::ScenarioNotFound(name.to_string()))?;
        Ok(self.run_scenarios(&[scenario]).await)
    }

    async fn run_scenarios(&self, scenarios: &[&Scenario]) -> SuiteResult {
        let start = Instant::now();
        let mut results = Vec::new();
        let mut passed = 0;
        let mut failed = 0;
        let mut skipped = 0;

        info!(
            environment = %self.settings.environment,
            count = scenarios.len(),
            "running scenarios"
        );

        for scenario in scenarios {
            if self.cancel.is_cancelled() {
                warn!(
                    "suite cancelled after {} of {} scenarios",
                    results.len(),
                    scenarios.len()
                );
                break;
            }

            if scenario.requires_webhook
                && self
                    .settings
                    .webhook
                    .url
                    .as_deref()
                    .unwrap_or_default()
                    .is_empty()
            {
                info!("- {} (skipped: no webhook URL configured)", scenario.name);
                skipped += 1;
                results.push(ScenarioResult::skipped(
                    scenario.name,
                    "no webhook URL configured",
                ));
                continue;
            }

            let result = self.run_scenario(scenario).await;
            if result.success {
                passed += 1;
                info!("✓ {} ({} ms)", result.name, result.duration_ms);
            } else {
                failed += 1;
                error!(
                    "✗ {} - {}",
                    result.name,
                    result.error.as_deref().unwrap_or("unknown error")
                );
            }
            results.push(result);
        }

        let duration_ms = start.elapsed().as_millis() as u64;

        info!("");
        info!(
            "Scenario results: {} passed, {} failed, {} skipped ({} ms)",
            passed, failed, skipped, duration_ms
        );

        SuiteResult {
            environment: self.settings.environment.to_string(),
            total: scenarios.len(),
            passed,
            failed,
            skipped,
            duration_ms,
            results,
        }
    }

    async fn run_scenario(&self, scenario: &Scenario) -> ScenarioResult {
        let start = Instant::now();
        debug!("running scenario: {}", scenario.name);

        let ctx = match ScenarioCtx::new(self.settings.clone(), self.cancel.clone()) {
            Ok(ctx) => ctx,
            Err(e) => {
                return ScenarioResult {
                    name: scenario.name.to_string(),
                    success: false,
                    skipped: false,
                    duration_ms: start.elapsed().as_millis() as u64,
                    steps: Vec::new(),
                    error: Some(format!("browser session: {}", e)),
                };
            }
        };

        let outcome = scenario.execute(&ctx).await;
        let steps = ctx.take_steps();
        let duration_ms = start.elapsed().as_millis() as u64;

        ScenarioResult {
            name: scenario.name.to_string(),
            success: outcome.is_ok(),
            skipped: false,
            duration_ms,
            steps,
            error: outcome.err().map(|e| e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suite_passes_only_without_failures() {
        let mut result = SuiteResult {
            environment: "dev".to_string(),
            total: 2,
            passed: 1,
            failed: 0,
            skipped: 1,
            duration_ms: 10,
            results: Vec::new(),
        };
        assert!(result.all_passed());
        result.failed = 1;
        assert!(!result.all_passed());
    }

    #[test]
    fn skipped_results_are_marked() {
        let result = ScenarioResult::skipped("webhook_delivery", "no webhook URL configured");
        assert!(result.skipped);
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("no webhook URL configured"));

        let json = serde_json::to_value(&result).expect("serializable");
        assert_eq!(json["skipped"], serde_json::json!(true));
        assert_eq!(json["steps"], serde_json::json!([]));
    }
}
