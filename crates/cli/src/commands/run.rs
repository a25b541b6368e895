//! Run command: execute verification scenarios and report the outcome

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use pipecheck_common::Settings;
use pipecheck_e2e::{report, ScenarioResult, SuiteResult, SuiteRunner};

use crate::output::{print_list, print_message, OutputFormat, TableDisplay};

#[derive(Args)]
pub struct RunArgs {
    /// Run only scenarios carrying this marker (smoke, integration, regression)
    #[arg(short, long)]
    marker: Option<String>,

    /// Run only the named scenario
    #[arg(short, long)]
    scenario: Option<String>,

    /// Target environment (dev, qa, prod)
    #[arg(short, long)]
    env: Option<String>,

    /// Browser engine (chromium, firefox, webkit)
    #[arg(long)]
    browser: Option<String>,

    /// Run the browser with a visible window
    #[arg(long)]
    headed: bool,

    /// Directory for report files
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Skip report files, print the summary only
    #[arg(long)]
    no_reports: bool,
}

#[derive(Serialize)]
struct ResultDisplay {
    scenario: String,
    verdict: String,
    duration_ms: u64,
    steps: usize,
    detail: String,
}

impl From<&ScenarioResult> for ResultDisplay {
    fn from(result: &ScenarioResult) -> Self {
        let verdict = if result.skipped {
            "skipped"
        } else if result.success {
            "passed"
        } else {
            "failed"
        };
        Self {
            scenario: result.name.clone(),
            verdict: verdict.to_string(),
            duration_ms: result.duration_ms,
            steps: result.steps.len(),
            detail: result.error.clone().unwrap_or_else(|| "-".to_string()),
        }
    }
}

impl TableDisplay for ResultDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Scenario", "Verdict", "Duration (ms)", "Steps", "Detail"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.scenario.clone(),
            self.verdict.clone(),
            self.duration_ms.to_string(),
            self.steps.to_string(),
            self.detail.clone(),
        ]
    }
}

pub async fn execute(args: RunArgs, config_path: &Path, format: OutputFormat) -> Result<()> {
    let mut settings = Settings::load_with_env(config_path)?;
    debug!("configuration loaded from {}", config_path.display());

    if let Some(env) = args.env.as_deref() {
        settings.environment = env.parse()?;
    }
    if let Some(browser) = args.browser.as_deref() {
        settings.browser.kind = browser.parse()?;
    }
    if args.headed {
        settings.browser.headless = false;
    }
    if let Some(dir) = args.output {
        settings.report.output_dir = dir;
    }

    // Ctrl-C aborts in-flight polls instead of killing the process mid-write
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\ninterrupt received, finishing the current scenario");
                cancel.cancel();
            }
        });
    }

    let runner = SuiteRunner::new(settings.clone()).with_cancellation(cancel);
    let result = if let Some(name) = args.scenario.as_deref() {
        runner.run_named(name).await?
    } else if let Some(marker) = args.marker.as_deref() {
        runner.run_marked(marker).await?
    } else {
        runner.run_all().await?
    };

    let rows: Vec<ResultDisplay> = result.results.iter().map(ResultDisplay::from).collect();
    print_list(&rows, format);
    print_summary(&result);

    if !args.no_reports {
        if settings.report.json {
            let path = report::write_json(&result, &settings.report.output_dir)?;
            print_message(&format!("JSON report: {}", path.display()), format);
        }
        if settings.report.html {
            let path = report::write_html(&result, &settings.report.output_dir)?;
            print_message(&format!("HTML report: {}", path.display()), format);
        }
    }

    if !result.all_passed() {
        std::process::exit(1);
    }
    Ok(())
}

fn print_summary(result: &SuiteResult) {
    let verdict = if result.all_passed() {
        "PASSED".green().bold()
    } else {
        "FAILED".red().bold()
    };
    println!();
    println!(
        "{}: {} passed, {} failed, {} skipped of {} in {} ms (env: {})",
        verdict,
        result.passed,
        result.failed,
        result.skipped,
        result.total,
        result.duration_ms,
        result.environment
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(success: bool, skipped: bool) -> ScenarioResult {
        ScenarioResult {
            name: "basic_flow".to_string(),
            success,
            skipped,
            duration_ms: 1200,
            steps: Vec::new(),
            error: (!success && !skipped).then(|| "delivery count timed out".to_string()),
        }
    }

    #[test]
    fn verdicts_cover_all_three_outcomes() {
        assert_eq!(ResultDisplay::from(&sample(true, false)).verdict, "passed");
        assert_eq!(ResultDisplay::from(&sample(false, false)).verdict, "failed");
        assert_eq!(ResultDisplay::from(&sample(false, true)).verdict, "skipped");
    }

    #[test]
    fn failure_detail_carries_the_error() {
        let display = ResultDisplay::from(&sample(false, false));
        assert_eq!(display.detail, "delivery count timed out");

        let display = ResultDisplay::from(&sample(true, false));
        assert_eq!(display.detail, "-");
    }
}
