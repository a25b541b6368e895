//! Scenario harness entry point
//!
//! This file is the test binary that drives console scenarios end to end.
//! Run with: cargo test --package pipecheck-e2e --test e2e -- --marker smoke
//!
//! Exit codes: 0 when every selected scenario passes, 1 when any fails,
//! 2 when the run could not start at all.

use std::path::PathBuf;
use std::str::FromStr;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use pipecheck_common::{BrowserKind, Result, Settings, TargetEnv};
use pipecheck_e2e::{report, scenario, SuiteRunner};

#[derive(Parser, Debug)]
#[command(name = "pipecheck-e2e")]
#[command(about = "End-to-end scenario runner for the Pipeboard console")]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "pipecheck.toml")]
    config: PathBuf,

    /// Target environment (dev, qa, prod)
    #[arg(short, long)]
    env: Option<String>,

    /// Run only scenarios carrying this marker (smoke, integration, regression)
    #[arg(short, long)]
    marker: Option<String>,

    /// Run only the named scenario
    #[arg(short, long)]
    name: Option<String>,

    /// Browser engine (chromium, firefox, webkit)
    #[arg(long)]
    browser: Option<String>,

    /// Run the browser headful for debugging
    #[arg(long)]
    headed: bool,

    /// Output directory for reports
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// List scenarios and exit
    #[arg(long)]
    list: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    if args.list {
        for scenario in scenario::catalog() {
            println!(
                "{:<20} [{}] {}",
                scenario.name,
                scenario.markers.join(", "),
                scenario.description
            );
        }
        return;
    }

    let rt = tokio::runtime::Runtime::new().expect("failed to create tokio runtime");

    match rt.block_on(run(args)) {
        Ok(true) => std::process::exit(0),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(2);
        }
    }
}

async fn run(args: Args) -> Result<bool> {
    let mut settings = Settings::load_with_env(&args.config)?;

    if let Some(env) = args.env.as_deref() {
        settings.environment = TargetEnv::from_str(env)?;
    }
    if let Some(browser) = args.browser.as_deref() {
        settings.browser.kind = BrowserKind::from_str(browser)?;
    }
    if args.headed {
        settings.browser.headless = false;
    }
    if let Some(output) = args.output {
        settings.report.output_dir = output;
    }

    // Ctrl-C aborts in-flight polls instead of killing the process mid-write
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\ninterrupt received, aborting after the current poll tick");
                cancel.cancel();
            }
        });
    }

    let runner = SuiteRunner::new(settings.clone()).with_cancellation(cancel);

    let result = if let Some(name) = args.name.as_deref() {
        runner.run_named(name).await?
    } else if let Some(marker) = args.marker.as_deref() {
        runner.run_marked(marker).await?
    } else {
        runner.run_all().await?
    };

    if settings.report.json {
        report::write_json(&result, &settings.report.output_dir)?;
    }
    if settings.report.html {
        report::write_html(&result, &settings.report.output_dir)?;
    }

    Ok(result.all_passed())
}
