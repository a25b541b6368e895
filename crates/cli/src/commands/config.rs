//! Configuration commands: validation and starter file setup

use std::path::Path;

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use pipecheck_browser::BrowserSession;
use pipecheck_common::Settings;

use crate::output::{
    print_error, print_info, print_list, print_success, print_warning, OutputFormat, TableDisplay,
};

#[derive(Args)]
pub struct SetupArgs {
    /// Overwrite an existing configuration file
    #[arg(long)]
    force: bool,
}

#[derive(Serialize)]
struct SettingRow {
    setting: &'static str,
    value: String,
}

impl TableDisplay for SettingRow {
    fn headers() -> Vec<&'static str> {
        vec!["Setting", "Value"]
    }

    fn row(&self) -> Vec<String> {
        vec![self.setting.to_string(), self.value.clone()]
    }
}

fn mask(secret: &str) -> String {
    if secret.is_empty() {
        "(not set)".to_string()
    } else {
        "********".to_string()
    }
}

fn effective_rows(settings: &Settings) -> Vec<SettingRow> {
    let row = |setting, value: String| SettingRow { setting, value };
    vec![
        row("environment", settings.environment.to_string()),
        row("base URL", settings.base_url().to_string()),
        row("credentials.email", settings.credentials.email.clone()),
        row("credentials.password", mask(&settings.credentials.password)),
        row("browser.kind", settings.browser.kind.to_string()),
        row("browser.headless", settings.browser.headless.to_string()),
        row("api.timeout_secs", settings.api.timeout_secs.to_string()),
        row(
            "api.retry_attempts",
            settings.api.retry_attempts.to_string(),
        ),
        row(
            "api.retry_backoff_secs",
            settings.api.retry_backoff_secs.to_string(),
        ),
        row(
            "webhook.url",
            settings
                .webhook
                .url
                .clone()
                .unwrap_or_else(|| "(not set)".to_string()),
        ),
        row(
            "webhook.poll_interval_secs",
            settings.webhook.poll_interval_secs.to_string(),
        ),
        row(
            "webhook.delivery_timeout_secs",
            settings.webhook.delivery_timeout_secs.to_string(),
        ),
        row(
            "webhook.event_wait_timeout_secs",
            settings.webhook.event_wait_timeout_secs.to_string(),
        ),
        row(
            "report.output_dir",
            settings.report.output_dir.display().to_string(),
        ),
    ]
}

/// Load the configuration, print the effective values, and validate them.
///
/// Exits nonzero when validation fails so CI can gate on it.
pub fn execute_validate(config_path: &Path, format: OutputFormat) -> Result<()> {
    let settings = Settings::load_with_env(config_path)?;

    print_list(&effective_rows(&settings), format);
    println!();

    if settings
        .webhook
        .url
        .as_deref()
        .unwrap_or_default()
        .is_empty()
    {
        print_warning("webhook.url is not set; forwarding scenarios will be skipped");
    }

    match settings.validate() {
        Ok(()) => {
            print_success(&format!(
                "configuration at {} is valid",
                config_path.display()
            ));
            Ok(())
        }
        Err(e) => {
            print_error(&e.to_string());
            std::process::exit(1);
        }
    }
}

/// Write a starter configuration file and prepare the working directory
pub fn execute_setup(args: SetupArgs, config_path: &Path) -> Result<()> {
    if config_path.exists() && !args.force {
        print_error(&format!(
            "{} already exists (use --force to overwrite)",
            config_path.display()
        ));
        std::process::exit(1);
    }

    let settings = Settings::default();
    settings.save(config_path)?;
    std::fs::create_dir_all(&settings.report.output_dir)?;

    print_success(&format!(
        "starter configuration written to {}",
        config_path.display()
    ));
    print_info(&format!(
        "reports will land in {}",
        settings.report.output_dir.display()
    ));

    match BrowserSession::check_playwright_installed() {
        Ok(()) => print_success("playwright toolchain found"),
        Err(e) => print_warning(&e.to_string()),
    }

    print_info("set credentials in the file or via PIPECHECK_EMAIL / PIPECHECK_PASSWORD");
    Ok(())
}
