//! Run reports: machine-readable JSON plus a static HTML summary.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::info;

use pipecheck_common::Result;

use crate::runner::SuiteResult;

/// Write `test-results.json` under `output_dir`
pub fn write_json(result: &SuiteResult, output_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)?;
    let path = output_dir.join("test-results.json");
    let json = serde_json::to_string_pretty(result)?;
    std::fs::write(&path, json)?;
    info!("results written to {}", path.display());
    Ok(path)
}

/// Write `report.html` under `output_dir`
pub fn write_html(result: &SuiteResult, output_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)?;
    let path = output_dir.join("report.html");
    std::fs::write(&path, render_html(result))?;
    info!("report written to {}", path.display());
    Ok(path)
}

fn render_html(result: &SuiteResult) -> String {
    let mut rows = String::new();
    for scenario in &result.results {
        let verdict = if scenario.skipped {
            "skipped"
        } else if scenario.success {
            "passed"
        } else {
            "failed"
        };

        let mut steps = String::new();
        for step in &scenario.steps {
            let mark = if step.success { "&#10003;" } else { "&#10007;" };
            let note = step
                .error
                .as_deref()
                .map(|e| format!(": {}", escape(e)))
                .unwrap_or_default();
            steps.push_str(&format!(
                "<li class=\"{}\">{} {} ({} ms){}</li>\n",
                if step.success { "pass" } else { "fail" },
                mark,
                escape(&step.name),
                step.duration_ms,
                note,
            ));
        }

        let error = scenario
            .error
            .as_deref()
            .map(|e| format!("<p class=\"error\">{}</p>", escape(e)))
            .unwrap_or_default();

        rows.push_str(&format!(
            "<tr class=\"{verdict}\"><td>{name}</td><td>{verdict}</td>\
             <td>{duration} ms</td><td><ul>{steps}</ul>{error}</td></tr>\n",
            verdict = verdict,
            name = escape(&scenario.name),
            duration = scenario.duration_ms,
            steps = steps,
            error = error,
        ));
    }

    format!(
        "<!DOCTYPE html>\n\
         <html lang=\"en\">\n\
         <head>\n\
         <meta charset=\"utf-8\">\n\
         <title>Pipecheck report: {env}</title>\n\
         <style>\n\
         body {{ font-family: sans-serif; margin: 2rem; }}\n\
         table {{ border-collapse: collapse; width: 100%; }}\n\
         th, td {{ border: 1px solid #ccc; padding: 0.5rem; text-align: left; vertical-align: top; }}\n\
         tr.passed td:nth-child(2) {{ color: #0a7a2f; }}\n\
         tr.failed td:nth-child(2) {{ color: #b00020; }}\n\
         tr.skipped td:nth-child(2) {{ color: #777; }}\n\
         ul {{ margin: 0; padding-left: 1.2rem; }}\n\
         li.fail {{ color: #b00020; }}\n\
         p.error {{ color: #b00020; }}\n\
         </style>\n\
         </head>\n\
         <body>\n\
         <h1>Pipecheck scenario report</h1>\n\
         <p>Environment: <strong>{env}</strong> &middot; pipecheck v{version} &middot; generated {generated}</p>\n\
         <p>{passed} passed, {failed} failed, {skipped} skipped of {total} ({duration} ms)</p>\n\
         <table>\n\
         <thead><tr><th>Scenario</th><th>Verdict</th><th>Duration</th><th>Steps</th></tr></thead>\n\
         <tbody>\n{rows}</tbody>\n\
         </table>\n\
         </body>\n\
         </html>\n",
        env = escape(&result.environment),
        version = pipecheck_common::VERSION,
        generated = Utc::now().to_rfc3339(),
        passed = result.passed,
        failed = result.failed,
        skipped = result.skipped,
        total = result.total,
        duration = result.duration_ms,
        rows = rows,
    )
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{ScenarioResult, StepResult};

    fn sample() -> SuiteResult {
        SuiteResult {
            environment: "dev".to_string(),
            total: 2,
            passed: 1,
            failed: 1,
            skipped: 0,
            duration_ms: 1234,
            results: vec![
                ScenarioResult {
                    name: "basic_flow".to_string(),
                    success: true,
                    skipped: false,
                    duration_ms: 1000,
                    steps: vec![StepResult {
                        name: "log in to console".to_string(),
                        success: true,
                        duration_ms: 400,
                        error: None,
                    }],
                    error: None,
                },
                ScenarioResult {
                    name: "event_tracking".to_string(),
                    success: false,
                    skipped: false,
                    duration_ms: 234,
                    steps: Vec::new(),
                    error: Some("scrape failed: <tbody> missing".to_string()),
                },
            ],
        }
    }

    #[test]
    fn json_report_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_json(&sample(), dir.path()).expect("write");
        let raw = std::fs::read_to_string(path).expect("read back");
        let parsed: SuiteResult = serde_json::from_str(&raw).expect("parse");
        assert_eq!(parsed.total, 2);
        assert_eq!(parsed.results.len(), 2);
        assert_eq!(parsed.results[0].steps[0].name, "log in to console");
    }

    #[test]
    fn html_report_escapes_error_text() {
        let html = render_html(&sample());
        assert!(html.contains("&lt;tbody&gt; missing"));
        assert!(!html.contains("<tbody> missing"));
        assert!(html.contains("1 passed, 1 failed, 0 skipped of 2"));
        assert!(html.contains("basic_flow"));
    }

    #[test]
    fn html_report_is_written_to_the_output_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_html(&sample(), dir.path()).expect("write");
        assert!(path.ends_with("report.html"));
        assert!(path.exists());
    }
}
