//! Scenarios command: inspect the catalog without running anything

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use pipecheck_e2e::{catalog, Scenario};

use crate::output::{print_list, OutputFormat, TableDisplay};

#[derive(Args)]
pub struct ScenariosArgs {
    /// Show only scenarios carrying this marker
    #[arg(short, long)]
    marker: Option<String>,
}

#[derive(Serialize)]
struct ScenarioDisplay {
    name: String,
    markers: String,
    needs_webhook: bool,
    description: String,
}

impl From<&Scenario> for ScenarioDisplay {
    fn from(scenario: &Scenario) -> Self {
        Self {
            name: scenario.name.to_string(),
            markers: scenario.markers.join(", "),
            needs_webhook: scenario.requires_webhook,
            description: scenario.description.to_string(),
        }
    }
}

impl TableDisplay for ScenarioDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Name", "Markers", "Needs Webhook", "Description"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.markers.clone(),
            if self.needs_webhook { "yes" } else { "no" }.to_string(),
            self.description.clone(),
        ]
    }
}

pub fn execute(args: ScenariosArgs, format: OutputFormat) -> Result<()> {
    let scenarios: Vec<ScenarioDisplay> = catalog()
        .iter()
        .filter(|s| {
            args.marker
                .as_deref()
                .map_or(true, |marker| s.markers.iter().any(|m| *m == marker))
        })
        .map(ScenarioDisplay::from)
        .collect();

    print_list(&scenarios, format);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_flattens_markers() {
        let scenario = catalog()
            .iter()
            .find(|s| s.name == "basic_flow")
            .expect("catalog entry");
        let display = ScenarioDisplay::from(scenario);
        assert_eq!(display.markers, "smoke, integration");
        assert!(!display.needs_webhook);
    }
}
