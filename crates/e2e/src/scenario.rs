//! The scenario catalog.
//!
//! Scenarios are plain async functions over [`ScenarioCtx`], registered in
//! a static table with the markers the harness filters on. A scenario
//! fails on the first step whose `Result` is an error; everything recorded
//! up to that point lands in the report.

use futures::future::BoxFuture;
use tracing::{debug, info};

use pipecheck_api::IngestClient;
use pipecheck_browser::{ConnectionsPage, LoginPage, WebhookDestinationPage};
use pipecheck_common::{
    Error, EventBuilder, EventCounts, EventFactory, PollOutcome, Result, TrackEvent,
};

use crate::runner::ScenarioCtx;

type ScenarioFn = for<'a> fn(&'a ScenarioCtx) -> BoxFuture<'a, Result<()>>;

/// A scenario registered with the runner
pub struct Scenario {
    pub name: &'static str,
    pub description: &'static str,
    /// Harness filters on these (smoke, integration, regression)
    pub markers: &'static [&'static str],
    /// Skipped unless `webhook.url` is configured
    pub requires_webhook: bool,
    run: ScenarioFn,
}

impl Scenario {
    pub(crate) async fn execute(&self, ctx: &ScenarioCtx) -> Result<()> {
        (self.run)(ctx).await
    }
}

/// All registered scenarios, in execution order
pub fn catalog() -> &'static [Scenario] {
    &CATALOG
}

/// Look up a scenario by name
pub fn find(name: &str) -> Option<&'static Scenario> {
    CATALOG.iter().find(|s| s.name == name)
}

static CATALOG: [Scenario; 4] = [
    Scenario {
        name: "basic_flow",
        description: "Log in, extract connection details, send one event, verify delivery",
        markers: &["smoke", "integration"],
        requires_webhook: false,
        run: basic_flow,
    },
    Scenario {
        name: "event_tracking",
        description: "Send a burst of standard events and watch the counters converge",
        markers: &["regression"],
        requires_webhook: false,
        run: event_tracking,
    },
    Scenario {
        name: "error_handling",
        description: "Bad credentials, unknown write keys, and malformed events fail cleanly",
        markers: &["regression"],
        requires_webhook: false,
        run: error_handling,
    },
    Scenario {
        name: "webhook_delivery",
        description: "Verify events are forwarded to the external webhook receiver",
        markers: &["integration"],
        requires_webhook: true,
        run: webhook_delivery,
    },
];

/// Connection details a scenario pulls out of the console UI
struct ConnectionDetails {
    data_plane_url: String,
    write_key: String,
}

/// Log in with the configured credentials.
async fn sign_in(ctx: &ScenarioCtx) -> Result<()> {
    let settings = ctx.settings();
    let login = LoginPage::new(ctx.session(), ctx.base_url());
    ctx.step("log in to console", async {
        login.open().await?;
        login
            .login(&settings.credentials.email, &settings.credentials.password)
            .await
    })
    .await
}

/// Open the connections page and pull out the ingestion coordinates.
async fn extract_connection_details(ctx: &ScenarioCtx) -> Result<ConnectionDetails> {
    let connections = ConnectionsPage::new(ctx.session(), ctx.base_url());
    ctx.step("open connections page", connections.open()).await?;

    let data_plane_url = ctx
        .step("extract data plane URL", async {
            connections.data_plane_url().await?.ok_or_else(|| {
                Error::Assertion("no data plane URL on the connections page".to_string())
            })
        })
        .await?;

    let write_key = ctx
        .step("extract HTTP source write key", async {
            connections
                .http_source_write_key()
                .await?
                .ok_or_else(|| Error::Assertion("no HTTP source with a write key".to_string()))
        })
        .await?;

    Ok(ConnectionDetails {
        data_plane_url,
        write_key,
    })
}

/// Send one event, mapping an unsuccessful outcome to a step failure.
async fn send_checked(client: &IngestClient, event: &TrackEvent) -> Result<()> {
    let outcome = client.send_event(event).await;
    if outcome.success {
        Ok(())
    } else {
        Err(Error::Assertion(format!(
            "ingestion rejected '{}' after {} attempt(s): {}",
            event.event,
            outcome.attempts,
            outcome.error.unwrap_or_else(|| "unknown error".to_string())
        )))
    }
}

/// Fold a poll verdict into a step result.
fn expect_satisfied(outcome: PollOutcome<EventCounts, Error>, what: &str) -> Result<()> {
    match outcome {
        PollOutcome::Satisfied { ticks, elapsed, .. } => {
            debug!(
                what,
                ticks,
                elapsed_ms = elapsed.as_millis() as u64,
                "condition held"
            );
            Ok(())
        }
        PollOutcome::TimedOut {
            last,
            ticks,
            elapsed,
        } => Err(Error::Timeout {
            operation: format!("{} ({} ticks, last: {})", what, ticks, describe_counts(last)),
            seconds: elapsed.as_secs(),
        }),
        PollOutcome::ProbeFailed { error, ticks, .. } => Err(Error::Assertion(format!(
            "{} probe failed on tick {}: {}",
            what, ticks, error
        ))),
        PollOutcome::Cancelled { ticks, .. } => Err(Error::Assertion(format!(
            "{} poll cancelled after {} tick(s)",
            what, ticks
        ))),
    }
}

fn describe_counts(counts: Option<EventCounts>) -> String {
    counts
        .map(|c| format!("{}/{} delivered", c.delivered, c.total))
        .unwrap_or_else(|| "no observation".to_string())
}

/// Full happy path: login, extract, ingest one event, confirm delivery.
fn basic_flow(ctx: &ScenarioCtx) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        sign_in(ctx).await?;

        let connections = ConnectionsPage::new(ctx.session(), ctx.base_url());
        let sources = ctx.step("list sources", connections.sources()).await?;
        if sources.is_empty() {
            return Err(Error::Assertion(
                "connections page lists no sources".to_string(),
            ));
        }
        let destinations = ctx
            .step("list destinations", connections.destinations())
            .await?;
        if destinations.is_empty() {
            return Err(Error::Assertion(
                "connections page lists no destinations".to_string(),
            ));
        }

        let details = extract_connection_details(ctx).await?;

        let detail_url = ctx
            .step(
                "open webhook destination",
                connections.open_webhook_destination(),
            )
            .await?;
        let destination = WebhookDestinationPage::new(ctx.session(), detail_url);

        let baseline = ctx
            .step("read baseline delivery counts", destination.event_counts())
            .await?;

        let client = ctx.ingest_client(&details.data_plane_url, &details.write_key)?;
        let mut factory = EventFactory::new();
        let event = factory.track_event("product_viewed");
        ctx.step("send tracking event", send_checked(&client, &event))
            .await?;

        let poller = ctx.delivery_poller();
        ctx.step("verify event delivery", async {
            let outcome = destination
                .verify_event_delivery(baseline.delivered + 1, &poller)
                .await;
            expect_satisfied(outcome, "delivery count")
        })
        .await?;

        Ok(())
    })
}

/// Send a single event, wait for it to arrive, then push the standard
/// batch and verify the counters account for all of it.
fn event_tracking(ctx: &ScenarioCtx) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        sign_in(ctx).await?;
        let details = extract_connection_details(ctx).await?;

        let connections = ConnectionsPage::new(ctx.session(), ctx.base_url());
        let detail_url = ctx
            .step(
                "open webhook destination",
                connections.open_webhook_destination(),
            )
            .await?;
        let destination = WebhookDestinationPage::new(ctx.session(), detail_url);

        ctx.step("open events tab", destination.open_events_tab())
            .await?;
        ctx.step("refresh event table", destination.refresh()).await?;
        let baseline = ctx
            .step("read baseline delivery counts", destination.event_counts())
            .await?;

        let client = ctx.ingest_client(&details.data_plane_url, &details.write_key)?;
        let mut factory = EventFactory::new();

        let first = factory.track_event("page_view");
        ctx.step("send first event", send_checked(&client, &first))
            .await?;

        let wait_poller = ctx.event_wait_poller();
        ctx.step("wait for the event to arrive", async {
            let outcome = destination.wait_for_event(&wait_poller).await?;
            expect_satisfied(outcome, "new event arrival")
        })
        .await?;

        let events = factory.standard_events();
        let sent = events.len() as u64;
        ctx.step("send standard event batch", async {
            let outcomes = client.send_batch(&events).await;
            let rejected = outcomes.iter().filter(|o| !o.success).count();
            if rejected == 0 {
                Ok(())
            } else {
                Err(Error::Assertion(format!(
                    "{} of {} events rejected",
                    rejected,
                    outcomes.len()
                )))
            }
        })
        .await?;

        let poller = ctx.delivery_poller();
        ctx.step("verify batch delivery", async {
            let outcome = destination
                .verify_event_delivery(baseline.delivered + 1 + sent, &poller)
                .await;
            expect_satisfied(outcome, "batch delivery count")
        })
        .await?;

        ctx.step("inspect latest event row", async {
            match destination.latest_event().await? {
                Some(record) => {
                    debug!(status = %record.status, "latest event row");
                    Ok(())
                }
                None => Err(Error::Assertion(
                    "event table is empty after deliveries".to_string(),
                )),
            }
        })
        .await?;

        ctx.step("check delivery stats", async {
            let stats = destination.delivery_stats().await?;
            if stats.counts.delivered == 0 {
                return Err(Error::Assertion(
                    "no deliveries recorded in stats".to_string(),
                ));
            }
            info!(success_rate = stats.success_rate, "destination delivery stats");
            Ok(())
        })
        .await?;

        Ok(())
    })
}

/// Bad credentials, an unknown write key, and a malformed event must all
/// fail loudly without taking the suite down.
fn error_handling(ctx: &ScenarioCtx) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let login = LoginPage::new(ctx.session(), ctx.base_url());

        ctx.step("reject invalid credentials", async {
            let stranger = EventFactory::new().user();
            login.open().await?;
            match login.login(&stranger.email, &stranger.password).await {
                Ok(()) => Err(Error::Assertion(
                    "console accepted invalid credentials".to_string(),
                )),
                Err(e) => {
                    debug!(%e, "login rejected as expected");
                    if let Some(banner) = login.error_message().await? {
                        debug!(%banner, "console error banner");
                    }
                    Ok(())
                }
            }
        })
        .await?;

        ctx.step("confirm session is not authenticated", async {
            if login.is_logged_in().await? {
                Err(Error::Assertion(
                    "session reports logged in after a rejected login".to_string(),
                ))
            } else {
                Ok(())
            }
        })
        .await?;

        // Real login so the API checks can reach the data plane
        sign_in(ctx).await?;
        let details = extract_connection_details(ctx).await?;

        ctx.step("reject unknown write key", async {
            let mut factory = EventFactory::new();
            let bogus = ctx.ingest_client(&details.data_plane_url, &factory.write_key())?;
            let outcome = bogus.send_event(&factory.track_event("page_view")).await;
            if outcome.success {
                Err(Error::Assertion(
                    "data plane accepted an unknown write key".to_string(),
                ))
            } else {
                debug!(status = ?outcome.status_code, "unknown key rejected as expected");
                Ok(())
            }
        })
        .await?;

        ctx.step("reject malformed event locally", async {
            let client = ctx.ingest_client(&details.data_plane_url, &details.write_key)?;
            let nameless = EventBuilder::new("").build();
            let outcome = client.send_event(&nameless).await;
            if outcome.success {
                return Err(Error::Assertion(
                    "client sent an event with no name".to_string(),
                ));
            }
            if outcome.attempts != 0 {
                return Err(Error::Assertion(format!(
                    "malformed event reached the network ({} attempts)",
                    outcome.attempts
                )));
            }
            Ok(())
        })
        .await?;

        Ok(())
    })
}

/// Drive events through the pipeline and watch them land on the external
/// webhook receiver.
fn webhook_delivery(ctx: &ScenarioCtx) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let probe = ctx.webhook_probe()?.ok_or_else(|| {
            Error::InvalidConfig("webhook.url is required for this scenario".to_string())
        })?;

        sign_in(ctx).await?;
        let details = extract_connection_details(ctx).await?;

        let baseline = ctx
            .step("read webhook receiver baseline", probe.stats())
            .await?;

        let client = ctx.ingest_client(&details.data_plane_url, &details.write_key)?;
        let mut factory = EventFactory::new();
        let events = vec![
            factory.track_event("add_to_cart"),
            factory.track_event("purchase"),
        ];
        ctx.step("send events for forwarding", async {
            for event in &events {
                send_checked(&client, event).await?;
            }
            Ok(())
        })
        .await?;

        let poller = ctx.delivery_poller();
        let expected = baseline.total + events.len() as u64;
        ctx.step("await forwarded events", async {
            let outcome = probe.await_events(expected, &poller).await;
            expect_satisfied(outcome, "forwarded event count")
        })
        .await?;

        ctx.step("inspect forwarded requests", async {
            let received = probe.fetch_events(10).await?;
            if received.is_empty() {
                return Err(Error::Assertion(
                    "webhook receiver logged no requests".to_string(),
                ));
            }
            debug!(count = received.len(), "forwarded requests visible");
            Ok(())
        })
        .await?;

        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn catalog_names_are_unique() {
        let names: HashSet<&str> = catalog().iter().map(|s| s.name).collect();
        assert_eq!(names.len(), catalog().len());
    }

    #[test]
    fn markers_select_expected_scenarios() {
        let marked = |marker: &str| -> Vec<&str> {
            catalog()
                .iter()
                .filter(|s| s.markers.iter().any(|m| *m == marker))
                .map(|s| s.name)
                .collect()
        };
        assert_eq!(marked("smoke"), vec!["basic_flow"]);
        assert_eq!(marked("regression"), vec!["event_tracking", "error_handling"]);
        assert_eq!(marked("integration"), vec!["basic_flow", "webhook_delivery"]);
    }

    #[test]
    fn only_the_forwarding_scenario_needs_a_webhook() {
        let needing: Vec<&str> = catalog()
            .iter()
            .filter(|s| s.requires_webhook)
            .map(|s| s.name)
            .collect();
        assert_eq!(needing, vec!["webhook_delivery"]);
    }

    #[test]
    fn find_locates_scenarios_by_name() {
        assert!(find("basic_flow").is_some());
        assert!(find("nonexistent").is_none());
    }

    #[test]
    fn timed_out_polls_describe_the_last_observation() {
        let outcome: PollOutcome<EventCounts, Error> = PollOutcome::TimedOut {
            last: Some(EventCounts::new(2, 1)),
            ticks: 15,
            elapsed: std::time::Duration::from_secs(30),
        };
        let err = expect_satisfied(outcome, "delivery count").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("delivery count"));
        assert!(message.contains("2/3 delivered"));
        assert!(message.contains("15 ticks"));
    }

    #[test]
    fn satisfied_polls_pass() {
        let outcome: PollOutcome<EventCounts, Error> = PollOutcome::Satisfied {
            state: EventCounts::new(1, 0),
            ticks: 1,
            elapsed: std::time::Duration::from_millis(3),
        };
        assert!(expect_satisfied(outcome, "delivery count").is_ok());
    }
}
