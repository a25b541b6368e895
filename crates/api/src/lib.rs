//! Pipecheck API Clients
//!
//! HTTP clients for the two out-of-browser surfaces a scenario talks to:
//! the ingestion data plane and the webhook receiver's request log.

pub mod ingest;
pub mod webhook;

pub use ingest::{IngestClient, RetryPolicy, SendOutcome};
pub use webhook::{ReceivedEvent, WebhookProbe};
