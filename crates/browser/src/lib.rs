//! Pipecheck Browser Layer
//!
//! Drives the console through Playwright scripts executed by `node`. A
//! [`driver::BrowserSession`] owns one persistent browser profile per
//! scenario; the page objects in [`pages`] generate the scripts and map
//! their JSON results back onto typed values.

pub mod driver;
pub mod pages;

pub use driver::{BrowserConfig, BrowserSession};
pub use pages::{ConnectionsPage, DestinationInfo, LoginPage, SourceInfo, WebhookDestinationPage};
