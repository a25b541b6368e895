//! Pipecheck Common Library
//!
//! Shared types and primitives for the pipecheck suite: configuration,
//! error types, the tracking event model, delivery counters, and the
//! condition poller every verification flow is built on.

pub mod config;
pub mod counts;
pub mod data;
pub mod error;
pub mod event;
pub mod poll;

// Re-export commonly used types
pub use config::{BrowserKind, Settings, TargetEnv};
pub use counts::{DeliveryStats, EventCounts, EventRecord};
pub use data::{EventFactory, TestUser};
pub use error::{Error, Result};
pub use event::{EventBuilder, TrackEvent};
pub use poll::{PollOutcome, Poller, ProbePolicy};

/// Pipecheck version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
