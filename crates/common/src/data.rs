//! Deterministic test data generation
//!
//! Scenario runs need realistic-looking events without depending on
//! anything external. The factory is seeded so a failing run can be
//! replayed with identical payloads.

use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;
use uuid::Uuid;

use crate::event::{EventBuilder, TrackEvent};

/// Event names exercised by the regression scenarios
pub const STANDARD_EVENTS: [&str; 4] = ["page_view", "product_viewed", "add_to_cart", "purchase"];

const PRODUCT_NAMES: [&str; 6] = [
    "Trail Runner Shoes",
    "Canvas Backpack",
    "Insulated Bottle",
    "Merino Hoodie",
    "Climbing Rope",
    "Camp Stove",
];
const CATEGORIES: [&str; 4] = ["footwear", "bags", "apparel", "gear"];
const BRANDS: [&str; 4] = ["Northbound", "Cragsmith", "Fjellrev", "BasecampCo"];
const LOCALES: [&str; 4] = ["en-US", "en-GB", "de-DE", "ja-JP"];
const TIMEZONES: [&str; 4] = [
    "America/New_York",
    "Europe/Berlin",
    "Asia/Tokyo",
    "Australia/Sydney",
];
const USER_AGENTS: [&str; 3] = [
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0",
];
const CAMPAIGN_SOURCES: [&str; 3] = ["newsletter", "google", "partner"];
const FIRST_NAMES: [&str; 5] = ["Ada", "Bram", "Chidi", "Dana", "Emil"];
const LAST_NAMES: [&str; 5] = ["Okafor", "Lindqvist", "Marsh", "Tanaka", "Vega"];

/// Seeded generator for events, users, and credentials
pub struct EventFactory {
    rng: StdRng,
}

/// Synthetic console user for negative-path scenarios
#[derive(Debug, Clone)]
pub struct TestUser {
    pub email: String,
    pub password: String,
    pub name: String,
}

impl EventFactory {
    pub const DEFAULT_SEED: u64 = 42;

    pub fn new() -> Self {
        Self::with_seed(Self::DEFAULT_SEED)
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// A commerce-flavored tracking event with realistic properties
    pub fn track_event(&mut self, name: &str) -> TrackEvent {
        let price = self.money(9.99, 499.99);
        let mut builder = EventBuilder::new(name)
            .user_id(self.user_id())
            .property("product_id", Uuid::new_v4().to_string())
            .property("product_name", self.pick(&PRODUCT_NAMES))
            .property("price", price)
            .property("quantity", self.rng.gen_range(1..=5))
            .property("category", self.pick(&CATEGORIES))
            .property("brand", self.pick(&BRANDS))
            .property("currency", "USD");

        if self.rng.gen_bool(0.3) {
            builder = builder.property("discount", self.money(0.05, 0.30));
        }

        let product_slug = self.pick(&CATEGORIES).to_string();
        builder
            .context(
                "page",
                json!({
                    "url": format!("https://shop.example.com/{}", product_slug),
                    "title": "Product catalog",
                    "referrer": "https://www.google.com/",
                }),
            )
            .context("user_agent", self.pick(&USER_AGENTS))
            .context("locale", self.pick(&LOCALES))
            .context("timezone", self.pick(&TIMEZONES))
            .context(
                "screen",
                json!({ "width": 1920, "height": 1080 }),
            )
            .context(
                "campaign",
                json!({
                    "name": format!("launch_{}", self.rng.gen_range(1..=9)),
                    "source": self.pick(&CAMPAIGN_SOURCES),
                    "medium": "email",
                }),
            )
            .build()
    }

    /// One event per standard event name, in order
    pub fn standard_events(&mut self) -> Vec<TrackEvent> {
        STANDARD_EVENTS.iter().map(|name| self.track_event(name)).collect()
    }

    pub fn user(&mut self) -> TestUser {
        let first = self.pick(&FIRST_NAMES);
        let last = self.pick(&LAST_NAMES);
        TestUser {
            email: format!(
                "{}.{}+e2e@example.com",
                first.to_lowercase(),
                last.to_lowercase()
            ),
            password: self.alnum(16),
            name: format!("{} {}", first, last),
        }
    }

    /// A write-key-shaped credential, 32 alphanumeric characters
    pub fn write_key(&mut self) -> String {
        self.alnum(32)
    }

    pub fn user_id(&mut self) -> String {
        format!("user_{}", self.alnum(8).to_lowercase())
    }

    fn pick<'a>(&mut self, options: &[&'a str]) -> &'a str {
        options[self.rng.gen_range(0..options.len())]
    }

    fn alnum(&mut self, len: usize) -> String {
        (0..len).map(|_| self.rng.sample(Alphanumeric) as char).collect()
    }

    fn money(&mut self, low: f64, high: f64) -> f64 {
        let value: f64 = self.rng.gen_range(low..high);
        (value * 100.0).round() / 100.0
    }
}

impl Default for EventFactory {
    fn default() -> Self {
        Self::new()
    }
}
