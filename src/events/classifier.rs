//! Raw payload classification
//!
//! A pure mapping from [`RawEvent`] to [`Event`]. Classification never
//! fails: anything the discriminators do not account for degrades to the
//! `Unclassified` category or subcategory with the payload preserved, so
//! one malformed event cannot abort a batch and wildcard handlers still
//! observe it.

use chrono::Utc;
use serde_json::Value;

use super::types::{Event, EventCategory, EventSubcategory};
use crate::transport::RawEvent;

/// Classify one raw inbound event.
pub fn classify(raw: RawEvent) -> Event {
    let category = raw
        .event
        .parse::<EventCategory>()
        .unwrap_or(EventCategory::Unclassified);

    // The stream substitutes the literal string "ping" for keep-alive
    // frames; treat it as an empty payload.
    let payload = match raw.data {
        Value::String(s) if s == "ping" => Value::Object(serde_json::Map::new()),
        other => other,
    };

    let subcategory = payload
        .get("subEvent")
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<EventSubcategory>().ok())
        .unwrap_or(EventSubcategory::Unclassified);

    Event {
        id: raw.id,
        category,
        subcategory,
        payload,
        received_at: Utc::now(),
    }
}
