//! Upstream sports data providers.
//!
//! Each adapter speaks one provider's API and normalizes its payloads into
//! [`crate::domain::NormalizedResult`] so the failover orchestrator can treat
//! them interchangeably.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;

pub mod espn;
pub mod factory;
pub mod http;
pub mod rapidapi;
pub mod theodds;
pub mod traits;

pub use espn::EspnProvider;
pub use factory::build_providers;
pub use http::ProviderHttp;
pub use rapidapi::RapidApiProvider;
pub use theodds::TheOddsProvider;
pub use traits::{parse_provider_kind, ProviderKind, SportsProvider};

/// Parse a score field that may arrive as a string or a number.
pub(crate) fn parse_score(value: &Value) -> Option<i32> {
    match value {
        Value::String(s) => s.trim().parse::<i32>().ok(),
        Value::Number(n) => n.as_i64().and_then(|v| i32::try_from(v).ok()),
        _ => None,
    }
}

/// Parse an ISO 8601 timestamp into UTC.
pub(crate) fn parse_datetime_utc(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    // ESPN emits minute-precision timestamps like "2026-01-10T01:00Z"
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%MZ")
        .ok()
        .map(|naive| naive.and_utc())
}

/// External ids arrive as strings in some payloads and numbers in others.
pub(crate) fn id_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}
