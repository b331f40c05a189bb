//! `createdAt` serialization helpers.
//!
//! The edge reports its creation time in whatever shape the backend produced:
//! RFC3339, a naive ISO timestamp, integer Unix seconds/milliseconds, float Unix
//! seconds, or `null`. A value that matches none of these is read as `None` instead of
//! failing the whole snapshot.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serializer};

/// Serializes `Option<DateTime<Utc>>` as RFC3339 or `null`.
pub fn serialize<S>(dt: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match dt {
        Some(dt) => serializer.serialize_some(&dt.to_rfc3339()),
        None => serializer.serialize_none(),
    }
}

/// Deserializes `Option<DateTime<Utc>>` leniently.
pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawTimestamp {
        String(String),
        I64(i64),
        F64(f64),
    }

    let parsed = match Option::<RawTimestamp>::deserialize(deserializer)? {
        Some(RawTimestamp::String(s)) => parse_timestamp_str(&s),
        Some(RawTimestamp::I64(ts)) => parse_unix_timestamp(ts),
        #[allow(clippy::cast_possible_truncation)]
        Some(RawTimestamp::F64(ts)) => DateTime::from_timestamp_millis((ts * 1000.0) as i64),
        None => None,
    };
    Ok(parsed)
}

fn parse_timestamp_str(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    match NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        Ok(naive) => Some(naive.and_utc()),
        Err(e) => {
            log::debug!("Ignoring unparseable createdAt '{s}': {e}");
            None
        }
    }
}

/// Parses a Unix timestamp with second/millisecond auto-detection.
fn parse_unix_timestamp(ts: i64) -> Option<DateTime<Utc>> {
    // Values larger than 10^11 are interpreted as milliseconds.
    if ts > 100_000_000_000 {
        DateTime::from_timestamp_millis(ts)
    } else {
        DateTime::from_timestamp(ts, 0)
    }
}
