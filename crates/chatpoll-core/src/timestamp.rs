//! Lenient timestamp (de)serialization.
//!
//! Servers emit either RFC 3339 strings or naive ISO-8601 date-times without
//! an offset. Naive values are taken to be UTC. Output is always RFC 3339.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serializer};

pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&value.to_rfc3339())
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse(&raw).map_err(serde::de::Error::custom)
}

/// Parses an RFC 3339 or naive ISO-8601 timestamp.
pub fn parse(raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| format!("invalid timestamp '{raw}': {e}"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn offset_is_normalised_to_utc() {
        let dt = parse("2025-03-01T12:00:00+02:00").unwrap();
        assert_eq!(dt.to_rfc3339(), "2025-03-01T10:00:00+00:00");
    }

    #[test]
    fn naive_without_fraction() {
        let dt = parse("2025-03-01T12:00:00").unwrap();
        assert_eq!(dt.to_rfc3339(), "2025-03-01T12:00:00+00:00");
    }

    #[test]
    fn garbage_is_rejected() {
        let err = parse("yesterday").unwrap_err();
        assert!(err.contains("yesterday"));
    }
}
