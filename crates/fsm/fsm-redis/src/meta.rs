//! Metadata hash encoding. Timestamps are RFC 3339 with microseconds; `expires_at` is absent for
//! records without TTL.

use chrono::{DateTime, SecondsFormat, Utc};
use fsm_core::{state_from_persisted, DataMap, Result, StateRecord, StorageError};
use std::collections::HashMap;
use std::time::Duration;

pub(crate) const FIELD_STATE: &str = "state";
pub(crate) const FIELD_CREATED_AT: &str = "created_at";
pub(crate) const FIELD_UPDATED_AT: &str = "updated_at";
pub(crate) const FIELD_EXPIRES_AT: &str = "expires_at";

pub(crate) fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(field: &str, raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| StorageError::Serialization(format!("Invalid {} '{}': {}", field, raw, e)))
}

/// Script arguments for an optional TTL: `(milliseconds, expires_at)`, both empty when absent.
pub(crate) fn ttl_args(now: DateTime<Utc>, ttl: Option<Duration>) -> Result<(String, String)> {
    match ttl {
        Some(ttl) => {
            let expires_at = fsm_core::expires_at_from(now, ttl)?;
            Ok((ttl.as_millis().to_string(), timestamp(expires_at)))
        }
        None => Ok((String::new(), String::new())),
    }
}

/// Builds a record from a metadata hash; `None` for an empty (missing) hash.
pub(crate) fn record_from_meta(
    meta: &HashMap<String, String>,
    data: DataMap,
) -> Result<Option<StateRecord>> {
    if meta.is_empty() {
        return Ok(None);
    }
    let required = |field: &str| {
        meta.get(field)
            .ok_or_else(|| StorageError::Serialization(format!("Missing '{}' in metadata", field)))
    };
    let created_at = parse_timestamp(FIELD_CREATED_AT, required(FIELD_CREATED_AT)?)?;
    let updated_at = match meta.get(FIELD_UPDATED_AT) {
        Some(raw) => parse_timestamp(FIELD_UPDATED_AT, raw)?,
        None => created_at,
    };
    let expires_at = match meta.get(FIELD_EXPIRES_AT).filter(|raw| !raw.is_empty()) {
        Some(raw) => Some(parse_timestamp(FIELD_EXPIRES_AT, raw)?),
        None => None,
    };
    Ok(Some(StateRecord {
        state: meta
            .get(FIELD_STATE)
            .and_then(|raw| state_from_persisted(raw)),
        data,
        created_at,
        updated_at,
        expires_at,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_empty_hash_is_missing() {
        assert!(record_from_meta(&HashMap::new(), DataMap::new())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_parse_full_meta() {
        let record = record_from_meta(
            &meta(&[
                ("state", "waiting_weight"),
                ("created_at", "2024-01-01T00:00:00.000000Z"),
                ("updated_at", "2024-01-01T00:01:00.000000Z"),
                ("expires_at", "2024-01-01T01:00:00.000000Z"),
            ]),
            DataMap::new(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(record.state.as_deref(), Some("waiting_weight"));
        assert!(record.updated_at > record.created_at);
        assert_eq!(timestamp(record.expires_at.unwrap()), "2024-01-01T01:00:00.000000Z");
    }

    #[test]
    fn test_sentinel_state_and_missing_expiry() {
        let record = record_from_meta(
            &meta(&[("state", "*"), ("created_at", "2024-01-01T00:00:00Z")]),
            DataMap::new(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(record.state, None);
        assert_eq!(record.expires_at, None);
        assert_eq!(record.updated_at, record.created_at);
    }

    #[test]
    fn test_corrupt_timestamp() {
        let err = record_from_meta(
            &meta(&[("state", "a"), ("created_at", "yesterday")]),
            DataMap::new(),
        )
        .unwrap_err();
        assert!(matches!(err, StorageError::Serialization(_)));
    }

    #[test]
    fn test_ttl_args() {
        let now = Utc::now();
        assert_eq!(ttl_args(now, None).unwrap(), (String::new(), String::new()));
        let (ms, at) = ttl_args(now, Some(Duration::from_secs(2))).unwrap();
        assert_eq!(ms, "2000");
        assert_eq!(at, timestamp(now + chrono::Duration::seconds(2)));
    }
}
