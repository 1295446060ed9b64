//! State record model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Result, StorageError};

/// Conversation scratch data: string keys to arbitrary JSON values.
pub type DataMap = serde_json::Map<String, serde_json::Value>;

/// Persisted marker for "no state". Backends write it in place of an absent state and map it
/// back to `None` when reading.
pub const NO_STATE: &str = "*";

/// Persisted state of one conversation key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateRecord {
    pub state: Option<String>,
    pub data: DataMap,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl StateRecord {
    /// Fresh record created at `now`, with empty data.
    pub fn new(state: Option<String>, now: DateTime<Utc>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            state,
            data: DataMap::new(),
            created_at: now,
            updated_at: now,
            expires_at,
        }
    }

    /// True once `expires_at` is reached.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(at) if now >= at)
    }

    /// Marks a mutation; `updated_at` never goes below `created_at`.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now.max(self.created_at);
    }

    /// State as persisted, with the sentinel standing in for `None`.
    pub fn persisted_state(&self) -> &str {
        self.state.as_deref().unwrap_or(NO_STATE)
    }
}

/// Maps a persisted state string back to the model (sentinel and empty become `None`).
pub fn state_from_persisted(raw: &str) -> Option<String> {
    if raw.is_empty() || raw == NO_STATE {
        None
    } else {
        Some(raw.to_string())
    }
}

/// `now + ttl`, rejecting TTLs that do not fit a timestamp.
pub fn expires_at_from(now: DateTime<Utc>, ttl: Duration) -> Result<DateTime<Utc>> {
    let delta = chrono::Duration::from_std(ttl)
        .map_err(|_| StorageError::validation(format!("TTL {:?} is out of range", ttl)))?;
    now.checked_add_signed(delta)
        .ok_or_else(|| StorageError::validation(format!("TTL {:?} is out of range", ttl)))
}
