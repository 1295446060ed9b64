//! # FSM Storage
//!
//! The `FsmStorage` trait is the contract every backend implements with identical observable
//! semantics.
//!
//! ## TTL policy
//!
//! `Some(ttl)` sets `expires_at = now + ttl` on the record (and refreshes native TTLs where the
//! backend has them). `None` leaves the expiry of an existing record untouched; when the write
//! creates the record, [`StorageOptions::default_ttl`] applies.
//!
//! ## Absence
//!
//! A record whose `expires_at` has passed is absent to every reader, whether or not the backend
//! has physically removed it yet. `get_state_data` reports absence as
//! [`StorageError::StateNotFound`](crate::StorageError::StateNotFound); `get_data` softens it to
//! an empty map. `finish_state` on an absent key succeeds.
//!
//! ## Example
//!
//! ```rust,ignore
//! use fsm_core::{FsmStorage, StateFilter};
//!
//! async fn example(storage: &dyn FsmStorage) -> fsm_core::Result<()> {
//!     storage.set_state("waiting_weight", "1-2-3", None).await?;
//!     let record = storage.get_state_data("1-2-3").await?;
//!     assert_eq!(record.state.as_deref(), Some("waiting_weight"));
//!     storage.finish_state("1-2-3").await?;
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use std::time::Duration;

use crate::error::Result;
use crate::options::StorageOptions;
use crate::record::{DataMap, StateRecord};

/// Lazily produced keys from [`FsmStorage::list_states`].
pub type StateKeyStream = BoxStream<'static, Result<String>>;

/// Filter for [`FsmStorage::list_states`]; empty matches every live record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateFilter {
    /// Only records in exactly this state.
    pub state: Option<String>,
    /// Only records created strictly before this instant.
    pub created_before: Option<DateTime<Utc>>,
}

impl StateFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn in_state(state: impl Into<String>) -> Self {
        Self {
            state: Some(state.into()),
            created_before: None,
        }
    }

    pub fn created_before(mut self, at: DateTime<Utc>) -> Self {
        self.created_before = Some(at);
        self
    }

    /// Whether a live record matches; the state comparison uses the model value (`None` never
    /// matches a requested state).
    pub fn matches(&self, record: &StateRecord) -> bool {
        if let Some(state) = &self.state {
            if record.state.as_deref() != Some(state.as_str()) {
                return false;
            }
        }
        if let Some(before) = self.created_before {
            if record.created_at >= before {
                return false;
            }
        }
        true
    }
}

/// Persistence contract for conversation state.
#[async_trait]
pub trait FsmStorage: Send + Sync {
    /// Short backend name for logs (`memory`, `redis`, `mongo`, ...).
    fn backend_name(&self) -> &'static str;

    /// Options this backend was built with.
    fn options(&self) -> &StorageOptions;

    /// Returns the current state of the live record for `key`, or atomically creates one with
    /// `default_state` and returns that. Concurrent callers never create divergent records.
    async fn get_or_create_state(
        &self,
        key: &str,
        default_state: Option<&str>,
        ttl: Option<Duration>,
    ) -> Result<Option<String>>;

    /// Upserts the state; preserves `data` and `created_at`, refreshes `updated_at`.
    async fn set_state(&self, state: &str, key: &str, ttl: Option<Duration>) -> Result<()>;

    /// Replaces the data mapping. Fails with `StateNotFound` for a missing key unless
    /// [`StorageOptions::create_if_missing`] is set.
    async fn set_data(&self, data: DataMap, key: &str, ttl: Option<Duration>) -> Result<()>;

    /// Writes state and data together in one atomic upsert.
    async fn set_state_data(
        &self,
        key: &str,
        state: &str,
        data: DataMap,
        ttl: Option<Duration>,
    ) -> Result<()>;

    /// Data of the live record, or an empty map when missing or expired.
    async fn get_data(&self, key: &str) -> Result<DataMap>;

    /// Full record; `StateNotFound` when missing or expired.
    async fn get_state_data(&self, key: &str) -> Result<StateRecord>;

    /// Deletes the record and its data. Succeeds when the key is already gone.
    async fn finish_state(&self, key: &str) -> Result<()>;

    /// Removes expired records and returns how many were removed. Backends with native expiry
    /// may return 0.
    async fn cleanup_expired(&self) -> Result<u64>;

    /// Keys of live records matching `filter`, produced lazily.
    async fn list_states(&self, filter: StateFilter) -> Result<StateKeyStream>;
}
