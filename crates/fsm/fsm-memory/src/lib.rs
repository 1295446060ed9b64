//! # In-Memory FSM Storage
//!
//! This crate provides an in-memory implementation of the `FsmStorage` trait from `fsm-core`.
//!
//! ## MemoryStorage
//!
//! Reference backend for tests and single-process bots.
//!
//! **Advantages**:
//! - No I/O, no external service
//! - Exact expiry: checked against the clock on every read
//!
//! **Limitations**:
//! - State is lost on restart
//! - Not shared between processes
//! - One mutex guards every key, so unrelated conversations serialize on it; shard the map per
//!   key hash if throughput ever requires it
//!
//! ## Example
//!
//! ```rust
//! use fsm_core::FsmStorage;
//! use fsm_memory::MemoryStorage;
//!
//! #[tokio::main]
//! async fn main() -> fsm_core::Result<()> {
//!     let storage = MemoryStorage::new();
//!     storage.set_state("waiting_weight", "1-2-3", None).await?;
//!     assert_eq!(storage.len().await, 1);
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fsm_core::{
    expires_at_from, state_from_persisted, validate_data, validate_key, validate_state, DataMap,
    FsmStorage, Result, StateFilter, StateKeyStream, StateRecord, StorageError, StorageOptions,
};
use futures::{stream, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// In-memory FSM storage.
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    records: Arc<Mutex<HashMap<String, StateRecord>>>,
    options: StorageOptions,
}

impl MemoryStorage {
    /// Creates an empty store with default options.
    pub fn new() -> Self {
        Self::with_options(StorageOptions::default())
    }

    pub fn with_options(options: StorageOptions) -> Self {
        Self {
            records: Arc::new(Mutex::new(HashMap::new())),
            options,
        }
    }

    /// Number of stored records, including expired ones not yet purged.
    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drops every record.
    pub async fn clear(&self) {
        self.records.lock().await.clear();
    }

    fn expiry(now: DateTime<Utc>, ttl: Option<Duration>) -> Result<Option<DateTime<Utc>>> {
        ttl.map(|ttl| expires_at_from(now, ttl)).transpose()
    }

    /// Live record for `key`, purging it when expired.
    fn live<'a>(
        records: &'a mut HashMap<String, StateRecord>,
        key: &str,
        now: DateTime<Utc>,
    ) -> Option<&'a mut StateRecord> {
        if records.get(key).is_some_and(|r| r.is_expired_at(now)) {
            debug!(key = %key, "purging expired record");
            records.remove(key);
            return None;
        }
        records.get_mut(key)
    }

    /// Existing live record prepared for a write, or a new one when `create` is set.
    fn record_for_write<'a>(
        &self,
        records: &'a mut HashMap<String, StateRecord>,
        key: &str,
        ttl: Option<Duration>,
        create: bool,
        now: DateTime<Utc>,
    ) -> Result<&'a mut StateRecord> {
        if Self::live(records, key, now).is_none() {
            if !create {
                return Err(StorageError::not_found(key));
            }
            let expires_at = Self::expiry(now, self.options.effective_ttl(ttl, true))?;
            records.insert(key.to_string(), StateRecord::new(None, now, expires_at));
        } else if let Some(at) = Self::expiry(now, ttl)? {
            if let Some(record) = records.get_mut(key) {
                record.expires_at = Some(at);
            }
        }
        let record = records
            .get_mut(key)
            .ok_or_else(|| StorageError::not_found(key))?;
        record.touch(now);
        Ok(record)
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FsmStorage for MemoryStorage {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    fn options(&self) -> &StorageOptions {
        &self.options
    }

    async fn get_or_create_state(
        &self,
        key: &str,
        default_state: Option<&str>,
        ttl: Option<Duration>,
    ) -> Result<Option<String>> {
        validate_key(key)?;
        let now = Utc::now();
        let mut records = self.records.lock().await;
        if let Some(record) = Self::live(&mut records, key, now) {
            return Ok(record.state.clone());
        }
        let expires_at = Self::expiry(now, self.options.effective_ttl(ttl, true))?;
        let state = default_state.and_then(state_from_persisted);
        records.insert(
            key.to_string(),
            StateRecord::new(state.clone(), now, expires_at),
        );
        info!(key = %key, state = ?state, "created state record in memory");
        Ok(state)
    }

    async fn set_state(&self, state: &str, key: &str, ttl: Option<Duration>) -> Result<()> {
        validate_key(key)?;
        validate_state(state)?;
        let now = Utc::now();
        let mut records = self.records.lock().await;
        let record = self.record_for_write(&mut records, key, ttl, true, now)?;
        record.state = state_from_persisted(state);
        debug!(key = %key, state = %state, "state set in memory");
        Ok(())
    }

    async fn set_data(&self, data: DataMap, key: &str, ttl: Option<Duration>) -> Result<()> {
        validate_key(key)?;
        let size = validate_data(&data, self.options.max_data_size)?;
        let now = Utc::now();
        let mut records = self.records.lock().await;
        let record =
            self.record_for_write(&mut records, key, ttl, self.options.create_if_missing, now)?;
        record.data = data;
        debug!(key = %key, size, "data set in memory");
        Ok(())
    }

    async fn set_state_data(
        &self,
        key: &str,
        state: &str,
        data: DataMap,
        ttl: Option<Duration>,
    ) -> Result<()> {
        validate_key(key)?;
        validate_state(state)?;
        validate_data(&data, self.options.max_data_size)?;
        let now = Utc::now();
        let mut records = self.records.lock().await;
        let record = self.record_for_write(&mut records, key, ttl, true, now)?;
        record.state = state_from_persisted(state);
        record.data = data;
        Ok(())
    }

    async fn get_data(&self, key: &str) -> Result<DataMap> {
        let mut records = self.records.lock().await;
        Ok(Self::live(&mut records, key, Utc::now())
            .map(|record| record.data.clone())
            .unwrap_or_default())
    }

    async fn get_state_data(&self, key: &str) -> Result<StateRecord> {
        let mut records = self.records.lock().await;
        Self::live(&mut records, key, Utc::now())
            .map(|record| record.clone())
            .ok_or_else(|| StorageError::StateNotFound(format!(
                "State with key '{}' not found or expired",
                key
            )))
    }

    async fn finish_state(&self, key: &str) -> Result<()> {
        let removed = self.records.lock().await.remove(key).is_some();
        debug!(key = %key, removed, "state finished in memory");
        Ok(())
    }

    async fn cleanup_expired(&self) -> Result<u64> {
        let now = Utc::now();
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|_, record| !record.is_expired_at(now));
        let removed = (before - records.len()) as u64;
        if removed > 0 {
            info!(removed, "cleaned up expired in-memory states");
        }
        Ok(removed)
    }

    async fn list_states(&self, filter: StateFilter) -> Result<StateKeyStream> {
        let now = Utc::now();
        let keys: Vec<Result<String>> = {
            let records = self.records.lock().await;
            records
                .iter()
                .filter(|(_, record)| !record.is_expired_at(now) && filter.matches(record))
                .map(|(key, _)| Ok(key.clone()))
                .collect()
        };
        Ok(stream::iter(keys).boxed())
    }
}
