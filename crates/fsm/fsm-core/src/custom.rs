//! # Custom storage template
//!
//! Implement [`RawStateStore`] (four raw primitives over whole records) and wrap it in
//! [`CustomStorage`] to get a complete [`FsmStorage`]: validation, the TTL policy, lazy expiry and
//! filtering come from the wrapper. A wrapper-local mutex serializes the read-modify-write
//! sequences of writers going through the same wrapper.
//!
//! ```rust,ignore
//! struct FileStore { dir: PathBuf }
//!
//! #[async_trait]
//! impl RawStateStore for FileStore {
//!     async fn load(&self, key: &str) -> Result<Option<StateRecord>> { /* read + serde_json */ }
//!     async fn store(&self, key: &str, record: StateRecord) -> Result<()> { /* write */ }
//!     async fn remove(&self, key: &str) -> Result<bool> { /* unlink */ }
//!     async fn keys(&self) -> Result<Vec<String>> { /* read_dir */ }
//! }
//!
//! let storage = CustomStorage::new("file", FileStore { dir }, StorageOptions::default());
//! ```

use async_trait::async_trait;
use chrono::Utc;
use futures::{stream, StreamExt, TryStreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{Result, StorageError};
use crate::options::StorageOptions;
use crate::record::{expires_at_from, state_from_persisted, DataMap, StateRecord};
use crate::storage::{FsmStorage, StateFilter, StateKeyStream};
use crate::validation::{validate_data, validate_key, validate_state};

/// Raw record persistence a custom backend provides.
#[async_trait]
pub trait RawStateStore: Send + Sync {
    /// Record stored under `key`, expired or not.
    async fn load(&self, key: &str) -> Result<Option<StateRecord>>;
    /// Stores `record` under `key`, replacing any previous one.
    async fn store(&self, key: &str, record: StateRecord) -> Result<()>;
    /// Removes `key`; returns whether something was removed.
    async fn remove(&self, key: &str) -> Result<bool>;
    /// Every stored key.
    async fn keys(&self) -> Result<Vec<String>>;
}

/// [`FsmStorage`] built on a [`RawStateStore`].
pub struct CustomStorage<R> {
    name: &'static str,
    raw: Arc<R>,
    options: StorageOptions,
    write_lock: Mutex<()>,
}

impl<R: RawStateStore + 'static> CustomStorage<R> {
    pub fn new(name: &'static str, raw: R, options: StorageOptions) -> Self {
        Self {
            name,
            raw: Arc::new(raw),
            options,
            write_lock: Mutex::new(()),
        }
    }

    pub fn raw(&self) -> &R {
        &self.raw
    }

    /// Live record for `key`, expired ones read as absent. Nothing is removed here: reads do not
    /// hold `write_lock`, so a removal could hit a record a concurrent writer just stored.
    async fn load_unexpired(&self, key: &str) -> Result<Option<StateRecord>> {
        Ok(self.raw.load(key).await?.filter(|record| !record.is_expired()))
    }

    /// Live record for `key`; an expired one is removed on the way. Callers hold `write_lock`.
    async fn load_live(&self, key: &str) -> Result<Option<StateRecord>> {
        match self.raw.load(key).await? {
            Some(record) if record.is_expired() => {
                debug!(key = %key, backend = self.name, "dropping expired record");
                self.raw.remove(key).await?;
                Ok(None)
            }
            other => Ok(other),
        }
    }

    /// Loads or starts a record for a write; `None` when missing and creation is not allowed.
    async fn load_for_write(
        &self,
        key: &str,
        ttl: Option<Duration>,
        create: bool,
    ) -> Result<Option<StateRecord>> {
        let now = Utc::now();
        if let Some(mut record) = self.load_live(key).await? {
            if let Some(ttl) = ttl {
                record.expires_at = Some(expires_at_from(now, ttl)?);
            }
            record.touch(now);
            return Ok(Some(record));
        }
        if !create {
            return Ok(None);
        }
        let expires_at = match self.options.effective_ttl(ttl, true) {
            Some(ttl) => Some(expires_at_from(now, ttl)?),
            None => None,
        };
        Ok(Some(StateRecord::new(None, now, expires_at)))
    }
}

#[async_trait]
impl<R: RawStateStore + 'static> FsmStorage for CustomStorage<R> {
    fn backend_name(&self) -> &'static str {
        self.name
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
        let _guard = self.write_lock.lock().await;
        if let Some(record) = self.load_live(key).await? {
            return Ok(record.state);
        }
        let mut record = self
            .load_for_write(key, ttl, true)
            .await?
            .ok_or_else(|| StorageError::not_found(key))?;
        record.state = default_state.and_then(state_from_persisted);
        let state = record.state.clone();
        self.raw.store(key, record).await?;
        Ok(state)
    }

    async fn set_state(&self, state: &str, key: &str, ttl: Option<Duration>) -> Result<()> {
        validate_key(key)?;
        validate_state(state)?;
        let _guard = self.write_lock.lock().await;
        let mut record = self
            .load_for_write(key, ttl, true)
            .await?
            .ok_or_else(|| StorageError::not_found(key))?;
        record.state = state_from_persisted(state);
        self.raw.store(key, record).await
    }

    async fn set_data(&self, data: DataMap, key: &str, ttl: Option<Duration>) -> Result<()> {
        validate_key(key)?;
        validate_data(&data, self.options.max_data_size)?;
        let _guard = self.write_lock.lock().await;
        let mut record = self
            .load_for_write(key, ttl, self.options.create_if_missing)
            .await?
            .ok_or_else(|| StorageError::not_found(key))?;
        record.data = data;
        self.raw.store(key, record).await
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
        let _guard = self.write_lock.lock().await;
        let mut record = self
            .load_for_write(key, ttl, true)
            .await?
            .ok_or_else(|| StorageError::not_found(key))?;
        record.state = state_from_persisted(state);
        record.data = data;
        self.raw.store(key, record).await
    }

    async fn get_data(&self, key: &str) -> Result<DataMap> {
        Ok(self
            .load_unexpired(key)
            .await?
            .map(|record| record.data)
            .unwrap_or_default())
    }

    async fn get_state_data(&self, key: &str) -> Result<StateRecord> {
        self.load_unexpired(key)
            .await?
            .ok_or_else(|| StorageError::not_found(key))
    }

    async fn finish_state(&self, key: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let removed = self.raw.remove(key).await?;
        debug!(key = %key, removed, backend = self.name, "state finished");
        Ok(())
    }

    async fn cleanup_expired(&self) -> Result<u64> {
        let _guard = self.write_lock.lock().await;
        let now = Utc::now();
        let mut removed = 0;
        for key in self.raw.keys().await? {
            if let Some(record) = self.raw.load(&key).await? {
                if record.is_expired_at(now) && self.raw.remove(&key).await? {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    async fn list_states(&self, filter: StateFilter) -> Result<StateKeyStream> {
        let keys = self.raw.keys().await?;
        let raw = Arc::clone(&self.raw);
        let stream = stream::iter(keys)
            .then(move |key| {
                let raw = Arc::clone(&raw);
                async move { raw.load(&key).await.map(|record| record.map(|r| (key, r))) }
            })
            .try_filter_map(move |entry| {
                let filter = filter.clone();
                async move {
                    Ok(entry
                        .filter(|(_, record)| !record.is_expired() && filter.matches(record))
                        .map(|(key, _)| key))
                }
            })
            .boxed();
        Ok(stream)
    }
}
