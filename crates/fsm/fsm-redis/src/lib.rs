//! # Redis FSM Storage
//!
//! `FsmStorage` over Redis. Each conversation key maps to two Redis keys:
//!
//! | Key | Type | Content |
//! |-----|------|---------|
//! | `[prefix:]fsm:meta:<key>` | hash | `state`, `created_at`, `updated_at`, optional `expires_at` |
//! | `[prefix:]fsm:data:<key>` | string | JSON object |
//!
//! Writes touching both keys run as Lua scripts, `finish_state` as a MULTI/EXEC pipeline.
//! Expiry is delegated to Redis (`PEXPIRE` on both keys), so `cleanup_expired` has nothing to do.
//!
//! ## Example
//!
//! ```rust,ignore
//! use fsm_redis::{RedisStorage, RedisStorageConfig};
//!
//! let storage = RedisStorage::from_url("redis://127.0.0.1:6379", RedisStorageConfig::with_prefix("bot")).await?;
//! storage.set_state("waiting_weight", "1-2-3", None).await?;
//! ```

mod config;
mod keys;
mod meta;
mod scripts;

pub use config::RedisStorageConfig;

use async_trait::async_trait;
use chrono::Utc;
use fsm_core::{
    validate_data, validate_key, validate_state, DataMap, FsmStorage, Result, StateFilter,
    StateKeyStream, StateRecord, StorageError, StorageOptions, NO_STATE,
};
use futures::{stream, StreamExt};
use redis::aio::ConnectionManager;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use keys::KeySpace;
use meta::{record_from_meta, timestamp, ttl_args};
use scripts::Scripts;

const SCAN_BATCH: usize = 200;

fn backend_err(e: redis::RedisError) -> StorageError {
    error!(error = %e, "redis operation failed");
    StorageError::backend(format!("Redis error: {}", e))
}

fn parse_data(key: &str, raw: Option<String>) -> Result<DataMap> {
    match raw {
        Some(raw) => serde_json::from_str(&raw).map_err(|e| {
            StorageError::Serialization(format!("Invalid data JSON for key '{}': {}", key, e))
        }),
        None => Ok(DataMap::new()),
    }
}

/// Redis-backed FSM storage.
///
/// Cheap to clone: the connection manager multiplexes a single connection and reconnects on
/// failure.
#[derive(Clone)]
pub struct RedisStorage {
    conn: ConnectionManager,
    keys: KeySpace,
    scripts: Arc<Scripts>,
    options: StorageOptions,
}

impl RedisStorage {
    pub fn new(conn: ConnectionManager, config: RedisStorageConfig) -> Self {
        Self {
            conn,
            keys: KeySpace::new(&config.key_prefix),
            scripts: Arc::new(Scripts::new()),
            options: config.options,
        }
    }

    /// Connects to `url` (e.g. `redis://127.0.0.1:6379/0`).
    pub async fn from_url(url: &str, config: RedisStorageConfig) -> Result<Self> {
        let client = redis::Client::open(url).map_err(backend_err)?;
        let conn = ConnectionManager::new(client).await.map_err(backend_err)?;
        info!(prefix = %config.key_prefix, "connected to redis FSM storage");
        Ok(Self::new(conn, config))
    }

    /// Runs the write script; `false` when the record is missing and `create` is not set.
    async fn write(
        &self,
        key: &str,
        state: Option<&str>,
        data: Option<&DataMap>,
        create: bool,
        ttl: Option<Duration>,
    ) -> Result<bool> {
        let now = Utc::now();
        let (ttl_ms, expires_at) = ttl_args(now, ttl)?;
        let (default_ms, default_expires_at) = ttl_args(now, self.options.default_ttl)?;
        let data_json = match data {
            Some(data) => serde_json::to_string(data)?,
            None => String::new(),
        };

        let mut conn = self.conn.clone();
        let mut invocation = self.scripts.write.prepare_invoke();
        invocation
            .key(self.keys.meta(key))
            .key(self.keys.data(key))
            .arg(timestamp(now))
            .arg(state.unwrap_or(""))
            .arg(data_json)
            .arg(if create { "1" } else { "0" })
            .arg(ttl_ms)
            .arg(expires_at)
            .arg(default_ms)
            .arg(default_expires_at);
        let written: i64 = invocation
            .invoke_async(&mut conn)
            .await
            .map_err(backend_err)?;
        Ok(written == 1)
    }

    /// Metadata hash and raw data for `key` in one round trip.
    async fn read(&self, key: &str) -> Result<(HashMap<String, String>, Option<String>)> {
        let mut conn = self.conn.clone();
        let (meta, data): (HashMap<String, String>, Option<String>) = redis::pipe()
            .hgetall(self.keys.meta(key))
            .get(self.keys.data(key))
            .query_async(&mut conn)
            .await
            .map_err(backend_err)?;
        Ok((meta, data))
    }
}

impl std::fmt::Debug for RedisStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStorage")
            .field("keys", &self.keys)
            .field("options", &self.options)
            .finish()
    }
}

#[async_trait]
impl FsmStorage for RedisStorage {
    fn backend_name(&self) -> &'static str {
        "redis"
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
        let (ttl_ms, expires_at) = ttl_args(now, self.options.effective_ttl(ttl, true))?;

        let mut conn = self.conn.clone();
        let mut invocation = self.scripts.get_or_create.prepare_invoke();
        invocation
            .key(self.keys.meta(key))
            .key(self.keys.data(key))
            .arg(default_state.unwrap_or(NO_STATE))
            .arg(timestamp(now))
            .arg(ttl_ms)
            .arg(expires_at);
        let state: Option<String> = invocation
            .invoke_async(&mut conn)
            .await
            .map_err(backend_err)?;
        debug!(key = %key, state = ?state, "get_or_create in redis");
        Ok(state.as_deref().and_then(fsm_core::state_from_persisted))
    }

    async fn set_state(&self, state: &str, key: &str, ttl: Option<Duration>) -> Result<()> {
        validate_key(key)?;
        validate_state(state)?;
        self.write(key, Some(state), None, true, ttl).await?;
        debug!(key = %key, state = %state, "state set in redis");
        Ok(())
    }

    async fn set_data(&self, data: DataMap, key: &str, ttl: Option<Duration>) -> Result<()> {
        validate_key(key)?;
        let size = validate_data(&data, self.options.max_data_size)?;
        if !self
            .write(key, None, Some(&data), self.options.create_if_missing, ttl)
            .await?
        {
            return Err(StorageError::not_found(key));
        }
        debug!(key = %key, size, "data set in redis");
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
        self.write(key, Some(state), Some(&data), true, ttl).await?;
        Ok(())
    }

    async fn get_data(&self, key: &str) -> Result<DataMap> {
        let (meta, data) = self.read(key).await?;
        match record_from_meta(&meta, DataMap::new())? {
            Some(record) if !record.is_expired() => match parse_data(key, data) {
                Ok(data) => Ok(data),
                Err(e) => {
                    warn!(key = %key, error = %e, "discarding unreadable data");
                    Ok(DataMap::new())
                }
            },
            _ => Ok(DataMap::new()),
        }
    }

    async fn get_state_data(&self, key: &str) -> Result<StateRecord> {
        let (meta, data) = self.read(key).await?;
        let record = record_from_meta(&meta, parse_data(key, data)?)?
            .filter(|record| !record.is_expired())
            .ok_or_else(|| StorageError::not_found(key))?;
        Ok(record)
    }

    async fn finish_state(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = redis::pipe()
            .atomic()
            .del(self.keys.meta(key))
            .ignore()
            .del(self.keys.data(key))
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(backend_err)?;
        debug!(key = %key, "state finished in redis");
        Ok(())
    }

    async fn cleanup_expired(&self) -> Result<u64> {
        Ok(0)
    }

    async fn list_states(&self, filter: StateFilter) -> Result<StateKeyStream> {
        let scan = Scan {
            conn: self.conn.clone(),
            keys: self.keys.clone(),
            pattern: self.keys.meta_pattern(),
            filter,
            cursor: 0,
            done: false,
            buffer: VecDeque::new(),
        };
        let stream = stream::unfold(scan, |mut scan| async move {
            loop {
                if let Some(key) = scan.buffer.pop_front() {
                    return Some((Ok(key), scan));
                }
                if scan.done {
                    return None;
                }
                if let Err(e) = scan.next_page().await {
                    scan.done = true;
                    return Some((Err(e), scan));
                }
            }
        });
        Ok(stream.boxed())
    }
}

/// Cursor state of a lazy `SCAN` over metadata keys.
struct Scan {
    conn: ConnectionManager,
    keys: KeySpace,
    pattern: String,
    filter: StateFilter,
    cursor: u64,
    done: bool,
    buffer: VecDeque<String>,
}

impl Scan {
    async fn next_page(&mut self) -> Result<()> {
        let (cursor, batch): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(self.cursor)
            .arg("MATCH")
            .arg(&self.pattern)
            .arg("COUNT")
            .arg(SCAN_BATCH)
            .query_async(&mut self.conn)
            .await
            .map_err(backend_err)?;
        self.cursor = cursor;
        self.done = cursor == 0;
        if batch.is_empty() {
            return Ok(());
        }

        let mut pipe = redis::pipe();
        for meta_key in &batch {
            pipe.hgetall(meta_key);
        }
        let metas: Vec<HashMap<String, String>> = pipe
            .query_async(&mut self.conn)
            .await
            .map_err(backend_err)?;

        for (meta_key, meta) in batch.iter().zip(metas) {
            let Some(key) = self.keys.conversation_key(meta_key) else {
                continue;
            };
            match record_from_meta(&meta, DataMap::new()) {
                Ok(Some(record)) if !record.is_expired() && self.filter.matches(&record) => {
                    self.buffer.push_back(key.to_string());
                }
                Ok(_) => {}
                Err(e) => warn!(key = %key, error = %e, "skipping unreadable metadata"),
            }
        }
        Ok(())
    }
}
