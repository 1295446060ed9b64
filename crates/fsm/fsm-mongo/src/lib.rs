//! # MongoDB FSM Storage
//!
//! `FsmStorage` over a MongoDB collection, one document per conversation key:
//!
//! ```text
//! { key, state, data: {..}, created_at, updated_at, expires_at | null }
//! ```
//!
//! Indexes are created on first use: unique on `key`, and a TTL index on `expires_at` so the
//! server deletes expired documents on its own. The TTL monitor runs about once a minute, so reads
//! also filter on `expires_at` and `cleanup_expired` deletes stragglers explicitly.

mod config;
mod document;

pub use config::{MongoStorageConfig, DEFAULT_COLLECTION, DEFAULT_DATABASE};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fsm_core::{
    expires_at_from, state_from_persisted, validate_data, validate_key, validate_state, DataMap,
    FsmStorage, Result, StateFilter, StateKeyStream, StateRecord, StorageError, StorageOptions,
    NO_STATE,
};
use futures::{stream, StreamExt};
use mongodb::bson::{doc, Bson, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{
    ClientOptions, IndexOptions, ReturnDocument, ServerApi, ServerApiVersion,
};
use mongodb::{Client, Collection, IndexModel};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, error, info};

use document::{data_to_document, expires_at_bson, record_from_document, to_bson_datetime};

const DUPLICATE_KEY: i32 = 11000;

fn mongo_err(e: mongodb::error::Error) -> StorageError {
    error!(error = %e, "mongodb operation failed");
    StorageError::backend(format!("Database error: {}", e))
}

/// Unique-index violation from two upserts racing on one key.
fn is_duplicate_key(e: &mongodb::error::Error) -> bool {
    match e.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(failure)) => failure.code == DUPLICATE_KEY,
        ErrorKind::Command(failure) => failure.code == DUPLICATE_KEY,
        _ => false,
    }
}

/// Filter matching the live document of `key`.
fn live_filter(key: &str, now: DateTime<Utc>) -> Document {
    doc! {
        "key": key,
        "$or": [
            { "expires_at": Bson::Null },
            { "expires_at": { "$gt": to_bson_datetime(now) } },
        ],
    }
}

/// MongoDB-backed FSM storage.
#[derive(Clone)]
pub struct MongoStorage {
    collection: Collection<Document>,
    indexes: Arc<OnceCell<()>>,
    options: StorageOptions,
}

impl MongoStorage {
    pub fn new(client: &Client, config: MongoStorageConfig) -> Self {
        let collection = client
            .database(&config.database)
            .collection::<Document>(&config.collection);
        Self {
            collection,
            indexes: Arc::new(OnceCell::new()),
            options: config.options,
        }
    }

    /// Connects to `uri` with the stable server API (v1).
    pub async fn from_uri(uri: &str, config: MongoStorageConfig) -> Result<Self> {
        let mut client_options = ClientOptions::parse(uri).await.map_err(mongo_err)?;
        client_options.server_api = Some(ServerApi::builder().version(ServerApiVersion::V1).build());
        let client = Client::with_options(client_options).map_err(mongo_err)?;
        info!(
            database = %config.database,
            collection = %config.collection,
            "connected to mongodb FSM storage"
        );
        Ok(Self::new(&client, config))
    }

    async fn ensure_indexes(&self) -> Result<()> {
        self.indexes
            .get_or_try_init(|| async {
                let models = vec![
                    IndexModel::builder()
                        .keys(doc! { "key": 1 })
                        .options(IndexOptions::builder().unique(true).build())
                        .build(),
                    IndexModel::builder()
                        .keys(doc! { "expires_at": 1 })
                        .options(
                            IndexOptions::builder()
                                .expire_after(Duration::from_secs(0))
                                .build(),
                        )
                        .build(),
                ];
                self.collection.create_indexes(models).await.map_err(|e| {
                    error!(error = %e, "failed to create indexes");
                    StorageError::backend(format!("Failed to create database indexes: {}", e))
                })?;
                debug!(collection = %self.collection.name(), "indexes ensured");
                Ok::<(), StorageError>(())
            })
            .await?;
        Ok(())
    }

    /// Deletes the document of `key` if it expired but the TTL monitor has not removed it yet.
    async fn purge_expired(&self, key: &str, now: DateTime<Utc>) -> Result<()> {
        self.collection
            .delete_one(doc! { "key": key, "expires_at": { "$lte": to_bson_datetime(now) } })
            .await
            .map_err(mongo_err)?;
        Ok(())
    }

    /// Applies `set` to the document of `key`; inserts a fresh document when missing and `create`
    /// is set. Returns `false` when nothing matched and nothing was inserted.
    async fn write(
        &self,
        key: &str,
        mut set: Document,
        ttl: Option<Duration>,
        create: bool,
    ) -> Result<bool> {
        self.ensure_indexes().await?;
        let now = Utc::now();
        self.purge_expired(key, now).await?;

        set.insert("updated_at", to_bson_datetime(now));
        let mut on_insert = doc! { "created_at": to_bson_datetime(now) };
        if !set.contains_key("state") {
            on_insert.insert("state", NO_STATE);
        }
        if !set.contains_key("data") {
            on_insert.insert("data", Document::new());
        }
        match ttl {
            Some(ttl) => {
                set.insert("expires_at", to_bson_datetime(expires_at_from(now, ttl)?));
            }
            None => {
                let default = self
                    .options
                    .effective_ttl(None, true)
                    .map(|ttl| expires_at_from(now, ttl))
                    .transpose()?;
                on_insert.insert("expires_at", expires_at_bson(default));
            }
        }
        let update = doc! { "$set": set, "$setOnInsert": on_insert };

        let mut attempt = self
            .collection
            .update_one(doc! { "key": key }, update.clone())
            .upsert(create)
            .await;
        if matches!(&attempt, Err(e) if is_duplicate_key(e)) {
            debug!(key = %key, "upsert raced with another writer, retrying");
            attempt = self
                .collection
                .update_one(doc! { "key": key }, update)
                .upsert(create)
                .await;
        }
        let result = attempt.map_err(mongo_err)?;
        Ok(result.matched_count > 0 || result.upserted_id.is_some())
    }

    async fn find_live(&self, key: &str) -> Result<Option<Document>> {
        self.ensure_indexes().await?;
        self.collection
            .find_one(live_filter(key, Utc::now()))
            .await
            .map_err(mongo_err)
    }
}

impl std::fmt::Debug for MongoStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MongoStorage")
            .field("collection", &self.collection.name())
            .field("options", &self.options)
            .finish()
    }
}

#[async_trait]
impl FsmStorage for MongoStorage {
    fn backend_name(&self) -> &'static str {
        "mongo"
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
        self.ensure_indexes().await?;
        let now = Utc::now();
        self.purge_expired(key, now).await?;

        let expires_at = self
            .options
            .effective_ttl(ttl, true)
            .map(|ttl| expires_at_from(now, ttl))
            .transpose()?;
        let on_insert = doc! {
            "state": default_state.unwrap_or(NO_STATE),
            "data": Document::new(),
            "created_at": to_bson_datetime(now),
            "updated_at": to_bson_datetime(now),
            "expires_at": expires_at_bson(expires_at),
        };
        let found = match self
            .collection
            .find_one_and_update(doc! { "key": key }, doc! { "$setOnInsert": on_insert })
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await
        {
            Ok(found) => found,
            Err(e) if is_duplicate_key(&e) => self
                .collection
                .find_one(doc! { "key": key })
                .await
                .map_err(mongo_err)?,
            Err(e) => return Err(mongo_err(e)),
        };
        let found = found.ok_or_else(|| StorageError::not_found(key))?;
        Ok(found.get_str("state").ok().and_then(state_from_persisted))
    }

    async fn set_state(&self, state: &str, key: &str, ttl: Option<Duration>) -> Result<()> {
        validate_key(key)?;
        validate_state(state)?;
        self.write(key, doc! { "state": state }, ttl, true).await?;
        debug!(key = %key, state = %state, "state set in mongodb");
        Ok(())
    }

    async fn set_data(&self, data: DataMap, key: &str, ttl: Option<Duration>) -> Result<()> {
        validate_key(key)?;
        let size = validate_data(&data, self.options.max_data_size)?;
        let set = doc! { "data": data_to_document(&data)? };
        if !self
            .write(key, set, ttl, self.options.create_if_missing)
            .await?
        {
            return Err(StorageError::not_found(key));
        }
        debug!(key = %key, size, "data set in mongodb");
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
        let set = doc! { "state": state, "data": data_to_document(&data)? };
        self.write(key, set, ttl, true).await?;
        Ok(())
    }

    async fn get_data(&self, key: &str) -> Result<DataMap> {
        match self.find_live(key).await? {
            Some(found) => Ok(record_from_document(&found)?.data),
            None => Ok(DataMap::new()),
        }
    }

    async fn get_state_data(&self, key: &str) -> Result<StateRecord> {
        let found = self
            .find_live(key)
            .await?
            .ok_or_else(|| StorageError::not_found(key))?;
        record_from_document(&found)
    }

    async fn finish_state(&self, key: &str) -> Result<()> {
        let result = self
            .collection
            .delete_one(doc! { "key": key })
            .await
            .map_err(mongo_err)?;
        debug!(key = %key, removed = result.deleted_count, "state finished in mongodb");
        Ok(())
    }

    async fn cleanup_expired(&self) -> Result<u64> {
        let result = self
            .collection
            .delete_many(doc! { "expires_at": { "$lte": to_bson_datetime(Utc::now()) } })
            .await
            .map_err(mongo_err)?;
        if result.deleted_count > 0 {
            info!(removed = result.deleted_count, "cleaned up expired mongodb states");
        }
        Ok(result.deleted_count)
    }

    async fn list_states(&self, filter: StateFilter) -> Result<StateKeyStream> {
        let now = to_bson_datetime(Utc::now());
        let mut query = doc! {
            "$or": [
                { "expires_at": Bson::Null },
                { "expires_at": { "$gt": now } },
            ],
        };
        if let Some(state) = &filter.state {
            // The stored sentinel means "no state", which a state filter never matches.
            if state_from_persisted(state).is_none() {
                return Ok(stream::empty().boxed());
            }
            query.insert("state", state.as_str());
        }
        if let Some(before) = filter.created_before {
            query.insert("created_at", doc! { "$lt": to_bson_datetime(before) });
        }

        let cursor = self
            .collection
            .find(query)
            .projection(doc! { "key": 1, "_id": 0 })
            .await
            .map_err(mongo_err)?;
        let keys = cursor.map(|item| {
            let found = item.map_err(mongo_err)?;
            found
                .get_str("key")
                .map(str::to_string)
                .map_err(|e| StorageError::Serialization(format!("Document without key: {}", e)))
        });
        Ok(keys.boxed())
    }
}
