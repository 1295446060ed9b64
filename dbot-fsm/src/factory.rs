//! Builds the configured backend.

use dbot_core::Result;
use fsm_core::FsmStorage;
use fsm_memory::MemoryStorage;
use std::sync::Arc;
use tracing::info;

use crate::config::{FsmConfig, StorageBackend};

/// Connects (where needed) and returns the backend named by `config.backend`.
pub async fn build_storage(config: &FsmConfig) -> Result<Arc<dyn FsmStorage>> {
    let storage: Arc<dyn FsmStorage> = match config.backend {
        StorageBackend::Memory => Arc::new(MemoryStorage::with_options(config.options.clone())),
        StorageBackend::Redis => redis_storage(config).await?,
        StorageBackend::Mongo => mongo_storage(config).await?,
    };
    info!(
        backend = storage.backend_name(),
        max_data_size = config.options.max_data_size,
        default_ttl = ?config.options.default_ttl,
        "fsm storage ready"
    );
    Ok(storage)
}

#[cfg(feature = "redis")]
async fn redis_storage(config: &FsmConfig) -> Result<Arc<dyn FsmStorage>> {
    let redis_config = fsm_redis::RedisStorageConfig {
        key_prefix: config.key_prefix.clone(),
        options: config.options.clone(),
    };
    let storage = fsm_redis::RedisStorage::from_url(&config.redis_url, redis_config).await?;
    Ok(Arc::new(storage))
}

#[cfg(not(feature = "redis"))]
async fn redis_storage(_config: &FsmConfig) -> Result<Arc<dyn FsmStorage>> {
    Err(dbot_core::DbotError::Config(
        "FSM_STORAGE=redis but dbot-fsm was built without the 'redis' feature".to_string(),
    ))
}

#[cfg(feature = "mongo")]
async fn mongo_storage(config: &FsmConfig) -> Result<Arc<dyn FsmStorage>> {
    let mongo_config = fsm_mongo::MongoStorageConfig {
        database: config.mongo_database.clone(),
        collection: config.mongo_collection.clone(),
        options: config.options.clone(),
    };
    let storage = fsm_mongo::MongoStorage::from_uri(&config.mongo_uri, mongo_config).await?;
    Ok(Arc::new(storage))
}

#[cfg(not(feature = "mongo"))]
async fn mongo_storage(_config: &FsmConfig) -> Result<Arc<dyn FsmStorage>> {
    Err(dbot_core::DbotError::Config(
        "FSM_STORAGE=mongo but dbot-fsm was built without the 'mongo' feature".to_string(),
    ))
}
