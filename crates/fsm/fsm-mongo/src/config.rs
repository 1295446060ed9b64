//! Configuration for [`MongoStorage`](crate::MongoStorage).

use fsm_core::StorageOptions;

pub const DEFAULT_DATABASE: &str = "fsm_storage";
pub const DEFAULT_COLLECTION: &str = "states";

/// Configuration for MongoStorage.
///
/// | Field | Type | Default |
/// |-------|------|---------|
/// | `database` | `String` | `fsm_storage` |
/// | `collection` | `String` | `states` |
/// | `options` | `StorageOptions` | see `StorageOptions::default` |
#[derive(Debug, Clone)]
pub struct MongoStorageConfig {
    pub database: String,
    pub collection: String,
    pub options: StorageOptions,
}

impl Default for MongoStorageConfig {
    fn default() -> Self {
        Self {
            database: DEFAULT_DATABASE.to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
            options: StorageOptions::default(),
        }
    }
}
