//! Configuration for [`RedisStorage`](crate::RedisStorage).

use fsm_core::StorageOptions;

/// Configuration for RedisStorage.
///
/// | Field | Type | Description |
/// |-------|------|-------------|
/// | `key_prefix` | `String` | Prepended as `<prefix>:` to every key; empty for none |
/// | `options` | `StorageOptions` | Size cap, default TTL, `set_data` auto-create policy |
#[derive(Debug, Clone, Default)]
pub struct RedisStorageConfig {
    pub key_prefix: String,
    pub options: StorageOptions,
}

impl RedisStorageConfig {
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            key_prefix: prefix.into(),
            options: StorageOptions::default(),
        }
    }
}
