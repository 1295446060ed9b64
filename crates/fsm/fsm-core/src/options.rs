//! Backend-independent storage options.

use std::time::Duration;

/// Default cap on the serialized size of a record's data: 1 MiB.
pub const DEFAULT_MAX_DATA_SIZE: usize = 1024 * 1024;

/// Options every backend honours.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageOptions {
    /// Maximum JSON-serialized size of `data`, in bytes.
    pub max_data_size: usize,
    /// TTL applied when a write creates a record and the caller gave none.
    pub default_ttl: Option<Duration>,
    /// Whether `set_data` on a missing key creates a record (with no state) instead of failing
    /// with `StateNotFound`.
    pub create_if_missing: bool,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            max_data_size: DEFAULT_MAX_DATA_SIZE,
            default_ttl: None,
            create_if_missing: false,
        }
    }
}

impl StorageOptions {
    pub fn with_max_data_size(mut self, bytes: usize) -> Self {
        self.max_data_size = bytes;
        self
    }

    pub fn with_default_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }

    /// TTL for a write: the explicit one, else the default when the write creates the record.
    pub fn effective_ttl(&self, explicit: Option<Duration>, creating: bool) -> Option<Duration> {
        match explicit {
            Some(ttl) => Some(ttl),
            None if creating => self.default_ttl,
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = StorageOptions::default();
        assert_eq!(options.max_data_size, 1_048_576);
        assert_eq!(options.default_ttl, None);
        assert!(!options.create_if_missing);
    }

    #[test]
    fn test_effective_ttl() {
        let options = StorageOptions::default().with_default_ttl(Some(Duration::from_secs(60)));
        let explicit = Some(Duration::from_secs(5));
        assert_eq!(options.effective_ttl(explicit, false), explicit);
        assert_eq!(options.effective_ttl(None, true), Some(Duration::from_secs(60)));
        assert_eq!(options.effective_ttl(None, false), None);
    }
}
