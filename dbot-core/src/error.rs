use fsm_core::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbotError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl DbotError {
    /// True when the underlying storage reported a missing (or expired) record.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DbotError::Storage(e) if e.is_not_found())
    }
}

pub type Result<T> = std::result::Result<T, DbotError>;
