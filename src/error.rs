//! Error types for the cache subsystem
//!
//! Provides unified error handling using thiserror. A missing or stale entry is
//! never an error: drivers report it as `Ok(None)`.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for cache construction and backend access.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Invalid or missing driver settings
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Driver discriminator that no backend answers to
    #[error("Unknown driver: {0}")]
    UnknownDriver(String),

    /// Local filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Object storage failure (network, auth, protocol)
    #[error("Object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    /// Key/value store failure (network, auth, script)
    #[error("Key-value store error: {0}")]
    KeyValue(#[from] redis::RedisError),

    /// Operation attempted after `close()`
    #[error("Cache is closed: {0}")]
    Closed(String),
}

impl CacheError {
    /// Returns true for errors raised while building a driver.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            CacheError::Configuration(_) | CacheError::UnknownDriver(_)
        )
    }

    /// Returns true for failures of the backend itself during get/set/close.
    pub fn is_backend(&self) -> bool {
        !self.is_configuration()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache subsystem.
pub type Result<T> = std::result::Result<T, CacheError>;
