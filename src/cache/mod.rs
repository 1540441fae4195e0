//! Cache Module
//!
//! Read-through result cache with interchangeable storage backends.
//!
//! Every driver implements [`Cache`]; the [`CacheFactory`] picks one from a
//! [`CacheConfig`](crate::config::CacheConfig) at startup and the resulting
//! [`SharedCache`] is reused by every request.

mod factory;
mod filesystem;
mod freshness;
mod key;
mod key_value;
mod null;
mod object_storage;
pub mod stream;


use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;

// Re-export public types
pub use factory::{CacheFactory, DriverKind};
pub use filesystem::FileSystemCache;
pub use freshness::{effective_ttl, is_fresh, offset_clock, system_clock, Clock};
pub use key::{BackendKey, CacheKey};
pub use key_value::{EntryKeys, KeyValueCache, KeyValueClient, KeyValueOptions, RedisClient};
pub use null::NullCache;
pub use object_storage::{ObjectStorageCache, ObjectStorageSettings};
pub use stream::ByteStream;

// == Cache Contract ==
/// Contract shared by every cache driver.
///
/// A missing entry and a stale entry are both reported as `Ok(None)`; an
/// `Err` always means the backend itself failed. No method retries.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Fetches the payload stored under `key`.
    ///
    /// With `ttl` set to a positive number of seconds, entries older than
    /// that are reported as absent. `None` or `Some(0)` accepts any age.
    async fn get(&self, key: &str, ttl: Option<u64>) -> Result<Option<ByteStream>>;

    /// Stores `value` under `key`, recording its creation time.
    async fn set(&self, key: &str, value: ByteStream) -> Result<()>;

    /// Releases backend resources. Calling it twice is harmless.
    async fn close(&self) -> Result<()>;

    /// Driver name and non-secret parameters for diagnostics.
    fn describe(&self) -> CacheDescription;
}

/// Cache driver shared across request handlers.
pub type SharedCache = Arc<dyn Cache>;

// == Description ==
/// Diagnostic record returned by [`Cache::describe`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheDescription {
    pub driver: &'static str,
    #[serde(flatten)]
    pub params: BTreeMap<&'static str, String>,
}

impl CacheDescription {
    pub fn new(driver: &'static str) -> Self {
        Self {
            driver,
            params: BTreeMap::new(),
        }
    }

    /// Adds a parameter; `None` values are skipped.
    pub fn with(mut self, name: &'static str, value: Option<impl ToString>) -> Self {
        if let Some(value) = value {
            self.params.insert(name, value.to_string());
        }
        self
    }
}
