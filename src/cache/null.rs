//! Null Cache Module
//!
//! Driver that stores nothing, so callers can go through the cache
//! unconditionally when no backend is configured.

use async_trait::async_trait;

use crate::cache::{ByteStream, Cache, CacheDescription};
use crate::error::Result;

/// Cache that never returns anything and discards every write.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCache;

impl NullCache {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Cache for NullCache {
    async fn get(&self, _key: &str, _ttl: Option<u64>) -> Result<Option<ByteStream>> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: ByteStream) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    fn describe(&self) -> CacheDescription {
        CacheDescription::new("null")
    }
}
