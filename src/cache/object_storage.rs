//! Object store implementation of the cache.
//!
//! Works against S3 and S3-compatible services (MinIO, R2, ...) through the
//! `object_store` crate. The server-reported last-modified time is the
//! entry's creation time; nothing else is written alongside the payload.
//!
//! Small payloads go out as a single `PUT`. Once a payload grows past the
//! multipart threshold the rest of the stream is uploaded in parts, so a
//! large render is never held in memory as a whole.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use object_store::path::Path;
use object_store::{ObjectStore, ObjectStoreExt, PutPayload, WriteMultipart};
use tracing::{debug, error, warn};

use crate::cache::freshness::{age_secs, effective_ttl, is_fresh, system_clock, Clock};
use crate::cache::key::BackendKey;
use crate::cache::stream::ByteStream;
use crate::cache::{Cache, CacheDescription};
use crate::error::{CacheError, Result};

/// Payloads up to this many bytes are sent with a single `PUT`; it is also
/// the part size of multipart uploads (the S3 minimum).
pub const MULTIPART_THRESHOLD: usize = 5 * 1024 * 1024;

/// Parts of one upload allowed in flight at once.
const MULTIPART_CONCURRENCY: usize = 4;

/// Non-secret settings reported by `describe()`.
#[derive(Debug, Clone, Default)]
pub struct ObjectStorageSettings {
    pub bucket: String,
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
    pub force_path_style: bool,
}

/// Cache backed by an [`ObjectStore`].
pub struct ObjectStorageCache {
    inner: Arc<dyn ObjectStore>,
    settings: ObjectStorageSettings,
    clock: Clock,
    multipart_threshold: usize,
}

impl ObjectStorageCache {
    /// Wraps an already configured store.
    pub fn new(inner: Arc<dyn ObjectStore>, settings: ObjectStorageSettings) -> Self {
        Self {
            inner,
            settings,
            clock: system_clock(),
            multipart_threshold: MULTIPART_THRESHOLD,
        }
    }

    /// Create an in-memory store for testing.
    pub fn memory() -> Self {
        Self::new(
            Arc::new(object_store::memory::InMemory::new()),
            ObjectStorageSettings {
                bucket: "memory".to_string(),
                ..Default::default()
            },
        )
    }

    /// Replaces the clock used for TTL checks.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Overrides the single-`PUT` size limit and multipart part size.
    pub fn with_multipart_threshold(mut self, bytes: usize) -> Self {
        self.multipart_threshold = bytes.max(1);
        self
    }

    pub fn settings(&self) -> &ObjectStorageSettings {
        &self.settings
    }

    async fn upload_multipart(
        &self,
        location: &Path,
        head: Vec<Bytes>,
        mut rest: ByteStream,
    ) -> Result<()> {
        debug!(location = %location, "Starting multipart upload");
        let upload = self.inner.put_multipart(location).await.map_err(|e| {
            error!(location = %location, bucket = %self.settings.bucket, error = %e, "Error while starting multipart upload");
            CacheError::from(e)
        })?;
        let mut writer = WriteMultipart::new_with_chunk_size(upload, self.multipart_threshold);
        for chunk in head {
            writer.put(chunk);
        }

        while let Some(chunk) = rest.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    if let Err(abort) = writer.abort().await {
                        warn!(location = %location, error = %abort, "Failed to abort multipart upload");
                    }
                    return Err(e);
                }
            };
            if let Err(e) = writer.wait_for_capacity(MULTIPART_CONCURRENCY).await {
                error!(location = %location, bucket = %self.settings.bucket, error = %e, "Error while uploading part");
                return Err(e.into());
            }
            writer.put(chunk);
        }

        writer.finish().await.map_err(|e| {
            error!(location = %location, bucket = %self.settings.bucket, error = %e, "Error while completing multipart upload");
            CacheError::from(e)
        })?;

        Ok(())
    }

    fn location(key: &str) -> Path {
        Path::from(BackendKey::from_key(key).as_str())
    }
}

#[async_trait]
impl Cache for ObjectStorageCache {
    async fn get(&self, key: &str, ttl: Option<u64>) -> Result<Option<ByteStream>> {
        let location = Self::location(key);
        debug!(key, location = %location, bucket = %self.settings.bucket, "Requesting object store");

        let result = match self.inner.get(&location).await {
            Ok(result) => result,
            Err(object_store::Error::NotFound { .. }) => {
                debug!(location = %location, "Object does not exist");
                return Ok(None);
            }
            Err(e) => {
                error!(location = %location, bucket = %self.settings.bucket, error = %e, "Error while requesting object store");
                return Err(e.into());
            }
        };

        if let Some(ttl) = effective_ttl(ttl) {
            let last_modified = result.meta.last_modified;
            let now = (self.clock)();
            if !is_fresh(Some(last_modified), ttl, now) {
                debug!(
                    location = %location,
                    age = age_secs(last_modified, now),
                    ttl,
                    "Object is stale"
                );
                return Ok(None);
            }
        }

        Ok(Some(result.into_stream().map_err(CacheError::from).boxed()))
    }

    /// Buffers up to the multipart threshold, then switches to a multipart
    /// upload for the remainder. The object only becomes visible once the
    /// upload completes, so a failing producer leaves the previous value.
    async fn set(&self, key: &str, mut value: ByteStream) -> Result<()> {
        let location = Self::location(key);

        let mut head = Vec::new();
        let mut buffered = 0;
        while buffered <= self.multipart_threshold {
            let Some(chunk) = value.next().await else {
                let payload: PutPayload = head.into_iter().collect();
                debug!(location = %location, size = payload.content_length(), "Putting object");
                self.inner.put(&location, payload).await.map_err(|e| {
                    error!(location = %location, bucket = %self.settings.bucket, error = %e, "Error while putting object");
                    CacheError::from(e)
                })?;
                return Ok(());
            };
            let chunk = chunk?;
            buffered += chunk.len();
            head.push(chunk);
        }

        self.upload_multipart(&location, head, value).await
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    fn describe(&self) -> CacheDescription {
        CacheDescription::new("object-store")
            .with("bucket", Some(&self.settings.bucket))
            .with("region", self.settings.region.as_ref())
            .with("endpoint_url", self.settings.endpoint_url.as_ref())
            .with("force_path_style", Some(self.settings.force_path_style))
    }
}
