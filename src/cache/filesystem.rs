//! File System Cache Module
//!
//! Stores each entry as a file named after its backend key. The file's
//! modification time is the entry's creation time.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error};
use uuid::Uuid;

use crate::cache::freshness::{age_secs, effective_ttl, is_fresh, system_clock, Clock};
use crate::cache::key::BackendKey;
use crate::cache::stream::{self, ByteStream};
use crate::cache::{Cache, CacheDescription};
use crate::error::Result;

// == File System Cache ==
/// Cache driver backed by a local directory.
///
/// Writes land in a temporary sibling file which is renamed over the final
/// path, so readers only ever see a complete payload.
pub struct FileSystemCache {
    /// Directory holding the cache files
    base_dir: PathBuf,
    /// Permission mode for new cache files
    mode: Option<u32>,
    clock: Clock,
}

impl FileSystemCache {
    // == Constructor ==
    /// Creates a driver over an existing directory.
    ///
    /// # Arguments
    /// * `base_dir` - Directory holding the cache files
    /// * `mode` - Optional permission mode for new files (unix only)
    pub fn new(base_dir: impl Into<PathBuf>, mode: Option<u32>) -> Self {
        Self {
            base_dir: base_dir.into(),
            mode,
            clock: system_clock(),
        }
    }

    /// Replaces the clock used for TTL checks.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Returns the path of the file holding `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.base_dir.join(BackendKey::from_key(key).as_str())
    }

    fn open_options(&self) -> OpenOptions {
        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        apply_mode(&mut options, self.mode);
        options
    }

    async fn write_proxy(&self, proxy: &Path, mut value: ByteStream) -> Result<()> {
        let mut file = self.open_options().open(proxy).await?;
        while let Some(chunk) = value.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;
        file.sync_all().await?;
        Ok(())
    }
}

#[async_trait]
impl Cache for FileSystemCache {
    async fn get(&self, key: &str, ttl: Option<u64>) -> Result<Option<ByteStream>> {
        let filename = self.path_for(key);
        debug!(filename = %filename.display(), "Reading data from file");

        let file = match File::open(&filename).await {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(filename = %filename.display(), "File does not exist");
                return Ok(None);
            }
            Err(err) => {
                error!(filename = %filename.display(), error = %err, "Error while opening file for reading");
                return Err(err.into());
            }
        };

        if let Some(ttl) = effective_ttl(ttl) {
            let modified_at = modified_at(&file).await;
            let now = (self.clock)();
            if !is_fresh(modified_at, ttl, now) {
                debug!(
                    filename = %filename.display(),
                    age = modified_at.map(|m| age_secs(m, now)),
                    ttl,
                    "Cache file is stale"
                );
                return Ok(None);
            }
        }

        Ok(Some(stream::from_file(file)))
    }

    async fn set(&self, key: &str, value: ByteStream) -> Result<()> {
        let filename = self.path_for(key);
        let proxy = self.base_dir.join(format!(
            "{}.{}.tmp",
            BackendKey::from_key(key),
            Uuid::new_v4().simple()
        ));
        debug!(proxy = %proxy.display(), filename = %filename.display(), "Writing data to file");

        if let Err(err) = self.write_proxy(&proxy, value).await {
            error!(proxy = %proxy.display(), error = %err, "Error while writing proxy file");
            let _ = fs::remove_file(&proxy).await;
            return Err(err);
        }

        if let Err(err) = fs::rename(&proxy, &filename).await {
            error!(
                proxy = %proxy.display(),
                filename = %filename.display(),
                error = %err,
                "Error while renaming proxy file to final"
            );
            let _ = fs::remove_file(&proxy).await;
            return Err(err.into());
        }

        debug!(filename = %filename.display(), "Cache file has been written");
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    fn describe(&self) -> CacheDescription {
        CacheDescription::new("filesystem")
            .with("base_dir", Some(self.base_dir.display()))
            .with("mode", self.mode.map(|mode| format!("{:o}", mode)))
    }
}

#[cfg(unix)]
fn apply_mode(options: &mut OpenOptions, mode: Option<u32>) {
    if let Some(mode) = mode {
        options.mode(mode);
    }
}

#[cfg(not(unix))]
fn apply_mode(_options: &mut OpenOptions, _mode: Option<u32>) {}

/// Last modification time of an open file, `None` when the platform can't
/// report it.
async fn modified_at(file: &File) -> Option<DateTime<Utc>> {
    let metadata = file.metadata().await.ok()?;
    metadata.modified().ok().map(DateTime::<Utc>::from)
}
