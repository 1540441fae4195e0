//! Cache Factory Module
//!
//! Builds the single driver instance a process uses, validating its
//! configuration up front so a misconfigured cache stops the process at boot.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use object_store::aws::AmazonS3Builder;
use tokio::fs::DirBuilder;
use tracing::{debug, info};
use url::Url;

use crate::cache::{
    FileSystemCache, KeyValueCache, KeyValueOptions, NullCache, ObjectStorageCache,
    ObjectStorageSettings, RedisClient, SharedCache,
};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};

// == Defaults ==
/// Directory created under the system temp dir when no base dir is set
pub const DEFAULT_BASE_DIR_NAME: &str = "screenshoter";
pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 6379;
pub const DEFAULT_DATABASE: u32 = 0;

// == Driver Kind ==
/// Backend selected by the `driver` configuration field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverKind {
    Null,
    FileSystem,
    ObjectStore,
    KeyValueStore,
}

impl FromStr for DriverKind {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "null" => Ok(DriverKind::Null),
            "filesystem" | "fs" => Ok(DriverKind::FileSystem),
            "object-store" | "s3" => Ok(DriverKind::ObjectStore),
            "key-value-store" | "redis" => Ok(DriverKind::KeyValueStore),
            _ => Err(CacheError::UnknownDriver(s.to_string())),
        }
    }
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DriverKind::Null => "null",
            DriverKind::FileSystem => "filesystem",
            DriverKind::ObjectStore => "object-store",
            DriverKind::KeyValueStore => "key-value-store",
        };
        f.write_str(name)
    }
}

// == Cache Factory ==
/// Creates cache drivers from a [`CacheConfig`].
pub struct CacheFactory;

impl CacheFactory {
    /// Builds the configured driver.
    ///
    /// Returns `Ok(None)` when no driver is configured. An unknown driver or
    /// invalid settings are reported as configuration errors; the key/value
    /// driver also fails here when the server can't be reached.
    pub async fn create(config: &CacheConfig) -> Result<Option<SharedCache>> {
        let driver = match config.driver.as_deref().map(str::trim) {
            Some(driver) if !driver.is_empty() => driver.parse::<DriverKind>()?,
            _ => {
                debug!("No cache driver configured");
                return Ok(None);
            }
        };

        let cache: SharedCache = match driver {
            DriverKind::Null => Arc::new(Self::create_null_driver()),
            DriverKind::FileSystem => Arc::new(Self::create_filesystem_driver(config).await?),
            DriverKind::ObjectStore => Arc::new(Self::create_object_store_driver(config)?),
            DriverKind::KeyValueStore => Arc::new(Self::create_key_value_driver(config).await?),
        };

        info!(driver = %driver, description = ?cache.describe().params, "Cache driver initialized");
        Ok(Some(cache))
    }

    pub fn create_null_driver() -> NullCache {
        NullCache::new()
    }

    /// Creates the base directory (recursively, with the configured mode)
    /// and a driver over it.
    pub async fn create_filesystem_driver(config: &CacheConfig) -> Result<FileSystemCache> {
        let base_dir = config
            .base_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_BASE_DIR_NAME));
        let mode = config.mode.as_deref().map(parse_mode).transpose()?;

        create_base_dir(&base_dir, mode).await.map_err(|e| {
            CacheError::Configuration(format!(
                "failed to create cache directory {}: {}",
                base_dir.display(),
                e
            ))
        })?;

        Ok(FileSystemCache::new(base_dir, mode))
    }

    /// Builds an S3 client. No request is made until the first get/set.
    pub fn create_object_store_driver(config: &CacheConfig) -> Result<ObjectStorageCache> {
        let bucket = config
            .bucket
            .as_deref()
            .map(str::trim)
            .filter(|bucket| !bucket.is_empty())
            .ok_or_else(|| CacheError::Configuration("bucket name is empty".to_string()))?;
        let region = config
            .region
            .clone()
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(bucket)
            .with_region(&region)
            .with_virtual_hosted_style_request(!config.force_path_style);

        if let Some(endpoint) = &config.endpoint_url {
            builder = builder
                .with_endpoint(endpoint)
                .with_allow_http(endpoint.starts_with("http://"));
        }
        if let Some(access_key_id) = &config.access_key_id {
            builder = builder.with_access_key_id(access_key_id);
        }
        if let Some(secret_access_key) = &config.secret_access_key {
            builder = builder.with_secret_access_key(secret_access_key);
        }

        let store = builder.build().map_err(|e| {
            CacheError::Configuration(format!("failed to create S3 client: {}", e))
        })?;

        Ok(ObjectStorageCache::new(
            Arc::new(store),
            ObjectStorageSettings {
                bucket: bucket.to_string(),
                region: Some(region),
                endpoint_url: config.endpoint_url.clone(),
                force_path_style: config.force_path_style,
            },
        ))
    }

    /// Connects and pings eagerly so a wrong address fails at boot.
    pub async fn create_key_value_driver(config: &CacheConfig) -> Result<KeyValueCache> {
        let url = Self::key_value_url(config)?;
        let client = RedisClient::connect(&url).await?;

        Ok(KeyValueCache::new(
            Arc::new(client),
            KeyValueOptions {
                key_prefix: config.key_prefix.clone(),
                expiration_time: config.expiration_time.filter(|secs| *secs > 0),
            },
        ))
    }

    /// Builds `redis://[user[:password]@]host:port/db` from the config.
    pub fn key_value_url(config: &CacheConfig) -> Result<Url> {
        let host = config.host.as_deref().unwrap_or(DEFAULT_HOST);
        let host = if host.contains(':') && !host.starts_with('[') {
            format!("[{}]", host)
        } else {
            host.to_string()
        };
        let port = config.port.unwrap_or(DEFAULT_PORT);
        let database = config.database.unwrap_or(DEFAULT_DATABASE);

        let mut url = Url::parse(&format!("redis://{}:{}/{}", host, port, database))
            .map_err(|e| CacheError::Configuration(format!("invalid key-value store address: {}", e)))?;

        if let Some(username) = &config.username {
            url.set_username(username)
                .map_err(|_| CacheError::Configuration("invalid key-value store username".to_string()))?;
        }
        if let Some(password) = &config.password {
            url.set_password(Some(password))
                .map_err(|_| CacheError::Configuration("invalid key-value store password".to_string()))?;
        }

        Ok(url)
    }
}

/// Parses an octal permission mode such as `0755`, `755` or `0o755`.
pub fn parse_mode(raw: &str) -> Result<u32> {
    let digits = raw.trim().trim_start_matches("0o");
    match u32::from_str_radix(digits, 8) {
        Ok(mode) if mode <= 0o7777 => Ok(mode),
        _ => Err(CacheError::Configuration(format!(
            "invalid file mode: {:?}",
            raw
        ))),
    }
}

async fn create_base_dir(base_dir: &Path, mode: Option<u32>) -> std::io::Result<()> {
    let mut builder = DirBuilder::new();
    builder.recursive(true);
    apply_mode(&mut builder, mode);
    builder.create(base_dir).await
}

#[cfg(unix)]
fn apply_mode(builder: &mut DirBuilder, mode: Option<u32>) {
    if let Some(mode) = mode {
        builder.mode(mode);
    }
}

#[cfg(not(unix))]
fn apply_mode(_builder: &mut DirBuilder, _mode: Option<u32>) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Cache;
    use tempfile::TempDir;

    fn config(driver: &str) -> CacheConfig {
        CacheConfig {
            driver: Some(driver.to_string()),
            ..CacheConfig::default()
        }
    }

    #[test]
    fn test_driver_kind_parse() {
        assert_eq!("null".parse::<DriverKind>().unwrap(), DriverKind::Null);
        assert_eq!("filesystem".parse::<DriverKind>().unwrap(), DriverKind::FileSystem);
        assert_eq!("S3".parse::<DriverKind>().unwrap(), DriverKind::ObjectStore);
        assert_eq!("redis".parse::<DriverKind>().unwrap(), DriverKind::KeyValueStore);
        assert!(matches!(
            "memcached".parse::<DriverKind>(),
            Err(CacheError::UnknownDriver(_))
        ));
    }

    #[test]
    fn test_parse_mode() {
        assert_eq!(parse_mode("0755").unwrap(), 0o755);
        assert_eq!(parse_mode("700").unwrap(), 0o700);
        assert_eq!(parse_mode("0o644").unwrap(), 0o644);
        assert!(parse_mode("0999").unwrap_err().is_configuration());
        assert!(parse_mode("rwx").is_err());
    }

    #[tokio::test]
    async fn test_create_without_driver() {
        assert!(CacheFactory::create(&CacheConfig::default())
            .await
            .unwrap()
            .is_none());
        assert!(CacheFactory::create(&config("  ")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_null_driver() {
        let cache = CacheFactory::create(&config("null")).await.unwrap().unwrap();
        assert_eq!(cache.describe().driver, "null");
    }

    #[tokio::test]
    async fn test_create_unknown_driver() {
        let err = CacheFactory::create(&config("memcached")).await.err().unwrap();
        assert!(matches!(err, CacheError::UnknownDriver(ref name) if name == "memcached"));
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn test_filesystem_driver_creates_base_dir() {
        let dir = TempDir::new().unwrap();
        let base_dir = dir.path().join("nested").join("cache");
        let config = CacheConfig {
            base_dir: Some(base_dir.clone()),
            mode: Some("0750".to_string()),
            ..config("filesystem")
        };

        let cache = CacheFactory::create_filesystem_driver(&config).await.unwrap();

        assert!(base_dir.is_dir());
        assert_eq!(cache.base_dir(), base_dir.as_path());
        assert_eq!(cache.describe().params["mode"], "750");
    }

    #[tokio::test]
    async fn test_filesystem_driver_rejects_invalid_mode() {
        let dir = TempDir::new().unwrap();
        let config = CacheConfig {
            base_dir: Some(dir.path().to_path_buf()),
            mode: Some("not-a-mode".to_string()),
            ..config("filesystem")
        };

        let err = CacheFactory::create(&config).await.err().unwrap();
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn test_filesystem_driver_fails_on_unusable_base_dir() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("occupied");
        std::fs::write(&file, b"not a directory").unwrap();
        let config = CacheConfig {
            base_dir: Some(file.join("cache")),
            ..config("filesystem")
        };

        let err = CacheFactory::create(&config).await.err().unwrap();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_object_store_requires_bucket() {
        let err = CacheFactory::create_object_store_driver(&config("object-store"))
            .err()
            .unwrap();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("bucket name is empty"));

        let blank = CacheConfig {
            bucket: Some("   ".to_string()),
            ..config("object-store")
        };
        assert!(CacheFactory::create_object_store_driver(&blank).is_err());
    }

    #[test]
    fn test_object_store_defaults() {
        let config = CacheConfig {
            bucket: Some("screenshots".to_string()),
            endpoint_url: Some("http://localhost:9000".to_string()),
            access_key_id: Some("minio".to_string()),
            secret_access_key: Some("minio-secret".to_string()),
            force_path_style: true,
            ..config("s3")
        };

        let cache = CacheFactory::create_object_store_driver(&config).unwrap();
        let settings = cache.settings();
        assert_eq!(settings.bucket, "screenshots");
        assert_eq!(settings.region.as_deref(), Some(DEFAULT_REGION));
        assert!(settings.force_path_style);

        let rendered = serde_json::to_string(&cache.describe()).unwrap();
        assert!(!rendered.contains("minio-secret"));
    }

    #[test]
    fn test_key_value_url_defaults() {
        let url = CacheFactory::key_value_url(&config("redis")).unwrap();
        assert_eq!(url.as_str(), "redis://127.0.0.1:6379/0");
    }

    #[test]
    fn test_key_value_url_with_credentials() {
        let config = CacheConfig {
            host: Some("cache.internal".to_string()),
            port: Some(6380),
            username: Some("app".to_string()),
            password: Some("p@ss".to_string()),
            database: Some(3),
            ..config("redis")
        };

        let url = CacheFactory::key_value_url(&config).unwrap();
        assert_eq!(url.scheme(), "redis");
        assert_eq!(url.host_str(), Some("cache.internal"));
        assert_eq!(url.port(), Some(6380));
        assert_eq!(url.username(), "app");
        assert_eq!(url.password(), Some("p%40ss"));
        assert_eq!(url.path(), "/3");
    }

    #[test]
    fn test_key_value_url_ipv6_host() {
        let config = CacheConfig {
            host: Some("::1".to_string()),
            ..config("redis")
        };
        let url = CacheFactory::key_value_url(&config).unwrap();
        assert_eq!(url.host_str(), Some("[::1]"));
    }

    #[tokio::test]
    async fn test_key_value_driver_fails_fast_when_unreachable() {
        let config = CacheConfig {
            host: Some("127.0.0.1".to_string()),
            port: Some(1),
            ..config("key-value-store")
        };

        let err = CacheFactory::create(&config).await.err().unwrap();
        assert!(err.is_backend());
    }
}
