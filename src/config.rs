//! Configuration Module
//!
//! Flat driver configuration consumed once by the cache factory.

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::{CacheError, Result};

/// Cache driver configuration.
///
/// Only the fields belonging to the selected driver are read; every optional
/// field falls back to a default when the factory builds the driver.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Driver discriminator, `None` disables caching
    pub driver: Option<String>,

    // == Object Store ==
    /// Custom S3-compatible endpoint (MinIO, R2, ...)
    pub endpoint_url: Option<String>,
    /// Region, defaults to `us-east-1`
    pub region: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    /// Bucket name, required by the object-store driver
    pub bucket: Option<String>,
    /// Use path-style requests instead of virtual-hosted buckets
    pub force_path_style: bool,

    // == File System ==
    /// Base directory, defaults to `<tmp>/screenshoter`
    pub base_dir: Option<PathBuf>,
    /// Octal permission mode for the directory and cache files, e.g. `0755`
    pub mode: Option<String>,

    // == Key Value Store ==
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Database index
    pub database: Option<u32>,
    /// Prefix prepended to every stored key
    pub key_prefix: Option<String>,
    /// Hard expiration in seconds applied to both payload and timestamp keys
    pub expiration_time: Option<u64>,
}

impl CacheConfig {
    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_DRIVER` - `null`, `filesystem`, `object-store` or `key-value-store`
    /// - `CACHE_S3_ENDPOINT_URL`, `CACHE_S3_REGION`, `CACHE_S3_ACCESS_KEY_ID`,
    ///   `CACHE_S3_SECRET_ACCESS_KEY`, `CACHE_S3_BUCKET`, `CACHE_S3_FORCE_PATH_STYLE`
    /// - `CACHE_FS_BASE_DIR`, `CACHE_FS_MODE`
    /// - `CACHE_REDIS_HOST`, `CACHE_REDIS_PORT`, `CACHE_REDIS_USERNAME`,
    ///   `CACHE_REDIS_PASSWORD`, `CACHE_REDIS_DATABASE`, `CACHE_REDIS_KEY_PREFIX`,
    ///   `CACHE_REDIS_EXPIRATION_TIME`
    ///
    /// Empty variables are treated as unset. A value that does not parse is a
    /// configuration error rather than a silent fallback to the default.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|name| env::var(name).ok())
    }

    /// Same as [`CacheConfig::from_env`], reading variables through `lookup`.
    ///
    /// # Arguments
    /// * `lookup` - Returns the raw value of a variable, `None` when unset
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.is_empty());

        Ok(Self {
            driver: var("CACHE_DRIVER"),
            endpoint_url: var("CACHE_S3_ENDPOINT_URL"),
            region: var("CACHE_S3_REGION"),
            access_key_id: var("CACHE_S3_ACCESS_KEY_ID"),
            secret_access_key: var("CACHE_S3_SECRET_ACCESS_KEY"),
            bucket: var("CACHE_S3_BUCKET"),
            force_path_style: var("CACHE_S3_FORCE_PATH_STYLE")
                .map(|v| parse_flag("CACHE_S3_FORCE_PATH_STYLE", &v))
                .transpose()?
                .unwrap_or(false),
            base_dir: var("CACHE_FS_BASE_DIR").map(PathBuf::from),
            mode: var("CACHE_FS_MODE"),
            host: var("CACHE_REDIS_HOST"),
            port: parse_var("CACHE_REDIS_PORT", var("CACHE_REDIS_PORT"))?,
            username: var("CACHE_REDIS_USERNAME"),
            password: var("CACHE_REDIS_PASSWORD"),
            database: parse_var("CACHE_REDIS_DATABASE", var("CACHE_REDIS_DATABASE"))?,
            key_prefix: var("CACHE_REDIS_KEY_PREFIX"),
            expiration_time: parse_var(
                "CACHE_REDIS_EXPIRATION_TIME",
                var("CACHE_REDIS_EXPIRATION_TIME"),
            )?,
        })
    }
}

impl fmt::Debug for CacheConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheConfig")
            .field("driver", &self.driver)
            .field("endpoint_url", &self.endpoint_url)
            .field("region", &self.region)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &redacted(&self.secret_access_key))
            .field("bucket", &self.bucket)
            .field("force_path_style", &self.force_path_style)
            .field("base_dir", &self.base_dir)
            .field("mode", &self.mode)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &redacted(&self.password))
            .field("database", &self.database)
            .field("key_prefix", &self.key_prefix)
            .field("expiration_time", &self.expiration_time)
            .finish()
    }
}

fn parse_var<T>(name: &str, value: Option<String>) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value
        .map(|v| {
            v.trim()
                .parse()
                .map_err(|e| CacheError::Configuration(format!("invalid {}: {:?} ({})", name, v, e)))
        })
        .transpose()
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(CacheError::Configuration(format!(
            "invalid {}: {:?}",
            name, value
        ))),
    }
}

fn redacted(secret: &Option<String>) -> Option<&'static str> {
    secret.as_ref().map(|_| "***")
}
