//! Screenshot Cache - A pluggable result cache for rendered screenshots
//!
//! Fronts an expensive render step with one of several interchangeable
//! storage backends (filesystem, S3-compatible object store, Redis, null),
//! all honoring the same read-time TTL contract.

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{Cache, CacheFactory, CacheKey, SharedCache};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
