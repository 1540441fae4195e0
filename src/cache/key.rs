//! Cache Key Module
//!
//! Maps caller-supplied cache keys to fixed-length backend identifiers.

use std::fmt;

// == Cache Key ==
/// Caller-supplied identifier of a cacheable result.
///
/// The cache never interprets it, only hashes it. Any string converts into a
/// `CacheKey`; `from_params` builds the order-independent form used for
/// screenshot request parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Creates a key from an already normalized string.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Builds a key from request parameters, independent of their order.
    ///
    /// Pairs are rendered as `name=value`, sorted, and joined as
    /// `|a=1|b=2|`.
    pub fn from_params<I, K, V>(params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut entries: Vec<String> = params
            .into_iter()
            .map(|(name, value)| format!("{}={}", name.as_ref(), value.as_ref()))
            .collect();
        entries.sort();

        Self(format!("|{}|", entries.join("|")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the backend identifier for this key.
    pub fn backend_key(&self) -> BackendKey {
        BackendKey::from_key(&self.0)
    }
}

impl From<&str> for CacheKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for CacheKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// == Backend Key ==
/// 128-bit MD5 digest of a cache key, rendered as 32 lowercase hex chars.
///
/// Used verbatim as file name, object key and (prefixed) store key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BackendKey(String);

impl BackendKey {
    /// Hashes a raw cache key string.
    pub fn from_key(key: &str) -> Self {
        Self(format!("{:x}", md5::compute(key.as_bytes())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for BackendKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BackendKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_key_known_digest() {
        assert_eq!(
            BackendKey::from_key("foo").as_str(),
            "acbd18db4cc2f85cedef654fccc4a4d8"
        );
    }

    #[test]
    fn test_backend_key_fixed_length() {
        for key in ["", "a", "|url=https://example.com|format=png|"] {
            let hashed = BackendKey::from_key(key);
            assert_eq!(hashed.as_str().len(), 32);
            assert!(hashed.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        }
    }

    #[test]
    fn test_from_params_order_independent() {
        let a = CacheKey::from_params([("url", "https://example.com"), ("format", "png")]);
        let b = CacheKey::from_params([("format", "png"), ("url", "https://example.com")]);

        assert_eq!(a, b);
        assert_eq!(a.as_str(), "|format=png|url=https://example.com|");
        assert_eq!(a.backend_key(), b.backend_key());
    }

    #[test]
    fn test_from_params_empty() {
        let key = CacheKey::from_params(Vec::<(String, String)>::new());
        assert_eq!(key.as_str(), "||");
    }
}
