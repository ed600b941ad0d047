//! Cache key derivation.
//!
//! Keys are `namespace + hex(sha256(resource_id))`, so stored keys never
//! reveal the resource they belong to.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A derived, namespaced cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derive the cache key for a resource.
///
/// Returns `None` when the identifier is blank; callers then run without a
/// cache for that session.
pub fn derive_key(namespace: &str, resource_id: &str) -> Option<CacheKey> {
    let resource_id = resource_id.trim();
    if resource_id.is_empty() {
        return None;
    }

    let digest = Sha256::digest(resource_id.as_bytes());
    Some(CacheKey(format!("{namespace}{}", hex::encode(digest))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_stability() {
        let k1 = derive_key("tally:", "https://example.com/item/1");
        let k2 = derive_key("tally:", "https://example.com/item/1");
        assert_eq!(k1, k2);
    }

    #[test]
    fn test_key_distinct_resources() {
        let k1 = derive_key("tally:", "https://example.com/item/1").unwrap();
        let k2 = derive_key("tally:", "https://example.com/item/2").unwrap();
        assert_ne!(k1, k2);
    }

    #[test]
    fn test_key_format() {
        let key = derive_key("tally:", "https://example.com/item/1").unwrap();
        let digest = key.as_str().strip_prefix("tally:").unwrap();
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(!key.as_str().contains("example.com"));
    }

    #[test]
    fn test_key_trims_identifier() {
        assert_eq!(derive_key("tally:", "  abc "), derive_key("tally:", "abc"));
    }

    #[test]
    fn test_key_absent_for_blank_identifier() {
        assert!(derive_key("tally:", "").is_none());
        assert!(derive_key("tally:", "   ").is_none());
    }
}
