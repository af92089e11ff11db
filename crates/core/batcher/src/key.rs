use std::fmt;

use base64::prelude::*;
use once_cell::sync::Lazy;
use regex::Regex;

/// Pattern a decoded identifier must match to already be canonical
static RE_DIRECTORY_URI: Lazy<Regex> = Lazy::new(|| Regex::new("^courier://directory/").unwrap());

/// URI scheme and path prefix for directory resources
static DIRECTORY_URI_PREFIX: &str = "courier://directory/";

/// Canonical, deduplication-ready form of a caller-supplied identifier
///
/// Only ever produced by [`CanonicalKey::normalize`], which makes it safe
/// to use as the map key throughout the batcher.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CanonicalKey(String);

impl CanonicalKey {
    /// Normalise a raw identifier into its canonical key
    ///
    /// Identifiers that already decode to a directory URI are passed
    /// through unchanged, so `normalize(normalize(x)) == normalize(x)`.
    pub fn normalize(raw_id: &str) -> CanonicalKey {
        if let Ok(decoded) = BASE64_URL_SAFE_NO_PAD.decode(raw_id) {
            if let Ok(uri) = String::from_utf8(decoded) {
                if RE_DIRECTORY_URI.is_match(&uri) {
                    return CanonicalKey(raw_id.to_string());
                }
            }
        }

        CanonicalKey(BASE64_URL_SAFE_NO_PAD.encode(format!("{DIRECTORY_URI_PREFIX}{raw_id}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use base64::prelude::*;

    use crate::CanonicalKey;

    #[test]
    fn normalize_is_idempotent_for_raw_ids() {
        let key = CanonicalKey::normalize("01ABCDEF");
        let again = CanonicalKey::normalize(key.as_str());
        assert_eq!(key, again);
    }

    #[test]
    fn normalize_passes_canonical_input_through() {
        let canonical = BASE64_URL_SAFE_NO_PAD.encode("courier://directory/01ABCDEF");
        let key = CanonicalKey::normalize(&canonical);
        assert_eq!(key.as_str(), canonical);
    }

    #[test]
    fn normalize_wraps_unrelated_base64() {
        // Valid base64, but not a directory URI once decoded
        let raw = BASE64_URL_SAFE_NO_PAD.encode("https://example.com");
        let key = CanonicalKey::normalize(&raw);
        assert_ne!(key.as_str(), raw);

        let decoded = BASE64_URL_SAFE_NO_PAD.decode(key.as_str()).unwrap();
        let uri = String::from_utf8(decoded).unwrap();
        assert!(uri.starts_with("courier://directory/"));
    }

    #[test]
    fn distinct_ids_produce_distinct_keys() {
        assert_ne!(
            CanonicalKey::normalize("01ALICE"),
            CanonicalKey::normalize("01BOB")
        );
    }
}
