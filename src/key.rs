use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::fingerprint::RequestFingerprint;

//
// CacheKey
//

/// An opaque, printable cache key.
///
/// Structure: `<identity>:<verb>:<destination>[?query][:<ctSuffix>]`.
/// Equality and hashing are bytewise over the formatted string; there is no
/// collision handling beyond key equality.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Append a [content-type suffix](KeyBuilder::content_type_suffix),
    /// returning a new key.
    ///
    /// The suffix is never part of the *default* lookup key; callers that
    /// want the default key keep using the unsuffixed [`CacheKey`] returned
    /// by [`KeyBuilder::build_key`].
    pub fn with_content_type_suffix(&self, content_type: &str) -> Self {
        let mut key = self.0.clone();
        key.push_str(&KeyBuilder::content_type_suffix(content_type));
        Self(key)
    }

    /// Borrow the key as a plain string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

//
// KeyBuilder
//

/// Deterministic derivation of cache keys from requests.
pub struct KeyBuilder;

impl KeyBuilder {
    /// Build the (unsuffixed) cache key for a request.
    ///
    /// Identity fields are taken verbatim — not URL-decoded — and the query
    /// string, when included, is appended exactly as received with no
    /// normalization (no re-sorting of parameters, no percent-decoding).
    pub fn build_key(fingerprint: &RequestFingerprint, include_query: bool) -> CacheKey {
        let mut key = String::new();
        fingerprint.write_identity(&mut key);

        key.push(':');
        key.push_str(fingerprint.method().as_str());
        key.push(':');
        key.push_str(fingerprint.destination());

        if include_query {
            if let Some(query) = fingerprint.raw_query() {
                if !query.is_empty() {
                    key.push('?');
                    key.push_str(query);
                }
            }
        }

        CacheKey(key)
    }

    /// Derive the content-type suffix appended to a cache key once the
    /// upstream response's `Content-Type` is known.
    ///
    /// The type/subtype string is lowercased over its ASCII range only —
    /// non-ASCII bytes pass through unchanged — then base64-encoded with
    /// the standard alphabet and padding. This keeps suffixed keys printable
    /// and free of the `:` separator used elsewhere in the key.
    pub fn content_type_suffix(content_type: &str) -> String {
        let lowered: Vec<u8> =
            content_type.bytes().map(|byte| byte.to_ascii_lowercase()).collect();
        format!(":{}", STANDARD.encode(lowered))
    }
}
