use std::{collections::HashMap, time::Duration};

use serde::{Deserialize, Serialize};

//
// CachingConfig
//

/// Configuration for one [`CachingPolicy`](crate::policy::CachingPolicy) binding.
///
/// Malformed input never produces an `Err`: configuration problems degrade
/// (TTL falls back to 0, i.e. caching disabled) rather than propagate. This
/// mirrors how a gateway plugin loader would rather start up with caching
/// off than refuse to boot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachingConfig {
    /// Time-to-live in seconds for entries written under this binding.
    ///
    /// `0` disables caching entirely: the request phase never consults the
    /// store and the response phase never installs a tee.
    #[serde(default)]
    pub ttl: u64,

    /// Whether the raw query string participates in the cache key.
    #[serde(default, rename = "includeQueryInKey")]
    pub include_query_in_key: bool,
}

impl Default for CachingConfig {
    fn default() -> Self {
        Self { ttl: 0, include_query_in_key: false }
    }
}

impl CachingConfig {
    /// Caching is disabled for this binding (`ttl == 0`).
    pub fn is_disabled(&self) -> bool {
        self.ttl == 0
    }

    /// The configured TTL as a [`Duration`], if caching is enabled.
    pub fn ttl_duration(&self) -> Option<Duration> {
        (!self.is_disabled()).then(|| Duration::from_secs(self.ttl))
    }

    /// Parse from the gateway's flat options map (all values are strings).
    ///
    /// Unknown keys are ignored. A malformed `ttl` degrades to `0`
    /// (caching disabled). `includeQueryInKey` accepts `"true"`/`"false"`
    /// case-insensitively; any other value (including absence) is `false`.
    pub fn from_map(options: &HashMap<String, String>) -> Self {
        let ttl = options
            .get("ttl")
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(0);

        let include_query_in_key = options
            .get("includeQueryInKey")
            .map(|value| value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Self { ttl, include_query_in_key }
    }

    /// Parse from the JSON configuration schema (`{"ttl": ..., "includeQueryInKey": ...}`).
    ///
    /// Unlike [`from_map`](Self::from_map) this can fail: malformed JSON
    /// (not an object, or `ttl` of the wrong type) is a
    /// [`ConfigError`], since at this layer we are deserializing a typed
    /// wire payload rather than tolerating an arbitrary string map.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(ConfigError::from)
    }
}

/// Error parsing a [`CachingConfig`] from the JSON wire schema.
///
/// The only configuration failure mode that is surfaced as an `Err` rather
/// than silently degraded: raised only when the caller explicitly asked for
/// strict JSON parsing via [`CachingConfig::from_json`].
/// [`CachingConfig::from_map`] never fails.
#[derive(Debug, thiserror::Error)]
#[error("invalid caching configuration: {0}")]
pub struct ConfigError(#[from] serde_json::Error);
