//! Runtime configuration
//!
//! Every field has a default, so an empty JSON object (or no file at all) is
//! a valid configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Environment variable overriding [`NotelineConfig::network`]
pub const ENV_NETWORK: &str = "NOTELINE_NETWORK";

/// Environment variable overriding [`NotelineConfig::spending_ceiling`]
pub const ENV_SPENDING_CEILING: &str = "NOTELINE_SPENDING_CEILING";

/// Configuration for noteline behavior
///
/// # Examples
///
/// ```rust
/// use noteline_core::NotelineConfig;
///
/// let config = NotelineConfig {
///     chunk_delay_ms: 0,
///     spending_ceiling: 10_000,
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotelineConfig {
    /// Logical ledger namespace contacts are discovered in
    ///
    /// Default: `testnet`
    pub network: String,

    /// Maximum plaintext bytes per PSK chunk.
    ///
    /// Envelope overhead (at most 59 bytes) comes on top, so the default keeps
    /// every note under the smallest observed transport ceiling of 878 bytes.
    ///
    /// Default: 800
    pub psk_chunk_bytes: usize,

    /// Maximum plaintext bytes per direct transmission part
    ///
    /// Default: 800
    pub direct_chunk_bytes: usize,

    /// Maximum number of transactions in one atomic group
    ///
    /// Default: 16
    pub max_group_size: usize,

    /// Delay between consecutive PSK chunks in milliseconds.
    ///
    /// Long enough that consecutive chunks land in different blocks.
    ///
    /// Default: 4000
    pub chunk_delay_ms: u64,

    /// Discovery poll interval in seconds
    ///
    /// Default: 15
    pub poll_interval_secs: u64,

    /// Timeout for each remote query made by a discovery tick, in seconds
    ///
    /// Default: 10
    pub poll_query_timeout_secs: u64,

    /// Blocks scanned by the first discovery tick
    ///
    /// Default: 1000
    pub discovery_lookback_blocks: u64,

    /// Public key cache time-to-live in seconds
    ///
    /// Default: 3600 (1 hour)
    pub key_cache_ttl_secs: u64,

    /// Maximum number of cached public keys
    ///
    /// Default: 1024
    pub key_cache_capacity: usize,

    /// Spending ceiling per period, in ledger cost units
    ///
    /// Default: 1_000_000
    pub spending_ceiling: u64,

    /// Length of a spending period in seconds, aligned to the unix epoch
    ///
    /// Default: 86400 (1 day)
    pub spending_period_secs: u64,

    /// Estimated fee per transaction used when reserving budget
    ///
    /// Default: 1000
    pub fee_per_transaction: u64,

    /// Characters of content kept in a dead-letter preview
    ///
    /// Default: 100
    pub dead_letter_preview_chars: usize,

    /// Dead letters kept in memory for inspection
    ///
    /// Default: 256
    pub dead_letter_capacity: usize,
}

impl Default for NotelineConfig {
    fn default() -> Self {
        Self {
            network: "testnet".to_string(),
            psk_chunk_bytes: 800,
            direct_chunk_bytes: 800,
            max_group_size: 16,
            chunk_delay_ms: 4000,
            poll_interval_secs: 15,
            poll_query_timeout_secs: 10,
            discovery_lookback_blocks: 1000,
            key_cache_ttl_secs: 3600,
            key_cache_capacity: 1024,
            spending_ceiling: 1_000_000,
            spending_period_secs: 86_400,
            fee_per_transaction: 1000,
            dead_letter_preview_chars: 100,
            dead_letter_capacity: 256,
        }
    }
}

impl NotelineConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Inter-chunk delay
    pub fn chunk_delay(&self) -> Duration {
        Duration::from_millis(self.chunk_delay_ms)
    }

    /// Discovery poll interval
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Per-query timeout for discovery
    pub fn poll_query_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_query_timeout_secs)
    }

    /// Public key cache TTL
    pub fn key_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.key_cache_ttl_secs)
    }

    /// Reject values that would make the system unusable
    pub fn validate(&self) -> Result<(), Error> {
        let non_zero = [
            ("psk_chunk_bytes", self.psk_chunk_bytes as u64),
            ("direct_chunk_bytes", self.direct_chunk_bytes as u64),
            ("max_group_size", self.max_group_size as u64),
            ("poll_interval_secs", self.poll_interval_secs),
            ("poll_query_timeout_secs", self.poll_query_timeout_secs),
            ("key_cache_capacity", self.key_cache_capacity as u64),
            ("spending_period_secs", self.spending_period_secs),
            ("dead_letter_capacity", self.dead_letter_capacity as u64),
        ];
        for (name, value) in non_zero {
            if value == 0 {
                return Err(Error::Config(format!("{name} must be greater than 0")));
            }
        }

        if self.network.trim().is_empty() {
            return Err(Error::Config("network must not be empty".to_string()));
        }

        Ok(())
    }

    /// Apply `NOTELINE_*` environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<(), Error> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(network) = lookup(ENV_NETWORK)
            && !network.trim().is_empty()
        {
            self.network = network.trim().to_string();
        }

        if let Some(ceiling) = lookup(ENV_SPENDING_CEILING) {
            self.spending_ceiling = ceiling.trim().parse().map_err(|e| {
                Error::Config(format!("{ENV_SPENDING_CEILING}={ceiling:?}: {e}"))
            })?;
        }

        Ok(())
    }
}

/// Load configuration from a JSON file.
///
/// A missing file yields the defaults; a file that exists but does not parse
/// is an error.
pub fn load_config<P>(path: P) -> Result<NotelineConfig, Error>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(NotelineConfig::default());
        }
        Err(e) => {
            return Err(Error::Config(format!(
                "Failed to read {}: {e}",
                path.display()
            )));
        }
    };

    serde_json::from_slice::<NotelineConfig>(&bytes)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = NotelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.psk_chunk_bytes, 800);
        assert_eq!(config.key_cache_ttl(), Duration::from_secs(3600));
        assert_eq!(config.chunk_delay(), Duration::from_millis(4000));
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: NotelineConfig =
            serde_json::from_str(r#"{"network":"mainnet","max_group_size":4}"#).unwrap();
        assert_eq!(config.network, "mainnet");
        assert_eq!(config.max_group_size, 4);
        assert_eq!(config.psk_chunk_bytes, 800);
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        let config = NotelineConfig {
            psk_chunk_bytes: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("psk_chunk_bytes"));

        let config = NotelineConfig {
            network: "  ".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_NETWORK, "mainnet"),
            (ENV_SPENDING_CEILING, " 5000 "),
        ]);
        let mut config = NotelineConfig::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.network, "mainnet");
        assert_eq!(config.spending_ceiling, 5000);
    }

    #[test]
    fn test_invalid_ceiling_override() {
        let mut config = NotelineConfig::default();
        let result = config.apply_overrides(|key| {
            (key == ENV_SPENDING_CEILING).then(|| "lots".to_string())
        });
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_load_config_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(dir.path().join("absent.json")).unwrap();
        assert_eq!(config, NotelineConfig::default());
    }

    #[test]
    fn test_load_config_malformed_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noteline.json");
        std::fs::write(&path, b"{ not json").unwrap();
        assert!(matches!(load_config(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_load_config_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noteline.json");
        std::fs::write(&path, br#"{"chunk_delay_ms":250}"#).unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.chunk_delay_ms, 250);
    }
}
