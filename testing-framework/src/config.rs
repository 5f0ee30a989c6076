// File: testing-framework/src/config.rs
//
// Harness Configuration
//
// Chain parameters, suspension-point timeouts and artifact locations. Values
// come from defaults, an optional YAML file, then environment overrides.

use crate::primitives::{u256_string, U256};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variable toggling automatic mining
pub const ENV_AUTO_MINE: &str = "STORAGE_TEST_AUTO_MINE";
/// Environment variable overriding the confirmation timeout (milliseconds)
pub const ENV_CONFIRMATION_MS: &str = "STORAGE_TEST_CONFIRMATION_MS";
/// Environment variable overriding the read-only call timeout (milliseconds)
pub const ENV_CALL_MS: &str = "STORAGE_TEST_CALL_MS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid value '{value}' for {var}")]
    Env { var: &'static str, value: String },

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Top-level harness configuration
///
/// # Example
///
/// ```yaml
/// chain:
///   auto_mine: false
///   funded_accounts: 3
///   default_balance: "1000000000000000000"
/// timeouts:
///   confirmation_ms: 5000
/// failure_artifacts_dir: "./artifacts"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct HarnessConfig {
    /// Simulated chain parameters
    pub chain: ChainConfig,
    /// Timeouts applied to every suspension point
    pub timeouts: TimeoutConfig,
    /// Directory of contract build artifacts (JSON) to load into the registry
    pub artifacts_dir: Option<PathBuf>,
    /// Where failure artifacts are written (disabled when unset)
    pub failure_artifacts_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Maximum gas a single block (and so a single transaction) may use
    pub block_gas_limit: u64,
    /// Price paid per unit of gas
    pub gas_price: u64,
    /// Gas limit attached to requests that do not specify one
    pub default_gas: u64,
    /// Mine a block for every submitted transaction
    pub auto_mine: bool,
    /// Number of fixture accounts funded at genesis
    pub funded_accounts: usize,
    /// Genesis balance of every fixture account
    #[serde(with = "u256_string")]
    pub default_balance: U256,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            block_gas_limit: 30_000_000,
            gas_price: 1,
            default_gas: 6_721_975,
            auto_mine: true,
            funded_accounts: 10,
            // 100 ether in wei
            default_balance: U256::exp10(20),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// How long a mutating call may wait for its receipt
    pub confirmation_ms: u64,
    /// How long a read-only call may wait for its response
    pub call_ms: u64,
    /// Receipt polling interval
    pub poll_interval_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            confirmation_ms: 30_000,
            call_ms: 10_000,
            poll_interval_ms: 50,
        }
    }
}

impl TimeoutConfig {
    pub fn confirmation(&self) -> Duration {
        Duration::from_millis(self.confirmation_ms)
    }

    pub fn call(&self) -> Duration {
        Duration::from_millis(self.call_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl HarnessConfig {
    /// Parse a YAML document; missing fields take their defaults
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: HarnessConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a YAML config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        if log::log_enabled!(log::Level::Debug) {
            log::debug!("Loaded harness config from {}", path.display());
        }

        Self::from_yaml_str(&content)
    }

    /// Apply `STORAGE_TEST_*` environment overrides
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(value) = std::env::var(ENV_AUTO_MINE) {
            self.chain.auto_mine = match value.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => {
                    return Err(ConfigError::Env {
                        var: ENV_AUTO_MINE,
                        value,
                    })
                }
            };
        }
        if let Ok(value) = std::env::var(ENV_CONFIRMATION_MS) {
            self.timeouts.confirmation_ms = value.parse().map_err(|_| ConfigError::Env {
                var: ENV_CONFIRMATION_MS,
                value: value.clone(),
            })?;
        }
        if let Ok(value) = std::env::var(ENV_CALL_MS) {
            self.timeouts.call_ms = value.parse().map_err(|_| ConfigError::Env {
                var: ENV_CALL_MS,
                value: value.clone(),
            })?;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeouts.confirmation_ms == 0 || self.timeouts.call_ms == 0 {
            return Err(ConfigError::Invalid(
                "timeouts must be greater than zero".to_string(),
            ));
        }
        if self.timeouts.poll_interval_ms == 0
            || self.timeouts.poll_interval_ms >= self.timeouts.confirmation_ms
        {
            return Err(ConfigError::Invalid(format!(
                "poll interval {}ms must be non-zero and below the confirmation timeout {}ms",
                self.timeouts.poll_interval_ms, self.timeouts.confirmation_ms
            )));
        }
        if self.chain.default_gas > self.chain.block_gas_limit {
            return Err(ConfigError::Invalid(format!(
                "default gas {} exceeds block gas limit {}",
                self.chain.default_gas, self.chain.block_gas_limit
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = HarnessConfig::default();
        config.validate().unwrap();
        assert!(config.chain.auto_mine);
        assert_eq!(config.chain.funded_accounts, 10);
        assert_eq!(
            config.chain.default_balance.to_string(),
            "100000000000000000000"
        );
        assert_eq!(config.timeouts.confirmation(), Duration::from_secs(30));
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = HarnessConfig::from_yaml_str(
            r#"
chain:
  auto_mine: false
  default_balance: "1000"
timeouts:
  call_ms: 250
failure_artifacts_dir: "./artifacts"
"#,
        )
        .unwrap();

        assert!(!config.chain.auto_mine);
        assert_eq!(config.chain.default_balance, U256::from(1000u64));
        assert_eq!(config.chain.gas_price, 1);
        assert_eq!(config.timeouts.call_ms, 250);
        assert_eq!(config.timeouts.confirmation_ms, 30_000);
        assert_eq!(
            config.failure_artifacts_dir,
            Some(PathBuf::from("./artifacts"))
        );
        assert!(config.artifacts_dir.is_none());
    }

    #[test]
    fn test_invalid_timeouts_rejected() {
        let err = HarnessConfig::from_yaml_str("timeouts:\n  confirmation_ms: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = HarnessConfig::from_yaml_str(
            "timeouts:\n  confirmation_ms: 100\n  poll_interval_ms: 100\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_default_gas_above_block_limit_rejected() {
        let err = HarnessConfig::from_yaml_str(
            "chain:\n  block_gas_limit: 100000\n  default_gas: 200000\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("exceeds block gas limit"));
    }

    #[test]
    fn test_malformed_balance_rejected() {
        let err = HarnessConfig::from_yaml_str("chain:\n  default_balance: \"lots\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_env_overrides() {
        // Only this test touches these variables
        std::env::set_var(ENV_AUTO_MINE, "false");
        std::env::set_var(ENV_CONFIRMATION_MS, "1500");
        let mut config = HarnessConfig::default();
        config.apply_env_overrides().unwrap();
        assert!(!config.chain.auto_mine);
        assert_eq!(config.timeouts.confirmation_ms, 1500);

        std::env::set_var(ENV_AUTO_MINE, "sometimes");
        let err = HarnessConfig::default().apply_env_overrides().unwrap_err();
        assert!(matches!(err, ConfigError::Env { var: ENV_AUTO_MINE, .. }));

        std::env::remove_var(ENV_AUTO_MINE);
        std::env::remove_var(ENV_CONFIRMATION_MS);
    }

    #[test]
    fn test_load_missing_file() {
        let err = HarnessConfig::load("/nonexistent/harness.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("harness.yaml");
        std::fs::write(&path, "chain:\n  funded_accounts: 2\n").unwrap();

        let config = HarnessConfig::load(&path).unwrap();
        assert_eq!(config.chain.funded_accounts, 2);
    }
}
