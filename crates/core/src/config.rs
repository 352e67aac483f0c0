//! Orchestrator configuration.
//!
//! Two layers: [`ChainSettings`] carries the env-driven deployment facts
//! (endpoint, key, contract addresses), [`TuningConfig`] carries the
//! operational knobs with profile support (default, testing, production)
//! and optional TOML file loading.

use alloy::primitives::Address;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable names.
pub mod env {
    pub const RPC_URL: &str = "RPC_URL";
    pub const PRIVATE_KEY: &str = "PRIVATE_KEY";
    pub const CHAIN_ID: &str = "CHAIN_ID";
    pub const XP_CONTRACT_ADDRESS: &str = "XP_CONTRACT_ADDRESS";
    pub const ACHIEVEMENT_CONTRACT_ADDRESS: &str = "ACHIEVEMENT_CONTRACT_ADDRESS";
    pub const ABI_DIR: &str = "ABI_DIR";
    pub const PROFILE: &str = "REWARDER_PROFILE";
}

/// Filecoin EVM testnet (Calibration).
const DEFAULT_CHAIN_ID: u64 = 314159;

/// Deployment facts loaded from the environment.
#[derive(Debug, Clone)]
pub struct ChainSettings {
    /// URL of the EVM node.
    pub rpc_url: String,
    /// Signer private key (hex, 0x prefix optional). Never logged.
    pub private_key: String,
    pub chain_id: u64,
    pub xp_contract: Address,
    pub achievement_contract: Address,
    /// Directory holding the contract ABI artifacts.
    pub abi_dir: PathBuf,
}

impl ChainSettings {
    /// Load from the environment. `RPC_URL`, `PRIVATE_KEY`, and both
    /// contract addresses are required; `CHAIN_ID` defaults to the
    /// Filecoin Calibration testnet and `ABI_DIR` to `./abi`.
    pub fn from_env() -> Result<Self> {
        let get = |name: &str| -> Result<String> {
            std::env::var(name).map_err(|_| anyhow::anyhow!("Missing env var: {}", name))
        };
        let get_address = |name: &str| -> Result<Address> {
            get(name)?
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid address for {}: {}", name, e))
        };

        let chain_id = match std::env::var(env::CHAIN_ID) {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("Invalid {}: {raw}", env::CHAIN_ID))?,
            Err(_) => DEFAULT_CHAIN_ID,
        };

        Ok(Self {
            rpc_url: get(env::RPC_URL)?,
            private_key: get(env::PRIVATE_KEY)?,
            chain_id,
            xp_contract: get_address(env::XP_CONTRACT_ADDRESS)?,
            achievement_contract: get_address(env::ACHIEVEMENT_CONTRACT_ADDRESS)?,
            abi_dir: std::env::var(env::ABI_DIR)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./abi")),
        })
    }
}

/// Operational tuning with profile support.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuningConfig {
    /// Profile name (for logging/identification).
    #[serde(default = "default_profile_name")]
    pub profile: String,

    /// RPC rate-limiter parameters.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Nonce cache parameters.
    #[serde(default)]
    pub nonce: NonceConfig,

    /// Submission pipeline parameters.
    #[serde(default)]
    pub submission: SubmissionConfig,

    /// Façade retry parameters.
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_profile_name() -> String {
    "default".to_string()
}

/// Token-bucket parameters for RPC egress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Bucket capacity (max burst size).
    #[serde(default = "default_max_tokens")]
    pub max_tokens: f64,

    /// Tokens refilled per second.
    #[serde(default = "default_refill_rate")]
    pub refill_rate: f64,

    /// Longest a caller may wait for tokens before `RateLimited`.
    #[serde(default = "default_max_wait_secs")]
    pub max_wait_secs: u64,

    /// Retries for RPC calls that still hit 429.
    #[serde(default = "default_send_retries")]
    pub send_retries: u32,

    /// Exponential backoff factor between 429 retries.
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
}

fn default_max_tokens() -> f64 {
    5.0
}
fn default_refill_rate() -> f64 {
    1.0
}
fn default_max_wait_secs() -> u64 {
    30
}
fn default_send_retries() -> u32 {
    3
}
fn default_backoff_factor() -> f64 {
    2.0
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            refill_rate: default_refill_rate(),
            max_wait_secs: default_max_wait_secs(),
            send_retries: default_send_retries(),
            backoff_factor: default_backoff_factor(),
        }
    }
}

/// Nonce serializer parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NonceConfig {
    /// Seconds a cached nonce is trusted before a chain refresh.
    #[serde(default = "default_nonce_ttl_secs")]
    pub cache_ttl_secs: u64,
}

fn default_nonce_ttl_secs() -> u64 {
    5
}

impl Default for NonceConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_nonce_ttl_secs(),
        }
    }
}

/// Submission pipeline parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionConfig {
    /// Gas limit used when estimation fails.
    #[serde(default = "default_fallback_gas_limit")]
    pub fallback_gas_limit: u64,

    /// Seconds to wait for a receipt before surfacing `ReceiptTimeout`.
    #[serde(default = "default_receipt_timeout_secs")]
    pub receipt_timeout_secs: u64,

    /// Seconds between receipt polls.
    #[serde(default = "default_receipt_poll_secs")]
    pub receipt_poll_secs: u64,
}

fn default_fallback_gas_limit() -> u64 {
    300_000
}
fn default_receipt_timeout_secs() -> u64 {
    120
}
fn default_receipt_poll_secs() -> u64 {
    2
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            fallback_gas_limit: default_fallback_gas_limit(),
            receipt_timeout_secs: default_receipt_timeout_secs(),
            receipt_poll_secs: default_receipt_poll_secs(),
        }
    }
}

/// Façade retry parameters (nonce / rate-limit recovery).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries beyond the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_max_retries() -> u32 {
    3
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
        }
    }
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            profile: default_profile_name(),
            rate_limit: RateLimitConfig::default(),
            nonce: NonceConfig::default(),
            submission: SubmissionConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl TuningConfig {
    /// Testing profile: impatient timeouts so suites fail fast.
    pub fn testing() -> Self {
        Self {
            profile: "testing".to_string(),
            rate_limit: RateLimitConfig {
                max_wait_secs: 1,
                ..Default::default()
            },
            submission: SubmissionConfig {
                receipt_timeout_secs: 10,
                receipt_poll_secs: 1,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Production profile: the shipped defaults, spelled out.
    pub fn production() -> Self {
        Self {
            profile: "production".to_string(),
            ..Default::default()
        }
    }

    /// Load a profile by name, or from a TOML file when the name is a
    /// path.
    pub fn load_profile(profile: &str) -> Result<Self> {
        match profile.to_lowercase().as_str() {
            "default" => Ok(Self::default()),
            "testing" | "test" => Ok(Self::testing()),
            "production" | "prod" => Ok(Self::production()),
            _ => {
                let raw = std::fs::read_to_string(profile)
                    .with_context(|| format!("Failed to read tuning profile {profile}"))?;
                toml::from_str(&raw)
                    .with_context(|| format!("Failed to parse tuning profile {profile}"))
            }
        }
    }

    /// Select a profile via `REWARDER_PROFILE` (falls back to default).
    pub fn from_env() -> Self {
        match std::env::var(env::PROFILE) {
            Ok(profile) => Self::load_profile(&profile).unwrap_or_else(|e| {
                tracing::warn!(error = %e, profile, "Failed to load tuning profile, using defaults");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Log the loaded configuration.
    pub fn log_config(&self) {
        tracing::info!(profile = %self.profile, "Tuning configuration loaded");
        tracing::info!(
            max_tokens = self.rate_limit.max_tokens,
            refill_rate = self.rate_limit.refill_rate,
            max_wait_secs = self.rate_limit.max_wait_secs,
            send_retries = self.rate_limit.send_retries,
            "Rate limiter"
        );
        tracing::info!(
            nonce_ttl_secs = self.nonce.cache_ttl_secs,
            fallback_gas_limit = self.submission.fallback_gas_limit,
            receipt_timeout_secs = self.submission.receipt_timeout_secs,
            max_retries = self.retry.max_retries,
            "Submission parameters"
        );
    }

    /// Receipt await window as a [`Duration`].
    pub fn receipt_timeout(&self) -> Duration {
        Duration::from_secs(self.submission.receipt_timeout_secs)
    }

    /// Receipt poll interval as a [`Duration`].
    pub fn receipt_poll_interval(&self) -> Duration {
        Duration::from_secs(self.submission.receipt_poll_secs)
    }

    /// Nonce cache TTL as a [`Duration`].
    pub fn nonce_ttl(&self) -> Duration {
        Duration::from_secs(self.nonce.cache_ttl_secs)
    }

    /// Acquire wait cap as a [`Duration`].
    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.rate_limit.max_wait_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TuningConfig::default();
        assert_eq!(config.rate_limit.max_tokens, 5.0);
        assert_eq!(config.rate_limit.refill_rate, 1.0);
        assert_eq!(config.rate_limit.max_wait_secs, 30);
        assert_eq!(config.nonce.cache_ttl_secs, 5);
        assert_eq!(config.submission.fallback_gas_limit, 300_000);
        assert_eq!(config.submission.receipt_timeout_secs, 120);
        assert_eq!(config.retry.max_retries, 3);
    }

    #[test]
    fn test_testing_profile() {
        let config = TuningConfig::testing();
        assert_eq!(config.profile, "testing");
        assert!(config.submission.receipt_timeout_secs < 120);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: TuningConfig = toml::from_str(
            r#"
            profile = "custom"

            [rate_limit]
            max_tokens = 10.0
            "#,
        )
        .unwrap();

        assert_eq!(config.profile, "custom");
        assert_eq!(config.rate_limit.max_tokens, 10.0);
        // Everything unspecified keeps its default.
        assert_eq!(config.rate_limit.refill_rate, 1.0);
        assert_eq!(config.submission.receipt_timeout_secs, 120);
    }

    #[test]
    fn test_named_profile_lookup() {
        assert_eq!(TuningConfig::load_profile("testing").unwrap().profile, "testing");
        assert_eq!(TuningConfig::load_profile("prod").unwrap().profile, "production");
        assert!(TuningConfig::load_profile("/no/such/file.toml").is_err());
    }
}
