//! Fee selection: EIP-1559 detection with legacy fallback.
//!
//! The oracle inspects the latest block per submission. A base-fee field
//! means the chain speaks EIP-1559 and fees are computed from it; anything
//! else falls back to the node's suggested legacy gas price. The 2x
//! base-fee headroom tolerates one full base-fee doubling per block (the
//! maximum per-block escalation) without re-pricing.

use std::sync::Arc;

use alloy::network::TransactionBuilder;
use alloy::rpc::types::{Block, TransactionRequest};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::provider::ProviderManager;
use crate::rate_limit::RateLimiter;

/// Priority fee (tip) attached to every EIP-1559 submission: 1 gwei.
const PRIORITY_FEE_WEI: u128 = 1_000_000_000;

/// Fee parameters selected for one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeeProfile {
    /// Legacy gas pricing (pre-EIP-1559).
    Legacy {
        /// Gas price in wei.
        gas_price: u128,
    },
    /// EIP-1559 gas pricing.
    Eip1559 {
        /// Maximum fee per gas in wei.
        max_fee_per_gas: u128,
        /// Maximum priority fee per gas in wei.
        max_priority_fee_per_gas: u128,
        /// Base fee of the block the profile was computed from.
        base_fee: u128,
    },
}

impl FeeProfile {
    /// Build an EIP-1559 profile from a block base fee:
    /// `max_fee = 2 * base_fee + priority`, `priority = 1 gwei`.
    pub fn eip1559_from_base_fee(base_fee: u128) -> Self {
        Self::Eip1559 {
            max_fee_per_gas: base_fee * 2 + PRIORITY_FEE_WEI,
            max_priority_fee_per_gas: PRIORITY_FEE_WEI,
            base_fee,
        }
    }

    /// Apply the profile to a transaction request.
    pub fn apply_to(&self, tx: &mut TransactionRequest) {
        match self {
            Self::Legacy { gas_price } => {
                tx.set_gas_price(*gas_price);
            }
            Self::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
                ..
            } => {
                tx.set_max_fee_per_gas(*max_fee_per_gas);
                tx.set_max_priority_fee_per_gas(*max_priority_fee_per_gas);
            }
        }
    }

    /// Worst-case per-gas cost, for balance estimates and telemetry.
    pub fn effective_gas_price(&self) -> u128 {
        match self {
            Self::Legacy { gas_price } => *gas_price,
            Self::Eip1559 {
                max_fee_per_gas, ..
            } => *max_fee_per_gas,
        }
    }
}

/// Computes a [`FeeProfile`] per submission from live chain state.
pub struct FeeOracle {
    provider: ProviderManager,
    rate_limiter: Arc<RateLimiter>,
}

impl FeeOracle {
    pub fn new(provider: ProviderManager, rate_limiter: Arc<RateLimiter>) -> Self {
        Self {
            provider,
            rate_limiter,
        }
    }

    /// Derive the profile from an already-fetched block, if it carries a
    /// base fee. `None` means the chain wants legacy pricing.
    pub fn profile_for_block(&self, block: &Block) -> Option<FeeProfile> {
        block
            .header
            .base_fee_per_gas
            .map(|base_fee| FeeProfile::eip1559_from_base_fee(base_fee as u128))
    }

    /// Compute fee parameters for the next submission.
    ///
    /// Errors while reading the latest block degrade to legacy pricing;
    /// only a failed `eth_gasPrice` is terminal.
    pub async fn current(&self) -> Result<FeeProfile> {
        match self
            .rate_limiter
            .execute("get_latest_block", || self.provider.latest_block())
            .await
        {
            Ok(block) => {
                if let Some(profile) = self.profile_for_block(&block) {
                    if let FeeProfile::Eip1559 {
                        max_fee_per_gas,
                        max_priority_fee_per_gas,
                        base_fee,
                    } = profile
                    {
                        debug!(
                            base_fee_gwei = base_fee / 1_000_000_000,
                            priority_fee_gwei = max_priority_fee_per_gas / 1_000_000_000,
                            max_fee_gwei = max_fee_per_gas / 1_000_000_000,
                            "EIP-1559 fees calculated"
                        );
                    }
                    return Ok(profile);
                }
                debug!("Chain does not expose a base fee, using legacy pricing");
            }
            Err(e) => {
                warn!(error = %e, "Failed to read latest block, falling back to legacy pricing");
            }
        }

        let gas_price = self
            .rate_limiter
            .execute("gas_price", || self.provider.gas_price())
            .await?;
        Ok(FeeProfile::Legacy { gas_price })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GWEI: u128 = 1_000_000_000;

    #[test]
    fn test_eip1559_math() {
        // base 10 gwei -> max 21 gwei, priority 1 gwei.
        let profile = FeeProfile::eip1559_from_base_fee(10 * GWEI);
        match profile {
            FeeProfile::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
                base_fee,
            } => {
                assert_eq!(max_fee_per_gas, 21 * GWEI);
                assert_eq!(max_priority_fee_per_gas, GWEI);
                assert_eq!(base_fee, 10 * GWEI);
                assert_eq!(max_fee_per_gas, 2 * base_fee + max_priority_fee_per_gas);
            }
            _ => panic!("expected EIP-1559 profile"),
        }
    }

    #[test]
    fn test_apply_eip1559() {
        let profile = FeeProfile::eip1559_from_base_fee(10 * GWEI);
        let mut tx = TransactionRequest::default();
        profile.apply_to(&mut tx);

        assert_eq!(tx.max_fee_per_gas, Some(21 * GWEI));
        assert_eq!(tx.max_priority_fee_per_gas, Some(GWEI));
        assert!(tx.gas_price.is_none());
    }

    #[test]
    fn test_apply_legacy() {
        let profile = FeeProfile::Legacy {
            gas_price: 3 * GWEI,
        };
        let mut tx = TransactionRequest::default();
        profile.apply_to(&mut tx);

        assert_eq!(tx.gas_price, Some(3 * GWEI));
        assert!(tx.max_fee_per_gas.is_none());
    }

    #[test]
    fn test_effective_gas_price() {
        assert_eq!(
            FeeProfile::Legacy { gas_price: GWEI }.effective_gas_price(),
            GWEI
        );
        assert_eq!(
            FeeProfile::eip1559_from_base_fee(10 * GWEI).effective_gas_price(),
            21 * GWEI
        );
    }

    #[test]
    fn test_profile_serialization() {
        let profile = FeeProfile::eip1559_from_base_fee(10 * GWEI);
        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json["type"], "eip1559");
        assert_eq!(json["max_priority_fee_per_gas"].as_u64(), Some(1_000_000_000));
    }
}
