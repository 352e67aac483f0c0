//! Typed views over the reward contract family.
//!
//! Two contracts make up the external surface: the experience token
//! (ERC-20 + AccessControl, XP awards) and the achievement token
//! (ERC-721, tiered badges). Their callable method sets are a fixed
//! external interface; the `sol!` bindings here are the normative stub
//! that on-disk ABI artifacts are validated against (see [`artifact`]).
//!
//! # Example
//!
//! ```rust,ignore
//! use rewarder_chain::contracts::{roles, XpContract};
//!
//! let xp = XpContract::new(provider, address);
//! let is_minter = xp.has_role(roles::MINTER_ROLE, signer).await?;
//! let calldata = xp.award_xp_call(recipient, activity as u8);
//! ```

pub mod achievement;
pub mod artifact;
pub mod experience;

pub use achievement::{AchievementContract, AchievementView};
pub use artifact::AbiArtifact;
pub use experience::XpContract;

use alloy::primitives::{Address, B256};
use alloy::rpc::types::Log;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A receipt log decoded against a contract's known event set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedEvent {
    /// Event name (e.g. `XPAwarded`).
    pub event: String,
    /// Event arguments, stringified, keyed by field name.
    pub args: serde_json::Map<String, serde_json::Value>,
}

/// Shared surface of both reward contracts: identity, the AccessControl
/// role check used for preconditions, and receipt-log decoding.
#[async_trait]
pub trait ContractHandle: Send + Sync {
    /// Contract family name, used in logs and ledger records.
    fn name(&self) -> &'static str;

    /// Deployed contract address.
    fn address(&self) -> Address;

    /// Whether `account` holds `role` on this contract.
    async fn has_role(&self, role: B256, account: Address) -> Result<bool>;

    /// Decode one receipt log against the contract's known events.
    /// Returns `None` for logs that match no known event.
    fn decode_log(&self, log: &Log) -> Option<DecodedEvent>;
}

/// Capability identifiers of the contracts' access-control model.
///
/// Passed to the contracts as raw 32-byte values, never as hex strings.
pub mod roles {
    use alloy::primitives::B256;

    /// keccak256("MINTER_ROLE")
    pub const MINTER_ROLE: B256 = B256::new([
        0x9f, 0x2d, 0xf0, 0xfe, 0xd2, 0xc7, 0x76, 0x48, 0xde, 0x58, 0x60, 0xa4, 0xcc, 0x50, 0x8c,
        0xd0, 0x81, 0x8c, 0x85, 0xb8, 0xb8, 0xa1, 0xab, 0x4c, 0xee, 0xef, 0x8d, 0x98, 0x1c, 0x89,
        0x56, 0xa6,
    ]);

    /// AccessControl's default admin role: 32 zero bytes.
    pub const DEFAULT_ADMIN_ROLE: B256 = B256::ZERO;
}

/// Event signature constants shared across the family.
pub mod event_signatures {
    use alloy::primitives::B256;

    /// keccak256("Transfer(address,address,uint256)"), identical for the
    /// ERC-20 and ERC-721 `Transfer` events; they differ only in how many
    /// topics are indexed (ERC-721 indexes the token id as topic 3).
    pub const TRANSFER: B256 = B256::new([
        0xdd, 0xf2, 0x52, 0xad, 0x1b, 0xe2, 0xc8, 0x9b, 0x69, 0xc2, 0xb0, 0x68, 0xfc, 0x37, 0x8d,
        0xaa, 0x95, 0x2b, 0xa7, 0xf1, 0x63, 0xc4, 0xa1, 0x16, 0x28, 0xf5, 0x5a, 0x4d, 0xf5, 0x23,
        0xb3, 0xef,
    ]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::keccak256;

    #[test]
    fn test_role_constants() {
        assert_eq!(roles::MINTER_ROLE, keccak256("MINTER_ROLE"));
        assert_eq!(roles::DEFAULT_ADMIN_ROLE, B256::ZERO);
    }

    #[test]
    fn test_transfer_signature() {
        assert_eq!(
            event_signatures::TRANSFER,
            keccak256("Transfer(address,address,uint256)")
        );
    }
}
