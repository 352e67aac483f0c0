//! Experience token (XP) contract view.
//!
//! ERC-20 + AccessControl surface: XP awards per activity, custom awards,
//! reward-rate administration. Write calls are produced as raw calldata
//! for the submission pipeline; reads go through typed `#[sol(rpc)]`
//! instances.

use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::providers::ProviderBuilder;
use alloy::rpc::types::Log;
use alloy::sol;
use alloy::sol_types::{SolCall, SolEvent};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use super::{ContractHandle, DecodedEvent};
use crate::provider::ProviderManager;

sol! {
    /// Experience token interface (normative stub; on-disk artifacts are
    /// validated against this method set).
    #[sol(rpc)]
    interface IExperienceToken {
        function awardXP(address to, uint8 activityType) external;
        function awardCustomXP(address to, uint256 amount, uint8 activityType) external;
        function updateRewardRate(uint8 activityType, uint256 newRate) external;
        function balanceOf(address account) external view returns (uint256);
        function hasRole(bytes32 role, address account) external view returns (bool);
        function grantRole(bytes32 role, address account) external;

        event XPAwarded(address indexed user, uint256 amount, uint8 activityType);
        event RewardRateUpdated(uint8 activityType, uint256 newRate);
        event RoleGranted(bytes32 indexed role, address indexed account, address indexed sender);
        event Transfer(address indexed from, address indexed to, uint256 value);
    }
}

/// Typed view over the deployed experience token.
pub struct XpContract {
    provider: ProviderManager,
    address: Address,
}

impl XpContract {
    pub fn new(provider: ProviderManager, address: Address) -> Self {
        Self { provider, address }
    }

    /// Calldata for `awardXP(to, activityType)`.
    pub fn award_xp_call(&self, to: Address, activity: u8) -> Bytes {
        IExperienceToken::awardXPCall {
            to,
            activityType: activity,
        }
        .abi_encode()
        .into()
    }

    /// Calldata for `awardCustomXP(to, amount, activityType)`.
    pub fn award_custom_xp_call(&self, to: Address, amount: U256, activity: u8) -> Bytes {
        IExperienceToken::awardCustomXPCall {
            to,
            amount,
            activityType: activity,
        }
        .abi_encode()
        .into()
    }

    /// Calldata for `updateRewardRate(activityType, newRate)`.
    pub fn update_reward_rate_call(&self, activity: u8, new_rate: U256) -> Bytes {
        IExperienceToken::updateRewardRateCall {
            activityType: activity,
            newRate: new_rate,
        }
        .abi_encode()
        .into()
    }

    /// Calldata for `grantRole(role, account)`.
    pub fn grant_role_call(&self, role: B256, account: Address) -> Bytes {
        IExperienceToken::grantRoleCall { role, account }
            .abi_encode()
            .into()
    }

    /// Current XP balance of `account`.
    pub async fn balance_of(&self, account: Address) -> Result<U256> {
        let provider = ProviderBuilder::new().on_http(self.provider.rpc_url().parse()?);
        let contract = IExperienceToken::new(self.address, &provider);
        let balance = contract.balanceOf(account).call().await?;
        Ok(balance._0)
    }
}

#[async_trait]
impl ContractHandle for XpContract {
    fn name(&self) -> &'static str {
        "ASLExperienceToken"
    }

    fn address(&self) -> Address {
        self.address
    }

    async fn has_role(&self, role: B256, account: Address) -> Result<bool> {
        let provider = ProviderBuilder::new().on_http(self.provider.rpc_url().parse()?);
        let contract = IExperienceToken::new(self.address, &provider);
        let held = contract.hasRole(role, account).call().await?;
        Ok(held._0)
    }

    fn decode_log(&self, log: &Log) -> Option<DecodedEvent> {
        if let Ok(decoded) = IExperienceToken::XPAwarded::decode_log(&log.inner, true) {
            let mut args = serde_json::Map::new();
            args.insert("user".into(), Value::String(decoded.data.user.to_string()));
            args.insert("amount".into(), Value::String(decoded.data.amount.to_string()));
            args.insert(
                "activityType".into(),
                Value::String(decoded.data.activityType.to_string()),
            );
            return Some(DecodedEvent {
                event: "XPAwarded".into(),
                args,
            });
        }

        if let Ok(decoded) = IExperienceToken::RewardRateUpdated::decode_log(&log.inner, true) {
            let mut args = serde_json::Map::new();
            args.insert(
                "activityType".into(),
                Value::String(decoded.data.activityType.to_string()),
            );
            args.insert("newRate".into(), Value::String(decoded.data.newRate.to_string()));
            return Some(DecodedEvent {
                event: "RewardRateUpdated".into(),
                args,
            });
        }

        if let Ok(decoded) = IExperienceToken::RoleGranted::decode_log(&log.inner, true) {
            let mut args = serde_json::Map::new();
            args.insert("role".into(), Value::String(decoded.data.role.to_string()));
            args.insert("account".into(), Value::String(decoded.data.account.to_string()));
            args.insert("sender".into(), Value::String(decoded.data.sender.to_string()));
            return Some(DecodedEvent {
                event: "RoleGranted".into(),
                args,
            });
        }

        if let Ok(decoded) = IExperienceToken::Transfer::decode_log(&log.inner, true) {
            let mut args = serde_json::Map::new();
            args.insert("from".into(), Value::String(decoded.data.from.to_string()));
            args.insert("to".into(), Value::String(decoded.data.to.to_string()));
            args.insert("value".into(), Value::String(decoded.data.value.to_string()));
            return Some(DecodedEvent {
                event: "Transfer".into(),
                args,
            });
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::keccak256;

    fn contract() -> XpContract {
        XpContract::new(
            ProviderManager::offline("http://localhost:8545", 314159),
            Address::repeat_byte(0x11),
        )
    }

    #[test]
    fn test_call_selectors() {
        assert_eq!(
            IExperienceToken::awardXPCall::SELECTOR.as_slice(),
            &keccak256("awardXP(address,uint8)")[..4]
        );
        assert_eq!(
            IExperienceToken::awardCustomXPCall::SELECTOR.as_slice(),
            &keccak256("awardCustomXP(address,uint256,uint8)")[..4]
        );
        assert_eq!(
            IExperienceToken::updateRewardRateCall::SELECTOR.as_slice(),
            &keccak256("updateRewardRate(uint8,uint256)")[..4]
        );
    }

    #[test]
    fn test_award_xp_calldata() {
        let recipient = Address::repeat_byte(0xa1);
        let calldata = contract().award_xp_call(recipient, 1);

        assert_eq!(&calldata[..4], IExperienceToken::awardXPCall::SELECTOR);
        let decoded = IExperienceToken::awardXPCall::abi_decode(&calldata, true).unwrap();
        assert_eq!(decoded.to, recipient);
        assert_eq!(decoded.activityType, 1);
    }

    #[test]
    fn test_decode_xp_awarded_log() {
        let xp = contract();
        let event = IExperienceToken::XPAwarded {
            user: Address::repeat_byte(0xa1),
            amount: U256::from(50),
            activityType: 2,
        };
        let log = Log {
            inner: alloy::primitives::Log {
                address: xp.address(),
                data: event.encode_log_data(),
            },
            ..Default::default()
        };

        let decoded = xp.decode_log(&log).unwrap();
        assert_eq!(decoded.event, "XPAwarded");
        assert_eq!(decoded.args["amount"], Value::String("50".into()));
        assert_eq!(decoded.args["activityType"], Value::String("2".into()));
    }

    #[test]
    fn test_unknown_log_is_dropped() {
        let xp = contract();
        let log = Log {
            inner: alloy::primitives::Log {
                address: xp.address(),
                data: alloy::primitives::LogData::new_unchecked(
                    vec![keccak256("SomethingElse(uint256)")],
                    Bytes::new(),
                ),
            },
            ..Default::default()
        };

        assert!(xp.decode_log(&log).is_none());
    }
}
