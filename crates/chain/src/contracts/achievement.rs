//! Achievement token (ERC-721) contract view.
//!
//! Tiered badge NFTs minted against cumulative XP. Besides calldata for
//! the write surface, this module owns the ERC-721 `Transfer` token-id
//! extraction used to report freshly minted ids.

use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::providers::ProviderBuilder;
use alloy::rpc::types::Log;
use alloy::sol;
use alloy::sol_types::{SolCall, SolEvent};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{event_signatures, ContractHandle, DecodedEvent};
use crate::provider::ProviderManager;

sol! {
    /// On-chain achievement record.
    #[derive(Debug)]
    struct Achievement {
        uint8 achievementType;
        string ipfsHash;
        uint256 timestamp;
        string description;
    }

    /// Achievement token interface (normative stub; on-disk artifacts are
    /// validated against this method set).
    #[sol(rpc)]
    interface IAchievementToken {
        function mintAchievement(address to, uint8 achievementType, string ipfsHash, string description) external returns (uint256);
        function updateMetadata(uint256 tokenId, string newIpfsHash) external;
        function getUserAchievements(address user) external view returns (uint256[] memory);
        function getAchievement(uint256 tokenId) external view returns (Achievement memory);
        function hasRole(bytes32 role, address account) external view returns (bool);
        function grantRole(bytes32 role, address account) external;

        event AchievementMinted(address indexed user, uint256 indexed tokenId, uint8 achievementType);
        event MetadataUpdated(uint256 indexed tokenId, string newIpfsHash);
        event Transfer(address indexed from, address indexed to, uint256 indexed tokenId);
    }
}

/// Decoded `getAchievement` view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AchievementView {
    pub achievement_type: u8,
    pub ipfs_hash: String,
    pub timestamp: u64,
    pub description: String,
}

/// Typed view over the deployed achievement token.
pub struct AchievementContract {
    provider: ProviderManager,
    address: Address,
}

impl AchievementContract {
    pub fn new(provider: ProviderManager, address: Address) -> Self {
        Self { provider, address }
    }

    /// Calldata for `mintAchievement(to, achievementType, ipfsHash, description)`.
    pub fn mint_achievement_call(
        &self,
        to: Address,
        tier: u8,
        ipfs_hash: &str,
        description: &str,
    ) -> Bytes {
        IAchievementToken::mintAchievementCall {
            to,
            achievementType: tier,
            ipfsHash: ipfs_hash.to_string(),
            description: description.to_string(),
        }
        .abi_encode()
        .into()
    }

    /// Calldata for `updateMetadata(tokenId, newIpfsHash)`.
    pub fn update_metadata_call(&self, token_id: U256, new_ipfs_hash: &str) -> Bytes {
        IAchievementToken::updateMetadataCall {
            tokenId: token_id,
            newIpfsHash: new_ipfs_hash.to_string(),
        }
        .abi_encode()
        .into()
    }

    /// Calldata for `grantRole(role, account)`.
    pub fn grant_role_call(&self, role: B256, account: Address) -> Bytes {
        IAchievementToken::grantRoleCall { role, account }
            .abi_encode()
            .into()
    }

    /// Token ids held by `user`.
    pub async fn user_achievements(&self, user: Address) -> Result<Vec<U256>> {
        let provider = ProviderBuilder::new().on_http(self.provider.rpc_url().parse()?);
        let contract = IAchievementToken::new(self.address, &provider);
        let ids = contract.getUserAchievements(user).call().await?;
        Ok(ids._0)
    }

    /// Details of one achievement token.
    pub async fn achievement(&self, token_id: U256) -> Result<AchievementView> {
        let provider = ProviderBuilder::new().on_http(self.provider.rpc_url().parse()?);
        let contract = IAchievementToken::new(self.address, &provider);
        let achievement = contract.getAchievement(token_id).call().await?._0;
        Ok(AchievementView {
            achievement_type: achievement.achievementType,
            ipfs_hash: achievement.ipfsHash,
            timestamp: achievement.timestamp.to::<u64>(),
            description: achievement.description,
        })
    }

    /// Pull the minted token id out of receipt logs: the ERC-721
    /// `Transfer` is the event with four topics, the fourth being the id.
    pub fn token_id_from_logs(logs: &[Log]) -> Option<U256> {
        logs.iter().find_map(|log| {
            let topics = log.inner.data.topics();
            if topics.len() == 4 && topics[0] == event_signatures::TRANSFER {
                Some(U256::from_be_bytes(topics[3].0))
            } else {
                None
            }
        })
    }

}

#[async_trait]
impl ContractHandle for AchievementContract {
    fn name(&self) -> &'static str {
        "AchievementToken"
    }

    fn address(&self) -> Address {
        self.address
    }

    async fn has_role(&self, role: B256, account: Address) -> Result<bool> {
        let provider = ProviderBuilder::new().on_http(self.provider.rpc_url().parse()?);
        let contract = IAchievementToken::new(self.address, &provider);
        let held = contract.hasRole(role, account).call().await?;
        Ok(held._0)
    }

    fn decode_log(&self, log: &Log) -> Option<DecodedEvent> {
        if let Ok(decoded) = IAchievementToken::AchievementMinted::decode_log(&log.inner, true) {
            let mut args = serde_json::Map::new();
            args.insert("user".into(), Value::String(decoded.data.user.to_string()));
            args.insert("tokenId".into(), Value::String(decoded.data.tokenId.to_string()));
            args.insert(
                "achievementType".into(),
                Value::String(decoded.data.achievementType.to_string()),
            );
            return Some(DecodedEvent {
                event: "AchievementMinted".into(),
                args,
            });
        }

        if let Ok(decoded) = IAchievementToken::MetadataUpdated::decode_log(&log.inner, true) {
            let mut args = serde_json::Map::new();
            args.insert("tokenId".into(), Value::String(decoded.data.tokenId.to_string()));
            args.insert(
                "newIpfsHash".into(),
                Value::String(decoded.data.newIpfsHash.to_string()),
            );
            return Some(DecodedEvent {
                event: "MetadataUpdated".into(),
                args,
            });
        }

        if let Ok(decoded) = IAchievementToken::Transfer::decode_log(&log.inner, true) {
            let mut args = serde_json::Map::new();
            args.insert("from".into(), Value::String(decoded.data.from.to_string()));
            args.insert("to".into(), Value::String(decoded.data.to.to_string()));
            args.insert("tokenId".into(), Value::String(decoded.data.tokenId.to_string()));
            return Some(DecodedEvent {
                event: "Transfer".into(),
                args,
            });
        }

        None
    }
}
