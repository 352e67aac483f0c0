//! Achievement reward façade.
//!
//! Mints tiered badge NFTs, updates their metadata, and exposes the read
//! surface (per-user token lists and per-token details). Confirmed mints
//! report the freshly assigned token id, pulled from the ERC-721
//! `Transfer` log in the receipt.

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use anyhow::{bail, Result};
use futures::stream::{self, StreamExt};
use rewarder_chain::{
    AchievementContract, AchievementView, ContractCall, ContractHandle, ErrorKind,
    SubmissionPipeline, SubmissionResult, TxState,
};
use serde_json::json;

use crate::response::RewardResponse;
use crate::retry::submit_with_retry;
use crate::tiers::AchievementTier;
use crate::xp::parse_address;

/// Concurrent detail fetches when listing a user's achievements.
const DETAIL_FETCH_CONCURRENCY: usize = 4;

/// Service for achievement token rewards.
pub struct AchievementRewardService {
    pipeline: Arc<SubmissionPipeline>,
    contract: Arc<AchievementContract>,
    max_retries: u32,
}

impl AchievementRewardService {
    pub fn new(
        pipeline: Arc<SubmissionPipeline>,
        contract: Arc<AchievementContract>,
        max_retries: u32,
    ) -> Self {
        Self {
            pipeline,
            contract,
            max_retries,
        }
    }

    /// Mint an achievement of the given tier.
    pub async fn mint_achievement(
        &self,
        address: &str,
        tier: AchievementTier,
        ipfs_hash: &str,
        description: &str,
    ) -> RewardResponse {
        let recipient = match parse_address(address) {
            Ok(recipient) => recipient,
            Err(response) => return *response,
        };

        let details = json!({
            "function": "mintAchievement",
            "achievement_type": tier.id(),
            "tier": tier.as_str(),
            "ipfs_hash": ipfs_hash,
            "address": recipient.to_string(),
        });

        let call = ContractCall::new(
            self.contract.clone() as Arc<dyn ContractHandle>,
            "mintAchievement",
            recipient,
            self.contract
                .mint_achievement_call(recipient, tier.id(), ipfs_hash, description),
        );
        let (result, retries) = submit_with_retry(&self.pipeline, call, self.max_retries).await;

        match result {
            SubmissionResult::Submitted {
                record,
                receipt_logs,
            } => {
                let confirmed = record.state == TxState::Confirmed;
                let mut response = RewardResponse::processing(&record)
                    .with_retries(retries)
                    .with_details(details);
                if confirmed {
                    response.token_id = AchievementContract::token_id_from_logs(&receipt_logs);
                }
                response
            }
            SubmissionResult::Rejected { kind, error } => RewardResponse::error(kind, error)
                .with_retries(retries)
                .with_details(details),
        }
    }

    /// Point a token's metadata at a new IPFS hash.
    pub async fn update_metadata(&self, token_id: U256, new_ipfs_hash: &str) -> RewardResponse {
        let details = json!({
            "function": "updateMetadata",
            "token_id": token_id.to_string(),
            "ipfs_hash": new_ipfs_hash,
        });

        // Metadata updates are tracked under the signer's own address.
        let signer = self.pipeline.signer().address();
        let call = ContractCall::new(
            self.contract.clone() as Arc<dyn ContractHandle>,
            "updateMetadata",
            signer,
            self.contract.update_metadata_call(token_id, new_ipfs_hash),
        );
        let (result, retries) = submit_with_retry(&self.pipeline, call, self.max_retries).await;

        match result {
            SubmissionResult::Submitted { record, .. } => RewardResponse::processing(&record)
                .with_retries(retries)
                .with_details(details),
            SubmissionResult::Rejected { kind, error } => RewardResponse::error(kind, error)
                .with_retries(retries)
                .with_details(details),
        }
    }

    /// Mint the highest tier the user's cumulative XP qualifies for.
    pub async fn award_achievement_by_xp(
        &self,
        address: &str,
        total_xp: u64,
        ipfs_hash: &str,
    ) -> RewardResponse {
        let Some(tier) = AchievementTier::for_xp(total_xp) else {
            return RewardResponse::error(
                ErrorKind::ValidationError,
                format!(
                    "Total XP {total_xp} is below the {} threshold ({})",
                    AchievementTier::Beginner,
                    AchievementTier::Beginner.xp_threshold()
                ),
            );
        };

        let description = format!("{} Level Achievement", tier.as_str());
        self.mint_achievement(address, tier, ipfs_hash, &description)
            .await
    }

    /// Token ids held by a user.
    pub async fn user_achievements(&self, address: &str) -> Result<Vec<U256>> {
        let Ok(user) = address.parse::<Address>() else {
            bail!("Invalid Ethereum address: {address}");
        };
        self.contract.user_achievements(user).await
    }

    /// Details of one achievement token.
    pub async fn achievement(&self, token_id: U256) -> Result<AchievementView> {
        self.contract.achievement(token_id).await
    }

    /// All of a user's achievements with details, fetched with bounded
    /// concurrency.
    pub async fn achievements_detailed(
        &self,
        address: &str,
    ) -> Result<Vec<(U256, AchievementView)>> {
        let token_ids = self.user_achievements(address).await?;

        let mut detailed: Vec<(U256, AchievementView)> = stream::iter(token_ids)
            .map(|token_id| async move {
                let view = self.contract.achievement(token_id).await?;
                Ok::<_, anyhow::Error>((token_id, view))
            })
            .buffer_unordered(DETAIL_FETCH_CONCURRENCY)
            .filter_map(|result| async move { result.ok() })
            .collect()
            .await;

        detailed.sort_by_key(|(token_id, _)| *token_id);
        Ok(detailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::ResponseStatus;
    use rewarder_chain::{ProviderManager, RateLimiter, Signer, TransactionLedger};

    fn service() -> AchievementRewardService {
        let provider = ProviderManager::offline("http://localhost:1", 314159);
        let signer = Arc::new(
            Signer::new(
                "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
                provider.clone(),
            )
            .unwrap(),
        );
        let rate_limiter = Arc::new(RateLimiter::default());
        let ledger = Arc::new(TransactionLedger::new(provider.clone(), rate_limiter.clone()));
        let pipeline = Arc::new(SubmissionPipeline::new(
            provider.clone(),
            signer,
            rate_limiter,
            ledger,
        ));
        let contract = Arc::new(AchievementContract::new(provider, Address::repeat_byte(0x22)));
        AchievementRewardService::new(pipeline, contract, 0)
    }

    #[tokio::test]
    async fn test_mint_rejects_malformed_address() {
        let response = service()
            .mint_achievement("bogus", AchievementTier::Beginner, "QmHash", "desc")
            .await;
        assert_eq!(response.status, ResponseStatus::Error);
        assert_eq!(response.error_kind, Some(ErrorKind::ValidationError));
    }

    #[tokio::test]
    async fn test_award_by_xp_below_beginner_threshold() {
        let response = service()
            .award_achievement_by_xp("0x00000000000000000000000000000000000000A1", 99, "QmHash")
            .await;
        assert_eq!(response.status, ResponseStatus::Error);
        assert_eq!(response.error_kind, Some(ErrorKind::ValidationError));
        assert!(response.tx_hash.is_none());
    }

    #[tokio::test]
    async fn test_user_achievements_rejects_malformed_address() {
        assert!(service().user_achievements("0xzz").await.is_err());
    }
}
