//! Component wiring and the submit/status surface.
//!
//! [`RewardOrchestrator`] is what the HTTP layer consumes: it builds the
//! whole stack (provider, signer, rate limiter, ledger, pipeline, both
//! contract façades) from configuration and exposes the status read path
//! alongside the two reward services.

use std::sync::Arc;

use alloy::primitives::{Address, B256};
use anyhow::{bail, Result};
use rewarder_chain::contracts::artifact::{
    ACHIEVEMENT_ARTIFACT_FILE, ACHIEVEMENT_REQUIRED_FUNCTIONS, XP_ARTIFACT_FILE,
    XP_REQUIRED_FUNCTIONS,
};
use rewarder_chain::{
    roles, AbiArtifact, AchievementContract, ContractHandle, ProviderManager, RateLimiter, Signer,
    SubmissionPipeline, TransactionLedger, TxRecord, XpContract,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::achievements::AchievementRewardService;
use crate::config::{ChainSettings, TuningConfig};
use crate::xp::XpRewardService;

/// Signer capability snapshot per contract family. `None` means the
/// check itself failed.
#[derive(Debug, Clone, Serialize)]
pub struct SignerRoles {
    pub xp_minter: Option<bool>,
    pub xp_admin: Option<bool>,
    pub achievement_minter: Option<bool>,
    pub achievement_admin: Option<bool>,
}

/// Fully wired reward stack.
pub struct RewardOrchestrator {
    provider: ProviderManager,
    signer: Arc<Signer>,
    ledger: Arc<TransactionLedger>,
    xp_contract: Arc<XpContract>,
    achievement_contract: Arc<AchievementContract>,
    xp: XpRewardService,
    achievements: AchievementRewardService,
}

impl RewardOrchestrator {
    /// Build every component from configuration and verify the RPC
    /// connection. ABI artifacts are validated (warn-only) on the way.
    pub async fn initialize(settings: &ChainSettings, tuning: &TuningConfig) -> Result<Self> {
        let provider = ProviderManager::new(&settings.rpc_url, settings.chain_id).await?;

        let rate_limiter = Arc::new(
            RateLimiter::new(tuning.rate_limit.max_tokens, tuning.rate_limit.refill_rate)
                .with_max_wait(tuning.max_wait())
                .with_retry(
                    tuning.rate_limit.send_retries,
                    tuning.rate_limit.backoff_factor,
                ),
        );

        let signer = Arc::new(
            Signer::new(&settings.private_key, provider.clone())?
                .with_nonce_ttl(tuning.nonce_ttl()),
        );

        let ledger = Arc::new(TransactionLedger::new(provider.clone(), rate_limiter.clone()));

        let pipeline = Arc::new(
            SubmissionPipeline::new(
                provider.clone(),
                signer.clone(),
                rate_limiter,
                ledger.clone(),
            )
            .with_receipt_timeout(tuning.receipt_timeout(), tuning.receipt_poll_interval())
            .with_fallback_gas_limit(tuning.submission.fallback_gas_limit),
        );

        for (file, required) in [
            (XP_ARTIFACT_FILE, XP_REQUIRED_FUNCTIONS),
            (ACHIEVEMENT_ARTIFACT_FILE, ACHIEVEMENT_REQUIRED_FUNCTIONS),
        ] {
            let artifact = AbiArtifact::load(&settings.abi_dir, file, required);
            if artifact.using_fallback {
                warn!(file, "Using compiled-in contract interface");
            }
        }

        let xp_contract = Arc::new(XpContract::new(provider.clone(), settings.xp_contract));
        let achievement_contract = Arc::new(AchievementContract::new(
            provider.clone(),
            settings.achievement_contract,
        ));

        let xp = XpRewardService::new(
            pipeline.clone(),
            xp_contract.clone(),
            tuning.retry.max_retries,
        );
        let achievements = AchievementRewardService::new(
            pipeline,
            achievement_contract.clone(),
            tuning.retry.max_retries,
        );

        info!(
            signer = %signer.address(),
            xp_contract = %settings.xp_contract,
            achievement_contract = %settings.achievement_contract,
            "Reward orchestrator initialized"
        );

        Ok(Self {
            provider,
            signer,
            ledger,
            xp_contract,
            achievement_contract,
            xp,
            achievements,
        })
    }

    /// XP reward operations.
    pub fn xp(&self) -> &XpRewardService {
        &self.xp
    }

    /// Achievement reward operations.
    pub fn achievements(&self) -> &AchievementRewardService {
        &self.achievements
    }

    /// The shared transaction ledger.
    pub fn ledger(&self) -> &Arc<TransactionLedger> {
        &self.ledger
    }

    /// The underlying provider (deployment checks, health probes).
    pub fn provider(&self) -> &ProviderManager {
        &self.provider
    }

    /// The signer identity.
    pub fn signer(&self) -> &Arc<Signer> {
        &self.signer
    }

    /// Deployed contract addresses, XP first.
    pub fn contract_addresses(&self) -> [(&'static str, Address); 2] {
        [
            (self.xp_contract.name(), self.xp_contract.address()),
            (
                self.achievement_contract.name(),
                self.achievement_contract.address(),
            ),
        ]
    }

    /// Ledger view of one transaction hash (chain fallback included).
    pub async fn transaction_status(&self, hash: &str) -> Result<TxRecord> {
        let Ok(hash) = hash.parse::<B256>() else {
            bail!("Invalid transaction hash: {hash}");
        };
        Ok(self.ledger.get(hash).await)
    }

    /// Up to the 10 most recent records for an address, newest first.
    pub async fn address_transactions(&self, address: &str) -> Result<Vec<TxRecord>> {
        let Ok(address) = address.parse::<Address>() else {
            bail!("Invalid Ethereum address: {address}");
        };
        Ok(self.ledger.list_by_address(address))
    }

    /// Capability snapshot of the signer across both contract families.
    pub async fn signer_roles(&self) -> SignerRoles {
        let signer = self.signer.address();
        let check = |result: Result<bool>| match result {
            Ok(held) => Some(held),
            Err(e) => {
                warn!(error = %e, "Role check failed");
                None
            }
        };

        SignerRoles {
            xp_minter: check(self.xp_contract.has_role(roles::MINTER_ROLE, signer).await),
            xp_admin: check(
                self.xp_contract
                    .has_role(roles::DEFAULT_ADMIN_ROLE, signer)
                    .await,
            ),
            achievement_minter: check(
                self.achievement_contract
                    .has_role(roles::MINTER_ROLE, signer)
                    .await,
            ),
            achievement_admin: check(
                self.achievement_contract
                    .has_role(roles::DEFAULT_ADMIN_ROLE, signer)
                    .await,
            ),
        }
    }
}
