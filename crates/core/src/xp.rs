//! XP reward façade.
//!
//! Domain-level operations over the experience token: validate inputs,
//! check the signer's capability, submit through the pipeline with the
//! table-driven retry policy, and shape a uniform response. Balance
//! telemetry (`xp_awarded`) is best-effort and never fails an operation.

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use anyhow::{bail, Result};
use rewarder_chain::{
    roles, ContractCall, ContractHandle, ErrorKind, SubmissionPipeline, SubmissionResult,
    TxState, XpContract,
};
use serde_json::json;
use tracing::warn;

use crate::activity::ActivityType;
use crate::response::{RewardResponse, XpBalance};
use crate::retry::submit_with_retry;

/// Service for XP token rewards.
pub struct XpRewardService {
    pipeline: Arc<SubmissionPipeline>,
    contract: Arc<XpContract>,
    max_retries: u32,
}

/// Parse a caller-supplied address, mapping failure to the uniform
/// validation response.
pub(crate) fn parse_address(input: &str) -> Result<Address, Box<RewardResponse>> {
    input.parse().map_err(|_| {
        Box::new(RewardResponse::error(
            ErrorKind::ValidationError,
            format!("Invalid Ethereum address: {input}"),
        ))
    })
}

impl XpRewardService {
    pub fn new(pipeline: Arc<SubmissionPipeline>, contract: Arc<XpContract>, max_retries: u32) -> Self {
        Self {
            pipeline,
            contract,
            max_retries,
        }
    }

    fn signer_address(&self) -> Address {
        self.pipeline.signer().address()
    }

    /// Check the signer's minter capability. A definitive "no" blocks the
    /// operation; a failed check is logged and the submission proceeds
    /// (it will revert on-chain if the permission really is missing).
    async fn ensure_minter_role(&self) -> Option<RewardResponse> {
        match self
            .contract
            .has_role(roles::MINTER_ROLE, self.signer_address())
            .await
        {
            Ok(true) => None,
            Ok(false) => Some(RewardResponse::error(
                ErrorKind::PermissionError,
                "Signer does not have MINTER_ROLE required to award XP",
            )),
            Err(e) => {
                warn!(error = %e, "Minter role check failed, proceeding with submission");
                None
            }
        }
    }

    /// Award the contract-defined XP amount for one activity.
    pub async fn award_xp(&self, address: &str, activity: ActivityType) -> RewardResponse {
        let recipient = match parse_address(address) {
            Ok(recipient) => recipient,
            Err(response) => return *response,
        };

        let details = json!({
            "function": "awardXP",
            "activity_type": activity.id(),
            "activity_name": activity.as_str(),
            "address": recipient.to_string(),
        });

        if let Some(denied) = self.ensure_minter_role().await {
            return denied.with_details(details);
        }

        let balance_before = self.balance_quietly(recipient).await;

        let call = ContractCall::new(
            self.contract.clone() as Arc<dyn ContractHandle>,
            "awardXP",
            recipient,
            self.contract.award_xp_call(recipient, activity.id()),
        );
        let (result, retries) = submit_with_retry(&self.pipeline, call, self.max_retries).await;

        self.xp_response(result, retries, details, recipient, balance_before)
            .await
    }

    /// Award an explicit XP amount for one activity.
    pub async fn award_custom_xp(
        &self,
        address: &str,
        amount: U256,
        activity: ActivityType,
    ) -> RewardResponse {
        let recipient = match parse_address(address) {
            Ok(recipient) => recipient,
            Err(response) => return *response,
        };

        if amount.is_zero() {
            return RewardResponse::error(
                ErrorKind::ValidationError,
                "Amount must be positive, got 0",
            );
        }

        let details = json!({
            "function": "awardCustomXP",
            "amount": amount.to_string(),
            "activity_type": activity.id(),
            "activity_name": activity.as_str(),
            "address": recipient.to_string(),
        });

        if let Some(denied) = self.ensure_minter_role().await {
            return denied.with_details(details);
        }

        let balance_before = self.balance_quietly(recipient).await;

        let call = ContractCall::new(
            self.contract.clone() as Arc<dyn ContractHandle>,
            "awardCustomXP",
            recipient,
            self.contract
                .award_custom_xp_call(recipient, amount, activity.id()),
        );
        let (result, retries) = submit_with_retry(&self.pipeline, call, self.max_retries).await;

        self.xp_response(result, retries, details, recipient, balance_before)
            .await
    }

    /// Update the XP amount awarded per activity (admin).
    pub async fn update_reward_rate(&self, activity: ActivityType, new_rate: U256) -> RewardResponse {
        if new_rate.is_zero() {
            return RewardResponse::error(
                ErrorKind::ValidationError,
                "New rate must be positive, got 0",
            );
        }

        let details = json!({
            "function": "updateRewardRate",
            "activity_type": activity.id(),
            "activity_name": activity.as_str(),
            "new_rate": new_rate.to_string(),
        });

        match self
            .contract
            .has_role(roles::DEFAULT_ADMIN_ROLE, self.signer_address())
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                return RewardResponse::error(
                    ErrorKind::PermissionError,
                    "Signer does not have DEFAULT_ADMIN_ROLE required to update reward rates",
                )
                .with_details(details)
            }
            Err(e) => {
                warn!(error = %e, "Admin role check failed, proceeding with submission");
            }
        }

        // Admin calls are tracked under the signer's own address.
        let call = ContractCall::new(
            self.contract.clone() as Arc<dyn ContractHandle>,
            "updateRewardRate",
            self.signer_address(),
            self.contract.update_reward_rate_call(activity.id(), new_rate),
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

    /// Grant `MINTER_ROLE` to an address (admin). Short-circuits to
    /// success when the address already holds it.
    pub async fn grant_minter_role(&self, address: &str) -> RewardResponse {
        let grantee = match parse_address(address) {
            Ok(grantee) => grantee,
            Err(response) => return *response,
        };

        let details = json!({
            "function": "grantRole",
            "role": "MINTER_ROLE",
            "address": grantee.to_string(),
        });

        match self
            .contract
            .has_role(roles::DEFAULT_ADMIN_ROLE, self.signer_address())
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                return RewardResponse::error(
                    ErrorKind::PermissionError,
                    "Signer does not have DEFAULT_ADMIN_ROLE required to grant roles",
                )
                .with_details(details)
            }
            Err(e) => {
                let message = format!("{e:#}");
                return RewardResponse::error(rewarder_chain::classify(&message), message)
                    .with_details(details);
            }
        }

        match self.contract.has_role(roles::MINTER_ROLE, grantee).await {
            Ok(true) => {
                return RewardResponse::success(format!("Address {grantee} already has MINTER_ROLE"))
                    .with_details(details)
            }
            Ok(false) => {}
            Err(e) => {
                warn!(error = %e, "Grantee role check failed, proceeding with submission");
            }
        }

        let call = ContractCall::new(
            self.contract.clone() as Arc<dyn ContractHandle>,
            "grantRole",
            grantee,
            self.contract.grant_role_call(roles::MINTER_ROLE, grantee),
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

    /// Current XP balance of an address.
    pub async fn xp_balance(&self, address: &str) -> Result<XpBalance> {
        let Ok(account) = address.parse::<Address>() else {
            bail!("Invalid Ethereum address: {address}");
        };
        let balance = self.contract.balance_of(account).await?;
        Ok(XpBalance { address: account, balance })
    }

    async fn balance_quietly(&self, account: Address) -> Option<U256> {
        match self.contract.balance_of(account).await {
            Ok(balance) => Some(balance),
            Err(e) => {
                warn!(address = %account, error = %e, "Could not read XP balance");
                None
            }
        }
    }

    async fn xp_response(
        &self,
        result: SubmissionResult,
        retries: u32,
        details: serde_json::Value,
        recipient: Address,
        balance_before: Option<U256>,
    ) -> RewardResponse {
        match result {
            SubmissionResult::Submitted { record, .. } => {
                let confirmed = record.state == TxState::Confirmed;
                let mut response = RewardResponse::processing(&record)
                    .with_retries(retries)
                    .with_details(details);

                if confirmed {
                    if let Some(after) = self.balance_quietly(recipient).await {
                        response.balance_after = Some(after);
                        response.xp_awarded =
                            balance_before.and_then(|before| after.checked_sub(before));
                    }
                }
                response
            }
            SubmissionResult::Rejected { kind, error } => RewardResponse::error(kind, error)
                .with_retries(retries)
                .with_details(details),
        }
    }
}
