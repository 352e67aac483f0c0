//! The submission pipeline: typed contract call in, terminal ledger
//! record (or a classified rejection) out.
//!
//! Five stages per submission: estimate gas, build, simulate, sign+send,
//! await receipt. Each stage's failure maps to one `ErrorKind`; nothing
//! propagates unclassified. The per-signer submission lock is held from
//! the nonce handoff through `eth_sendRawTransaction`, so one signer has
//! at most one transaction in the build-and-send window; receipt waiting
//! runs outside the lock.

use std::sync::Arc;
use std::time::Duration;

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::rpc::types::{TransactionReceipt, TransactionRequest};
use tracing::{debug, info, warn};

use crate::contracts::ContractHandle;
use crate::error::{classify, extract_tx_hash, revert_reason, ErrorKind};
use crate::fees::FeeOracle;
use crate::ledger::{TransactionLedger, TxRecord};
use crate::provider::ProviderManager;
use crate::rate_limit::RateLimiter;
use crate::signer::Signer;

/// Conservative gas limit when estimation fails.
const FALLBACK_GAS_LIMIT: u64 = 300_000;
/// How long to wait for a receipt before surfacing `ReceiptTimeout`.
const RECEIPT_TIMEOUT: Duration = Duration::from_secs(120);
/// Poll interval while waiting for a receipt.
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// A typed contract call ready for submission.
#[derive(Clone)]
pub struct ContractCall {
    /// Contract the call targets; also decodes the receipt logs.
    pub contract: Arc<dyn ContractHandle>,
    /// Symbolic method name for the ledger (e.g. `awardXP`).
    pub function: &'static str,
    /// Logical subject address for the ledger index.
    pub subject: Address,
    /// ABI-encoded calldata.
    pub calldata: Bytes,
}

impl ContractCall {
    pub fn new(
        contract: Arc<dyn ContractHandle>,
        function: &'static str,
        subject: Address,
        calldata: Bytes,
    ) -> Self {
        Self {
            contract,
            function,
            subject,
            calldata,
        }
    }
}

/// Outcome of one trip through the pipeline.
#[derive(Debug)]
pub enum SubmissionResult {
    /// A transaction hash exists; the record is in the ledger and is
    /// `Confirmed`, `Failed`, or still `Pending` (receipt timeout). Raw
    /// receipt logs are surfaced for family-specific post-processing
    /// (e.g. minted token-id extraction).
    Submitted {
        record: TxRecord,
        receipt_logs: Vec<alloy::rpc::types::Log>,
    },
    /// The submission never produced a hash.
    Rejected { kind: ErrorKind, error: String },
}

impl SubmissionResult {
    fn rejected(kind: ErrorKind, error: impl Into<String>) -> Self {
        Self::Rejected {
            kind,
            error: error.into(),
        }
    }

    /// The classified error, if any.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Submitted { record, .. } => record.error_kind,
            Self::Rejected { kind, .. } => Some(*kind),
        }
    }
}

/// Gas limit with the standard headroom: `ceil(1.2 * estimate)`.
fn padded_gas_limit(estimate: u64) -> u64 {
    estimate.saturating_mul(6).div_ceil(5)
}

/// Classify a failed receipt: near-exhausted gas reads as out-of-gas.
fn failed_receipt_kind(gas_used: u64, gas_limit: u64) -> ErrorKind {
    if (gas_used as u128) * 100 >= (gas_limit as u128) * 95 {
        ErrorKind::OutOfGasOrRevert
    } else {
        ErrorKind::ContractRevert
    }
}

/// Executes contract calls as signed transactions against the chain.
pub struct SubmissionPipeline {
    provider: ProviderManager,
    signer: Arc<Signer>,
    rate_limiter: Arc<RateLimiter>,
    fee_oracle: FeeOracle,
    ledger: Arc<TransactionLedger>,
    fallback_gas_limit: u64,
    receipt_timeout: Duration,
    receipt_poll_interval: Duration,
}

impl SubmissionPipeline {
    pub fn new(
        provider: ProviderManager,
        signer: Arc<Signer>,
        rate_limiter: Arc<RateLimiter>,
        ledger: Arc<TransactionLedger>,
    ) -> Self {
        let fee_oracle = FeeOracle::new(provider.clone(), rate_limiter.clone());
        Self {
            provider,
            signer,
            rate_limiter,
            fee_oracle,
            ledger,
            fallback_gas_limit: FALLBACK_GAS_LIMIT,
            receipt_timeout: RECEIPT_TIMEOUT,
            receipt_poll_interval: RECEIPT_POLL_INTERVAL,
        }
    }

    /// Override the receipt await window (tests, impatient callers).
    pub fn with_receipt_timeout(mut self, timeout: Duration, poll_interval: Duration) -> Self {
        self.receipt_timeout = timeout;
        self.receipt_poll_interval = poll_interval;
        self
    }

    /// Override the gas limit used when estimation fails.
    pub fn with_fallback_gas_limit(mut self, gas_limit: u64) -> Self {
        self.fallback_gas_limit = gas_limit;
        self
    }

    /// The ledger this pipeline records into.
    pub fn ledger(&self) -> &Arc<TransactionLedger> {
        &self.ledger
    }

    /// The signer this pipeline submits with.
    pub fn signer(&self) -> &Arc<Signer> {
        &self.signer
    }

    /// Run one contract call through all five stages.
    pub async fn submit(&self, call: ContractCall) -> SubmissionResult {
        let from = self.signer.address();
        let to = call.contract.address();

        let base_request = TransactionRequest::default()
            .with_from(from)
            .with_to(to)
            .with_input(call.calldata.clone());

        // Stage 1: estimate gas. Never terminal; estimation failures fall
        // back to a conservative constant.
        let gas_limit = match self
            .rate_limiter
            .execute("estimate_gas", || self.provider.estimate_gas(&base_request))
            .await
        {
            Ok(estimate) => {
                let limit = padded_gas_limit(estimate);
                debug!(function = call.function, estimate, gas_limit = limit, "Gas estimated");
                limit
            }
            Err(e) => {
                warn!(
                    function = call.function,
                    error = %e,
                    fallback = self.fallback_gas_limit,
                    "Gas estimation failed, using fallback limit"
                );
                self.fallback_gas_limit
            }
        };

        // Stages 2-4 run under the per-signer submission lock.
        let guard = self.signer.submit_guard().await;

        // Stage 2: build. Fee profile from the oracle, nonce from the
        // serializer.
        let fee_profile = match self.fee_oracle.current().await {
            Ok(profile) => profile,
            Err(e) => {
                let message = format!("{e:#}");
                return SubmissionResult::rejected(classify(&message), message);
            }
        };

        let nonce = match self.signer.nonce().next().await {
            Ok(nonce) => nonce,
            Err(e) => {
                let message = format!("{e:#}");
                return SubmissionResult::rejected(classify(&message), message);
            }
        };

        let mut tx = base_request
            .clone()
            .with_chain_id(self.provider.chain_id())
            .with_nonce(nonce)
            .with_gas_limit(gas_limit)
            .with_value(U256::ZERO);
        fee_profile.apply_to(&mut tx);

        // Stage 3: simulate. A read-only call with the same calldata and
        // sender, no gas or fee fields.
        let sim_request = TransactionRequest::default()
            .with_from(from)
            .with_to(to)
            .with_input(call.calldata.clone());

        if let Err(e) = self
            .rate_limiter
            .execute("simulate", || self.provider.call(&sim_request))
            .await
        {
            let message = format!("{e:#}");
            let kind = match classify(&message) {
                ErrorKind::InsufficientFunds => ErrorKind::InsufficientFunds,
                ErrorKind::RateLimited => ErrorKind::RateLimited,
                ErrorKind::NetworkTimeout => ErrorKind::NetworkTimeout,
                ErrorKind::ConnectionError => ErrorKind::ConnectionError,
                ErrorKind::PermissionError => ErrorKind::PermissionError,
                _ => ErrorKind::ContractRevert,
            };
            let detail = revert_reason(&message).unwrap_or(message);
            warn!(function = call.function, kind = kind.as_str(), detail, "Transaction would fail");

            // The handed-out nonce is abandoned; drop the optimistic
            // counter so the next submission refetches.
            self.signer.nonce().reset_to_chain().await;
            return SubmissionResult::rejected(kind, detail);
        }
        debug!(function = call.function, "Transaction simulation successful");

        // Stage 4: sign and send.
        let hash = match self
            .rate_limiter
            .execute("send_raw_transaction", || {
                self.signer.send_transaction(tx.clone())
            })
            .await
        {
            Ok(hash) => hash,
            Err(e) => {
                let message = format!("{e:#}");
                let kind = classify(&message);
                match kind {
                    ErrorKind::NonceTooLow => {
                        // Let the serializer adopt the chain's expected
                        // nonce; the façade decides whether to retry.
                        if let Err(nonce_err) = self.signer.nonce().handle_error(&message).await {
                            warn!(error = %nonce_err, "Nonce recovery failed");
                        }
                        return SubmissionResult::rejected(kind, message);
                    }
                    ErrorKind::AlreadyKnown => match extract_tx_hash(&message) {
                        Some(existing) => {
                            info!(
                                function = call.function,
                                tx_hash = %existing,
                                "Duplicate in mempool, continuing with existing hash"
                            );
                            existing
                        }
                        None => {
                            // The duplicate still occupies this nonce in
                            // the mempool; keep the counter advanced.
                            return SubmissionResult::rejected(ErrorKind::UnexpectedError, message);
                        }
                    },
                    _ => {
                        // The tx never entered the mempool; the handed-out
                        // nonce is abandoned, so drop the optimistic
                        // counter before surfacing.
                        self.signer.nonce().reset_to_chain().await;
                        return SubmissionResult::rejected(kind, message);
                    }
                }
            }
        };
        drop(guard);

        info!(
            function = call.function,
            tx_hash = %hash,
            nonce,
            gas_limit,
            "Transaction sent, waiting for receipt"
        );

        let mut record = TxRecord::pending(
            hash,
            call.subject,
            call.function,
            fee_profile,
            nonce,
            gas_limit,
        );
        self.ledger.put(record.clone());

        // Stage 5: await receipt and classify the outcome.
        let mut receipt_logs = Vec::new();
        match self.await_receipt(hash).await {
            Some(receipt) => {
                self.apply_receipt(&mut record, &call, &receipt, gas_limit).await;
                receipt_logs = receipt.inner.logs().to_vec();
            }
            None => {
                warn!(tx_hash = %hash, "No receipt within await window, leaving record pending");
                record.mark_pending_with(
                    ErrorKind::ReceiptTimeout,
                    format!(
                        "no receipt after {}s; poll the status endpoint",
                        self.receipt_timeout.as_secs()
                    ),
                );
            }
        }

        self.ledger.put(record.clone());
        SubmissionResult::Submitted {
            record,
            receipt_logs,
        }
    }

    async fn apply_receipt(
        &self,
        record: &mut TxRecord,
        call: &ContractCall,
        receipt: &TransactionReceipt,
        gas_limit: u64,
    ) {
        let block_number = receipt.block_number.unwrap_or_default();
        let gas_used = receipt.gas_used as u64;

        if receipt.status() {
            record.mark_confirmed(block_number, gas_used);

            let decoded: Vec<_> = receipt
                .inner
                .logs()
                .iter()
                .filter_map(|log| call.contract.decode_log(log))
                .collect();
            if !decoded.is_empty() {
                record.decoded_logs = Some(decoded);
            }

            info!(
                function = call.function,
                tx_hash = %record.hash,
                block = block_number,
                gas_used,
                gas_limit,
                duration_ms = record.duration_ms.unwrap_or_default(),
                "Transaction confirmed"
            );
        } else {
            let kind = failed_receipt_kind(gas_used, gas_limit);
            record.mark_failed(
                block_number,
                gas_used,
                kind,
                "Transaction execution failed on chain",
            );
            warn!(
                function = call.function,
                tx_hash = %record.hash,
                block = block_number,
                gas_used,
                gas_limit,
                kind = kind.as_str(),
                "Transaction failed"
            );

            if kind == ErrorKind::OutOfGasOrRevert {
                // Near-exhausted gas usually means a runtime error; a
                // trace pins it down when the node offers the debug API.
                if let Some(trace) = self.provider.debug_trace_transaction(record.hash).await {
                    debug!(tx_hash = %record.hash, trace = %trace, "Post-mortem trace");
                }
            }
        }
    }

    /// Poll for the receipt until the timeout elapses. `None` = timed out.
    async fn await_receipt(&self, hash: B256) -> Option<TransactionReceipt> {
        let deadline = tokio::time::Instant::now() + self.receipt_timeout;

        loop {
            if tokio::time::Instant::now() >= deadline {
                return None;
            }

            match self
                .rate_limiter
                .execute("get_transaction_receipt", || {
                    self.provider.transaction_receipt(hash)
                })
                .await
            {
                Ok(Some(receipt)) => return Some(receipt),
                Ok(None) => {}
                Err(e) => {
                    warn!(tx_hash = %hash, error = %e, "Error fetching receipt, will retry");
                }
            }
            tokio::time::sleep(self.receipt_poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::XpContract;

    #[test]
    fn test_padded_gas_limit() {
        assert_eq!(padded_gas_limit(100_000), 120_000);
        assert_eq!(padded_gas_limit(50_000), 60_000);
        // Ceiling, not floor.
        assert_eq!(padded_gas_limit(1), 2);
    }

    #[test]
    fn test_failed_receipt_kind() {
        // 59000/60000 is above the 95% exhaustion threshold.
        assert_eq!(failed_receipt_kind(59_000, 60_000), ErrorKind::OutOfGasOrRevert);
        assert_eq!(failed_receipt_kind(57_000, 60_000), ErrorKind::OutOfGasOrRevert);
        assert_eq!(failed_receipt_kind(40_000, 60_000), ErrorKind::ContractRevert);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_rejects_without_hash() {
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
        let pipeline =
            SubmissionPipeline::new(provider.clone(), signer, rate_limiter, ledger.clone());

        let xp = Arc::new(XpContract::new(provider, Address::repeat_byte(0x11)));
        let calldata = xp.award_xp_call(Address::repeat_byte(0xa1), 1);
        let call = ContractCall::new(xp, "awardXP", Address::repeat_byte(0xa1), calldata);

        let result = pipeline.submit(call).await;
        match result {
            SubmissionResult::Rejected { error, .. } => assert!(!error.is_empty()),
            SubmissionResult::Submitted { .. } => {
                panic!("submission cannot reach an unreachable node")
            }
        }
        assert!(ledger.is_empty());
    }
}
