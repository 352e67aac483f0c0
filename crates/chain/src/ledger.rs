//! In-memory transaction ledger.
//!
//! The stable answer to "what happened to my transaction" and "what has
//! this address done recently". Two maps under one reader-writer lock:
//! hash -> record, and subject address -> the 10 most recent hashes.
//! Eviction removes the oldest hash from both maps in the same critical
//! section. Durability across restarts is explicitly out of scope; a
//! cache miss falls back to a chain lookup.

use std::collections::HashMap;
use std::sync::Arc;

use alloy::primitives::{Address, B256};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::contracts::DecodedEvent;
use crate::error::{classify, ErrorKind};
use crate::fees::FeeProfile;
use crate::provider::ProviderManager;
use crate::rate_limit::RateLimiter;

/// Recent-transaction cap per subject address.
const RECENT_PER_ADDRESS: usize = 10;

/// Lifecycle state of a tracked transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxState {
    Pending,
    Confirmed,
    Failed,
    NotFound,
}

impl TxState {
    /// Terminal states are never demoted back to non-terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed)
    }
}

/// Ledger entry for one submission, keyed by transaction hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxRecord {
    /// 32-byte transaction hash.
    pub hash: B256,
    /// Logical subject: the reward recipient, or the signer for admin calls.
    pub address: Address,
    /// Symbolic method name (e.g. `awardXP`).
    pub function: String,
    pub state: TxState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Unix seconds at submission.
    pub submitted_at: i64,
    /// Unix seconds when the receipt was observed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mined_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_used: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_limit: Option<u64>,
    /// Fee parameters snapshotted at submission.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee_profile: Option<FeeProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<u64>,
    /// Receipt-to-observation latency.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
    /// `gas_used / gas_limit` once mined.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_efficiency: Option<f64>,
    /// Receipt logs decoded against the contract's event set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decoded_logs: Option<Vec<DecodedEvent>>,
}

impl TxRecord {
    /// A freshly submitted, not yet mined transaction.
    pub fn pending(
        hash: B256,
        address: Address,
        function: &str,
        fee_profile: FeeProfile,
        nonce: u64,
        gas_limit: u64,
    ) -> Self {
        Self {
            hash,
            address,
            function: function.to_string(),
            state: TxState::Pending,
            error_kind: None,
            error: None,
            submitted_at: chrono::Utc::now().timestamp(),
            mined_at: None,
            block_number: None,
            gas_used: None,
            gas_limit: Some(gas_limit),
            fee_profile: Some(fee_profile),
            nonce: Some(nonce),
            duration_ms: None,
            gas_efficiency: None,
            decoded_logs: None,
        }
    }

    /// A record synthesized from a chain lookup (no local submission).
    fn synthesized(hash: B256, state: TxState) -> Self {
        Self {
            hash,
            address: Address::ZERO,
            function: "unknown".to_string(),
            state,
            error_kind: None,
            error: None,
            submitted_at: chrono::Utc::now().timestamp(),
            mined_at: None,
            block_number: None,
            gas_used: None,
            gas_limit: None,
            fee_profile: None,
            nonce: None,
            duration_ms: None,
            gas_efficiency: None,
            decoded_logs: None,
        }
    }

    fn set_mined(&mut self, block_number: u64, gas_used: u64) {
        let now = chrono::Utc::now().timestamp();
        self.mined_at = Some(now);
        self.duration_ms = Some((now - self.submitted_at) * 1000);
        self.block_number = Some(block_number);
        self.gas_used = Some(gas_used);
        if let Some(gas_limit) = self.gas_limit.filter(|limit| *limit > 0) {
            self.gas_efficiency = Some(gas_used as f64 / gas_limit as f64);
        }
    }

    /// Transition to `Confirmed` with receipt data.
    pub fn mark_confirmed(&mut self, block_number: u64, gas_used: u64) {
        self.set_mined(block_number, gas_used);
        self.state = TxState::Confirmed;
        self.error_kind = None;
        self.error = None;
    }

    /// Transition to `Failed` with receipt data and a classified kind.
    pub fn mark_failed(
        &mut self,
        block_number: u64,
        gas_used: u64,
        kind: ErrorKind,
        error: impl Into<String>,
    ) {
        self.set_mined(block_number, gas_used);
        self.state = TxState::Failed;
        self.error_kind = Some(kind);
        self.error = Some(error.into());
    }

    /// Annotate a still-pending record with a recoverable condition.
    pub fn mark_pending_with(&mut self, kind: ErrorKind, error: impl Into<String>) {
        self.state = TxState::Pending;
        self.error_kind = Some(kind);
        self.error = Some(error.into());
    }
}

#[derive(Default)]
struct LedgerInner {
    records: HashMap<B256, TxRecord>,
    by_address: HashMap<Address, SmallVec<[B256; RECENT_PER_ADDRESS]>>,
}

/// Process-wide view of in-flight and terminal transactions.
pub struct TransactionLedger {
    provider: ProviderManager,
    rate_limiter: Arc<RateLimiter>,
    inner: RwLock<LedgerInner>,
}

impl TransactionLedger {
    pub fn new(provider: ProviderManager, rate_limiter: Arc<RateLimiter>) -> Self {
        Self {
            provider,
            rate_limiter,
            inner: RwLock::new(LedgerInner::default()),
        }
    }

    /// Store or update a record. Idempotent per hash; replacing a terminal
    /// record with a non-terminal one is forbidden and ignored. Returns
    /// whether the record was stored.
    pub fn put(&self, record: TxRecord) -> bool {
        let mut guard = self.inner.write();
        let inner = &mut *guard;

        if let Some(existing) = inner.records.get(&record.hash) {
            if existing.state.is_terminal() && !record.state.is_terminal() {
                warn!(
                    tx_hash = %record.hash,
                    existing = ?existing.state,
                    incoming = ?record.state,
                    "Refusing to demote terminal record"
                );
                return false;
            }
        }

        let hash = record.hash;
        let address = record.address;
        let previously_known = inner.records.insert(hash, record).is_some();

        if !previously_known {
            let recent = inner.by_address.entry(address).or_default();
            recent.push(hash);
            if recent.len() > RECENT_PER_ADDRESS {
                let oldest = recent.remove(0);
                inner.records.remove(&oldest);
                debug!(address = %address, tx_hash = %oldest, "Evicted oldest tracked transaction");
            }
        }

        true
    }

    /// Look up a hash: in-memory first, then the chain.
    ///
    /// The fallback tolerates the window where another task has submitted
    /// a transaction but not yet persisted it here. A rate-limited read
    /// reports `Pending`/`RateLimited` rather than `NotFound`.
    pub async fn get(&self, hash: B256) -> TxRecord {
        if let Some(record) = self.inner.read().records.get(&hash).cloned() {
            return record;
        }
        self.chain_lookup(hash).await
    }

    async fn chain_lookup(&self, hash: B256) -> TxRecord {
        debug!(tx_hash = %hash, "Ledger miss, falling back to chain lookup");

        let tx = match self
            .rate_limiter
            .execute("get_transaction", || self.provider.transaction_by_hash(hash))
            .await
        {
            Ok(tx) => tx,
            Err(e) => return Self::lookup_failure(hash, &format!("{e:#}")),
        };

        let Some(tx) = tx else {
            let mut record = TxRecord::synthesized(hash, TxState::NotFound);
            record.error = Some("Transaction not found".to_string());
            return record;
        };

        if tx.block_number.is_none() {
            return TxRecord::synthesized(hash, TxState::Pending);
        }

        let receipt = match self
            .rate_limiter
            .execute("get_transaction_receipt", || {
                self.provider.transaction_receipt(hash)
            })
            .await
        {
            Ok(receipt) => receipt,
            Err(e) => return Self::lookup_failure(hash, &format!("{e:#}")),
        };

        match receipt {
            Some(receipt) => {
                let mut record = TxRecord::synthesized(hash, TxState::Pending);
                let block_number = receipt.block_number.unwrap_or_default();
                let gas_used = receipt.gas_used as u64;
                if receipt.status() {
                    record.mark_confirmed(block_number, gas_used);
                } else {
                    record.mark_failed(
                        block_number,
                        gas_used,
                        ErrorKind::ContractRevert,
                        "Transaction execution failed on chain",
                    );
                }
                record
            }
            None => TxRecord::synthesized(hash, TxState::Pending),
        }
    }

    fn lookup_failure(hash: B256, message: &str) -> TxRecord {
        let kind = classify(message);
        if kind == ErrorKind::RateLimited {
            // Throttled, not missing: report pending so callers retry.
            let mut record = TxRecord::synthesized(hash, TxState::Pending);
            record.mark_pending_with(kind, message);
            record
        } else {
            let mut record = TxRecord::synthesized(hash, TxState::NotFound);
            record.error_kind = Some(kind);
            record.error = Some(message.to_string());
            record
        }
    }

    /// Up to the 10 most recent records for an address, newest first.
    /// Snapshot semantics: concurrent `put`s may or may not be visible.
    pub fn list_by_address(&self, address: Address) -> Vec<TxRecord> {
        let inner = self.inner.read();
        inner
            .by_address
            .get(&address)
            .map(|hashes| {
                hashes
                    .iter()
                    .rev()
                    .filter_map(|hash| inner.records.get(hash).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of tracked records (diagnostics).
    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> TransactionLedger {
        TransactionLedger::new(
            ProviderManager::offline("http://localhost:1", 314159),
            Arc::new(RateLimiter::default()),
        )
    }

    fn record(hash_byte: u8, address: Address) -> TxRecord {
        TxRecord::pending(
            B256::repeat_byte(hash_byte),
            address,
            "awardXP",
            FeeProfile::eip1559_from_base_fee(10_000_000_000),
            1,
            120_000,
        )
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let ledger = ledger();
        let address = Address::repeat_byte(0xa1);
        assert!(ledger.put(record(1, address)));

        let fetched = ledger.get(B256::repeat_byte(1)).await;
        assert_eq!(fetched.state, TxState::Pending);
        assert_eq!(fetched.address, address);
        assert!(fetched.block_number.is_none());
    }

    #[tokio::test]
    async fn test_terminal_records_are_not_demoted() {
        let ledger = ledger();
        let address = Address::repeat_byte(0xa1);

        let mut confirmed = record(1, address);
        confirmed.mark_confirmed(77, 100_000);
        assert!(ledger.put(confirmed));

        // A stale pending write for the same hash must be ignored.
        assert!(!ledger.put(record(1, address)));
        let fetched = ledger.get(B256::repeat_byte(1)).await;
        assert_eq!(fetched.state, TxState::Confirmed);
        assert_eq!(fetched.block_number, Some(77));
    }

    #[tokio::test]
    async fn test_terminal_record_invariants() {
        let mut rec = record(1, Address::repeat_byte(0xa1));
        rec.mark_confirmed(42, 100_000);

        assert!(rec.block_number.is_some());
        assert!(rec.gas_used.unwrap() <= rec.gas_limit.unwrap());
        assert!((rec.gas_efficiency.unwrap() - 100_000.0 / 120_000.0).abs() < 1e-9);
        assert!(rec.duration_ms.is_some());
    }

    #[test]
    fn test_eviction_keeps_ten_most_recent() {
        let ledger = ledger();
        let address = Address::repeat_byte(0xa1);

        for i in 1..=11u8 {
            ledger.put(record(i, address));
        }

        let listed = ledger.list_by_address(address);
        assert_eq!(listed.len(), 10);
        // Newest first, oldest (hash 0x01..) evicted from both maps.
        assert_eq!(listed[0].hash, B256::repeat_byte(11));
        assert_eq!(listed[9].hash, B256::repeat_byte(2));
        assert_eq!(ledger.len(), 10);
    }

    #[test]
    fn test_listing_is_per_address() {
        let ledger = ledger();
        ledger.put(record(1, Address::repeat_byte(0xa1)));
        ledger.put(record(2, Address::repeat_byte(0xb2)));

        assert_eq!(ledger.list_by_address(Address::repeat_byte(0xa1)).len(), 1);
        assert_eq!(ledger.list_by_address(Address::repeat_byte(0xb2)).len(), 1);
        assert!(ledger.list_by_address(Address::repeat_byte(0xc3)).is_empty());
    }

    #[tokio::test]
    async fn test_unknown_hash_with_unreachable_chain() {
        let ledger = ledger();
        let fetched = ledger.get(B256::repeat_byte(0xee)).await;
        assert_eq!(fetched.state, TxState::NotFound);
        assert!(fetched.error.is_some());
    }

    #[test]
    fn test_record_serialization_skips_unset_fields() {
        let rec = record(1, Address::repeat_byte(0xa1));
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["state"], "pending");
        assert!(json.get("block_number").is_none());
        assert!(json.get("decoded_logs").is_none());
        assert_eq!(json["nonce"], 1);
    }
}
