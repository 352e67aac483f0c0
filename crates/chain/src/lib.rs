//! Chain interaction layer for the reward orchestrator.
//!
//! This crate provides:
//! - Provider management for JSON-RPC access
//! - Typed contract bindings for the XP and achievement tokens
//! - Per-signer nonce serialization with error-driven recovery
//! - Token-bucket rate limiting over RPC egress
//! - EIP-1559 / legacy fee selection
//! - The five-stage transaction submission pipeline
//! - The in-memory transaction ledger (status and per-address history)
//! - The stable error taxonomy and message classifier

pub mod contracts;
mod error;
mod fees;
mod ledger;
mod nonce;
mod pipeline;
mod provider;
mod rate_limit;
mod signer;

pub use contracts::{
    event_signatures, roles, AbiArtifact, AchievementContract, AchievementView, ContractHandle,
    DecodedEvent, XpContract,
};
pub use error::{classify, extract_expected_nonce, extract_tx_hash, revert_reason, ErrorKind};
pub use fees::{FeeOracle, FeeProfile};
pub use ledger::{TransactionLedger, TxRecord, TxState};
pub use nonce::NonceSerializer;
pub use pipeline::{ContractCall, SubmissionPipeline, SubmissionResult};
pub use provider::ProviderManager;
pub use rate_limit::RateLimiter;
pub use signer::Signer;
