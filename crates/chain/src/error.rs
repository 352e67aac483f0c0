//! Error taxonomy and RPC error classification.
//!
//! Plain EVM JSON-RPC reports most failure modes only through the error
//! message text, so the classifier is a substring scanner over the rendered
//! error chain. The taxonomy is stable: callers key retry policy and API
//! responses off [`ErrorKind`], never off message text.

use alloy::primitives::B256;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable classification of a failed (or specially-handled) operation.
///
/// Serialized snake_case, matching the wire-level `error_kind` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The chain's expected nonce exceeds the submitted nonce.
    #[error("nonce too low")]
    NonceTooLow,
    /// Replacement transaction with the same nonce but no fee bump.
    #[error("replacement transaction underpriced")]
    UnderpricedReplacement,
    /// Duplicate submission already in the mempool; the existing hash is
    /// extracted and the submission continues under it.
    #[error("transaction already known")]
    AlreadyKnown,
    /// HTTP 429 from the RPC provider after bounded retries.
    #[error("rate limited")]
    RateLimited,
    /// Signer balance cannot cover gas cost.
    #[error("insufficient funds")]
    InsufficientFunds,
    /// Gas estimation refused by the node.
    #[error("gas limit exceeded")]
    GasLimitExceeded,
    /// `eth_call` or the receipt indicates a contract revert.
    #[error("contract revert")]
    ContractRevert,
    /// Failed receipt with `gas_used >= 0.95 * gas_limit`.
    #[error("out of gas or revert")]
    OutOfGasOrRevert,
    /// No receipt within the await window; the transaction may still mine.
    #[error("receipt timeout")]
    ReceiptTimeout,
    /// Signer lacks the role required by the operation.
    #[error("permission error")]
    PermissionError,
    /// Malformed address, unknown enum value, or non-positive amount.
    #[error("validation error")]
    ValidationError,
    /// Transport-layer timeout.
    #[error("network timeout")]
    NetworkTimeout,
    /// Transport-layer connection failure.
    #[error("connection error")]
    ConnectionError,
    /// Anything the classifier could not place.
    #[error("unexpected error")]
    UnexpectedError,
}

impl ErrorKind {
    /// Snake_case label, as used in responses and log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NonceTooLow => "nonce_too_low",
            Self::UnderpricedReplacement => "underpriced_replacement",
            Self::AlreadyKnown => "already_known",
            Self::RateLimited => "rate_limited",
            Self::InsufficientFunds => "insufficient_funds",
            Self::GasLimitExceeded => "gas_limit_exceeded",
            Self::ContractRevert => "contract_revert",
            Self::OutOfGasOrRevert => "out_of_gas_or_revert",
            Self::ReceiptTimeout => "receipt_timeout",
            Self::PermissionError => "permission_error",
            Self::ValidationError => "validation_error",
            Self::NetworkTimeout => "network_timeout",
            Self::ConnectionError => "connection_error",
            Self::UnexpectedError => "unexpected_error",
        }
    }
}

/// Classify an error message into the taxonomy.
///
/// Order matters: the more specific patterns are checked first so that a
/// message like "nonce too low: minimum expected nonce is 42" never falls
/// through to a generic bucket.
pub fn classify(message: &str) -> ErrorKind {
    let msg = message.to_lowercase();

    if msg.contains("nonce too low") || msg.contains("minimum expected nonce") {
        ErrorKind::NonceTooLow
    } else if msg.contains("replacement transaction underpriced") || msg.contains("underpriced") {
        ErrorKind::UnderpricedReplacement
    } else if msg.contains("already known") || msg.contains("already exists") {
        ErrorKind::AlreadyKnown
    } else if msg.contains("429") || msg.contains("too many requests") || msg.contains("rate limit")
    {
        ErrorKind::RateLimited
    } else if msg.contains("insufficient funds") {
        ErrorKind::InsufficientFunds
    } else if msg.contains("gas required exceeds allowance")
        || msg.contains("exceeds block gas limit")
    {
        ErrorKind::GasLimitExceeded
    } else if msg.contains("missing role") || msg.contains("accesscontrol") {
        ErrorKind::PermissionError
    } else if msg.contains("revert") {
        ErrorKind::ContractRevert
    } else if msg.contains("timeout") || msg.contains("timed out") {
        ErrorKind::NetworkTimeout
    } else if msg.contains("connection") || msg.contains("connect") {
        ErrorKind::ConnectionError
    } else {
        ErrorKind::UnexpectedError
    }
}

/// Extract a 32-byte transaction hash embedded in an error message.
///
/// Used for "already known" duplicates, where the node echoes the hash of
/// the mempool entry. Absence of a full 64-hex-digit hash demotes the
/// duplicate to [`ErrorKind::UnexpectedError`] at the call site.
pub fn extract_tx_hash(message: &str) -> Option<B256> {
    let re = regex_lite::Regex::new(r"0x[a-fA-F0-9]{64}").unwrap();
    let m = re.find(message)?;
    m.as_str().parse().ok()
}

/// Extract the chain's expected nonce from a "nonce too low" message.
pub fn extract_expected_nonce(message: &str) -> Option<u64> {
    let re = regex_lite::Regex::new(r"minimum expected nonce is (\d+)").unwrap();
    let caps = re.captures(message)?;
    caps.get(1)?.as_str().parse().ok()
}

/// Pull a human-readable revert reason out of an `eth_call` error.
///
/// Nodes differ: some append `execution reverted: <reason>`, others return
/// the raw ABI-encoded `Error(string)` payload (selector `0x08c379a0`).
/// Both forms are handled; `None` means no reason was recoverable.
pub fn revert_reason(message: &str) -> Option<String> {
    // ABI-encoded Error(string) payload somewhere in the message.
    let re = regex_lite::Regex::new(r"0x08c379a0[a-fA-F0-9]+").unwrap();
    if let Some(m) = re.find(message) {
        if let Some(reason) = decode_error_string(m.as_str()) {
            return Some(reason);
        }
    }

    // Textual form: take the tail after the marker.
    for marker in ["execution reverted: ", "execution reverted:", "revert: "] {
        if let Some(idx) = message.find(marker) {
            let tail = message[idx + marker.len()..].trim();
            if !tail.is_empty() {
                return Some(tail.trim_matches(|c| c == '"' || c == '\'').to_string());
            }
        }
    }

    None
}

/// Decode an ABI-encoded `Error(string)` hex payload.
fn decode_error_string(payload: &str) -> Option<String> {
    let bytes = hex::decode(payload.trim_start_matches("0x")).ok()?;
    // selector (4) + offset (32) + length (32) + data
    if bytes.len() < 68 {
        return None;
    }
    let len_bytes: [u8; 8] = bytes[60..68].try_into().ok()?;
    let len = u64::from_be_bytes(len_bytes) as usize;
    let data = bytes.get(68..68 + len)?;
    String::from_utf8(data.to_vec()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_nonce() {
        assert_eq!(classify("nonce too low"), ErrorKind::NonceTooLow);
        assert_eq!(
            classify("invalid nonce: minimum expected nonce is 17"),
            ErrorKind::NonceTooLow
        );
    }

    #[test]
    fn test_classify_send_errors() {
        assert_eq!(
            classify("replacement transaction underpriced"),
            ErrorKind::UnderpricedReplacement
        );
        assert_eq!(classify("already known"), ErrorKind::AlreadyKnown);
        assert_eq!(classify("tx already exists in pool"), ErrorKind::AlreadyKnown);
        assert_eq!(classify("HTTP 429: Too Many Requests"), ErrorKind::RateLimited);
        assert_eq!(
            classify("rate limit exceeded and maximum wait time reached"),
            ErrorKind::RateLimited
        );
        assert_eq!(
            classify("insufficient funds for gas * price + value"),
            ErrorKind::InsufficientFunds
        );
        assert_eq!(
            classify("gas required exceeds allowance (300000)"),
            ErrorKind::GasLimitExceeded
        );
    }

    #[test]
    fn test_classify_call_errors() {
        assert_eq!(classify("execution reverted: XP: bad tier"), ErrorKind::ContractRevert);
        assert_eq!(
            classify("AccessControl: account 0xabc is missing role 0x0"),
            ErrorKind::PermissionError
        );
    }

    #[test]
    fn test_classify_transport_errors() {
        assert_eq!(classify("request timed out after 30s"), ErrorKind::NetworkTimeout);
        assert_eq!(classify("connection refused"), ErrorKind::ConnectionError);
        assert_eq!(classify("some new failure mode"), ErrorKind::UnexpectedError);
    }

    #[test]
    fn test_extract_tx_hash() {
        let msg = format!("already known {}", "0x".to_string() + &"ab".repeat(32));
        let hash = extract_tx_hash(&msg).unwrap();
        assert_eq!(hash.as_slice(), &[0xab; 32]);

        // Too short: not a transaction hash.
        assert!(extract_tx_hash("already known 0xabc123").is_none());
    }

    #[test]
    fn test_extract_expected_nonce() {
        assert_eq!(
            extract_expected_nonce("nonce too low: minimum expected nonce is 42"),
            Some(42)
        );
        assert_eq!(extract_expected_nonce("nonce too low"), None);
    }

    #[test]
    fn test_revert_reason_textual() {
        assert_eq!(
            revert_reason("server returned an error: execution reverted: XP: zero amount"),
            Some("XP: zero amount".to_string())
        );
        assert_eq!(revert_reason("no reason here"), None);
    }

    #[test]
    fn test_revert_reason_abi_encoded() {
        // Error("fail") encoded by solc.
        let payload = concat!(
            "0x08c379a0",
            "0000000000000000000000000000000000000000000000000000000000000020",
            "0000000000000000000000000000000000000000000000000000000000000004",
            "6661696c00000000000000000000000000000000000000000000000000000000",
        );
        let msg = format!("execution reverted, data: {payload}");
        assert_eq!(revert_reason(&msg), Some("fail".to_string()));
    }

    #[test]
    fn test_error_kind_labels() {
        assert_eq!(ErrorKind::NonceTooLow.as_str(), "nonce_too_low");
        assert_eq!(ErrorKind::OutOfGasOrRevert.as_str(), "out_of_gas_or_revert");
        let json = serde_json::to_string(&ErrorKind::RateLimited).unwrap();
        assert_eq!(json, "\"rate_limited\"");
    }
}
