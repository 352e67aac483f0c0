//! Uniform response shapes for the façade operations.
//!
//! Every operation returns a [`RewardResponse`]; nothing propagates as an
//! uncaught error. A submission that produced a transaction hash reports
//! `processing` with a status-check link, even if the receipt later shows
//! an on-chain failure; an operation that never produced a hash reports
//! `error` with its classified kind.

use alloy::primitives::{Address, B256, U256};
use rewarder_chain::{ErrorKind, TxRecord};
use serde::{Serialize, Serializer};

/// Top-level status of a façade operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    /// A transaction hash exists; poll the status endpoint for the outcome.
    Processing,
    /// Completed without a submission (e.g. role already granted) or a
    /// pure read.
    Success,
    /// No transaction hash was produced.
    Error,
}

fn serialize_opt_u256_decimal<S: Serializer>(
    value: &Option<U256>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match value {
        Some(v) => serializer.serialize_str(&v.to_string()),
        None => serializer.serialize_none(),
    }
}

/// Response of one reward operation.
#[derive(Debug, Clone, Serialize)]
pub struct RewardResponse {
    pub status: ResponseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<B256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Where to poll for the transaction outcome.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_status_at: Option<String>,
    /// Façade retries consumed by this operation.
    pub retries: u32,
    /// `balance_after - balance_before` for confirmed XP awards.
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_opt_u256_decimal"
    )]
    pub xp_awarded: Option<U256>,
    /// XP balance observed after confirmation.
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_opt_u256_decimal"
    )]
    pub balance_after: Option<U256>,
    /// Token id minted by a confirmed achievement.
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_opt_u256_decimal"
    )]
    pub token_id: Option<U256>,
    /// Operation arguments, for observability.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl RewardResponse {
    fn base(status: ResponseStatus) -> Self {
        Self {
            status,
            tx_hash: None,
            error_kind: None,
            message: None,
            check_status_at: None,
            retries: 0,
            xp_awarded: None,
            balance_after: None,
            token_id: None,
            details: None,
        }
    }

    /// A submission that produced a hash: always `processing` plus a
    /// status link, regardless of what the receipt later said.
    pub fn processing(record: &TxRecord) -> Self {
        let mut response = Self::base(ResponseStatus::Processing);
        response.tx_hash = Some(record.hash);
        response.error_kind = record.error_kind;
        response.check_status_at = Some(check_status_path(record.address));
        response
    }

    /// An operation that completed without submitting.
    pub fn success(message: impl Into<String>) -> Self {
        let mut response = Self::base(ResponseStatus::Success);
        response.message = Some(message.into());
        response
    }

    /// An operation that never produced a hash.
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        let mut response = Self::base(ResponseStatus::Error);
        response.error_kind = Some(kind);
        response.message = Some(message.into());
        response
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Status endpoint path for an address's recent transactions.
pub fn check_status_path(address: Address) -> String {
    format!("/rewards/transactions/{address}")
}

/// Response of the XP balance read.
#[derive(Debug, Clone, Serialize)]
pub struct XpBalance {
    pub address: Address,
    #[serde(serialize_with = "serialize_u256_decimal")]
    pub balance: U256,
}

fn serialize_u256_decimal<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rewarder_chain::FeeProfile;

    fn record() -> TxRecord {
        TxRecord::pending(
            B256::repeat_byte(0xcd),
            Address::repeat_byte(0xa1),
            "awardXP",
            FeeProfile::eip1559_from_base_fee(10_000_000_000),
            7,
            120_000,
        )
    }

    #[test]
    fn test_processing_shape() {
        let mut response = RewardResponse::processing(&record()).with_retries(1);
        response.xp_awarded = Some(U256::from(50));

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "processing");
        assert_eq!(json["retries"], 1);
        assert_eq!(json["xp_awarded"], "50");
        assert!(json["tx_hash"].as_str().unwrap().starts_with("0x"));
        assert!(json["check_status_at"]
            .as_str()
            .unwrap()
            .starts_with("/rewards/transactions/0x"));
    }

    #[test]
    fn test_error_shape() {
        let response = RewardResponse::error(ErrorKind::ValidationError, "amount must be positive");
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["status"], "error");
        assert_eq!(json["error_kind"], "validation_error");
        assert!(json.get("tx_hash").is_none());
        assert!(json.get("check_status_at").is_none());
    }

    #[test]
    fn test_success_shape() {
        let response = RewardResponse::success("address already has MINTER_ROLE");
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["status"], "success");
        assert!(json.get("error_kind").is_none());
    }

    #[test]
    fn test_token_id_decimal() {
        let mut response = RewardResponse::processing(&record());
        response.token_id = Some(U256::from(0xabc));
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["token_id"], "2748");
    }

    #[test]
    fn test_xp_balance_shape() {
        let balance = XpBalance {
            address: Address::repeat_byte(0xa1),
            balance: U256::from(1234),
        };
        let json = serde_json::to_value(&balance).unwrap();
        assert_eq!(json["balance"], "1234");
    }
}
