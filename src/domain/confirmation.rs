use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Settlement status reported by the confirmation endpoint.
///
/// Only `is_paid` drives the poller; everything else is carried through to the
/// caller untouched.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Confirmation {
    #[serde(default)]
    pub is_paid: bool,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub donation_id: Option<String>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub confirmed_at: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    /// Any additional settlement fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A confirmed donation as listed on the recent donations feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentDonation {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub donor_name: String,
    #[serde(default)]
    pub amount_naira: Decimal,
    #[serde(default)]
    pub confirmed_at: Option<String>,
}

/// Why a single status check produced no answer.
///
/// A `Confirmation` with `is_paid == false` is an answer; a `CheckError` is the
/// absence of one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CheckError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },
    #[error("request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("malformed response: {0}")]
    Malformed(String),
}

pub type CheckResult<T> = std::result::Result<T, CheckError>;

impl CheckError {
    /// Classifies an unsuccessful HTTP status.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            408 | 429 | 500..=599 => CheckError::Server { status, message },
            _ => CheckError::Rejected { status, message },
        }
    }

    /// Whether asking again could plausibly produce a different answer.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CheckError::Transport(_) | CheckError::Server { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_confirmation_keeps_extra_fields() {
        let json = r#"{
            "status": "confirmed",
            "is_paid": true,
            "donation_id": "d-1",
            "amount": 5000.0,
            "alatpay_status": "completed"
        }"#;
        let confirmation: Confirmation = serde_json::from_str(json).unwrap();

        assert!(confirmation.is_paid);
        assert_eq!(confirmation.amount, Some(dec!(5000)));
        assert_eq!(
            confirmation.extra.get("alatpay_status"),
            Some(&Value::String("completed".to_string()))
        );
    }

    #[test]
    fn test_missing_is_paid_means_not_paid() {
        let confirmation: Confirmation =
            serde_json::from_str(r#"{"status": "pending"}"#).unwrap();
        assert!(!confirmation.is_paid);
    }

    #[test]
    fn test_check_error_classification() {
        assert!(CheckError::Transport("reset".into()).is_retryable());
        assert!(CheckError::from_status(503, "down").is_retryable());
        assert!(CheckError::from_status(429, "slow down").is_retryable());
        assert!(!CheckError::from_status(404, "Donation not found").is_retryable());
        assert!(!CheckError::Malformed("eof".into()).is_retryable());
    }
}
