use crate::error::PaymentError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::num::NonZeroU32;

/// Bank name shown when the payment provider does not return one.
pub const DEFAULT_BANK_NAME: &str = "Wema Bank";
/// Account name shown when the payment provider does not return one.
pub const DEFAULT_ACCOUNT_NAME: &str = "Bloom Foundation";

/// A positive, whole-unit donation amount.
///
/// Donations are collected in whole naira, so fractional values are rejected
/// together with zero and negative ones. On the wire the amount is an integer.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Deserialize)]
#[serde(try_from = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, PaymentError> {
        if value <= Decimal::ZERO {
            return Err(PaymentError::ValidationError(
                "Amount must be positive".to_string(),
            ));
        }
        if !value.fract().is_zero() {
            return Err(PaymentError::ValidationError(
                "Amount must be a whole number".to_string(),
            ));
        }
        Ok(Self(value.normalize()))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = PaymentError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<u64> for Amount {
    type Error = PaymentError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Self::new(Decimal::from(value))
    }
}

impl From<NonZeroU32> for Amount {
    fn from(value: NonZeroU32) -> Self {
        Self(Decimal::from(value.get()))
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self.0.to_u64() {
            Some(whole) => serializer.serialize_u64(whole),
            None => Err(serde::ser::Error::custom("amount out of range")),
        }
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque identifier issued by the payment backend for one intent.
///
/// It is the only key used when polling for confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Reference(String);

impl Reference {
    pub fn new(value: impl Into<String>) -> Result<Self, PaymentError> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(PaymentError::ValidationError(
                "Reference is required".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Reference {
    type Error = PaymentError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Reference> for String {
    fn from(reference: Reference) -> Self {
        reference.0
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the donor filled in before submitting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DonationRequest {
    pub amount: Amount,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub donor_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub donor_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub donor_phone: Option<String>,
    pub is_anonymous: bool,
}

impl DonationRequest {
    pub fn new(amount: Amount) -> Self {
        Self {
            amount,
            donor_name: None,
            donor_email: None,
            donor_phone: None,
            is_anonymous: false,
        }
    }

    pub fn donor_name(mut self, name: impl Into<String>) -> Self {
        self.donor_name = non_blank(name.into());
        self
    }

    pub fn donor_email(mut self, email: impl Into<String>) -> Self {
        self.donor_email = non_blank(email.into());
        self
    }

    pub fn donor_phone(mut self, phone: impl Into<String>) -> Self {
        self.donor_phone = non_blank(phone.into());
        self
    }

    pub fn anonymous(mut self, is_anonymous: bool) -> Self {
        self.is_anonymous = is_anonymous;
        self
    }

    /// Rejects donations below `minimum` before anything is sent.
    pub fn validate(&self, minimum: Decimal) -> Result<(), PaymentError> {
        if self.amount.value() < minimum {
            return Err(PaymentError::ValidationError(format!(
                "Minimum donation is {}",
                minimum.normalize()
            )));
        }
        Ok(())
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Destination account for the bank transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankDetails {
    pub bank_name: String,
    pub account_number: String,
    pub account_name: String,
}

/// A pending, server-issued donation awaiting out-of-band settlement.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentIntent {
    pub reference: Reference,
    pub amount: Amount,
    pub bank_details: BankDetails,
    pub donation_id: Option<String>,
    pub payment_url: Option<String>,
    /// Raw expiry as returned by the provider. Advisory only.
    pub expires_at: Option<String>,
}

impl PaymentIntent {
    /// Parsed expiry, if the provider sent an RFC 3339 timestamp.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_some_and(|expiry| expiry <= now)
    }
}
