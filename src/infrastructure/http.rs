//! `reqwest` implementation of the payment gateway.
//!
//! Every endpoint answers with a `{ success, data, message }` envelope. A
//! non-2xx status or `success: false` is treated as a rejection and the
//! server's `message` is kept for the donor.

use crate::config::ClientConfig;
use crate::domain::confirmation::{CheckError, CheckResult, Confirmation, RecentDonation};
use crate::domain::intent::{
    Amount, BankDetails, DEFAULT_ACCOUNT_NAME, DEFAULT_BANK_NAME, DonationRequest, PaymentIntent,
    Reference,
};
use crate::domain::ports::PaymentGateway;
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;
use url::Url;

const INITIATE_PATH: &str = "payments/initiate/";
const CONFIRM_PATH: &str = "payments/confirm/";
const STATUS_PATH: &str = "payments/status/";
const RECENT_DONATIONS_PATH: &str = "tokens/donations/recent/";

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    data: Option<T>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InitiateData {
    reference: Reference,
    amount: Decimal,
    #[serde(default)]
    bank_name: Option<String>,
    #[serde(default)]
    account_number: Option<String>,
    #[serde(default)]
    account_name: Option<String>,
    #[serde(default)]
    payment_url: Option<String>,
    #[serde(default)]
    expires_at: Option<String>,
    #[serde(default)]
    donation_id: Option<String>,
}

impl TryFrom<InitiateData> for PaymentIntent {
    type Error = PaymentError;

    fn try_from(data: InitiateData) -> Result<Self> {
        let amount = Amount::new(data.amount).map_err(|e| {
            PaymentError::InitiationError(format!(
                "Payment API returned an invalid amount ({}): {}",
                data.amount,
                e.user_message()
            ))
        })?;
        let account_number = data
            .account_number
            .filter(|number| !number.trim().is_empty())
            .ok_or_else(|| {
                PaymentError::InitiationError(
                    "Payment provider did not return an account number".to_string(),
                )
            })?;

        Ok(PaymentIntent {
            reference: data.reference,
            amount,
            bank_details: BankDetails {
                bank_name: data
                    .bank_name
                    .unwrap_or_else(|| DEFAULT_BANK_NAME.to_string()),
                account_number,
                account_name: data
                    .account_name
                    .unwrap_or_else(|| DEFAULT_ACCOUNT_NAME.to_string()),
            },
            donation_id: data.donation_id,
            payment_url: data.payment_url,
            expires_at: data.expires_at,
        })
    }
}

/// Why an envelope did not carry usable data.
#[derive(Debug)]
enum EnvelopeError {
    Status { status: u16, message: String },
    Rejected { status: u16, message: String },
    Malformed(String),
}

impl From<EnvelopeError> for CheckError {
    fn from(error: EnvelopeError) -> Self {
        match error {
            EnvelopeError::Status { status, message } => CheckError::from_status(status, message),
            EnvelopeError::Rejected { status, message } => CheckError::Rejected { status, message },
            EnvelopeError::Malformed(reason) => CheckError::Malformed(reason),
        }
    }
}

impl From<EnvelopeError> for PaymentError {
    fn from(error: EnvelopeError) -> Self {
        match error {
            EnvelopeError::Status { status, message }
            | EnvelopeError::Rejected { status, message } => {
                PaymentError::ApiError { status, message }
            }
            EnvelopeError::Malformed(reason) => PaymentError::MalformedResponse(reason),
        }
    }
}

/// Gateway talking to the Bloom REST API.
pub struct HttpPaymentGateway {
    base_url: Url,
    api_token: Option<String>,
    client: Client,
}

impl HttpPaymentGateway {
    /// Builds a gateway with its own HTTP client.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self::with_client(config.api_url.clone(), client).with_token(config.api_token.clone()))
    }

    /// Uses an existing client. `base_url` should end with `/`.
    pub fn with_client(base_url: Url, client: Client) -> Self {
        Self {
            base_url,
            api_token: None,
            client,
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.api_token = token;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> std::result::Result<Url, url::ParseError> {
        self.base_url.join(path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn check(&self, request: RequestBuilder) -> CheckResult<Confirmation> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| CheckError::Transport(e.to_string()))?;
        let data = read_envelope::<Confirmation>(response)
            .await
            .map_err(|e| CheckError::Transport(e.to_string()))??;
        data.ok_or_else(|| CheckError::Malformed("response has no data".to_string()))
    }
}

/// Reads the body and unwraps the envelope.
///
/// The outer error is a transport failure while reading the body; the inner
/// one describes what was wrong with the envelope.
async fn read_envelope<T: DeserializeOwned>(
    response: Response,
) -> reqwest::Result<std::result::Result<Option<T>, EnvelopeError>> {
    let status = response.status();
    let body = response.bytes().await?;

    if !status.is_success() {
        let message = serde_json::from_slice::<Envelope<Value>>(&body)
            .ok()
            .and_then(|envelope| envelope.message)
            .or_else(|| status.canonical_reason().map(str::to_string))
            .unwrap_or_else(|| "Unknown error".to_string());
        return Ok(Err(EnvelopeError::Status {
            status: status.as_u16(),
            message,
        }));
    }

    let envelope = match serde_json::from_slice::<Envelope<T>>(&body) {
        Ok(envelope) => envelope,
        Err(e) => return Ok(Err(EnvelopeError::Malformed(e.to_string()))),
    };
    if !envelope.success {
        return Ok(Err(EnvelopeError::Rejected {
            status: status.as_u16(),
            message: envelope
                .message
                .unwrap_or_else(|| "Request was not successful".to_string()),
        }));
    }
    Ok(Ok(envelope.data))
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn initiate(&self, request: &DonationRequest) -> Result<PaymentIntent> {
        let url = self
            .endpoint(INITIATE_PATH)
            .map_err(|e| PaymentError::ConfigError(e.to_string()))?;
        debug!(%url, amount = %request.amount, "Initiating payment");

        let response = self
            .authorized(self.client.post(url))
            .json(request)
            .send()
            .await?;
        let data = read_envelope::<InitiateData>(response).await??;

        let data = data.ok_or_else(|| {
            PaymentError::InitiationError("Payment API returned no transfer details".to_string())
        })?;
        PaymentIntent::try_from(data)
    }

    async fn confirm(&self, reference: &Reference) -> CheckResult<Confirmation> {
        let url = self
            .endpoint(CONFIRM_PATH)
            .map_err(|e| CheckError::Malformed(e.to_string()))?;
        self.check(self.client.post(url).json(&json!({ "reference": reference })))
            .await
    }

    async fn status(&self, reference: &Reference) -> CheckResult<Confirmation> {
        let mut url = self
            .endpoint(STATUS_PATH)
            .map_err(|e| CheckError::Malformed(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| CheckError::Malformed("API URL cannot be a base".to_string()))?
            .pop_if_empty()
            .push(reference.as_str())
            .push("");
        self.check(self.client.get(url)).await
    }

    async fn recent_donations(&self) -> Result<Vec<RecentDonation>> {
        let url = self
            .endpoint(RECENT_DONATIONS_PATH)
            .map_err(|e| PaymentError::ConfigError(e.to_string()))?;
        let response = self.authorized(self.client.get(url)).send().await?;
        let data = read_envelope::<Vec<RecentDonation>>(response).await??;
        Ok(data.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::normalize_base_url;

    fn gateway(base: &str) -> HttpPaymentGateway {
        HttpPaymentGateway::with_client(normalize_base_url(base).unwrap(), Client::new())
    }

    #[test]
    fn test_endpoints_join_under_base_path() {
        let gateway = gateway("https://bloom.example/api");
        assert_eq!(
            gateway.endpoint(INITIATE_PATH).unwrap().as_str(),
            "https://bloom.example/api/payments/initiate/"
        );
        assert_eq!(
            gateway.endpoint(RECENT_DONATIONS_PATH).unwrap().as_str(),
            "https://bloom.example/api/tokens/donations/recent/"
        );
    }

    #[test]
    fn test_initiate_data_falls_back_to_default_bank() {
        let data: InitiateData = serde_json::from_value(json!({
            "reference": "TX1",
            "amount": 5000.0,
            "account_number": "0123456789",
        }))
        .unwrap();
        let intent = PaymentIntent::try_from(data).unwrap();

        assert_eq!(intent.bank_details.bank_name, DEFAULT_BANK_NAME);
        assert_eq!(intent.bank_details.account_name, DEFAULT_ACCOUNT_NAME);
        assert_eq!(intent.reference.as_str(), "TX1");
    }

    #[test]
    fn test_fractional_amount_is_reported() {
        let data: InitiateData = serde_json::from_value(json!({
            "reference": "TX1",
            "amount": 5000.5,
            "account_number": "0123456789",
        }))
        .unwrap();

        let err = PaymentIntent::try_from(data).unwrap_err();
        assert_eq!(
            err.user_message(),
            "Payment API returned an invalid amount (5000.5): Amount must be a whole number"
        );
    }

    #[test]
    fn test_initiate_data_requires_account_number() {
        let data: InitiateData = serde_json::from_value(json!({
            "reference": "TX1",
            "amount": 5000,
            "account_number": null,
        }))
        .unwrap();
        assert!(matches!(
            PaymentIntent::try_from(data),
            Err(PaymentError::InitiationError(_))
        ));
    }

    #[test]
    fn test_envelope_errors_map_to_check_errors() {
        let outage: CheckError = EnvelopeError::Status {
            status: 502,
            message: "Bad Gateway".to_string(),
        }
        .into();
        assert!(outage.is_retryable());

        let rejected: CheckError = EnvelopeError::Rejected {
            status: 200,
            message: "Reference is required".to_string(),
        }
        .into();
        assert!(!rejected.is_retryable());
    }
}
