use crate::application::poller::PollConfig;
use crate::error::{PaymentError, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::time::Duration;
use url::Url;

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api/";
pub const DEFAULT_MINIMUM_DONATION: Decimal = dec!(100);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything the client needs to talk to the payments API.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the API. Always ends with `/`.
    pub api_url: Url,
    pub api_token: Option<String>,
    pub request_timeout: Duration,
    pub minimum_donation: Decimal,
    pub poll: PollConfig,
}

impl ClientConfig {
    pub fn new(api_url: &str) -> Result<Self> {
        Ok(Self {
            api_url: normalize_base_url(api_url)?,
            ..Self::default()
        })
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.api_token = token.filter(|t| !t.trim().is_empty());
        self
    }

    pub fn with_minimum_donation(mut self, minimum: Decimal) -> Result<Self> {
        if minimum <= Decimal::ZERO {
            return Err(PaymentError::ConfigError(
                "Minimum donation must be positive".to_string(),
            ));
        }
        self.minimum_donation = minimum;
        Ok(self)
    }

    pub fn with_poll(mut self, poll: PollConfig) -> Result<Self> {
        poll.validate()?;
        self.poll = poll;
        Ok(self)
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: Url::parse(DEFAULT_API_URL).expect("default API URL is valid"),
            api_token: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            minimum_donation: DEFAULT_MINIMUM_DONATION,
            poll: PollConfig::default(),
        }
    }
}

/// Parses `raw` and makes sure relative endpoint paths join underneath it.
pub fn normalize_base_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw.trim())
        .map_err(|e| PaymentError::ConfigError(format!("Invalid API URL '{}': {}", raw, e)))?;
    if url.cannot_be_a_base() {
        return Err(PaymentError::ConfigError(format!(
            "API URL '{}' cannot be used as a base",
            raw
        )));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
