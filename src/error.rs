use thiserror::Error;

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Initiation failed: {0}")]
    InitiationError(String),
    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("Cannot {action} while in the {state} state")]
    InvalidTransition {
        state: &'static str,
        action: &'static str,
    },
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl PaymentError {
    /// Message suitable for showing to the donor.
    pub fn user_message(&self) -> String {
        match self {
            PaymentError::ValidationError(msg) | PaymentError::InitiationError(msg) => {
                msg.clone()
            }
            PaymentError::ApiError { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PaymentError>;
