use crate::domain::intent::{DonationRequest, PaymentIntent};
use crate::domain::ports::PaymentGatewayRef;
use crate::error::{PaymentError, Result};
use rust_decimal::Decimal;
use tracing::{info, warn};

const GENERIC_FAILURE: &str = "Failed to initiate payment";

/// Turns a donation request into a server-issued payment intent.
///
/// One call is one attempt; nothing is retried here.
pub struct SessionInitiator {
    gateway: PaymentGatewayRef,
    minimum_donation: Decimal,
}

impl SessionInitiator {
    pub fn new(gateway: PaymentGatewayRef, minimum_donation: Decimal) -> Self {
        Self {
            gateway,
            minimum_donation,
        }
    }

    pub fn minimum_donation(&self) -> Decimal {
        self.minimum_donation
    }

    pub async fn initiate(&self, request: &DonationRequest) -> Result<PaymentIntent> {
        request.validate(self.minimum_donation)?;

        match self.gateway.initiate(request).await {
            Ok(intent) => {
                info!(reference = %intent.reference, amount = %intent.amount, "Payment initiated");
                Ok(intent)
            }
            Err(e) => {
                warn!("Payment initiation failed: {}", e);
                Err(PaymentError::InitiationError(initiation_message(e)))
            }
        }
    }
}

fn initiation_message(error: PaymentError) -> String {
    match error {
        PaymentError::ApiError { message, .. } | PaymentError::InitiationError(message)
            if !message.trim().is_empty() =>
        {
            message
        }
        PaymentError::ValidationError(message) => message,
        _ => GENERIC_FAILURE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::intent::Amount;
    use crate::infrastructure::in_memory::InMemoryGateway;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn request(amount: u64) -> DonationRequest {
        DonationRequest::new(Amount::try_from(amount).unwrap())
    }

    #[tokio::test]
    async fn test_below_minimum_never_reaches_gateway() {
        let gateway = Arc::new(InMemoryGateway::new());
        let initiator = SessionInitiator::new(gateway.clone(), dec!(100));

        let result = initiator.initiate(&request(50)).await;

        assert!(matches!(result, Err(PaymentError::ValidationError(_))));
        assert_eq!(gateway.initiate_calls(), 0);
    }

    #[tokio::test]
    async fn test_success_returns_remote_reference() {
        let gateway = Arc::new(InMemoryGateway::new());
        let initiator = SessionInitiator::new(gateway.clone(), dec!(100));

        let intent = initiator.initiate(&request(5000)).await.unwrap();

        assert_eq!(intent.amount.value(), dec!(5000));
        assert!(gateway.has_intent(&intent.reference).await);
    }

    #[tokio::test]
    async fn test_remote_rejection_surfaces_server_message() {
        let gateway = Arc::new(InMemoryGateway::new());
        gateway.fail_initiation(PaymentError::ApiError {
            status: 400,
            message: "Minimum donation is ₦100".to_string(),
        });
        let initiator = SessionInitiator::new(gateway.clone(), dec!(100));

        let err = initiator.initiate(&request(5000)).await.unwrap_err();

        assert!(matches!(err, PaymentError::InitiationError(ref m) if m == "Minimum donation is ₦100"));
        assert_eq!(gateway.initiate_calls(), 1);
    }

    #[tokio::test]
    async fn test_transport_failure_uses_generic_message() {
        let gateway = Arc::new(InMemoryGateway::new());
        gateway.fail_initiation(PaymentError::IoError(std::io::Error::other("reset")));
        let initiator = SessionInitiator::new(gateway, dec!(100));

        let err = initiator.initiate(&request(5000)).await.unwrap_err();

        assert_eq!(err.user_message(), GENERIC_FAILURE);
    }
}
