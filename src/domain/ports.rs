use super::confirmation::{CheckResult, Confirmation, RecentDonation};
use super::intent::{DonationRequest, PaymentIntent, Reference};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// The remote payments API as seen by the donation flow.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates a payment intent and returns its transfer instructions.
    async fn initiate(&self, request: &DonationRequest) -> Result<PaymentIntent>;

    /// Asks the backend to reconcile `reference` and report whether it is paid.
    ///
    /// Must be safe to call any number of times with the same reference.
    async fn confirm(&self, reference: &Reference) -> CheckResult<Confirmation>;

    /// Read-only status lookup.
    async fn status(&self, reference: &Reference) -> CheckResult<Confirmation>;

    async fn recent_donations(&self) -> Result<Vec<RecentDonation>>;
}

pub type PaymentGatewayRef = Arc<dyn PaymentGateway>;
