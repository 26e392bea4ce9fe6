use super::initiator::SessionInitiator;
use super::poller::{ConfirmationPoller, PollOutcome, PollProgress};
use crate::config::ClientConfig;
use crate::domain::confirmation::{Confirmation, RecentDonation};
use crate::domain::intent::{Amount, DonationRequest, PaymentIntent};
use crate::domain::ports::PaymentGatewayRef;
use crate::error::{PaymentError, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Where the donor currently is in the donation flow.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowState {
    /// Entering donation details. Carries the last initiation error, if any.
    Form { error: Option<String> },
    /// Showing transfer instructions for the issued intent.
    Transfer(PaymentIntent),
    /// Waiting for the backend to observe the transfer.
    Polling(PaymentIntent),
    /// Settlement observed. The intent has been let go.
    Confirmed {
        amount: Amount,
        confirmation: Confirmation,
    },
    /// Budget spent without settlement. The intent is kept for another try.
    Timeout(PaymentIntent),
}

impl FlowState {
    fn form() -> Self {
        FlowState::Form { error: None }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FlowState::Form { .. } => "form",
            FlowState::Transfer(_) => "transfer",
            FlowState::Polling(_) => "polling",
            FlowState::Confirmed { .. } => "confirmed",
            FlowState::Timeout(_) => "timeout",
        }
    }

    /// The intent held in this state, if any.
    pub fn intent(&self) -> Option<&PaymentIntent> {
        match self {
            FlowState::Transfer(intent) | FlowState::Polling(intent) | FlowState::Timeout(intent) => {
                Some(intent)
            }
            FlowState::Form { .. } | FlowState::Confirmed { .. } => None,
        }
    }
}

/// Sequences initiation, transfer instructions, and confirmation polling.
///
/// Every transition takes `&mut self`, so a second polling run cannot start
/// while one is in progress. Cancellation from elsewhere goes through
/// [`DonationFlow::cancel_token`].
pub struct DonationFlow {
    gateway: PaymentGatewayRef,
    initiator: SessionInitiator,
    poller: ConfirmationPoller,
    state: FlowState,
    shutdown: CancellationToken,
    run: CancellationToken,
    recent_donations: Vec<RecentDonation>,
}

impl DonationFlow {
    pub fn new(gateway: PaymentGatewayRef, config: &ClientConfig) -> Self {
        let shutdown = CancellationToken::new();
        Self {
            initiator: SessionInitiator::new(gateway.clone(), config.minimum_donation),
            poller: ConfirmationPoller::new(gateway.clone(), config.poll),
            gateway,
            state: FlowState::form(),
            run: shutdown.child_token(),
            shutdown,
            recent_donations: Vec::new(),
        }
    }

    /// Ties the flow to a parent token. Cancelling it cancels the current
    /// polling run and every later one.
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.run = shutdown.child_token();
        self.shutdown = shutdown;
        self
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    pub fn poller(&self) -> &ConfirmationPoller {
        &self.poller
    }

    /// Recent confirmed donations, as of the last confirmation.
    pub fn recent_donations(&self) -> &[RecentDonation] {
        &self.recent_donations
    }

    /// Token observed by the current (or next) polling run.
    pub fn cancel_token(&self) -> CancellationToken {
        self.run.clone()
    }

    /// Submits the donation form. Allowed from `form` and after a confirmed
    /// donation; on failure the flow stays on the form with the error attached.
    pub async fn submit(&mut self, request: DonationRequest) -> Result<PaymentIntent> {
        if !matches!(self.state, FlowState::Form { .. } | FlowState::Confirmed { .. }) {
            return Err(self.invalid("submit a donation"));
        }

        match self.initiator.initiate(&request).await {
            Ok(intent) => {
                self.transition(FlowState::Transfer(intent.clone()));
                Ok(intent)
            }
            Err(e) => {
                self.transition(FlowState::Form {
                    error: Some(e.user_message()),
                });
                Err(e)
            }
        }
    }

    /// "I have sent the money": polls until the outcome is known.
    ///
    /// `on_progress` is called before every status check.
    pub async fn confirm_transfer<F>(&mut self, on_progress: F) -> Result<PollOutcome>
    where
        F: FnMut(PollProgress) + Send,
    {
        let intent = match &self.state {
            FlowState::Transfer(intent) => intent.clone(),
            _ => return Err(self.invalid("confirm the transfer")),
        };
        self.transition(FlowState::Polling(intent.clone()));

        let polled = self
            .poller
            .poll(&intent.reference, &self.run, on_progress)
            .await;
        let outcome = match polled {
            Ok(outcome) => outcome,
            Err(e) => {
                self.transition(FlowState::Transfer(intent));
                return Err(e);
            }
        };

        match &outcome {
            PollOutcome::Confirmed { confirmation, .. } => {
                self.transition(FlowState::Confirmed {
                    amount: intent.amount,
                    confirmation: confirmation.clone(),
                });
                self.refresh_recent_donations().await;
            }
            PollOutcome::TimedOut { .. } => self.transition(FlowState::Timeout(intent)),
            PollOutcome::Cancelled { .. } => {
                self.renew_run_token();
                self.transition(FlowState::form());
            }
        }
        Ok(outcome)
    }

    /// "Check again" after a timeout. Reuses the same intent and reference.
    pub fn check_again(&mut self) -> Result<&PaymentIntent> {
        let intent = match &self.state {
            FlowState::Timeout(intent) => intent.clone(),
            _ => return Err(self.invalid("check again")),
        };
        self.transition(FlowState::Transfer(intent));
        self.state
            .intent()
            .ok_or_else(|| self.invalid("check again"))
    }

    /// Abandons the transfer screen, discarding the intent.
    pub fn cancel(&mut self) -> Result<()> {
        if !matches!(self.state, FlowState::Transfer(_) | FlowState::Polling(_)) {
            return Err(self.invalid("cancel"));
        }
        self.start_over();
        Ok(())
    }

    /// Back to an empty form from anywhere. Any active run is cancelled and
    /// the intent, if one is held, is dropped. Nothing is sent to the server.
    pub fn start_over(&mut self) {
        self.run.cancel();
        self.renew_run_token();
        self.transition(FlowState::form());
    }

    async fn refresh_recent_donations(&mut self) {
        match self.gateway.recent_donations().await {
            Ok(donations) => self.recent_donations = donations,
            Err(e) => warn!("Failed to refresh recent donations: {}", e),
        }
    }

    fn renew_run_token(&mut self) {
        if self.run.is_cancelled() {
            self.run = self.shutdown.child_token();
        }
    }

    fn transition(&mut self, next: FlowState) {
        info!(from = self.state.name(), to = next.name(), "Flow transition");
        self.state = next;
    }

    fn invalid(&self, action: &'static str) -> PaymentError {
        PaymentError::InvalidTransition {
            state: self.state.name(),
            action,
        }
    }
}
