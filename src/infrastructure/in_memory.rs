use crate::domain::confirmation::{CheckError, CheckResult, Confirmation, RecentDonation};
use crate::domain::intent::{
    Amount, BankDetails, DEFAULT_ACCOUNT_NAME, DEFAULT_BANK_NAME, DonationRequest, PaymentIntent,
    Reference,
};
use crate::domain::ports::PaymentGateway;
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;

const PLACEHOLDER_AMOUNT: NonZeroU32 = NonZeroU32::new(100).unwrap();

/// Canned answer for one confirmation check.
#[derive(Debug, Clone)]
pub enum ScriptedCheck {
    NotPaid,
    Paid,
    Fail(CheckError),
}

#[derive(Debug)]
struct Ledger {
    intent: PaymentIntent,
    donor_name: String,
    paid: bool,
    checks: usize,
    script: VecDeque<ScriptedCheck>,
}

/// A simulated payments backend.
///
/// Issues references `TX1`, `TX2`, ..., records every call, and settles an
/// intent when a scripted `Paid` check is reached, when `settle` is called, or
/// after `settle_after` checks. Unknown references are rejected with 404 like
/// the real API.
#[derive(Default, Clone)]
pub struct InMemoryGateway {
    ledgers: Arc<RwLock<HashMap<Reference, Ledger>>>,
    recent: Arc<RwLock<Vec<RecentDonation>>>,
    next_id: Arc<AtomicUsize>,
    initiate_calls: Arc<AtomicUsize>,
    confirm_calls: Arc<AtomicUsize>,
    recent_calls: Arc<AtomicUsize>,
    pending_initiation_failure: Arc<Mutex<Option<PaymentError>>>,
    settle_after: Option<usize>,
    check_latency: Duration,
}

impl InMemoryGateway {
    /// Creates a backend where nothing is paid until told otherwise.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every intent settles on its `checks`-th confirmation call.
    pub fn settle_after(mut self, checks: usize) -> Self {
        self.settle_after = Some(checks);
        self
    }

    /// Each confirmation call takes `latency` before answering.
    pub fn with_check_latency(mut self, latency: Duration) -> Self {
        self.check_latency = latency;
        self
    }

    /// Makes the next `initiate` call fail with `error`.
    pub fn fail_initiation(&self, error: PaymentError) {
        if let Ok(mut slot) = self.pending_initiation_failure.lock() {
            *slot = Some(error);
        }
    }

    /// Queues answers for `reference`. The intent is created if it does not
    /// exist yet so tests can poll a reference without initiating first.
    pub async fn script(
        &self,
        reference: &Reference,
        checks: impl IntoIterator<Item = ScriptedCheck>,
    ) {
        let mut ledgers = self.ledgers.write().await;
        let ledger = ledgers
            .entry(reference.clone())
            .or_insert_with(|| Ledger {
                intent: placeholder_intent(reference.clone()),
                donor_name: "Anonymous".to_string(),
                paid: false,
                checks: 0,
                script: VecDeque::new(),
            });
        ledger.script.extend(checks);
    }

    /// Marks `reference` as settled out of band.
    pub async fn settle(&self, reference: &Reference) -> bool {
        let mut ledgers = self.ledgers.write().await;
        match ledgers.get_mut(reference) {
            Some(ledger) => {
                if !ledger.paid {
                    ledger.paid = true;
                    self.record_recent(ledger).await;
                }
                true
            }
            None => false,
        }
    }

    pub async fn has_intent(&self, reference: &Reference) -> bool {
        self.ledgers.read().await.contains_key(reference)
    }

    pub fn initiate_calls(&self) -> usize {
        self.initiate_calls.load(Ordering::SeqCst)
    }

    pub fn confirm_calls(&self) -> usize {
        self.confirm_calls.load(Ordering::SeqCst)
    }

    pub fn recent_calls(&self) -> usize {
        self.recent_calls.load(Ordering::SeqCst)
    }

    async fn record_recent(&self, ledger: &Ledger) {
        let mut recent = self.recent.write().await;
        recent.insert(
            0,
            RecentDonation {
                id: ledger.intent.donation_id.clone(),
                donor_name: ledger.donor_name.clone(),
                amount_naira: ledger.intent.amount.value(),
                confirmed_at: None,
            },
        );
    }

    fn confirmation(ledger: &Ledger) -> Confirmation {
        Confirmation {
            is_paid: ledger.paid,
            status: Some(if ledger.paid { "confirmed" } else { "pending" }.to_string()),
            donation_id: ledger.intent.donation_id.clone(),
            amount: Some(ledger.intent.amount.value()),
            ..Confirmation::default()
        }
    }
}

fn placeholder_intent(reference: Reference) -> PaymentIntent {
    PaymentIntent {
        donation_id: Some(format!("donation-{}", reference)),
        reference,
        amount: Amount::from(PLACEHOLDER_AMOUNT),
        bank_details: bank_details(),
        payment_url: None,
        expires_at: None,
    }
}

fn bank_details() -> BankDetails {
    BankDetails {
        bank_name: DEFAULT_BANK_NAME.to_string(),
        account_number: "0123456789".to_string(),
        account_name: DEFAULT_ACCOUNT_NAME.to_string(),
    }
}

fn not_found() -> CheckError {
    CheckError::from_status(404, "Donation not found")
}

#[async_trait]
impl PaymentGateway for InMemoryGateway {
    async fn initiate(&self, request: &DonationRequest) -> Result<PaymentIntent> {
        self.initiate_calls.fetch_add(1, Ordering::SeqCst);
        let failure = self
            .pending_initiation_failure
            .lock()
            .ok()
            .and_then(|mut slot| slot.take());
        if let Some(error) = failure {
            return Err(error);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let reference = Reference::new(format!("TX{}", id))?;
        let intent = PaymentIntent {
            reference: reference.clone(),
            amount: request.amount,
            bank_details: bank_details(),
            donation_id: Some(format!("donation-{}", id)),
            payment_url: None,
            expires_at: None,
        };
        let donor_name = match (&request.donor_name, request.is_anonymous) {
            (Some(name), false) => name.clone(),
            _ => "Anonymous".to_string(),
        };

        let mut ledgers = self.ledgers.write().await;
        ledgers.insert(
            reference,
            Ledger {
                intent: intent.clone(),
                donor_name,
                paid: false,
                checks: 0,
                script: VecDeque::new(),
            },
        );
        Ok(intent)
    }

    async fn confirm(&self, reference: &Reference) -> CheckResult<Confirmation> {
        self.confirm_calls.fetch_add(1, Ordering::SeqCst);
        if !self.check_latency.is_zero() {
            tokio::time::sleep(self.check_latency).await;
        }

        let mut ledgers = self.ledgers.write().await;
        let ledger = ledgers.get_mut(reference).ok_or_else(not_found)?;
        ledger.checks += 1;

        match ledger.script.pop_front() {
            Some(ScriptedCheck::Fail(error)) => return Err(error),
            Some(ScriptedCheck::Paid) => ledger.paid = true,
            Some(ScriptedCheck::NotPaid) => {}
            None => {
                if self.settle_after.is_some_and(|n| ledger.checks >= n) {
                    ledger.paid = true;
                }
            }
        }

        if ledger.paid && !self.recent_contains(ledger).await {
            self.record_recent(ledger).await;
        }
        Ok(Self::confirmation(ledger))
    }

    async fn status(&self, reference: &Reference) -> CheckResult<Confirmation> {
        let ledgers = self.ledgers.read().await;
        ledgers
            .get(reference)
            .map(Self::confirmation)
            .ok_or_else(not_found)
    }

    async fn recent_donations(&self) -> Result<Vec<RecentDonation>> {
        self.recent_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.recent.read().await.clone())
    }
}

impl InMemoryGateway {
    async fn recent_contains(&self, ledger: &Ledger) -> bool {
        self.recent
            .read()
            .await
            .iter()
            .any(|d| d.id == ledger.intent.donation_id)
    }
}
