use crate::domain::confirmation::{CheckError, Confirmation};
use crate::domain::intent::Reference;
use crate::domain::ports::PaymentGatewayRef;
use crate::error::{PaymentError, Result};
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Timing of one polling run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Total time budget for the run.
    pub max_duration: Duration,
    /// Delay between the end of one check and the start of the next.
    pub interval: Duration,
}

impl PollConfig {
    pub fn new(max_duration: Duration, interval: Duration) -> Result<Self> {
        let config = Self {
            max_duration,
            interval,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval.is_zero() || self.max_duration.is_zero() {
            return Err(PaymentError::ConfigError(
                "Polling interval and duration must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Upper bound on the number of checks a run can issue.
    pub fn max_attempts(&self) -> u32 {
        let ratio = self.max_duration.as_nanos() / self.interval.as_nanos();
        u32::try_from(ratio.max(1)).unwrap_or(u32::MAX)
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_duration: Duration::from_secs(20),
            interval: Duration::from_secs(2),
        }
    }
}

/// Reported to the progress callback right before each check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollProgress {
    pub attempts: u32,
    pub elapsed: Duration,
    pub max_duration: Duration,
}

impl PollProgress {
    /// Elapsed share of the time budget, capped at 100.
    pub fn percent(&self) -> f64 {
        let ratio = self.elapsed.as_secs_f64() / self.max_duration.as_secs_f64();
        (ratio * 100.0).min(100.0)
    }
}

/// How a polling run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Confirmed {
        attempts: u32,
        confirmation: Confirmation,
    },
    /// The budget ran out without settlement being observed. Not a failure:
    /// the transfer may still settle later.
    TimedOut {
        attempts: u32,
        elapsed: Duration,
        /// Most recent check that produced no answer, if any.
        last_error: Option<CheckError>,
    },
    Cancelled {
        attempts: u32,
    },
}

impl PollOutcome {
    pub fn attempts(&self) -> u32 {
        match self {
            PollOutcome::Confirmed { attempts, .. }
            | PollOutcome::TimedOut { attempts, .. }
            | PollOutcome::Cancelled { attempts } => *attempts,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, PollOutcome::Confirmed { .. })
    }
}

/// Bookkeeping for a single run.
///
/// `active` flips to false exactly once, through `finish`.
#[derive(Debug)]
struct PollState {
    attempts: u32,
    started: Instant,
    active: bool,
}

impl PollState {
    fn start() -> Self {
        Self {
            attempts: 0,
            started: Instant::now(),
            active: true,
        }
    }

    fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    fn finish(&mut self) {
        debug_assert!(self.active, "polling run finished twice");
        self.active = false;
    }
}

/// Repeatedly asks the backend whether a transfer has been reconciled.
///
/// Checks are strictly sequential: the next one is only issued after the
/// previous one returned and the interval elapsed.
pub struct ConfirmationPoller {
    gateway: PaymentGatewayRef,
    config: PollConfig,
}

impl ConfirmationPoller {
    pub fn new(gateway: PaymentGatewayRef, config: PollConfig) -> Self {
        Self { gateway, config }
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Polls until `reference` is confirmed, the time budget is spent, or
    /// `cancel` fires.
    ///
    /// Cancellation is observed before each check, right after each check
    /// returns (the in-flight result is then dropped) and during each wait.
    /// Failed checks are logged and do not end the run. At most
    /// [`PollConfig::max_attempts`] checks are issued; once they are spent the
    /// run waits out the rest of the budget and times out.
    pub async fn poll<F>(
        &self,
        reference: &Reference,
        cancel: &CancellationToken,
        mut on_progress: F,
    ) -> Result<PollOutcome>
    where
        F: FnMut(PollProgress) + Send,
    {
        self.config.validate()?;

        let mut state = PollState::start();
        let mut last_error = None;
        let max_attempts = self.config.max_attempts();
        info!(%reference, max_duration = ?self.config.max_duration, max_attempts, "Polling for confirmation");

        while state.elapsed() < self.config.max_duration && state.attempts < max_attempts {
            if cancel.is_cancelled() {
                return Ok(self.cancelled(&mut state));
            }

            state.attempts += 1;
            on_progress(PollProgress {
                attempts: state.attempts,
                elapsed: state.elapsed(),
                max_duration: self.config.max_duration,
            });
            debug!(%reference, attempt = state.attempts, "Checking payment status");

            let result = self.gateway.confirm(reference).await;

            if cancel.is_cancelled() {
                debug!(%reference, "Discarding check result after cancellation");
                return Ok(self.cancelled(&mut state));
            }

            match result {
                Ok(confirmation) if confirmation.is_paid => {
                    state.finish();
                    info!(%reference, attempts = state.attempts, "Payment confirmed");
                    return Ok(PollOutcome::Confirmed {
                        attempts: state.attempts,
                        confirmation,
                    });
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(
                        %reference,
                        attempt = state.attempts,
                        retryable = e.is_retryable(),
                        "Status check failed: {}",
                        e
                    );
                    last_error = Some(e);
                }
            }

            let remaining = self.config.max_duration.saturating_sub(state.elapsed());
            if remaining.is_zero() {
                break;
            }
            // Out of checks: sit out the rest of the budget, still cancellable.
            let wait = if state.attempts >= max_attempts {
                remaining
            } else {
                self.config.interval.min(remaining)
            };
            tokio::select! {
                _ = cancel.cancelled() => return Ok(self.cancelled(&mut state)),
                _ = sleep(wait) => {}
            }
        }

        state.finish();
        let elapsed = state.elapsed();
        info!(%reference, attempts = state.attempts, ?elapsed, "Payment not yet confirmed");
        Ok(PollOutcome::TimedOut {
            attempts: state.attempts,
            elapsed,
            last_error,
        })
    }

    fn cancelled(&self, state: &mut PollState) -> PollOutcome {
        state.finish();
        info!(attempts = state.attempts, "Polling cancelled");
        PollOutcome::Cancelled {
            attempts: state.attempts,
        }
    }
}
