use super::render;
use crate::application::flow::{DonationFlow, FlowState};
use crate::application::poller::PollOutcome;
use crate::domain::intent::DonationRequest;
use crate::error::{PaymentError, Result};
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tokio_util::sync::CancellationToken;
use tracing::debug;

const TRANSFER_PROMPT: &str =
    "Type 'sent' once you have made the transfer, or 'cancel' to start over:";
const TIMEOUT_PROMPT: &str =
    "Type 'retry' to check again, 'new' to start a new donation, or 'quit':";

/// How an interactive donation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    Confirmed,
    /// The donation was not accepted. The reason has already been shown.
    Rejected,
    /// The donor stopped waiting; the intent may still settle later.
    Pending,
    /// The donor cancelled or chose to start over.
    Abandoned,
    /// Interrupted from outside (Ctrl-C).
    Interrupted,
}

impl SessionEnd {
    pub fn exit_code(&self) -> u8 {
        match self {
            SessionEnd::Confirmed => 0,
            SessionEnd::Rejected => 1,
            SessionEnd::Pending => 2,
            SessionEnd::Abandoned => 3,
            SessionEnd::Interrupted => 130,
        }
    }
}

enum Choice {
    Primary,
    Secondary,
    Quit,
}

/// Drives a [`DonationFlow`] from line-oriented input.
pub struct TerminalSession<R, W> {
    lines: Lines<R>,
    output: W,
    shutdown: CancellationToken,
}

impl<R, W> TerminalSession<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: Write + Send,
{
    pub fn new(input: R, output: W, shutdown: CancellationToken) -> Self {
        Self {
            lines: input.lines(),
            output,
            shutdown,
        }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    /// Submits `request` and walks the donor through transfer and confirmation.
    ///
    /// A rejected submission is reported to the donor here and ends the
    /// session with [`SessionEnd::Rejected`].
    pub async fn run(
        &mut self,
        flow: &mut DonationFlow,
        request: DonationRequest,
    ) -> Result<SessionEnd> {
        if let Err(e) = flow.submit(request).await {
            writeln!(self.output, "{}", e.user_message())?;
            return Ok(SessionEnd::Rejected);
        }

        loop {
            match flow.state().clone() {
                FlowState::Transfer(intent) => {
                    render::transfer(&mut self.output, &intent)?;
                    let choice = self
                        .ask(TRANSFER_PROMPT, &["sent", "s"], &["cancel", "c"])
                        .await?;
                    match choice {
                        Choice::Primary => {
                            let outcome = self.confirm(flow).await?;
                            if let PollOutcome::Cancelled { .. } = outcome {
                                writeln!(self.output, "Stopped checking payment status.")?;
                                render::pending_reference(&mut self.output, &intent.reference)?;
                                return Ok(SessionEnd::Interrupted);
                            }
                        }
                        Choice::Secondary => {
                            flow.cancel()?;
                            return Ok(SessionEnd::Abandoned);
                        }
                        Choice::Quit => {
                            flow.start_over();
                            return Ok(self.quit_end());
                        }
                    }
                }
                FlowState::Timeout(intent) => {
                    let choice = self
                        .ask(TIMEOUT_PROMPT, &["retry", "r"], &["new", "n"])
                        .await?;
                    match choice {
                        Choice::Primary => {
                            flow.check_again()?;
                        }
                        Choice::Secondary => {
                            flow.start_over();
                            return Ok(SessionEnd::Abandoned);
                        }
                        Choice::Quit => {
                            render::pending_reference(&mut self.output, &intent.reference)?;
                            return Ok(if self.shutdown.is_cancelled() {
                                SessionEnd::Interrupted
                            } else {
                                SessionEnd::Pending
                            });
                        }
                    }
                }
                FlowState::Confirmed {
                    amount,
                    confirmation,
                } => {
                    render::confirmed(&mut self.output, amount, &confirmation)?;
                    render::recent_donations(&mut self.output, flow.recent_donations())?;
                    return Ok(SessionEnd::Confirmed);
                }
                FlowState::Form { .. } => return Ok(SessionEnd::Abandoned),
                FlowState::Polling(_) => {
                    return Err(PaymentError::InvalidTransition {
                        state: "polling",
                        action: "prompt the donor",
                    });
                }
            }
        }
    }

    async fn confirm(&mut self, flow: &mut DonationFlow) -> Result<PollOutcome> {
        let output = &mut self.output;
        let outcome = flow
            .confirm_transfer(|progress| {
                if let Err(e) = render::progress(output, &progress) {
                    debug!("Failed to write progress: {}", e);
                }
            })
            .await?;
        if let PollOutcome::TimedOut { .. } = outcome {
            render::not_yet_confirmed(&mut self.output, &outcome)?;
        }
        Ok(outcome)
    }

    fn quit_end(&self) -> SessionEnd {
        if self.shutdown.is_cancelled() {
            SessionEnd::Interrupted
        } else {
            SessionEnd::Abandoned
        }
    }

    /// Reads answers until one matches. End of input or shutdown counts as quit.
    async fn ask(
        &mut self,
        question: &str,
        primary: &[&str],
        secondary: &[&str],
    ) -> Result<Choice> {
        loop {
            writeln!(self.output, "{}", question)?;
            self.output.flush()?;

            let line = tokio::select! {
                _ = self.shutdown.cancelled() => return Ok(Choice::Quit),
                line = self.lines.next_line() => line?,
            };
            let Some(line) = line else {
                return Ok(Choice::Quit);
            };

            let answer = line.trim().to_lowercase();
            if primary.contains(&answer.as_str()) {
                return Ok(Choice::Primary);
            }
            if secondary.contains(&answer.as_str()) {
                return Ok(Choice::Secondary);
            }
            if matches!(answer.as_str(), "quit" | "q") {
                return Ok(Choice::Quit);
            }
            writeln!(self.output, "Sorry, '{}' is not one of the options.", line.trim())?;
        }
    }
}
