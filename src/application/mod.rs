//! Application layer orchestrating the donation payment flow.
//!
//! `SessionInitiator` obtains a payment intent, `ConfirmationPoller` waits for
//! the backend to observe the bank transfer, and `DonationFlow` sequences the
//! two behind a small state machine.

pub mod flow;
pub mod initiator;
pub mod poller;
