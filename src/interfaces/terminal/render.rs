use crate::application::poller::{PollOutcome, PollProgress};
use crate::domain::confirmation::{Confirmation, RecentDonation};
use crate::domain::intent::{Amount, PaymentIntent, Reference};
use std::io::{self, Write};

/// How many recent donations are listed after a confirmation.
const RECENT_DONATIONS_SHOWN: usize = 5;

pub fn transfer<W: Write>(out: &mut W, intent: &PaymentIntent) -> io::Result<()> {
    let bank = &intent.bank_details;
    writeln!(out, "Transfer exactly ₦{} to:", intent.amount)?;
    writeln!(out, "  Bank:           {}", bank.bank_name)?;
    writeln!(out, "  Account number: {}", bank.account_number)?;
    writeln!(out, "  Account name:   {}", bank.account_name)?;
    writeln!(out, "  Reference:      {}", intent.reference)?;
    if let Some(url) = &intent.payment_url {
        writeln!(out, "  Pay online:     {}", url)?;
    }
    if let Some(expiry) = intent.expires_at() {
        writeln!(out, "  Expires:        {}", expiry.format("%Y-%m-%d %H:%M UTC"))?;
    }
    Ok(())
}

pub fn progress<W: Write>(out: &mut W, progress: &PollProgress) -> io::Result<()> {
    writeln!(
        out,
        "Checking payment status... {}/{}s [{:>3.0}%] (attempt {})",
        progress.elapsed.as_secs(),
        progress.max_duration.as_secs(),
        progress.percent(),
        progress.attempts
    )
}

pub fn confirmed<W: Write>(out: &mut W, amount: Amount, confirmation: &Confirmation) -> io::Result<()> {
    writeln!(out, "Payment confirmed! Thank you for your donation of ₦{}.", amount)?;
    if let Some(message) = &confirmation.message {
        writeln!(out, "{}", message)?;
    }
    Ok(())
}

pub fn not_yet_confirmed<W: Write>(out: &mut W, outcome: &PollOutcome) -> io::Result<()> {
    writeln!(out, "Payment not yet confirmed.")?;
    writeln!(
        out,
        "We haven't received confirmation of your payment yet. This could take a few minutes."
    )?;
    if let PollOutcome::TimedOut {
        last_error: Some(error),
        ..
    } = outcome
    {
        writeln!(out, "The last status check failed: {}", error)?;
    }
    Ok(())
}

pub fn pending_reference<W: Write>(out: &mut W, reference: &Reference) -> io::Result<()> {
    writeln!(
        out,
        "If you've already made the transfer, your donation will be confirmed automatically once we receive it."
    )?;
    writeln!(out, "Check later with: bloom-pay confirm {}", reference)
}

pub fn status<W: Write>(out: &mut W, reference: &Reference, confirmation: &Confirmation) -> io::Result<()> {
    let status = confirmation.status.as_deref().unwrap_or("unknown");
    let paid = if confirmation.is_paid { "paid" } else { "not paid" };
    writeln!(out, "Reference {}: {} ({})", reference, status, paid)?;
    if let Some(amount) = confirmation.amount {
        writeln!(out, "  Amount:       ₦{}", amount.normalize())?;
    }
    if let Some(confirmed_at) = &confirmation.confirmed_at {
        writeln!(out, "  Confirmed at: {}", confirmed_at)?;
    }
    if let Some(message) = &confirmation.message {
        writeln!(out, "  {}", message)?;
    }
    Ok(())
}

pub fn recent_donations<W: Write>(out: &mut W, donations: &[RecentDonation]) -> io::Result<()> {
    writeln!(out, "Recent donations:")?;
    if donations.is_empty() {
        return writeln!(out, "  Be the first to donate!");
    }
    for donation in donations.iter().take(RECENT_DONATIONS_SHOWN) {
        writeln!(
            out,
            "  {:<24} ₦{}",
            donation.donor_name,
            donation.amount_naira.normalize()
        )?;
    }
    Ok(())
}
