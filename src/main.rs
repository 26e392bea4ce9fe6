use bloom_pay::application::flow::DonationFlow;
use bloom_pay::application::poller::{ConfirmationPoller, PollConfig, PollOutcome};
use bloom_pay::config::{ClientConfig, DEFAULT_API_URL};
use bloom_pay::domain::intent::{Amount, DonationRequest, Reference};
use bloom_pay::domain::ports::PaymentGatewayRef;
use bloom_pay::infrastructure::http::HttpPaymentGateway;
use bloom_pay::interfaces::terminal::{TerminalSession, render};
use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use rust_decimal::Decimal;
use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing_subscriber::EnvFilter;

const EXIT_NOT_CONFIRMED: u8 = 2;
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Base URL of the Bloom API
    #[arg(long, env = "BLOOM_API_URL", default_value = DEFAULT_API_URL, global = true)]
    api_url: String,

    /// Bearer token sent with every request
    #[arg(long, env = "BLOOM_API_TOKEN", hide_env_values = true, global = true)]
    api_token: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 10, global = true)]
    request_timeout_secs: u64,

    /// Smallest donation accepted, in naira
    #[arg(long, default_value = "100", global = true)]
    min_donation: Decimal,

    /// How long to wait for confirmation, in milliseconds
    #[arg(long, default_value_t = 20_000, global = true)]
    max_duration_ms: u64,

    /// Delay between status checks, in milliseconds
    #[arg(long, default_value_t = 2_000, global = true)]
    interval_ms: u64,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start a donation and wait for the bank transfer to be confirmed
    Donate {
        /// Amount in whole naira
        #[arg(long)]
        amount: Decimal,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        /// Hide the donor name from the public donations list
        #[arg(long)]
        anonymous: bool,
    },
    /// Wait for an existing reference to be confirmed
    Confirm { reference: String },
    /// Show the current status of a reference
    Status { reference: String },
    /// List recent confirmed donations
    Recent,
}

fn init_tracing(verbose: bool) {
    let default_directive = if verbose { "bloom_pay=debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn build_config(cli: &Cli) -> Result<ClientConfig> {
    let poll = PollConfig::new(
        Duration::from_millis(cli.max_duration_ms),
        Duration::from_millis(cli.interval_ms),
    )
    .into_diagnostic()?;

    ClientConfig::new(&cli.api_url)
        .and_then(|config| config.with_minimum_donation(cli.min_donation))
        .and_then(|config| config.with_poll(poll))
        .map(|config| {
            config
                .with_token(cli.api_token.clone())
                .with_request_timeout(Duration::from_secs(cli.request_timeout_secs))
        })
        .into_diagnostic()
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = build_config(&cli)?;
    let gateway: PaymentGatewayRef =
        Arc::new(HttpPaymentGateway::new(&config).into_diagnostic()?);

    // Ctrl-C cancels the polling run; a check already in flight still completes.
    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal.cancel();
        }
    });

    let stdout = io::stdout();
    match cli.command {
        Command::Donate {
            amount,
            name,
            email,
            phone,
            anonymous,
        } => {
            let mut request = DonationRequest::new(Amount::new(amount).into_diagnostic()?)
                .anonymous(anonymous);
            if let Some(name) = name {
                request = request.donor_name(name);
            }
            if let Some(email) = email {
                request = request.donor_email(email);
            }
            if let Some(phone) = phone {
                request = request.donor_phone(phone);
            }

            let mut flow = DonationFlow::new(gateway, &config).with_shutdown(shutdown.clone());
            let mut session =
                TerminalSession::new(BufReader::new(tokio::io::stdin()), stdout, shutdown);
            let end = session.run(&mut flow, request).await.into_diagnostic()?;
            Ok(ExitCode::from(end.exit_code()))
        }
        Command::Confirm { reference } => {
            let reference = Reference::new(reference).into_diagnostic()?;
            let poller = ConfirmationPoller::new(gateway, config.poll);
            let mut out = stdout;

            let outcome = poller
                .poll(&reference, &shutdown, |progress| {
                    if let Err(e) = render::progress(&mut out, &progress) {
                        debug!("Failed to write progress: {}", e);
                    }
                })
                .await
                .into_diagnostic()?;

            match &outcome {
                PollOutcome::Confirmed { confirmation, .. } => {
                    render::status(&mut out, &reference, confirmation).into_diagnostic()?;
                    Ok(ExitCode::SUCCESS)
                }
                PollOutcome::TimedOut { .. } => {
                    render::not_yet_confirmed(&mut out, &outcome).into_diagnostic()?;
                    render::pending_reference(&mut out, &reference).into_diagnostic()?;
                    Ok(ExitCode::from(EXIT_NOT_CONFIRMED))
                }
                PollOutcome::Cancelled { .. } => {
                    writeln!(out, "Stopped checking payment status.").into_diagnostic()?;
                    Ok(ExitCode::from(EXIT_INTERRUPTED))
                }
            }
        }
        Command::Status { reference } => {
            let reference = Reference::new(reference).into_diagnostic()?;
            let confirmation = gateway.status(&reference).await.into_diagnostic()?;
            render::status(&mut stdout.lock(), &reference, &confirmation).into_diagnostic()?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Recent => {
            let donations = gateway.recent_donations().await.into_diagnostic()?;
            render::recent_donations(&mut stdout.lock(), &donations).into_diagnostic()?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
