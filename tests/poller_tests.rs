mod common;

use bloom_pay::application::poller::{ConfirmationPoller, PollConfig, PollOutcome};
use bloom_pay::domain::confirmation::CheckError;
use bloom_pay::domain::intent::Reference;
use bloom_pay::infrastructure::in_memory::{InMemoryGateway, ScriptedCheck};
use common::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn reference() -> Reference {
    Reference::new("TX1").unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_attempts_bounded_by_budget_over_interval() {
    let cases = [
        (20_000, 2_000, 0),
        (20_000, 3_000, 0),
        (5_000, 5_000, 0),
        (9_000, 1_000, 250),
        (10_000, 2_000, 1_500),
    ];

    for (max_ms, interval_ms, latency_ms) in cases {
        let gateway =
            Arc::new(InMemoryGateway::new().with_check_latency(Duration::from_millis(latency_ms)));
        gateway.script(&reference(), []).await;
        let config = PollConfig::new(
            Duration::from_millis(max_ms),
            Duration::from_millis(interval_ms),
        )
        .unwrap();
        let poller = ConfirmationPoller::new(gateway.clone(), config);

        let started = Instant::now();
        let outcome = poller
            .poll(&reference(), &CancellationToken::new(), |_| {})
            .await
            .unwrap();
        let elapsed = started.elapsed();

        let bound = (max_ms / interval_ms) as u32;
        assert!(
            matches!(outcome, PollOutcome::TimedOut { attempts, .. } if attempts <= bound),
            "{:?} exceeded {} attempts",
            outcome,
            bound
        );
        assert_eq!(gateway.confirm_calls() as u32, outcome.attempts());
        assert!(
            elapsed <= Duration::from_millis(max_ms + latency_ms),
            "run took {:?}",
            elapsed
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_default_cadence_is_ten_checks() {
    let gateway = Arc::new(InMemoryGateway::new());
    gateway.script(&reference(), []).await;
    let poller = ConfirmationPoller::new(gateway.clone(), PollConfig::default());

    let outcome = poller
        .poll(&reference(), &CancellationToken::new(), |_| {})
        .await
        .unwrap();

    assert!(matches!(outcome, PollOutcome::TimedOut { attempts: 10, .. }));
    assert_eq!(gateway.confirm_calls(), 10);
}

#[tokio::test(start_paused = true)]
async fn test_paid_stops_immediately() {
    let gateway = Arc::new(InMemoryGateway::new());
    gateway.script(&reference(), [ScriptedCheck::Paid]).await;
    let poller = ConfirmationPoller::new(gateway.clone(), PollConfig::default());

    let started = Instant::now();
    let outcome = poller
        .poll(&reference(), &CancellationToken::new(), |_| {})
        .await
        .unwrap();

    assert!(outcome.is_confirmed());
    assert_eq!(gateway.confirm_calls(), 1);
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_failures_never_confirm() {
    let gateway = Arc::new(InMemoryGateway::new());
    gateway
        .script(
            &reference(),
            (0..10).map(|i| {
                if i % 2 == 0 {
                    ScriptedCheck::Fail(CheckError::Transport("timed out".to_string()))
                } else {
                    ScriptedCheck::NotPaid
                }
            }),
        )
        .await;
    let poller = ConfirmationPoller::new(gateway, PollConfig::default());

    let outcome = poller
        .poll(&reference(), &CancellationToken::new(), |_| {})
        .await
        .unwrap();

    assert!(matches!(
        outcome,
        PollOutcome::TimedOut {
            attempts: 10,
            last_error: Some(CheckError::Transport(_)),
            ..
        }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_in_flight_result_discarded_after_cancel() {
    let gateway = Arc::new(InMemoryGateway::new().with_check_latency(Duration::from_secs(1)));
    gateway.script(&reference(), [ScriptedCheck::Paid]).await;
    let poller = ConfirmationPoller::new(gateway.clone(), PollConfig::default());
    let cancel = CancellationToken::new();

    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        canceller.cancel();
    });
    let outcome = poller.poll(&reference(), &cancel, |_| {}).await.unwrap();

    assert_eq!(outcome, PollOutcome::Cancelled { attempts: 1 });
    assert_eq!(gateway.confirm_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_wait_stops_further_checks() {
    let gateway = Arc::new(InMemoryGateway::new());
    gateway.script(&reference(), []).await;
    let poller = ConfirmationPoller::new(gateway.clone(), PollConfig::default());
    let cancel = CancellationToken::new();

    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(5_500)).await;
        canceller.cancel();
    });
    let started = Instant::now();
    let outcome = poller.poll(&reference(), &cancel, |_| {}).await.unwrap();

    assert_eq!(outcome, PollOutcome::Cancelled { attempts: 3 });
    assert_eq!(started.elapsed(), Duration::from_millis(5_500));
    assert_eq!(gateway.confirm_calls(), 3);
}

#[tokio::test]
async fn test_polls_http_backend_until_paid() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/payments/confirm/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(not_paid()))
        .up_to_n_times(2)
        .with_priority(1)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/payments/confirm/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(paid(5000)))
        .expect(1)
        .mount(&server)
        .await;
    let config = PollConfig::new(Duration::from_secs(5), Duration::from_millis(50)).unwrap();
    let poller = ConfirmationPoller::new(Arc::new(http_gateway(&server)), config);

    let outcome = poller
        .poll(&reference(), &CancellationToken::new(), |_| {})
        .await
        .unwrap();

    assert_eq!(outcome.attempts(), 3);
    assert!(outcome.is_confirmed());
}

#[tokio::test]
async fn test_backend_outage_surfaces_as_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/payments/confirm/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let config = PollConfig::new(Duration::from_millis(300), Duration::from_millis(100)).unwrap();
    let poller = ConfirmationPoller::new(Arc::new(http_gateway(&server)), config);

    let outcome = poller
        .poll(&reference(), &CancellationToken::new(), |_| {})
        .await
        .unwrap();

    match outcome {
        PollOutcome::TimedOut {
            attempts,
            last_error: Some(error),
            ..
        } => {
            assert!((1..=3).contains(&attempts));
            assert!(error.is_retryable());
        }
        other => panic!("expected timeout with error, got {:?}", other),
    }
}
