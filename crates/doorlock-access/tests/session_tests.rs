//! Session lifecycle tests.
//!
//! Inactivity timers run on paused tokio time: sleeping in the test advances
//! the clock and lets the timer task fire first.

use doorlock_access::{
    AggregatorConfig, FixedSettings, ResetReason, SessionAggregator, SessionState, SessionStats,
};
use doorlock_core::{CredentialInput, FaceResult, FingerprintId, FingerprintResult, Pin};
use std::time::Duration;
use tokio::time::sleep;

fn pin(value: &str) -> CredentialInput {
    CredentialInput::Pin(Pin::new(value).unwrap())
}

fn face(label: &str) -> CredentialInput {
    CredentialInput::Face(FaceResult::matched(label))
}

fn fingerprint(id: u32) -> CredentialInput {
    CredentialInput::Fingerprint(FingerprintResult::matched(FingerprintId::new(id)))
}

#[tokio::test(start_paused = true)]
async fn test_readiness_fires_once() {
    let aggregator = SessionAggregator::new(FixedSettings::new(2));

    assert!(aggregator.update(pin("1234")).await.is_none());

    let snapshot = aggregator.update(face("alice")).await.unwrap();
    assert_eq!(snapshot.score, 2);
    assert_eq!(snapshot.threshold, 2);
    assert_eq!(snapshot.session.face, Some(FaceResult::matched("alice")));

    // A third factor while the decision is pending changes nothing.
    assert!(aggregator.update(fingerprint(3)).await.is_none());
    assert_eq!(aggregator.state().await, SessionState::Ready);
    assert!(aggregator.session().await.fingerprint.is_none());
    assert_eq!(aggregator.stats().await.decisions, 1);
}

#[tokio::test(start_paused = true)]
async fn test_reset_after_ready_starts_fresh_session() {
    let aggregator = SessionAggregator::new(FixedSettings::new(1));

    assert!(aggregator.update(fingerprint(1)).await.is_some());
    aggregator.reset(ResetReason::Submitted).await;
    assert_eq!(aggregator.state().await, SessionState::Empty);

    let snapshot = aggregator.update(pin("0000")).await.unwrap();
    assert!(snapshot.session.fingerprint.is_none());
    assert_eq!(aggregator.stats().await.decisions, 2);
}

#[tokio::test(start_paused = true)]
async fn test_inactivity_resets_partial_session() {
    let aggregator = SessionAggregator::new(FixedSettings::new(2));
    aggregator.update(pin("1234")).await;

    sleep(Duration::from_secs(199)).await;
    assert_eq!(aggregator.state().await, SessionState::Collecting);

    sleep(Duration::from_secs(2)).await;
    assert_eq!(aggregator.state().await, SessionState::Empty);
    assert!(aggregator.session().await.is_empty());
    assert_eq!(
        aggregator.stats().await,
        SessionStats {
            decisions: 0,
            timeouts: 1,
            resets: 1
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_new_input_restarts_inactivity_timer() {
    let config = AggregatorConfig {
        inactivity_timeout: Duration::from_secs(10),
    };
    let aggregator = SessionAggregator::with_config(FixedSettings::new(3), config);

    aggregator.update(pin("1234")).await;
    sleep(Duration::from_secs(8)).await;
    aggregator.update(face("alice")).await;

    // The first timer would have fired at t=10.
    sleep(Duration::from_secs(8)).await;
    assert_eq!(aggregator.state().await, SessionState::Collecting);
    assert_eq!(aggregator.session().await.score(), 2);

    sleep(Duration::from_secs(3)).await;
    assert_eq!(aggregator.state().await, SessionState::Empty);
    assert_eq!(aggregator.stats().await.timeouts, 1);
}

#[tokio::test(start_paused = true)]
async fn test_ready_session_is_not_timed_out() {
    let aggregator = SessionAggregator::new(FixedSettings::new(1));
    aggregator.update(face("alice")).await.unwrap();

    sleep(Duration::from_secs(500)).await;
    assert_eq!(aggregator.state().await, SessionState::Ready);
    assert_eq!(aggregator.stats().await.timeouts, 0);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_after_reset_is_ignored() {
    let aggregator = SessionAggregator::new(FixedSettings::new(2));
    aggregator.update(pin("1234")).await;
    aggregator.reset(ResetReason::Explicit).await;

    sleep(Duration::from_secs(300)).await;
    assert_eq!(
        aggregator.stats().await,
        SessionStats {
            decisions: 0,
            timeouts: 0,
            resets: 1
        }
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_updates_ready_exactly_once() {
    let aggregator = SessionAggregator::new(FixedSettings::new(2));

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let aggregator = aggregator.clone();
            tokio::spawn(async move {
                let input = match i % 3 {
                    0 => pin("1234"),
                    1 => face("alice"),
                    _ => fingerprint(i),
                };
                aggregator.update(input).await
            })
        })
        .collect();

    let mut ready = 0;
    for task in tasks {
        if task.await.unwrap().is_some() {
            ready += 1;
        }
    }

    assert_eq!(ready, 1);
    assert_eq!(aggregator.state().await, SessionState::Ready);
    assert_eq!(aggregator.stats().await.decisions, 1);
}
