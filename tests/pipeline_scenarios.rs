//! Breaker/retry/timeout scenarios driven through the public pipeline API.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use resilience_pipeline::observability::ResilienceEvent;
use resilience_pipeline::resilience::{
    CircuitStatus, Classify, FailureKind, PolicyConfig, ResilienceError, ResiliencePipeline,
};

mod common;
use common::RecordingSink;

#[derive(Debug)]
struct Unavailable;

impl fmt::Display for Unavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "503 service unavailable")
    }
}

impl Classify for Unavailable {
    fn kind(&self) -> FailureKind {
        FailureKind::Transient
    }
}

fn pipeline(policy: PolicyConfig) -> (Arc<ResiliencePipeline>, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    let pipeline = ResiliencePipeline::new("weather", policy, sink.clone());
    (Arc::new(pipeline), sink)
}

fn breaker_policy(threshold: u32, max_retries: u32) -> PolicyConfig {
    PolicyConfig {
        timeout: Duration::from_secs(5),
        max_retries,
        use_jitter: false,
        failure_threshold: threshold,
        break_duration: Duration::from_secs(60),
        ..Default::default()
    }
}

async fn failing_call(pipeline: &ResiliencePipeline, calls: &AtomicU32) -> ResilienceError<Unavailable> {
    pipeline
        .execute(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(Unavailable) }
        })
        .await
        .unwrap_err()
}

#[tokio::test(start_paused = true)]
async fn test_three_failures_open_the_breaker() {
    let (pipeline, sink) = pipeline(breaker_policy(3, 0));
    let calls = AtomicU32::new(0);

    for expected in 1..=3 {
        let err = failing_call(&pipeline, &calls).await;
        assert!(matches!(err, ResilienceError::RetriesExhausted { attempts: 1, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), expected);
    }
    assert_eq!(pipeline.circuit_status(), CircuitStatus::Open);

    let err = failing_call(&pipeline, &calls).await;
    assert!(err.is_circuit_open());
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    let opened = sink.count(|e| matches!(e, ResilienceEvent::CircuitOpened { .. }));
    assert_eq!(opened, 1);
}

#[tokio::test(start_paused = true)]
async fn test_backoff_waits_two_then_four_seconds() {
    let policy = PolicyConfig {
        timeout: Duration::from_secs(5),
        max_retries: 2,
        backoff_base: 2.0,
        use_jitter: false,
        ..Default::default()
    };
    let (pipeline, sink) = pipeline(policy);
    let calls = AtomicU32::new(0);
    let start = Instant::now();

    let result = pipeline
        .execute(|| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(Unavailable)
                } else {
                    Ok("sunny")
                }
            }
        })
        .await;

    assert_eq!(result.unwrap(), "sunny");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(start.elapsed(), Duration::from_secs(6));

    let delays: Vec<Duration> = sink
        .events()
        .into_iter()
        .filter_map(|e| match e {
            ResilienceEvent::RetryAttempt { delay, .. } => Some(delay),
            _ => None,
        })
        .collect();
    assert_eq!(delays, vec![Duration::from_secs(2), Duration::from_secs(4)]);
}

#[tokio::test(start_paused = true)]
async fn test_breaker_recovers_after_break() {
    let (pipeline, sink) = pipeline(breaker_policy(1, 0));
    let calls = AtomicU32::new(0);
    failing_call(&pipeline, &calls).await;

    tokio::time::advance(Duration::from_secs(59)).await;
    match failing_call(&pipeline, &calls).await {
        ResilienceError::CircuitOpen { retry_after, .. } => {
            assert_eq!(retry_after, Duration::from_secs(1));
        }
        other => panic!("expected CircuitOpen, got {other:?}"),
    }

    tokio::time::advance(Duration::from_secs(1)).await;
    let result = pipeline.execute(|| async { Ok::<_, Unavailable>(()) }).await;
    assert!(result.is_ok());
    assert_eq!(pipeline.circuit_status(), CircuitStatus::Closed);
    assert_eq!(pipeline.consecutive_failures(), 0);

    assert_eq!(
        sink.count(|e| matches!(e, ResilienceEvent::CircuitHalfOpen { .. })),
        1
    );
    assert_eq!(
        sink.count(|e| matches!(e, ResilienceEvent::CircuitReset { .. })),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn test_failed_trial_reopens() {
    let (pipeline, _) = pipeline(breaker_policy(1, 0));
    let calls = AtomicU32::new(0);
    failing_call(&pipeline, &calls).await;

    tokio::time::advance(Duration::from_secs(60)).await;
    let err = failing_call(&pipeline, &calls).await;
    assert!(!err.is_circuit_open());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(pipeline.circuit_status(), CircuitStatus::Open);

    match failing_call(&pipeline, &calls).await {
        ResilienceError::CircuitOpen { retry_after, .. } => {
            assert_eq!(retry_after, Duration::from_secs(60));
        }
        other => panic!("expected CircuitOpen, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_only_one_concurrent_trial() {
    let (pipeline, _) = pipeline(breaker_policy(1, 0));
    let calls = AtomicU32::new(0);
    failing_call(&pipeline, &calls).await;
    tokio::time::advance(Duration::from_secs(60)).await;

    let release = Arc::new(Notify::new());
    let trial = {
        let pipeline = pipeline.clone();
        let release = release.clone();
        tokio::spawn(async move {
            pipeline
                .execute(|| {
                    let release = release.clone();
                    async move {
                        release.notified().await;
                        Ok::<_, Unavailable>("recovered")
                    }
                })
                .await
        })
    };

    // Let the trial get admitted and park on the notify.
    tokio::task::yield_now().await;
    assert!(pipeline.snapshot().trial_in_flight);

    let concurrent = AtomicU32::new(0);
    let err = pipeline
        .execute(|| {
            concurrent.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, Unavailable>("second") }
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ResilienceError::CircuitOpen { retry_after, .. } if retry_after == Duration::ZERO
    ));
    assert_eq!(concurrent.load(Ordering::SeqCst), 0);

    release.notify_one();
    assert_eq!(trial.await.unwrap().unwrap(), "recovered");
    assert_eq!(pipeline.circuit_status(), CircuitStatus::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_independent_of_retries() {
    let policy = PolicyConfig {
        timeout: Duration::from_millis(300),
        max_retries: 0,
        use_jitter: false,
        ..Default::default()
    };
    let (pipeline, _) = pipeline(policy);

    let fast = pipeline
        .execute(|| async {
            tokio::time::sleep(Duration::from_millis(299)).await;
            Ok::<_, Unavailable>(())
        })
        .await;
    assert!(fast.is_ok());

    let slow = pipeline
        .execute(|| async {
            tokio::time::sleep(Duration::from_millis(301)).await;
            Ok::<_, Unavailable>(())
        })
        .await;
    assert!(slow.unwrap_err().is_timeout());
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_stops_retries() {
    let (pipeline, sink) = pipeline(breaker_policy(10, 5));
    let cancel = CancellationToken::new();
    let calls = Arc::new(AtomicU32::new(0));

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(3500)).await;
        trigger.cancel();
    });

    let c = calls.clone();
    let err = pipeline
        .execute_with_cancellation(&cancel, move || {
            c.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(Unavailable) }
        })
        .await
        .unwrap_err();

    // Attempts at t=0 and t=2s, cancelled while waiting 4s for the third.
    assert!(matches!(err, ResilienceError::Cancelled { attempts: 2, .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(pipeline.circuit_status(), CircuitStatus::Closed);
    assert_eq!(pipeline.consecutive_failures(), 2);
    assert_eq!(sink.retries(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_mid_attempt_drops_action() {
    let (pipeline, sink) = pipeline(breaker_policy(1, 3));
    let cancel = CancellationToken::new();
    let finished = Arc::new(AtomicBool::new(false));

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let flag = finished.clone();
    let err = pipeline
        .execute_with_cancellation(&cancel, move || {
            let flag = flag.clone();
            async move {
                tokio::time::sleep(Duration::from_secs(3)).await;
                flag.store(true, Ordering::SeqCst);
                Ok::<_, Unavailable>(())
            }
        })
        .await
        .unwrap_err();

    assert!(matches!(err, ResilienceError::Cancelled { attempts: 1, .. }));

    // Well past the point where the dropped action would have resumed.
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(!finished.load(Ordering::SeqCst));

    assert_eq!(sink.retries(), 0);
    assert_eq!(
        sink.count(|e| matches!(e, ResilienceEvent::Attempt(_))),
        0
    );
    assert_eq!(pipeline.circuit_status(), CircuitStatus::Closed);
    assert_eq!(pipeline.consecutive_failures(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_each_failed_attempt_counts_toward_breaker() {
    let (pipeline, sink) = pipeline(breaker_policy(3, 2));
    let calls = AtomicU32::new(0);

    let err = failing_call(&pipeline, &calls).await;

    assert!(matches!(err, ResilienceError::RetriesExhausted { attempts: 3, .. }));
    assert_eq!(pipeline.consecutive_failures(), 3);
    assert_eq!(pipeline.circuit_status(), CircuitStatus::Open);
    assert_eq!(
        sink.count(|e| matches!(e, ResilienceEvent::CircuitOpened { .. })),
        1
    );

    assert!(failing_call(&pipeline, &calls).await.is_circuit_open());
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_breaker_opened_by_attempt_cuts_retries_short() {
    let (pipeline, sink) = pipeline(breaker_policy(2, 4));
    let calls = AtomicU32::new(0);

    match failing_call(&pipeline, &calls).await {
        ResilienceError::CircuitOpen { retry_after, .. } => {
            assert_eq!(retry_after, Duration::from_secs(60));
        }
        other => panic!("expected CircuitOpen, got {other:?}"),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(sink.retries(), 1);
}
