mod common;

use common::{candidates, enable_tracing, ms, Script, Scripted};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use hedged_fanout::{
    backend_fn, CancelCause, Candidate, Coordinator, EmptyPolicy, FanoutConfig, FanoutError,
};
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

fn coordinator(backend: &Scripted, hedge_after_ms: u64) -> Coordinator<Scripted> {
    let cfg = FanoutConfig {
        hedge_after: ms(hedge_after_ms),
        ..FanoutConfig::default()
    };
    Coordinator::new(backend.clone(), cfg).unwrap()
}

#[tokio::test(start_paused = true)]
async fn silent_primary_is_hedged_after_grace_period() {
    enable_tracing();
    let backend = Scripted::new([("a", Script::Stuck), ("b", Script::Ok(ms(10), "ok"))]);
    let coordinator = coordinator(&backend, 500);
    let start = Instant::now();

    let answer = coordinator
        .request_with_failover(&CancellationToken::new(), &candidates(&["a", "b"]), "key")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(answer.value, "ok");
    assert_eq!(answer.candidate.as_str(), "b");
    assert_eq!(start.elapsed(), ms(510));
    assert_eq!(backend.dispatched_at("a"), Some(start));
    assert_eq!(backend.dispatched_at("b"), Some(start + ms(500)));
}

#[tokio::test(start_paused = true)]
async fn fast_primary_wastes_no_hedge() {
    let backend = Scripted::new([("a", Script::Ok(ms(50), "ok")), ("b", Script::Ok(ms(1), "b"))]);
    let coordinator = coordinator(&backend, 500);
    let start = Instant::now();

    let answer = coordinator
        .request_with_failover(&CancellationToken::new(), &candidates(&["a", "b"]), "key")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(answer.value, "ok");
    assert_eq!(start.elapsed(), ms(50));

    time::sleep(ms(2000)).await;
    assert_eq!(backend.dispatched(), vec![Candidate::from("a")]);
}

#[tokio::test(start_paused = true)]
async fn failure_escalates_without_waiting_for_grace() {
    let backend = Scripted::new([
        ("a", Script::Fail(ms(5), "a down")),
        ("b", Script::Fail(ms(5), "b down")),
        ("c", Script::Ok(ms(10), "from-c")),
    ]);
    let coordinator = coordinator(&backend, 500);
    let start = Instant::now();

    let answer = coordinator
        .request_with_failover(&CancellationToken::new(), &candidates(&["a", "b", "c"]), "key")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(answer.value, "from-c");
    assert_eq!(backend.dispatched_at("b"), Some(start + ms(5)));
    assert_eq!(backend.dispatched_at("c"), Some(start + ms(10)));
    assert_eq!(start.elapsed(), ms(20));
}

#[tokio::test(start_paused = true)]
async fn slow_primary_keeps_running_and_can_still_win() {
    let backend = Scripted::new([
        ("a", Script::Ok(ms(700), "from-a")),
        ("b", Script::Ok(ms(1000), "from-b")),
    ]);
    let coordinator = coordinator(&backend, 500);
    let start = Instant::now();

    let answer = coordinator
        .request_with_failover(&CancellationToken::new(), &candidates(&["a", "b"]), "key")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(answer.value, "from-a");
    assert_eq!(start.elapsed(), ms(700));
    assert_eq!(backend.dispatched_at("b"), Some(start + ms(500)));

    coordinator.drain().await;
    assert!(backend.saw_cancel("b"));
    assert!(!backend.saw_cancel("a"));
}

#[tokio::test(start_paused = true)]
async fn escalation_follows_input_order() {
    let backend = Scripted::new([
        ("c", Script::Hang),
        ("a", Script::Hang),
        ("b", Script::Ok(ms(10), "from-b")),
    ]);
    let coordinator = coordinator(&backend, 100);
    let start = Instant::now();

    let answer = coordinator
        .request_with_failover(&CancellationToken::new(), &candidates(&["c", "a", "b"]), "key")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(answer.value, "from-b");
    assert_eq!(
        backend.dispatched(),
        vec![Candidate::from("c"), Candidate::from("a"), Candidate::from("b")]
    );
    assert_eq!(backend.dispatched_at("a"), Some(start + ms(100)));
    assert_eq!(backend.dispatched_at("b"), Some(start + ms(200)));
}

#[tokio::test(start_paused = true)]
async fn all_candidates_failing_is_an_aggregate_error() {
    let backend = Scripted::new([
        ("a", Script::Fail(ms(600), "a timed out")),
        ("b", Script::Fail(ms(10), "b not found")),
    ]);
    let coordinator = coordinator(&backend, 500);
    let start = Instant::now();

    let err = coordinator
        .request_with_failover(&CancellationToken::new(), &candidates(&["a", "b"]), "key")
        .await
        .expect_err("both fail");

    // b failed at 510ms, but a was still outstanding until 600ms.
    assert_eq!(start.elapsed(), ms(600));
    let failures = err.failures().expect("aggregate failure");
    assert_eq!(failures.len(), 2);
    let text = err.to_string();
    assert!(text.contains("a: a timed out"));
    assert!(text.contains("b: b not found"));
}

#[tokio::test(start_paused = true)]
async fn caller_cancellation_aborts_with_attempts_outstanding() {
    let backend = Scripted::new([
        ("a", Script::FailIgnoringCancel(ms(2000), "e1")),
        ("b", Script::FailIgnoringCancel(ms(2000), "e2")),
        ("c", Script::FailIgnoringCancel(ms(2000), "e3")),
    ]);
    let coordinator = coordinator(&backend, 500);
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        time::sleep(ms(700)).await;
        trigger.cancel();
    });

    let start = Instant::now();
    let err = coordinator
        .request_with_failover(&cancel, &candidates(&["a", "b", "c"]), "key")
        .await
        .expect_err("cancelled");

    assert!(matches!(err, FanoutError::Cancelled(CancelCause::Caller)));
    assert_eq!(start.elapsed(), ms(700));
    // c was never reached: the call stopped escalating once cancelled.
    assert!(backend.dispatched_at("c").is_none());

    coordinator.drain().await;
    assert_eq!(backend.finished(), 2);
}

#[tokio::test(start_paused = true)]
async fn cancellation_wins_over_simultaneous_exhaustion() {
    let backend = Scripted::new([("a", Script::Hang), ("b", Script::Hang)]);
    let coordinator = coordinator(&backend, 50);
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        time::sleep(ms(100)).await;
        trigger.cancel();
    });

    // Cancelling makes every hanging backend fail at once; the caller still
    // sees the cancellation, not an aggregate failure.
    let err = coordinator
        .request_with_failover(&cancel, &candidates(&["a", "b"]), "key")
        .await
        .expect_err("cancelled");

    assert!(err.is_cancelled());
}

#[tokio::test(start_paused = true)]
async fn deadline_cuts_escalation_short() {
    let backend = Scripted::new([("a", Script::Hang), ("b", Script::Hang), ("c", Script::Hang)]);
    let cfg = FanoutConfig {
        hedge_after: ms(500),
        overall_timeout: Some(ms(800)),
        ..FanoutConfig::default()
    };
    let coordinator = Coordinator::new(backend.clone(), cfg).unwrap();
    let start = Instant::now();

    let err = coordinator
        .request_with_failover(&CancellationToken::new(), &candidates(&["a", "b", "c"]), "key")
        .await
        .expect_err("deadline");

    assert!(matches!(err, FanoutError::Cancelled(CancelCause::Deadline(_))));
    assert_eq!(start.elapsed(), ms(800));
    assert!(backend.dispatched_at("c").is_none());
}

#[tokio::test(start_paused = true)]
async fn straggling_failover_attempts_finish_after_return() {
    let backend = Scripted::new([
        ("a", Script::OkIgnoringCancel(ms(3000), "very late")),
        ("b", Script::Ok(ms(10), "ok")),
    ]);
    let coordinator = coordinator(&backend, 500);

    let answer = coordinator
        .request_with_failover(&CancellationToken::new(), &candidates(&["a", "b"]), "key")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(answer.value, "ok");
    assert_eq!(coordinator.in_flight(), 1);

    coordinator.drain().await;
    assert_eq!(backend.finished(), 2);
    assert_eq!(coordinator.in_flight(), 0);
}

#[tokio::test]
async fn empty_candidate_set_follows_policy() {
    let backend = Scripted::new([]);
    let coordinator = coordinator(&backend, 500);
    let result = coordinator
        .request_with_failover(&CancellationToken::new(), &[], "key")
        .await;
    assert!(matches!(result, Ok(None)));

    let cfg = FanoutConfig {
        empty: EmptyPolicy::Reject,
        ..FanoutConfig::default()
    };
    let coordinator = Coordinator::new(backend, cfg).unwrap();
    let result = coordinator
        .request_with_failover(&CancellationToken::new(), &[], "key")
        .await;
    assert!(matches!(result, Err(FanoutError::NoCandidates)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn quick_primary_never_escalates_across_worker_threads() {
    let escalations = Arc::new(AtomicUsize::new(0));
    let backend = backend_fn({
        let escalations = Arc::clone(&escalations);
        move |_cancel: CancellationToken, addr: Candidate, key: &'static str| {
            let escalations = Arc::clone(&escalations);
            async move {
                if addr.as_str() == "b" {
                    escalations.fetch_add(1, Ordering::Relaxed);
                }
                tokio::task::yield_now().await;
                Ok::<_, std::io::Error>(format!("{key}@{addr}"))
            }
        }
    });
    let cfg = FanoutConfig {
        hedge_after: ms(5000),
        ..FanoutConfig::default()
    };
    let coordinator = Coordinator::new(backend, cfg).unwrap();
    let order = candidates(&["a", "b"]);

    for _ in 0..5_000 {
        let answer = coordinator
            .request_with_failover(&CancellationToken::new(), &order, "key")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(answer.candidate.as_str(), "a");
    }

    coordinator.drain().await;
    assert_eq!(escalations.load(Ordering::Relaxed), 0);
}
