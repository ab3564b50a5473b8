//! High-volume stress run of hedged failover against simulated backends.
//!
//! This demo performs 20,000 concurrent coordinated calls with bounded
//! in-flight work, racing a fast-but-flaky, a steady and a hanging backend.
//! Useful for watching how hedging spreads wins across candidates.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use hedged_fanout::{backend_fn, Candidate, Coordinator, FanoutConfig};
use rand::Rng;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

const NUM_CALLS: usize = 20_000;
const MAX_IN_FLIGHT: usize = 256;

#[derive(Debug)]
enum CallOutcome {
    Ok {
        candidate: Candidate,
        latency: Duration,
    },
    Err {
        error: String,
        latency: Duration,
    },
}

#[derive(Debug)]
struct CallResult {
    call_idx: usize,
    outcome: CallOutcome,
}

#[derive(thiserror::Error, Debug)]
enum DemoError {
    #[error("{0} refused")]
    Refused(Candidate),
    #[error("{0} cancelled")]
    Cancelled(Candidate),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // (latency range in ms, failure percentage); None hangs until cancelled.
    let profiles: Arc<HashMap<Candidate, Option<(u64, u64, u8)>>> = Arc::new(HashMap::from([
        (Candidate::from("flaky-fast"), Some((5, 40, 30))),
        (Candidate::from("steady"), Some((40, 60, 1))),
        (Candidate::from("black-hole"), None),
    ]));
    let candidates: Vec<Candidate> = vec!["black-hole".into(), "flaky-fast".into(), "steady".into()];

    let backend = backend_fn(move |cancel: CancellationToken, candidate: Candidate, _key: usize| {
        let plan = profiles.get(&candidate).copied().flatten().map(|(lo, hi, fail_pct)| {
            let mut rng = rand::thread_rng();
            (
                Duration::from_millis(rng.gen_range(lo..=hi)),
                rng.gen_range(0..100u8) < fail_pct,
            )
        });

        async move {
            let Some((delay, fails)) = plan else {
                cancel.cancelled().await;
                return Err(DemoError::Cancelled(candidate));
            };
            tokio::select! {
                _ = cancel.cancelled() => Err(DemoError::Cancelled(candidate)),
                _ = tokio::time::sleep(delay) => {
                    if fails {
                        Err(DemoError::Refused(candidate))
                    } else {
                        Ok(delay)
                    }
                }
            }
        }
    });

    let cfg = FanoutConfig {
        hedge_after: Duration::from_millis(20),
        ..FanoutConfig::low_latency()
    };
    let coordinator = Coordinator::new(backend, cfg)?;

    let (tx, mut rx) = mpsc::channel::<CallResult>(MAX_IN_FLIGHT * 2);
    let semaphore = Arc::new(Semaphore::new(MAX_IN_FLIGHT));
    let consumer = tokio::spawn(async move {
        let mut results: Vec<CallResult> = Vec::with_capacity(NUM_CALLS);

        while let Some(res) = rx.recv().await {
            if let CallOutcome::Err { error, latency } = &res.outcome {
                println!(
                    "[call {:05}] ERR  latency={:?} error={}",
                    res.call_idx, latency, error
                );
            }
            results.push(res);
        }

        results
    });

    let candidates = Arc::new(candidates);
    for i in 0..NUM_CALLS {
        let coordinator = coordinator.clone();
        let candidates = Arc::clone(&candidates);
        let tx = tx.clone();
        let sem = Arc::clone(&semaphore);

        tokio::spawn(async move {
            let Ok(_permit) = sem.acquire_owned().await else {
                return;
            };

            let start = Instant::now();
            let res = coordinator
                .request_with_failover(&CancellationToken::new(), &candidates, i)
                .await;
            let latency = start.elapsed();

            let outcome = match res {
                Ok(Some(answer)) => CallOutcome::Ok {
                    candidate: answer.candidate,
                    latency,
                },
                Ok(None) => CallOutcome::Err {
                    error: "no candidates".to_string(),
                    latency,
                },
                Err(e) => CallOutcome::Err {
                    error: e.to_string(),
                    latency,
                },
            };

            let _ = tx
                .send(CallResult {
                    call_idx: i,
                    outcome,
                })
                .await;
        });
    }

    drop(tx);
    let results = consumer.await?;
    coordinator.drain().await;

    let mut wins: HashMap<Candidate, (usize, Duration)> = HashMap::new();
    let mut error_count = 0usize;

    for r in &results {
        match &r.outcome {
            CallOutcome::Ok { candidate, latency } => {
                let entry = wins.entry(candidate.clone()).or_insert((0, Duration::ZERO));
                entry.0 += 1;
                entry.1 += *latency;
            }
            CallOutcome::Err { .. } => {
                error_count += 1;
            }
        }
    }

    println!("\n=== summary ===");
    println!("total calls          : {}", results.len());
    println!("successes            : {}", results.len() - error_count);
    println!("errors (any kind)    : {}", error_count);

    let mut by_wins: Vec<_> = wins.into_iter().collect();
    by_wins.sort_by(|a, b| b.1 .0.cmp(&a.1 .0));
    for (candidate, (count, total)) in by_wins {
        let avg_ms = total.as_secs_f64() * 1000.0 / (count as f64);
        println!(
            "candidate {:>10}: wins = {:6}, avg_latency = {:8.3} ms",
            candidate.as_str(),
            count,
            avg_ms,
        );
    }

    Ok(())
}
