#![allow(dead_code)]

use std::{
    collections::HashMap,
    future::Future,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use anyhow::anyhow;
use hedged_fanout::{Backend, Candidate};
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

/// Enable tracing with the RUST_LOG environment variable.
pub fn enable_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(tracing::Level::DEBUG.into())
                .from_env_lossy(),
        )
        .with_test_writer()
        .try_init();
}

pub fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

pub fn candidates(names: &[&str]) -> Vec<Candidate> {
    names.iter().map(|n| Candidate::from(*n)).collect()
}

/// How a scripted candidate behaves.
#[derive(Debug, Clone)]
pub enum Script {
    /// Answers `value` after `delay`, unless cancelled first.
    Ok(Duration, &'static str),
    /// Fails with `reason` after `delay`, unless cancelled first.
    Fail(Duration, &'static str),
    /// Answers after `delay` even if cancelled.
    OkIgnoringCancel(Duration, &'static str),
    /// Fails after `delay` even if cancelled.
    FailIgnoringCancel(Duration, &'static str),
    /// Never answers on its own; returns once cancelled.
    Hang,
    /// Never answers, ignores cancellation.
    Stuck,
    /// Panics after `delay`.
    Panic(Duration),
}

#[derive(Default)]
struct Log {
    dispatched: Vec<(Candidate, Instant)>,
    cancelled: Vec<Candidate>,
}

/// Backend whose candidates follow per-address scripts and which records
/// when each one was dispatched.
#[derive(Clone)]
pub struct Scripted {
    scripts: Arc<HashMap<Candidate, Script>>,
    log: Arc<Mutex<Log>>,
    finished: Arc<AtomicUsize>,
}

impl Scripted {
    pub fn new(scripts: impl IntoIterator<Item = (&'static str, Script)>) -> Self {
        Self {
            scripts: Arc::new(
                scripts
                    .into_iter()
                    .map(|(name, script)| (Candidate::from(name), script))
                    .collect(),
            ),
            log: Arc::default(),
            finished: Arc::default(),
        }
    }

    pub fn dispatched(&self) -> Vec<Candidate> {
        let log = self.log.lock().unwrap();
        log.dispatched.iter().map(|(c, _)| c.clone()).collect()
    }

    pub fn dispatched_at(&self, name: &str) -> Option<Instant> {
        let log = self.log.lock().unwrap();
        log.dispatched
            .iter()
            .find(|(c, _)| c.as_str() == name)
            .map(|(_, at)| *at)
    }

    pub fn saw_cancel(&self, name: &str) -> bool {
        let log = self.log.lock().unwrap();
        log.cancelled.iter().any(|c| c.as_str() == name)
    }

    /// Number of fetches that returned, whether or not anyone was listening.
    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }
}

impl<Q: Send + Sync + 'static> Backend<Q> for Scripted {
    type Value = String;
    type Error = anyhow::Error;

    fn fetch(
        &self,
        cancel: CancellationToken,
        candidate: &Candidate,
        _query: &Q,
    ) -> impl Future<Output = Result<String, anyhow::Error>> + Send {
        let script = self
            .scripts
            .get(candidate)
            .cloned()
            .unwrap_or(Script::Fail(Duration::ZERO, "unknown candidate"));
        self.log
            .lock()
            .unwrap()
            .dispatched
            .push((candidate.clone(), Instant::now()));

        let candidate = candidate.clone();
        let log = Arc::clone(&self.log);
        let finished = Arc::clone(&self.finished);

        async move {
            let on_cancel = || {
                log.lock().unwrap().cancelled.push(candidate.clone());
                Err(anyhow!("{candidate} cancelled"))
            };

            let result = match script {
                Script::Ok(delay, value) => tokio::select! {
                    _ = cancel.cancelled() => on_cancel(),
                    _ = time::sleep(delay) => Ok(value.to_string()),
                },
                Script::Fail(delay, reason) => tokio::select! {
                    _ = cancel.cancelled() => on_cancel(),
                    _ = time::sleep(delay) => Err(anyhow!(reason)),
                },
                Script::OkIgnoringCancel(delay, value) => {
                    time::sleep(delay).await;
                    Ok(value.to_string())
                }
                Script::FailIgnoringCancel(delay, reason) => {
                    time::sleep(delay).await;
                    Err(anyhow!(reason))
                }
                Script::Hang => {
                    cancel.cancelled().await;
                    on_cancel()
                }
                Script::Stuck => std::future::pending().await,
                Script::Panic(delay) => {
                    time::sleep(delay).await;
                    panic!("{candidate} blew up");
                }
            };

            finished.fetch_add(1, Ordering::SeqCst);
            result
        }
    }
}
