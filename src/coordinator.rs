use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
    time::Duration,
};

use futures::future::{self, Either};
use tokio::{task::JoinHandle, time};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, info, warn};

use crate::{
    aggregator::{aggregator, OutcomeSink, Success},
    backend::Backend,
    config::{Candidate, EmptyPolicy, FanoutConfig},
    errors::{CancelCause, ConfigError, FanoutError, Failures},
};

#[derive(Debug, Default)]
struct CandidateStats {
    wins: u64,
    total_latency_ms: f64,
    errors: u64,
}

/// Snapshot of candidate performance statistics.
#[derive(Debug, Clone)]
pub struct CandidateStatsSnapshot {
    /// Number of calls this candidate won.
    pub wins: u64,
    /// Average latency in milliseconds of winning attempts.
    pub avg_latency_ms: f64,
    /// Number of failed attempts from this candidate.
    pub errors: u64,
}

/// The winning answer of a call.
#[derive(Debug, Clone)]
pub struct Answer<T> {
    pub candidate: Candidate,
    pub value: T,
    /// How long the winning attempt took.
    pub latency: Duration,
}

/// Coordinates one query across several candidate backends.
///
/// Two modes are offered:
/// - [`resolve`](Self::resolve) dispatches every candidate at once and takes
///   the first success.
/// - [`request_with_failover`](Self::request_with_failover) dispatches
///   candidates one by one, hedging to the next whenever the current one is
///   still silent after `hedge_after`.
///
/// Either way the call ends with exactly one result and cancels its attempts
/// on the way out without waiting for them.
pub struct Coordinator<B> {
    backend: Arc<B>,
    cfg: FanoutConfig,
    stats: Arc<Mutex<HashMap<Candidate, CandidateStats>>>,
    attempts: TaskTracker,
}

impl<B> Clone for Coordinator<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            cfg: self.cfg.clone(),
            stats: Arc::clone(&self.stats),
            attempts: self.attempts.clone(),
        }
    }
}

type CallResult<T, E> = Result<Option<Answer<T>>, FanoutError<E>>;

impl<B> Coordinator<B> {
    /// Creates a coordinator over `backend` with the given strategy.
    pub fn new(backend: B, cfg: FanoutConfig) -> Result<Self, ConfigError> {
        cfg.validate()?;

        Ok(Self {
            backend: Arc::new(backend),
            cfg,
            stats: Arc::new(Mutex::new(HashMap::new())),
            attempts: TaskTracker::new(),
        })
    }

    pub fn config(&self) -> &FanoutConfig {
        &self.cfg
    }

    /// Returns a snapshot of accumulated statistics for every candidate seen.
    pub fn candidate_stats(&self) -> HashMap<Candidate, CandidateStatsSnapshot> {
        let Ok(stats) = self.stats.lock() else {
            return HashMap::new();
        };

        stats
            .iter()
            .map(|(candidate, s)| {
                let avg = if s.wins > 0 {
                    s.total_latency_ms / (s.wins as f64)
                } else {
                    0.0
                };

                (
                    candidate.clone(),
                    CandidateStatsSnapshot {
                        wins: s.wins,
                        avg_latency_ms: avg,
                        errors: s.errors,
                    },
                )
            })
            .collect()
    }

    /// Clears accumulated statistics.
    pub fn reset_stats(&self) {
        if let Ok(mut stats) = self.stats.lock() {
            stats.clear();
        }
    }

    /// Number of attempts still running, including abandoned stragglers.
    pub fn in_flight(&self) -> usize {
        self.attempts.len()
    }

    /// Waits until every attempt spawned so far has finished.
    ///
    /// Calls never wait for their stragglers; this is for shutdown paths and
    /// tests. Attempts spawned while draining are waited for as well.
    ///
    /// The tracker stays closed afterwards. Closing only arms `wait`, new
    /// attempts still spawn, so concurrent drains cannot stall each other.
    pub async fn drain(&self) {
        self.attempts.close();
        self.attempts.wait().await;
    }

    /// De-duplicates and caps the candidate list, applying the empty policy.
    ///
    /// `Ok(None)` means the call resolves to an empty success.
    fn admit<E>(&self, candidates: &[Candidate]) -> Result<Option<Vec<Candidate>>, FanoutError<E>> {
        let mut seen = HashSet::with_capacity(candidates.len());
        let admitted: Vec<Candidate> = candidates
            .iter()
            .filter(|c| seen.insert(*c))
            .take(self.cfg.max_candidates)
            .cloned()
            .collect();

        if admitted.is_empty() {
            return match self.cfg.empty {
                EmptyPolicy::Succeed => Ok(None),
                EmptyPolicy::Reject => Err(FanoutError::NoCandidates),
            };
        }
        Ok(Some(admitted))
    }

    fn deadline(&self) -> Either<time::Sleep, future::Pending<()>> {
        match self.cfg.overall_timeout {
            Some(timeout) => Either::Left(time::sleep(timeout)),
            None => Either::Right(future::pending()),
        }
    }

    fn abort<T, E>(&self, cause: CancelCause, dispatched: &[Candidate]) -> CallResult<T, E> {
        debug!(%cause, dispatched = dispatched.len(), "call abandoned");
        if matches!(cause, CancelCause::Deadline(_)) {
            if let Ok(mut stats) = self.stats.lock() {
                for candidate in dispatched {
                    stats.entry(candidate.clone()).or_default().errors += 1;
                }
            }
        }
        Err(FanoutError::Cancelled(cause))
    }

    fn timed_out<T, E>(&self, dispatched: &[Candidate]) -> CallResult<T, E> {
        let timeout = self.cfg.overall_timeout.unwrap_or_default();
        self.abort(CancelCause::Deadline(timeout), dispatched)
    }

    /// Turns the aggregator's verdict into the call result.
    ///
    /// Cancellation is checked before declaring exhaustive failure.
    fn finish<T, E>(
        &self,
        cancel: &CancellationToken,
        resolution: Result<Success<T>, Failures<E>>,
        dispatched: &[Candidate],
    ) -> CallResult<T, E> {
        match resolution {
            Ok(success) => {
                let latency_ms = success.elapsed.as_secs_f64() * 1000.0;
                info!(winner = %success.candidate, latency_ms, "call resolved");
                if let Ok(mut stats) = self.stats.lock() {
                    let entry = stats.entry(success.candidate.clone()).or_default();
                    entry.wins += 1;
                    entry.total_latency_ms += latency_ms;
                }
                Ok(Some(Answer {
                    candidate: success.candidate,
                    value: success.value,
                    latency: success.elapsed,
                }))
            }
            Err(_) if cancel.is_cancelled() => self.abort(CancelCause::Caller, dispatched),
            Err(failures) => {
                warn!(failed = failures.len(), "all candidates failed");
                if let Ok(mut stats) = self.stats.lock() {
                    for failure in failures.iter() {
                        stats.entry(failure.candidate.clone()).or_default().errors += 1;
                    }
                }
                Err(FanoutError::AllFailed(failures))
            }
        }
    }

    /// Spawns one attempt against `candidate`, observing a child of `scope`.
    fn spawn_attempt<Q>(
        &self,
        scope: &CancellationToken,
        sink: &OutcomeSink<B::Value, B::Error>,
        candidate: &Candidate,
        query: &Arc<Q>,
    ) -> JoinHandle<()>
    where
        B: Backend<Q>,
        Q: Send + Sync + 'static,
    {
        debug!(%candidate, "dispatching attempt");
        let backend = Arc::clone(&self.backend);
        let query = Arc::clone(query);
        let cancel = scope.child_token();
        let slot = sink.slot(candidate.clone());

        self.attempts.spawn(async move {
            let result = backend.fetch(cancel, slot.candidate(), &query).await;
            slot.fill(result);
        })
    }

    /// Plain fan-out: queries every candidate at once and returns the first
    /// success.
    ///
    /// Resolves to `Ok(None)` for an empty candidate set (unless the config
    /// rejects it). When every candidate fails, the error lists each
    /// candidate's reason.
    pub async fn resolve<Q>(
        &self,
        cancel: &CancellationToken,
        candidates: &[Candidate],
        query: Q,
    ) -> CallResult<B::Value, B::Error>
    where
        B: Backend<Q>,
        Q: Send + Sync + 'static,
    {
        let Some(candidates) = self.admit::<B::Error>(candidates)? else {
            return Ok(None);
        };

        let scope = cancel.child_token();
        let _teardown = scope.clone().drop_guard();
        let query = Arc::new(query);
        let (sink, resolver) = aggregator(candidates.len());

        for candidate in &candidates {
            self.spawn_attempt(&scope, &sink, candidate, &query);
        }
        drop(sink);

        let resolution = resolver.resolve();
        let deadline = self.deadline();
        tokio::pin!(resolution, deadline);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => self.abort(CancelCause::Caller, &candidates),
            _ = &mut deadline => self.timed_out(&candidates),
            res = &mut resolution => self.finish(cancel, res, &candidates),
        }
    }

    /// Hedged failover: queries candidates in order, escalating to the next
    /// one when the current attempt fails or stays silent for `hedge_after`.
    ///
    /// A slow attempt is never cancelled by escalation; whichever attempt
    /// succeeds first resolves the call. The error is
    /// [`FanoutError::Cancelled`] when `cancel` fires or the overall timeout
    /// elapses, and [`FanoutError::AllFailed`] once every candidate failed.
    pub async fn request_with_failover<Q>(
        &self,
        cancel: &CancellationToken,
        candidates: &[Candidate],
        query: Q,
    ) -> CallResult<B::Value, B::Error>
    where
        B: Backend<Q>,
        Q: Send + Sync + 'static,
    {
        let Some(candidates) = self.admit::<B::Error>(candidates)? else {
            return Ok(None);
        };

        let scope = cancel.child_token();
        let _teardown = scope.clone().drop_guard();
        let query = Arc::new(query);
        let (sink, resolver) = aggregator(candidates.len());

        let resolution = resolver.resolve();
        let deadline = self.deadline();
        tokio::pin!(resolution, deadline);

        let Some((last, leading)) = candidates.split_last() else {
            return Ok(None);
        };

        let mut dispatched = 0;
        let mut answered = false;
        for candidate in leading {
            let mut attempt = self.spawn_attempt(&scope, &sink, candidate, &query);
            dispatched += 1;
            let grace = time::sleep(self.cfg.hedge_after);

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return self.abort(CancelCause::Caller, &candidates[..dispatched]);
                }
                _ = &mut deadline => return self.timed_out(&candidates[..dispatched]),
                res = &mut resolution => {
                    return self.finish(cancel, res, &candidates[..dispatched]);
                }
                _ = &mut attempt => {
                    debug!(%candidate, "attempt finished within grace period");
                }
                _ = grace => {
                    debug!(
                        %candidate,
                        hedge_after = ?self.cfg.hedge_after,
                        "grace period elapsed"
                    );
                }
            }

            // The winning attempt may finish before its outcome is received.
            if sink.has_winner() {
                debug!(%candidate, "a candidate already answered, not escalating");
                answered = true;
                break;
            }
        }

        if !answered {
            self.spawn_attempt(&scope, &sink, last, &query);
            dispatched += 1;
        }
        drop(sink);

        let dispatched = &candidates[..dispatched];
        tokio::select! {
            biased;
            _ = cancel.cancelled() => self.abort(CancelCause::Caller, dispatched),
            _ = &mut deadline => self.timed_out(dispatched),
            res = &mut resolution => self.finish(cancel, res, dispatched),
        }
    }
}
