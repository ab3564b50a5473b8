//! Concurrency-safe sink for attempt outcomes.
//!
//! Any number of attempts record into an [`OutcomeSink`]; the coordinator
//! awaits the matching [`Resolver`] for "first success, or every failure".
//!
//! The first success to pass the compare-and-swap gate wins. When two attempts
//! succeed at nearly the same instant, whichever reaches the gate first is
//! surfaced and the other is discarded; that race is inherent and accepted.
//!
//! Outcomes travel over a bounded channel sized to the number of expected
//! attempts and are written with `try_send`, so recording never waits on the
//! reader. A straggler that finishes after resolution gets
//! [`Recorded::Discarded`] and simply returns.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::{
    sync::mpsc::{self, error::TrySendError},
    time::Instant,
};
use tracing::{trace, warn};

use crate::{
    config::Candidate,
    errors::{AttemptError, Failure, Failures},
};

/// A value produced by one candidate.
#[derive(Debug)]
pub struct Success<T> {
    pub candidate: Candidate,
    pub value: T,
    /// Time from dispatch until the value was recorded.
    pub elapsed: Duration,
}

/// Result of one attempt, tagged with the candidate that produced it.
#[derive(Debug)]
pub enum Outcome<T, E> {
    Success(Success<T>),
    Failure(Failure<E>),
}

impl<T, E> Outcome<T, E> {
    pub fn candidate(&self) -> &Candidate {
        match self {
            Outcome::Success(s) => &s.candidate,
            Outcome::Failure(f) => &f.candidate,
        }
    }
}

/// What happened to a recorded outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recorded {
    /// Delivered to the resolver.
    Accepted,
    /// Dropped: a success already won, or nobody is resolving anymore.
    Discarded,
}

struct SinkInner<T, E> {
    tx: mpsc::Sender<Outcome<T, E>>,
    won: AtomicBool,
}

/// Write side of the aggregator. Cheap to clone.
pub struct OutcomeSink<T, E> {
    inner: Arc<SinkInner<T, E>>,
}

impl<T, E> Clone for OutcomeSink<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Read side of the aggregator.
pub struct Resolver<T, E> {
    rx: mpsc::Receiver<Outcome<T, E>>,
    expected: usize,
}

/// Creates an aggregator expecting one outcome from each of `expected` attempts.
pub fn aggregator<T, E>(expected: usize) -> (OutcomeSink<T, E>, Resolver<T, E>) {
    let (tx, rx) = mpsc::channel(expected.max(1));
    let sink = OutcomeSink {
        inner: Arc::new(SinkInner {
            tx,
            won: AtomicBool::new(false),
        }),
    };
    (sink, Resolver { rx, expected })
}

impl<T, E> OutcomeSink<T, E> {
    /// Records an outcome without ever blocking.
    pub fn record(&self, outcome: Outcome<T, E>) -> Recorded {
        if matches!(outcome, Outcome::Success(_))
            && self
                .inner
                .won
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
        {
            trace!(candidate = %outcome.candidate(), "late success discarded");
            return Recorded::Discarded;
        }

        match self.inner.tx.try_send(outcome) {
            Ok(()) => Recorded::Accepted,
            Err(TrySendError::Closed(outcome)) => {
                trace!(candidate = %outcome.candidate(), "outcome after resolution discarded");
                Recorded::Discarded
            }
            Err(TrySendError::Full(outcome)) => {
                warn!(
                    candidate = %outcome.candidate(),
                    "more outcomes recorded than attempts expected"
                );
                Recorded::Discarded
            }
        }
    }

    /// Whether a success has already passed the gate.
    pub fn has_winner(&self) -> bool {
        self.inner.won.load(Ordering::Acquire)
    }

    /// Opens the slot a single attempt against `candidate` reports through.
    pub fn slot(&self, candidate: Candidate) -> AttemptSlot<T, E> {
        AttemptSlot {
            candidate,
            started: Instant::now(),
            sink: Some(self.clone()),
        }
    }
}

/// One attempt's place in the outcome stream.
///
/// Filled exactly once. Dropping it unfilled (the attempt panicked or its task
/// was torn down) records [`AttemptError::Aborted`], so every dispatched
/// candidate is always accounted for.
pub struct AttemptSlot<T, E> {
    candidate: Candidate,
    started: Instant,
    sink: Option<OutcomeSink<T, E>>,
}

impl<T, E> AttemptSlot<T, E> {
    pub fn candidate(&self) -> &Candidate {
        &self.candidate
    }

    pub fn fill(mut self, result: Result<T, E>) -> Recorded {
        let Some(sink) = self.sink.take() else {
            return Recorded::Discarded;
        };
        let candidate = self.candidate.clone();
        let elapsed = self.started.elapsed();

        let outcome = match result {
            Ok(value) => Outcome::Success(Success {
                candidate,
                value,
                elapsed,
            }),
            Err(e) => Outcome::Failure(Failure {
                candidate,
                error: AttemptError::Backend(e),
                elapsed,
            }),
        };
        sink.record(outcome)
    }
}

impl<T, E> Drop for AttemptSlot<T, E> {
    fn drop(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.record(Outcome::Failure(Failure {
                candidate: self.candidate.clone(),
                error: AttemptError::Aborted,
                elapsed: self.started.elapsed(),
            }));
        }
    }
}

impl<T, E> Resolver<T, E> {
    pub fn expected(&self) -> usize {
        self.expected
    }

    /// Waits for the first success, or for `expected` failures.
    ///
    /// Returns as soon as a success lands, without waiting for the remaining
    /// attempts. If every sink is dropped early, whatever failures arrived
    /// are returned.
    pub async fn resolve(mut self) -> Result<Success<T>, Failures<E>> {
        let mut failures = Vec::with_capacity(self.expected);

        while failures.len() < self.expected {
            match self.rx.recv().await {
                Some(Outcome::Success(success)) => return Ok(success),
                Some(Outcome::Failure(failure)) => failures.push(failure),
                None => break,
            }
        }

        Err(Failures::new(failures))
    }
}
