use std::{fmt, time::Duration};

use crate::config::Candidate;

/// Why a single attempt against one candidate produced no value.
#[derive(thiserror::Error, Debug)]
pub enum AttemptError<E> {
    /// The backend returned an error; carried verbatim.
    #[error("{0}")]
    Backend(E),

    /// The attempt's task ended without producing an outcome, for instance
    /// because the backend panicked.
    #[error("attempt aborted before producing an outcome")]
    Aborted,
}

/// One candidate's failure, as recorded by the aggregator.
#[derive(Debug)]
pub struct Failure<E> {
    pub candidate: Candidate,
    pub error: AttemptError<E>,
    /// Time from dispatch until the failure was recorded.
    pub elapsed: Duration,
}

/// Every failure collected during a call that found no success.
///
/// Order follows arrival, not candidate order.
#[derive(Debug)]
pub struct Failures<E>(Vec<Failure<E>>);

impl<E> Failures<E> {
    pub(crate) fn new(failures: Vec<Failure<E>>) -> Self {
        Self(failures)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Failure<E>> {
        self.0.iter()
    }

    pub fn into_inner(self) -> Vec<Failure<E>> {
        self.0
    }
}

impl<E> IntoIterator for Failures<E> {
    type Item = Failure<E>;
    type IntoIter = std::vec::IntoIter<Failure<E>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<E: fmt::Display> fmt::Display for Failures<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, failure) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", failure.candidate, failure.error)?;
        }
        Ok(())
    }
}

/// What stopped a call before it found an answer.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelCause {
    /// The caller's cancellation token fired.
    #[error("cancelled by caller")]
    Caller,

    /// The configured overall timeout elapsed.
    #[error("deadline of {0:?} elapsed")]
    Deadline(Duration),
}

/// Errors that can occur while coordinating a request across candidates.
#[derive(thiserror::Error, Debug)]
pub enum FanoutError<E> {
    /// Every dispatched candidate failed.
    ///
    /// Contains one entry per candidate with its individual error.
    #[error("all candidates failed: {0}")]
    AllFailed(Failures<E>),

    /// The call was cancelled by the caller or hit its deadline.
    #[error("request cancelled: {0}")]
    Cancelled(CancelCause),

    /// No candidates were supplied and the config rejects empty calls.
    #[error("no candidates supplied")]
    NoCandidates,
}

/// A [`FanoutConfig`](crate::FanoutConfig) that can only come from a programming mistake.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("invalid configuration: {0}")]
pub struct ConfigError(pub &'static str);

impl<E> FanoutError<E> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FanoutError::Cancelled(_))
    }

    /// Failures collected before giving up, if every candidate failed.
    pub fn failures(&self) -> Option<&Failures<E>> {
        match self {
            FanoutError::AllFailed(failures) => Some(failures),
            _ => None,
        }
    }
}
