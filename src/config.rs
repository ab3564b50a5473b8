use std::{fmt, sync::Arc, time::Duration};

use crate::errors::ConfigError;

/// Opaque address of a backend that can answer a query.
///
/// Cloning is cheap; candidates are handed to every attempt spawned for them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Candidate(Arc<str>);

impl Candidate {
    pub fn new(addr: impl Into<Arc<str>>) -> Self {
        Self(addr.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Candidate {
    fn from(addr: &str) -> Self {
        Self(addr.into())
    }
}

impl From<String> for Candidate {
    fn from(addr: String) -> Self {
        Self(addr.into())
    }
}

/// What a call with an empty candidate set returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyPolicy {
    /// Degenerate but valid call: resolves to `Ok(None)` immediately.
    #[default]
    Succeed,
    /// Treat an empty candidate set as [`FanoutError::NoCandidates`].
    Reject,
}

/// Coordination strategy configuration.
///
/// Controls how long the failover mode waits on one candidate before hedging
/// to the next, how many candidates a single call may consult, and when the
/// whole call gives up.
#[derive(Debug, Clone)]
pub struct FanoutConfig {
    /// Grace period granted to each failover attempt before the next candidate
    /// is dispatched alongside it.
    ///
    /// The slow attempt is not cancelled when the grace period elapses; its
    /// eventual answer still counts.
    pub hedge_after: Duration,

    /// Maximum number of distinct candidates consulted by a single call.
    ///
    /// Applied after de-duplication, keeping input order.
    pub max_candidates: usize,

    /// Optional deadline for the whole call.
    ///
    /// When it fires the call returns a cancellation error, regardless of how
    /// many attempts are still outstanding.
    pub overall_timeout: Option<Duration>,

    /// Behaviour for an empty candidate set.
    pub empty: EmptyPolicy,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self::failover()
    }
}

impl FanoutConfig {
    /// Classic failover: half a second of grace per candidate, no deadline.
    pub fn failover() -> Self {
        Self {
            hedge_after: Duration::from_millis(500),
            max_candidates: usize::MAX,
            overall_timeout: None,
            empty: EmptyPolicy::Succeed,
        }
    }

    /// Creates a low-latency configuration.
    ///
    /// Hedges quickly and bounds the call:
    /// - 50ms grace period
    /// - 1 second deadline
    pub fn low_latency() -> Self {
        Self {
            hedge_after: Duration::from_millis(50),
            max_candidates: usize::MAX,
            overall_timeout: Some(Duration::from_secs(1)),
            empty: EmptyPolicy::Succeed,
        }
    }

    /// Creates a conservative configuration.
    ///
    /// Minimizes duplicate work, only hedging when a candidate is clearly slow:
    /// - 1 second grace period
    /// - 5 second deadline
    pub fn conservative() -> Self {
        Self {
            hedge_after: Duration::from_secs(1),
            max_candidates: usize::MAX,
            overall_timeout: Some(Duration::from_secs(5)),
            empty: EmptyPolicy::Succeed,
        }
    }

    /// Rejects settings that can only come from a programming mistake.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_candidates == 0 {
            return Err(ConfigError("max_candidates must be at least 1"));
        }
        if self.overall_timeout == Some(Duration::ZERO) {
            return Err(ConfigError("overall_timeout must be non-zero"));
        }
        Ok(())
    }
}
