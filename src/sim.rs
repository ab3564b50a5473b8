//! Simulated backends raced by the dashboard.

use std::{collections::HashMap, fmt, future::Future, sync::Arc, time::Duration};

use hedged_fanout::{Backend, Candidate};
use rand::Rng;
use tokio_util::sync::CancellationToken;

/// How a simulated backend behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Answers after `base_ms` plus up to `jitter_ms`, failing `fail_pct`% of the time.
    Latency {
        base_ms: u64,
        jitter_ms: u64,
        fail_pct: u8,
    },
    /// Never answers; only returns once told to stop.
    Hang,
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Profile::Latency {
                base_ms,
                jitter_ms,
                fail_pct,
            } => write!(f, "{base_ms}±{jitter_ms}ms, {fail_pct}% fail"),
            Profile::Hang => f.write_str("hangs"),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum SimError {
    #[error("{0} refused the request")]
    Refused(Candidate),
    #[error("{0} stopped: call already settled")]
    Cancelled(Candidate),
    #[error("{0} is not a known backend")]
    Unknown(Candidate),
}

#[derive(Clone)]
pub struct SimBackend {
    profiles: Arc<HashMap<Candidate, Profile>>,
}

impl SimBackend {
    pub fn new(profiles: &[(Candidate, Profile)]) -> Self {
        Self {
            profiles: Arc::new(profiles.iter().cloned().collect()),
        }
    }
}

impl Backend<String> for SimBackend {
    type Value = String;
    type Error = SimError;

    fn fetch(
        &self,
        cancel: CancellationToken,
        candidate: &Candidate,
        key: &String,
    ) -> impl Future<Output = Result<String, SimError>> + Send {
        // Roll the dice up front; the rng must not live across an await.
        let plan = self.profiles.get(candidate).map(|profile| match *profile {
            Profile::Latency {
                base_ms,
                jitter_ms,
                fail_pct,
            } => {
                let mut rng = rand::thread_rng();
                let delay = base_ms + rng.gen_range(0..=jitter_ms);
                let fails = rng.gen_range(0..100u8) < fail_pct;
                Some((Duration::from_millis(delay), fails))
            }
            Profile::Hang => None,
        });
        let candidate = candidate.clone();
        let key = key.clone();

        async move {
            let Some(plan) = plan else {
                return Err(SimError::Unknown(candidate));
            };
            let Some((delay, fails)) = plan else {
                cancel.cancelled().await;
                return Err(SimError::Cancelled(candidate));
            };

            tokio::select! {
                _ = cancel.cancelled() => Err(SimError::Cancelled(candidate)),
                _ = tokio::time::sleep(delay) => {
                    if fails {
                        Err(SimError::Refused(candidate))
                    } else {
                        Ok(format!("{key} served by {candidate} in {}ms", delay.as_millis()))
                    }
                }
            }
        }
    }
}
