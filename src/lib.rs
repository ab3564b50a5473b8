//! Multi-backend request coordination with first-success fan-out and hedged
//! failover.
//!
//! Given a set of candidate backends that can each answer a query, this crate
//! obtains one successful answer with minimal latency, never leaks background
//! work into a blocked state, and always ends a call with exactly one result.
//!
//! # Quick Start
//!
//! ```no_run
//! use hedged_fanout::{backend_fn, Candidate, Coordinator, FanoutConfig};
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = backend_fn(|cancel: CancellationToken, addr: Candidate, key: String| async move {
//!     tokio::select! {
//!         _ = cancel.cancelled() => Err(std::io::Error::other("cancelled")),
//!         _ = tokio::time::sleep(Duration::from_millis(10)) => Ok(format!("{key} from {addr}")),
//!     }
//! });
//!
//! let coordinator = Coordinator::new(backend, FanoutConfig::failover())?;
//! let candidates: Vec<Candidate> = vec!["10.0.0.1:7000".into(), "10.0.0.2:7000".into()];
//!
//! if let Some(answer) = coordinator
//!     .request_with_failover(&CancellationToken::new(), &candidates, "user:42".to_string())
//!     .await?
//! {
//!     println!("{} answered in {:?}: {}", answer.candidate, answer.latency, answer.value);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Coordination Modes
//!
//! - **Plain fan-out** ([`Coordinator::resolve`]): every candidate is queried
//!   at once; the first success wins.
//! - **Hedged failover** ([`Coordinator::request_with_failover`]):
//!   1. Queries the first candidate
//!   2. If it fails, moves on to the next candidate immediately
//!   3. If it is still silent after `hedge_after`, starts the next candidate
//!      while the slow one keeps running
//!   4. Returns the first success from any attempt
//!
//! In both modes a call that ends cancels its remaining attempts through their
//! [`CancellationToken`](tokio_util::sync::CancellationToken) and returns
//! without waiting for them.
//!
//! # Preset Configurations
//!
//! Use `FanoutConfig::failover()`, `::low_latency()`, or `::conservative()`
//! for common strategies, or build a custom configuration.

pub mod aggregator;
pub mod backend;
pub mod config;
pub mod coordinator;
pub mod errors;

pub use aggregator::{aggregator, AttemptSlot, Outcome, OutcomeSink, Recorded, Resolver, Success};
pub use backend::{backend_fn, Backend, BackendFn};
pub use config::{Candidate, EmptyPolicy, FanoutConfig};
pub use coordinator::{Answer, CandidateStatsSnapshot, Coordinator};
pub use errors::{AttemptError, CancelCause, ConfigError, Failure, Failures, FanoutError};
