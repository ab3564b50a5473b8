//! Coordinated call execution for the TUI dashboard.

use std::time::Instant;

use hedged_fanout::{Answer, Candidate, FanoutError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    app::{App, AppEvent, Mode},
    sim::SimError,
};

/// Spawns a coordinated call based on the current app configuration.
///
/// The call is executed in a background task and sends the result via the provided channel.
pub fn spawn_call(app: &mut App, tx: mpsc::UnboundedSender<AppEvent>) {
    let mode = app.mode;
    let coordinator = app.coordinator.clone();
    let candidates = app.call_candidates();
    let key = app.next_query();

    tokio::spawn(async move {
        let start = Instant::now();
        let cancel = CancellationToken::new();

        let result = match mode {
            Mode::Fanout | Mode::SingleCandidate => {
                coordinator.resolve(&cancel, &candidates, key).await
            }
            Mode::Failover => {
                coordinator
                    .request_with_failover(&cancel, &candidates, key)
                    .await
            }
        };

        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        let (candidate, ok, message) = describe(result);

        let _ = tx.send(AppEvent::CallFinished {
            candidate,
            latency_ms: elapsed_ms,
            ok,
            message,
        });
    });
}

fn describe(
    result: Result<Option<Answer<String>>, FanoutError<SimError>>,
) -> (Option<Candidate>, bool, String) {
    match result {
        Ok(Some(answer)) => (Some(answer.candidate), true, answer.value),
        Ok(None) => (None, false, "no candidates selected".to_string()),
        Err(e) => (None, false, e.to_string()),
    }
}
