//! Interactive TUI dashboard for exercising fan-out and hedged failover.
//!
//! This binary races simulated backends through the coordinator and shows
//! what happens in real time. Features include:
//! - Plain fan-out, hedged failover and single-candidate modes
//! - Batch testing capabilities
//! - Per-candidate win/error statistics and latency trends
//!
//! Logs go to `./logs/` since the terminal belongs to the dashboard.

mod app;
mod call;
mod env;
mod sim;
mod ui;

use std::time::Duration;

use app::{App, AppEvent};
use call::spawn_call;
use color_eyre::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use env::build_coordinator_from_env;
use tokio::sync::mpsc;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use ui::draw_ui;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let file_appender = tracing_appender::rolling::never(
        "./logs",
        format!("{}-{}.log", env!("CARGO_PKG_NAME"), std::process::id()),
    );
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(non_blocking)
        .with_ansi(false)
        .init();

    let (coordinator, candidates) = build_coordinator_from_env()?;
    let mut app = App::new(coordinator, candidates);

    let mut terminal = ratatui::init();
    terminal.clear()?;

    let result = run_app(&mut terminal, &mut app).await;

    ratatui::restore();

    // Give stragglers a moment to wind down so their final log lines land.
    if tokio::time::timeout(Duration::from_secs(1), app.coordinator.drain())
        .await
        .is_err()
    {
        warn!(
            in_flight = app.coordinator.in_flight(),
            "attempts still running at exit, abandoning them"
        );
    }

    result
}

async fn run_app(terminal: &mut ratatui::DefaultTerminal, app: &mut App) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<AppEvent>();

    app.refresh_stats();

    loop {
        while let Ok(ev) = rx.try_recv() {
            match ev {
                AppEvent::CallFinished {
                    candidate,
                    latency_ms,
                    ok,
                    message,
                } => {
                    app.set_last_result(candidate, latency_ms, ok, message);
                }
            }
        }

        terminal.draw(|frame| draw_ui(frame, app))?;

        if app.should_run_call() {
            spawn_call(app, tx.clone());
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        if crossterm::event::poll(Duration::from_millis(50))? {
            if let Event::Key(KeyEvent {
                code,
                kind: KeyEventKind::Press,
                ..
            }) = event::read()?
            {
                match code {
                    KeyCode::Char('q') => break,
                    KeyCode::Up => app.prev_candidate(),
                    KeyCode::Down => app.next_candidate(),
                    KeyCode::Tab => app.toggle_mode(),
                    KeyCode::Char('r') => {
                        spawn_call(app, tx.clone());
                    }
                    KeyCode::Char(' ') => {
                        app.mode = app::Mode::SingleCandidate;
                        spawn_call(app, tx.clone());
                    }
                    KeyCode::Char('b') => {
                        app.toggle_batch_mode();
                    }
                    KeyCode::Char('+') | KeyCode::Char('=') => {
                        app.increase_candidate_count();
                    }
                    KeyCode::Char('-') | KeyCode::Char('_') => {
                        app.decrease_candidate_count();
                    }
                    KeyCode::Char('[') | KeyCode::Char(',') => {
                        app.decrease_batch_count();
                    }
                    KeyCode::Char(']') | KeyCode::Char('.') => {
                        app.increase_batch_count();
                    }
                    KeyCode::Char('s') => {
                        app.reset_stats();
                    }
                    _ => {}
                }
            }
        }
    }

    Ok(())
}
