//! UI rendering functions for the TUI dashboard.

use ratatui::{
    prelude::*,
    widgets::{Cell, Gauge, Paragraph, Row, Table, Wrap},
};

use super::theme;
use crate::app::{App, Mode};

const SPARK: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

pub fn draw_ui(frame: &mut Frame, app: &App) {
    let [header, session, body, keys] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Length(4),
        Constraint::Min(0),
        Constraint::Length(5),
    ])
    .areas(frame.area());

    let [candidates, detail] =
        Layout::horizontal([Constraint::Percentage(58), Constraint::Percentage(42)]).areas(body);

    draw_header(frame, header);
    draw_session(frame, session, app);
    draw_candidates(frame, candidates, app);
    draw_detail(frame, detail, app);
    draw_keys(frame, keys);
}

fn draw_header(frame: &mut Frame, area: Rect) {
    let block = theme::panel(" Hedged Fan-out :: Coordination Dashboard ").title_style(theme::title());
    frame.render_widget(block, area);
}

fn format_uptime(secs: u64) -> String {
    match secs {
        s if s < 60 => format!("{s}s"),
        s if s < 3600 => format!("{}m {}s", s / 60, s % 60),
        s => format!("{}h {}m", s / 3600, (s % 3600) / 60),
    }
}

fn meter(pct: f64, width: usize) -> String {
    let filled = ((pct / 100.0) * width as f64) as usize;
    format!(
        "[{}{}]",
        "█".repeat(filled.min(width)),
        "░".repeat(width.saturating_sub(filled))
    )
}

fn draw_session(frame: &mut Frame, area: Rect, app: &App) {
    let success_rate = app.success_rate();
    let rate_style = if success_rate > 95.0 {
        theme::ok()
    } else if success_rate > 80.0 {
        theme::slow()
    } else {
        theme::fail()
    };
    let sep = || Span::styled(" │ ", theme::dim());

    let text = vec![
        Line::from(vec![
            Span::styled("Uptime ", theme::dim()),
            Span::styled(format_uptime(app.session_uptime().as_secs()), theme::text()),
            sep(),
            Span::styled("Calls ", theme::dim()),
            Span::styled(app.total_calls.to_string(), theme::text()),
            sep(),
            Span::styled("Answered ", theme::dim()),
            Span::styled(app.total_successes.to_string(), theme::ok()),
            sep(),
            Span::styled("Failed ", theme::dim()),
            Span::styled(
                app.total_errors.to_string(),
                if app.total_errors > 0 {
                    theme::fail()
                } else {
                    theme::text()
                },
            ),
        ]),
        Line::from(vec![
            Span::styled(format!("{:.1} calls/s", app.calls_per_second()), theme::slow()),
            sep(),
            Span::styled(format!("avg {:.0}ms", app.average_latency()), theme::text()),
            sep(),
            Span::styled(meter(success_rate, 15), rate_style),
            Span::styled(format!(" {success_rate:.1}% answered"), theme::text()),
        ]),
    ];

    frame.render_widget(Paragraph::new(text).block(theme::panel(" Session ")), area);
}

fn sparkline(data: &[u64]) -> String {
    let (Some(&max), Some(&min)) = (data.iter().max(), data.iter().min()) else {
        return "───────────".to_string();
    };
    let range = (max - min).max(1);

    data.iter()
        .rev()
        .take(11)
        .rev()
        .map(|&v| SPARK[(((v - min) as f64 / range as f64 * 7.0) as usize).min(7)])
        .collect()
}

fn draw_candidates(frame: &mut Frame, area: Rect, app: &App) {
    let stats = &app.stats_snapshot;
    let total_wins: u64 = stats.values().map(|s| s.wins).sum();
    let active = app.call_candidates();

    let header = Row::new(
        ["Candidate", "Profile", "Wins", "Avg ms", "Errors", "Trend", "Win Rate"]
            .into_iter()
            .map(|h| Cell::from(h).style(theme::column())),
    )
    .bottom_margin(1);

    let rows = app
        .candidates
        .iter()
        .enumerate()
        .map(|(idx, (candidate, profile))| {
            let snapshot = stats.get(candidate);
            let wins = snapshot.map(|s| s.wins).unwrap_or(0);
            let avg_ms = snapshot.map(|s| s.avg_latency_ms).unwrap_or(0.0);
            let errors = snapshot.map(|s| s.errors).unwrap_or(0);
            let win_rate = if total_wins > 0 {
                wins as f64 / total_wins as f64 * 100.0
            } else {
                0.0
            };

            let history: Vec<u64> = app
                .latency_history
                .get(candidate)
                .map(|h| h.iter().copied().collect())
                .unwrap_or_default();

            let name_style = if active.contains(candidate) {
                theme::text()
            } else {
                theme::dim()
            };

            let row = Row::new(vec![
                Cell::from(candidate.to_string()).style(name_style),
                Cell::from(profile.to_string()).style(theme::dim()),
                Cell::from(wins.to_string()).style(if wins > 0 { theme::ok() } else { theme::text() }),
                Cell::from(format!("{avg_ms:.1}")),
                Cell::from(errors.to_string()).style(if errors > 0 {
                    theme::fail()
                } else {
                    theme::text()
                }),
                Cell::from(sparkline(&history)).style(theme::latency(avg_ms, 150.0, 400.0)),
                Cell::from(format!("{} {win_rate:.0}%", meter(win_rate, 10))),
            ]);

            if idx == app.selected_idx {
                row.style(theme::cursor())
            } else {
                row
            }
        });

    let title = match app.mode {
        Mode::SingleCandidate => " Candidates ".to_string(),
        _ => format!(" Candidates (first {} active) ", app.candidate_count),
    };

    let table = Table::new(
        rows,
        [
            Constraint::Length(10),
            Constraint::Length(20),
            Constraint::Length(5),
            Constraint::Length(7),
            Constraint::Length(6),
            Constraint::Length(12),
            Constraint::Min(16),
        ],
    )
    .header(header)
    .block(theme::panel(title))
    .column_spacing(1);

    frame.render_widget(table, area);
}

fn draw_detail(frame: &mut Frame, area: Rect, app: &App) {
    let mut constraints = vec![Constraint::Length(7), Constraint::Min(0)];
    if app.batch_mode {
        constraints.push(Constraint::Length(3));
    }
    let sections = Layout::vertical(constraints).split(area);

    draw_config(frame, sections[0], app);
    draw_last_call(frame, sections[1], app);
    if app.batch_mode {
        draw_batch(frame, sections[2], app);
    }
}

fn draw_config(frame: &mut Frame, area: Rect, app: &App) {
    let cfg = app.coordinator.config();
    let timeout = cfg
        .overall_timeout
        .map(|t| format!("{}ms", t.as_millis()))
        .unwrap_or_else(|| "none".into());
    let selected = app
        .selected_candidate()
        .map(|c| c.to_string())
        .unwrap_or_else(|| "-".into());
    let batch = if app.batch_mode {
        format!("ON ({}/{})", app.batch_current, app.batch_count)
    } else {
        format!("OFF (count: {})", app.batch_count)
    };

    let field = |label: &'static str, value: String, style: Style| {
        Line::from(vec![Span::styled(label, theme::dim()), Span::styled(value, style)])
    };

    let text = vec![
        field("Mode     : ", app.mode_string(), theme::slow()),
        field("Selected : ", selected, theme::text()),
        field(
            "Hedge    : ",
            format!("{}ms", cfg.hedge_after.as_millis()),
            theme::text(),
        ),
        field("Deadline : ", timeout, theme::text()),
        field(
            "Batch    : ",
            batch,
            if app.batch_mode { theme::ok() } else { theme::dim() },
        ),
    ];

    let paragraph = Paragraph::new(text)
        .block(theme::panel(" Configuration "))
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn draw_last_call(frame: &mut Frame, area: Rect, app: &App) {
    let winner = app
        .last_candidate
        .as_ref()
        .map(|c| c.to_string())
        .unwrap_or_else(|| "-".into());
    let (latency, latency_style) = match app.last_latency_ms {
        Some(ms) => (format!("{ms:.1} ms"), theme::latency(ms, 200.0, 500.0)),
        None => ("-".into(), theme::dim()),
    };

    let text = vec![
        Line::from(vec![
            Span::styled("Winner  : ", theme::dim()),
            Span::styled(winner, theme::ok()),
        ]),
        Line::from(vec![
            Span::styled("Latency : ", theme::dim()),
            Span::styled(latency, latency_style),
        ]),
        Line::from(vec![
            Span::styled("Result  : ", theme::dim()),
            Span::styled(app.last_message.as_str(), theme::text()),
        ]),
    ];

    let paragraph = Paragraph::new(text)
        .block(theme::panel(" Last Call "))
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn draw_batch(frame: &mut Frame, area: Rect, app: &App) {
    let pct = if app.batch_count > 0 {
        (app.batch_current as f64 / app.batch_count as f64 * 100.0) as u16
    } else {
        0
    };

    let gauge = Gauge::default()
        .block(theme::panel(" Batch "))
        .gauge_style(theme::ok())
        .percent(pct.min(100))
        .label(format!("{}/{}", app.batch_current, app.batch_count));
    frame.render_widget(gauge, area);
}

fn draw_keys(frame: &mut Frame, area: Rect) {
    let binds: [&[(&str, &str)]; 3] = [
        &[
            ("↑/↓", "Select candidate"),
            ("Space", "Query selected only"),
            ("Tab", "Cycle mode"),
        ],
        &[
            ("+/-", "Active candidates"),
            ("r", "Run call"),
            ("b", "Toggle batch"),
        ],
        &[(",/.", "Batch size"), ("s", "Reset stats"), ("q", "Quit")],
    ];

    let lines: Vec<Line> = binds
        .iter()
        .map(|row| {
            let mut spans = vec![Span::raw("  ")];
            for (idx, (key, what)) in row.iter().enumerate() {
                if idx > 0 {
                    spans.push(Span::styled("  │  ", theme::dim()));
                }
                spans.push(Span::styled(*key, theme::slow()));
                spans.push(Span::styled(format!(" {what:<20}"), theme::dim()));
            }
            Line::from(spans)
        })
        .collect();

    frame.render_widget(Paragraph::new(lines).block(theme::panel(" Keys ")), area);
}
