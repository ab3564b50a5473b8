//! Palette and styles for the TUI dashboard.

use ratatui::prelude::*;

pub const TITLE_BG: Color = Color::Rgb(24, 26, 33);
pub const TITLE_FG: Color = Color::Rgb(143, 188, 187);

pub const COLUMN_FG: Color = Color::Rgb(129, 161, 193);

pub const CURSOR_BG: Color = Color::Rgb(94, 129, 172);
pub const CURSOR_FG: Color = Color::Rgb(236, 239, 244);

pub const OK_COLOR: Color = Color::Rgb(163, 190, 140);
pub const FAIL_COLOR: Color = Color::Rgb(191, 97, 106);
pub const SLOW_COLOR: Color = Color::Rgb(235, 203, 139);

pub const FRAME_COLOR: Color = Color::Rgb(67, 76, 94);
pub const TEXT_COLOR: Color = Color::Rgb(216, 222, 233);
pub const DIM_COLOR: Color = Color::Rgb(120, 128, 146);

fn bold(fg: Color) -> Style {
    Style::default().fg(fg).add_modifier(Modifier::BOLD)
}

pub fn title() -> Style {
    bold(TITLE_FG).bg(TITLE_BG)
}

pub fn column() -> Style {
    bold(COLUMN_FG)
}

pub fn cursor() -> Style {
    bold(CURSOR_FG).bg(CURSOR_BG)
}

pub fn frame() -> Style {
    Style::default().fg(FRAME_COLOR)
}

pub fn text() -> Style {
    Style::default().fg(TEXT_COLOR)
}

pub fn ok() -> Style {
    bold(OK_COLOR)
}

pub fn fail() -> Style {
    bold(FAIL_COLOR)
}

pub fn slow() -> Style {
    bold(SLOW_COLOR)
}

pub fn dim() -> Style {
    Style::default().fg(DIM_COLOR)
}

/// Green under `fast`, amber under `slow`, red beyond.
pub fn latency(ms: f64, fast: f64, slow_ms: f64) -> Style {
    if ms < fast {
        ok()
    } else if ms < slow_ms {
        slow()
    } else {
        fail()
    }
}

/// Bordered block with the dashboard's panel title style.
pub fn panel(title: impl Into<String>) -> ratatui::widgets::Block<'static> {
    ratatui::widgets::Block::default()
        .title(title.into())
        .title_style(bold(TEXT_COLOR))
        .borders(ratatui::widgets::Borders::ALL)
        .border_style(frame())
}
