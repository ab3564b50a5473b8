//! Dashboard rendering.

mod draw;
mod theme;

pub use draw::draw_ui;
