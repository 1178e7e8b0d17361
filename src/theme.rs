//! Brand palette and shared styles.

use ratatui::style::{Color, Modifier, Style};

pub const CREAM: Color = Color::Rgb(0xFD, 0xF6, 0xE3);
pub const WARM_BEIGE: Color = Color::Rgb(0xF5, 0xE6, 0xD3);
pub const SAGE: Color = Color::Rgb(0x9C, 0xAF, 0x88);
pub const FOREST: Color = Color::Rgb(0x4A, 0x5D, 0x23);
pub const TERRACOTTA: Color = Color::Rgb(0xD4, 0xA5, 0x74);
pub const BROWN: Color = Color::Rgb(0x8B, 0x45, 0x13);
pub const DARK_GREEN: Color = Color::Rgb(0x2D, 0x3E, 0x0F);

pub fn title() -> Style {
    Style::default().fg(FOREST).add_modifier(Modifier::BOLD)
}

pub fn muted() -> Style {
    Style::default().fg(BROWN)
}

pub fn assistant_border() -> Style {
    Style::default().fg(SAGE)
}

pub fn user_border() -> Style {
    Style::default().fg(TERRACOTTA)
}

pub fn assistant_text() -> Style {
    Style::default().fg(DARK_GREEN)
}

pub fn user_text() -> Style {
    Style::default().fg(FOREST)
}

pub fn selected() -> Style {
    Style::default()
        .bg(SAGE)
        .fg(DARK_GREEN)
        .add_modifier(Modifier::BOLD)
}

pub fn disabled() -> Style {
    Style::default().fg(Color::DarkGray)
}
