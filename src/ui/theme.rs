//! Theme and styling configuration.

use ratatui::style::Color;

/// Color theme for the application.
#[derive(Debug, Clone)]
pub struct Theme {
    /// Primary foreground color.
    pub fg: Color,
    /// Borders, prompts and titles.
    pub accent: Color,
    /// Hints and secondary text.
    pub muted: Color,
    /// Background of the highlighted suggestion.
    pub highlight_bg: Color,
    /// Key hints.
    pub warning: Color,
    /// Confirmations.
    pub success: Color,
    /// Failures.
    pub error: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            fg: Color::White,
            accent: Color::Cyan,
            muted: Color::DarkGray,
            highlight_bg: Color::DarkGray,
            warning: Color::Yellow,
            success: Color::Green,
            error: Color::Red,
        }
    }
}
