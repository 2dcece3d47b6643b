//! Broadcast signal rendering.

use serde::{Deserialize, Serialize};

/// Callback token for the up direction.
pub const UP_TOKEN: &str = "UP";
/// Callback token for the down direction.
pub const DOWN_TOKEN: &str = "DOWN";

const TIMEFRAME_LINE: &str = "⌛ M1 1-MINUTE [ UTC-03:00 ]";
const DISCLAIMER_LINE: &str = "📍 NON-MTG";
const ATTRIBUTION_LINE: &str = "🧔🏻 @QuotexHubSupport";

/// Predicted price direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    /// Parse a callback token.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            UP_TOKEN => Some(Self::Up),
            DOWN_TOKEN => Some(Self::Down),
            _ => None,
        }
    }

    pub fn token(&self) -> &'static str {
        match self {
            Self::Up => UP_TOKEN,
            Self::Down => DOWN_TOKEN,
        }
    }

    /// Decorated label used on buttons and in the signal.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Up => "⬆️ UP 🟢",
            Self::Down => "⬇️ DOWN 🔴",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.token())
    }
}

/// Escape the characters Telegram's HTML parse mode treats as markup.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Render the broadcast text for a completed selection.
pub fn render_signal(pair: &str, time_label: &str, direction: Direction) -> String {
    let lines = [
        format!("📊 {}", escape_html(pair)),
        TIMEFRAME_LINE.to_string(),
        format!("⏰ {}", escape_html(time_label)),
        direction.label().to_string(),
        DISCLAIMER_LINE.to_string(),
        ATTRIBUTION_LINE.to_string(),
    ];

    lines
        .iter()
        .map(|line| format!("<b>{line}</b>"))
        .collect::<Vec<_>>()
        .join("\n")
}
