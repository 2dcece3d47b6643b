//! Inline keyboard grids for the wizard menus.

use serde::Serialize;

/// What pressing a button does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonAction {
    /// Send an opaque token back to the bot as a callback query.
    CallbackData(String),
    /// Open an external link.
    Url(String),
}

/// A single keyboard cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Button {
    pub text: String,
    #[serde(flatten)]
    pub action: ButtonAction,
}

impl Button {
    pub fn callback(text: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            action: ButtonAction::CallbackData(token.into()),
        }
    }

    pub fn url(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            action: ButtonAction::Url(url.into()),
        }
    }

    /// The callback token, if this is a callback button.
    pub fn token(&self) -> Option<&str> {
        match &self.action {
            ButtonAction::CallbackData(token) => Some(token),
            ButtonAction::Url(_) => None,
        }
    }
}

/// Row-major grid of buttons, serialised as Telegram's `InlineKeyboardMarkup`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Keyboard {
    #[serde(rename = "inline_keyboard")]
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    /// Chunk `labels` into rows of `width`; every token equals its label.
    ///
    /// Order is preserved. A width of 0 is treated as 1.
    pub fn grid<S: AsRef<str>>(labels: &[S], width: usize) -> Self {
        let rows = labels
            .chunks(width.max(1))
            .map(|row| {
                row.iter()
                    .map(|label| Button::callback(label.as_ref(), label.as_ref()))
                    .collect()
            })
            .collect();
        Self { rows }
    }

    /// Like [`Keyboard::grid`], with a visible label distinct from each token.
    pub fn choices(items: &[(&str, &str)], width: usize) -> Self {
        let rows = items
            .chunks(width.max(1))
            .map(|row| {
                row.iter()
                    .map(|(label, token)| Button::callback(*label, *token))
                    .collect()
            })
            .collect();
        Self { rows }
    }

    /// A single-button keyboard opening `url`.
    pub fn link(text: &str, url: &str) -> Self {
        Self {
            rows: vec![vec![Button::url(text, url)]],
        }
    }

    /// All callback tokens in row order.
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().flatten().filter_map(Button::token)
    }

    pub fn button_count(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }
}
