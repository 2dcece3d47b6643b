//! Wizard state machine, one session per conversation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::menu::Keyboard;
use super::signal::{Direction, render_signal};
use super::times::offer_times;
use crate::error::WizardError;

/// Currency pairs offered on the first menu, in display order.
pub const PAIRS: &[&str] = &[
    "USD/ARS-OTC",
    "USD/INR-OTC",
    "USD/MXN-OTC",
    "USD/TRY-OTC",
    "USD/BRL-OTC",
    "USD/BDT-OTC",
    "USD/PKR-OTC",
    "USD/PHP-OTC",
    "USD/IDR-OTC",
    "USD/COP-OTC",
    "USD/NGN-OTC",
    "USD/EGP-OTC",
    "USD/DZD-OTC",
    "USD/ZAR-OTC",
    "EUR/USD-OTC",
    "EUR/GBP-OTC",
    "NZD/CHF-OTC",
    "NZD/CAD-OTC",
    "NZD/JPY-OTC",
    "NZD/USD-OTC",
    "AUD/NZD-OTC",
    "EUR/NZD-OTC",
    "CAD/CHF-OTC",
    "CAD/JPY-OTC",
];

/// Callback token of the confirm button.
pub const SEND_TOKEN: &str = "SEND_TO_CHANNEL";

const PAIR_MENU_WIDTH: usize = 2;
const TIME_MENU_WIDTH: usize = 1;
const DIRECTION_MENU_WIDTH: usize = 1;

/// The step a session is waiting on.
///
/// Progresses linearly: SelectPair → SelectTime → SelectDirection → Confirm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardState {
    SelectPair,
    SelectTime,
    SelectDirection,
    Confirm,
}

impl WizardState {
    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: WizardState) -> bool {
        use WizardState::*;
        matches!(
            (self, target),
            (SelectPair, SelectTime) | (SelectTime, SelectDirection) | (SelectDirection, Confirm)
        )
    }
}

impl std::fmt::Display for WizardState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::SelectPair => "select_pair",
            Self::SelectTime => "select_time",
            Self::SelectDirection => "select_direction",
            Self::Confirm => "confirm",
        };
        write!(f, "{s}")
    }
}

/// A menu to show the user: HTML text plus its keyboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screen {
    pub text: String,
    pub keyboard: Keyboard,
}

/// What an accepted selection asks the caller to do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Replace the current menu with this screen.
    Prompt(Screen),
    /// The user confirmed; broadcast this text.
    Deliver { text: String },
}

/// One user's in-progress run through the wizard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    state: WizardState,
    pair: Option<String>,
    offered_times: Vec<String>,
    time_label: Option<String>,
    direction: Option<Direction>,
    rendered_text: Option<String>,
    /// Message carrying this session's menu, once it has been sent.
    menu_message_id: Option<i64>,
}

impl Session {
    /// Start a session and build the catalog screen.
    pub fn start() -> (Self, Screen) {
        let session = Self {
            state: WizardState::SelectPair,
            pair: None,
            offered_times: Vec::new(),
            time_label: None,
            direction: None,
            rendered_text: None,
            menu_message_id: None,
        };
        let screen = Screen {
            text: "<b>Select A Currency Pair For The Signal:</b>".to_string(),
            keyboard: Keyboard::grid(PAIRS, PAIR_MENU_WIDTH),
        };
        (session, screen)
    }

    pub fn state(&self) -> WizardState {
        self.state
    }

    pub fn pair(&self) -> Option<&str> {
        self.pair.as_deref()
    }

    pub fn time_label(&self) -> Option<&str> {
        self.time_label.as_deref()
    }

    pub fn direction(&self) -> Option<Direction> {
        self.direction
    }

    pub fn rendered_text(&self) -> Option<&str> {
        self.rendered_text.as_deref()
    }

    pub fn offered_times(&self) -> &[String] {
        &self.offered_times
    }

    pub fn menu_message_id(&self) -> Option<i64> {
        self.menu_message_id
    }

    /// Bind the session to the message its menu was posted as.
    pub fn attach_menu(&mut self, message_id: i64) {
        self.menu_message_id = Some(message_id);
    }

    /// Whether a press on `message_id` belongs to this session's menu.
    ///
    /// A session whose menu was never posted owns no message.
    pub fn owns_menu(&self, message_id: i64) -> bool {
        self.menu_message_id == Some(message_id)
    }

    /// Apply one selection token.
    ///
    /// Tokens that do not belong to the current menu are rejected and leave
    /// the session untouched.
    pub fn select(&mut self, token: &str, now: DateTime<Utc>) -> Result<Transition, WizardError> {
        match self.state {
            WizardState::SelectPair => self.choose_pair(token, now),
            WizardState::SelectTime => self.choose_time(token),
            WizardState::SelectDirection => self.choose_direction(token),
            WizardState::Confirm => self.confirm(token),
        }
    }

    fn choose_pair(&mut self, token: &str, now: DateTime<Utc>) -> Result<Transition, WizardError> {
        if !PAIRS.iter().any(|p| *p == token) {
            return Err(self.unexpected(token));
        }

        let times = offer_times(now);
        let screen = Screen {
            text: format!(
                "<b>You selected</b>: {token}\n\
                 <b>Now choose the time for the signal (Brazil - UTC-03:00):</b>"
            ),
            keyboard: Keyboard::grid(times.as_slice(), TIME_MENU_WIDTH),
        };

        self.pair = Some(token.to_string());
        self.offered_times = times;
        self.advance(WizardState::SelectTime);
        Ok(Transition::Prompt(screen))
    }

    fn choose_time(&mut self, token: &str) -> Result<Transition, WizardError> {
        if !self.offered_times.iter().any(|t| t == token) {
            return Err(self.unexpected(token));
        }
        let pair = self.require(self.pair.as_deref(), "pair")?;

        let choices = [Direction::Up, Direction::Down].map(|d| (d.label(), d.token()));
        let screen = Screen {
            text: format!(
                "<b>Pair</b>: {pair}\n\
                 <b>Time</b>: {token}\n\n\
                 <b>Choose the direction:</b>"
            ),
            keyboard: Keyboard::choices(&choices, DIRECTION_MENU_WIDTH),
        };

        self.time_label = Some(token.to_string());
        self.advance(WizardState::SelectDirection);
        Ok(Transition::Prompt(screen))
    }

    fn choose_direction(&mut self, token: &str) -> Result<Transition, WizardError> {
        let direction = Direction::from_token(token).ok_or_else(|| self.unexpected(token))?;
        let pair = self.require(self.pair.as_deref(), "pair")?;
        let time_label = self.require(self.time_label.as_deref(), "time")?;

        let text = render_signal(&pair, &time_label, direction);
        let screen = Screen {
            text: text.clone(),
            keyboard: Keyboard::choices(&[("Send to Channel", SEND_TOKEN)], 1),
        };

        self.direction = Some(direction);
        self.rendered_text = Some(text);
        self.advance(WizardState::Confirm);
        Ok(Transition::Prompt(screen))
    }

    fn confirm(&mut self, token: &str) -> Result<Transition, WizardError> {
        if token != SEND_TOKEN {
            return Err(self.unexpected(token));
        }
        self.require(self.pair.as_deref(), "pair")?;
        self.require(self.time_label.as_deref(), "time")?;
        self.require(self.direction.map(|d| d.token()), "direction")?;
        let text = self.require(self.rendered_text.as_deref(), "rendered text")?;
        Ok(Transition::Deliver { text })
    }

    fn advance(&mut self, target: WizardState) {
        debug_assert!(self.state.can_transition_to(target));
        self.state = target;
    }

    fn unexpected(&self, token: &str) -> WizardError {
        WizardError::UnexpectedSelection {
            state: self.state,
            token: token.to_string(),
        }
    }

    fn require(&self, value: Option<&str>, field: &'static str) -> Result<String, WizardError> {
        value
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or(WizardError::MissingSelection {
                state: self.state,
                field,
            })
    }
}
