//! Messenger abstraction and the events it produces.

use async_trait::async_trait;
use futures::stream::Stream;
use std::pin::Pin;

use crate::error::ChannelError;
use crate::wizard::Keyboard;

/// Identifies one conversation participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChatUser {
    pub chat_id: i64,
    pub user_id: i64,
}

/// Something the user did that the wizard must react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotEvent {
    /// A `/command`; `name` is lower-cased without the slash or `@botname`.
    Command {
        from: ChatUser,
        message_id: i64,
        name: String,
    },
    /// Any other text message.
    Text {
        from: ChatUser,
        message_id: i64,
        text: String,
    },
    /// An inline keyboard button press.
    Selection {
        from: ChatUser,
        callback_id: String,
        /// Message carrying the keyboard; absent for inline-mode messages.
        message_id: Option<i64>,
        token: String,
    },
}

impl BotEvent {
    pub fn sender(&self) -> ChatUser {
        match self {
            Self::Command { from, .. } | Self::Text { from, .. } | Self::Selection { from, .. } => {
                *from
            }
        }
    }
}

/// Stream of decoded events.
pub type EventStream = Pin<Box<dyn Stream<Item = BotEvent> + Send>>;

/// How Telegram should interpret message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    Html,
    Plain,
}

/// A message to send or to write over an existing one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub text: String,
    pub parse_mode: ParseMode,
    pub keyboard: Option<Keyboard>,
}

impl OutgoingMessage {
    pub fn html(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            parse_mode: ParseMode::Html,
            keyboard: None,
        }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            parse_mode: ParseMode::Plain,
            keyboard: None,
        }
    }

    pub fn with_keyboard(mut self, keyboard: Keyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }
}

/// Outbound side of a chat transport.
///
/// Chat ids are strings so channel usernames (`@name`) work too.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Post a new message to `chat_id` and return its message id.
    async fn send_message(&self, chat_id: &str, message: OutgoingMessage)
    -> Result<i64, ChannelError>;

    /// Replace the text and keyboard of an existing message.
    async fn edit_message(
        &self,
        chat_id: &str,
        message_id: i64,
        message: OutgoingMessage,
    ) -> Result<(), ChannelError>;

    /// Acknowledge a button press, optionally with a short toast.
    async fn answer_selection(
        &self,
        callback_id: &str,
        notice: Option<&str>,
    ) -> Result<(), ChannelError>;
}
