//! Telegram channel — long-polls the Bot API for updates.
//!
//! Talks to the Bot HTTP API directly: `getUpdates` for input, and
//! `sendMessage` / `editMessageText` / `answerCallbackQuery` for output.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::channels::{BotEvent, ChatUser, EventStream, Messenger, OutgoingMessage, ParseMode};
use crate::error::ChannelError;

const CHANNEL_NAME: &str = "telegram";

/// Pause before polling again after a transport error.
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Bot API response envelope.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<u16>,
}

/// One entry from `getUpdates`.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

/// Result of `sendMessage`; only the id is needed.
#[derive(Debug, Clone, Deserialize)]
struct SentMessage {
    message_id: i64,
}

/// The message a pressed keyboard belongs to. Inaccessible messages carry
/// the same two fields, so one shape covers both.
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackMessage {
    pub message_id: i64,
    pub chat: Chat,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub message: Option<CallbackMessage>,
    #[serde(default)]
    pub data: Option<String>,
}

/// Telegram channel: connects to the Bot API via long-polling.
#[derive(Clone)]
pub struct TelegramChannel {
    bot_token: SecretString,
    api_base: String,
    poll_timeout: Duration,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(bot_token: SecretString, api_base: impl Into<String>) -> Self {
        Self {
            bot_token,
            api_base: api_base.into(),
            poll_timeout: Duration::from_secs(30),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_poll_timeout(mut self, poll_timeout: Duration) -> Self {
        self.poll_timeout = poll_timeout;
        self
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{method}",
            self.api_base,
            self.bot_token.expose_secret()
        )
    }

    /// POST `body` to a Bot API method and unwrap the response envelope.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &serde_json::Value,
    ) -> Result<T, ChannelError> {
        let resp = self
            .client
            .post(self.api_url(method))
            .json(body)
            .send()
            .await
            .map_err(|e| ChannelError::Http(format!("{method}: {e}")))?;

        let status = resp.status();
        let envelope: ApiResponse<T> = resp.json().await.map_err(|e| {
            ChannelError::InvalidMessage(format!("{method} returned {status} with bad body: {e}"))
        })?;

        if envelope.ok {
            return envelope.result.ok_or_else(|| {
                ChannelError::InvalidMessage(format!("{method} returned ok without result"))
            });
        }

        let reason = envelope
            .description
            .unwrap_or_else(|| format!("{method} returned {status}"));
        let code = envelope
            .error_code
            .and_then(|c| StatusCode::from_u16(c).ok())
            .unwrap_or(status);

        Err(match code {
            StatusCode::TOO_MANY_REQUESTS => ChannelError::RateLimited {
                name: CHANNEL_NAME.into(),
            },
            StatusCode::UNAUTHORIZED => ChannelError::AuthFailed {
                name: CHANNEL_NAME.into(),
                reason,
            },
            _ => ChannelError::SendFailed {
                name: CHANNEL_NAME.into(),
                reason,
            },
        })
    }

    /// Verify the token with `getMe`.
    pub async fn health_check(&self) -> Result<(), ChannelError> {
        let me: User = self
            .call("getMe", &serde_json::json!({}))
            .await
            .map_err(|e| ChannelError::StartupFailed {
                name: CHANNEL_NAME.into(),
                reason: e.to_string(),
            })?;
        tracing::info!(
            bot_id = me.id,
            username = me.username.as_deref().unwrap_or("unknown"),
            "Telegram bot authenticated"
        );
        Ok(())
    }

    /// Discard updates queued while the bot was offline.
    pub async fn drop_pending_updates(&self) -> Result<(), ChannelError> {
        let _: bool = self
            .call(
                "deleteWebhook",
                &serde_json::json!({ "drop_pending_updates": true }),
            )
            .await?;
        Ok(())
    }

    /// Long-poll for updates after `offset`.
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>, ChannelError> {
        self.call(
            "getUpdates",
            &serde_json::json!({
                "offset": offset,
                "timeout": self.poll_timeout.as_secs(),
                "allowed_updates": ["message", "callback_query"]
            }),
        )
        .await
    }

    /// Spawn the polling loop and return the decoded event stream.
    ///
    /// The loop ends when the returned stream is dropped.
    pub fn start(&self) -> EventStream {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let channel = self.clone();

        tokio::spawn(async move {
            let mut offset: i64 = 0;

            tracing::info!("Telegram channel listening for updates...");

            loop {
                if tx.is_closed() {
                    tracing::info!("Telegram listener channel closed");
                    return;
                }

                let polled = tokio::select! {
                    polled = channel.get_updates(offset) => polled,
                    _ = tx.closed() => {
                        tracing::info!("Telegram listener channel closed");
                        return;
                    }
                };
                let updates = match polled {
                    Ok(updates) => updates,
                    Err(e) => {
                        tracing::warn!("Telegram poll error: {e}");
                        tokio::time::sleep(POLL_ERROR_BACKOFF).await;
                        continue;
                    }
                };

                for update in updates {
                    // Advance offset past this update
                    offset = offset.max(update.update_id + 1);

                    let Some(event) = decode_update(&update) else {
                        tracing::debug!(update_id = update.update_id, "Skipping update");
                        continue;
                    };

                    if tx.send(event).is_err() {
                        tracing::info!("Telegram listener channel closed");
                        return;
                    }
                }
            }
        });

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        });

        Box::pin(stream)
    }
}

// ── Messenger trait implementation ──────────────────────────────────

#[async_trait]
impl Messenger for TelegramChannel {
    async fn send_message(
        &self,
        chat_id: &str,
        message: OutgoingMessage,
    ) -> Result<i64, ChannelError> {
        let mut body = serde_json::json!({ "chat_id": chat_id });
        apply_message(&mut body, &message)?;
        let sent: SentMessage = self.call("sendMessage", &body).await?;
        tracing::debug!(chat_id, message_id = sent.message_id, "Telegram message sent");
        Ok(sent.message_id)
    }

    async fn edit_message(
        &self,
        chat_id: &str,
        message_id: i64,
        message: OutgoingMessage,
    ) -> Result<(), ChannelError> {
        let mut body = serde_json::json!({
            "chat_id": chat_id,
            "message_id": message_id,
        });
        apply_message(&mut body, &message)?;

        match self.call::<serde_json::Value>("editMessageText", &body).await {
            Ok(_) => Ok(()),
            // A repeated press re-renders the same screen
            Err(ChannelError::SendFailed { reason, .. })
                if reason.contains("message is not modified") =>
            {
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn answer_selection(
        &self,
        callback_id: &str,
        notice: Option<&str>,
    ) -> Result<(), ChannelError> {
        let mut body = serde_json::json!({ "callback_query_id": callback_id });
        if let Some(text) = notice {
            body["text"] = serde_json::Value::String(text.to_string());
        }
        let _: bool = self.call("answerCallbackQuery", &body).await?;
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Copy text, parse mode and keyboard into a request body.
fn apply_message(
    body: &mut serde_json::Value,
    message: &OutgoingMessage,
) -> Result<(), ChannelError> {
    body["text"] = serde_json::Value::String(message.text.clone());
    if message.parse_mode == ParseMode::Html {
        body["parse_mode"] = serde_json::Value::String("HTML".into());
    }
    if let Some(keyboard) = &message.keyboard {
        body["reply_markup"] = serde_json::to_value(keyboard)
            .map_err(|e| ChannelError::InvalidMessage(e.to_string()))?;
    }
    Ok(())
}

/// Turn a raw update into a wizard event. Updates without a sender, without
/// text, or of other kinds yield `None`.
pub fn decode_update(update: &Update) -> Option<BotEvent> {
    if let Some(query) = &update.callback_query {
        let chat_id = query
            .message
            .as_ref()
            .map(|m| m.chat.id)
            .unwrap_or(query.from.id);
        return Some(BotEvent::Selection {
            from: ChatUser {
                chat_id,
                user_id: query.from.id,
            },
            callback_id: query.id.clone(),
            message_id: query.message.as_ref().map(|m| m.message_id),
            token: query.data.clone().unwrap_or_default(),
        });
    }

    let message = update.message.as_ref()?;
    let from = ChatUser {
        chat_id: message.chat.id,
        user_id: message.from.as_ref()?.id,
    };
    let text = message.text.as_deref()?;

    match parse_command(text) {
        Some(name) => Some(BotEvent::Command {
            from,
            message_id: message.message_id,
            name,
        }),
        None => Some(BotEvent::Text {
            from,
            message_id: message.message_id,
            text: text.to_string(),
        }),
    }
}

/// `/Start@my_bot extra` → `start`.
fn parse_command(text: &str) -> Option<String> {
    let word = text.trim_start().split_whitespace().next()?;
    let name = word.strip_prefix('/')?;
    let name = name.split('@').next().unwrap_or_default();
    if name.is_empty() {
        return None;
    }
    Some(name.to_lowercase())
}

// ── Tests ───────────────────────────────────────────────────────────
