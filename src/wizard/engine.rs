//! Routes bot events through per-conversation wizard sessions.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use super::state::{Session, Transition, WizardState};
use super::times::Clock;
use crate::channels::{BotEvent, ChatUser, Messenger, OutgoingMessage};
use crate::delivery::DeliveryGateway;
use crate::error::Error;

/// Sessions are keyed per user per chat.
pub type SessionKey = ChatUser;

/// Command that opens the wizard.
pub const START_COMMAND: &str = "start";

pub const CANCELLED_NOTICE: &str = "Cancelled.";
pub const DELIVERED_NOTICE: &str = "<b>Signal successfully sent to the channel!</b>";
pub const ABORTED_NOTICE: &str = "Something went wrong. The signal was cancelled.";
pub const EXPIRED_NOTICE: &str = "This menu has expired. Send /start to begin again.";
pub const UNAVAILABLE_NOTICE: &str = "This option is not available right now.";

type Slot = Arc<Mutex<Option<Session>>>;

/// What handling one event amounted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A session was opened (or restarted) and the catalog shown.
    Started,
    /// A selection was recorded; the session now waits in this state.
    Advanced(WizardState),
    /// The signal went out and the session is gone.
    Delivered,
    /// Broadcasting failed; the session stays at confirm.
    DeliveryFailed,
    /// The session was discarded on user request.
    Cancelled,
    /// A selection that does not fit the current menu.
    Rejected,
    /// Nothing to act on.
    Ignored,
}

/// Owns every active session and drives its transitions.
pub struct WizardEngine {
    messenger: Arc<dyn Messenger>,
    gateway: DeliveryGateway,
    clock: Arc<dyn Clock>,
    sessions: Mutex<HashMap<SessionKey, Slot>>,
}

impl WizardEngine {
    pub fn new(
        messenger: Arc<dyn Messenger>,
        gateway: DeliveryGateway,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            messenger,
            gateway,
            clock,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Handle one event. Errors leave cleanup to [`WizardEngine::abort`].
    pub async fn handle(&self, event: BotEvent) -> Result<Outcome, Error> {
        match event {
            BotEvent::Command { from, name, .. } if name == START_COMMAND => self.start(from).await,
            BotEvent::Command { from, name, .. } => {
                debug!(command = %name, "Command cancels active session");
                self.cancel(from).await
            }
            BotEvent::Text { from, .. } => self.cancel(from).await,
            BotEvent::Selection {
                from,
                callback_id,
                message_id,
                token,
            } => self.select(from, &callback_id, message_id, &token).await,
        }
    }

    /// Discard the session after a failed step and tell the user.
    ///
    /// Returns whether a session was discarded.
    pub async fn abort(&self, key: SessionKey) -> bool {
        let aborted = match self.lock_slot(key, false).await {
            Some(mut guard) if guard.is_some() => {
                self.retire(key, &mut guard).await;
                true
            }
            _ => false,
        };

        if let Err(e) = self
            .messenger
            .send_message(&key.chat_id.to_string(), OutgoingMessage::plain(ABORTED_NOTICE))
            .await
        {
            warn!(chat_id = key.chat_id, error = %e, "Failed to send abort notice");
        }
        aborted
    }

    /// Snapshot of the session for `key`, if one is active.
    pub async fn session(&self, key: SessionKey) -> Option<Session> {
        let guard = self.lock_slot(key, false).await?;
        (*guard).clone()
    }

    pub async fn active_sessions(&self) -> usize {
        self.sessions.lock().await.len()
    }

    // ── Transitions ─────────────────────────────────────────────────

    async fn start(&self, key: SessionKey) -> Result<Outcome, Error> {
        let Some(mut guard) = self.lock_slot(key, true).await else {
            return Ok(Outcome::Ignored);
        };
        if guard.is_some() {
            info!(chat_id = key.chat_id, user_id = key.user_id, "Restarting wizard session");
        }

        let (mut session, screen) = Session::start();
        let sent = self
            .messenger
            .send_message(
                &key.chat_id.to_string(),
                OutgoingMessage::html(screen.text).with_keyboard(screen.keyboard),
            )
            .await;

        let menu_id = match sent {
            Ok(menu_id) => menu_id,
            Err(e) => {
                self.retire(key, &mut guard).await;
                return Err(e.into());
            }
        };

        session.attach_menu(menu_id);
        *guard = Some(session);
        info!(chat_id = key.chat_id, user_id = key.user_id, "Wizard session started");
        Ok(Outcome::Started)
    }

    async fn cancel(&self, key: SessionKey) -> Result<Outcome, Error> {
        let Some(mut guard) = self.lock_slot(key, false).await else {
            return Ok(Outcome::Ignored);
        };
        if guard.is_none() {
            return Ok(Outcome::Ignored);
        }

        self.retire(key, &mut guard).await;
        drop(guard);
        info!(chat_id = key.chat_id, user_id = key.user_id, "Wizard session cancelled");

        self.messenger
            .send_message(
                &key.chat_id.to_string(),
                OutgoingMessage::plain(CANCELLED_NOTICE),
            )
            .await?;
        Ok(Outcome::Cancelled)
    }

    async fn select(
        &self,
        key: SessionKey,
        callback_id: &str,
        message_id: Option<i64>,
        token: &str,
    ) -> Result<Outcome, Error> {
        let guard = self.lock_slot(key, false).await;
        let (Some(mut guard), Some(message_id)) = (guard, message_id) else {
            self.answer(callback_id, Some(EXPIRED_NOTICE)).await;
            return Ok(Outcome::Ignored);
        };
        let Some(session) = guard.as_mut() else {
            self.answer(callback_id, Some(EXPIRED_NOTICE)).await;
            return Ok(Outcome::Ignored);
        };
        if !session.owns_menu(message_id) {
            debug!(chat_id = key.chat_id, message_id, "Selection on a superseded menu");
            self.answer(callback_id, Some(EXPIRED_NOTICE)).await;
            return Ok(Outcome::Rejected);
        }

        let transition = match session.select(token, self.clock.now()) {
            Ok(transition) => transition,
            Err(e) if e.is_recoverable() => {
                debug!(chat_id = key.chat_id, error = %e, "Ignoring selection");
                self.answer(callback_id, Some(UNAVAILABLE_NOTICE)).await;
                return Ok(Outcome::Rejected);
            }
            Err(e) => {
                self.answer(callback_id, None).await;
                return Err(e.into());
            }
        };
        self.answer(callback_id, None).await;
        let chat_id = key.chat_id.to_string();

        match transition {
            Transition::Prompt(screen) => {
                let state = session.state();
                self.messenger
                    .edit_message(
                        &chat_id,
                        message_id,
                        OutgoingMessage::html(screen.text).with_keyboard(screen.keyboard),
                    )
                    .await?;
                debug!(chat_id = key.chat_id, state = %state, "Wizard advanced");
                Ok(Outcome::Advanced(state))
            }
            Transition::Deliver { text } => {
                if let Err(e) = self.gateway.deliver(&text).await {
                    self.messenger
                        .send_message(
                            &chat_id,
                            OutgoingMessage::plain(format!(
                                "Failed to send the signal to the channel: {e}"
                            )),
                        )
                        .await?;
                    return Ok(Outcome::DeliveryFailed);
                }

                self.retire(key, &mut guard).await;
                drop(guard);
                info!(
                    chat_id = key.chat_id,
                    destination = self.gateway.destination(),
                    "Wizard session completed"
                );

                if let Err(e) = self
                    .messenger
                    .edit_message(&chat_id, message_id, OutgoingMessage::html(DELIVERED_NOTICE))
                    .await
                {
                    warn!(chat_id = key.chat_id, error = %e, "Failed to confirm delivery to user");
                }
                Ok(Outcome::Delivered)
            }
        }
    }

    // ── Session table ───────────────────────────────────────────────

    /// Lock the slot for `key`, creating it when `create` is set.
    ///
    /// Lock order is slot before table; the table lock is never held while
    /// waiting on a slot.
    async fn lock_slot(
        &self,
        key: SessionKey,
        create: bool,
    ) -> Option<OwnedMutexGuard<Option<Session>>> {
        loop {
            let slot = {
                let mut sessions = self.sessions.lock().await;
                match sessions.get(&key) {
                    Some(slot) => Arc::clone(slot),
                    None if create => {
                        let slot: Slot = Arc::new(Mutex::new(None));
                        sessions.insert(key, Arc::clone(&slot));
                        slot
                    }
                    None => return None,
                }
            };

            let guard = Arc::clone(&slot).lock_owned().await;
            let current = self
                .sessions
                .lock()
                .await
                .get(&key)
                .is_some_and(|s| Arc::ptr_eq(s, &slot));
            if current {
                return Some(guard);
            }
            // Retired while we waited; look again.
        }
    }

    /// Destroy the session held by `guard`.
    async fn retire(&self, key: SessionKey, guard: &mut OwnedMutexGuard<Option<Session>>) {
        guard.take();
        self.sessions.lock().await.remove(&key);
    }

    async fn answer(&self, callback_id: &str, notice: Option<&str>) {
        if let Err(e) = self.messenger.answer_selection(callback_id, notice).await {
            warn!(callback_id, error = %e, "Failed to answer selection");
        }
    }
}
