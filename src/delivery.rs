//! Posts finished signals to the broadcast channel.

use std::sync::Arc;

use crate::channels::{Messenger, OutgoingMessage};
use crate::error::ChannelError;
use crate::wizard::Keyboard;

/// Label of the link button attached to every broadcast.
pub const REGISTRATION_BUTTON_TEXT: &str = "📊 Quotex Registration ";

/// Sends rendered signals to one configured destination.
#[derive(Clone)]
pub struct DeliveryGateway {
    messenger: Arc<dyn Messenger>,
    destination: String,
    registration_url: String,
}

impl DeliveryGateway {
    pub fn new(
        messenger: Arc<dyn Messenger>,
        destination: impl Into<String>,
        registration_url: impl Into<String>,
    ) -> Self {
        Self {
            messenger,
            destination: destination.into(),
            registration_url: registration_url.into(),
        }
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Post `text` with the registration link. One attempt, no retry.
    pub async fn deliver(&self, text: &str) -> Result<(), ChannelError> {
        let message = OutgoingMessage::html(text).with_keyboard(Keyboard::link(
            REGISTRATION_BUTTON_TEXT,
            &self.registration_url,
        ));

        match self.messenger.send_message(&self.destination, message).await {
            Ok(message_id) => {
                tracing::info!(destination = %self.destination, message_id, "Signal broadcast");
                Ok(())
            }
            Err(e) => {
                tracing::error!(destination = %self.destination, error = %e, "Signal broadcast failed");
                Err(e)
            }
        }
    }
}
