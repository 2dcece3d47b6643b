//! Feeds transport events into the wizard engine.

use std::sync::Arc;

use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::channels::{BotEvent, EventStream, TelegramChannel};
use crate::error::Error;
use crate::wizard::WizardEngine;

/// Verify the token, drop stale updates, then poll until the stream ends.
pub async fn run_polling(channel: TelegramChannel, engine: Arc<WizardEngine>) -> Result<(), Error> {
    channel.health_check().await?;
    channel.drop_pending_updates().await?;
    info!("Dropped pending updates; polling");

    run_events(channel.start(), engine).await;
    Ok(())
}

/// Dispatch every event on its own task until `events` ends.
pub async fn run_events(mut events: EventStream, engine: Arc<WizardEngine>) {
    while let Some(event) = events.next().await {
        dispatch(Arc::clone(&engine), event);
    }
    warn!("Event stream ended");
}

/// Handle one event in isolation.
///
/// A failing or panicking step cancels only that user's session.
pub fn dispatch(engine: Arc<WizardEngine>, event: BotEvent) -> JoinHandle<()> {
    tokio::spawn(async move {
        let key = event.sender();
        let worker = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.handle(event).await })
        };

        match worker.await {
            Ok(Ok(outcome)) => {
                debug!(chat_id = key.chat_id, ?outcome, "Event handled");
            }
            Ok(Err(e)) => {
                warn!(chat_id = key.chat_id, error = %e, "Wizard step failed; aborting session");
                engine.abort(key).await;
            }
            Err(e) if e.is_panic() => {
                error!(chat_id = key.chat_id, "Wizard step panicked; aborting session");
                engine.abort(key).await;
            }
            Err(e) => {
                debug!(chat_id = key.chat_id, error = %e, "Wizard step cancelled");
            }
        }
    })
}
