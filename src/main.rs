use std::sync::Arc;

use signal_bot::bot;
use signal_bot::channels::{Messenger, TelegramChannel};
use signal_bot::config::BotConfig;
use signal_bot::delivery::DeliveryGateway;
use signal_bot::health;
use signal_bot::wizard::{SystemClock, WizardEngine};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = BotConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  export TELEGRAM_BOT_TOKEN=123456:ABC...");
        eprintln!("  export SIGNAL_CHANNEL_ID=-100...");
        std::process::exit(1);
    });

    eprintln!("📡 Signal Bot v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Broadcast channel: {}", config.channel_id);
    eprintln!("   Liveness: http://0.0.0.0:{}/", config.port);

    // ── Telegram ────────────────────────────────────────────────────────
    let telegram = TelegramChannel::new(config.bot_token.clone(), config.api_base.clone())
        .with_poll_timeout(config.poll_timeout);
    let messenger: Arc<dyn Messenger> = Arc::new(telegram.clone());

    let gateway = DeliveryGateway::new(
        Arc::clone(&messenger),
        config.channel_id.clone(),
        config.registration_url.clone(),
    );
    let engine = Arc::new(WizardEngine::new(messenger, gateway, Arc::new(SystemClock)));

    // ── Liveness server ─────────────────────────────────────────────────
    let port = config.port;
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    let http = tokio::spawn(async move {
        tracing::info!(port, "Liveness server started");
        axum::serve(listener, health::router()).await
    });

    // ── Bot polling ─────────────────────────────────────────────────────
    let polling = tokio::spawn(bot::run_polling(telegram, engine));

    // Either task ending, or Ctrl-C, stops the process.
    tokio::select! {
        result = http => {
            result??;
            anyhow::bail!("liveness server exited");
        }
        result = polling => {
            result??;
            anyhow::bail!("bot polling exited");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down");
        }
    }

    Ok(())
}
