//! Integration tests for the wizard over the Telegram transport.
//!
//! Each test spins up a fake Bot API on a random port, points a real
//! `TelegramChannel` at it, and checks the requests the bot makes.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use chrono::{TimeZone, Utc};
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::time::timeout;

use signal_bot::bot;
use signal_bot::channels::{BotEvent, ChatUser, Messenger, TelegramChannel};
use signal_bot::delivery::DeliveryGateway;
use signal_bot::wizard::engine::Outcome;
use signal_bot::wizard::{FixedClock, SEND_TOKEN, WizardEngine};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

const CHANNEL: &str = "-100555";
const BROKEN_CHANNEL: &str = "-100999";
const REGISTRATION_URL: &str = "https://example.com/join";

const USER: ChatUser = ChatUser {
    chat_id: 42,
    user_id: 99,
};

/// Requests received by the fake API, plus updates waiting to be polled.
#[derive(Default)]
struct FakeApi {
    calls: Mutex<Vec<(String, Value)>>,
    pending_updates: Mutex<VecDeque<Value>>,
}

impl FakeApi {
    async fn calls_to(&self, method: &str) -> Vec<Value> {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, body)| body.clone())
            .collect()
    }
}

async fn bot_method(
    State(api): State<Arc<FakeApi>>,
    Path((_bot, method)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> (axum::http::StatusCode, Json<Value>) {
    api.calls.lock().await.push((method.clone(), body.clone()));

    let ok = |result: Value| (axum::http::StatusCode::OK, Json(json!({"ok": true, "result": result})));

    match method.as_str() {
        "getMe" => ok(json!({"id": 1, "is_bot": true, "first_name": "Signals", "username": "signal_bot"})),
        "deleteWebhook" | "answerCallbackQuery" | "editMessageText" => ok(json!(true)),
        "sendMessage" if body["chat_id"] == BROKEN_CHANNEL => (
            axum::http::StatusCode::BAD_REQUEST,
            Json(json!({"ok": false, "error_code": 400, "description": "Bad Request: chat not found"})),
        ),
        "sendMessage" => ok(json!({"message_id": 500, "chat": {"id": 0}, "date": 0})),
        "getUpdates" => {
            let next = api.pending_updates.lock().await.pop_front();
            match next {
                Some(update) => ok(json!([update])),
                None => {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    ok(json!([]))
                }
            }
        }
        _ => (
            axum::http::StatusCode::NOT_FOUND,
            Json(json!({"ok": false, "error_code": 404, "description": "Not Found"})),
        ),
    }
}

/// Start the fake Bot API, return (base url, state).
async fn start_fake_api() -> (String, Arc<FakeApi>) {
    let api = Arc::new(FakeApi::default());
    let app = Router::new()
        .route("/{bot}/{method}", post(bot_method))
        .with_state(Arc::clone(&api));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    (format!("http://127.0.0.1:{port}"), api)
}

fn build_engine(base: &str, channel_id: &str) -> (TelegramChannel, Arc<WizardEngine>) {
    let telegram = TelegramChannel::new(SecretString::from("123:ABC"), base)
        .with_poll_timeout(Duration::from_secs(0));
    let messenger: Arc<dyn Messenger> = Arc::new(telegram.clone());
    let gateway = DeliveryGateway::new(Arc::clone(&messenger), channel_id, REGISTRATION_URL);
    // 14:31:20 in UTC-03:00
    let clock = FixedClock(Utc.with_ymd_and_hms(2024, 5, 10, 17, 31, 20).unwrap());
    let engine = Arc::new(WizardEngine::new(messenger, gateway, Arc::new(clock)));
    (telegram, engine)
}

fn start() -> BotEvent {
    BotEvent::Command {
        from: USER,
        message_id: 1,
        name: "start".into(),
    }
}

fn pick(token: &str) -> BotEvent {
    BotEvent::Selection {
        from: USER,
        callback_id: format!("cb-{token}"),
        message_id: Some(500),
        token: token.into(),
    }
}

// ── Wizard over HTTP ─────────────────────────────────────────────────

#[tokio::test]
async fn full_wizard_broadcasts_signal() {
    timeout(TEST_TIMEOUT, async {
        let (base, api) = start_fake_api().await;
        let (_telegram, engine) = build_engine(&base, CHANNEL);

        for event in [
            start(),
            pick("EUR/USD-OTC"),
            pick("14:32"),
            pick("UP"),
            pick(SEND_TOKEN),
        ] {
            engine.handle(event).await.unwrap();
        }

        let sends = api.calls_to("sendMessage").await;
        assert_eq!(sends.len(), 2, "catalog + broadcast");

        // Catalog menu goes to the user's chat as HTML with a 12-row keyboard.
        assert_eq!(sends[0]["chat_id"], "42");
        assert_eq!(sends[0]["parse_mode"], "HTML");
        assert_eq!(
            sends[0]["reply_markup"]["inline_keyboard"]
                .as_array()
                .unwrap()
                .len(),
            12
        );

        // Broadcast carries the signal and the registration link.
        let broadcast = &sends[1];
        assert_eq!(broadcast["chat_id"], CHANNEL);
        let text = broadcast["text"].as_str().unwrap();
        assert!(text.contains("EUR/USD-OTC"));
        assert!(text.contains("14:32"));
        assert!(text.contains("⬆️ UP 🟢"));
        assert_eq!(
            broadcast["reply_markup"]["inline_keyboard"][0][0]["url"],
            REGISTRATION_URL
        );

        let edits = api.calls_to("editMessageText").await;
        assert_eq!(edits.len(), 4);
        assert!(edits.iter().all(|e| e["message_id"] == 500));
        assert_eq!(
            edits[3]["text"],
            "<b>Signal successfully sent to the channel!</b>"
        );
        assert!(edits[3].get("reply_markup").is_none());

        assert_eq!(api.calls_to("answerCallbackQuery").await.len(), 4);
        assert!(engine.session(USER).await.is_none());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn broadcast_failure_is_reported_to_user() {
    timeout(TEST_TIMEOUT, async {
        let (base, api) = start_fake_api().await;
        let (_telegram, engine) = build_engine(&base, BROKEN_CHANNEL);

        let mut last = None;
        for event in [
            start(),
            pick("USD/TRY-OTC"),
            pick("14:35"),
            pick("DOWN"),
            pick(SEND_TOKEN),
        ] {
            last = Some(engine.handle(event).await.unwrap());
        }

        assert_eq!(last, Some(Outcome::DeliveryFailed));

        let sends = api.calls_to("sendMessage").await;
        let notice = sends.last().unwrap();
        assert_eq!(notice["chat_id"], "42");
        assert!(notice.get("parse_mode").is_none());
        assert!(notice["text"].as_str().unwrap().contains("chat not found"));

        // Session is kept so the user can press send again.
        assert!(engine.session(USER).await.is_some());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn stale_selection_gets_toast_only() {
    timeout(TEST_TIMEOUT, async {
        let (base, api) = start_fake_api().await;
        let (_telegram, engine) = build_engine(&base, CHANNEL);

        let outcome = engine.handle(pick("EUR/USD-OTC")).await.unwrap();
        assert_eq!(outcome, Outcome::Ignored);

        let answers = api.calls_to("answerCallbackQuery").await;
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0]["callback_query_id"], "cb-EUR/USD-OTC");
        assert!(answers[0]["text"].as_str().unwrap().contains("/start"));
        assert!(api.calls_to("editMessageText").await.is_empty());
    })
    .await
    .expect("test timed out");
}

// ── Polling ──────────────────────────────────────────────────────────

#[tokio::test]
async fn polling_starts_wizard_from_update() {
    timeout(TEST_TIMEOUT, async {
        let (base, api) = start_fake_api().await;
        let (telegram, engine) = build_engine(&base, CHANNEL);

        api.pending_updates.lock().await.push_back(json!({
            "update_id": 10,
            "message": {
                "message_id": 1,
                "chat": {"id": 42, "type": "private"},
                "from": {"id": 99, "is_bot": false, "first_name": "A"},
                "date": 0,
                "text": "/start"
            }
        }));

        let runner = tokio::spawn(bot::run_polling(telegram, Arc::clone(&engine)));

        while engine.session(USER).await.is_none() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        runner.abort();

        assert_eq!(api.calls_to("getMe").await.len(), 1);
        let deletes = api.calls_to("deleteWebhook").await;
        assert_eq!(deletes[0]["drop_pending_updates"], true);

        let polls = api.calls_to("getUpdates").await;
        assert_eq!(polls[0]["offset"], 0);
        assert!(polls.iter().skip(1).all(|p| p["offset"] == 11));
        assert_eq!(
            polls[0]["allowed_updates"],
            json!(["message", "callback_query"])
        );

        let sends = api.calls_to("sendMessage").await;
        assert_eq!(sends[0]["text"], "<b>Select A Currency Pair For The Signal:</b>");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn polling_stops_when_stream_dropped() {
    timeout(TEST_TIMEOUT, async {
        let (base, api) = start_fake_api().await;
        let (telegram, _engine) = build_engine(&base, CHANNEL);

        let events = telegram.start();
        while api.calls_to("getUpdates").await.len() < 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        drop(events);

        // Let an in-flight poll settle, then make sure no new ones start.
        tokio::time::sleep(Duration::from_millis(100)).await;
        let settled = api.calls_to("getUpdates").await.len();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(api.calls_to("getUpdates").await.len(), settled);
    })
    .await
    .expect("test timed out");
}
