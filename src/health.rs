//! Liveness endpoint.

use axum::Router;
use axum::routing::get;

/// Body returned by `GET /`.
pub const LIVENESS_BODY: &str = "Bot is running!";

async fn index() -> &'static str {
    LIVENESS_BODY
}

/// Build the liveness router.
pub fn router() -> Router {
    Router::new().route("/", get(index))
}
