//! Liveness and readiness endpoints served next to the bot.

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};

pub const SERVICE_NAME: &str = "nutrition-bot-backend";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Path the Telegram webhook listener is mounted at
pub const WEBHOOK_PATH: &str = "/telegram/webhook";

async fn root() -> Json<Value> {
    Json(json!({
        "message": "Nutrition Bot Backend is running",
        "version": VERSION,
    }))
}

async fn healthz() -> Json<Value> {
    Json(json!({
        "status": "OK",
        "service": SERVICE_NAME,
        "version": VERSION,
    }))
}

async fn readyz() -> Json<Value> {
    Json(json!({
        "status": "READY",
        "service": SERVICE_NAME,
    }))
}

pub fn health_routes() -> Router {
    Router::new()
        .route("/", get(root))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
}
