pub mod appresult;
pub mod auth;
pub mod chats;
pub mod config;
pub mod db;
pub mod relay;
pub mod session;

use std::sync::Arc;

use axum::{extract::FromRef, routing::get, Json, Router};
use serde_json::{json, Value};
use sqlx::SqlitePool;

pub use appresult::{AppError, AppResult};

use auth::Verifier;
use chats::store::{SharedStore, SqliteChatStore};
use config::RelayConfig;
use relay::Relay;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub verifier: Verifier,
    pub store: SharedStore,
    pub relay: Relay,
}

impl AppState {
    pub fn new(db_pool: SqlitePool, token_secret: &str, relay_cfg: RelayConfig) -> AppState {
        let store: SharedStore = Arc::new(SqliteChatStore::new(db_pool.clone()));
        AppState {
            verifier: Verifier::new(db_pool.clone(), token_secret),
            relay: Relay::new(store.clone(), relay_cfg),
            store,
            db_pool,
        }
    }
}

pub fn app(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ws", get(relay::ws::chat_ws))
        .nest("/api/chat", chats::router())
        .with_state(app_state)
}

async fn health() -> Json<Value> {
    Json(json!({ "success": true, "status": "ok" }))
}
