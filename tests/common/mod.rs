#![allow(dead_code)]

use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;
use tokio::{sync::mpsc, time::timeout};
use vaastu_chat::{
    auth::{token::Claims, users::{self, NewUser}, Identity, Role},
    chats::model::{ChatKind, ChatThread, NewChat},
    config::RelayConfig,
    db,
    relay::events::ServerEvent,
    AppState,
};

pub const SECRET: &str = "test-secret-0123456789";

pub async fn app_state() -> AppState {
    // one connection, kept forever, so the in-memory database survives
    let db_pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("open in-memory sqlite");
    db::migrate(&db_pool).await.expect("migrate");

    AppState::new(db_pool, SECRET, RelayConfig { session_queue_capacity: 32 })
}

/// A real database file behind a pool of several connections, for tests that
/// need writers to actually contend. Keep the `TempDir` alive for the test.
pub async fn file_app_state(max_connections: u32) -> (AppState, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("temp dir");
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("chat.db").display());
    let db_pool = db::connect(&url, max_connections).await.expect("open sqlite file");

    (AppState::new(db_pool, SECRET, RelayConfig { session_queue_capacity: 32 }), dir)
}

pub async fn user(state: &AppState, name: &str, role: Role) -> Identity {
    users::create_user(
        &state.db_pool,
        NewUser {
            name: name.to_owned(),
            email: format!("{}@example.com", name.to_lowercase()),
            avatar: None,
            role,
            is_verified: true,
        },
    )
    .await
    .expect("create user")
}

pub fn token_for(state: &AppState, who: &Identity) -> String {
    state
        .verifier
        .sign(&Claims::expiring_in(who.id, 3600))
        .expect("sign token")
}

pub async fn chat(state: &AppState, kind: ChatKind, members: &[&Identity]) -> ChatThread {
    let new = NewChat {
        participants: members.iter().map(|m| m.id).collect(),
        kind,
        title: None,
        context: None,
    };
    let (thread, _) = state
        .store
        .find_or_create(members[0].id, new)
        .await
        .expect("create chat");
    thread
}

pub async fn next_event(rx: &mut mpsc::Receiver<ServerEvent>) -> ServerEvent {
    timeout(Duration::from_millis(250), rx.recv())
        .await
        .expect("expected an event within timeout")
        .expect("channel open")
}

pub async fn assert_silent(rx: &mut mpsc::Receiver<ServerEvent>) {
    let got = timeout(Duration::from_millis(50), rx.recv()).await;
    assert!(got.is_err(), "unexpected event: {got:?}");
}

/// Everything queued right now.
pub fn drain(rx: &mut mpsc::Receiver<ServerEvent>) -> Vec<ServerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
