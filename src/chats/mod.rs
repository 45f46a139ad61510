pub mod model;
pub mod store;

mod chat;
mod msg;
mod new;
mod people;

use axum::{
    extract::rejection::JsonRejection,
    routing::{get, post, put},
    Router,
};

use crate::{AppError, AppResult, AppState};

use self::model::ChatId;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(chat::list_chats).post(new::create_chat))
        .route("/consultants/list", get(people::consultants))
        .route("/online/list", get(people::online))
        .route("/{chat_id}", get(chat::get_chat))
        .route("/{chat_id}/messages", post(msg::send_message))
        .route("/{chat_id}/read", put(msg::mark_read))
}

/// Unparseable ids are just chats that don't exist.
fn parse_chat_id(raw: &str) -> AppResult<ChatId> {
    ChatId::parse_str(raw).map_err(|_| AppError::NotFound)
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}
