use axum::{debug_handler, extract::{rejection::JsonRejection, Path, State}, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{auth::AuthUser, relay::Relay, AppResult, AppState};

use super::{
    model::{Attachment, MessageKind, NewMessage},
    parse_chat_id,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct SendMessageQuery {
    content: String,
    #[serde(default, rename = "type", alias = "messageType")]
    kind: MessageKind,
    #[serde(default)]
    attachments: Vec<Attachment>,
}

/// Same path as the socket `send-message`, so joined sessions see it live.
#[debug_handler(state = AppState)]
pub(crate) async fn send_message(
    State(relay): State<Relay>,
    AuthUser(me): AuthUser,
    Path(chat_id): Path<String>,

    payload: Result<Json<SendMessageQuery>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let chat_id = parse_chat_id(&chat_id)?;
    let Json(SendMessageQuery { content, kind, attachments }) = payload?;

    let new = NewMessage::new(&content, kind, attachments)?;
    let message = relay.post_message(&me, chat_id, new, None).await?;

    Ok(Json(json!({ "success": true, "message": message })))
}

#[debug_handler(state = AppState)]
pub(crate) async fn mark_read(
    State(relay): State<Relay>,
    AuthUser(me): AuthUser,
    Path(chat_id): Path<String>,
) -> AppResult<Json<Value>> {
    let chat_id = parse_chat_id(&chat_id)?;
    let marked = relay.mark_read_as(&me, chat_id, None).await?;

    Ok(Json(json!({ "success": true, "message": "Messages marked as read", "marked": marked })))
}
