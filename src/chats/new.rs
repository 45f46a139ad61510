use axum::{debug_handler, extract::{rejection::JsonRejection, State}, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::SqlitePool;

use crate::{
    auth::{users, AuthUser, UserId},
    AppError, AppResult, AppState,
};

use super::{
    model::{ChatKind, ConsultationContext, NewChat},
    store::SharedStore,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct NewChatQuery {
    participants: Vec<UserId>,
    #[serde(default)]
    chat_type: ChatKind,
    title: Option<String>,
    #[serde(alias = "vaastuContext")]
    context: Option<ConsultationContext>,
}

/// The caller always ends up among the participants. Creating a direct chat
/// that already exists returns the existing one with 200 instead of 201.
#[debug_handler(state = AppState)]
pub(crate) async fn create_chat(
    State(db_pool): State<SqlitePool>,
    State(store): State<SharedStore>,
    AuthUser(me): AuthUser,

    payload: Result<Json<NewChatQuery>, JsonRejection>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let Json(NewChatQuery { mut participants, chat_type, title, context }) = payload?;

    if !participants.contains(&me.id) {
        participants.push(me.id);
    }
    let new = NewChat { participants, kind: chat_type, title, context }.normalized()?;

    if users::count_existing(&db_pool, &new.participants).await? != new.participants.len() {
        return Err(AppError::NotFound);
    }

    let (chat, created) = store.find_or_create(me.id, new).await?;
    let status = if created { StatusCode::CREATED } else { StatusCode::OK };

    Ok((status, Json(json!({ "success": true, "chat": chat }))))
}
