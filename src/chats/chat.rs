use axum::{debug_handler, extract::{Path, State}, Json};
use serde_json::{json, Value};

use crate::{auth::AuthUser, AppError, AppResult, AppState};

use super::{parse_chat_id, store::SharedStore};

#[debug_handler(state = AppState)]
pub(crate) async fn list_chats(
    State(store): State<SharedStore>,
    AuthUser(me): AuthUser,
) -> AppResult<Json<Value>> {
    let chats = store.list_for(me.id).await?;
    Ok(Json(json!({ "success": true, "chats": chats })))
}

#[debug_handler(state = AppState)]
pub(crate) async fn get_chat(
    State(store): State<SharedStore>,
    AuthUser(me): AuthUser,
    Path(chat_id): Path<String>,
) -> AppResult<Json<Value>> {
    let chat_id = parse_chat_id(&chat_id)?;
    let Some(chat) = store.find_for(chat_id, me.id).await? else {
        return Err(AppError::NotFound);
    };

    Ok(Json(json!({ "success": true, "chat": chat })))
}
