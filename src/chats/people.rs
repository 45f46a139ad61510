use axum::{debug_handler, extract::State, Json};
use serde_json::{json, Value};
use sqlx::SqlitePool;

use crate::{auth::{users, AuthUser}, relay::Relay, AppResult, AppState};

#[debug_handler(state = AppState)]
pub(crate) async fn consultants(
    State(db_pool): State<SqlitePool>,
    AuthUser(_): AuthUser,
) -> AppResult<Json<Value>> {
    let consultants = users::list_consultants(&db_pool).await?;
    Ok(Json(json!({ "success": true, "consultants": consultants })))
}

#[debug_handler(state = AppState)]
pub(crate) async fn online(
    State(relay): State<Relay>,
    AuthUser(_): AuthUser,
) -> AppResult<Json<Value>> {
    let online = relay.online_users().await;
    Ok(Json(json!({ "success": true, "users": online })))
}
