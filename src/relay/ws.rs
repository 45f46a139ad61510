use axum::{
    debug_handler,
    extract::{ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket}, Query, State, WebSocketUpgrade},
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;

use crate::{
    auth::{bearer, Identity, Verifier},
    AppResult, AppState,
};

use super::Relay;

#[derive(Deserialize)]
pub struct WsQuery {
    token: Option<String>,
}

/// Handshake: the credential comes from `?token=` or an `Authorization`
/// header. An unverified client gets a 401 and is never upgraded.
#[debug_handler(state = AppState)]
pub async fn chat_ws(
    Query(WsQuery { token }): Query<WsQuery>,
    State(verifier): State<Verifier>,
    State(relay): State<Relay>,
    headers: HeaderMap,

    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> AppResult<Response> {
    let credential = token.as_deref().or_else(|| bearer(&headers));
    let identity = verifier.verify(credential).await?;

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return Ok(rejection.into_response()),
    };

    Ok(ws.on_upgrade(move |socket| run_session(relay, identity, socket)))
}

pub async fn run_session(relay: Relay, identity: Identity, socket: WebSocket) {
    let (conn, mut outbox) = relay.connect(identity).await;
    let (mut sender, mut receiver) = socket.split();

    let mut outbound_task = tokio::spawn(async move {
        while let Some(event) = outbox.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(err) => {
                    tracing::error!(error = %err, "can't encode server event");
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    // one frame at a time keeps this connection's events in order
    let inbound = async {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => relay.handle_text(conn, text.as_str()).await,
                Message::Binary(bytes) => relay.handle_bytes(conn, &bytes).await,
                Message::Close(_) => break,
                Message::Ping(_) | Message::Pong(_) => {}
            }
        }
    };

    tokio::select! {
        _ = inbound => {},
        _ = &mut outbound_task => {},
    }

    relay.disconnect(conn).await;
    outbound_task.abort();
}
