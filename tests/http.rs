mod common;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use common::{app_state, assert_silent, chat, next_event, token_for, user, SECRET};
use serde_json::{json, Value};
use tower::ServiceExt;
use vaastu_chat::{
    auth::{token::{self, Claims}, Role},
    chats::model::ChatKind,
    relay::events::{ChatRef, ClientEvent, ServerEvent},
};

async fn call(app: &Router, method: Method, uri: &str, bearer: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let req = match body {
        Some(body) => req
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => req.body(Body::empty()).unwrap(),
    };

    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, value)
}

#[tokio::test]
async fn health_needs_no_credential() {
    let app = vaastu_chat::app(app_state().await);
    let (status, body) = call(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn missing_or_bad_credentials_are_rejected() {
    let state = app_state().await;
    let app = vaastu_chat::app(state.clone());
    let asha = user(&state, "Asha", Role::User).await;

    let (status, body) = call(&app, Method::GET, "/api/chat", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "success": false, "message": "unauthorized: no token provided" }));

    let (status, _) = call(&app, Method::GET, "/api/chat", Some("v1.garbage.garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let expired = token::sign(&Claims { id: asha.id, exp: 1 }, SECRET).unwrap();
    let (status, body) = call(&app, Method::GET, "/api/chat", Some(&expired), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "unauthorized: token expired");

    let forged = token::sign(&Claims::expiring_in(asha.id, 3600), "some-other-secret-entirely").unwrap();
    let (status, _) = call(&app, Method::GET, "/api/chat", Some(&forged), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // a well-signed token for a user that no longer exists
    let ghost = token::sign(&Claims::expiring_in(uuid::Uuid::now_v7(), 3600), SECRET).unwrap();
    let (status, body) = call(&app, Method::GET, "/api/chat", Some(&ghost), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "unauthorized: user not found");
}

#[tokio::test]
async fn socket_handshake_checks_the_credential_first() {
    let state = app_state().await;
    let app = vaastu_chat::app(state.clone());

    let (status, _) = call(&app, Method::GET, "/ws", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call(&app, Method::GET, "/ws?token=nonsense", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn creating_a_direct_chat_twice_returns_the_same_thread() {
    let state = app_state().await;
    let app = vaastu_chat::app(state.clone());
    let asha = user(&state, "Asha", Role::User).await;
    let ravi = user(&state, "Ravi", Role::Consultant).await;

    // caller is added implicitly
    let (status, first) = call(
        &app,
        Method::POST,
        "/api/chat",
        Some(&token_for(&state, &asha)),
        Some(json!({ "participants": [ravi.id], "chatType": "direct" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["chat"]["participants"].as_array().unwrap().len(), 2);
    assert_eq!(first["chat"]["chatType"], "direct");

    let (status, second) = call(
        &app,
        Method::POST,
        "/api/chat",
        Some(&token_for(&state, &ravi)),
        Some(json!({ "participants": [asha.id, ravi.id] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["chat"]["id"], second["chat"]["id"]);
}

#[tokio::test]
async fn creating_chats_validates_participants() {
    let state = app_state().await;
    let app = vaastu_chat::app(state.clone());
    let asha = user(&state, "Asha", Role::User).await;
    let token = token_for(&state, &asha);

    // only the caller: a direct chat needs someone else
    let (status, _) = call(&app, Method::POST, "/api/chat", Some(&token), Some(json!({ "participants": [] }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/chat",
        Some(&token),
        Some(json!({ "participants": [uuid::Uuid::now_v7()] })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = call(&app, Method::POST, "/api/chat", Some(&token), Some(json!({ "participants": "everyone" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn consultation_chats_keep_their_context() {
    let state = app_state().await;
    let app = vaastu_chat::app(state.clone());
    let asha = user(&state, "Asha", Role::User).await;
    let ravi = user(&state, "Ravi", Role::Consultant).await;

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/chat",
        Some(&token_for(&state, &asha)),
        Some(json!({
            "participants": [ravi.id],
            "chatType": "consultation",
            "title": "Plot in Pune",
            "vaastuContext": {
                "propertyType": "commercial",
                "propertyDetails": { "facing": "northeast" },
                "issues": ["entrance in south-west"]
            }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["chat"]["title"], "Plot in Pune");
    assert_eq!(body["chat"]["context"]["propertyType"], "commercial");
    assert_eq!(body["chat"]["context"]["propertyDetails"]["facing"], "northeast");
}

#[tokio::test]
async fn threads_are_hidden_from_non_participants() {
    let state = app_state().await;
    let app = vaastu_chat::app(state.clone());
    let asha = user(&state, "Asha", Role::User).await;
    let ravi = user(&state, "Ravi", Role::Consultant).await;
    let meera = user(&state, "Meera", Role::User).await;
    let thread = chat(&state, ChatKind::Direct, &[&asha, &ravi]).await;
    let uri = format!("/api/chat/{}", thread.id);

    let (status, body) = call(&app, Method::GET, &uri, Some(&token_for(&state, &asha)), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["chat"]["id"], json!(thread.id));

    let meera_token = token_for(&state, &meera);
    let (status, body) = call(&app, Method::GET, &uri, Some(&meera_token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "chat not found or access denied");

    let (status, _) = call(&app, Method::GET, "/api/chat/not-a-chat", Some(&meera_token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(
        &app,
        Method::POST,
        &format!("{uri}/messages"),
        Some(&meera_token),
        Some(json!({ "content": "hello" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = call(&app, Method::GET, "/api/chat", Some(&meera_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["chats"], json!([]));
}

#[tokio::test]
async fn http_messages_reach_joined_sockets() {
    let state = app_state().await;
    let app = vaastu_chat::app(state.clone());
    let asha = user(&state, "Asha", Role::User).await;
    let ravi = user(&state, "Ravi", Role::Consultant).await;
    let thread = chat(&state, ChatKind::Direct, &[&asha, &ravi]).await;

    let (conn, mut rx) = state.relay.connect(ravi.clone()).await;
    state.relay.handle(conn, ClientEvent::JoinChat(ChatRef { chat_id: thread.id })).await;

    let (status, body) = call(
        &app,
        Method::POST,
        &format!("/api/chat/{}/messages", thread.id),
        Some(&token_for(&state, &asha)),
        Some(json!({ "content": "  floor plan attached  ", "messageType": "image",
                     "attachments": [{ "type": "image/png", "url": "https://cdn.example.com/plan.png" }] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"]["content"], "floor plan attached");
    assert_eq!(body["message"]["type"], "image");
    assert_eq!(body["message"]["sender"]["name"], "Asha");
    assert_eq!(body["message"]["attachments"][0]["type"], "image/png");

    match next_event(&mut rx).await {
        ServerEvent::NewMessage { chat_id, message } => {
            assert_eq!(chat_id, thread.id);
            assert_eq!(json!(message.id), body["message"]["id"]);
        }
        other => panic!("expected new-message, got {other:?}"),
    }
    assert_silent(&mut rx).await;

    let (status, _) = call(
        &app,
        Method::POST,
        &format!("/api/chat/{}/messages", thread.id),
        Some(&token_for(&state, &asha)),
        Some(json!({ "content": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_silent(&mut rx).await;
}

#[tokio::test]
async fn mark_read_over_http_notifies_the_room() {
    let state = app_state().await;
    let app = vaastu_chat::app(state.clone());
    let asha = user(&state, "Asha", Role::User).await;
    let ravi = user(&state, "Ravi", Role::Consultant).await;
    let thread = chat(&state, ChatKind::Direct, &[&asha, &ravi]).await;

    let (conn, mut rx) = state.relay.connect(ravi.clone()).await;
    state.relay.handle(conn, ClientEvent::JoinChat(ChatRef { chat_id: thread.id })).await;
    state
        .relay
        .post_message(&ravi, thread.id, vaastu_chat::chats::model::NewMessage::text("north door is fine").unwrap(), None)
        .await
        .unwrap();
    assert!(matches!(next_event(&mut rx).await, ServerEvent::NewMessage { .. }));

    let uri = format!("/api/chat/{}/read", thread.id);
    let token = token_for(&state, &asha);

    let (status, body) = call(&app, Method::PUT, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["marked"], 1);
    assert_eq!(
        next_event(&mut rx).await,
        ServerEvent::MessagesRead { chat_id: thread.id, user_id: asha.id, user_name: "Asha".to_owned() }
    );

    let (status, body) = call(&app, Method::PUT, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["marked"], 0);
    assert_silent(&mut rx).await;

    let (_, body) = call(&app, Method::GET, &format!("/api/chat/{}", thread.id), Some(&token), None).await;
    assert_eq!(body["chat"]["unreadCount"], 0);
    assert_eq!(body["chat"]["messages"][0]["isRead"], true);
}

#[tokio::test]
async fn consultant_directory_lists_verified_consultants_only() {
    let state = app_state().await;
    let app = vaastu_chat::app(state.clone());
    let asha = user(&state, "Asha", Role::User).await;
    let ravi = user(&state, "Ravi", Role::Consultant).await;
    let meera = user(&state, "Meera", Role::Consultant).await;

    let (status, body) = call(&app, Method::GET, "/api/chat/consultants/list", Some(&token_for(&state, &asha)), None).await;
    assert_eq!(status, StatusCode::OK);

    let names: Vec<_> = body["consultants"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap().to_owned())
        .collect();
    assert_eq!(names, vec![meera.name.clone(), ravi.name.clone()]);
}

#[tokio::test]
async fn online_list_reflects_live_sessions() {
    let state = app_state().await;
    let app = vaastu_chat::app(state.clone());
    let asha = user(&state, "Asha", Role::User).await;
    let ravi = user(&state, "Ravi", Role::Consultant).await;
    let token = token_for(&state, &asha);

    let (_, body) = call(&app, Method::GET, "/api/chat/online/list", Some(&token), None).await;
    assert_eq!(body["users"], json!([]));

    let (conn, _rx) = state.relay.connect(ravi.clone()).await;
    let (_, body) = call(&app, Method::GET, "/api/chat/online/list", Some(&token), None).await;
    assert_eq!(body["users"][0]["userId"], json!(ravi.id));
    assert_eq!(body["users"][0]["connections"], 1);

    state.relay.disconnect(conn).await;
    let (_, body) = call(&app, Method::GET, "/api/chat/online/list", Some(&token), None).await;
    assert_eq!(body["users"], json!([]));
}
