//! Socket wire format. Every frame is a JSON object
//! `{"event": "<name>", "data": {...}}`.

use serde::{Deserialize, Serialize};

use crate::{
    auth::UserId,
    chats::model::{Attachment, ChatId, Message, MessageKind},
    AppResult,
};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    JoinChat(ChatRef),
    LeaveChat(ChatRef),
    SendMessage(SendMessage),
    TypingStart(ChatRef),
    TypingStop(ChatRef),
    MarkRead(ChatRef),
    SetOnlineStatus(OnlineStatus),
}

impl ClientEvent {
    pub fn parse(text: &str) -> AppResult<ClientEvent> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn name(&self) -> &'static str {
        use ClientEvent::*;
        match self {
            JoinChat(_) => "join-chat",
            LeaveChat(_) => "leave-chat",
            SendMessage(_) => "send-message",
            TypingStart(_) => "typing-start",
            TypingStop(_) => "typing-stop",
            MarkRead(_) => "mark-read",
            SetOnlineStatus(_) => "set-online-status",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ChatRef {
    pub chat_id: ChatId,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SendMessage {
    pub chat_id: ChatId,
    pub content: String,
    #[serde(default, rename = "type", alias = "messageType")]
    pub kind: MessageKind,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OnlineStatus {
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    NewMessage {
        chat_id: ChatId,
        message: Message,
    },
    TypingStart {
        chat_id: ChatId,
        user_id: UserId,
        user_name: String,
    },
    TypingStopped {
        chat_id: ChatId,
        user_id: UserId,
        user_name: String,
    },
    MessagesRead {
        chat_id: ChatId,
        user_id: UserId,
        user_name: String,
    },
    Error {
        message: String,
    },
}
