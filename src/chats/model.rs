use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{auth::{Role, UserId}, AppError, AppResult};

pub type ChatId = Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatKind {
    #[default]
    Direct,
    Group,
    Consultation,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    #[default]
    Text,
    Image,
    File,
    Location,
}

macro_rules! str_enum {
    ($T:ty { $($V:ident => $s:literal),+ $(,)? }) => {
        impl $T {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$V => $s,)+
                }
            }
        }

        impl fmt::Display for $T {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $T {
            type Err = anyhow::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$V),)+
                    other => Err(anyhow::anyhow!("unknown {} {other:?}", stringify!($T))),
                }
            }
        }
    };
}

str_enum!(ChatKind { Direct => "direct", Group => "group", Consultation => "consultation" });
str_enum!(MessageKind { Text => "text", Image => "image", File => "file", Location => "location" });

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Attachment {
    /// Free-form media type label, e.g. `image/png`.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    Residential,
    Commercial,
    Industrial,
    Temple,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    North,
    South,
    East,
    West,
    Northeast,
    Northwest,
    Southeast,
    Southwest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConstructionStage {
    Planning,
    UnderConstruction,
    Completed,
    Renovation,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Dimensions {
    pub length: f64,
    pub width: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PropertyDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Dimensions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facing: Option<Facing>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub construction_stage: Option<ConstructionStage>,
}

/// Property details attached to consultation chats.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConsultationContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_type: Option<PropertyType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_details: Option<PropertyDetails>,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub remedies: Vec<String>,
}

/// Display attributes of a message author.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Sender {
    pub id: UserId,
    pub name: String,
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub sender: Sender,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub attachments: Vec<Attachment>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub is_read: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatThread {
    pub id: ChatId,
    pub participants: Vec<Participant>,
    #[serde(rename = "chatType")]
    pub kind: ChatKind,
    pub title: Option<String>,
    pub context: Option<ConsultationContext>,
    pub messages: Vec<Message>,
    #[serde(with = "time::serde::rfc3339")]
    pub last_message: OffsetDateTime,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Messages from other participants the viewer hasn't read.
    pub unread_count: usize,
}

#[derive(Debug, Clone)]
pub struct NewChat {
    pub participants: Vec<UserId>,
    pub kind: ChatKind,
    pub title: Option<String>,
    pub context: Option<ConsultationContext>,
}

impl NewChat {
    /// Drops duplicate participants (keeping first position) and checks the
    /// participant count against the chat kind.
    pub fn normalized(mut self) -> AppResult<NewChat> {
        let mut seen = Vec::with_capacity(self.participants.len());
        self.participants.retain(|id| {
            if seen.contains(id) {
                false
            } else {
                seen.push(*id);
                true
            }
        });

        if self.participants.is_empty() {
            return Err("a chat needs at least one participant".into());
        }
        if self.kind == ChatKind::Direct && self.participants.len() != 2 {
            return Err("direct chats need exactly two participants".into());
        }

        self.title = self.title
            .map(|t| t.trim().to_owned())
            .filter(|t| !t.is_empty());
        Ok(self)
    }

    /// Key shared by every direct chat between the same two users.
    pub fn direct_key(&self) -> Option<String> {
        match (self.kind, self.participants.as_slice()) {
            (ChatKind::Direct, [a, b]) => {
                let (lo, hi) = if a < b { (a, b) } else { (b, a) };
                Some(format!("{lo}:{hi}"))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub content: String,
    pub kind: MessageKind,
    pub attachments: Vec<Attachment>,
}

impl NewMessage {
    pub fn new(content: &str, kind: MessageKind, attachments: Vec<Attachment>) -> AppResult<NewMessage> {
        let content = content.trim();
        if content.is_empty() {
            return Err(AppError::Validation("message content is required".to_owned()));
        }
        if attachments.iter().any(|a| a.url.trim().is_empty()) {
            return Err(AppError::Validation("attachment url is required".to_owned()));
        }

        Ok(NewMessage {
            content: content.to_owned(),
            kind,
            attachments,
        })
    }

    pub fn text(content: &str) -> AppResult<NewMessage> {
        NewMessage::new(content, MessageKind::Text, Vec::new())
    }
}

pub(crate) fn to_millis(at: OffsetDateTime) -> i64 {
    (at.unix_timestamp_nanos() / 1_000_000) as i64
}

pub(crate) fn from_millis(millis: i64) -> AppResult<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(millis as i128 * 1_000_000)
        .map_err(|e| AppError::Internal(anyhow::Error::from(e)))
}
