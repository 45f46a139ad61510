//! Server-side state of one live socket.
//!
//! A `Session` only exists once the handshake credential has been verified,
//! and is dropped on disconnect. Room joins live here and nowhere else, so a
//! reconnecting client starts with no rooms.

use std::collections::HashSet;

use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

use crate::{auth::Identity, chats::model::ChatId, relay::events::ServerEvent};

pub type ConnId = Uuid;

#[derive(Debug)]
pub struct Session {
    pub conn: ConnId,
    pub identity: Identity,
    rooms: HashSet<ChatId>,
    outbox: mpsc::Sender<ServerEvent>,
}

impl Session {
    pub fn new(identity: Identity, outbox: mpsc::Sender<ServerEvent>) -> Session {
        Session {
            conn: Uuid::now_v7(),
            identity,
            rooms: HashSet::new(),
            outbox,
        }
    }

    /// Returns false if already joined.
    pub fn join(&mut self, chat: ChatId) -> bool {
        self.rooms.insert(chat)
    }

    /// Returns false if not joined.
    pub fn leave(&mut self, chat: ChatId) -> bool {
        self.rooms.remove(&chat)
    }

    pub fn is_member(&self, chat: ChatId) -> bool {
        self.rooms.contains(&chat)
    }

    pub fn rooms(&self) -> impl Iterator<Item = ChatId> + '_ {
        self.rooms.iter().copied()
    }

    /// Queues an event without waiting. A full or closed queue loses the event.
    pub fn send(&self, event: ServerEvent) -> bool {
        match self.outbox.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(conn = %self.conn, user = %self.identity.id, "outbound queue full, dropping event");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}
