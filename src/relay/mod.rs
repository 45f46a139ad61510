pub mod events;
pub mod presence;
pub mod ws;

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info};

use crate::{
    auth::{Identity, UserId},
    chats::{
        model::{ChatId, Message, NewMessage},
        store::SharedStore,
    },
    config::RelayConfig,
    session::{ConnId, Session},
    AppError, AppResult,
};

use self::{
    events::{ClientEvent, SendMessage, ServerEvent},
    presence::{OnlineUser, PresenceTable},
};

/// Routes room-scoped events between live sessions and persists through the
/// chat store.
///
/// The in-memory tables are guarded by one lock that is never held while
/// waiting on the store, so a slow write only delays its own event.
#[derive(Clone)]
pub struct Relay {
    store: SharedStore,
    inner: Arc<Mutex<Inner>>,
    cfg: RelayConfig,
}

#[derive(Default)]
struct Inner {
    presence: PresenceTable,
    sessions: HashMap<ConnId, Session>,
    /// chat -> sessions that joined its room. Kept in sync with `Session::rooms`.
    rooms: HashMap<ChatId, HashSet<ConnId>>,
}

impl Inner {
    fn session(&self, conn: ConnId) -> AppResult<&Session> {
        self.sessions
            .get(&conn)
            .ok_or(AppError::Unauthorized("session closed"))
    }

    /// Sends `event` to every session in the room except `skip`. Returns how
    /// many sessions accepted it.
    fn fan_out(&self, chat: ChatId, event: &ServerEvent, skip: Option<ConnId>) -> usize {
        let Some(members) = self.rooms.get(&chat) else {
            return 0;
        };

        members
            .iter()
            .filter(|conn| Some(**conn) != skip)
            .filter_map(|conn| self.sessions.get(conn))
            .filter(|session| session.send(event.clone()))
            .count()
    }
}

impl Relay {
    pub fn new(store: SharedStore, cfg: RelayConfig) -> Relay {
        Relay {
            store,
            inner: Arc::new(Mutex::new(Inner::default())),
            cfg,
        }
    }

    /// Registers a verified connection. Events for it arrive on the receiver.
    pub async fn connect(&self, identity: Identity) -> (ConnId, mpsc::Receiver<ServerEvent>) {
        let (tx, rx) = mpsc::channel(self.cfg.session_queue_capacity);
        let session = Session::new(identity, tx);
        let conn = session.conn;
        let user = session.identity.id;

        let mut inner = self.inner.lock().await;
        let went_online = inner.presence.register(user, conn);
        info!(user = %user, name = %session.identity.name, conn = %conn, went_online, "connected");
        inner.sessions.insert(conn, session);

        (conn, rx)
    }

    pub async fn disconnect(&self, conn: ConnId) {
        let mut inner = self.inner.lock().await;
        let Some(session) = inner.sessions.remove(&conn) else {
            return;
        };

        for chat in session.rooms() {
            if let Some(members) = inner.rooms.get_mut(&chat) {
                members.remove(&conn);
                if members.is_empty() {
                    inner.rooms.remove(&chat);
                }
            }
        }

        let went_offline = inner.presence.unregister(session.identity.id, conn);
        info!(user = %session.identity.id, conn = %conn, went_offline, "disconnected");
    }

    /// Parses and handles one inbound frame. Failures go back to this
    /// connection only, as an `error` event.
    pub async fn handle_text(&self, conn: ConnId, text: &str) {
        match ClientEvent::parse(text) {
            Ok(event) => self.handle(conn, event).await,
            Err(err) => self.reject(conn, "parse", err).await,
        }
    }

    /// Binary frames must still carry UTF-8 JSON. Anything else is refused,
    /// never patched up.
    pub async fn handle_bytes(&self, conn: ConnId, bytes: &[u8]) {
        match std::str::from_utf8(bytes) {
            Ok(text) => self.handle_text(conn, text).await,
            Err(_) => {
                let err = AppError::Validation("frame is not valid UTF-8".to_owned());
                self.reject(conn, "parse", err).await
            }
        }
    }

    pub async fn handle(&self, conn: ConnId, event: ClientEvent) {
        let name = event.name();
        let result = match event {
            ClientEvent::JoinChat(r) => self.join_chat(conn, r.chat_id).await,
            ClientEvent::LeaveChat(r) => self.leave_chat(conn, r.chat_id).await,
            ClientEvent::SendMessage(msg) => self.send_message(conn, msg).await.map(drop),
            ClientEvent::TypingStart(r) => self.typing(conn, r.chat_id, true).await,
            ClientEvent::TypingStop(r) => self.typing(conn, r.chat_id, false).await,
            ClientEvent::MarkRead(r) => self.mark_read(conn, r.chat_id).await.map(drop),
            ClientEvent::SetOnlineStatus(s) => self.set_online_status(conn, s.status).await,
        };

        if let Err(err) = result {
            self.reject(conn, name, err).await;
        }
    }

    async fn reject(&self, conn: ConnId, context: &str, err: AppError) {
        err.log(context);
        let inner = self.inner.lock().await;
        if let Some(session) = inner.sessions.get(&conn) {
            session.send(ServerEvent::Error { message: err.public_message() });
        }
    }

    async fn identity_of(&self, conn: ConnId) -> AppResult<Identity> {
        let inner = self.inner.lock().await;
        Ok(inner.session(conn)?.identity.clone())
    }

    /// Only participants may listen to a room.
    pub async fn join_chat(&self, conn: ConnId, chat: ChatId) -> AppResult<()> {
        let identity = self.identity_of(conn).await?;
        if !self.store.is_participant(chat, identity.id).await? {
            return Err(AppError::NotFound);
        }

        let mut inner = self.inner.lock().await;
        // the socket may have closed while the store answered
        let Some(session) = inner.sessions.get_mut(&conn) else {
            return Ok(());
        };
        if session.join(chat) {
            inner.rooms.entry(chat).or_default().insert(conn);
            debug!(user = %identity.id, conn = %conn, chat = %chat, "joined chat");
        }
        Ok(())
    }

    pub async fn leave_chat(&self, conn: ConnId, chat: ChatId) -> AppResult<()> {
        let mut inner = self.inner.lock().await;
        let session = inner
            .sessions
            .get_mut(&conn)
            .ok_or(AppError::Unauthorized("session closed"))?;

        if session.leave(chat) {
            let user = session.identity.id;
            if let Some(members) = inner.rooms.get_mut(&chat) {
                members.remove(&conn);
                if members.is_empty() {
                    inner.rooms.remove(&chat);
                }
            }
            debug!(user = %user, conn = %conn, chat = %chat, "left chat");
        }
        Ok(())
    }

    pub async fn send_message(&self, conn: ConnId, msg: SendMessage) -> AppResult<Message> {
        let identity = self.identity_of(conn).await?;
        let new = NewMessage::new(&msg.content, msg.kind, msg.attachments)?;
        self.post_message(&identity, msg.chat_id, new, Some(conn)).await
    }

    /// Persists a message and pushes it to everyone in the room, the author's
    /// own session included. Nothing is broadcast unless the write succeeded.
    pub async fn post_message(&self, sender: &Identity, chat: ChatId, new: NewMessage, origin: Option<ConnId>) -> AppResult<Message> {
        let message = self
            .store
            .append_message(chat, sender.id, new)
            .await?
            .ok_or(AppError::NotFound)?;

        let inner = self.inner.lock().await;
        let delivered = inner.fan_out(
            chat,
            &ServerEvent::NewMessage {
                chat_id: chat,
                message: message.clone(),
            },
            None,
        );
        if let Some(origin) = origin {
            // sending implies the author stopped typing
            inner.fan_out(chat, &typing_event(chat, sender, false), Some(origin));
        }
        debug!(user = %sender.id, chat = %chat, message = %message.id, delivered, "message relayed");

        Ok(message)
    }

    /// Typing signals are relayed only, never stored. Any participant may send
    /// them; only sessions that joined the room hear them. There is no
    /// server-side expiry: a client that never sends `typing-stop` stays
    /// "typing" for its peers.
    pub async fn typing(&self, conn: ConnId, chat: ChatId, started: bool) -> AppResult<()> {
        let (identity, joined) = {
            let inner = self.inner.lock().await;
            let session = inner.session(conn)?;
            (session.identity.clone(), session.is_member(chat))
        };
        if !joined && !self.store.is_participant(chat, identity.id).await? {
            return Err(AppError::NotFound);
        }

        let inner = self.inner.lock().await;
        inner.fan_out(chat, &typing_event(chat, &identity, started), Some(conn));
        Ok(())
    }

    pub async fn mark_read(&self, conn: ConnId, chat: ChatId) -> AppResult<u64> {
        let identity = self.identity_of(conn).await?;
        self.mark_read_as(&identity, chat, Some(conn)).await
    }

    /// Marks everything other participants sent as read. Only announces it
    /// when something actually changed.
    pub async fn mark_read_as(&self, reader: &Identity, chat: ChatId, origin: Option<ConnId>) -> AppResult<u64> {
        let flipped = self
            .store
            .mark_read(chat, reader.id)
            .await?
            .ok_or(AppError::NotFound)?;

        if flipped > 0 {
            let inner = self.inner.lock().await;
            inner.fan_out(
                chat,
                &ServerEvent::MessagesRead {
                    chat_id: chat,
                    user_id: reader.id,
                    user_name: reader.name.clone(),
                },
                origin,
            );
            debug!(user = %reader.id, chat = %chat, flipped, "messages read");
        }

        Ok(flipped)
    }

    pub async fn set_online_status(&self, conn: ConnId, status: Option<String>) -> AppResult<()> {
        let status = status.map(|s| s.trim().to_owned()).filter(|s| !s.is_empty());

        let mut inner = self.inner.lock().await;
        let user = inner.session(conn)?.identity.id;
        inner.presence.set_status(user, status);
        Ok(())
    }

    pub async fn is_online(&self, user: UserId) -> bool {
        self.inner.lock().await.presence.is_online(user)
    }

    pub async fn connections_of(&self, user: UserId) -> HashSet<ConnId> {
        self.inner.lock().await.presence.handles_for(user)
    }

    pub async fn online_users(&self) -> Vec<OnlineUser> {
        self.inner.lock().await.presence.online()
    }

    /// Sessions currently listening to `chat`.
    pub async fn room_size(&self, chat: ChatId) -> usize {
        self.inner
            .lock()
            .await
            .rooms
            .get(&chat)
            .map_or(0, HashSet::len)
    }
}

fn typing_event(chat: ChatId, who: &Identity, started: bool) -> ServerEvent {
    let (chat_id, user_id, user_name) = (chat, who.id, who.name.clone());
    if started {
        ServerEvent::TypingStart { chat_id, user_id, user_name }
    } else {
        ServerEvent::TypingStopped { chat_id, user_id, user_name }
    }
}
