use std::sync::Arc;

use async_trait::async_trait;
use sqlx::SqlitePool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{auth::UserId, AppResult};

use super::model::{
    from_millis, to_millis, ChatId, ChatThread, ConsultationContext, Message, NewChat, NewMessage, Participant, Sender,
};

pub type SharedStore = Arc<dyn ChatStore>;

/// Persistent chat threads and their message logs.
///
/// Every operation that takes a user answers `None` when the thread doesn't
/// exist *or* the user isn't one of its participants; callers can't tell the
/// two apart.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Active threads `user` takes part in, most recent activity first.
    async fn list_for(&self, user: UserId) -> AppResult<Vec<ChatThread>>;

    async fn find_for(&self, chat: ChatId, user: UserId) -> AppResult<Option<ChatThread>>;

    async fn is_participant(&self, chat: ChatId, user: UserId) -> AppResult<bool>;

    /// Returns the thread and whether it was newly created. A direct chat
    /// between two users is only ever created once.
    async fn find_or_create(&self, viewer: UserId, new: NewChat) -> AppResult<(ChatThread, bool)>;

    /// Appends atomically and reads the stored message back. `None` if the
    /// thread is missing or inactive, or `sender` isn't a participant.
    async fn append_message(&self, chat: ChatId, sender: UserId, new: NewMessage) -> AppResult<Option<Message>>;

    /// Flips unread messages from other participants. Returns how many changed.
    async fn mark_read(&self, chat: ChatId, reader: UserId) -> AppResult<Option<u64>>;
}

#[derive(Clone)]
pub struct SqliteChatStore {
    db_pool: SqlitePool,
}

type ChatRow = (String, String, Option<String>, Option<String>, i64, bool, i64);
type ParticipantRow = (String, String, String, Option<String>, String);
type MessageRow = (String, String, String, Option<String>, String, String, String, i64, bool);

const MESSAGE_COLUMNS: &str =
    "m.id,m.sender_id,u.name,u.avatar,m.content,m.kind,m.attachments,m.created_at,m.is_read";

impl SqliteChatStore {
    pub fn new(db_pool: SqlitePool) -> SqliteChatStore {
        SqliteChatStore { db_pool }
    }

    async fn load(&self, chat: ChatId, viewer: UserId) -> AppResult<Option<ChatThread>> {
        let row: Option<ChatRow> = sqlx::query_as(
            "SELECT id,kind,title,context,last_message,is_active,created_at FROM chats WHERE id=?",
        )
        .bind(chat.to_string())
        .fetch_optional(&self.db_pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row, viewer).await?)),
            None => Ok(None),
        }
    }

    async fn hydrate(&self, (id, kind, title, context, last_message, is_active, created_at): ChatRow, viewer: UserId) -> AppResult<ChatThread> {
        let participants = sqlx::query_as::<_, ParticipantRow>(
            "SELECT u.id,u.name,u.email,u.avatar,u.role FROM chat_participants p \
            JOIN users u ON u.id=p.user_id WHERE p.chat_id=? ORDER BY p.position",
        )
        .bind(&id)
        .fetch_all(&self.db_pool)
        .await?
        .into_iter()
        .map(|(id, name, email, avatar, role)| -> AppResult<Participant> {
            Ok(Participant {
                id: Uuid::parse_str(&id)?,
                name,
                email,
                avatar,
                role: role.parse()?,
            })
        })
        .collect::<AppResult<Vec<_>>>()?;

        let messages = sqlx::query_as::<_, MessageRow>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages m JOIN users u ON u.id=m.sender_id \
            WHERE m.chat_id=? ORDER BY m.seq"
        ))
        .bind(&id)
        .fetch_all(&self.db_pool)
        .await?
        .into_iter()
        .map(message_from_row)
        .collect::<AppResult<Vec<_>>>()?;

        let unread_count = messages
            .iter()
            .filter(|m| !m.is_read && m.sender.id != viewer)
            .count();

        Ok(ChatThread {
            id: Uuid::parse_str(&id)?,
            participants,
            kind: kind.parse()?,
            title,
            context: context.as_deref().map(serde_json::from_str::<ConsultationContext>).transpose().map_err(anyhow::Error::from)?,
            messages,
            last_message: from_millis(last_message)?,
            is_active,
            created_at: from_millis(created_at)?,
            unread_count,
        })
    }
}

fn message_from_row((id, sender_id, name, avatar, content, kind, attachments, created_at, is_read): MessageRow) -> AppResult<Message> {
    Ok(Message {
        id: Uuid::parse_str(&id)?,
        sender: Sender {
            id: Uuid::parse_str(&sender_id)?,
            name,
            avatar,
        },
        content,
        kind: kind.parse()?,
        attachments: serde_json::from_str(&attachments).map_err(anyhow::Error::from)?,
        timestamp: from_millis(created_at)?,
        is_read,
    })
}

#[async_trait]
impl ChatStore for SqliteChatStore {
    async fn list_for(&self, user: UserId) -> AppResult<Vec<ChatThread>> {
        let rows: Vec<ChatRow> = sqlx::query_as(
            "SELECT c.id,c.kind,c.title,c.context,c.last_message,c.is_active,c.created_at FROM chats c \
            JOIN chat_participants p ON p.chat_id=c.id \
            WHERE p.user_id=? AND c.is_active=1 ORDER BY c.last_message DESC, c.created_at DESC",
        )
        .bind(user.to_string())
        .fetch_all(&self.db_pool)
        .await?;

        let mut threads = Vec::with_capacity(rows.len());
        for row in rows {
            threads.push(self.hydrate(row, user).await?);
        }
        Ok(threads)
    }

    async fn find_for(&self, chat: ChatId, user: UserId) -> AppResult<Option<ChatThread>> {
        if !self.is_participant(chat, user).await? {
            return Ok(None);
        }
        self.load(chat, user).await
    }

    async fn is_participant(&self, chat: ChatId, user: UserId) -> AppResult<bool> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM chat_participants WHERE chat_id=? AND user_id=?")
            .bind(chat.to_string())
            .bind(user.to_string())
            .fetch_optional(&self.db_pool)
            .await?;
        Ok(row.is_some())
    }

    async fn find_or_create(&self, viewer: UserId, new: NewChat) -> AppResult<(ChatThread, bool)> {
        let new = new.normalized()?;
        let direct_key = new.direct_key();
        let id = Uuid::now_v7();
        let now = to_millis(OffsetDateTime::now_utc());
        let context = new.context.as_ref().map(serde_json::to_string).transpose().map_err(anyhow::Error::from)?;

        let mut tx = self.db_pool.begin().await?;

        // write first so racing creators serialize on the active direct_key index
        let inserted = sqlx::query(
            "INSERT INTO chats (id,kind,title,context,last_message,is_active,direct_key,created_at) \
            VALUES (?,?,?,?,?,1,?,?) ON CONFLICT(direct_key) WHERE is_active=1 DO NOTHING",
        )
        .bind(id.to_string())
        .bind(new.kind.as_str())
        .bind(&new.title)
        .bind(&context)
        .bind(now)
        .bind(&direct_key)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let (chat, created) = if inserted == 0 {
            let (existing,): (String,) = sqlx::query_as("SELECT id FROM chats WHERE direct_key=? AND is_active=1")
                .bind(&direct_key)
                .fetch_one(&mut *tx)
                .await?;
            (Uuid::parse_str(&existing)?, false)
        } else {
            for (position, user_id) in new.participants.iter().enumerate() {
                sqlx::query("INSERT INTO chat_participants (chat_id,user_id,position) VALUES (?,?,?)")
                    .bind(id.to_string())
                    .bind(user_id.to_string())
                    .bind(position as i64)
                    .execute(&mut *tx)
                    .await?;
            }
            (id, true)
        };

        tx.commit().await?;

        if created {
            tracing::info!(chat = %chat, kind = %new.kind, participants = new.participants.len(), "chat created");
        }

        let thread = self
            .load(chat, viewer)
            .await?
            .ok_or_else(|| anyhow::anyhow!("chat {chat} vanished after commit"))?;
        Ok((thread, created))
    }

    async fn append_message(&self, chat: ChatId, sender: UserId, new: NewMessage) -> AppResult<Option<Message>> {
        let id = Uuid::now_v7();
        let now = to_millis(OffsetDateTime::now_utc());
        let attachments = serde_json::to_string(&new.attachments).map_err(anyhow::Error::from)?;

        let mut tx = self.db_pool.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO messages (id,chat_id,sender_id,content,kind,attachments,created_at,is_read) \
            SELECT ?,?,?,?,?,?,?,0 WHERE EXISTS ( \
                SELECT 1 FROM chats c JOIN chat_participants p ON p.chat_id=c.id \
                WHERE c.id=? AND c.is_active=1 AND p.user_id=? \
            )",
        )
        .bind(id.to_string())
        .bind(chat.to_string())
        .bind(sender.to_string())
        .bind(&new.content)
        .bind(new.kind.as_str())
        .bind(&attachments)
        .bind(now)
        .bind(chat.to_string())
        .bind(sender.to_string())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if inserted == 0 {
            return Ok(None);
        }

        sqlx::query("UPDATE chats SET last_message=MAX(last_message, ?) WHERE id=?")
            .bind(now)
            .bind(chat.to_string())
            .execute(&mut *tx)
            .await?;

        let row: MessageRow = sqlx::query_as(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages m JOIN users u ON u.id=m.sender_id WHERE m.id=?"
        ))
        .bind(id.to_string())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(message_from_row(row)?))
    }

    async fn mark_read(&self, chat: ChatId, reader: UserId) -> AppResult<Option<u64>> {
        if !self.is_participant(chat, reader).await? {
            return Ok(None);
        }

        let flipped = sqlx::query("UPDATE messages SET is_read=1 WHERE chat_id=? AND sender_id<>? AND is_read=0")
            .bind(chat.to_string())
            .bind(reader.to_string())
            .execute(&self.db_pool)
            .await?
            .rows_affected();

        Ok(Some(flipped))
    }
}
