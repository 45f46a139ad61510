use anyhow::Context;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY NOT NULL,
        name TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE,
        avatar TEXT,
        role TEXT NOT NULL DEFAULT 'user',
        is_verified INTEGER NOT NULL DEFAULT 0
    )"#,
    r#"CREATE TABLE IF NOT EXISTS chats (
        id TEXT PRIMARY KEY NOT NULL,
        kind TEXT NOT NULL,
        title TEXT,
        context TEXT,
        last_message INTEGER NOT NULL,
        is_active INTEGER NOT NULL DEFAULT 1,
        direct_key TEXT,
        created_at INTEGER NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS chat_participants (
        chat_id TEXT NOT NULL REFERENCES chats(id),
        user_id TEXT NOT NULL REFERENCES users(id),
        position INTEGER NOT NULL,
        PRIMARY KEY (chat_id, user_id)
    )"#,
    // one live direct chat per pair; soft-deleted ones don't count
    "CREATE UNIQUE INDEX IF NOT EXISTS chats_direct_key ON chats(direct_key) WHERE is_active=1",
    "CREATE INDEX IF NOT EXISTS chat_participants_user ON chat_participants(user_id)",
    r#"CREATE TABLE IF NOT EXISTS messages (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        chat_id TEXT NOT NULL REFERENCES chats(id),
        sender_id TEXT NOT NULL REFERENCES users(id),
        content TEXT NOT NULL,
        kind TEXT NOT NULL,
        attachments TEXT NOT NULL DEFAULT '[]',
        created_at INTEGER NOT NULL,
        is_read INTEGER NOT NULL DEFAULT 0
    )"#,
    "CREATE INDEX IF NOT EXISTS messages_chat ON messages(chat_id, seq)",
];

pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<SqlitePool> {
    let db_pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .with_context(|| format!("connect {database_url}"))?;

    migrate(&db_pool).await?;
    Ok(db_pool)
}

/// Creates the schema if it isn't there yet.
pub async fn migrate(db_pool: &SqlitePool) -> anyhow::Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(db_pool)
            .await
            .context("apply schema")?;
    }
    Ok(())
}
