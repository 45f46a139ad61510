use sqlx::SqlitePool;
use uuid::Uuid;

use crate::AppResult;

use super::{Identity, Role, UserId};

type UserRow = (String, String, String, Option<String>, String, bool);

fn from_row((id, name, email, avatar, role, is_verified): UserRow) -> AppResult<Identity> {
    Ok(Identity {
        id: Uuid::parse_str(&id)?,
        name,
        email,
        avatar,
        role: role.parse()?,
        is_verified,
    })
}

pub async fn find_user(db_pool: &SqlitePool, user_id: UserId) -> AppResult<Option<Identity>> {
    sqlx::query_as::<_, UserRow>("SELECT id,name,email,avatar,role,is_verified FROM users WHERE id=?")
        .bind(user_id.to_string())
        .fetch_optional(db_pool)
        .await?
        .map(from_row)
        .transpose()
}

pub async fn list_consultants(db_pool: &SqlitePool) -> AppResult<Vec<Identity>> {
    sqlx::query_as::<_, UserRow>(
        "SELECT id,name,email,avatar,role,is_verified FROM users WHERE role='consultant' AND is_verified=1 ORDER BY name",
    )
    .fetch_all(db_pool)
    .await?
    .into_iter()
    .map(from_row)
    .collect()
}

/// Returns how many of `user_ids` exist.
pub(crate) async fn count_existing(db_pool: &SqlitePool, user_ids: &[UserId]) -> AppResult<usize> {
    let mut found = 0;
    for user_id in user_ids {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM users WHERE id=?")
            .bind(user_id.to_string())
            .fetch_optional(db_pool)
            .await?;
        found += row.is_some() as usize;
    }
    Ok(found)
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub role: Role,
    pub is_verified: bool,
}

/// Users belong to the account service; this exists for seeding and tests.
pub async fn create_user(db_pool: &SqlitePool, new: NewUser) -> AppResult<Identity> {
    let id = Uuid::now_v7();
    tracing::info!(user = %id, name = %new.name, role = %new.role, "adding user");

    sqlx::query("INSERT INTO users (id,name,email,avatar,role,is_verified) VALUES (?,?,?,?,?,?)")
        .bind(id.to_string())
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.avatar)
        .bind(new.role.as_str())
        .bind(new.is_verified)
        .execute(db_pool)
        .await?;

    Ok(Identity {
        id,
        name: new.name,
        email: new.email,
        avatar: new.avatar,
        role: new.role,
        is_verified: new.is_verified,
    })
}
