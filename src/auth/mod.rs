use std::{fmt, str::FromStr, sync::Arc};

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{AppError, AppResult};

pub mod token;
pub mod users;

pub type UserId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Consultant,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        use Role::*;
        match self {
            User => "user",
            Consultant => "consultant",
            Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use Role::*;
        match s {
            "user" => Ok(User),
            "consultant" => Ok(Consultant),
            "admin" => Ok(Admin),
            other => Err(anyhow::anyhow!("unknown role {other:?}")),
        }
    }
}

/// A verified user, as resolved from a bearer credential.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub role: Role,
    pub is_verified: bool,
}

/// Resolves bearer credentials to identities. Shared by the HTTP routes and
/// the socket handshake so both reject the same credentials the same way.
#[derive(Clone)]
pub struct Verifier {
    db_pool: SqlitePool,
    secret: Arc<str>,
}

impl Verifier {
    pub fn new(db_pool: SqlitePool, secret: &str) -> Verifier {
        Verifier {
            db_pool,
            secret: secret.into(),
        }
    }

    pub async fn verify(&self, credential: Option<&str>) -> AppResult<Identity> {
        let credential = credential
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or(AppError::Unauthorized("no token provided"))?;

        let claims = token::verify(credential, &self.secret)?;

        users::find_user(&self.db_pool, claims.id)
            .await?
            .ok_or(AppError::Unauthorized("user not found"))
    }

    pub fn sign(&self, claims: &token::Claims) -> AppResult<String> {
        token::sign(claims, &self.secret)
    }
}

/// `Authorization: Bearer <token>` value, if any.
pub fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Extractor for routes that need a verified caller.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Identity);

impl<S> FromRequestParts<S> for AuthUser
where
    Verifier: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let verifier = Verifier::from_ref(state);
        let identity = verifier.verify(bearer(&parts.headers)).await?;
        Ok(AuthUser(identity))
    }
}
