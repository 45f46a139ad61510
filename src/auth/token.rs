//! HS256 JWT bearer credentials, as issued by the account service.

use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// The user the token was issued to.
    pub id: Uuid,
    /// Expiry, unix seconds.
    pub exp: u64,
}

impl Claims {
    pub fn expiring_in(id: Uuid, secs: u64) -> Claims {
        Claims { id, exp: now_secs() + secs }
    }
}

pub fn sign(claims: &Claims, secret: &str) -> Result<String, AppError> {
    let token = jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(anyhow::Error::from)?;
    Ok(token)
}

pub fn verify(token: &str, secret: &str) -> Result<Claims, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;

    jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|err| match err.kind() {
            ErrorKind::ExpiredSignature => AppError::Unauthorized("token expired"),
            ErrorKind::InvalidSignature => AppError::Unauthorized("bad token signature"),
            _ => AppError::Unauthorized("malformed token"),
        })
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
