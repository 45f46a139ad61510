use std::{net::SocketAddr, str::FromStr};

use anyhow::{anyhow, Context};

/// Process configuration, read from the environment (and `.env` if present).
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub database_url: String,
    pub db_max_connections: u32,
    pub token_secret: String,
    /// Allowed CORS origin. `None` means any origin.
    pub client_url: Option<String>,
    pub relay: RelayConfig,
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Outbound events buffered per connection before new ones are dropped.
    pub session_queue_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            session_queue_capacity: 256,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Config> {
        // a missing .env is fine, the real environment still applies
        let _ = dotenv::dotenv();

        // the account service calls it JWT_SECRET
        let token_secret = optional("AUTH_TOKEN_SECRET")
            .or_else(|| optional("JWT_SECRET"))
            .ok_or_else(|| anyhow!("AUTH_TOKEN_SECRET (or JWT_SECRET) must be set"))?;
        if token_secret.len() < 16 {
            return Err(anyhow!("token secret must be at least 16 bytes"));
        }

        Ok(Config {
            bind_addr: parsed("BIND_ADDR", "0.0.0.0:8080")?,
            database_url: required("DATABASE_URL")?,
            db_max_connections: parsed("DB_MAX_CONNECTIONS", "16")?,
            token_secret,
            client_url: optional("CLIENT_URL"),
            relay: RelayConfig {
                session_queue_capacity: parsed("SESSION_QUEUE_CAPACITY", "256")?,
            },
        })
    }
}

fn optional(key: &str) -> Option<String> {
    dotenv::var(key)
        .ok()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn required(key: &str) -> anyhow::Result<String> {
    optional(key).ok_or_else(|| anyhow!("{key} must be set"))
}

fn parsed<T>(key: &str, default: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw = optional(key).unwrap_or_else(|| default.to_owned());
    raw.parse()
        .with_context(|| format!("{key}: can't parse {raw:?}"))
}
