//! Server configuration loaded from environment variables.
//!
//! Every setting has a default so a bare `barter` starts a local dev server.
//! A `.env` file in the working directory is honoured.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// JWT secrets that must never reach production.
pub const PLACEHOLDER_SECRETS: &[&str] = &["dev-secret-change-me", "change-me-to-a-random-string"];

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address the HTTP server binds to.
    pub listen_addr: SocketAddr,

    /// SQLite database file.
    pub db_path: PathBuf,

    /// HS256 key for bearer tokens.
    pub jwt_secret: String,

    /// Lifetime of issued tokens.
    pub token_ttl_days: i64,
}

impl ServerConfig {
    /// Load from the process environment.
    ///
    /// # Errors
    ///
    /// Fails if `BARTER_HOST`/`BARTER_PORT` do not form a valid socket address.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("BARTER_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = lookup("BARTER_PORT").unwrap_or_else(|| "3000".into());
        let listen_addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", host, port))?;

        let db_path = lookup("BARTER_DB_PATH").unwrap_or_else(|| "barter.db".into()).into();
        let jwt_secret = lookup("BARTER_JWT_SECRET")
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| PLACEHOLDER_SECRETS[0].into());
        let token_ttl_days = lookup("BARTER_TOKEN_TTL_DAYS")
            .and_then(|v| v.parse().ok())
            .filter(|days: &i64| *days > 0)
            .unwrap_or(30);

        Ok(Self {
            listen_addr,
            db_path,
            jwt_secret,
            token_ttl_days,
        })
    }

    pub fn uses_placeholder_secret(&self) -> bool {
        PLACEHOLDER_SECRETS.contains(&self.jwt_secret.as_str())
    }
}
