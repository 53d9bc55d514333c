use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

use natter_api::state::OrphanPolicy;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

pub struct Config {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub orphan_policy: OrphanPolicy,
}

impl Config {
    /// Read configuration from `NATTER_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let jwt_secret = std::env::var("NATTER_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("NATTER_JWT_SECRET is unset or still a placeholder");
        }

        let host = std::env::var("NATTER_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = std::env::var("NATTER_PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .context("NATTER_PORT must be a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", host, port))?;

        let db_path: PathBuf = std::env::var("NATTER_DB_PATH")
            .unwrap_or_else(|_| "natter.db".into())
            .into();

        let token_ttl_hours: i64 = std::env::var("NATTER_TOKEN_TTL_HOURS")
            .unwrap_or_else(|_| "720".into())
            .parse()
            .context("NATTER_TOKEN_TTL_HOURS must be an integer")?;
        if token_ttl_hours <= 0 {
            bail!("NATTER_TOKEN_TTL_HOURS must be positive");
        }

        let orphan_policy = std::env::var("NATTER_ORPHAN_MESSAGES")
            .unwrap_or_else(|_| "skip".into())
            .parse::<OrphanPolicy>()
            .map_err(anyhow::Error::msg)?;

        Ok(Self {
            addr,
            db_path,
            jwt_secret,
            token_ttl_hours,
            orphan_policy,
        })
    }
}
