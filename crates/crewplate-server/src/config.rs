use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, bail};

const ENV_PREFIX: &str = "CREWPLATE_";

/// Secrets that ship in examples and must never reach production.
const PLACEHOLDER_SECRETS: &[&str] = &["", "changeme", "change-me", "dev-secret-change-me", "secret"];

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub blob_dir: PathBuf,
    pub public_url: String,
    pub db_busy_timeout: Duration,
    pub request_timeout: Duration,
    pub max_upload_bytes: usize,
}

impl Config {
    /// Read `CREWPLATE_*` variables from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));
        let or = |name: &str, default: &str| var(name).unwrap_or_else(|| default.to_string());

        let jwt_secret = var("JWT_SECRET").unwrap_or_default();
        if PLACEHOLDER_SECRETS.contains(&jwt_secret.trim()) {
            bail!("{ENV_PREFIX}JWT_SECRET must be set to a real secret");
        }

        Ok(Self {
            host: or("HOST", "0.0.0.0"),
            port: parse(&var, "PORT", 3000)?,
            db_path: PathBuf::from(or("DB_PATH", "crewplate.db")),
            jwt_secret,
            blob_dir: PathBuf::from(or("BLOB_DIR", "./blobs")),
            public_url: or("PUBLIC_URL", "http://localhost:3000"),
            db_busy_timeout: Duration::from_millis(parse(&var, "DB_BUSY_TIMEOUT_MS", 5000)?),
            request_timeout: Duration::from_millis(parse(&var, "REQUEST_TIMEOUT_MS", 10_000)?),
            max_upload_bytes: parse(&var, "MAX_UPLOAD_BYTES", 20 * 1024 * 1024)?,
        })
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}

fn parse<T>(var: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{ENV_PREFIX}{name}={raw:?} is not valid")),
        None => Ok(default),
    }
}
