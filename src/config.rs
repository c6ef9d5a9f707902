use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Runtime settings, read once at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub host: String,
    pub port: u16,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub run_migrations: bool,
    pub log_dir: PathBuf,
    pub request_timeout_secs: u64,
    pub person_cache_ttl_secs: u64,
}

impl Config {
    /// Load environment variables (and `.env`, if present) and apply defaults.
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parse_or("PORT", 3000)?,
            db_max_connections: parse_or("DB_MAX_CONNECTIONS", 10)?,
            db_min_connections: parse_or("DB_MIN_CONNECTIONS", 2)?,
            run_migrations: parse_or("RUN_MIGRATIONS", true)?,
            log_dir: PathBuf::from(env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string())),
            request_timeout_secs: parse_or("REQUEST_TIMEOUT_SECS", 30)?,
            person_cache_ttl_secs: parse_or("PERSON_CACHE_TTL_SECS", 600)?,
        })
    }

    /// Socket address string the server binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value: {raw:?}")),
        Err(_) => Ok(default),
    }
}
