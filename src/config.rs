//! Process configuration parsed from environment variables.
//!
//! SYSTEM CONTEXT
//! ==============
//! `main` loads `.env` (if present) and then builds one `AppConfig`. Every
//! other module receives the typed values through `AppState`; nothing below
//! the bootstrap reads the environment directly.

use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 168;
pub const DEFAULT_WS_TICKET_TTL_SECS: i64 = 60;
pub const DEFAULT_REALTIME_QUEUE_CAPACITY: usize = 64;
pub const DEFAULT_PASSWORD_HASH_ITERATIONS: u32 = 100_000;
pub const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:3000";

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Postgres URL. `None` runs against the in-memory backend.
    pub database_url: Option<String>,
    pub port: u16,
    pub db_max_connections: u32,
    /// Explicit `COOKIE_SECURE`; otherwise inferred from the public base URL.
    pub cookie_secure: bool,
    pub session_ttl_hours: i64,
    pub ws_ticket_ttl_secs: i64,
    pub realtime_queue_capacity: usize,
    pub password_hash_iterations: u32,
    /// Directory holding the SPA shell (`index.html`) and its assets.
    pub website_dir: PathBuf,
    /// Root for uploaded objects. `None` keeps objects in memory.
    pub storage_dir: Option<PathBuf>,
    /// Absolute origin used to build public object and redirect URLs.
    pub public_base_url: String,
}

impl AppConfig {
    /// Build typed config from environment variables.
    ///
    /// Optional:
    /// - `DATABASE_URL`: Postgres connection string (in-memory store when absent)
    /// - `PORT`: default 3000
    /// - `DB_MAX_CONNECTIONS`: default 5
    /// - `COOKIE_SECURE`: boolean; inferred from `PUBLIC_BASE_URL` when absent
    /// - `SESSION_TTL_HOURS`: default 168
    /// - `WS_TICKET_TTL_SECS`: default 60
    /// - `REALTIME_QUEUE_CAPACITY`: default 64
    /// - `PASSWORD_HASH_ITERATIONS`: default 100000
    /// - `WEBSITE_DIR`: default `./website`
    /// - `STORAGE_DIR`: local object storage root (in-memory when absent)
    /// - `PUBLIC_BASE_URL`: default `http://localhost:3000`
    #[must_use]
    pub fn from_env() -> Self {
        let public_base_url = std::env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_PUBLIC_BASE_URL.to_owned())
            .trim_end_matches('/')
            .to_owned();
        let cookie_secure = env_bool("COOKIE_SECURE").unwrap_or_else(|| public_base_url.starts_with("https://"));

        Self {
            database_url: std::env::var("DATABASE_URL")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            port: env_parse("PORT", DEFAULT_PORT),
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS),
            cookie_secure,
            session_ttl_hours: env_parse("SESSION_TTL_HOURS", DEFAULT_SESSION_TTL_HOURS),
            ws_ticket_ttl_secs: env_parse("WS_TICKET_TTL_SECS", DEFAULT_WS_TICKET_TTL_SECS),
            realtime_queue_capacity: env_parse("REALTIME_QUEUE_CAPACITY", DEFAULT_REALTIME_QUEUE_CAPACITY).max(1),
            password_hash_iterations: env_parse("PASSWORD_HASH_ITERATIONS", DEFAULT_PASSWORD_HASH_ITERATIONS).max(1),
            website_dir: std::env::var("WEBSITE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("website")),
            storage_dir: std::env::var("STORAGE_DIR")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            public_base_url,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            port: DEFAULT_PORT,
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            cookie_secure: false,
            session_ttl_hours: DEFAULT_SESSION_TTL_HOURS,
            ws_ticket_ttl_secs: DEFAULT_WS_TICKET_TTL_SECS,
            realtime_queue_capacity: DEFAULT_REALTIME_QUEUE_CAPACITY,
            password_hash_iterations: DEFAULT_PASSWORD_HASH_ITERATIONS,
            website_dir: PathBuf::from("website"),
            storage_dir: None,
            public_base_url: DEFAULT_PUBLIC_BASE_URL.to_owned(),
        }
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

pub(crate) fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .and_then(|raw| match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
