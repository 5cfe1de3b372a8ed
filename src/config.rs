//! Service configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `JWT_SECRET` - HS256 secret shared with the identity provider
//! - `DATABASE_URL` - `PostgreSQL` connection string (postgres backend only)
//!
//! ## Optional
//! - `HOST` - Bind address (default: 0.0.0.0)
//! - `PORT` - Listen port (default: 8083)
//! - `STORE_BACKEND` - `postgres` or `memory` (default: postgres)
//! - `DATABASE_MAX_CONNECTIONS` - Pool size (default: 10)
//! - `APP_ENV` - `development` exposes error detail on 500s
//! - `LOG_FORMAT` - `json` for JSON log lines, otherwise human-readable
//! - `CATALOG_TIMEOUT_SECS` - Outbound catalog timeout (default: 5)
//! - `CATALOG_CACHE_TTL_SECS` - Listing cache TTL (default: 600)
//! - `CATALOG_RETRY_ATTEMPTS` - Open Library retries after a failed call (default: 2)
//! - `CATALOG_RETRY_BACKOFF_MS` - Base retry delay, doubled per attempt (default: 1000)
//! - `OPEN_LIBRARY_BASE_URL` - default <https://openlibrary.org>
//! - `GOOGLE_BOOKS_BASE_URL` - default <https://www.googleapis.com/books/v1/volumes>

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub open_library_base_url: String,
    pub google_books_base_url: String,
    pub timeout: Duration,
    pub cache_ttl: Duration,
    /// Extra attempts for Open Library calls that fail in transit or with a 5xx.
    pub retry_attempts: u32,
    /// Delay before retry `n` is `retry_backoff * 2^n`.
    pub retry_backoff: Duration,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            open_library_base_url: "https://openlibrary.org".to_string(),
            google_books_base_url: "https://www.googleapis.com/books/v1/volumes".to_string(),
            timeout: Duration::from_secs(5),
            cache_ttl: Duration::from_secs(600),
            retry_attempts: 2,
            retry_backoff: Duration::from_millis(1000),
        }
    }
}

#[derive(Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub store_backend: StoreBackend,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    /// Include error detail in 500 responses.
    pub expose_errors: bool,
    pub json_logs: bool,
    pub catalog: CatalogConfig,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("store_backend", &self.store_backend)
            .field("database_url", &self.database_url.as_ref().map(|_| "[REDACTED]"))
            .field("database_max_connections", &self.database_max_connections)
            .field("jwt_secret", &"[REDACTED]")
            .field("expose_errors", &self.expose_errors)
            .field("json_logs", &self.json_logs)
            .field("catalog", &self.catalog)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process
    /// environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let store_backend = match get("STORE_BACKEND").as_deref() {
            None | Some("postgres") => StoreBackend::Postgres,
            Some("memory") => StoreBackend::Memory,
            Some(other) => return Err(ConfigError::InvalidEnvVar("STORE_BACKEND".into(), other.into())),
        };
        let database_url = get("DATABASE_URL");
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::MissingEnvVar("DATABASE_URL".into()));
        }
        let jwt_secret = get("JWT_SECRET").ok_or_else(|| ConfigError::MissingEnvVar("JWT_SECRET".into()))?;

        let defaults = CatalogConfig::default();
        Ok(Self {
            host: parse_or(&get, "HOST", IpAddr::V4(Ipv4Addr::UNSPECIFIED))?,
            port: parse_or(&get, "PORT", 8083)?,
            store_backend,
            database_url,
            database_max_connections: parse_or(&get, "DATABASE_MAX_CONNECTIONS", 10)?,
            jwt_secret,
            expose_errors: get("APP_ENV").is_some_and(|v| v == "development"),
            json_logs: get("LOG_FORMAT").is_some_and(|v| v.eq_ignore_ascii_case("json")),
            catalog: CatalogConfig {
                open_library_base_url: get("OPEN_LIBRARY_BASE_URL").unwrap_or(defaults.open_library_base_url),
                google_books_base_url: get("GOOGLE_BOOKS_BASE_URL").unwrap_or(defaults.google_books_base_url),
                timeout: Duration::from_secs(parse_or(&get, "CATALOG_TIMEOUT_SECS", 5)?),
                cache_ttl: Duration::from_secs(parse_or(&get, "CATALOG_CACHE_TTL_SECS", 600)?),
                retry_attempts: parse_or(&get, "CATALOG_RETRY_ATTEMPTS", 2)?,
                retry_backoff: Duration::from_millis(parse_or(&get, "CATALOG_RETRY_BACKOFF_MS", 1000)?),
            },
        })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn parse_or<T: FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, ConfigError> {
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidEnvVar(key.to_string(), raw)),
        None => Ok(default),
    }
}
