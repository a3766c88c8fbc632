//! Configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::cache::DEFAULT_TTL_SECS;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port (default: 3000).
    pub port: u16,

    /// PostgreSQL connection URL. When unset the in-memory store is used.
    pub database_url: Option<String>,

    /// Maximum database connections in pool (default: 10).
    pub database_max_connections: u32,

    /// Per-transaction statement timeout (default: 10s).
    pub statement_timeout: Duration,

    /// Seed file for the in-memory store.
    pub memory_seed_path: Option<PathBuf>,

    /// Listing and entity definitions (default: ./listings.yml).
    pub listings_path: PathBuf,

    /// Lifetime of cached filter forms (default: 3600s).
    pub form_cache_ttl: Duration,

    /// CORS allowed origins (comma-separated, default: "*").
    pub cors_allowed_origins: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .context("PORT must be a valid u16")?;

        let database_url = env::var("DATABASE_URL").ok().filter(|url| !url.is_empty());

        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .context("DATABASE_MAX_CONNECTIONS must be a valid u32")?;

        let statement_timeout_secs: u64 = env::var("STATEMENT_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .context("STATEMENT_TIMEOUT_SECS must be a valid u64")?;

        let memory_seed_path = env::var("MEMORY_SEED_PATH")
            .ok()
            .filter(|path| !path.is_empty())
            .map(PathBuf::from);

        let listings_path = env::var("LISTINGS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./listings.yml"));

        let form_cache_ttl_secs: u64 = env::var("FORM_CACHE_TTL_SECS")
            .unwrap_or_else(|_| DEFAULT_TTL_SECS.to_string())
            .parse()
            .context("FORM_CACHE_TTL_SECS must be a valid u64")?;

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            port,
            database_url,
            database_max_connections,
            statement_timeout: Duration::from_secs(statement_timeout_secs),
            memory_seed_path,
            listings_path,
            form_cache_ttl: Duration::from_secs(form_cache_ttl_secs),
            cors_allowed_origins,
        })
    }
}
