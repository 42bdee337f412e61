//! Store configuration, loaded from the environment.
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `STOREFRONT_STORE` | `memory` | `memory` or `postgres` |
//! | `DATABASE_URL` | (none) | Required when the store is `postgres` |
//! | `DATABASE_MAX_CONNECTIONS` | `5` | Pool size |
//! | `STOREFRONT_RUN_MIGRATIONS` | `true` | Apply embedded migrations on connect |

use std::env;
use std::str::FromStr;

use anyhow::{Context, anyhow, bail};

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    #[default]
    InMemory,
    Postgres,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" | "in-memory" | "in_memory" => Ok(StoreBackend::InMemory),
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            other => Err(anyhow!(
                "invalid STOREFRONT_STORE: {other}. Expected: memory, postgres"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub run_migrations: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::InMemory,
            database_url: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            run_migrations: true,
        }
    }
}

impl StoreConfig {
    /// Load configuration from the process environment (a `.env` file is
    /// honored if present).
    pub fn from_env() -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend = match lookup("STOREFRONT_STORE") {
            Some(value) => value.parse()?,
            None => StoreBackend::default(),
        };

        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());
        if backend == StoreBackend::Postgres && database_url.is_none() {
            bail!("DATABASE_URL must be set when STOREFRONT_STORE=postgres");
        }

        let max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            Some(value) => value
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .with_context(|| format!("invalid DATABASE_MAX_CONNECTIONS: {value}"))?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        let run_migrations = match lookup("STOREFRONT_RUN_MIGRATIONS") {
            Some(value) => parse_bool(&value)
                .with_context(|| format!("invalid STOREFRONT_RUN_MIGRATIONS: {value}"))?,
            None => true,
        };

        Ok(Self {
            backend,
            database_url,
            max_connections,
            run_migrations,
        })
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
