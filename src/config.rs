//! Runtime configuration, read from the environment and overridden by
//! command-line flags.

use std::path::PathBuf;

use anyhow::Context;

pub const DEFAULT_LOG_FILTER: &str = "agency_performance_tracker=info";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Postgres connection string (`DATABASE_URL`).
    pub database_url: Option<String>,
    /// JSON snapshot file (`AGENCY_SNAPSHOT`). Takes precedence over Postgres.
    pub snapshot_path: Option<PathBuf>,
    /// `tracing` filter directive (`AGENCY_LOG`).
    pub log_filter: String,
    /// Pool size for Postgres (`AGENCY_DB_MAX_CONNECTIONS`, default 5).
    pub max_connections: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            snapshot_path: None,
            log_filter: DEFAULT_LOG_FILTER.into(),
            max_connections: 5,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let max_connections = match non_empty("AGENCY_DB_MAX_CONNECTIONS") {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("AGENCY_DB_MAX_CONNECTIONS must be a number, got `{raw}`"))?,
            None => defaults.max_connections,
        };

        Ok(Self {
            database_url: non_empty("DATABASE_URL"),
            snapshot_path: non_empty("AGENCY_SNAPSHOT").map(PathBuf::from),
            log_filter: non_empty("AGENCY_LOG").unwrap_or(defaults.log_filter),
            max_connections,
        })
    }

    pub fn with_overrides(mut self, snapshot: Option<PathBuf>, database_url: Option<String>) -> Self {
        if snapshot.is_some() {
            self.snapshot_path = snapshot;
        }
        if database_url.is_some() {
            self.database_url = database_url;
        }
        self
    }
}
