//! Where tracker snapshots live between runs: a JSON file or Postgres.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{debug, info};

use crate::config::Config;
use crate::db;
use crate::models::TrackerSnapshot;

pub enum Store {
    File(PathBuf),
    Postgres(PgPool),
}

impl Store {
    pub async fn connect(config: &Config) -> anyhow::Result<Self> {
        if let Some(path) = &config.snapshot_path {
            debug!(path = %path.display(), "using snapshot file store");
            return Ok(Store::File(path.clone()));
        }

        let Some(database_url) = &config.database_url else {
            bail!("set --snapshot/AGENCY_SNAPSHOT or --database-url/DATABASE_URL to choose a store");
        };

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(database_url)
            .await
            .context("failed to connect to Postgres")?;
        debug!("using Postgres store");
        Ok(Store::Postgres(pool))
    }

    pub fn pool(&self) -> Option<&PgPool> {
        match self {
            Store::Postgres(pool) => Some(pool),
            Store::File(_) => None,
        }
    }

    pub async fn load(&self) -> anyhow::Result<TrackerSnapshot> {
        match self {
            Store::File(path) => read_snapshot_file(path),
            Store::Postgres(pool) => db::load_snapshot(pool).await,
        }
    }

    pub async fn save(&self, snapshot: &TrackerSnapshot) -> anyhow::Result<()> {
        match self {
            Store::File(path) => write_snapshot_file(path, snapshot),
            Store::Postgres(pool) => db::save_snapshot(pool, snapshot).await,
        }
    }
}

/// A missing file is an empty tracker, not an error.
pub fn read_snapshot_file(path: &Path) -> anyhow::Result<TrackerSnapshot> {
    if !path.exists() {
        debug!(path = %path.display(), "snapshot file absent, starting empty");
        return Ok(TrackerSnapshot::default());
    }

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("{} is not a tracker snapshot", path.display()))
}

/// Writes next to the target and renames, so readers never see half a file.
pub fn write_snapshot_file(path: &Path, snapshot: &TrackerSnapshot) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(snapshot)?;
    let staging = path.with_extension("json.tmp");
    std::fs::write(&staging, json)
        .with_context(|| format!("failed to write {}", staging.display()))?;
    std::fs::rename(&staging, path)
        .with_context(|| format!("failed to replace {}", path.display()))?;
    info!(
        path = %path.display(),
        activities = snapshot.activities.len(),
        "saved snapshot file"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::PerformanceTracker;
    use uuid::Uuid;

    fn scratch_path() -> PathBuf {
        std::env::temp_dir().join(format!("agency-tracker-{}.json", Uuid::new_v4()))
    }

    #[test]
    fn missing_file_loads_empty() {
        let snapshot = read_snapshot_file(&scratch_path()).unwrap();
        assert_eq!(snapshot, TrackerSnapshot::default());
    }

    #[test]
    fn file_round_trip_keeps_queries() {
        let tracker = PerformanceTracker::new();
        tracker.record_login("m1").unwrap();
        tracker.record_quiz_completion("m1", 66.0, "Castings 101").unwrap();
        tracker.record_forum_post("m2", "Portfolio feedback").unwrap();

        let path = scratch_path();
        write_snapshot_file(&path, &tracker.export_data()).unwrap();
        let restored = PerformanceTracker::from_snapshot(read_snapshot_file(&path).unwrap());
        std::fs::remove_file(&path).unwrap();

        assert_eq!(restored.all_activities(), tracker.all_activities());
        assert_eq!(restored.all_performances(), tracker.all_performances());
    }

    #[test]
    fn garbage_file_is_an_error() {
        let path = scratch_path();
        std::fs::write(&path, "[1, 2, 3]").unwrap();
        let result = read_snapshot_file(&path);
        std::fs::remove_file(&path).unwrap();
        assert!(result.is_err());
    }
}
