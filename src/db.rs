use std::collections::BTreeMap;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use tracing::{info, warn};

use crate::models::{
    ActivityKind, ActivityRecord, ActivityType, PerformanceRecord, TrackerSnapshot, TrackingEntry,
};
use crate::tracker::PerformanceTracker;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[derive(Debug, sqlx::FromRow)]
pub struct ActivityRow {
    pub id: String,
    pub model_id: String,
    pub activity_type: String,
    pub title: String,
    pub description: String,
    pub occurred_at: DateTime<Utc>,
    pub metadata: Option<Value>,
    pub is_read: bool,
}

#[derive(Debug, sqlx::FromRow)]
pub struct PerformanceRow {
    pub model_id: String,
    pub total_quiz_attempts: i64,
    pub average_quiz_score: f64,
    pub total_login_days: i64,
    pub last_login_date: DateTime<Utc>,
    pub total_bookings: i64,
    pub total_castings: i64,
    pub forum_posts: i64,
    pub payment_compliance: f64,
    pub overall_score: f64,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct TrackingRow {
    pub model_id: String,
    pub first_activity_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub activity_counts: Value,
}

impl TryFrom<ActivityRow> for ActivityRecord {
    type Error = anyhow::Error;

    fn try_from(row: ActivityRow) -> anyhow::Result<Self> {
        let activity_type: ActivityType = row
            .activity_type
            .parse()
            .with_context(|| format!("activity {} has an unreadable type", row.id))?;

        Ok(Self {
            kind: ActivityKind::from_parts(activity_type, row.metadata.as_ref()),
            id: row.id,
            model_id: row.model_id,
            title: row.title,
            description: row.description,
            timestamp: row.occurred_at,
            is_read: row.is_read,
        })
    }
}

impl TryFrom<PerformanceRow> for PerformanceRecord {
    type Error = anyhow::Error;

    fn try_from(row: PerformanceRow) -> anyhow::Result<Self> {
        let counter = |value: i64, column: &str| {
            u32::try_from(value)
                .with_context(|| format!("{column} out of range for model {}", row.model_id))
        };

        Ok(Self {
            total_quiz_attempts: counter(row.total_quiz_attempts, "total_quiz_attempts")?,
            total_login_days: counter(row.total_login_days, "total_login_days")?,
            total_bookings: counter(row.total_bookings, "total_bookings")?,
            total_castings: counter(row.total_castings, "total_castings")?,
            forum_posts: counter(row.forum_posts, "forum_posts")?,
            average_quiz_score: row.average_quiz_score,
            last_login_date: row.last_login_date,
            payment_compliance: row.payment_compliance,
            overall_score: row.overall_score,
            last_updated: row.last_updated,
            model_id: row.model_id,
        })
    }
}

impl TryFrom<TrackingRow> for TrackingEntry {
    type Error = anyhow::Error;

    fn try_from(row: TrackingRow) -> anyhow::Result<Self> {
        let activity_counts: BTreeMap<ActivityType, u32> =
            serde_json::from_value(row.activity_counts)
                .with_context(|| format!("tracking counts for model {} are malformed", row.model_id))?;

        Ok(Self {
            model_id: row.model_id,
            first_activity_at: row.first_activity_at,
            last_activity_at: row.last_activity_at,
            activity_counts,
        })
    }
}

pub async fn load_snapshot(pool: &PgPool) -> anyhow::Result<TrackerSnapshot> {
    let activities: Vec<ActivityRow> = sqlx::query_as(
        r#"
        SELECT id, model_id, activity_type, title, description, occurred_at, metadata, is_read
        FROM agency_tracking.activities
        ORDER BY position
        "#,
    )
    .fetch_all(pool)
    .await?;

    let performances: Vec<PerformanceRow> = sqlx::query_as(
        r#"
        SELECT model_id, total_quiz_attempts, average_quiz_score, total_login_days,
               last_login_date, total_bookings, total_castings, forum_posts,
               payment_compliance, overall_score, last_updated
        FROM agency_tracking.performances
        ORDER BY model_id
        "#,
    )
    .fetch_all(pool)
    .await?;

    let tracking: Vec<TrackingRow> = sqlx::query_as(
        r#"
        SELECT model_id, first_activity_at, last_activity_at, activity_counts
        FROM agency_tracking.tracking
        ORDER BY model_id
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(TrackerSnapshot {
        activities: activities
            .into_iter()
            .map(ActivityRecord::try_from)
            .collect::<anyhow::Result<_>>()?,
        performances: performances
            .into_iter()
            .map(PerformanceRecord::try_from)
            .collect::<anyhow::Result<_>>()?,
        tracking_data: tracking
            .into_iter()
            .map(TrackingEntry::try_from)
            .collect::<anyhow::Result<_>>()?,
    })
}

/// Replaces everything stored with the snapshot, in one transaction.
pub async fn save_snapshot(pool: &PgPool, snapshot: &TrackerSnapshot) -> anyhow::Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "TRUNCATE agency_tracking.activities, agency_tracking.performances, agency_tracking.tracking",
    )
    .execute(&mut *tx)
    .await?;

    for (position, activity) in snapshot.activities.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO agency_tracking.activities
            (id, model_id, activity_type, title, description, occurred_at, metadata, is_read, position)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(&activity.id)
        .bind(&activity.model_id)
        .bind(activity.activity_type().as_str())
        .bind(&activity.title)
        .bind(&activity.description)
        .bind(activity.timestamp)
        .bind(activity.kind.metadata())
        .bind(activity.is_read)
        .bind(i64::try_from(position)?)
        .execute(&mut *tx)
        .await?;
    }

    for performance in &snapshot.performances {
        sqlx::query(
            r#"
            INSERT INTO agency_tracking.performances
            (model_id, total_quiz_attempts, average_quiz_score, total_login_days,
             last_login_date, total_bookings, total_castings, forum_posts,
             payment_compliance, overall_score, last_updated)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(&performance.model_id)
        .bind(i64::from(performance.total_quiz_attempts))
        .bind(performance.average_quiz_score)
        .bind(i64::from(performance.total_login_days))
        .bind(performance.last_login_date)
        .bind(i64::from(performance.total_bookings))
        .bind(i64::from(performance.total_castings))
        .bind(i64::from(performance.forum_posts))
        .bind(performance.payment_compliance)
        .bind(performance.overall_score)
        .bind(performance.last_updated)
        .execute(&mut *tx)
        .await?;
    }

    for entry in &snapshot.tracking_data {
        sqlx::query(
            r#"
            INSERT INTO agency_tracking.tracking
            (model_id, first_activity_at, last_activity_at, activity_counts)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&entry.model_id)
        .bind(entry.first_activity_at)
        .bind(entry.last_activity_at)
        .bind(serde_json::to_value(&entry.activity_counts)?)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    info!(
        activities = snapshot.activities.len(),
        performances = snapshot.performances.len(),
        "saved snapshot to Postgres"
    );
    Ok(())
}

#[derive(Debug, Default, PartialEq)]
pub struct ImportSummary {
    pub inserted: usize,
    pub skipped: usize,
}

/// Replays a CSV activity feed through the tracker. Rows the tracker
/// rejects are skipped and counted; unreadable files are errors.
pub fn import_csv(
    tracker: &PerformanceTracker,
    csv_path: &std::path::Path,
) -> anyhow::Result<ImportSummary> {
    let reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    import_csv_reader(tracker, reader)
}

pub fn import_csv_reader<R: std::io::Read>(
    tracker: &PerformanceTracker,
    mut reader: csv::Reader<R>,
) -> anyhow::Result<ImportSummary> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        model_id: String,
        activity_type: String,
        title: String,
        description: String,
        metadata: Option<String>,
    }

    let mut summary = ImportSummary::default();

    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        let line = index + 2;
        let row = match result {
            Ok(row) => row,
            Err(err) => {
                warn!(line, "skipping unreadable row: {err}");
                summary.skipped += 1;
                continue;
            }
        };

        let metadata = match row.metadata.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => match serde_json::from_str::<Value>(raw) {
                Ok(value) => Some(value),
                Err(err) => {
                    warn!(line, "ignoring unreadable metadata: {err}");
                    None
                }
            },
        };

        match tracker.record_raw(
            &row.model_id,
            &row.activity_type,
            row.title,
            row.description,
            metadata.as_ref(),
        ) {
            Ok(_) => summary.inserted += 1,
            Err(err) => {
                warn!(line, "skipping row: {err}");
                summary.skipped += 1;
            }
        }
    }

    info!(
        inserted = summary.inserted,
        skipped = summary.skipped,
        "imported activity csv"
    );
    Ok(summary)
}

pub fn seed(tracker: &PerformanceTracker) -> anyhow::Result<usize> {
    let mut recorded = 0usize;

    for model_id in ["ava-laurent", "noah-reyes", "mila-okafor"] {
        tracker.record_login(model_id)?;
        recorded += 1;
    }

    tracker.record_quiz_completion("ava-laurent", 92.0, "Runway fundamentals")?;
    tracker.record_quiz_completion("ava-laurent", 84.0, "Posing for editorials")?;
    tracker.record_booking_request("ava-laurent", "Spring lookbook, two days")?;
    tracker.record_casting_application("ava-laurent", "Autumn fashion day")?;
    tracker.record_quiz_completion("noah-reyes", 71.0, "Runway fundamentals")?;
    tracker.record_forum_post("noah-reyes", "Travel kit checklist")?;
    tracker.record_payment_submission("noah-reyes", 150.0)?;
    tracker.record_casting_application("mila-okafor", "Autumn fashion day")?;
    tracker.record_profile_update("mila-okafor")?;
    recorded += 9;

    Ok(recorded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn activity_row_converts_with_metadata() {
        let row = ActivityRow {
            id: "1700000000000-abc".to_string(),
            model_id: "m1".to_string(),
            activity_type: "quiz_completed".to_string(),
            title: "Quiz completed".to_string(),
            description: "Scored 88%".to_string(),
            occurred_at: Utc::now(),
            metadata: Some(json!({ "quizScore": 88, "quizChapter": "Walk" })),
            is_read: true,
        };

        let record = ActivityRecord::try_from(row).unwrap();
        assert_eq!(
            record.kind,
            ActivityKind::QuizCompleted {
                score: Some(88.0),
                chapter: Some("Walk".to_string()),
            }
        );
        assert!(record.is_read);
    }

    #[test]
    fn activity_row_with_unknown_type_fails() {
        let row = ActivityRow {
            id: "x".to_string(),
            model_id: "m1".to_string(),
            activity_type: "teleported".to_string(),
            title: String::new(),
            description: String::new(),
            occurred_at: Utc::now(),
            metadata: None,
            is_read: false,
        };
        assert!(ActivityRecord::try_from(row).is_err());
    }

    #[test]
    fn negative_counters_are_rejected() {
        let now = Utc::now();
        let row = PerformanceRow {
            model_id: "m1".to_string(),
            total_quiz_attempts: -1,
            average_quiz_score: 0.0,
            total_login_days: 0,
            last_login_date: now,
            total_bookings: 0,
            total_castings: 0,
            forum_posts: 0,
            payment_compliance: 0.0,
            overall_score: 0.0,
            last_updated: now,
        };
        let err = PerformanceRecord::try_from(row).unwrap_err();
        assert!(err.to_string().contains("total_quiz_attempts"));
    }

    #[test]
    fn tracking_row_reads_counts() {
        let now = Utc::now();
        let row = TrackingRow {
            model_id: "m1".to_string(),
            first_activity_at: now,
            last_activity_at: now,
            activity_counts: json!({ "login": 4, "forum_post": 1 }),
        };
        let entry = TrackingEntry::try_from(row).unwrap();
        assert_eq!(entry.count(ActivityType::Login), 4);
        assert_eq!(entry.count(ActivityType::ForumPost), 1);
    }

    #[test]
    fn csv_import_skips_invalid_rows() {
        let data = "\
model_id,activity_type,title,description,metadata
m1,login,Logged in,portal,
m1,quiz_completed,Quiz,chapter 1,\"{\"\"quizScore\"\": 80}\"
m2,photo_shoot,Shoot,studio,
,login,Logged in,portal,
m2,booking_requested,Booking,catalogue,not json
";
        let tracker = PerformanceTracker::new();
        let reader = csv::Reader::from_reader(data.as_bytes());
        let summary = import_csv_reader(&tracker, reader).unwrap();

        assert_eq!(summary, ImportSummary { inserted: 3, skipped: 2 });
        assert_eq!(tracker.model_performance("m1").unwrap().average_quiz_score, 80.0);
        assert_eq!(tracker.model_performance("m2").unwrap().total_bookings, 1);
    }

    #[test]
    fn csv_import_skips_rows_with_wrong_field_count() {
        let data = "\
model_id,activity_type,title,description,metadata
m1,login,Logged in,portal,
m1,login,Logged in
m1,forum_post,Forum post,hello,,extra
m1,forum_post,Forum post,hello,
";
        let tracker = PerformanceTracker::new();
        let reader = csv::Reader::from_reader(data.as_bytes());
        let summary = import_csv_reader(&tracker, reader).unwrap();

        assert_eq!(summary, ImportSummary { inserted: 2, skipped: 2 });
        let performance = tracker.model_performance("m1").unwrap();
        assert_eq!(performance.total_login_days, 1);
        assert_eq!(performance.forum_posts, 1);
    }

    #[test]
    fn seed_populates_three_models() {
        let tracker = PerformanceTracker::new();
        let recorded = seed(&tracker).unwrap();
        assert_eq!(recorded, 12);
        assert_eq!(tracker.global_stats().total_models, 3);
        assert_eq!(tracker.all_activities().len(), 12);
    }
}
