use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{TrackerError, TrackerResult};
use crate::models::{
    ActivityKind, ActivityRecord, ActivityType, PerformanceRecord, TrackerSnapshot, TrackingEntry,
};
use crate::scoring;

#[derive(Debug, Default)]
pub(crate) struct TrackerState {
    pub(crate) activities: Vec<ActivityRecord>,
    pub(crate) performances: BTreeMap<String, PerformanceRecord>,
    pub(crate) tracking: BTreeMap<String, TrackingEntry>,
}

/// In-memory activity log plus one rolling performance record per model.
///
/// All state sits behind a single lock: recording and marking activities
/// read take it exclusively, queries share it. Construct one per process
/// (or per test) and hand it out by reference or `Arc`.
#[derive(Debug, Default)]
pub struct PerformanceTracker {
    pub(crate) state: RwLock<TrackerState>,
}

impl PerformanceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: TrackerSnapshot) -> Self {
        let tracker = Self::new();
        tracker.import_data(snapshot);
        tracker
    }

    /// Appends an activity for `model_id` and folds it into that model's
    /// performance record.
    pub fn record_activity(
        &self,
        model_id: &str,
        kind: ActivityKind,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> TrackerResult<ActivityRecord> {
        if let Err(err) = validate(model_id, &kind) {
            warn!(model_id, activity_type = %kind.activity_type(), "rejected activity: {err}");
            return Err(err);
        }

        let mut state = self.state.write();
        // Read the clock under the lock so commit order matches timestamp order.
        let now = Utc::now();
        let record = ActivityRecord {
            id: generate_activity_id(now),
            model_id: model_id.to_string(),
            kind,
            title: title.into(),
            description: description.into(),
            timestamp: now,
            is_read: false,
        };

        state.activities.push(record.clone());
        track(&mut state.tracking, &record);
        let performance = update(&mut state.performances, model_id, &record.kind, now);
        debug!(
            model_id,
            activity_id = %record.id,
            activity_type = %record.activity_type(),
            overall_score = performance.overall_score,
            "recorded activity"
        );

        Ok(record)
    }

    /// Untyped entry point for feeds that carry the activity type as text.
    pub fn record_raw(
        &self,
        model_id: &str,
        activity_type: &str,
        title: impl Into<String>,
        description: impl Into<String>,
        metadata: Option<&Value>,
    ) -> TrackerResult<ActivityRecord> {
        let activity_type: ActivityType = activity_type.parse().map_err(|err| {
            warn!(model_id, "rejected activity: {err}");
            err
        })?;
        let kind = ActivityKind::from_parts(activity_type, metadata);
        self.record_activity(model_id, kind, title, description)
    }

    pub fn export_data(&self) -> TrackerSnapshot {
        let state = self.state.read();
        TrackerSnapshot {
            activities: state.activities.clone(),
            performances: state.performances.values().cloned().collect(),
            tracking_data: state.tracking.values().cloned().collect(),
        }
    }

    /// Replaces all state with the snapshot contents. Overall scores are
    /// recomputed so they always agree with the counters they derive from.
    pub fn import_data(&self, snapshot: TrackerSnapshot) {
        let mut next = TrackerState {
            activities: snapshot.activities,
            ..TrackerState::default()
        };
        for mut performance in snapshot.performances {
            performance.overall_score = scoring::overall_score(&performance);
            next.performances.insert(performance.model_id.clone(), performance);
        }
        for entry in snapshot.tracking_data {
            next.tracking.insert(entry.model_id.clone(), entry);
        }

        info!(
            activities = next.activities.len(),
            performances = next.performances.len(),
            tracked_models = next.tracking.len(),
            "imported tracker snapshot"
        );
        *self.state.write() = next;
    }

    pub fn export_json(&self) -> TrackerResult<String> {
        Ok(serde_json::to_string_pretty(&self.export_data())?)
    }

    /// Parses before touching state, so malformed input changes nothing.
    pub fn import_json(&self, json: &str) -> TrackerResult<()> {
        let snapshot: TrackerSnapshot = serde_json::from_str(json)?;
        self.import_data(snapshot);
        Ok(())
    }
}

const MAX_QUIZ_SCORE: f64 = 100.0;

fn validate(model_id: &str, kind: &ActivityKind) -> TrackerResult<()> {
    if model_id.trim().is_empty() {
        return Err(TrackerError::Validation("model id must not be empty".into()));
    }

    match kind {
        ActivityKind::QuizCompleted {
            score: Some(score), ..
        } if !(0.0..=MAX_QUIZ_SCORE).contains(score) => Err(TrackerError::Validation(format!(
            "quiz score must be between 0 and {MAX_QUIZ_SCORE}, got {score}"
        ))),
        ActivityKind::PaymentSubmitted {
            amount: Some(amount),
        } if !amount.is_finite() => Err(TrackerError::Validation(format!(
            "payment amount must be a finite number, got {amount}"
        ))),
        _ => Ok(()),
    }
}

/// Applies one activity to the model's performance record, creating the
/// record on first sight, then refreshes the derived overall score.
pub(crate) fn update<'a>(
    performances: &'a mut BTreeMap<String, PerformanceRecord>,
    model_id: &str,
    kind: &ActivityKind,
    now: DateTime<Utc>,
) -> &'a PerformanceRecord {
    let performance = performances
        .entry(model_id.to_string())
        .or_insert_with(|| PerformanceRecord::new(model_id, now));

    match kind {
        ActivityKind::Login => {
            performance.total_login_days = performance.total_login_days.saturating_add(1);
            performance.last_login_date = now;
        }
        ActivityKind::QuizCompleted {
            score: Some(score), ..
        } => {
            performance.total_quiz_attempts = performance.total_quiz_attempts.saturating_add(1);
            performance.average_quiz_score = scoring::running_mean(
                performance.average_quiz_score,
                performance.total_quiz_attempts,
                *score,
            );
        }
        ActivityKind::BookingRequested { .. } => {
            performance.total_bookings = performance.total_bookings.saturating_add(1);
        }
        ActivityKind::CastingApplied { .. } => {
            performance.total_castings = performance.total_castings.saturating_add(1);
        }
        ActivityKind::ForumPost { .. } => {
            performance.forum_posts = performance.forum_posts.saturating_add(1);
        }
        // Quiz without a score, payments and profile edits leave counters alone.
        _ => {}
    }

    performance.overall_score = scoring::overall_score(performance);
    performance.last_updated = now;
    performance
}

fn track(tracking: &mut BTreeMap<String, TrackingEntry>, record: &ActivityRecord) {
    let entry = tracking
        .entry(record.model_id.clone())
        .or_insert_with(|| TrackingEntry::new(&record.model_id, record.timestamp));
    entry.last_activity_at = record.timestamp;
    *entry
        .activity_counts
        .entry(record.activity_type())
        .or_insert(0) += 1;
}

fn generate_activity_id(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", now.timestamp_millis(), &suffix[..12])
}
