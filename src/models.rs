use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::TrackerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    Login,
    QuizCompleted,
    PaymentSubmitted,
    BookingRequested,
    CastingApplied,
    ForumPost,
    ProfileUpdated,
}

impl ActivityType {
    pub const ALL: [ActivityType; 7] = [
        ActivityType::Login,
        ActivityType::QuizCompleted,
        ActivityType::PaymentSubmitted,
        ActivityType::BookingRequested,
        ActivityType::CastingApplied,
        ActivityType::ForumPost,
        ActivityType::ProfileUpdated,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::Login => "login",
            ActivityType::QuizCompleted => "quiz_completed",
            ActivityType::PaymentSubmitted => "payment_submitted",
            ActivityType::BookingRequested => "booking_requested",
            ActivityType::CastingApplied => "casting_applied",
            ActivityType::ForumPost => "forum_post",
            ActivityType::ProfileUpdated => "profile_updated",
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityType {
    type Err = TrackerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        ActivityType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value.trim())
            .ok_or_else(|| TrackerError::Validation(format!("unknown activity type `{value}`")))
    }
}

/// What happened, together with the metadata that belongs to that kind of
/// event. Every field is optional because callers upstream may omit it.
#[derive(Debug, Clone, PartialEq)]
pub enum ActivityKind {
    Login,
    QuizCompleted {
        score: Option<f64>,
        chapter: Option<String>,
    },
    PaymentSubmitted {
        amount: Option<f64>,
    },
    BookingRequested {
        details: Option<String>,
    },
    CastingApplied {
        event: Option<String>,
    },
    ForumPost {
        thread: Option<String>,
    },
    ProfileUpdated,
}

impl ActivityKind {
    pub fn activity_type(&self) -> ActivityType {
        match self {
            ActivityKind::Login => ActivityType::Login,
            ActivityKind::QuizCompleted { .. } => ActivityType::QuizCompleted,
            ActivityKind::PaymentSubmitted { .. } => ActivityType::PaymentSubmitted,
            ActivityKind::BookingRequested { .. } => ActivityType::BookingRequested,
            ActivityKind::CastingApplied { .. } => ActivityType::CastingApplied,
            ActivityKind::ForumPost { .. } => ActivityType::ForumPost,
            ActivityKind::ProfileUpdated => ActivityType::ProfileUpdated,
        }
    }

    /// Builds a kind from its type and a loosely shaped metadata object.
    /// Missing or mistyped fields are dropped rather than rejected.
    pub fn from_parts(activity_type: ActivityType, metadata: Option<&Value>) -> Self {
        let number = |key: &str| {
            metadata
                .and_then(|value| value.get(key))
                .and_then(Value::as_f64)
        };
        let text = |key: &str| {
            metadata
                .and_then(|value| value.get(key))
                .and_then(Value::as_str)
                .map(str::to_string)
        };

        match activity_type {
            ActivityType::Login => ActivityKind::Login,
            ActivityType::QuizCompleted => ActivityKind::QuizCompleted {
                score: number("quizScore"),
                chapter: text("quizChapter"),
            },
            ActivityType::PaymentSubmitted => ActivityKind::PaymentSubmitted {
                amount: number("paymentAmount"),
            },
            ActivityType::BookingRequested => ActivityKind::BookingRequested {
                details: text("bookingDetails"),
            },
            ActivityType::CastingApplied => ActivityKind::CastingApplied {
                event: text("castingEvent"),
            },
            ActivityType::ForumPost => ActivityKind::ForumPost {
                thread: text("forumThread"),
            },
            ActivityType::ProfileUpdated => ActivityKind::ProfileUpdated,
        }
    }

    /// The metadata object as it appears in snapshots, `None` when empty.
    pub fn metadata(&self) -> Option<Value> {
        let mut map = Map::new();
        match self {
            ActivityKind::QuizCompleted { score, chapter } => {
                if let Some(score) = score {
                    map.insert("quizScore".into(), Value::from(*score));
                }
                if let Some(chapter) = chapter {
                    map.insert("quizChapter".into(), Value::from(chapter.clone()));
                }
            }
            ActivityKind::PaymentSubmitted { amount: Some(amount) } => {
                map.insert("paymentAmount".into(), Value::from(*amount));
            }
            ActivityKind::BookingRequested { details: Some(details) } => {
                map.insert("bookingDetails".into(), Value::from(details.clone()));
            }
            ActivityKind::CastingApplied { event: Some(event) } => {
                map.insert("castingEvent".into(), Value::from(event.clone()));
            }
            ActivityKind::ForumPost { thread: Some(thread) } => {
                map.insert("forumThread".into(), Value::from(thread.clone()));
            }
            _ => {}
        }

        if map.is_empty() {
            None
        } else {
            Some(Value::Object(map))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ActivityRecordWire", into = "ActivityRecordWire")]
pub struct ActivityRecord {
    pub id: String,
    pub model_id: String,
    pub kind: ActivityKind,
    pub title: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub is_read: bool,
}

impl ActivityRecord {
    pub fn activity_type(&self) -> ActivityType {
        self.kind.activity_type()
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActivityRecordWire {
    id: String,
    model_id: String,
    #[serde(rename = "type")]
    activity_type: ActivityType,
    title: String,
    description: String,
    timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    metadata: Option<Value>,
    #[serde(default)]
    is_read: bool,
}

impl From<ActivityRecord> for ActivityRecordWire {
    fn from(record: ActivityRecord) -> Self {
        Self {
            metadata: record.kind.metadata(),
            activity_type: record.kind.activity_type(),
            id: record.id,
            model_id: record.model_id,
            title: record.title,
            description: record.description,
            timestamp: record.timestamp,
            is_read: record.is_read,
        }
    }
}

impl From<ActivityRecordWire> for ActivityRecord {
    fn from(wire: ActivityRecordWire) -> Self {
        Self {
            kind: ActivityKind::from_parts(wire.activity_type, wire.metadata.as_ref()),
            id: wire.id,
            model_id: wire.model_id,
            title: wire.title,
            description: wire.description,
            timestamp: wire.timestamp,
            is_read: wire.is_read,
        }
    }
}

/// Rolling performance summary, one per model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceRecord {
    pub model_id: String,
    pub total_quiz_attempts: u32,
    pub average_quiz_score: f64,
    /// Incremented on every login event, not per calendar day.
    pub total_login_days: u32,
    pub last_login_date: DateTime<Utc>,
    pub total_bookings: u32,
    pub total_castings: u32,
    pub forum_posts: u32,
    pub payment_compliance: f64,
    pub overall_score: f64,
    pub last_updated: DateTime<Utc>,
}

impl PerformanceRecord {
    pub fn new(model_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            model_id: model_id.to_string(),
            total_quiz_attempts: 0,
            average_quiz_score: 0.0,
            total_login_days: 0,
            last_login_date: now,
            total_bookings: 0,
            total_castings: 0,
            forum_posts: 0,
            payment_compliance: 0.0,
            overall_score: 0.0,
            last_updated: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingEntry {
    pub model_id: String,
    pub first_activity_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    #[serde(default)]
    pub activity_counts: BTreeMap<ActivityType, u32>,
}

impl TrackingEntry {
    pub fn new(model_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            model_id: model_id.to_string(),
            first_activity_at: now,
            last_activity_at: now,
            activity_counts: BTreeMap::new(),
        }
    }

    pub fn count(&self, activity_type: ActivityType) -> u32 {
        self.activity_counts.get(&activity_type).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalStats {
    pub total_models: usize,
    pub active_models: usize,
    pub average_score: f64,
    pub average_payment_compliance: f64,
    pub total_activities: usize,
    pub unread_activities: usize,
}

/// Full dump of tracker state for handoff to an external store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerSnapshot {
    #[serde(default)]
    pub activities: Vec<ActivityRecord>,
    #[serde(default)]
    pub performances: Vec<PerformanceRecord>,
    #[serde(default)]
    pub tracking_data: Vec<TrackingEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActivityTypeSummary {
    pub activity_type: ActivityType,
    pub count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_known_types_and_rejects_others() {
        assert_eq!(
            "quiz_completed".parse::<ActivityType>().unwrap(),
            ActivityType::QuizCompleted
        );
        assert_eq!(" login ".parse::<ActivityType>().unwrap(), ActivityType::Login);
        let err = "photo_shoot".parse::<ActivityType>().unwrap_err();
        assert!(matches!(err, TrackerError::Validation(_)));
    }

    #[test]
    fn lenient_metadata_drops_mistyped_fields() {
        let metadata = json!({ "quizScore": "ninety", "quizChapter": "Posing" });
        let kind = ActivityKind::from_parts(ActivityType::QuizCompleted, Some(&metadata));
        assert_eq!(
            kind,
            ActivityKind::QuizCompleted {
                score: None,
                chapter: Some("Posing".to_string()),
            }
        );
    }

    #[test]
    fn activity_serializes_type_and_metadata_side_by_side() {
        let record = ActivityRecord {
            id: "a1".to_string(),
            model_id: "m1".to_string(),
            kind: ActivityKind::BookingRequested {
                details: Some("Spring lookbook".to_string()),
            },
            title: "Booking requested".to_string(),
            description: "Spring lookbook".to_string(),
            timestamp: Utc::now(),
            is_read: false,
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["type"], "booking_requested");
        assert_eq!(value["modelId"], "m1");
        assert_eq!(value["metadata"]["bookingDetails"], "Spring lookbook");
        assert_eq!(value["isRead"], false);
    }

    #[test]
    fn login_has_no_metadata() {
        assert_eq!(ActivityKind::Login.metadata(), None);
        assert_eq!(
            ActivityKind::ForumPost { thread: None }.metadata(),
            None
        );
    }

    #[test]
    fn snapshot_defaults_missing_sections() {
        let snapshot: TrackerSnapshot = serde_json::from_str("{}").unwrap();
        assert!(snapshot.activities.is_empty());
        assert!(snapshot.performances.is_empty());
        assert!(snapshot.tracking_data.is_empty());
    }
}
