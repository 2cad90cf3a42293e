//! Call-site helpers that fix the activity type, compose the title and
//! description, and shape the metadata for each kind of event.

use crate::error::TrackerResult;
use crate::models::{ActivityKind, ActivityRecord};
use crate::tracker::PerformanceTracker;

impl PerformanceTracker {
    pub fn record_login(&self, model_id: &str) -> TrackerResult<ActivityRecord> {
        self.record_activity(
            model_id,
            ActivityKind::Login,
            "Logged in",
            "Signed in to the model portal",
        )
    }

    pub fn record_quiz_completion(
        &self,
        model_id: &str,
        score: f64,
        chapter: &str,
    ) -> TrackerResult<ActivityRecord> {
        self.record_activity(
            model_id,
            ActivityKind::QuizCompleted {
                score: Some(score),
                chapter: Some(chapter.to_string()),
            },
            "Quiz completed",
            format!("Scored {score}% on {chapter}"),
        )
    }

    pub fn record_payment_submission(
        &self,
        model_id: &str,
        amount: f64,
    ) -> TrackerResult<ActivityRecord> {
        self.record_activity(
            model_id,
            ActivityKind::PaymentSubmitted {
                amount: Some(amount),
            },
            "Payment submitted",
            format!("Submitted a payment of {amount:.2}"),
        )
    }

    pub fn record_booking_request(
        &self,
        model_id: &str,
        details: &str,
    ) -> TrackerResult<ActivityRecord> {
        self.record_activity(
            model_id,
            ActivityKind::BookingRequested {
                details: Some(details.to_string()),
            },
            "Booking requested",
            format!("Requested booking: {details}"),
        )
    }

    pub fn record_casting_application(
        &self,
        model_id: &str,
        event: &str,
    ) -> TrackerResult<ActivityRecord> {
        self.record_activity(
            model_id,
            ActivityKind::CastingApplied {
                event: Some(event.to_string()),
            },
            "Casting application",
            format!("Applied to casting: {event}"),
        )
    }

    pub fn record_forum_post(&self, model_id: &str, thread: &str) -> TrackerResult<ActivityRecord> {
        self.record_activity(
            model_id,
            ActivityKind::ForumPost {
                thread: Some(thread.to_string()),
            },
            "Forum post",
            format!("Posted in thread: {thread}"),
        )
    }

    pub fn record_profile_update(&self, model_id: &str) -> TrackerResult<ActivityRecord> {
        self.record_activity(
            model_id,
            ActivityKind::ProfileUpdated,
            "Profile updated",
            "Updated profile details",
        )
    }
}
