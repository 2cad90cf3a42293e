use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::models::{
    ActivityRecord, ActivityTypeSummary, GlobalStats, PerformanceRecord, TrackingEntry,
};
use crate::scoring::{self, ScoreBreakdown};
use crate::tracker::PerformanceTracker;

impl PerformanceTracker {
    /// Activities for one model, newest first.
    pub fn model_activities(&self, model_id: &str) -> Vec<ActivityRecord> {
        let state = self.state.read();
        newest_first(
            state
                .activities
                .iter()
                .filter(|activity| activity.model_id == model_id),
        )
    }

    pub fn model_performance(&self, model_id: &str) -> Option<PerformanceRecord> {
        self.state.read().performances.get(model_id).cloned()
    }

    pub fn model_tracking(&self, model_id: &str) -> Option<TrackingEntry> {
        self.state.read().tracking.get(model_id).cloned()
    }

    pub fn score_breakdown(&self, model_id: &str) -> Option<ScoreBreakdown> {
        self.state
            .read()
            .performances
            .get(model_id)
            .map(scoring::breakdown)
    }

    /// Leaderboard order: highest overall score first.
    pub fn all_performances(&self) -> Vec<PerformanceRecord> {
        let mut values: Vec<PerformanceRecord> =
            self.state.read().performances.values().cloned().collect();
        values.sort_by(|a, b| {
            b.overall_score
                .partial_cmp(&a.overall_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        values
    }

    pub fn all_activities(&self) -> Vec<ActivityRecord> {
        newest_first(self.state.read().activities.iter())
    }

    /// Unread activities, newest first, optionally for a single model.
    pub fn unread_activities(&self, model_id: Option<&str>) -> Vec<ActivityRecord> {
        let state = self.state.read();
        newest_first(state.activities.iter().filter(|activity| {
            !activity.is_read && model_id.map_or(true, |id| activity.model_id == id)
        }))
    }

    /// Returns whether an activity with that id existed and was unread.
    /// Unknown ids are ignored.
    pub fn mark_activity_as_read(&self, activity_id: &str) -> bool {
        let mut state = self.state.write();
        match state
            .activities
            .iter_mut()
            .find(|activity| activity.id == activity_id)
        {
            Some(activity) => {
                let changed = !activity.is_read;
                activity.is_read = true;
                changed
            }
            None => {
                debug!(activity_id, "mark-read ignored unknown activity");
                false
            }
        }
    }

    pub fn mark_all_read(&self, model_id: &str) -> usize {
        let mut state = self.state.write();
        let mut changed = 0;
        for activity in state
            .activities
            .iter_mut()
            .filter(|activity| activity.model_id == model_id && !activity.is_read)
        {
            activity.is_read = true;
            changed += 1;
        }
        changed
    }

    pub fn global_stats(&self) -> GlobalStats {
        let state = self.state.read();
        let performances = &state.performances;

        GlobalStats {
            total_models: performances.len(),
            active_models: performances
                .values()
                .filter(|performance| performance.total_login_days > 0)
                .count(),
            average_score: scoring::rounded_mean(
                performances.values().map(|performance| performance.overall_score),
            ),
            average_payment_compliance: scoring::rounded_mean(
                performances
                    .values()
                    .map(|performance| performance.payment_compliance),
            ),
            total_activities: state.activities.len(),
            unread_activities: state
                .activities
                .iter()
                .filter(|activity| !activity.is_read)
                .count(),
        }
    }

    /// Activity counts per type for everything recorded at or after `since`.
    pub fn activity_mix(&self, since: DateTime<Utc>) -> Vec<ActivityTypeSummary> {
        let state = self.state.read();
        summarize_by_type(
            state
                .activities
                .iter()
                .filter(|activity| activity.timestamp >= since),
        )
    }
}

pub fn summarize_by_type<'a, I>(activities: I) -> Vec<ActivityTypeSummary>
where
    I: IntoIterator<Item = &'a ActivityRecord>,
{
    let mut map = HashMap::new();
    for activity in activities {
        *map.entry(activity.activity_type()).or_insert(0usize) += 1;
    }

    let mut summaries: Vec<ActivityTypeSummary> = map
        .into_iter()
        .map(|(activity_type, count)| ActivityTypeSummary {
            activity_type,
            count,
        })
        .collect();

    summaries.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.activity_type.cmp(&b.activity_type))
    });
    summaries
}

/// Newest first; among equal timestamps the later insertion wins.
fn newest_first<'a, I>(activities: I) -> Vec<ActivityRecord>
where
    I: DoubleEndedIterator<Item = &'a ActivityRecord>,
{
    let mut values: Vec<ActivityRecord> = activities.rev().cloned().collect();
    values.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ActivityType;
    use chrono::Duration;

    fn busy_tracker() -> PerformanceTracker {
        let tracker = PerformanceTracker::new();
        for _ in 0..12 {
            tracker.record_login("ava").unwrap();
        }
        tracker.record_quiz_completion("ava", 95.0, "Runway").unwrap();
        tracker.record_booking_request("ben", "Lookbook").unwrap();
        tracker.record_forum_post("cleo", "Agency news").unwrap();
        tracker.record_casting_application("cleo", "Fashion day").unwrap();
        tracker.record_casting_application("cleo", "Editorial").unwrap();
        tracker
    }

    #[test]
    fn empty_tracker_reports_zeroes() {
        let tracker = PerformanceTracker::new();
        assert_eq!(tracker.global_stats(), GlobalStats::default());
        assert!(tracker.all_performances().is_empty());
        assert!(tracker.all_activities().is_empty());
        assert!(tracker.model_activities("nobody").is_empty());
        assert!(tracker.model_performance("nobody").is_none());
    }

    #[test]
    fn leaderboard_is_sorted_by_overall_score() {
        let tracker = busy_tracker();
        let performances = tracker.all_performances();
        assert_eq!(performances.len(), 3);
        assert!(performances
            .windows(2)
            .all(|pair| pair[0].overall_score >= pair[1].overall_score));
        assert_eq!(performances[0].model_id, "ava");
    }

    #[test]
    fn repeated_reads_are_identical() {
        let tracker = busy_tracker();
        assert_eq!(tracker.model_activities("ava"), tracker.model_activities("ava"));
        assert_eq!(tracker.all_performances(), tracker.all_performances());
    }

    #[test]
    fn activities_come_back_newest_first() {
        let tracker = busy_tracker();
        let activities = tracker.all_activities();
        assert!(activities
            .windows(2)
            .all(|pair| pair[0].timestamp >= pair[1].timestamp));
        assert_eq!(activities[0].title, "Casting application");
        assert_eq!(activities[0].description, "Applied to casting: Editorial");

        let cleo = tracker.model_activities("cleo");
        assert_eq!(cleo.len(), 3);
        assert!(cleo.iter().all(|activity| activity.model_id == "cleo"));
    }

    #[test]
    fn mark_read_ignores_unknown_ids() {
        let tracker = busy_tracker();
        let before = tracker.global_stats().unread_activities;
        assert!(!tracker.mark_activity_as_read("does-not-exist"));
        assert_eq!(tracker.global_stats().unread_activities, before);

        let id = tracker.model_activities("ben")[0].id.clone();
        assert!(tracker.mark_activity_as_read(&id));
        assert!(!tracker.mark_activity_as_read(&id));
        assert_eq!(tracker.global_stats().unread_activities, before - 1);
        assert!(tracker.model_activities("ben")[0].is_read);
    }

    #[test]
    fn mark_all_read_only_touches_one_model() {
        let tracker = busy_tracker();
        assert_eq!(tracker.mark_all_read("cleo"), 3);
        assert_eq!(tracker.mark_all_read("cleo"), 0);
        assert!(tracker.unread_activities(Some("cleo")).is_empty());
        assert_eq!(tracker.unread_activities(Some("ben")).len(), 1);
        assert_eq!(tracker.unread_activities(None).len(), 14);
    }

    #[test]
    fn global_stats_average_over_models() {
        let tracker = busy_tracker();
        let stats = tracker.global_stats();
        assert_eq!(stats.total_models, 3);
        assert_eq!(stats.active_models, 1);
        assert_eq!(stats.total_activities, 17);
        assert_eq!(stats.unread_activities, 17);
        assert_eq!(stats.average_payment_compliance, 0.0);

        let expected = scoring::rounded_mean(
            tracker
                .all_performances()
                .iter()
                .map(|performance| performance.overall_score),
        );
        assert_eq!(stats.average_score, expected);
    }

    #[test]
    fn login_sub_score_for_three_logins() {
        let tracker = PerformanceTracker::new();
        for _ in 0..3 {
            tracker.record_login("m1").unwrap();
        }
        assert_eq!(tracker.model_performance("m1").unwrap().total_login_days, 3);
        let parts = tracker.score_breakdown("m1").unwrap();
        assert!((parts.login - 10.0).abs() < 1e-9);
        assert!(tracker.score_breakdown("m9").is_none());
    }

    #[test]
    fn activity_mix_counts_window() {
        let tracker = busy_tracker();
        let mix = tracker.activity_mix(Utc::now() - Duration::days(1));
        assert_eq!(mix[0].activity_type, ActivityType::Login);
        assert_eq!(mix[0].count, 12);
        assert_eq!(mix[1].activity_type, ActivityType::CastingApplied);
        assert_eq!(mix[1].count, 2);

        assert!(tracker
            .activity_mix(Utc::now() + Duration::days(1))
            .is_empty());
    }
}
