use std::fmt::Write;

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};

use crate::models::{
    ActivityRecord, ActivityType, ActivityTypeSummary, GlobalStats, PerformanceRecord,
    TrackingEntry,
};
use crate::scoring::ScoreBreakdown;

pub fn cutoff(since_days: i64) -> anyhow::Result<DateTime<Utc>> {
    let since_days = since_days.max(1);
    Duration::try_days(since_days)
        .and_then(|window| Utc::now().checked_sub_signed(window))
        .with_context(|| format!("--since-days {since_days} reaches past the supported date range"))
}

/// Renders a Markdown operations report. `activities` are expected newest
/// first, `mix` is the activity mix for the window, and `leaders` pairs
/// each performance (in leaderboard order) with its score breakdown.
pub fn build_report(
    since_days: i64,
    cutoff: DateTime<Utc>,
    stats: &GlobalStats,
    mix: &[ActivityTypeSummary],
    leaders: &[(PerformanceRecord, ScoreBreakdown)],
    activities: &[ActivityRecord],
) -> String {
    let recent: Vec<&ActivityRecord> = activities
        .iter()
        .filter(|activity| activity.timestamp >= cutoff)
        .collect();

    let mut output = String::new();

    let _ = writeln!(output, "# Model Performance Report");
    let _ = writeln!(
        output,
        "Activity window: last {} days (since {})",
        since_days.max(1),
        cutoff.format("%Y-%m-%d")
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Agency Overview");
    let _ = writeln!(
        output,
        "- Models tracked: {} ({} active)",
        stats.total_models, stats.active_models
    );
    let _ = writeln!(output, "- Average overall score: {:.0}", stats.average_score);
    let _ = writeln!(
        output,
        "- Average payment compliance: {:.0}",
        stats.average_payment_compliance
    );
    let _ = writeln!(
        output,
        "- Activities: {} ({} unread)",
        stats.total_activities, stats.unread_activities
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Activity Mix");

    if mix.is_empty() {
        let _ = writeln!(output, "No activity recorded for this window.");
    } else {
        for summary in mix.iter() {
            let _ = writeln!(output, "- {}: {}", summary.activity_type, summary.count);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Top Performers");

    if leaders.is_empty() {
        let _ = writeln!(output, "No models have recorded activity yet.");
    } else {
        for (performance, parts) in leaders.iter().take(10) {
            let _ = writeln!(
                output,
                "- {} score {:.0} (quiz {:.0}, logins {:.0}, bookings {:.0}, castings {:.0}, forum {:.0})",
                performance.model_id,
                performance.overall_score,
                parts.quiz,
                parts.login,
                parts.booking,
                parts.casting,
                parts.forum
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Activity");

    if recent.is_empty() {
        let _ = writeln!(output, "No activity recorded for this window.");
    } else {
        for activity in recent.iter().take(5) {
            let _ = writeln!(
                output,
                "- {} ({}) on {}: {}",
                activity.model_id,
                activity.activity_type(),
                activity.timestamp.format("%Y-%m-%d %H:%M"),
                activity.description
            );
        }
    }

    output
}

/// Plain-text card for one model: counters, weighted inputs and the
/// per-type activity counts.
pub fn build_model_summary(
    performance: &PerformanceRecord,
    parts: &ScoreBreakdown,
    tracking: Option<&TrackingEntry>,
) -> String {
    let mut output = String::new();

    let _ = writeln!(
        output,
        "{} overall score {:.0}",
        performance.model_id, performance.overall_score
    );
    let _ = writeln!(
        output,
        "  quiz {:.0} ({} attempts), logins {:.0} ({} events), bookings {:.0}, castings {:.0}, forum {:.0}, payment {:.0}",
        parts.quiz,
        performance.total_quiz_attempts,
        parts.login,
        performance.total_login_days,
        parts.booking,
        parts.casting,
        parts.forum,
        parts.payment
    );

    match tracking {
        Some(entry) => {
            let _ = writeln!(
                output,
                "  active {} to {}",
                entry.first_activity_at.format("%Y-%m-%d %H:%M"),
                entry.last_activity_at.format("%Y-%m-%d %H:%M")
            );
            for activity_type in ActivityType::ALL {
                let count = entry.count(activity_type);
                if count > 0 {
                    let _ = writeln!(output, "  - {activity_type}: {count}");
                }
            }
        }
        None => {
            let _ = writeln!(output, "  no tracking data");
        }
    }

    output
}
