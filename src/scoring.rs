use crate::models::PerformanceRecord;

pub const QUIZ_WEIGHT: f64 = 0.30;
pub const LOGIN_WEIGHT: f64 = 0.20;
pub const BOOKING_WEIGHT: f64 = 0.20;
pub const CASTING_WEIGHT: f64 = 0.15;
pub const FORUM_WEIGHT: f64 = 0.10;
pub const PAYMENT_WEIGHT: f64 = 0.05;

/// Login events needed for a full login sub-score.
pub const LOGIN_DAYS_TARGET: f64 = 30.0;
pub const POINTS_PER_BOOKING: f64 = 10.0;
pub const POINTS_PER_CASTING: f64 = 15.0;
pub const POINTS_PER_FORUM_POST: f64 = 5.0;

const MAX_SUB_SCORE: f64 = 100.0;

/// The six weighted inputs of a model's overall score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBreakdown {
    pub quiz: f64,
    pub login: f64,
    pub booking: f64,
    pub casting: f64,
    pub forum: f64,
    pub payment: f64,
}

impl ScoreBreakdown {
    pub fn overall(&self) -> f64 {
        (self.quiz * QUIZ_WEIGHT
            + self.login * LOGIN_WEIGHT
            + self.booking * BOOKING_WEIGHT
            + self.casting * CASTING_WEIGHT
            + self.forum * FORUM_WEIGHT
            + self.payment * PAYMENT_WEIGHT)
            .round()
    }
}

pub fn breakdown(record: &PerformanceRecord) -> ScoreBreakdown {
    ScoreBreakdown {
        quiz: clamp_sub_score(record.average_quiz_score),
        login: clamp_sub_score(f64::from(record.total_login_days) / LOGIN_DAYS_TARGET * 100.0),
        booking: clamp_sub_score(f64::from(record.total_bookings) * POINTS_PER_BOOKING),
        casting: clamp_sub_score(f64::from(record.total_castings) * POINTS_PER_CASTING),
        forum: clamp_sub_score(f64::from(record.forum_posts) * POINTS_PER_FORUM_POST),
        payment: record.payment_compliance,
    }
}

pub fn overall_score(record: &PerformanceRecord) -> f64 {
    breakdown(record).overall()
}

/// Folds one more value into a mean that was itself rounded at every step.
/// `count` includes the new value.
pub fn running_mean(previous: f64, count: u32, value: f64) -> f64 {
    if count == 0 {
        return previous;
    }
    let count = f64::from(count);
    ((previous * (count - 1.0) + value) / count).round()
}

/// Rounded arithmetic mean, zero for an empty input.
pub fn rounded_mean<I>(values: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let (total, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(total, count), value| (total + value, count + 1));
    if count == 0 {
        0.0
    } else {
        (total / count as f64).round()
    }
}

fn clamp_sub_score(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, MAX_SUB_SCORE)
    }
}
