use chrono::NaiveDate;
use serde::Serialize;

use super::model::DailyContent;

pub const XP_PER_LEVEL: i64 = 100;

pub fn level_for_xp(xp: i64) -> i64 {
    1 + xp.max(0) / XP_PER_LEVEL
}

/// XP earned inside the current level.
pub fn xp_into_level(xp: i64) -> i64 {
    xp.max(0) % XP_PER_LEVEL
}

/// Streak after completing a session on `today`.
pub fn next_streak(current: i64, last_completed: Option<NaiveDate>, today: NaiveDate) -> i64 {
    match last_completed {
        Some(last) if last == today => current.max(1),
        Some(last) if last.succ_opt() == Some(today) => current + 1,
        _ => 1,
    }
}

/// Percentage of answered questions solved on the first try, one decimal.
pub fn accuracy(first_try_correct: i64, answered: i64) -> f64 {
    if answered <= 0 {
        return 0.0;
    }
    let ratio = first_try_correct as f64 / answered as f64 * 100.0;
    (ratio * 10.0).round() / 10.0
}

/// Counters derived from a session's answer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTally {
    pub total_questions: i64,
    pub correct_count: i64,
    pub attempted_count: i64,
    pub first_try_correct: i64,
}

impl SessionTally {
    pub fn of(content: &DailyContent) -> Self {
        content
            .all_questions()
            .fold(SessionTally::default(), |mut tally, q| {
                tally.total_questions += 1;
                if q.is_solved() {
                    tally.correct_count += 1;
                }
                if q.attempts > 0 {
                    tally.attempted_count += 1;
                }
                if q.first_try_correct == Some(true) {
                    tally.first_try_correct += 1;
                }
                tally
            })
    }

    pub fn is_perfect(&self) -> bool {
        self.total_questions > 0 && self.first_try_correct == self.total_questions
    }
}
