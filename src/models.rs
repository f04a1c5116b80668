use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;

use crate::error::AppError;
use crate::quiz::{DailyContent, SessionStatus, SessionTally};

/// One user's quiz instance for one day.
#[derive(Debug, Clone)]
pub struct DailySessionRecord {
    pub id: i64,
    pub user_id: i64,
    pub date: NaiveDate,
    pub status: SessionStatus,
    pub content: DailyContent,
    pub tally: SessionTally,
    pub elapsed_seconds: i64,
    pub xp_earned: i64,
    pub coins_earned: i64,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Row version read with this record; writes only land on the same version.
    pub revision: i64,
}

#[derive(sqlx::FromRow, Clone, Default)]
pub struct DbDailySession {
    pub id: Option<i64>,
    pub user_id: Option<i64>,
    pub date: Option<NaiveDate>,
    pub status: Option<String>,
    pub passages_data: Option<String>,
    pub grammar_questions_data: Option<String>,
    pub total_questions: Option<i64>,
    pub correct_count: Option<i64>,
    pub attempted_count: Option<i64>,
    pub elapsed_seconds: Option<i64>,
    pub xp_earned: Option<i64>,
    pub coins_earned: Option<i64>,
    pub created_at: Option<NaiveDateTime>,
    pub completed_at: Option<NaiveDateTime>,
    pub revision: Option<i64>,
}

pub const DAILY_SESSION_COLUMNS: &str = "id, user_id, date, status, passages_data, \
     grammar_questions_data, total_questions, correct_count, attempted_count, elapsed_seconds, \
     xp_earned, coins_earned, created_at, completed_at, revision";

impl DbDailySession {
    pub fn content(&self) -> Result<DailyContent, AppError> {
        DailyContent::from_json(
            self.passages_data.as_deref().unwrap_or_default(),
            self.grammar_questions_data.as_deref().unwrap_or_default(),
        )
    }
}

fn to_utc(dt: NaiveDateTime) -> DateTime<Utc> {
    DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc)
}

impl TryFrom<DbDailySession> for DailySessionRecord {
    type Error = AppError;

    fn try_from(db: DbDailySession) -> Result<Self, Self::Error> {
        let content = db.content()?;
        Ok(Self {
            id: db.id.unwrap_or_default(),
            user_id: db.user_id.unwrap_or_default(),
            date: db.date.unwrap_or_default(),
            status: SessionStatus::parse(db.status.as_deref().unwrap_or_default()),
            tally: SessionTally {
                total_questions: db.total_questions.unwrap_or_default(),
                correct_count: db.correct_count.unwrap_or_default(),
                attempted_count: db.attempted_count.unwrap_or_default(),
                first_try_correct: SessionTally::of(&content).first_try_correct,
            },
            content,
            elapsed_seconds: db.elapsed_seconds.unwrap_or_default(),
            xp_earned: db.xp_earned.unwrap_or_default(),
            coins_earned: db.coins_earned.unwrap_or_default(),
            created_at: db.created_at.map(to_utc).unwrap_or_else(Utc::now),
            completed_at: db.completed_at.map(to_utc),
            revision: db.revision.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockedBadge {
    pub badge_id: String,
    pub unlocked_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone, Default)]
pub struct DbUserBadge {
    pub badge_id: Option<String>,
    pub unlocked_at: Option<NaiveDateTime>,
}

impl From<DbUserBadge> for UnlockedBadge {
    fn from(db: DbUserBadge) -> Self {
        Self {
            badge_id: db.badge_id.unwrap_or_default(),
            unlocked_at: db.unlocked_at.map(to_utc).unwrap_or_else(Utc::now),
        }
    }
}

/// A student's standing for one leaderboard window, before ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardRow {
    pub user_id: i64,
    pub display_name: String,
    pub avatar: Option<String>,
    pub level: i64,
    pub streak_count: i64,
    pub period_xp: i64,
}

#[derive(sqlx::FromRow, Clone, Default)]
pub struct DbLeaderboardRow {
    pub user_id: Option<i64>,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub avatar: Option<String>,
    pub level: Option<i64>,
    pub streak_count: Option<i64>,
    pub period_xp: Option<i64>,
}

impl From<DbLeaderboardRow> for LeaderboardRow {
    fn from(db: DbLeaderboardRow) -> Self {
        let username = db.username.unwrap_or_default();
        Self {
            user_id: db.user_id.unwrap_or_default(),
            display_name: db.display_name.unwrap_or(username),
            avatar: db.avatar,
            level: db.level.unwrap_or(1),
            streak_count: db.streak_count.unwrap_or_default(),
            period_xp: db.period_xp.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: i64,
    pub user_id: i64,
    pub display_name: String,
    pub avatar: Option<String>,
    pub level: i64,
    pub streak: i64,
    pub xp: i64,
}

/// Competition ranking over rows already sorted by XP: ties share a rank and
/// the following rank skips.
pub fn rank_rows(rows: Vec<LeaderboardRow>) -> Vec<LeaderboardEntry> {
    let mut entries: Vec<LeaderboardEntry> = Vec::with_capacity(rows.len());
    for (position, row) in rows.into_iter().enumerate() {
        let rank = match entries.last() {
            Some(prev) if prev.xp == row.period_xp => prev.rank,
            _ => position as i64 + 1,
        };
        entries.push(LeaderboardEntry {
            rank,
            user_id: row.user_id,
            display_name: row.display_name,
            avatar: row.avatar,
            level: row.level,
            streak: row.streak_count,
            xp: row.period_xp,
        });
    }
    entries
}
