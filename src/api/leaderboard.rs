use chrono::NaiveDate;
use rocket::State;
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};

use crate::auth::{Permission, Role, User};
use crate::db::{get_leaderboard_rows, get_leaderboard_standing};
use crate::env::AppConfig;
use crate::error::AppError;
use crate::models::{LeaderboardEntry, rank_rows};
use crate::quiz::{month_window, week_window};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Weekly,
    Monthly,
}

impl Period {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        match raw {
            "weekly" => Ok(Period::Weekly),
            "monthly" => Ok(Period::Monthly),
            other => Err(AppError::Validation(format!("Unknown period: {}", other))),
        }
    }

    pub fn window(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        match self {
            Period::Weekly => week_window(today),
            Period::Monthly => month_window(today),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardResponse {
    pub success: bool,
    pub period: Period,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub entries: Vec<LeaderboardEntry>,
    pub me: Option<LeaderboardEntry>,
}

#[get("/leaderboard?<period>")]
pub async fn api_get_leaderboard(
    period: Option<&str>,
    user: User,
    db: &State<Pool<Sqlite>>,
    config: &State<AppConfig>,
) -> Result<Json<LeaderboardResponse>, AppError> {
    user.require_permission(Permission::ViewLeaderboard)?;

    let period = Period::parse(period.unwrap_or("weekly"))?;
    let (from, to) = period.window(config.today());

    let rows = get_leaderboard_rows(db, from, to, config.leaderboard_limit).await?;
    let entries = rank_rows(rows);

    let me = if user.role == Role::Student {
        match entries.iter().find(|e| e.user_id == user.id) {
            Some(entry) => Some(entry.clone()),
            None => get_leaderboard_standing(db, user.id, from, to)
                .await?
                .map(|(rank, row)| LeaderboardEntry {
                    rank,
                    user_id: row.user_id,
                    display_name: row.display_name,
                    avatar: row.avatar,
                    level: row.level,
                    streak: row.streak_count,
                    xp: row.period_xp,
                }),
        }
    } else {
        None
    };

    Ok(Json(LeaderboardResponse {
        success: true,
        period,
        period_start: from,
        period_end: to,
        entries,
        me,
    }))
}
