use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rocket::State;
use rocket::serde::json::Json;
use serde::Serialize;
use sqlx::{Pool, Sqlite};

use super::UserData;
use crate::auth::{Permission, User};
use crate::db::get_user_badges;
use crate::error::AppError;
use crate::quiz::achievements::{self, Achievement, CATALOG};
use crate::quiz::{XP_PER_LEVEL, xp_into_level};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub xp: i64,
    pub level: i64,
    pub xp_into_level: i64,
    pub xp_per_level: i64,
    pub coins: i64,
    pub streak: i64,
    pub badges: Vec<String>,
    pub sessions_completed: i64,
    pub total_answered: i64,
    pub total_correct: i64,
    pub accuracy: f64,
}

#[derive(Serialize)]
pub struct UserStatsResponse {
    pub success: bool,
    pub user: UserData,
    pub stats: UserStats,
}

pub async fn user_stats(db: &Pool<Sqlite>, user: &User) -> Result<UserStats, AppError> {
    let badges = get_user_badges(db, user.id)
        .await?
        .into_iter()
        .map(|b| b.badge_id)
        .collect();

    Ok(UserStats {
        xp: user.xp,
        level: user.computed_level(),
        xp_into_level: xp_into_level(user.xp),
        xp_per_level: XP_PER_LEVEL,
        coins: user.coins,
        streak: user.streak_count,
        badges,
        sessions_completed: user.sessions_completed,
        total_answered: user.total_answered,
        total_correct: user.total_correct,
        accuracy: user.accuracy(),
    })
}

#[get("/users/me/stats")]
pub async fn api_get_my_stats(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<UserStatsResponse>, AppError> {
    user.require_permission(Permission::ViewOwnProfile)?;

    let stats = user_stats(db, &user).await?;

    Ok(Json(UserStatsResponse {
        success: true,
        user: UserData::from(user),
        stats,
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementStatus {
    #[serde(flatten)]
    pub achievement: &'static Achievement,
    pub unlocked: bool,
    pub unlocked_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementsResponse {
    pub success: bool,
    pub unlocked_count: usize,
    pub achievements: Vec<AchievementStatus>,
}

#[get("/achievements")]
pub async fn api_get_achievements(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<AchievementsResponse>, AppError> {
    let unlocked: HashMap<String, DateTime<Utc>> = get_user_badges(db, user.id)
        .await?
        .into_iter()
        .filter(|b| achievements::find(&b.badge_id).is_some())
        .map(|b| (b.badge_id, b.unlocked_at))
        .collect();

    let achievements: Vec<AchievementStatus> = CATALOG
        .iter()
        .map(|achievement| {
            let unlocked_at = unlocked.get(achievement.id).copied();
            AchievementStatus {
                achievement,
                unlocked: unlocked_at.is_some(),
                unlocked_at,
            }
        })
        .collect();

    Ok(Json(AchievementsResponse {
        success: true,
        unlocked_count: unlocked.len(),
        achievements,
    }))
}
