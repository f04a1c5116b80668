use chrono::{NaiveDate, NaiveDateTime, Utc};
use rand::Rng;
use rand::distr::Alphanumeric;
use serde::Serialize;

use super::{Permission, Role};
use crate::error::AppError;
use crate::quiz::{accuracy, level_for_xp};

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub username: String,
    pub role: Role,
    pub display_name: String,
    pub avatar: Option<String>,
    pub grade: Option<i64>,
    pub semester: Option<i64>,
    pub xp: i64,
    pub level: i64,
    pub coins: i64,
    pub streak_count: i64,
    pub last_completed_date: Option<NaiveDate>,
    pub sessions_completed: i64,
    pub total_answered: i64,
    pub total_correct: i64,
    pub first_try_correct: i64,
}

#[derive(sqlx::FromRow, Clone, Default)]
pub struct DbUser {
    pub id: Option<i64>,
    pub username: Option<String>,
    pub role: Option<String>,
    pub display_name: Option<String>,
    pub avatar: Option<String>,
    pub grade: Option<i64>,
    pub semester: Option<i64>,
    pub xp: Option<i64>,
    pub level: Option<i64>,
    pub coins: Option<i64>,
    pub streak_count: Option<i64>,
    pub last_completed_date: Option<NaiveDate>,
    pub sessions_completed: Option<i64>,
    pub total_answered: Option<i64>,
    pub total_correct: Option<i64>,
    pub first_try_correct: Option<i64>,
}

pub const USER_COLUMNS: &str = "id, username, role, display_name, avatar, grade, semester, xp, \
     level, coins, streak_count, last_completed_date, sessions_completed, total_answered, \
     total_correct, first_try_correct";

impl TryFrom<DbUser> for User {
    type Error = AppError;

    fn try_from(user: DbUser) -> Result<Self, Self::Error> {
        let username = user.username.unwrap_or_default();
        let role = user
            .role
            .unwrap_or_default()
            .parse::<Role>()
            .map_err(|e| AppError::Internal(format!("User {}: {}", username, e)))?;

        Ok(Self {
            id: user.id.unwrap_or_default(),
            display_name: user.display_name.unwrap_or_else(|| username.clone()),
            username,
            role,
            avatar: user.avatar,
            grade: user.grade,
            semester: user.semester,
            xp: user.xp.unwrap_or_default(),
            level: user.level.unwrap_or(1),
            coins: user.coins.unwrap_or_default(),
            streak_count: user.streak_count.unwrap_or_default(),
            last_completed_date: user.last_completed_date,
            sessions_completed: user.sessions_completed.unwrap_or_default(),
            total_answered: user.total_answered.unwrap_or_default(),
            total_correct: user.total_correct.unwrap_or_default(),
            first_try_correct: user.first_try_correct.unwrap_or_default(),
        })
    }
}

impl User {
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.role.has_permission(permission)
    }

    pub fn require_permission(&self, permission: Permission) -> Result<(), AppError> {
        if self.role.has_permission(permission) {
            Ok(())
        } else {
            tracing::warn!(
                username = %self.username,
                role = %self.role.as_str(),
                permission = ?permission,
                "Permission denied"
            );
            Err(AppError::Authorization(format!(
                "A {} account cannot do this",
                self.role
            )))
        }
    }

    pub fn accuracy(&self) -> f64 {
        accuracy(self.first_try_correct, self.total_answered)
    }

    /// Level recomputed from XP, in case the stored column lags behind.
    pub fn computed_level(&self) -> i64 {
        level_for_xp(self.xp)
    }
}

#[derive(Debug, Clone)]
pub struct UserSession {
    pub id: i64,
    pub user_id: i64,
    pub token: String,
    pub created_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbUserSession {
    pub id: Option<i64>,
    pub user_id: Option<i64>,
    pub token: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub expires_at: Option<NaiveDateTime>,
}

impl From<DbUserSession> for UserSession {
    fn from(session: DbUserSession) -> Self {
        let now = Utc::now().naive_utc();
        Self {
            id: session.id.unwrap_or_default(),
            user_id: session.user_id.unwrap_or_default(),
            token: session.token.unwrap_or_default(),
            created_at: session.created_at.unwrap_or(now),
            // A row without an expiry is treated as already expired.
            expires_at: session.expires_at.unwrap_or(now),
        }
    }
}

impl UserSession {
    pub const TOKEN_LENGTH: usize = 48;

    pub fn generate_token() -> String {
        rand::rng()
            .sample_iter(Alphanumeric)
            .take(Self::TOKEN_LENGTH)
            .map(char::from)
            .collect()
    }

    pub fn is_valid(&self) -> bool {
        self.expires_at > Utc::now().naive_utc()
    }
}
