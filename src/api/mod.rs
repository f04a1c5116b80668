pub mod auth;
pub mod leaderboard;
pub mod parent;
pub mod sessions;
pub mod users;

pub use auth::*;
pub use leaderboard::*;
pub use parent::*;
pub use sessions::*;
pub use users::*;

use chrono::NaiveDate;
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};

use crate::auth::User;

/// Profile fields returned wherever a user is embedded in a response.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    pub id: i64,
    pub username: String,
    pub display_name: String,
    pub role: String,
    pub avatar: Option<String>,
    pub grade: Option<i64>,
    pub semester: Option<i64>,
    pub xp: i64,
    pub level: i64,
    pub coins: i64,
    pub streak: i64,
    pub last_completed_date: Option<NaiveDate>,
}

impl From<User> for UserData {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            display_name: user.display_name,
            role: user.role.to_string(),
            avatar: user.avatar,
            grade: user.grade,
            semester: user.semester,
            xp: user.xp,
            level: user.level,
            coins: user.coins,
            streak: user.streak_count,
            last_completed_date: user.last_completed_date,
        }
    }
}

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub success: bool,
    pub status: String,
}

#[get("/health")]
pub fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        success: true,
        status: "ok".to_string(),
    })
}
