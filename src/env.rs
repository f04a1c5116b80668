use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use tracing::warn;

use crate::error::AppError;

/// Longest login a session token may grant: one year.
pub const MAX_SESSION_TTL_HOURS: i64 = 24 * 365;

/// Loads the layered env files and returns the ones that were missing.
///
/// Runs before tracing is installed, so callers log the result afterwards.
pub fn load_environment() -> Result<Vec<&'static str>, Box<dyn std::error::Error>> {
    let is_production =
        dotenvy::var("ROCKET_PROFILE").unwrap_or("development".to_string()) == "production";

    let env_files = if is_production {
        vec!["config/common.env", "config/prod.env", ".secrets.env"]
    } else {
        vec!["config/common.env", "config/dev.env", ".secrets.env"]
    };

    let mut missing = Vec::new();
    for env_file in env_files {
        if !Path::new(env_file).exists() {
            missing.push(env_file);
            continue;
        }
        dotenvy::from_filename_override(env_file)?;
    }

    Ok(missing)
}

pub fn report_missing_env_files(missing: &[&str]) {
    for path in missing {
        warn!("Environment file {} not found, skipping", path);
    }
}

/// Reward amounts granted outside the per-attempt XP table.
#[derive(Debug, Clone, PartialEq)]
pub struct RewardConfig {
    pub completion_bonus_xp: i64,
    pub completion_bonus_coins: i64,
    pub coins_per_correct: i64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            completion_bonus_xp: 20,
            completion_bonus_coins: 10,
            coins_per_correct: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub database_url: String,
    pub auth_session_ttl_hours: i64,
    pub session_cleanup_interval_secs: u64,
    pub utc_offset_hours: i32,
    pub leaderboard_limit: i64,
    pub wrong_notes_session_limit: i64,
    pub rewards: RewardConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            auth_session_ttl_hours: 168,
            session_cleanup_interval_secs: 3600,
            utc_offset_hours: 9,
            leaderboard_limit: 50,
            wrong_notes_session_limit: 30,
            rewards: RewardConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let defaults = AppConfig::default();

        let utc_offset_hours = env_or("UTC_OFFSET_HOURS", defaults.utc_offset_hours)?;
        if !(-12..=14).contains(&utc_offset_hours) {
            return Err(AppError::Internal(format!(
                "UTC_OFFSET_HOURS out of range: {}",
                utc_offset_hours
            )));
        }

        let auth_session_ttl_hours =
            env_or("AUTH_SESSION_TTL_HOURS", defaults.auth_session_ttl_hours)?;
        if !(1..=MAX_SESSION_TTL_HOURS).contains(&auth_session_ttl_hours) {
            return Err(AppError::Internal(format!(
                "AUTH_SESSION_TTL_HOURS out of range: {}",
                auth_session_ttl_hours
            )));
        }

        Ok(Self {
            database_url: dotenvy::var("DATABASE_URL").unwrap_or(defaults.database_url),
            auth_session_ttl_hours,
            session_cleanup_interval_secs: env_or(
                "SESSION_CLEANUP_INTERVAL_SECS",
                defaults.session_cleanup_interval_secs,
            )?,
            utc_offset_hours,
            leaderboard_limit: env_or("LEADERBOARD_LIMIT", defaults.leaderboard_limit)?,
            wrong_notes_session_limit: env_or(
                "WRONG_NOTES_SESSION_LIMIT",
                defaults.wrong_notes_session_limit,
            )?,
            rewards: RewardConfig {
                completion_bonus_xp: env_or(
                    "COMPLETION_BONUS_XP",
                    defaults.rewards.completion_bonus_xp,
                )?,
                completion_bonus_coins: env_or(
                    "COMPLETION_BONUS_COINS",
                    defaults.rewards.completion_bonus_coins,
                )?,
                coins_per_correct: env_or("COINS_PER_CORRECT", defaults.rewards.coins_per_correct)?,
            },
        })
    }

    pub fn timezone(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_hours * 3600)
            .unwrap_or_else(|| Utc.fix())
    }

    /// The calendar day at `now` in the service's timezone.
    pub fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.timezone()).date_naive()
    }

    pub fn today(&self) -> NaiveDate {
        self.local_date(Utc::now())
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> Result<T, AppError> {
    match dotenvy::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::Internal(format!("Invalid value for {}: {:?}", key, raw))),
        Err(_) => Ok(default),
    }
}
