#[macro_use]
extern crate rocket;

mod api;
mod auth;
mod db;
mod env;
mod error;
mod models;
mod progress;
mod quiz;
mod telemetry;
#[cfg(test)]
mod test;
mod validation;

use std::str::FromStr;
use std::time::Duration;

use api::{
    api_get_achievements, api_get_children, api_get_leaderboard, api_get_my_stats,
    api_get_today_session, api_get_weekly, api_get_wrong_notes, api_link_child, api_login,
    api_logout, api_register, api_session, api_submit_answer, health,
};
use auth::{default_api, unauthorized_api};
use db::clean_expired_sessions;
use env::{AppConfig, load_environment, report_missing_env_files};
use error::AppError;
use quiz::ContentProvider;
use rocket::{Build, Rocket};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};
use telemetry::{TelemetryFairing, init_tracing, shutdown_telemetry};
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Anyhow(anyhow::Error),
    #[error("{0}")]
    Rocket(Box<rocket::Error>),
    #[error("{0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Application error: {0}")]
    App(#[from] AppError),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<anyhow::Error> for Error {
    fn from(value: anyhow::Error) -> Self {
        Error::Anyhow(value)
    }
}

impl From<rocket::Error> for Error {
    fn from(value: rocket::Error) -> Self {
        Error::Rocket(Box::new(value))
    }
}

#[rocket::main]
async fn main() -> Result<(), Error> {
    let missing_env_files = load_environment().map_err(|e| Error::Config(e.to_string()))?;
    init_tracing();
    report_missing_env_files(&missing_env_files);

    let config = AppConfig::from_env()?;

    let options = SqliteConnectOptions::from_str(&config.database_url)?.create_if_missing(true);
    let pool = SqlitePool::connect_with(options).await?;

    info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await.map_err(AppError::from)?;
    info!("Migrations completed successfully");

    spawn_session_cleanup(pool.clone(), config.session_cleanup_interval_secs);

    let result = init_rocket(pool, config, ContentProvider::fallback_only())
        .launch()
        .await;

    shutdown_telemetry();
    result?;

    Ok(())
}

fn spawn_session_cleanup(pool: SqlitePool, interval_secs: u64) {
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;

        loop {
            match clean_expired_sessions(&pool).await {
                Ok(count) => {
                    if count > 0 {
                        info!("Cleaned up {} expired sessions", count);
                    }
                }
                Err(e) => {
                    error!("Failed to clean expired sessions: {}", e);
                }
            }

            tokio::time::sleep(Duration::from_secs(interval_secs.max(1))).await;
        }
    });
}

pub fn init_rocket(
    pool: SqlitePool,
    config: AppConfig,
    provider: ContentProvider,
) -> Rocket<Build> {
    info!("Starting daily reading service");

    rocket::build()
        .manage(pool)
        .manage(config)
        .manage(provider)
        .mount(
            "/api",
            routes![
                api_register,
                api_login,
                api_logout,
                api_session,
                api_get_today_session,
                api_submit_answer,
                api_get_weekly,
                api_get_wrong_notes,
                api_get_leaderboard,
                api_get_my_stats,
                api_get_achievements,
                api_link_child,
                api_get_children,
            ],
        )
        .register("/api", catchers![unauthorized_api, default_api])
        .mount("/api", routes![health])
        .attach(TelemetryFairing)
}
