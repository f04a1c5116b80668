use rocket::State;
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};
use validator::Validate;

use super::{UserData, UserStats, collect_wrong_notes, user_stats, weekly_completion};
use crate::auth::{Permission, Role, User};
use crate::db::{authenticate_user, get_children, get_daily_session, link_child};
use crate::env::AppConfig;
use crate::error::AppError;
use crate::quiz::SessionStatus;
use crate::validation::JsonValidateExt;

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LinkChildRequest {
    #[validate(length(min = 1, message = "is required"))]
    pub child_username: String,
    #[validate(length(min = 1, message = "is required"))]
    pub child_password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkChildResponse {
    pub success: bool,
    pub child: UserData,
    pub newly_linked: bool,
}

#[post("/parent/link", data = "<request>")]
pub async fn api_link_child(
    request: Json<LinkChildRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<LinkChildResponse>, AppError> {
    user.require_permission(Permission::LinkChildren)?;
    let validated = request.validate_request()?;

    let child = authenticate_user(db, &validated.child_username, &validated.child_password)
        .await?
        .ok_or_else(|| {
            AppError::Validation("Child username or password is incorrect".to_string())
        })?;

    if child.role != Role::Student {
        return Err(AppError::Validation(
            "Only student accounts can be linked".to_string(),
        ));
    }

    let newly_linked = link_child(db, user.id, child.id).await?;
    tracing::info!(parent_id = user.id, child_id = child.id, newly_linked, "Child linked");

    Ok(Json(LinkChildResponse {
        success: true,
        child: UserData::from(child),
        newly_linked,
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildSummary {
    pub child: UserData,
    pub stats: UserStats,
    pub week: [bool; 7],
    pub today_status: SessionStatus,
    pub open_wrong_notes: usize,
}

#[derive(Serialize)]
pub struct ChildrenResponse {
    pub success: bool,
    pub children: Vec<ChildSummary>,
}

#[get("/parent/children")]
pub async fn api_get_children(
    user: User,
    db: &State<Pool<Sqlite>>,
    config: &State<AppConfig>,
) -> Result<Json<ChildrenResponse>, AppError> {
    user.require_permission(Permission::ViewChildProgress)?;

    let today = config.today();
    let mut children = Vec::new();

    for child in get_children(db, user.id).await? {
        let stats = user_stats(db, &child).await?;
        let (_, _, week) = weekly_completion(db, child.id, today).await?;
        let today_status = get_daily_session(db, child.id, today)
            .await?
            .map(|s| s.status)
            .unwrap_or(SessionStatus::NotStarted);
        let open_wrong_notes = collect_wrong_notes(db, child.id, config.wrong_notes_session_limit)
            .await?
            .len();

        children.push(ChildSummary {
            child: UserData::from(child),
            stats,
            week,
            today_status,
            open_wrong_notes,
        });
    }

    Ok(Json(ChildrenResponse {
        success: true,
        children,
    }))
}
