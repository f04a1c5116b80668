use chrono::Utc;
use rocket::State;
use rocket::http::{Cookie, CookieJar, SameSite};
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};
use validator::Validate;

use super::UserData;
use crate::auth::{Role, SESSION_COOKIE, User, UserSession};
use crate::db::{
    NewUser, authenticate_user, create_user, create_user_session, get_user, invalidate_session,
};
use crate::env::AppConfig;
use crate::error::AppError;
use crate::validation::{JsonValidateExt, USERNAME_PATTERN};

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(
        length(min = 3, max = 32, message = "must be 3 to 32 characters"),
        regex(path = *USERNAME_PATTERN, message = "may only contain letters, digits and underscores")
    )]
    pub username: String,
    #[validate(length(min = 8, max = 128, message = "must be at least 8 characters"))]
    pub password: String,
    #[validate(length(min = 1, max = 40, message = "must be 1 to 40 characters"))]
    pub display_name: String,
    pub role: Role,
    #[validate(range(min = 1, max = 6, message = "must be between 1 and 6"))]
    pub grade: Option<i64>,
    #[validate(range(min = 1, max = 2, message = "must be 1 or 2"))]
    pub semester: Option<i64>,
}

#[derive(Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "is required"))]
    pub password: String,
}

#[derive(Serialize, Deserialize)]
pub struct UserResponse {
    pub success: bool,
    pub user: UserData,
}

#[derive(Serialize, Deserialize)]
pub struct LogoutResponse {
    pub success: bool,
}

#[post("/auth/register", data = "<request>")]
pub async fn api_register(
    request: Json<RegisterRequest>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<UserResponse>, AppError> {
    let validated = request.validate_request()?;

    let (grade, semester) = match validated.role {
        Role::Student => match (validated.grade, validated.semester) {
            (Some(grade), Some(semester)) => (Some(grade), Some(semester)),
            _ => {
                return Err(AppError::Validation(
                    "Students need a grade and a semester".to_string(),
                ));
            }
        },
        Role::Parent => (None, None),
    };

    let user_id = create_user(
        db,
        NewUser {
            username: &validated.username,
            password: &validated.password,
            role: validated.role,
            display_name: Some(&validated.display_name),
            grade,
            semester,
        },
    )
    .await?;

    let user = get_user(db, user_id).await?;

    Ok(Json(UserResponse {
        success: true,
        user: UserData::from(user),
    }))
}

#[post("/auth/login", data = "<login>")]
pub async fn api_login(
    login: Json<LoginRequest>,
    cookies: &CookieJar<'_>,
    db: &State<Pool<Sqlite>>,
    config: &State<AppConfig>,
) -> Result<Json<UserResponse>, AppError> {
    let validated = login.validate_request()?;

    let Some(user) = authenticate_user(db, &validated.username, &validated.password).await? else {
        return Err(AppError::Authentication(
            "Invalid username or password".to_string(),
        ));
    };

    let token = UserSession::generate_token();
    let expires_at = Utc::now() + chrono::Duration::hours(config.auth_session_ttl_hours);

    create_user_session(db, user.id, &token, expires_at.naive_utc()).await?;

    cookies.add_private(
        Cookie::build((SESSION_COOKIE, token))
            .same_site(SameSite::Lax)
            .http_only(true)
            .max_age(rocket::time::Duration::hours(config.auth_session_ttl_hours)),
    );

    tracing::info!(username = %user.username, "Login succeeded");

    Ok(Json(UserResponse {
        success: true,
        user: UserData::from(user),
    }))
}

#[post("/auth/logout")]
pub async fn api_logout(cookies: &CookieJar<'_>, db: &State<Pool<Sqlite>>) -> Json<LogoutResponse> {
    let token = cookies
        .get_private(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string());

    if let Some(token) = token {
        if let Err(e) = invalidate_session(db, &token).await {
            e.log_and_record("Logout");
        }
    }

    cookies.remove_private(Cookie::build(SESSION_COOKIE));

    Json(LogoutResponse { success: true })
}

#[get("/auth/session")]
pub async fn api_session(user: User) -> Json<UserResponse> {
    Json(UserResponse {
        success: true,
        user: UserData::from(user),
    })
}
