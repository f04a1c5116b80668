use crate::{
    auth::{DbUser, DbUserSession, Role, USER_COLUMNS, User, UserSession},
    error::AppError,
    models::{
        DAILY_SESSION_COLUMNS, DailySessionRecord, DbDailySession, DbLeaderboardRow, DbUserBadge,
        LeaderboardRow, UnlockedBadge,
    },
    quiz::{DailyContent, SessionStatus, SessionTally, XP_PER_LEVEL},
};
use chrono::{NaiveDate, NaiveDateTime, Utc};
use sqlx::{Executor, Pool, Sqlite, SqliteConnection};
use tracing::{info, instrument};

#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub password: &'a str,
    pub role: Role,
    pub display_name: Option<&'a str>,
    pub grade: Option<i64>,
    pub semester: Option<i64>,
}

#[instrument]
pub async fn get_user(pool: &Pool<Sqlite>, id: i64) -> Result<User, AppError> {
    info!("Fetching user by ID");
    fetch_user(pool, id).await
}

/// Reads the user through an open transaction so counters reflect its writes.
pub async fn get_user_in(conn: &mut SqliteConnection, id: i64) -> Result<User, AppError> {
    fetch_user(&mut *conn, id).await
}

async fn fetch_user<'e, E>(executor: E, id: i64) -> Result<User, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, DbUser>(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
        .bind(id)
        .fetch_optional(executor)
        .await?;

    match row {
        Some(user) => User::try_from(user),
        _ => Err(AppError::NotFound(format!(
            "User with id {} not found in database",
            id
        ))),
    }
}

#[instrument]
pub async fn find_user_by_username(
    pool: &Pool<Sqlite>,
    username: &str,
) -> Result<Option<User>, AppError> {
    info!("Finding user by username");
    let row = sqlx::query_as::<_, DbUser>(&format!(
        "SELECT {} FROM users WHERE username = ?",
        USER_COLUMNS
    ))
    .bind(username)
    .fetch_optional(pool)
    .await?;

    row.map(User::try_from).transpose()
}

#[instrument(skip_all, fields(username = %new_user.username, role = %new_user.role))]
pub async fn create_user(pool: &Pool<Sqlite>, new_user: NewUser<'_>) -> Result<i64, AppError> {
    info!("Creating new user");

    let existing_user = sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE username = ?")
        .bind(new_user.username)
        .fetch_optional(pool)
        .await?;

    if existing_user.is_some() {
        return Err(AppError::Validation(format!(
            "Username '{}' already exists",
            new_user.username
        )));
    }

    let hashed_password = bcrypt::hash(new_user.password, bcrypt::DEFAULT_COST)?;

    let res = sqlx::query(
        "INSERT INTO users (username, password, role, display_name, grade, semester)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(new_user.username)
    .bind(hashed_password)
    .bind(new_user.role.as_str())
    .bind(new_user.display_name)
    .bind(new_user.grade)
    .bind(new_user.semester)
    .execute(pool)
    .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool, password))]
pub async fn authenticate_user(
    pool: &Pool<Sqlite>,
    username: &str,
    password: &str,
) -> Result<Option<User>, AppError> {
    info!("Authenticating user");

    let hash = sqlx::query_scalar::<_, String>("SELECT password FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await?;

    let Some(hash) = hash else {
        return Ok(None);
    };

    if !bcrypt::verify(password, &hash)? {
        return Ok(None);
    }

    find_user_by_username(pool, username).await
}

#[instrument(skip(pool, token))]
pub async fn create_user_session(
    pool: &Pool<Sqlite>,
    user_id: i64,
    token: &str,
    expires_at: NaiveDateTime,
) -> Result<i64, AppError> {
    info!("Creating user session");

    let res = sqlx::query("INSERT INTO user_sessions (user_id, token, expires_at) VALUES (?, ?, ?)")
        .bind(user_id)
        .bind(token)
        .bind(expires_at)
        .execute(pool)
        .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool, token))]
pub async fn get_session_by_token(
    pool: &Pool<Sqlite>,
    token: &str,
) -> Result<UserSession, AppError> {
    info!("Getting session by token");

    let session = sqlx::query_as::<_, DbUserSession>(
        "SELECT id, user_id, token, created_at, expires_at FROM user_sessions WHERE token = ?",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;

    match session {
        Some(session) => Ok(UserSession::from(session)),
        _ => Err(AppError::Authentication(
            "Invalid session token".to_string(),
        )),
    }
}

#[instrument(skip(pool, token))]
pub async fn invalidate_session(pool: &Pool<Sqlite>, token: &str) -> Result<(), AppError> {
    info!("Invalidating session");

    sqlx::query("DELETE FROM user_sessions WHERE token = ?")
        .bind(token)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument(skip(pool))]
pub async fn clean_expired_sessions(pool: &Pool<Sqlite>) -> Result<u64, AppError> {
    info!("Cleaning expired sessions");

    let now = Utc::now().naive_utc();

    let result = sqlx::query("DELETE FROM user_sessions WHERE expires_at < ?")
        .bind(now)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

#[instrument(skip(pool))]
pub async fn get_daily_session(
    pool: &Pool<Sqlite>,
    user_id: i64,
    date: NaiveDate,
) -> Result<Option<DailySessionRecord>, AppError> {
    info!("Getting daily session");

    let row = sqlx::query_as::<_, DbDailySession>(&format!(
        "SELECT {} FROM daily_sessions WHERE user_id = ? AND date = ?",
        DAILY_SESSION_COLUMNS
    ))
    .bind(user_id)
    .bind(date)
    .fetch_optional(pool)
    .await?;

    row.map(DailySessionRecord::try_from).transpose()
}

/// Inserts the day's session unless one already exists, and returns the stored row.
#[instrument(skip(pool, content))]
pub async fn create_daily_session(
    pool: &Pool<Sqlite>,
    user_id: i64,
    date: NaiveDate,
    content: &DailyContent,
) -> Result<DailySessionRecord, AppError> {
    info!("Creating daily session");

    let tally = SessionTally::of(content);

    sqlx::query(
        "INSERT INTO daily_sessions
         (user_id, date, status, passages_data, grammar_questions_data, total_questions)
         VALUES (?, ?, ?, ?, ?, ?)
         ON CONFLICT (user_id, date) DO NOTHING",
    )
    .bind(user_id)
    .bind(date)
    .bind(SessionStatus::NotStarted.as_str())
    .bind(content.passages_json()?)
    .bind(content.grammar_questions_json()?)
    .bind(tally.total_questions)
    .execute(pool)
    .await?;

    get_daily_session(pool, user_id, date).await?.ok_or_else(|| {
        AppError::Internal(format!(
            "Daily session for user {} on {} vanished after insert",
            user_id, date
        ))
    })
}

/// Writes back the answer state, counters and rewards of a session.
///
/// The write only lands when the row is still at `session.revision` and not
/// completed; otherwise another answer got there first and `Conflict` is returned.
/// Returns the new revision.
pub async fn save_session_progress(
    conn: &mut SqliteConnection,
    session: &DailySessionRecord,
) -> Result<i64, AppError> {
    let res = sqlx::query(
        "UPDATE daily_sessions
         SET status = ?, passages_data = ?, grammar_questions_data = ?, total_questions = ?,
             correct_count = ?, attempted_count = ?, elapsed_seconds = ?, xp_earned = ?,
             coins_earned = ?, completed_at = ?, revision = revision + 1
         WHERE id = ? AND revision = ? AND status != ?",
    )
    .bind(session.status.as_str())
    .bind(session.content.passages_json()?)
    .bind(session.content.grammar_questions_json()?)
    .bind(session.tally.total_questions)
    .bind(session.tally.correct_count)
    .bind(session.tally.attempted_count)
    .bind(session.elapsed_seconds)
    .bind(session.xp_earned)
    .bind(session.coins_earned)
    .bind(session.completed_at.map(|dt| dt.naive_utc()))
    .bind(session.id)
    .bind(session.revision)
    .bind(SessionStatus::Completed.as_str())
    .execute(&mut *conn)
    .await?;

    if res.rows_affected() != 1 {
        return Err(AppError::Conflict(format!(
            "Session {} changed since it was read; reload and try again",
            session.id
        )));
    }

    Ok(session.revision + 1)
}

#[instrument(skip(pool))]
pub async fn get_recent_sessions(
    pool: &Pool<Sqlite>,
    user_id: i64,
    limit: i64,
) -> Result<Vec<DbDailySession>, AppError> {
    info!("Getting recent sessions");

    let rows = sqlx::query_as::<_, DbDailySession>(&format!(
        "SELECT {} FROM daily_sessions
         WHERE user_id = ?
         ORDER BY date DESC
         LIMIT ?",
        DAILY_SESSION_COLUMNS
    ))
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

#[instrument(skip(pool))]
pub async fn get_completed_dates(
    pool: &Pool<Sqlite>,
    user_id: i64,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<NaiveDate>, AppError> {
    info!("Getting completed session dates");

    let dates = sqlx::query_scalar::<_, NaiveDate>(
        "SELECT date FROM daily_sessions
         WHERE user_id = ? AND status = ? AND date BETWEEN ? AND ?
         ORDER BY date",
    )
    .bind(user_id)
    .bind(SessionStatus::Completed.as_str())
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await?;

    Ok(dates)
}

/// Counter changes applied to a user row in one statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserProgressUpdate {
    pub xp_delta: i64,
    pub coins_delta: i64,
    pub streak_count: Option<i64>,
    pub last_completed_date: Option<NaiveDate>,
    pub sessions_completed_delta: i64,
    pub answered_delta: i64,
    pub correct_delta: i64,
    pub first_try_delta: i64,
}

pub async fn apply_user_progress(
    conn: &mut SqliteConnection,
    user_id: i64,
    update: &UserProgressUpdate,
) -> Result<(), AppError> {
    // Right-hand sides see the row before the update, so the level uses xp + delta.
    sqlx::query(
        "UPDATE users
         SET xp = xp + ?,
             level = 1 + (xp + ?) / ?,
             coins = coins + ?,
             streak_count = COALESCE(?, streak_count),
             last_completed_date = COALESCE(?, last_completed_date),
             sessions_completed = sessions_completed + ?,
             total_answered = total_answered + ?,
             total_correct = total_correct + ?,
             first_try_correct = first_try_correct + ?
         WHERE id = ?",
    )
    .bind(update.xp_delta)
    .bind(update.xp_delta)
    .bind(XP_PER_LEVEL)
    .bind(update.coins_delta)
    .bind(update.streak_count)
    .bind(update.last_completed_date)
    .bind(update.sessions_completed_delta)
    .bind(update.answered_delta)
    .bind(update.correct_delta)
    .bind(update.first_try_delta)
    .bind(user_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Returns false when the badge was already unlocked.
pub async fn unlock_badge(
    conn: &mut SqliteConnection,
    user_id: i64,
    badge_id: &str,
) -> Result<bool, AppError> {
    let res = sqlx::query("INSERT OR IGNORE INTO user_badges (user_id, badge_id) VALUES (?, ?)")
        .bind(user_id)
        .bind(badge_id)
        .execute(&mut *conn)
        .await?;

    Ok(res.rows_affected() > 0)
}

#[instrument(skip(pool))]
pub async fn get_user_badges(
    pool: &Pool<Sqlite>,
    user_id: i64,
) -> Result<Vec<UnlockedBadge>, AppError> {
    info!("Getting user badges");
    fetch_user_badges(pool, user_id).await
}

pub async fn get_user_badges_in(
    conn: &mut SqliteConnection,
    user_id: i64,
) -> Result<Vec<UnlockedBadge>, AppError> {
    fetch_user_badges(&mut *conn, user_id).await
}

async fn fetch_user_badges<'e, E>(executor: E, user_id: i64) -> Result<Vec<UnlockedBadge>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query_as::<_, DbUserBadge>(
        "SELECT badge_id, unlocked_at FROM user_badges
         WHERE user_id = ?
         ORDER BY unlocked_at, badge_id",
    )
    .bind(user_id)
    .fetch_all(executor)
    .await?;

    Ok(rows.into_iter().map(UnlockedBadge::from).collect())
}

const PERIOD_XP_SELECT: &str = "SELECT u.id AS user_id, u.username, u.display_name, u.avatar,
            u.level, u.streak_count, COALESCE(SUM(s.xp_earned), 0) AS period_xp
     FROM users u
     LEFT JOIN daily_sessions s
       ON s.user_id = u.id AND s.date BETWEEN ? AND ?
     WHERE u.role = 'student'
     GROUP BY u.id";

#[instrument(skip(pool))]
pub async fn get_leaderboard_rows(
    pool: &Pool<Sqlite>,
    from: NaiveDate,
    to: NaiveDate,
    limit: i64,
) -> Result<Vec<LeaderboardRow>, AppError> {
    info!("Getting leaderboard rows");

    let rows = sqlx::query_as::<_, DbLeaderboardRow>(&format!(
        "{} ORDER BY period_xp DESC, u.id ASC LIMIT ?",
        PERIOD_XP_SELECT
    ))
    .bind(from)
    .bind(to)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(LeaderboardRow::from).collect())
}

/// The user's row for the window plus their competition rank among students.
#[instrument(skip(pool))]
pub async fn get_leaderboard_standing(
    pool: &Pool<Sqlite>,
    user_id: i64,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Option<(i64, LeaderboardRow)>, AppError> {
    info!("Getting leaderboard standing");

    let row = sqlx::query_as::<_, DbLeaderboardRow>(&format!(
        "SELECT * FROM ({}) WHERE user_id = ?",
        PERIOD_XP_SELECT
    ))
    .bind(from)
    .bind(to)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row.map(LeaderboardRow::from) else {
        return Ok(None);
    };

    let ahead = sqlx::query_scalar::<_, i64>(&format!(
        "SELECT COUNT(*) FROM ({}) WHERE period_xp > ?",
        PERIOD_XP_SELECT
    ))
    .bind(from)
    .bind(to)
    .bind(row.period_xp)
    .fetch_one(pool)
    .await?;

    Ok(Some((ahead + 1, row)))
}

#[instrument(skip(pool))]
pub async fn link_child(
    pool: &Pool<Sqlite>,
    parent_id: i64,
    child_id: i64,
) -> Result<bool, AppError> {
    info!("Linking child to parent");

    let res = sqlx::query("INSERT OR IGNORE INTO parent_links (parent_id, child_id) VALUES (?, ?)")
        .bind(parent_id)
        .bind(child_id)
        .execute(pool)
        .await?;

    Ok(res.rows_affected() > 0)
}

#[instrument(skip(pool))]
pub async fn get_children(pool: &Pool<Sqlite>, parent_id: i64) -> Result<Vec<User>, AppError> {
    info!("Getting linked children");

    let columns = USER_COLUMNS
        .split(", ")
        .map(|c| format!("u.{}", c.trim()))
        .collect::<Vec<_>>()
        .join(", ");

    let rows = sqlx::query_as::<_, DbUser>(&format!(
        "SELECT {} FROM users u
         JOIN parent_links p ON p.child_id = u.id
         WHERE p.parent_id = ?
         ORDER BY u.id",
        columns
    ))
    .bind(parent_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(User::try_from).collect()
}
