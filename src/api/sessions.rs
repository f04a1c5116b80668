use chrono::NaiveDate;
use rocket::State;
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};
use tracing::warn;

use crate::auth::{Permission, User};
use crate::db::{create_daily_session, get_completed_dates, get_daily_session, get_recent_sessions};
use crate::env::AppConfig;
use crate::error::AppError;
use crate::models::DailySessionRecord;
use crate::progress::{AnswerResult, Submission, submit_answer};
use crate::quiz::{
    ContentProvider, ContentRequest, Cursor, Domain, PassageType, QuizSequencer, Section,
    SectionProgress, SessionQuestion, SessionStatus, WrongAnswerNote, extract_notes,
    week_completion, week_window,
};

const DEFAULT_GRADE: i64 = 3;
const DEFAULT_SEMESTER: i64 = 1;

/// A question as the student sees it. The answer key and explanation are
/// only revealed once the question is solved.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub id: String,
    pub question: String,
    pub options: Vec<String>,
    pub attempts: u32,
    pub student_answer: Option<usize>,
    pub is_correct: Option<bool>,
    pub correct_answer: Option<usize>,
    pub explanation: Option<String>,
}

impl From<&SessionQuestion> for QuestionView {
    fn from(q: &SessionQuestion) -> Self {
        let solved = q.is_solved();
        Self {
            id: q.id.clone(),
            question: q.question.clone(),
            options: q.options.clone(),
            attempts: q.attempts,
            student_answer: q.student_answer,
            is_correct: q.is_correct,
            correct_answer: solved.then_some(q.correct_answer),
            explanation: solved.then(|| q.explanation.clone()),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PassageView {
    pub id: String,
    #[serde(rename = "type")]
    pub passage_type: PassageType,
    pub title: String,
    pub author: Option<String>,
    pub content: String,
    pub questions: Vec<QuestionView>,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub id: i64,
    pub date: NaiveDate,
    pub status: SessionStatus,
    pub passages: Vec<PassageView>,
    pub grammar_questions: Vec<QuestionView>,
    pub total_questions: i64,
    pub correct_count: i64,
    pub attempted_count: i64,
    pub elapsed_seconds: i64,
    pub xp_earned: i64,
    pub coins_earned: i64,
    pub current: Option<Cursor>,
    pub sections: Vec<SectionProgress>,
}

impl From<&DailySessionRecord> for SessionView {
    fn from(record: &DailySessionRecord) -> Self {
        let sequencer = QuizSequencer::resume(record.content.clone());
        Self {
            id: record.id,
            date: record.date,
            status: record.status,
            passages: record
                .content
                .passages
                .iter()
                .map(|p| PassageView {
                    id: p.id.clone(),
                    passage_type: p.passage_type,
                    title: p.title.clone(),
                    author: p.author.clone(),
                    content: p.content.clone(),
                    questions: p.questions.iter().map(QuestionView::from).collect(),
                })
                .collect(),
            grammar_questions: record
                .content
                .grammar_questions
                .iter()
                .map(QuestionView::from)
                .collect(),
            total_questions: record.tally.total_questions,
            correct_count: record.tally.correct_count,
            attempted_count: record.tally.attempted_count,
            elapsed_seconds: record.elapsed_seconds,
            xp_earned: record.xp_earned,
            coins_earned: record.coins_earned,
            current: sequencer.cursor(),
            sections: sequencer.section_progress(),
        }
    }
}

#[derive(Serialize)]
pub struct TodaySessionResponse {
    pub success: bool,
    pub session: SessionView,
}

/// Today's session, generating it on first request of the day.
pub async fn load_or_create_today(
    db: &Pool<Sqlite>,
    provider: &ContentProvider,
    user: &User,
    today: NaiveDate,
) -> Result<DailySessionRecord, AppError> {
    if let Some(existing) = get_daily_session(db, user.id, today).await? {
        return Ok(existing);
    }

    let request = ContentRequest {
        grade: user.grade.unwrap_or(DEFAULT_GRADE),
        semester: user.semester.unwrap_or(DEFAULT_SEMESTER),
        date: today,
    };
    let mut content = provider.daily_content(&request).await;
    content.reset_progress();

    create_daily_session(db, user.id, today, &content).await
}

#[get("/sessions/today")]
pub async fn api_get_today_session(
    user: User,
    db: &State<Pool<Sqlite>>,
    config: &State<AppConfig>,
    provider: &State<ContentProvider>,
) -> Result<Json<TodaySessionResponse>, AppError> {
    user.require_permission(Permission::PlayDailySession)?;

    let session = load_or_create_today(db, provider, &user, config.today()).await?;

    Ok(Json(TodaySessionResponse {
        success: true,
        session: SessionView::from(&session),
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRequest {
    pub section: Section,
    pub question_index: usize,
    pub answer: usize,
    pub elapsed_seconds: Option<i64>,
}

#[derive(Serialize)]
pub struct AnswerResponse {
    pub success: bool,
    pub result: AnswerResult,
    pub session: SessionView,
}

#[post("/sessions/today/answer", data = "<request>")]
pub async fn api_submit_answer(
    request: Json<AnswerRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
    config: &State<AppConfig>,
) -> Result<Json<AnswerResponse>, AppError> {
    user.require_permission(Permission::PlayDailySession)?;

    let today = config.today();
    let session = get_daily_session(db, user.id, today)
        .await?
        .ok_or_else(|| AppError::NotFound("No session has been started today".to_string()))?;

    let submission = Submission {
        section: request.section,
        question_index: request.question_index,
        answer: request.answer,
        elapsed_seconds: request.elapsed_seconds,
    };

    let (result, session) =
        submit_answer(db, &user, session, submission, today, &config.rewards).await?;

    Ok(Json(AnswerResponse {
        success: true,
        result,
        session: SessionView::from(&session),
    }))
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyResponse {
    pub success: bool,
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub days: [bool; 7],
}

pub async fn weekly_completion(
    db: &Pool<Sqlite>,
    user_id: i64,
    today: NaiveDate,
) -> Result<(NaiveDate, NaiveDate, [bool; 7]), AppError> {
    let (monday, sunday) = week_window(today);
    let dates = get_completed_dates(db, user_id, monday, sunday).await?;
    Ok((monday, sunday, week_completion(today, &dates)))
}

#[get("/sessions/weekly")]
pub async fn api_get_weekly(
    user: User,
    db: &State<Pool<Sqlite>>,
    config: &State<AppConfig>,
) -> Result<Json<WeeklyResponse>, AppError> {
    let (week_start, week_end, days) = weekly_completion(db, user.id, config.today()).await?;

    Ok(Json(WeeklyResponse {
        success: true,
        week_start,
        week_end,
        days,
    }))
}

#[derive(Serialize)]
pub struct WrongNotesResponse {
    pub success: bool,
    pub total: usize,
    pub notes: Vec<WrongAnswerNote>,
}

/// Notes from the user's most recent sessions. Rows whose JSON cannot be
/// read are skipped.
pub async fn collect_wrong_notes(
    db: &Pool<Sqlite>,
    user_id: i64,
    session_limit: i64,
) -> Result<Vec<WrongAnswerNote>, AppError> {
    let rows = get_recent_sessions(db, user_id, session_limit).await?;

    let mut notes = Vec::new();
    for row in rows {
        let session_id = row.id.unwrap_or_default();
        match row.content() {
            Ok(content) => {
                notes.extend(extract_notes(session_id, row.date.unwrap_or_default(), &content))
            }
            Err(e) => warn!(session_id, error = %e, "Skipping session with unreadable data"),
        }
    }

    Ok(notes)
}

#[get("/sessions/wrong-notes?<domain>")]
pub async fn api_get_wrong_notes(
    domain: Option<&str>,
    user: User,
    db: &State<Pool<Sqlite>>,
    config: &State<AppConfig>,
) -> Result<Json<WrongNotesResponse>, AppError> {
    user.require_permission(Permission::ViewOwnWrongNotes)?;

    let domain = match domain {
        None => None,
        Some("reading") => Some(Domain::Reading),
        Some("literature") => Some(Domain::Literature),
        Some("grammar") => Some(Domain::Grammar),
        Some(other) => {
            return Err(AppError::Validation(format!("Unknown domain: {}", other)));
        }
    };

    let notes: Vec<WrongAnswerNote> =
        collect_wrong_notes(db, user.id, config.wrong_notes_session_limit)
            .await?
            .into_iter()
            .filter(|note| domain.is_none_or(|d| note.domain == d))
            .collect();

    Ok(Json(WrongNotesResponse {
        success: true,
        total: notes.len(),
        notes,
    }))
}
