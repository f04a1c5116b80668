//! Turns sequencer outcomes into persisted session state and user rewards.

use std::collections::HashSet;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::auth::User;
use crate::db::{
    UserProgressUpdate, apply_user_progress, get_user_badges_in, get_user_in,
    save_session_progress, unlock_badge,
};
use crate::env::RewardConfig;
use crate::error::AppError;
use crate::models::DailySessionRecord;
use crate::quiz::achievements::{self, Achievement, ProgressSnapshot};
use crate::quiz::{
    AnswerOutcome, Cursor, QuizSequencer, Section, SessionStatus, SessionTally, level_for_xp,
    next_streak,
};

/// What the student submitted for the question under the cursor.
#[derive(Debug, Clone, Copy)]
pub struct Submission {
    pub section: Section,
    pub question_index: usize,
    pub answer: usize,
    pub elapsed_seconds: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerResult {
    pub correct: bool,
    pub attempts: u32,
    pub xp_awarded: i64,
    pub coins_awarded: i64,
    pub explanation: Option<String>,
    pub wrong_explanation: Option<String>,
    pub next: Option<Cursor>,
    pub session_completed: bool,
    pub completion_bonus_xp: i64,
    pub completion_bonus_coins: i64,
    pub new_badges: Vec<&'static Achievement>,
}

/// Rewards and counters owed when a session is finished.
#[derive(Debug, Clone)]
pub struct CompletionPlan {
    pub update: UserProgressUpdate,
    pub bonus_xp: i64,
    pub bonus_coins: i64,
    pub badges: Vec<&'static Achievement>,
}

/// `answer_xp` is the XP of the finishing answer, not yet stored on the user.
///
/// Badge XP can lift the level, so the catalog is re-checked until no further
/// badge unlocks.
pub fn plan_completion(
    user: &User,
    tally: &SessionTally,
    answer_xp: i64,
    today: NaiveDate,
    rewards: &RewardConfig,
    unlocked: &HashSet<String>,
) -> CompletionPlan {
    let streak = next_streak(user.streak_count, user.last_completed_date, today);
    let mut xp = user.xp + answer_xp + rewards.completion_bonus_xp;
    let mut snapshot = ProgressSnapshot {
        sessions_completed: user.sessions_completed + 1,
        streak,
        total_correct: user.total_correct + tally.correct_count,
        level: level_for_xp(xp),
        last_session_perfect: tally.is_perfect(),
    };

    let mut seen = unlocked.clone();
    let mut badges: Vec<&'static Achievement> = Vec::new();
    loop {
        let fresh = achievements::newly_unlocked(&snapshot, &seen);
        if fresh.is_empty() {
            break;
        }
        for badge in fresh {
            xp += badge.xp_reward;
            seen.insert(badge.id.to_string());
            badges.push(badge);
        }
        snapshot.level = level_for_xp(xp);
    }

    let badge_xp: i64 = badges.iter().map(|b| b.xp_reward).sum();
    let badge_coins: i64 = badges.iter().map(|b| b.coin_reward).sum();

    CompletionPlan {
        update: UserProgressUpdate {
            xp_delta: rewards.completion_bonus_xp + badge_xp,
            coins_delta: rewards.completion_bonus_coins + badge_coins,
            streak_count: Some(streak),
            last_completed_date: Some(today),
            sessions_completed_delta: 1,
            answered_delta: tally.attempted_count,
            correct_delta: tally.correct_count,
            first_try_delta: tally.first_try_correct,
        },
        bonus_xp: rewards.completion_bonus_xp,
        bonus_coins: rewards.completion_bonus_coins,
        badges,
    }
}

/// Applies one answer to today's session and persists everything it changes
/// in a single transaction.
#[instrument(skip(pool, user, session, rewards), fields(user_id = user.id, session_id = session.id))]
pub async fn submit_answer(
    pool: &Pool<Sqlite>,
    user: &User,
    mut session: DailySessionRecord,
    submission: Submission,
    today: NaiveDate,
    rewards: &RewardConfig,
) -> Result<(AnswerResult, DailySessionRecord), AppError> {
    if session.status == SessionStatus::Completed {
        return Err(AppError::Validation(
            "Today's session is already completed".to_string(),
        ));
    }

    let mut sequencer = QuizSequencer::resume(session.content.clone());
    let expected = sequencer
        .cursor()
        .ok_or_else(|| AppError::Validation("Session has no open questions".to_string()))?;

    if expected.section != submission.section || expected.question_index != submission.question_index {
        return Err(AppError::Validation(format!(
            "Question {}#{} is not the current question ({}#{})",
            submission.section, submission.question_index, expected.section, expected.question_index
        )));
    }

    let explanation = sequencer
        .current_question()
        .map(|q| q.explanation.clone())
        .filter(|text| !text.is_empty());

    let outcome = sequencer.answer(submission.answer)?;
    session.content = sequencer.into_content();
    session.tally = SessionTally::of(&session.content);
    if session.status == SessionStatus::NotStarted {
        session.status = SessionStatus::InProgress;
    }
    if let Some(elapsed) = submission.elapsed_seconds {
        session.elapsed_seconds = session.elapsed_seconds.max(elapsed.max(0));
    }

    let mut result = AnswerResult {
        correct: false,
        attempts: 0,
        xp_awarded: 0,
        coins_awarded: 0,
        explanation: None,
        wrong_explanation: None,
        next: Some(expected),
        session_completed: false,
        completion_bonus_xp: 0,
        completion_bonus_coins: 0,
        new_badges: Vec::new(),
    };

    let mut answer_update = UserProgressUpdate::default();
    let mut answer_xp = 0;

    match outcome {
        AnswerOutcome::Incorrect {
            attempts,
            wrong_explanation,
        } => {
            result.attempts = attempts;
            result.wrong_explanation = wrong_explanation;
        }
        AnswerOutcome::Correct {
            xp_awarded,
            attempts,
            next,
            session_completed,
        } => {
            result.correct = true;
            result.attempts = attempts;
            result.xp_awarded = xp_awarded;
            result.coins_awarded = rewards.coins_per_correct;
            result.explanation = explanation;
            result.next = next;
            result.session_completed = session_completed;

            answer_xp = xp_awarded;
            session.xp_earned += xp_awarded;
            session.coins_earned += rewards.coins_per_correct;
            answer_update.xp_delta = xp_awarded;
            answer_update.coins_delta = rewards.coins_per_correct;

            if session_completed {
                session.status = SessionStatus::Completed;
                session.completed_at = Some(Utc::now());
                session.xp_earned += rewards.completion_bonus_xp;
                session.coins_earned += rewards.completion_bonus_coins;
            }
        }
    }

    let mut tx = pool.begin().await?;

    // Claims the row first; a stale read loses here before any reward is paid.
    session.revision = save_session_progress(&mut tx, &session).await?;

    if result.session_completed {
        let fresh_user = get_user_in(&mut tx, user.id).await?;
        let unlocked: HashSet<String> = get_user_badges_in(&mut tx, user.id)
            .await?
            .into_iter()
            .map(|b| b.badge_id)
            .collect();
        let plan = plan_completion(
            &fresh_user,
            &session.tally,
            answer_xp,
            today,
            rewards,
            &unlocked,
        );

        result.completion_bonus_xp = plan.bonus_xp;
        result.completion_bonus_coins = plan.bonus_coins;

        apply_user_progress(&mut tx, user.id, &answer_update).await?;
        apply_user_progress(&mut tx, user.id, &plan.update).await?;
        for badge in &plan.badges {
            if unlock_badge(&mut tx, user.id, badge.id).await? {
                result.new_badges.push(badge);
            }
        }
        info!(
            badges = result.new_badges.len(),
            xp = session.xp_earned,
            "Daily session completed"
        );
    } else if answer_update != UserProgressUpdate::default() {
        apply_user_progress(&mut tx, user.id, &answer_update).await?;
    }

    tx.commit().await?;

    Ok((result, session))
}
