#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::NaiveDate;
    use rocket::tokio;

    use crate::auth::User;
    use crate::db::{create_daily_session, get_daily_session, get_user, get_user_badges};
    use crate::env::RewardConfig;
    use crate::error::AppError;
    use crate::progress::{Submission, plan_completion, submit_answer};
    use crate::quiz::{QuizSequencer, Section, SessionStatus, SessionTally};
    use crate::test::test_utils::{TestDb, create_standard_test_db, sample_content};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn student(test_db: &TestDb) -> User {
        get_user(&test_db.pool, test_db.user_id("student_user"))
            .await
            .unwrap()
    }

    /// Submits the correct answer for whatever question is under the cursor.
    async fn answer_current(
        test_db: &TestDb,
        day: NaiveDate,
        correct: bool,
    ) -> Result<crate::progress::AnswerResult, AppError> {
        let user = student(test_db).await;
        let session = get_daily_session(&test_db.pool, user.id, day)
            .await?
            .expect("session exists");
        let sequencer = QuizSequencer::resume(session.content.clone());
        let cursor = sequencer.cursor().expect("open question");
        let question = sequencer.current_question().expect("open question");
        let answer = if correct {
            question.correct_answer
        } else {
            (question.correct_answer + 1) % question.options.len()
        };

        let submission = Submission {
            section: cursor.section,
            question_index: cursor.question_index,
            answer,
            elapsed_seconds: Some(30),
        };
        let (result, _) = submit_answer(
            &test_db.pool,
            &user,
            session,
            submission,
            day,
            &RewardConfig::default(),
        )
        .await?;
        Ok(result)
    }

    #[test]
    fn test_plan_completion_for_first_session() {
        let user = User {
            id: 1,
            username: "student_user".to_string(),
            role: crate::auth::Role::Student,
            display_name: "Student".to_string(),
            avatar: None,
            grade: Some(3),
            semester: Some(1),
            xp: 50,
            level: 1,
            coins: 5,
            streak_count: 2,
            last_completed_date: Some(date(2025, 6, 3)),
            sessions_completed: 0,
            total_answered: 0,
            total_correct: 0,
            first_try_correct: 0,
        };
        let tally = SessionTally {
            total_questions: 6,
            correct_count: 6,
            attempted_count: 6,
            first_try_correct: 6,
        };

        let plan = plan_completion(
            &user,
            &tally,
            10,
            date(2025, 6, 4),
            &RewardConfig::default(),
            &HashSet::new(),
        );

        let badge_ids: Vec<&str> = plan.badges.iter().map(|b| b.id).collect();
        assert_eq!(badge_ids, vec!["first_step", "streak_3", "perfect_day"]);
        assert_eq!(plan.bonus_xp, 20);
        assert_eq!(plan.bonus_coins, 10);
        assert_eq!(plan.update.streak_count, Some(3));
        assert_eq!(plan.update.last_completed_date, Some(date(2025, 6, 4)));
        assert_eq!(plan.update.sessions_completed_delta, 1);
        assert_eq!(plan.update.xp_delta, 20 + 10 + 15 + 20);
        assert_eq!(plan.update.coins_delta, 10 + 5 + 10 + 15);
        assert_eq!(plan.update.first_try_delta, 6);
    }

    #[tokio::test]
    async fn test_full_session_rewards_user() {
        let test_db = create_standard_test_db().await;
        let user_id = test_db.user_id("student_user");
        let day = date(2025, 6, 4);
        create_daily_session(&test_db.pool, user_id, day, &sample_content())
            .await
            .unwrap();

        let wrong = answer_current(&test_db, day, false).await.unwrap();
        assert!(!wrong.correct);
        assert_eq!(wrong.attempts, 1);
        assert_eq!(wrong.xp_awarded, 0);
        assert!(wrong.wrong_explanation.is_some());
        assert!(wrong.explanation.is_none());

        let retry = answer_current(&test_db, day, true).await.unwrap();
        assert!(retry.correct);
        assert_eq!(retry.xp_awarded, 5);
        assert_eq!(retry.coins_awarded, 1);
        assert_eq!(retry.explanation.as_deref(), Some("Explanation nf-1"));

        let mut last = retry;
        for _ in 0..5 {
            last = answer_current(&test_db, day, true).await.unwrap();
            assert_eq!(last.xp_awarded, 10);
        }

        assert!(last.session_completed);
        assert_eq!(last.next, None);
        assert_eq!(last.completion_bonus_xp, 20);
        assert_eq!(last.completion_bonus_coins, 10);
        let badge_ids: Vec<&str> = last.new_badges.iter().map(|b| b.id).collect();
        assert_eq!(badge_ids, vec!["first_step"]);

        let session = get_daily_session(&test_db.pool, user_id, day)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(session.status, SessionStatus::Completed);
        assert!(session.completed_at.is_some());
        assert_eq!(session.xp_earned, 55 + 20);
        assert_eq!(session.coins_earned, 6 + 10);
        assert_eq!(session.elapsed_seconds, 30);
        assert_eq!(session.tally.correct_count, 6);

        let user = get_user(&test_db.pool, user_id).await.unwrap();
        assert_eq!(user.xp, 55 + 20 + 10);
        assert_eq!(user.coins, 6 + 10 + 5);
        assert_eq!(user.level, 1);
        assert_eq!(user.streak_count, 1);
        assert_eq!(user.last_completed_date, Some(day));
        assert_eq!(user.sessions_completed, 1);
        assert_eq!(user.total_answered, 6);
        assert_eq!(user.total_correct, 6);
        assert_eq!(user.first_try_correct, 5);

        let badges = get_user_badges(&test_db.pool, user_id).await.unwrap();
        assert_eq!(badges.len(), 1);
    }

    #[tokio::test]
    async fn test_completed_session_rejects_answers() {
        let test_db = create_standard_test_db().await;
        let user_id = test_db.user_id("student_user");
        let day = date(2025, 6, 4);
        create_daily_session(&test_db.pool, user_id, day, &sample_content())
            .await
            .unwrap();

        for _ in 0..6 {
            answer_current(&test_db, day, true).await.unwrap();
        }

        let user = student(&test_db).await;
        let session = get_daily_session(&test_db.pool, user_id, day)
            .await
            .unwrap()
            .unwrap();
        let result = submit_answer(
            &test_db.pool,
            &user,
            session,
            Submission {
                section: Section::Grammar,
                question_index: 1,
                answer: 0,
                elapsed_seconds: None,
            },
            day,
            &RewardConfig::default(),
        )
        .await;

        assert!(matches!(result, Err(AppError::Validation(_))));

        let user = get_user(&test_db.pool, user_id).await.unwrap();
        assert_eq!(user.sessions_completed, 1);
    }

    #[tokio::test]
    async fn test_answer_must_target_current_question() {
        let test_db = create_standard_test_db().await;
        let user_id = test_db.user_id("student_user");
        let day = date(2025, 6, 4);
        let session = create_daily_session(&test_db.pool, user_id, day, &sample_content())
            .await
            .unwrap();
        let user = student(&test_db).await;

        let result = submit_answer(
            &test_db.pool,
            &user,
            session,
            Submission {
                section: Section::Grammar,
                question_index: 0,
                answer: 1,
                elapsed_seconds: None,
            },
            day,
            &RewardConfig::default(),
        )
        .await;

        assert!(matches!(result, Err(AppError::Validation(_))));

        let stored = get_daily_session(&test_db.pool, user_id, day)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, SessionStatus::NotStarted);
        assert_eq!(stored.tally.attempted_count, 0);
    }

    #[tokio::test]
    async fn test_streak_continues_across_days() {
        let test_db = create_standard_test_db().await;
        let user_id = test_db.user_id("student_user");

        for day in [date(2025, 6, 3), date(2025, 6, 4)] {
            create_daily_session(&test_db.pool, user_id, day, &sample_content())
                .await
                .unwrap();
            for _ in 0..6 {
                answer_current(&test_db, day, true).await.unwrap();
            }
        }

        let user = get_user(&test_db.pool, user_id).await.unwrap();
        assert_eq!(user.streak_count, 2);
        assert_eq!(user.sessions_completed, 2);
        assert_eq!(user.last_completed_date, Some(date(2025, 6, 4)));

        let badges: Vec<String> = get_user_badges(&test_db.pool, user_id)
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.badge_id)
            .collect();
        assert!(badges.contains(&"first_step".to_string()));
        assert!(badges.contains(&"perfect_day".to_string()));
        assert_eq!(badges.len(), 2);
    }

    #[test]
    fn test_plan_completion_rechecks_level_after_badge_xp() {
        let user = User {
            id: 1,
            username: "student_user".to_string(),
            role: crate::auth::Role::Student,
            display_name: "Student".to_string(),
            avatar: None,
            grade: Some(3),
            semester: Some(1),
            xp: 360,
            level: 4,
            coins: 0,
            streak_count: 0,
            last_completed_date: None,
            sessions_completed: 0,
            total_answered: 0,
            total_correct: 0,
            first_try_correct: 0,
        };
        let tally = SessionTally {
            total_questions: 6,
            correct_count: 6,
            attempted_count: 6,
            first_try_correct: 5,
        };

        // 360 + 10 + 20 stays at level 4 until first_step adds its 10 XP.
        let plan = plan_completion(
            &user,
            &tally,
            10,
            date(2025, 6, 4),
            &RewardConfig::default(),
            &HashSet::new(),
        );

        let badge_ids: Vec<&str> = plan.badges.iter().map(|b| b.id).collect();
        assert_eq!(badge_ids, vec!["first_step", "level_5"]);
        assert_eq!(plan.update.xp_delta, 20 + 10);
        assert_eq!(plan.update.coins_delta, 10 + 5 + 50);
    }

    #[tokio::test]
    async fn test_stale_session_copy_cannot_complete_twice() {
        let test_db = create_standard_test_db().await;
        let user_id = test_db.user_id("student_user");
        let day = date(2025, 6, 4);
        create_daily_session(&test_db.pool, user_id, day, &sample_content())
            .await
            .unwrap();

        for _ in 0..5 {
            answer_current(&test_db, day, true).await.unwrap();
        }

        let user = student(&test_db).await;
        let loaded = get_daily_session(&test_db.pool, user_id, day)
            .await
            .unwrap()
            .unwrap();
        let duplicate = loaded.clone();

        let sequencer = QuizSequencer::resume(loaded.content.clone());
        let cursor = sequencer.cursor().unwrap();
        let submission = Submission {
            section: cursor.section,
            question_index: cursor.question_index,
            answer: sequencer.current_question().unwrap().correct_answer,
            elapsed_seconds: None,
        };

        let (first, _) = submit_answer(
            &test_db.pool,
            &user,
            loaded,
            submission,
            day,
            &RewardConfig::default(),
        )
        .await
        .unwrap();
        assert!(first.session_completed);

        let second = submit_answer(
            &test_db.pool,
            &user,
            duplicate,
            submission,
            day,
            &RewardConfig::default(),
        )
        .await;
        assert!(matches!(second, Err(AppError::Conflict(_))));

        let user = get_user(&test_db.pool, user_id).await.unwrap();
        assert_eq!(user.sessions_completed, 1);
        assert_eq!(user.total_correct, 6);
        // 6 x 10 per answer, 20 bonus, first_step 10, perfect_day 20.
        assert_eq!(user.xp, 60 + 20 + 10 + 20);
        assert_eq!(user.coins, 6 + 10 + 5 + 15);

        let session = get_daily_session(&test_db.pool, user_id, day)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(session.xp_earned, 60 + 20);
        assert_eq!(get_user_badges(&test_db.pool, user_id).await.unwrap().len(), 2);
    }
}
