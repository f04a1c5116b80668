#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate};
    use rocket::tokio;

    use crate::auth::Role;
    use crate::db::{
        NewUser, UserProgressUpdate, apply_user_progress, authenticate_user, create_daily_session,
        create_user, find_user_by_username, get_children, get_completed_dates, get_daily_session,
        get_leaderboard_rows, get_leaderboard_standing, get_recent_sessions, get_user,
        get_user_badges, link_child, save_session_progress, unlock_badge,
    };
    use crate::error::AppError;
    use crate::models::rank_rows;
    use crate::quiz::{QuizSequencer, SessionStatus, SessionTally, week_window};
    use crate::test::test_utils::{
        STANDARD_PASSWORD, TestDbBuilder, create_standard_test_db, sample_content, test_pool,
    };

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn set_session_xp(pool: &sqlx::SqlitePool, session_id: i64, xp: i64, status: &str) {
        sqlx::query("UPDATE daily_sessions SET xp_earned = ?, status = ? WHERE id = ?")
            .bind(xp)
            .bind(status)
            .bind(session_id)
            .execute(pool)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_create_and_find_user() {
        let pool = test_pool().await.unwrap();

        let id = create_user(
            &pool,
            NewUser {
                username: "reader",
                password: "password123",
                role: Role::Student,
                display_name: Some("Reader"),
                grade: Some(4),
                semester: Some(2),
            },
        )
        .await
        .unwrap();

        let user = get_user(&pool, id).await.unwrap();
        assert_eq!(user.username, "reader");
        assert_eq!(user.display_name, "Reader");
        assert_eq!(user.role, Role::Student);
        assert_eq!(user.grade, Some(4));
        assert_eq!(user.level, 1);
        assert_eq!(user.xp, 0);

        let found = find_user_by_username(&pool, "reader").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(id));
        assert!(find_user_by_username(&pool, "nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username_is_rejected() {
        let test_db = create_standard_test_db().await;

        let result = create_user(
            &test_db.pool,
            NewUser {
                username: "student_user",
                password: "password123",
                role: Role::Student,
                display_name: None,
                grade: Some(3),
                semester: Some(1),
            },
        )
        .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_authenticate_user() {
        let test_db = create_standard_test_db().await;

        let user = authenticate_user(&test_db.pool, "student_user", STANDARD_PASSWORD)
            .await
            .unwrap();
        assert_eq!(user.map(|u| u.username), Some("student_user".to_string()));

        assert!(
            authenticate_user(&test_db.pool, "student_user", "wrong_password")
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            authenticate_user(&test_db.pool, "ghost", STANDARD_PASSWORD)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_missing_user_is_not_found() {
        let pool = test_pool().await.unwrap();

        assert!(matches!(
            get_user(&pool, 404).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_daily_session_is_created_once_per_day() {
        let test_db = create_standard_test_db().await;
        let user_id = test_db.user_id("student_user");
        let day = date(2025, 6, 4);

        assert!(
            get_daily_session(&test_db.pool, user_id, day)
                .await
                .unwrap()
                .is_none()
        );

        let first = create_daily_session(&test_db.pool, user_id, day, &sample_content())
            .await
            .unwrap();
        assert_eq!(first.status, SessionStatus::NotStarted);
        assert_eq!(first.tally.total_questions, 6);
        assert_eq!(first.content, sample_content());

        let mut other = sample_content();
        other.grammar_questions.pop();
        let second = create_daily_session(&test_db.pool, user_id, day, &other)
            .await
            .unwrap();

        assert_eq!(second.id, first.id);
        assert_eq!(second.content, sample_content());
    }

    #[tokio::test]
    async fn test_save_session_progress_persists_answer_state() {
        let test_db = create_standard_test_db().await;
        let user_id = test_db.user_id("student_user");
        let day = date(2025, 6, 4);

        let mut session = create_daily_session(&test_db.pool, user_id, day, &sample_content())
            .await
            .unwrap();

        let mut sequencer = QuizSequencer::resume(session.content.clone());
        sequencer.answer(1).unwrap();
        sequencer.answer(0).unwrap();
        session.content = sequencer.into_content();
        session.tally = SessionTally::of(&session.content);
        session.status = SessionStatus::InProgress;
        session.xp_earned = 5;
        session.elapsed_seconds = 42;

        let mut conn = test_db.pool.acquire().await.unwrap();
        save_session_progress(&mut conn, &session).await.unwrap();
        drop(conn);

        let stored = get_daily_session(&test_db.pool, user_id, day)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(stored.status, SessionStatus::InProgress);
        assert_eq!(stored.content, session.content);
        assert_eq!(stored.tally.correct_count, 1);
        assert_eq!(stored.tally.attempted_count, 1);
        assert_eq!(stored.tally.first_try_correct, 0);
        assert_eq!(stored.xp_earned, 5);
        assert_eq!(stored.elapsed_seconds, 42);
    }

    #[tokio::test]
    async fn test_completed_dates_and_recent_sessions() {
        let test_db = create_standard_test_db().await;
        let user_id = test_db.user_id("student_user");
        let (monday, sunday) = week_window(date(2025, 6, 4));

        for offset in 0..3 {
            let session = create_daily_session(
                &test_db.pool,
                user_id,
                monday + Duration::days(offset),
                &sample_content(),
            )
            .await
            .unwrap();
            let status = if offset == 1 { "in_progress" } else { "completed" };
            set_session_xp(&test_db.pool, session.id, 10, status).await;
        }

        let dates = get_completed_dates(&test_db.pool, user_id, monday, sunday)
            .await
            .unwrap();
        assert_eq!(dates, vec![monday, monday + Duration::days(2)]);

        let recent = get_recent_sessions(&test_db.pool, user_id, 2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].date, Some(monday + Duration::days(2)));
        assert_eq!(recent[1].date, Some(monday + Duration::days(1)));
    }

    #[tokio::test]
    async fn test_apply_user_progress_updates_counters_and_level() {
        let test_db = create_standard_test_db().await;
        let user_id = test_db.user_id("student_user");
        let day = date(2025, 6, 4);

        let mut conn = test_db.pool.acquire().await.unwrap();
        apply_user_progress(
            &mut conn,
            user_id,
            &UserProgressUpdate {
                xp_delta: 95,
                coins_delta: 12,
                ..Default::default()
            },
        )
        .await
        .unwrap();
        apply_user_progress(
            &mut conn,
            user_id,
            &UserProgressUpdate {
                xp_delta: 10,
                streak_count: Some(3),
                last_completed_date: Some(day),
                sessions_completed_delta: 1,
                answered_delta: 6,
                correct_delta: 6,
                first_try_delta: 5,
                ..Default::default()
            },
        )
        .await
        .unwrap();
        drop(conn);

        let user = get_user(&test_db.pool, user_id).await.unwrap();
        assert_eq!(user.xp, 105);
        assert_eq!(user.level, 2);
        assert_eq!(user.coins, 12);
        assert_eq!(user.streak_count, 3);
        assert_eq!(user.last_completed_date, Some(day));
        assert_eq!(user.sessions_completed, 1);
        assert_eq!(user.total_answered, 6);
        assert_eq!(user.first_try_correct, 5);
        assert_eq!(user.accuracy(), 83.3);
    }

    #[tokio::test]
    async fn test_unlock_badge_is_idempotent() {
        let test_db = create_standard_test_db().await;
        let user_id = test_db.user_id("student_user");

        let mut conn = test_db.pool.acquire().await.unwrap();
        assert!(unlock_badge(&mut conn, user_id, "first_step").await.unwrap());
        assert!(!unlock_badge(&mut conn, user_id, "first_step").await.unwrap());
        assert!(unlock_badge(&mut conn, user_id, "streak_3").await.unwrap());
        drop(conn);

        let badges = get_user_badges(&test_db.pool, user_id).await.unwrap();
        let ids: Vec<&str> = badges.iter().map(|b| b.badge_id.as_str()).collect();
        assert_eq!(ids, vec!["first_step", "streak_3"]);
    }

    #[tokio::test]
    async fn test_leaderboard_sums_period_xp_for_students() {
        let test_db = TestDbBuilder::new()
            .student("ari", Some("Ari"))
            .student("bora", Some("Bora"))
            .student("chan", Some("Chan"))
            .student("dami", Some("Dami"))
            .parent("parent_user", None)
            .build()
            .await
            .unwrap();
        let (monday, sunday) = week_window(date(2025, 6, 4));

        let seed = [
            ("ari", monday, 30),
            ("ari", monday + Duration::days(1), 15),
            ("bora", monday, 45),
            ("chan", monday, 20),
            ("chan", monday - Duration::days(1), 500),
        ];
        for (username, day, xp) in seed {
            let session = create_daily_session(
                &test_db.pool,
                test_db.user_id(username),
                day,
                &sample_content(),
            )
            .await
            .unwrap();
            set_session_xp(&test_db.pool, session.id, xp, "completed").await;
        }

        let rows = get_leaderboard_rows(&test_db.pool, monday, sunday, 10)
            .await
            .unwrap();
        let entries = rank_rows(rows);

        let table: Vec<(&str, i64, i64)> = entries
            .iter()
            .map(|e| (e.display_name.as_str(), e.rank, e.xp))
            .collect();
        assert_eq!(
            table,
            vec![("Ari", 1, 45), ("Bora", 1, 45), ("Chan", 3, 20), ("Dami", 4, 0)]
        );

        let limited = get_leaderboard_rows(&test_db.pool, monday, sunday, 2)
            .await
            .unwrap();
        assert_eq!(limited.len(), 2);

        let (rank, row) = get_leaderboard_standing(
            &test_db.pool,
            test_db.user_id("chan"),
            monday,
            sunday,
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(rank, 3);
        assert_eq!(row.period_xp, 20);

        assert!(
            get_leaderboard_standing(
                &test_db.pool,
                test_db.user_id("parent_user"),
                monday,
                sunday
            )
            .await
            .unwrap()
            .is_none()
        );
    }

    #[tokio::test]
    async fn test_parent_links() {
        let test_db = create_standard_test_db().await;
        let parent_id = test_db.user_id("parent_user");
        let child_id = test_db.user_id("student_user");

        assert!(get_children(&test_db.pool, parent_id).await.unwrap().is_empty());

        assert!(link_child(&test_db.pool, parent_id, child_id).await.unwrap());
        assert!(!link_child(&test_db.pool, parent_id, child_id).await.unwrap());

        let children = get_children(&test_db.pool, parent_id).await.unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].username, "student_user");
    }

    #[tokio::test]
    async fn test_save_session_progress_rejects_stale_revision() {
        let test_db = create_standard_test_db().await;
        let user_id = test_db.user_id("student_user");
        let day = date(2025, 6, 4);

        let session = create_daily_session(&test_db.pool, user_id, day, &sample_content())
            .await
            .unwrap();
        assert_eq!(session.revision, 0);

        let mut first = session.clone();
        first.xp_earned = 10;
        let mut conn = test_db.pool.acquire().await.unwrap();
        assert_eq!(save_session_progress(&mut conn, &first).await.unwrap(), 1);

        let mut stale = session;
        stale.xp_earned = 99;
        assert!(matches!(
            save_session_progress(&mut conn, &stale).await,
            Err(AppError::Conflict(_))
        ));
        drop(conn);

        let stored = get_daily_session(&test_db.pool, user_id, day)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.xp_earned, 10);
        assert_eq!(stored.revision, 1);
    }
}
