#[cfg(test)]
pub mod test_utils {
    use crate::auth::Role;
    use crate::db::{NewUser, create_user};
    use crate::env::AppConfig;
    use crate::error::AppError;
    use crate::init_rocket;
    use crate::quiz::{
        ContentProvider, ContentRequest, DailyContent, FallbackContent, Passage, PassageType,
        SessionQuestion,
    };
    use chrono::NaiveDate;
    use rocket::http::{ContentType, Cookie, Status};
    use rocket::local::asynchronous::Client;
    use serde_json::json;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::{Pool, Sqlite};
    use std::collections::HashMap;
    use std::sync::Once;
    use tracing::log::LevelFilter;

    static INIT: Once = Once::new();
    pub static STANDARD_PASSWORD: &str = "password123";

    #[derive(Default)]
    pub struct TestDbBuilder {
        users: Vec<TestUser>,
        links: Vec<(String, String)>,
    }

    pub struct TestUser {
        pub username: String,
        pub display_name: Option<String>,
        pub role: Role,
        pub grade: Option<i64>,
        pub semester: Option<i64>,
    }

    impl TestDbBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn student(mut self, username: &str, display_name: Option<&str>) -> Self {
            self.users.push(TestUser {
                username: username.to_string(),
                display_name: display_name.map(String::from),
                role: Role::Student,
                grade: Some(3),
                semester: Some(1),
            });
            self
        }

        pub fn parent(mut self, username: &str, display_name: Option<&str>) -> Self {
            self.users.push(TestUser {
                username: username.to_string(),
                display_name: display_name.map(String::from),
                role: Role::Parent,
                grade: None,
                semester: None,
            });
            self
        }

        pub fn link(mut self, parent_username: &str, child_username: &str) -> Self {
            self.links
                .push((parent_username.to_string(), child_username.to_string()));
            self
        }

        pub async fn build(self) -> Result<TestDb, AppError> {
            let pool = test_pool().await?;

            let mut user_id_map: HashMap<String, i64> = HashMap::new();

            for user in &self.users {
                let user_id = create_user(
                    &pool,
                    NewUser {
                        username: &user.username,
                        password: STANDARD_PASSWORD,
                        role: user.role,
                        display_name: user.display_name.as_deref(),
                        grade: user.grade,
                        semester: user.semester,
                    },
                )
                .await?;

                user_id_map.insert(user.username.clone(), user_id);
            }

            for (parent, child) in &self.links {
                if let (Some(&parent_id), Some(&child_id)) =
                    (user_id_map.get(parent), user_id_map.get(child))
                {
                    crate::db::link_child(&pool, parent_id, child_id).await?;
                }
            }

            Ok(TestDb { pool, user_id_map })
        }
    }

    #[derive(Clone)]
    pub struct TestDb {
        pub pool: Pool<Sqlite>,
        pub user_id_map: HashMap<String, i64>,
    }

    impl TestDb {
        pub fn user_id(&self, username: &str) -> i64 {
            self.user_id_map
                .get(username)
                .copied()
                .unwrap_or_else(|| panic!("No test user named {}", username))
        }
    }

    /// Fresh in-memory database with migrations applied. A single connection
    /// keeps every query on the same in-memory database.
    pub async fn test_pool() -> Result<Pool<Sqlite>, AppError> {
        INIT.call_once(|| {
            let _ = env_logger::builder()
                .filter_level(LevelFilter::Debug)
                .is_test(true)
                .try_init();
        });

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(pool)
    }

    pub async fn create_standard_test_db() -> TestDb {
        TestDbBuilder::new()
            .student("student_user", Some("Student User"))
            .student("other_student", Some("Other Student"))
            .parent("parent_user", Some("Parent User"))
            .build()
            .await
            .expect("Failed to build test database")
    }

    pub async fn setup_test_client(test_db: TestDb) -> (Client, TestDb) {
        setup_test_client_with(test_db, ContentProvider::fallback_only()).await
    }

    pub async fn setup_test_client_with(
        test_db: TestDb,
        provider: ContentProvider,
    ) -> (Client, TestDb) {
        let rocket = init_rocket(test_db.pool.clone(), AppConfig::default(), provider);
        let client = Client::untracked(rocket)
            .await
            .expect("Failed to build rocket client");
        (client, test_db)
    }

    /// Logs in through the API and returns the session cookies to attach to later requests.
    pub async fn login_test_user(
        client: &Client,
        username: &str,
        password: &str,
    ) -> Vec<Cookie<'static>> {
        let response = client
            .post("/api/auth/login")
            .header(ContentType::JSON)
            .body(json!({ "username": username, "password": password }).to_string())
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Ok, "Login failed for {}", username);

        response.cookies().iter().cloned().collect()
    }

    pub fn today() -> NaiveDate {
        AppConfig::default().today()
    }

    pub fn question(id: &str, correct_answer: usize) -> SessionQuestion {
        SessionQuestion::new(
            id,
            format!("Question {}", id),
            vec!["A".to_string(), "B".to_string(), "C".to_string()],
            correct_answer,
            format!("Explanation {}", id),
            vec![
                "Not A".to_string(),
                "Not B".to_string(),
                "Not C".to_string(),
            ],
        )
    }

    pub fn passage(id: &str, passage_type: PassageType, questions: Vec<SessionQuestion>) -> Passage {
        Passage {
            id: id.to_string(),
            passage_type,
            title: format!("Title {}", id),
            author: None,
            content: format!("Content {}", id),
            questions,
        }
    }

    /// Two nonfiction questions, one fiction, one poetry and two grammar.
    pub fn sample_content() -> DailyContent {
        DailyContent {
            passages: vec![
                passage(
                    "nf",
                    PassageType::Nonfiction,
                    vec![question("nf-1", 0), question("nf-2", 1)],
                ),
                passage("fi", PassageType::Fiction, vec![question("fi-1", 2)]),
                passage("po", PassageType::Poetry, vec![question("po-1", 0)]),
            ],
            grammar_questions: vec![question("gr-1", 1), question("gr-2", 0)],
        }
    }

    pub fn fallback_for(date: NaiveDate) -> DailyContent {
        FallbackContent.content_for(&ContentRequest {
            grade: 3,
            semester: 1,
            date,
        })
    }
}
