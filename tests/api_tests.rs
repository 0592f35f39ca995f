// tests/api_tests.rs

use quiz_backend::{config::Config, routes, state::AppState};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;

struct TestApp {
    address: String,
    pool: SqlitePool,
}

/// Helper function to spawn the app on a random port for testing.
/// Each test gets its own throwaway SQLite database file.
async fn spawn_app() -> TestApp {
    let db_path = std::env::temp_dir().join(format!("quiz_test_{}.db", uuid::Uuid::new_v4()));
    let database_url = format!("sqlite:{}", db_path.display());

    let connect_options = SqliteConnectOptions::from_str(&database_url)
        .expect("Invalid test database URL")
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(connect_options)
        .await
        .expect("Failed to open test database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    let config = Config {
        database_url: database_url.clone(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600, // 10 minutes for tests
        rust_log: "error".to_string(),
        admin_username: None,
        admin_password: None,
    };

    let state = AppState {
        pool: pool.clone(),
        config,
    };

    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp { address, pool }
}

/// Registers a user and returns a bearer token for it.
async fn register_and_login(client: &reqwest::Client, address: &str, username: &str) -> String {
    let password = "password123";

    client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({ "username": username, "password": password }))
        .send()
        .await
        .expect("Register failed");

    let login_resp = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({ "username": username, "password": password }))
        .send()
        .await
        .expect("Login failed")
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse login json");

    login_resp["token"]
        .as_str()
        .expect("Token not found")
        .to_string()
}

/// Registers a user, promotes it to admin directly in the database,
/// then logs in again so the token carries the admin role.
async fn admin_token(app: &TestApp, client: &reqwest::Client, username: &str) -> String {
    register_and_login(client, &app.address, username).await;

    sqlx::query("UPDATE users SET role = 'admin' WHERE username = ?")
        .bind(username)
        .execute(&app.pool)
        .await
        .expect("Failed to promote user");

    let login_resp = client
        .post(format!("{}/api/auth/login", app.address))
        .json(&serde_json::json!({ "username": username, "password": "password123" }))
        .send()
        .await
        .expect("Login failed")
        .json::<serde_json::Value>()
        .await
        .unwrap();

    login_resp["token"].as_str().unwrap().to_string()
}

/// Inserts a question directly and returns its ID.
async fn seed_question(pool: &SqlitePool, prompt: &str, correct: &str) -> i64 {
    sqlx::query_scalar(
        "INSERT INTO questions (question, option_a, option_b, option_c, option_d, correct_answer) \
         VALUES (?, 'Opt A', 'Opt B', 'Opt C', 'Opt D', ?) RETURNING id",
    )
    .bind(prompt)
    .bind(correct)
    .fetch_one(pool)
    .await
    .expect("Failed to seed question")
}

fn unique_name(prefix: &str) -> String {
    format!("{}_{}", prefix, &uuid::Uuid::new_v4().to_string()[..8])
}

#[tokio::test]
async fn unknown_path_returns_404() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/random_path_that_does_not_exist", app.address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn register_works_and_starts_with_zero_points() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let username = unique_name("u");

    let response = client
        .post(format!("{}/api/auth/register", app.address))
        .json(&serde_json::json!({ "username": username, "password": "password123" }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 201);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["points"], 0);
    assert_eq!(body["data"]["role"], "user");
    assert!(body["data"]["password"].is_null(), "hash must not leak");
}

#[tokio::test]
async fn register_fails_validation_with_422() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    // Username too short
    let response = client
        .post(format!("{}/api/auth/register", app.address))
        .json(&serde_json::json!({ "username": "yo", "password": "password123" }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 422);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn duplicate_username_conflicts() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let username = unique_name("dup");

    for expected in [201, 409] {
        let response = client
            .post(format!("{}/api/auth/register", app.address))
            .json(&serde_json::json!({ "username": username, "password": "password123" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), expected);
    }
}

#[tokio::test]
async fn login_with_wrong_password_is_unauthorized() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let username = unique_name("u");

    register_and_login(&client, &app.address, &username).await;

    let response = client
        .post(format!("{}/api/auth/login", app.address))
        .json(&serde_json::json!({ "username": username, "password": "not-the-password" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn question_crud_flow_as_admin() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let token = admin_token(&app, &client, &unique_name("admin")).await;

    // Create
    let create_resp = client
        .post(format!("{}/api/questions", app.address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({
            "question": "What is the capital of France?",
            "option_a": "London",
            "option_b": "Berlin",
            "option_c": "Paris",
            "option_d": "Madrid",
            "correct_answer": "C"
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(create_resp.status().as_u16(), 201);
    let created: serde_json::Value = create_resp.json().await.unwrap();
    let id = created["data"]["id"].as_i64().unwrap();
    assert_eq!(created["data"]["correct_answer"], "C");

    // Read, full view by default
    let get_resp = client
        .get(format!("{}/api/questions/{}", app.address, id))
        .send()
        .await
        .unwrap();
    let fetched: serde_json::Value = get_resp.json().await.unwrap();
    assert_eq!(fetched["data"]["correct_answer"], "C");

    // Read in quiz-serving mode: answer elided
    let hidden_resp = client
        .get(format!(
            "{}/api/questions/{}?hide_answers=true",
            app.address, id
        ))
        .send()
        .await
        .unwrap();
    let hidden: serde_json::Value = hidden_resp.json().await.unwrap();
    assert!(hidden["data"].get("correct_answer").is_none());
    assert_eq!(hidden["data"]["question"], "What is the capital of France?");

    // Partial update
    let update_resp = client
        .put(format!("{}/api/questions/{}", app.address, id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({ "correct_answer": "B" }))
        .send()
        .await
        .unwrap();
    assert_eq!(update_resp.status().as_u16(), 200);
    let updated: serde_json::Value = update_resp.json().await.unwrap();
    assert_eq!(updated["data"]["correct_answer"], "B");
    assert_eq!(updated["data"]["question"], "What is the capital of France?");

    // Bad option letter on update
    let bad_update = client
        .put(format!("{}/api/questions/{}", app.address, id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({ "correct_answer": "X" }))
        .send()
        .await
        .unwrap();
    assert_eq!(bad_update.status().as_u16(), 422);

    // Delete, then the question is gone
    let delete_resp = client
        .delete(format!("{}/api/questions/{}", app.address, id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap();
    assert_eq!(delete_resp.status().as_u16(), 200);

    let gone = client
        .get(format!("{}/api/questions/{}", app.address, id))
        .send()
        .await
        .unwrap();
    assert_eq!(gone.status().as_u16(), 404);

    let delete_again = client
        .delete(format!("{}/api/questions/{}", app.address, id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap();
    assert_eq!(delete_again.status().as_u16(), 404);
}

#[tokio::test]
async fn question_mutations_require_admin_role() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let body = serde_json::json!({
        "question": "Q?",
        "option_a": "a",
        "option_b": "b",
        "option_c": "c",
        "option_d": "d",
        "correct_answer": "A"
    });

    // No token at all
    let anon = client
        .post(format!("{}/api/questions", app.address))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(anon.status().as_u16(), 401);

    // Regular user token
    let token = register_and_login(&client, &app.address, &unique_name("plain")).await;
    let forbidden = client
        .post(format!("{}/api/questions", app.address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(forbidden.status().as_u16(), 403);
}

#[tokio::test]
async fn update_question_rejects_empty_fields() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let token = admin_token(&app, &client, &unique_name("admin")).await;
    let id = seed_question(&app.pool, "Original prompt", "A").await;

    // A present-but-empty field must fail validation, not blank the prompt.
    let response = client
        .put(format!("{}/api/questions/{}", app.address, id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({ "question": "" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 422);

    let empty_option = client
        .put(format!("{}/api/questions/{}", app.address, id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({ "option_b": "" }))
        .send()
        .await
        .unwrap();
    assert_eq!(empty_option.status().as_u16(), 422);

    let prompt: String = sqlx::query_scalar("SELECT question FROM questions WHERE id = ?")
        .bind(id)
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(prompt, "Original prompt");
}

#[tokio::test]
async fn me_returns_current_user() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let username = unique_name("me");
    let token = register_and_login(&client, &app.address, &username).await;

    let response = client
        .get(format!("{}/api/auth/me", app.address))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["data"]["username"], username.as_str());
    assert_eq!(body["data"]["points"], 0);
    assert!(body["data"]["password"].is_null(), "hash must not leak");

    let anon = client
        .get(format!("{}/api/auth/me", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(anon.status().as_u16(), 401);
}

#[tokio::test]
async fn create_question_rejects_bad_option_letter() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let token = admin_token(&app, &client, &unique_name("admin")).await;

    let response = client
        .post(format!("{}/api/questions", app.address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({
            "question": "Q?",
            "option_a": "a",
            "option_b": "b",
            "option_c": "c",
            "option_d": "d",
            "correct_answer": "E"
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 422);
}

#[tokio::test]
async fn list_questions_hides_answers_on_request() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    seed_question(&app.pool, "Q1", "A").await;
    seed_question(&app.pool, "Q2", "B").await;

    let full: serde_json::Value = client
        .get(format!("{}/api/questions", app.address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(full["count"], 2);
    assert_eq!(full["data"][0]["correct_answer"], "A");

    let hidden: serde_json::Value = client
        .get(format!("{}/api/questions?hide_answers=true", app.address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(hidden["count"], 2);
    assert!(hidden["data"][0].get("correct_answer").is_none());
}

#[tokio::test]
async fn random_question_hides_answer_by_default() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    // Empty question set
    let empty = client
        .get(format!("{}/api/questions/random", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(empty.status().as_u16(), 404);

    seed_question(&app.pool, "Only question", "D").await;

    let response: serde_json::Value = client
        .get(format!("{}/api/questions/random", app.address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(response["data"]["question"], "Only question");
    assert!(response["data"].get("correct_answer").is_none());

    let revealed: serde_json::Value = client
        .get(format!(
            "{}/api/questions/random?hide_answers=false",
            app.address
        ))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(revealed["data"]["correct_answer"], "D");
}

#[tokio::test]
async fn check_answers_scores_against_full_question_set() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let q1 = seed_question(&app.pool, "Q1", "C").await;
    let q2 = seed_question(&app.pool, "Q2", "A").await;

    let mut answers = serde_json::Map::new();
    answers.insert(q1.to_string(), serde_json::json!("C"));
    answers.insert(q2.to_string(), serde_json::json!("B"));

    let response: serde_json::Value = client
        .post(format!("{}/api/check-answers", app.address))
        .json(&serde_json::json!({ "answers": answers }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(response["score"], 1);
    let correct = response["correct_answers"].as_array().unwrap();
    assert_eq!(correct.len(), 2, "answer key covers every question");

    // Stateless: nothing was persisted, nobody was credited
    let attempts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM attempts")
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(attempts, 0);
}

#[tokio::test]
async fn check_answers_is_idempotent() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let q1 = seed_question(&app.pool, "Q1", "B").await;
    let body = serde_json::json!({ "answers": { q1.to_string(): "B" } });

    for _ in 0..2 {
        let response: serde_json::Value = client
            .post(format!("{}/api/check-answers", app.address))
            .json(&body)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(response["score"], 1);
    }
}
