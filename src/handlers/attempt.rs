// src/handlers/attempt.rs

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use validator::Validate;

use crate::{
    config::{DEFAULT_PAGE_SIZE, LEADERBOARD_SIZE, MAX_PAGE_SIZE, POINTS_PER_CORRECT_ANSWER},
    error::AppError,
    models::{
        attempt::{
            AttemptQuestion, AttemptWithQuestion, ListAttemptsParams, Pagination, Statistics,
            SubmitAttemptRequest,
        },
        user::LeaderboardEntry,
    },
    utils::jwt::Claims,
};

/// Helper struct for fetching the answer key of one question.
#[derive(sqlx::FromRow)]
struct AnswerKey {
    correct_answer: String,
}

/// One attempt row joined with its question.
#[derive(sqlx::FromRow)]
struct AttemptRow {
    id: i64,
    user_id: i64,
    question_id: i64,
    user_answer: String,
    is_correct: bool,
    created_at: Option<chrono::NaiveDateTime>,
    question: String,
    option_a: String,
    option_b: String,
    option_c: String,
    option_d: String,
    correct_answer: String,
}

impl From<AttemptRow> for AttemptWithQuestion {
    fn from(row: AttemptRow) -> Self {
        AttemptWithQuestion {
            id: row.id,
            user_id: row.user_id,
            question_id: row.question_id,
            user_answer: row.user_answer,
            is_correct: row.is_correct,
            created_at: row.created_at,
            question: AttemptQuestion {
                id: row.question_id,
                question: row.question,
                option_a: row.option_a,
                option_b: row.option_b,
                option_c: row.option_c,
                option_d: row.option_d,
                correct_answer: row.correct_answer,
            },
        }
    }
}

const ATTEMPT_SELECT: &str = "SELECT a.id, a.user_id, a.question_id, a.user_answer, a.is_correct, a.created_at, \
     q.question, q.option_a, q.option_b, q.option_c, q.option_d, q.correct_answer \
     FROM attempts a JOIN questions q ON a.question_id = q.id";

/// Accuracy percentage rounded to two decimals. Zero when nothing attempted.
fn accuracy_percentage(correct: i64, total: i64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (correct as f64 / total as f64 * 100.0 * 100.0).round() / 100.0
}

/// Submits an answer to a single question and scores it.
///
/// * Rejects a second attempt for the same (user, question) pair with 409.
/// * Awards a fixed point increment when the answer matches the key.
/// * The attempt insert and the point increment happen in one transaction;
///   the unique index on (user_id, question_id) resolves concurrent
///   duplicates, so exactly one of two racing submissions is credited.
pub async fn submit_attempt(
    State(pool): State<SqlitePool>,
    claims: Claims,
    Json(payload): Json<SubmitAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user_id = claims.user_id();

    let key = sqlx::query_as::<_, AnswerKey>("SELECT correct_answer FROM questions WHERE id = ?")
        .bind(payload.question_id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| {
            AppError::Validation(serde_json::json!({
                "question_id": ["The selected question_id is invalid."]
            }))
        })?;

    let is_correct = payload.user_answer == key.correct_answer;
    let points_added = if is_correct {
        POINTS_PER_CORRECT_ANSWER
    } else {
        0
    };

    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO attempts (user_id, question_id, user_answer, is_correct) VALUES (?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(payload.question_id)
    .bind(&payload.user_answer)
    .bind(is_correct)
    .execute(&mut *tx)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict("You already attempted this question".to_string())
        }
        _ => {
            tracing::error!("Failed to insert attempt: {:?}", e);
            AppError::from(e)
        }
    })?;

    if is_correct {
        sqlx::query("UPDATE users SET points = points + ? WHERE id = ?")
            .bind(points_added)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
    }

    let total_points: i64 = sqlx::query_scalar("SELECT points FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "is_correct": is_correct,
        "points_added": points_added,
        "total_points": total_points,
    })))
}

/// Lists the caller's attempts, newest first, with optional filters
/// on question and correctness, paginated.
pub async fn list_attempts(
    State(pool): State<SqlitePool>,
    claims: Claims,
    Query(params): Query<ListAttemptsParams>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id();
    let per_page = params
        .per_page
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let page = params.page.unwrap_or(1).max(1);
    // page is client-controlled and unbounded; saturate instead of overflowing
    let offset = (page - 1).saturating_mul(per_page);

    let mut count_builder: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT COUNT(*) FROM attempts WHERE user_id = ");
    count_builder.push_bind(user_id);
    if let Some(question_id) = params.question_id {
        count_builder.push(" AND question_id = ");
        count_builder.push_bind(question_id);
    }
    if let Some(is_correct) = params.is_correct {
        count_builder.push(" AND is_correct = ");
        count_builder.push_bind(is_correct);
    }

    let total: i64 = count_builder.build_query_scalar().fetch_one(&pool).await?;

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(ATTEMPT_SELECT);
    builder.push(" WHERE a.user_id = ");
    builder.push_bind(user_id);
    if let Some(question_id) = params.question_id {
        builder.push(" AND a.question_id = ");
        builder.push_bind(question_id);
    }
    if let Some(is_correct) = params.is_correct {
        builder.push(" AND a.is_correct = ");
        builder.push_bind(is_correct);
    }
    builder.push(" ORDER BY a.created_at DESC, a.id DESC LIMIT ");
    builder.push_bind(per_page);
    builder.push(" OFFSET ");
    builder.push_bind(offset);

    let rows: Vec<AttemptRow> = builder.build_query_as().fetch_all(&pool).await?;
    let attempts: Vec<AttemptWithQuestion> = rows.into_iter().map(Into::into).collect();

    let last_page = ((total + per_page - 1) / per_page).max(1);

    Ok(Json(serde_json::json!({
        "success": true,
        "data": attempts,
        "pagination": Pagination {
            current_page: page,
            last_page,
            per_page,
            total,
        },
    })))
}

/// Retrieves one of the caller's attempts by ID.
pub async fn get_attempt(
    State(pool): State<SqlitePool>,
    claims: Claims,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let sql = format!("{ATTEMPT_SELECT} WHERE a.id = ? AND a.user_id = ?");
    let row = sqlx::query_as::<_, AttemptRow>(&sql)
        .bind(id)
        .bind(claims.user_id())
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Attempt not found".to_string()))?;

    Ok(Json(serde_json::json!({
        "success": true,
        "data": AttemptWithQuestion::from(row),
    })))
}

/// Retrieves the caller's attempt for a specific question, if any.
pub async fn get_attempt_by_question(
    State(pool): State<SqlitePool>,
    claims: Claims,
    Path(question_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let sql = format!("{ATTEMPT_SELECT} WHERE a.question_id = ? AND a.user_id = ?");
    let row = sqlx::query_as::<_, AttemptRow>(&sql)
        .bind(question_id)
        .bind(claims.user_id())
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound(
            "No attempt found for this question".to_string(),
        ))?;

    Ok(Json(serde_json::json!({
        "success": true,
        "data": AttemptWithQuestion::from(row),
    })))
}

/// Aggregates the caller's attempt statistics.
pub async fn statistics(
    State(pool): State<SqlitePool>,
    claims: Claims,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id();

    let total_attempts: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM attempts WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&pool)
            .await?;

    let correct_attempts: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM attempts WHERE user_id = ? AND is_correct = 1")
            .bind(user_id)
            .fetch_one(&pool)
            .await?;

    let attempted_questions: i64 =
        sqlx::query_scalar("SELECT COUNT(DISTINCT question_id) FROM attempts WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&pool)
            .await?;

    let total_questions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM questions")
        .fetch_one(&pool)
        .await?;

    let total_points: i64 = sqlx::query_scalar("SELECT points FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    let stats = Statistics {
        total_attempts,
        correct_attempts,
        incorrect_attempts: total_attempts - correct_attempts,
        accuracy_percentage: accuracy_percentage(correct_attempts, total_attempts),
        total_points,
        attempted_questions,
        total_questions,
        unattempted_questions: total_questions - attempted_questions,
    };

    Ok(Json(serde_json::json!({
        "success": true,
        "data": stats,
    })))
}

/// Retrieves the top users ranked by points.
/// Ties are broken by user ID ascending so the ordering is deterministic.
pub async fn leaderboard(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let leaders = sqlx::query_as::<_, LeaderboardEntry>(
        "SELECT id, username AS name, points FROM users ORDER BY points DESC, id ASC LIMIT ?",
    )
    .bind(LEADERBOARD_SIZE)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch leaderboard: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(serde_json::json!({
        "success": true,
        "data": leaders,
    })))
}
