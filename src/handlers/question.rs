// src/handlers/question.rs

use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use validator::Validate;

use crate::{
    error::AppError,
    models::question::{
        CheckAnswersRequest, CorrectAnswer, CreateQuestionRequest, PublicQuestion, Question,
        UpdateQuestionRequest,
    },
    utils::jwt::AdminClaims,
};

const QUESTION_COLUMNS: &str =
    "id, question, option_a, option_b, option_c, option_d, correct_answer, created_at";

/// Helper struct for fetching answer keys from the database.
#[derive(sqlx::FromRow)]
struct AnswerKey {
    id: i64,
    correct_answer: String,
}

/// Scores a submitted answer map against the full answer key set.
/// Returns the score and the correct option for every question,
/// including the ones the user never answered.
fn score_answers(
    answers: &HashMap<i64, String>,
    keys: &[(i64, String)],
) -> (i64, Vec<CorrectAnswer>) {
    let mut score = 0;
    let mut correct_answers = Vec::with_capacity(keys.len());

    for (question_id, correct_option) in keys {
        if answers.get(question_id) == Some(correct_option) {
            score += 1;
        }
        correct_answers.push(CorrectAnswer {
            question_id: *question_id,
            correct_option: correct_option.clone(),
        });
    }

    (score, correct_answers)
}

/// Query parameters for question-serving endpoints.
#[derive(Debug, Deserialize)]
pub struct ViewParams {
    pub hide_answers: Option<bool>,
}

/// Lists all questions. With `hide_answers=true` the answer key is elided
/// so the payload can be served to quiz takers.
pub async fn list_questions(
    State(pool): State<SqlitePool>,
    Query(params): Query<ViewParams>,
) -> Result<impl IntoResponse, AppError> {
    let hide_answers = params.hide_answers.unwrap_or(false);

    let sql = format!("SELECT {QUESTION_COLUMNS} FROM questions ORDER BY id");
    let questions = sqlx::query_as::<_, Question>(&sql).fetch_all(&pool).await?;

    let count = questions.len();

    if hide_answers {
        let public: Vec<PublicQuestion> = questions.into_iter().map(Into::into).collect();
        return Ok(Json(serde_json::json!({
            "success": true,
            "data": public,
            "count": count,
        })));
    }

    Ok(Json(serde_json::json!({
        "success": true,
        "data": questions,
        "count": count,
    })))
}

/// Retrieves a single question by ID, hiding the answer key on request.
pub async fn get_question(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
    Query(params): Query<ViewParams>,
) -> Result<impl IntoResponse, AppError> {
    let hide_answers = params.hide_answers.unwrap_or(false);

    let sql = format!("SELECT {QUESTION_COLUMNS} FROM questions WHERE id = ?");
    let question = sqlx::query_as::<_, Question>(&sql)
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Question not found".to_string()))?;

    if hide_answers {
        return Ok(Json(serde_json::json!({
            "success": true,
            "data": PublicQuestion::from(question),
        })));
    }

    Ok(Json(serde_json::json!({
        "success": true,
        "data": question,
    })))
}

/// Retrieves one random question for quiz mode.
/// Unlike the other views, answers are hidden by default here.
pub async fn random_question(
    State(pool): State<SqlitePool>,
    Query(params): Query<ViewParams>,
) -> Result<impl IntoResponse, AppError> {
    let hide_answers = params.hide_answers.unwrap_or(true);

    let sql = format!("SELECT {QUESTION_COLUMNS} FROM questions ORDER BY RANDOM() LIMIT 1");
    let question = sqlx::query_as::<_, Question>(&sql)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("No questions available".to_string()))?;

    if hide_answers {
        return Ok(Json(serde_json::json!({
            "success": true,
            "data": PublicQuestion::from(question),
        })));
    }

    Ok(Json(serde_json::json!({
        "success": true,
        "data": question,
    })))
}

/// Creates a new quiz question.
/// Admin only.
pub async fn create_question(
    State(pool): State<SqlitePool>,
    _admin: AdminClaims,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let sql = format!(
        "INSERT INTO questions (question, option_a, option_b, option_c, option_d, correct_answer) \
         VALUES (?, ?, ?, ?, ?, ?) RETURNING {QUESTION_COLUMNS}"
    );
    let question = sqlx::query_as::<_, Question>(&sql)
        .bind(&payload.question)
        .bind(&payload.option_a)
        .bind(&payload.option_b)
        .bind(&payload.option_c)
        .bind(&payload.option_d)
        .bind(&payload.correct_answer)
        .fetch_one(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create question: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "success": true,
            "message": "Question created successfully",
            "data": question,
        })),
    ))
}

/// Updates a question by ID. Absent fields are left untouched.
/// Admin only.
pub async fn update_question(
    State(pool): State<SqlitePool>,
    _admin: AdminClaims,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let has_changes = payload.question.is_some()
        || payload.option_a.is_some()
        || payload.option_b.is_some()
        || payload.option_c.is_some()
        || payload.option_d.is_some()
        || payload.correct_answer.is_some();

    if has_changes {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE questions SET ");
        let mut separated = builder.separated(", ");

        if let Some(question) = payload.question {
            separated.push("question = ");
            separated.push_bind_unseparated(question);
        }

        if let Some(option_a) = payload.option_a {
            separated.push("option_a = ");
            separated.push_bind_unseparated(option_a);
        }

        if let Some(option_b) = payload.option_b {
            separated.push("option_b = ");
            separated.push_bind_unseparated(option_b);
        }

        if let Some(option_c) = payload.option_c {
            separated.push("option_c = ");
            separated.push_bind_unseparated(option_c);
        }

        if let Some(option_d) = payload.option_d {
            separated.push("option_d = ");
            separated.push_bind_unseparated(option_d);
        }

        if let Some(correct_answer) = payload.correct_answer {
            separated.push("correct_answer = ");
            separated.push_bind_unseparated(correct_answer);
        }

        builder.push(" WHERE id = ");
        builder.push_bind(id);

        let result = builder.build().execute(&pool).await.map_err(|e| {
            tracing::error!("Failed to update question: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Question not found".to_string()));
        }
    }

    let sql = format!("SELECT {QUESTION_COLUMNS} FROM questions WHERE id = ?");
    let question = sqlx::query_as::<_, Question>(&sql)
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Question not found".to_string()))?;

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Question updated successfully",
        "data": question,
    })))
}

/// Deletes a quiz question by ID.
/// Admin only.
pub async fn delete_question(
    State(pool): State<SqlitePool>,
    _admin: AdminClaims,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM questions WHERE id = ?")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete question: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Question not found".to_string()));
    }

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Question deleted successfully",
    })))
}

/// Scores a whole quiz at once without persisting anything.
///
/// This is the ungated practice mode: no attempt rows are written and no
/// points are credited. Same input always produces the same output, and the
/// returned answer key covers every question regardless of which were answered.
pub async fn check_answers(
    State(pool): State<SqlitePool>,
    Json(payload): Json<CheckAnswersRequest>,
) -> Result<impl IntoResponse, AppError> {
    let keys: Vec<(i64, String)> =
        sqlx::query_as::<_, AnswerKey>("SELECT id, correct_answer FROM questions ORDER BY id")
            .fetch_all(&pool)
            .await?
            .into_iter()
            .map(|k| (k.id, k.correct_answer))
            .collect();

    let (score, correct_answers) = score_answers(&payload.answers, &keys);

    Ok(Json(serde_json::json!({
        "score": score,
        "correct_answers": correct_answers,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> Vec<(i64, String)> {
        vec![(1, "C".to_string()), (2, "A".to_string())]
    }

    #[test]
    fn score_counts_only_exact_matches() {
        let mut answers = HashMap::new();
        answers.insert(1, "C".to_string());
        answers.insert(2, "B".to_string());

        let (score, correct) = score_answers(&answers, &keys());
        assert_eq!(score, 1);
        assert_eq!(correct.len(), 2);
        assert_eq!(correct[0].question_id, 1);
        assert_eq!(correct[0].correct_option, "C");
        assert_eq!(correct[1].question_id, 2);
        assert_eq!(correct[1].correct_option, "A");
    }

    #[test]
    fn score_covers_unanswered_questions() {
        let answers = HashMap::new();

        let (score, correct) = score_answers(&answers, &keys());
        assert_eq!(score, 0);
        assert_eq!(correct.len(), 2);
    }

    #[test]
    fn score_perfect_run() {
        let mut answers = HashMap::new();
        answers.insert(1, "C".to_string());
        answers.insert(2, "A".to_string());

        let (score, _) = score_answers(&answers, &keys());
        assert_eq!(score, 2);
    }
}
