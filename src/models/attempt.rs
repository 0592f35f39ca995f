// src/models/attempt.rs

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::question::validate_answer_option;

/// DTO for submitting a single answer.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitAttemptRequest {
    pub question_id: i64,
    #[validate(custom(function = validate_answer_option))]
    pub user_answer: String,
}

/// Query parameters for listing the caller's attempts.
#[derive(Debug, Deserialize)]
pub struct ListAttemptsParams {
    pub question_id: Option<i64>,
    pub is_correct: Option<bool>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// The question embedded in attempt responses.
#[derive(Debug, Serialize)]
pub struct AttemptQuestion {
    pub id: i64,
    pub question: String,
    pub option_a: String,
    pub option_b: String,
    pub option_c: String,
    pub option_d: String,
    pub correct_answer: String,
}

/// One attempt joined with its question, as returned to the caller.
/// Attempts are immutable: correctness is derived once at creation.
#[derive(Debug, Serialize)]
pub struct AttemptWithQuestion {
    pub id: i64,
    pub user_id: i64,
    pub question_id: i64,
    pub user_answer: String,
    pub is_correct: bool,
    pub created_at: Option<chrono::NaiveDateTime>,
    pub question: AttemptQuestion,
}

/// Pagination metadata for attempt listings.
#[derive(Debug, Serialize)]
pub struct Pagination {
    pub current_page: i64,
    pub last_page: i64,
    pub per_page: i64,
    pub total: i64,
}

/// Aggregated attempt statistics for one user.
#[derive(Debug, Serialize)]
pub struct Statistics {
    pub total_attempts: i64,
    pub correct_attempts: i64,
    pub incorrect_attempts: i64,
    pub accuracy_percentage: f64,
    pub total_points: i64,
    pub attempted_questions: i64,
    pub total_questions: i64,
    pub unattempted_questions: i64,
}
