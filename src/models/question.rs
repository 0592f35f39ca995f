// src/models/question.rs

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use validator::{Validate, ValidationError};

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,

    /// The question prompt.
    pub question: String,

    pub option_a: String,
    pub option_b: String,
    pub option_c: String,
    pub option_d: String,

    /// The correct option letter: 'A', 'B', 'C' or 'D'.
    pub correct_answer: String,

    pub created_at: Option<chrono::NaiveDateTime>,
}

/// DTO for serving a question in quiz mode (excludes the correct answer).
#[derive(Debug, Serialize)]
pub struct PublicQuestion {
    pub id: i64,
    pub question: String,
    pub option_a: String,
    pub option_b: String,
    pub option_c: String,
    pub option_d: String,
}

impl From<Question> for PublicQuestion {
    fn from(q: Question) -> Self {
        PublicQuestion {
            id: q.id,
            question: q.question,
            option_a: q.option_a,
            option_b: q.option_b,
            option_c: q.option_c,
            option_d: q.option_d,
        }
    }
}

/// Validator for option letters. Used for both the answer key on questions
/// and the submitted answer on attempts.
pub fn validate_answer_option(value: &str) -> Result<(), ValidationError> {
    if matches!(value, "A" | "B" | "C" | "D") {
        Ok(())
    } else {
        let mut err = ValidationError::new("answer_option");
        err.message = Some("must be one of A, B, C, D".into());
        Err(err)
    }
}

/// DTO for creating a new question.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 1000))]
    pub question: String,
    #[validate(length(min = 1, max = 500))]
    pub option_a: String,
    #[validate(length(min = 1, max = 500))]
    pub option_b: String,
    #[validate(length(min = 1, max = 500))]
    pub option_c: String,
    #[validate(length(min = 1, max = 500))]
    pub option_d: String,
    #[validate(custom(function = validate_answer_option))]
    pub correct_answer: String,
}

/// DTO for updating a question. Fields are optional, but a field that is
/// present must still pass the same constraints as on create.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateQuestionRequest {
    #[validate(length(min = 1, max = 1000))]
    pub question: Option<String>,
    #[validate(length(min = 1, max = 500))]
    pub option_a: Option<String>,
    #[validate(length(min = 1, max = 500))]
    pub option_b: Option<String>,
    #[validate(length(min = 1, max = 500))]
    pub option_c: Option<String>,
    #[validate(length(min = 1, max = 500))]
    pub option_d: Option<String>,
    #[validate(custom(function = validate_answer_option))]
    pub correct_answer: Option<String>,
}

/// DTO for the ungated batch self-check.
#[derive(Debug, Deserialize)]
pub struct CheckAnswersRequest {
    /// User's answers map.
    /// Key: Question ID (i64)
    /// Value: User's selected option letter (String)
    pub answers: HashMap<i64, String>,
}

/// Answer key entry returned by the batch self-check for every question.
#[derive(Debug, Serialize, PartialEq)]
pub struct CorrectAnswer {
    pub question_id: i64,
    pub correct_option: String,
}
