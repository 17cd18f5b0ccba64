use chrono::{DateTime, Utc};
use common::AttemptStatus;
use common::grading::LetterGrade;
use serde::{Deserialize, Serialize};

use super::file::FileInfo;
use super::shared::{validate_text, validate_title};
use crate::entity::{assessment, assessment_attempt, assessment_question};
use crate::error::AppError;

pub const MAX_TIME_LIMIT_MINUTES: i32 = 600;
const MAX_QUESTIONS: usize = 200;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    MultipleChoice,
    TrueFalse,
    ShortAnswer,
    Essay,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MultipleChoice => "multiple_choice",
            Self::TrueFalse => "true_false",
            Self::ShortAnswer => "short_answer",
            Self::Essay => "essay",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "multiple_choice" => Some(Self::MultipleChoice),
            "true_false" => Some(Self::TrueFalse),
            "short_answer" => Some(Self::ShortAnswer),
            "essay" => Some(Self::Essay),
            _ => None,
        }
    }
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct QuestionInput {
    #[schema(example = "Solve for x: 2x + 3 = 7")]
    pub prompt: String,
    pub question_type: QuestionType,
    /// Options for multiple-choice questions.
    #[serde(default)]
    pub choices: Vec<String>,
    /// Expected answer; never shown to students.
    pub answer: Option<String>,
    #[schema(example = 10.0)]
    pub points: f64,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateAssessmentRequest {
    pub material_id: i32,
    #[schema(example = "Quiz 1")]
    pub title: String,
    pub instructions: Option<String>,
    #[schema(example = 100.0)]
    pub total_points: f64,
    pub due_date: Option<DateTime<Utc>>,
    /// Minutes, 1-600. Omit for untimed.
    #[schema(example = 30)]
    pub time_limit_minutes: Option<i32>,
    #[serde(default)]
    pub questions: Vec<QuestionInput>,
}

fn validate_question(index: usize, q: &QuestionInput) -> Result<(), AppError> {
    let n = index + 1;
    let prompt = q.prompt.trim();
    if prompt.is_empty() || prompt.chars().count() > 5000 {
        return Err(AppError::Validation(format!(
            "Question {n}: prompt must be 1-5000 characters"
        )));
    }
    if !q.points.is_finite() || q.points < 0.0 {
        return Err(AppError::Validation(format!(
            "Question {n}: points must be a non-negative number"
        )));
    }
    match q.question_type {
        QuestionType::MultipleChoice => {
            if q.choices.len() < 2 || q.choices.iter().any(|c| c.trim().is_empty()) {
                return Err(AppError::Validation(format!(
                    "Question {n}: multiple choice needs at least two non-empty choices"
                )));
            }
            if let Some(answer) = &q.answer
                && !q.choices.iter().any(|c| c == answer)
            {
                return Err(AppError::Validation(format!(
                    "Question {n}: answer must be one of the choices"
                )));
            }
        }
        QuestionType::TrueFalse => {
            if let Some(answer) = &q.answer
                && answer != "true"
                && answer != "false"
            {
                return Err(AppError::Validation(format!(
                    "Question {n}: answer must be \"true\" or \"false\""
                )));
            }
        }
        QuestionType::ShortAnswer | QuestionType::Essay => {
            if !q.choices.is_empty() {
                return Err(AppError::Validation(format!(
                    "Question {n}: only multiple choice questions take choices"
                )));
            }
        }
    }
    Ok(())
}

pub fn validate_create_assessment(payload: &CreateAssessmentRequest) -> Result<(), AppError> {
    validate_title(&payload.title, "Title")?;
    validate_text(payload.instructions.as_deref(), "Instructions", 10_000)?;
    if !payload.total_points.is_finite() || payload.total_points <= 0.0 {
        return Err(AppError::Validation(
            "total_points must be greater than zero".into(),
        ));
    }
    if let Some(limit) = payload.time_limit_minutes
        && !(1..=MAX_TIME_LIMIT_MINUTES).contains(&limit)
    {
        return Err(AppError::Validation(format!(
            "time_limit_minutes must be between 1 and {MAX_TIME_LIMIT_MINUTES}"
        )));
    }
    if payload.questions.len() > MAX_QUESTIONS {
        return Err(AppError::Validation(format!(
            "At most {MAX_QUESTIONS} questions per assessment"
        )));
    }
    for (i, q) in payload.questions.iter().enumerate() {
        validate_question(i, q)?;
    }
    let sum: f64 = payload.questions.iter().map(|q| q.points).sum();
    if sum > payload.total_points + 1e-9 {
        return Err(AppError::Validation(format!(
            "Question points ({sum}) exceed total_points ({})",
            payload.total_points
        )));
    }
    Ok(())
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct QuestionResponse {
    pub id: i32,
    pub position: i32,
    pub prompt: String,
    #[schema(example = "multiple_choice")]
    pub question_type: String,
    pub choices: Vec<String>,
    pub points: f64,
    /// Omitted for students.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
}

impl QuestionResponse {
    pub fn from_model(q: assessment_question::Model, reveal_answer: bool) -> Self {
        let choices = serde_json::from_value(q.choices).unwrap_or_default();
        Self {
            id: q.id,
            position: q.position,
            prompt: q.prompt,
            question_type: q.question_type,
            choices,
            points: q.points,
            answer: if reveal_answer { q.answer } else { None },
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct AssessmentResponse {
    #[schema(example = 5)]
    pub id: i32,
    pub material_id: i32,
    pub program_id: i32,
    pub title: String,
    pub instructions: Option<String>,
    pub total_points: f64,
    pub due_date: Option<DateTime<Utc>>,
    /// `due_date`, falling back to the material's due date.
    pub effective_due_date: Option<DateTime<Utc>>,
    pub time_limit_minutes: Option<i32>,
    pub created_by: i32,
    pub created_at: DateTime<Utc>,
    pub questions: Vec<QuestionResponse>,
}

impl AssessmentResponse {
    pub fn new(
        a: assessment::Model,
        program_id: i32,
        effective_due_date: Option<DateTime<Utc>>,
        questions: Vec<QuestionResponse>,
    ) -> Self {
        Self {
            id: a.id,
            material_id: a.material_id,
            program_id,
            title: a.title,
            instructions: a.instructions,
            total_points: a.total_points,
            due_date: a.due_date,
            effective_due_date,
            time_limit_minutes: a.time_limit_minutes,
            created_by: a.created_by,
            created_at: a.created_at,
            questions,
        }
    }
}

/// Result of `DELETE /assessments/{id}`.
#[derive(Serialize, utoipa::ToSchema)]
pub struct AssessmentDeletedResponse {
    pub id: i32,
    pub deleted_attempts: u64,
    pub deleted_files: u64,
}

/// Score and feedback for an attempt or assignment submission.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct GradeRequest {
    /// Raw points, `0..=max` where max is the item's total points or max score.
    #[schema(example = 87.0)]
    pub score: f64,
    #[serde(alias = "comments")]
    pub feedback: Option<String>,
}

pub fn validate_grade_request(payload: &GradeRequest) -> Result<(), AppError> {
    validate_text(payload.feedback.as_deref(), "Feedback", 5000)
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct AttemptResponse {
    #[schema(example = 9)]
    pub id: i32,
    pub assessment_id: i32,
    pub student_id: i32,
    pub status: AttemptStatus,
    pub started_at: DateTime<Utc>,
    pub time_limit_end: Option<DateTime<Utc>>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub is_late: bool,
    pub comments: Option<String>,
    pub file: Option<FileInfo>,
    /// When the single allowed edit was made.
    pub edited_at: Option<DateTime<Utc>>,
    pub score: Option<f64>,
    #[schema(example = 87.0)]
    pub percentage: Option<f64>,
    pub grade_letter: Option<LetterGrade>,
    pub feedback: Option<String>,
    pub graded_by: Option<i32>,
    pub graded_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl AttemptResponse {
    pub fn new(a: assessment_attempt::Model, file: Option<FileInfo>) -> Self {
        Self {
            id: a.id,
            assessment_id: a.assessment_id,
            student_id: a.student_id,
            status: a.status,
            started_at: a.started_at,
            time_limit_end: a.time_limit_end,
            submitted_at: a.submitted_at,
            is_late: a.is_late,
            comments: a.comments,
            file,
            edited_at: a.edited_at,
            score: a.score,
            percentage: a.percentage,
            grade_letter: a.percentage.map(LetterGrade::from_percentage),
            feedback: a.feedback,
            graded_by: a.graded_by,
            graded_at: a.graded_at,
            updated_at: a.updated_at,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct AttemptListResponse {
    pub data: Vec<AttemptResponse>,
}
