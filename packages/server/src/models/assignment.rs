use chrono::{DateTime, Utc};
use common::SubmissionStatus;
use common::grading::LetterGrade;
use serde::{Deserialize, Serialize};

use super::file::FileInfo;
use super::shared::{validate_text, validate_title};
use crate::entity::{assignment, assignment_submission};
use crate::error::AppError;

pub const DEFAULT_MAX_SCORE: f64 = 100.0;

#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateAssignmentRequest {
    pub material_id: i32,
    #[schema(example = "Essay: Philippine Revolution")]
    pub title: String,
    pub instructions: Option<String>,
    /// Defaults to 100.
    #[schema(example = 100.0)]
    pub max_score: Option<f64>,
    pub due_date: Option<DateTime<Utc>>,
}

pub fn validate_create_assignment(payload: &CreateAssignmentRequest) -> Result<(), AppError> {
    validate_title(&payload.title, "Title")?;
    validate_text(payload.instructions.as_deref(), "Instructions", 10_000)?;
    if let Some(max) = payload.max_score
        && (!max.is_finite() || max <= 0.0)
    {
        return Err(AppError::Validation(
            "max_score must be greater than zero".into(),
        ));
    }
    Ok(())
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct AssignmentResponse {
    #[schema(example = 4)]
    pub id: i32,
    pub material_id: i32,
    pub program_id: i32,
    pub title: String,
    pub instructions: Option<String>,
    pub max_score: f64,
    pub due_date: Option<DateTime<Utc>>,
    pub effective_due_date: Option<DateTime<Utc>>,
    pub created_by: i32,
    pub created_at: DateTime<Utc>,
}

impl AssignmentResponse {
    pub fn new(
        a: assignment::Model,
        program_id: i32,
        effective_due_date: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: a.id,
            material_id: a.material_id,
            program_id,
            title: a.title,
            instructions: a.instructions,
            max_score: a.max_score,
            due_date: a.due_date,
            effective_due_date,
            created_by: a.created_by,
            created_at: a.created_at,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct SubmissionResponse {
    #[schema(example = 21)]
    pub id: i32,
    pub assignment_id: i32,
    pub student_id: i32,
    pub submission_text: Option<String>,
    pub file: Option<FileInfo>,
    pub status: SubmissionStatus,
    pub is_late: bool,
    pub submitted_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    pub score: Option<f64>,
    pub percentage: Option<f64>,
    pub grade_letter: Option<LetterGrade>,
    pub feedback: Option<String>,
    pub graded_by: Option<i32>,
    pub graded_at: Option<DateTime<Utc>>,
}

impl SubmissionResponse {
    pub fn new(s: assignment_submission::Model, file: Option<FileInfo>) -> Self {
        Self {
            id: s.id,
            assignment_id: s.assignment_id,
            student_id: s.student_id,
            submission_text: s.submission_text,
            file,
            status: s.status,
            is_late: s.is_late,
            submitted_at: s.submitted_at,
            edited_at: s.edited_at,
            updated_at: s.updated_at,
            score: s.score,
            percentage: s.percentage,
            grade_letter: s.percentage.map(LetterGrade::from_percentage),
            feedback: s.feedback,
            graded_by: s.graded_by,
            graded_at: s.graded_at,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct SubmissionListResponse {
    pub data: Vec<SubmissionResponse>,
}
