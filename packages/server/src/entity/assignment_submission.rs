use common::SubmissionStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A student's work for an assignment. Unique per (assignment, student).
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "assignment_submission")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub assignment_id: i32,
    #[sea_orm(belongs_to, from = "assignment_id", to = "id")]
    pub assignment: HasOne<super::assignment::Entity>,

    pub student_id: i32,
    #[sea_orm(belongs_to, from = "student_id", to = "id")]
    pub student: HasOne<super::user::Entity>,

    pub submission_text: Option<String>,
    pub file_id: Option<i32>,
    pub status: SubmissionStatus,
    pub is_late: bool,
    pub submitted_at: DateTimeUtc,
    pub edited_at: Option<DateTimeUtc>,
    pub updated_at: DateTimeUtc,

    pub score: Option<f64>,
    pub percentage: Option<f64>,
    pub feedback: Option<String>,
    pub graded_by: Option<i32>,
    pub graded_at: Option<DateTimeUtc>,
}

impl ActiveModelBehavior for ActiveModel {}
