use common::AttemptStatus;
use common::attempt::AttemptState;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One student's engagement with an assessment. Unique per (assessment, student).
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "assessment_attempt")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub assessment_id: i32,
    #[sea_orm(belongs_to, from = "assessment_id", to = "id")]
    pub assessment: HasOne<super::assessment::Entity>,

    pub student_id: i32,
    #[sea_orm(belongs_to, from = "student_id", to = "id")]
    pub student: HasOne<super::user::Entity>,

    pub status: AttemptStatus,
    pub started_at: DateTimeUtc,
    pub time_limit_end: Option<DateTimeUtc>,
    pub submitted_at: Option<DateTimeUtc>,
    pub is_late: bool,

    pub file_id: Option<i32>,
    pub comments: Option<String>,
    /// Set by the one edit allowed after submission.
    pub edited_at: Option<DateTimeUtc>,

    pub score: Option<f64>,
    pub percentage: Option<f64>,
    pub feedback: Option<String>,
    pub graded_by: Option<i32>,
    pub graded_at: Option<DateTimeUtc>,

    pub updated_at: DateTimeUtc,
}

impl Model {
    pub fn state(&self) -> AttemptState {
        AttemptState {
            status: self.status,
            time_limit_end: self.time_limit_end,
            submitted_at: self.submitted_at,
        }
    }
}

impl ActiveModelBehavior for ActiveModel {}
