use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Audit trail of grading and payment decisions.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "activity_log")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub user_id: i32,
    /// e.g. "attempt.graded", "payment.validated".
    pub action: String,
    pub entity_type: String,
    pub entity_id: i32,
    pub details: Option<String>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
