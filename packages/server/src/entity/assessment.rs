use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "assessment")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub material_id: i32,
    #[sea_orm(belongs_to, from = "material_id", to = "id")]
    pub material: HasOne<super::material::Entity>,

    pub title: String,
    pub instructions: Option<String>,
    pub total_points: f64,
    pub due_date: Option<DateTimeUtc>,
    /// Minutes allowed from start; NULL for untimed assessments.
    pub time_limit_minutes: Option<i32>,

    pub created_by: i32,
    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
