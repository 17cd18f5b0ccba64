use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "assessment_question")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub assessment_id: i32,
    #[sea_orm(belongs_to, from = "assessment_id", to = "id")]
    pub assessment: HasOne<super::assessment::Entity>,

    pub position: i32,
    pub prompt: String,
    /// One of: multiple_choice, true_false, short_answer, essay.
    pub question_type: String,
    /// Answer options as a JSON array of strings.
    #[sea_orm(column_type = "JsonBinary")]
    pub choices: serde_json::Value,
    pub answer: Option<String>,
    pub points: f64,
}

impl ActiveModelBehavior for ActiveModel {}
