use common::storage::UploadKind;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A stored upload. Referenced by exactly one attempt, submission, or payment attachment.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "file_upload")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub owner_id: i32,
    #[sea_orm(belongs_to, from = "owner_id", to = "id")]
    pub owner: HasOne<super::user::Entity>,

    pub kind: UploadKind,
    /// Relative `<kind>/<name>` path under the storage root.
    #[sea_orm(unique)]
    pub stored_path: String,
    pub original_filename: String,
    pub mime_type: Option<String>,
    pub size: i64,
    pub content_hash: String,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
