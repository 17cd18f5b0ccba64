use serde::{Deserialize, Serialize};

use crate::entity::file_upload;

/// Metadata for an uploaded file; download it from `url`.
#[derive(Serialize, utoipa::ToSchema)]
pub struct FileInfo {
    #[schema(example = 17)]
    pub id: i32,
    #[schema(example = "essay.pdf")]
    pub original_filename: String,
    pub mime_type: Option<String>,
    pub size: i64,
    #[schema(example = "/api/v1/files/17")]
    pub url: String,
}

impl From<file_upload::Model> for FileInfo {
    fn from(f: file_upload::Model) -> Self {
        Self {
            url: format!("/api/v1/files/{}", f.id),
            id: f.id,
            original_filename: f.original_filename,
            mime_type: f.mime_type,
            size: f.size,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// Display in the browser when possible.
    #[default]
    Inline,
    /// Force a download.
    Attachment,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inline => "inline",
            Self::Attachment => "attachment",
        }
    }
}

#[derive(Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FileQuery {
    /// `inline` (default) or `attachment`.
    #[serde(default)]
    pub disposition: Disposition,
}
