use std::fmt;

use serde::{Deserialize, Serialize};

#[cfg(feature = "sea-orm")]
use sea_orm::prelude::StringLen;

/// Upload category. Each kind lives in its own directory under the storage root.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "snake_case")]
pub enum UploadKind {
    /// Files attached to assessment attempts.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "assessments"))]
    Assessments,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "assignment_submissions"))]
    AssignmentSubmissions,
    /// Proof-of-payment files.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "payment_receipts"))]
    PaymentReceipts,
}

const DOCUMENT_EXTENSIONS: &[&str] = &["pdf", "doc", "docx", "txt", "zip", "png", "jpg", "jpeg"];
const RECEIPT_EXTENSIONS: &[&str] = &["pdf", "png", "jpg", "jpeg"];

impl UploadKind {
    pub const ALL: &'static [UploadKind] = &[
        Self::Assessments,
        Self::AssignmentSubmissions,
        Self::PaymentReceipts,
    ];

    /// Directory name under the storage root.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Assessments => "assessments",
            Self::AssignmentSubmissions => "assignment_submissions",
            Self::PaymentReceipts => "payment_receipts",
        }
    }

    pub fn from_dir_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.dir_name() == name)
    }

    /// Lowercase file extensions accepted for this kind.
    pub fn allowed_extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Assessments | Self::AssignmentSubmissions => DOCUMENT_EXTENSIONS,
            Self::PaymentReceipts => RECEIPT_EXTENSIONS,
        }
    }

    pub fn accepts_extension(&self, ext: &str) -> bool {
        let ext = ext.to_ascii_lowercase();
        self.allowed_extensions().contains(&ext.as_str())
    }
}

impl fmt::Display for UploadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}
