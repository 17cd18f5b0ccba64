use chrono::{DateTime, Utc};
use common::EnrollmentStatus;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::shared::Pagination;
use crate::entity::enrollment;

/// Students enroll themselves; admins pass `student_id`.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateEnrollmentRequest {
    #[schema(example = 3)]
    pub program_id: i32,
    /// Required for admins, ignored for students.
    pub student_id: Option<i32>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct EnrollmentResponse {
    #[schema(example = 11)]
    pub id: i32,
    pub program_id: i32,
    pub student_id: i32,
    pub status: EnrollmentStatus,
    pub enrolled_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<enrollment::Model> for EnrollmentResponse {
    fn from(e: enrollment::Model) -> Self {
        Self {
            id: e.id,
            program_id: e.program_id,
            student_id: e.student_id,
            status: e.status,
            enrolled_at: e.enrolled_at,
            updated_at: e.updated_at,
        }
    }
}

#[derive(Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EnrollmentListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub program_id: Option<i32>,
    pub status: Option<EnrollmentStatus>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct EnrollmentListResponse {
    pub data: Vec<EnrollmentResponse>,
    pub pagination: Pagination,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct UpdateEnrollmentStatusRequest {
    pub status: EnrollmentStatus,
}

/// Recomputed from validated payments on every request.
#[derive(Serialize, utoipa::ToSchema)]
pub struct BalanceResponse {
    pub enrollment_id: i32,
    #[schema(example = 2500.0)]
    pub total_fee: Decimal,
    #[schema(example = 500.0)]
    pub total_paid: Decimal,
    #[schema(example = 2000.0)]
    pub balance: Decimal,
}
