use chrono::{DateTime, Utc};
use common::ProgramStatus;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::shared::{Pagination, double_option, validate_text, validate_title};
use crate::entity::{material, program, program_session};
use crate::error::AppError;

#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateProgramRequest {
    #[schema(example = "Grade 10 Algebra")]
    pub name: String,
    pub description: Option<String>,
    /// Must be an active tutor account.
    pub tutor_id: Option<i32>,
    /// Total program fee (>= 0).
    #[schema(example = 2500.0)]
    pub fee: Decimal,
    pub max_students: Option<i32>,
}

fn validate_fee(fee: Decimal) -> Result<(), AppError> {
    if fee < Decimal::ZERO {
        return Err(AppError::Validation(
            "Fee must be a non-negative number".into(),
        ));
    }
    if fee.normalize().scale() > 2 {
        return Err(AppError::Validation(
            "Fee must have at most two decimal places".into(),
        ));
    }
    Ok(())
}

fn validate_max_students(max: Option<i32>) -> Result<(), AppError> {
    if let Some(max) = max
        && max < 1
    {
        return Err(AppError::Validation("max_students must be >= 1".into()));
    }
    Ok(())
}

pub fn validate_create_program(payload: &CreateProgramRequest) -> Result<(), AppError> {
    validate_title(&payload.name, "Name")?;
    validate_text(payload.description.as_deref(), "Description", 5000)?;
    validate_fee(payload.fee)?;
    validate_max_students(payload.max_students)
}

/// Partial update. Nullable fields use `null` to clear.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct UpdateProgramRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<i32>)]
    pub tutor_id: Option<Option<i32>>,
    pub fee: Option<Decimal>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<i32>)]
    pub max_students: Option<Option<i32>>,
    pub status: Option<ProgramStatus>,
}

pub fn validate_update_program(payload: &UpdateProgramRequest) -> Result<(), AppError> {
    if let Some(name) = &payload.name {
        validate_title(name, "Name")?;
    }
    if let Some(Some(description)) = &payload.description {
        validate_text(Some(description), "Description", 5000)?;
    }
    if let Some(fee) = payload.fee {
        validate_fee(fee)?;
    }
    if let Some(max) = payload.max_students {
        validate_max_students(max)?;
    }
    Ok(())
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ProgramResponse {
    #[schema(example = 3)]
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub tutor_id: Option<i32>,
    pub fee: Decimal,
    pub max_students: Option<i32>,
    pub status: ProgramStatus,
    pub created_at: DateTime<Utc>,
}

impl From<program::Model> for ProgramResponse {
    fn from(p: program::Model) -> Self {
        Self {
            id: p.id,
            name: p.name,
            description: p.description,
            tutor_id: p.tutor_id,
            fee: p.fee,
            max_students: p.max_students,
            status: p.status,
            created_at: p.created_at,
        }
    }
}

#[derive(Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProgramListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    /// Ignored for students, who only see active programs.
    pub status: Option<ProgramStatus>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ProgramListResponse {
    pub data: Vec<ProgramResponse>,
    pub pagination: Pagination,
}

/// A scheduled class meeting, half-open `[starts_at, ends_at)`.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateSessionRequest {
    #[schema(example = "Week 1: Linear equations")]
    pub title: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

pub fn validate_create_session(payload: &CreateSessionRequest) -> Result<(), AppError> {
    validate_title(&payload.title, "Title")?;
    if payload.ends_at <= payload.starts_at {
        return Err(AppError::Validation(
            "ends_at must be after starts_at".into(),
        ));
    }
    if payload.ends_at - payload.starts_at > chrono::Duration::hours(12) {
        return Err(AppError::Validation(
            "A session may last at most 12 hours".into(),
        ));
    }
    Ok(())
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct SessionResponse {
    pub id: i32,
    pub program_id: i32,
    pub title: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

impl From<program_session::Model> for SessionResponse {
    fn from(s: program_session::Model) -> Self {
        Self {
            id: s.id,
            program_id: s.program_id,
            title: s.title,
            starts_at: s.starts_at,
            ends_at: s.ends_at,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct SessionListResponse {
    pub data: Vec<SessionResponse>,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateMaterialRequest {
    #[schema(example = "Module 2: Quadratics")]
    pub title: String,
    pub description: Option<String>,
    /// Fallback due date for assignments and assessments without their own.
    pub due_date: Option<DateTime<Utc>>,
}

pub fn validate_create_material(payload: &CreateMaterialRequest) -> Result<(), AppError> {
    validate_title(&payload.title, "Title")?;
    validate_text(payload.description.as_deref(), "Description", 10_000)
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct MaterialResponse {
    pub id: i32,
    pub program_id: i32,
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub created_by: i32,
    pub created_at: DateTime<Utc>,
}

impl From<material::Model> for MaterialResponse {
    fn from(m: material::Model) -> Self {
        Self {
            id: m.id,
            program_id: m.program_id,
            title: m.title,
            description: m.description,
            due_date: m.due_date,
            created_by: m.created_by,
            created_at: m.created_at,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct MaterialListResponse {
    pub data: Vec<MaterialResponse>,
}
