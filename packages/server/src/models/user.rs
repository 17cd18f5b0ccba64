use chrono::{DateTime, Utc};
use common::{Role, UserStatus};
use serde::{Deserialize, Serialize};

use super::shared::{Pagination, validate_text};
use crate::entity::{user, user_profile};
use crate::error::AppError;

/// Request body for creating an account (admin only).
#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateUserRequest {
    /// Unique username (1-32 chars, alphanumeric and underscores).
    #[schema(example = "juan_dela_cruz")]
    pub username: String,
    /// Password (8-128 characters).
    #[schema(example = "s3cure_P@ss!")]
    pub password: String,
    #[schema(example = "Juan Dela Cruz")]
    pub full_name: String,
    pub email: Option<String>,
    pub role: Role,
}

pub fn validate_create_user(payload: &CreateUserRequest) -> Result<(), AppError> {
    let username = payload.username.trim();
    if username.is_empty() || username.chars().count() > 32 {
        return Err(AppError::Validation(
            "Username must be 1-32 characters".into(),
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(AppError::Validation(
            "Username must contain only letters, digits, and underscores".into(),
        ));
    }
    if payload.password.len() < 8 || payload.password.len() > 128 {
        return Err(AppError::Validation(
            "Password must be 8-128 characters".into(),
        ));
    }
    let full_name = payload.full_name.trim();
    if full_name.is_empty() || full_name.chars().count() > 128 {
        return Err(AppError::Validation(
            "Full name must be 1-128 characters".into(),
        ));
    }
    if let Some(email) = payload.email.as_deref().map(str::trim)
        && !email.is_empty()
        && (email.len() > 254 || !email.contains('@'))
    {
        return Err(AppError::Validation("Email address is not valid".into()));
    }
    Ok(())
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct UserResponse {
    #[schema(example = 42)]
    pub id: i32,
    #[schema(example = "juan_dela_cruz")]
    pub username: String,
    pub full_name: String,
    pub email: Option<String>,
    pub role: Role,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
}

impl From<user::Model> for UserResponse {
    fn from(u: user::Model) -> Self {
        Self {
            id: u.id,
            username: u.username,
            full_name: u.full_name,
            email: u.email,
            role: u.role,
            status: u.status,
            created_at: u.created_at,
        }
    }
}

/// Query parameters for listing users.
#[derive(Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub role: Option<Role>,
    pub status: Option<UserStatus>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct UserListResponse {
    pub data: Vec<UserResponse>,
    pub pagination: Pagination,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct UpdateUserStatusRequest {
    pub status: UserStatus,
}

/// Contact details; every field is optional.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ProfileResponse {
    pub user_id: i32,
    #[schema(example = "+63 917 555 0101")]
    pub phone: Option<String>,
    pub address: Option<String>,
    pub bio: Option<String>,
    /// `null` until the profile is first saved.
    pub updated_at: Option<DateTime<Utc>>,
}

impl ProfileResponse {
    pub fn empty(user_id: i32) -> Self {
        Self {
            user_id,
            phone: None,
            address: None,
            bio: None,
            updated_at: None,
        }
    }
}

impl From<user_profile::Model> for ProfileResponse {
    fn from(p: user_profile::Model) -> Self {
        Self {
            user_id: p.user_id,
            phone: p.phone,
            address: p.address,
            bio: p.bio,
            updated_at: Some(p.updated_at),
        }
    }
}

/// Replaces the whole profile; omitted fields are cleared.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct UpdateProfileRequest {
    pub phone: Option<String>,
    pub address: Option<String>,
    pub bio: Option<String>,
}

pub fn validate_update_profile(payload: &UpdateProfileRequest) -> Result<(), AppError> {
    validate_text(payload.phone.as_deref(), "Phone", 32)?;
    validate_text(payload.address.as_deref(), "Address", 512)?;
    validate_text(payload.bio.as_deref(), "Bio", 2000)?;
    Ok(())
}
