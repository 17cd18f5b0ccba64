use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::CookieJar;
use chrono::Utc;
use common::Role;
use sea_orm::EntityTrait;

use crate::entity::{session, user};
use crate::error::AppError;
use crate::state::AppState;
use crate::utils::hash::sha256_hex;

/// Caller identity resolved from the session cookie.
///
/// Add this as a handler parameter to require a signed-in user. Role and
/// ownership checks happen in the handler body and fail with `Forbidden`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i32,
    pub username: String,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is(&self, role: Role) -> bool {
        self.role == role
    }

    pub fn require_role(&self, role: Role) -> Result<(), AppError> {
        if self.role == role {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }

    pub fn require_any_role(&self, roles: &[Role]) -> Result<(), AppError> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar
            .get(&state.config.auth.cookie_name)
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty())
            .ok_or(AppError::Unauthenticated)?;

        let (session, user) = session::Entity::find_by_id(sha256_hex(&token))
            .find_also_related(user::Entity)
            .one(&state.db)
            .await?
            .ok_or(AppError::SessionInvalid)?;

        if session.expires_at <= Utc::now() {
            return Err(AppError::SessionInvalid);
        }

        let user = user.ok_or(AppError::SessionInvalid)?;
        if !user.status.is_active() {
            return Err(AppError::SessionInvalid);
        }

        Ok(AuthUser {
            user_id: user.id,
            username: user.username,
            role: user.role,
        })
    }
}
