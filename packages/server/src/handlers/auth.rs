use axum::{Json, extract::State};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::{Duration, Utc};
use sea_orm::*;
use tracing::instrument;

use crate::entity::{session, user};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::models::auth::{LoginRequest, LoginResponse, MeResponse, validate_login_request};
use crate::models::shared::{ApiResponse, MessageResponse};
use crate::state::AppState;
use crate::utils::hash;

#[utoipa::path(
    post,
    path = "/login",
    tag = "Auth",
    operation_id = "login",
    summary = "Sign in",
    description = "Verifies the password and sets an HttpOnly session cookie. \
        Inactive accounts cannot sign in.",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = ApiResponse<LoginResponse>),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Bad credentials (INVALID_CREDENTIALS)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, jar, payload), fields(username = %payload.username))]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<(CookieJar, Json<ApiResponse<LoginResponse>>), AppError> {
    validate_login_request(&payload)?;

    let user = user::Entity::find()
        .filter(user::Column::Username.eq(payload.username.trim()))
        .one(&state.db)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    let is_valid = hash::verify_password(&payload.password, &user.password)
        .map_err(|e| AppError::Upstream(format!("Password verify error: {e}")))?;
    if !is_valid || !user.status.is_active() {
        return Err(AppError::InvalidCredentials);
    }

    let now = Utc::now();
    let expires_at = now + Duration::hours(state.config.auth.session_ttl_hours);
    let token = hash::new_session_token();

    session::Entity::delete_many()
        .filter(session::Column::UserId.eq(user.id))
        .filter(session::Column::ExpiresAt.lte(now))
        .exec(&state.db)
        .await?;

    session::ActiveModel {
        token_hash: Set(hash::sha256_hex(&token)),
        user_id: Set(user.id),
        created_at: Set(now),
        expires_at: Set(expires_at),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    let cookie = Cookie::build((state.config.auth.cookie_name.clone(), token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.auth.secure_cookie);

    tracing::info!(user_id = user.id, "User signed in");

    Ok((
        jar.add(cookie),
        Json(ApiResponse::ok(LoginResponse {
            user: MeResponse::from(user),
            expires_at,
        })),
    ))
}

#[utoipa::path(
    post,
    path = "/logout",
    tag = "Auth",
    operation_id = "logout",
    summary = "Sign out",
    description = "Deletes the server-side session and clears the cookie. Safe to call without a session.",
    responses((status = 200, description = "Signed out", body = ApiResponse<MessageResponse>)),
)]
#[instrument(skip(state, jar))]
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<ApiResponse<MessageResponse>>), AppError> {
    let cookie_name = state.config.auth.cookie_name.clone();

    if let Some(cookie) = jar.get(&cookie_name) {
        session::Entity::delete_by_id(hash::sha256_hex(cookie.value()))
            .exec(&state.db)
            .await?;
    }

    Ok((
        jar.remove(Cookie::build((cookie_name, "")).path("/")),
        Json(ApiResponse::ok(MessageResponse {
            message: "Logged out".into(),
        })),
    ))
}

#[utoipa::path(
    get,
    path = "/me",
    tag = "Auth",
    operation_id = "me",
    summary = "Current user",
    responses(
        (status = 200, description = "The signed-in account", body = ApiResponse<MeResponse>),
        (status = 401, description = "No or invalid session (SESSION_MISSING, SESSION_INVALID)", body = ErrorBody),
    ),
    security(("session" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id))]
pub async fn me(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<MeResponse>>, AppError> {
    let user = user::Entity::find_by_id(auth_user.user_id)
        .one(&state.db)
        .await?
        .ok_or(AppError::SessionInvalid)?;
    Ok(Json(ApiResponse::ok(MeResponse::from(user))))
}
