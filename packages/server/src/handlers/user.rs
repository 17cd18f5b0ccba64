use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use common::{Role, UserStatus};
use sea_orm::sea_query::OnConflict;
use sea_orm::*;
use tracing::instrument;

use crate::entity::{session, user, user_profile};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::models::shared::{ApiResponse, Pagination, non_blank, page_params};
use crate::models::user::{
    CreateUserRequest, ProfileResponse, UpdateProfileRequest, UpdateUserStatusRequest,
    UserListQuery, UserListResponse, UserResponse, validate_create_user,
    validate_update_profile,
};
use crate::state::AppState;
use crate::utils::hash;

#[utoipa::path(
    post,
    path = "/",
    tag = "Users",
    operation_id = "createUser",
    summary = "Create a user account",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = ApiResponse<UserResponse>),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 403, description = "Admins only (PERMISSION_DENIED)", body = ErrorBody),
        (status = 409, description = "Username taken (USERNAME_TAKEN)", body = ErrorBody),
    ),
    security(("session" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(username = %payload.username))]
pub async fn create_user(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserResponse>>), AppError> {
    auth_user.require_role(Role::Admin)?;
    validate_create_user(&payload)?;

    let password = hash::hash_password(&payload.password)
        .map_err(|e| AppError::Upstream(format!("Password hash error: {e}")))?;

    let new_user = user::ActiveModel {
        username: Set(payload.username.trim().to_string()),
        password: Set(password),
        full_name: Set(payload.full_name.trim().to_string()),
        email: Set(non_blank(payload.email)),
        role: Set(payload.role),
        status: Set(UserStatus::Active),
        created_at: Set(Utc::now()),
        ..Default::default()
    };

    let user = new_user.insert(&state.db).await.map_err(|e| match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => AppError::UsernameTaken,
        _ => AppError::from(e),
    })?;

    tracing::info!(user_id = user.id, role = %user.role, "User created");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(UserResponse::from(user))),
    ))
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Users",
    operation_id = "listUsers",
    summary = "List users",
    params(UserListQuery),
    responses(
        (status = 200, description = "Paginated users", body = ApiResponse<UserListResponse>),
        (status = 403, description = "Admins only (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("session" = [])),
)]
#[instrument(skip(state, auth_user, query))]
pub async fn list_users(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<UserListQuery>,
) -> Result<Json<ApiResponse<UserListResponse>>, AppError> {
    auth_user.require_role(Role::Admin)?;

    let (page, per_page) = page_params(query.page, query.per_page);

    let mut select = user::Entity::find();
    if let Some(role) = query.role {
        select = select.filter(user::Column::Role.eq(role));
    }
    if let Some(status) = query.status {
        select = select.filter(user::Column::Status.eq(status));
    }

    let total = select.clone().count(&state.db).await?;
    let users = select
        .order_by_asc(user::Column::Id)
        .offset(Some((page - 1) * per_page))
        .limit(Some(per_page))
        .all(&state.db)
        .await?;

    Ok(Json(ApiResponse::ok(UserListResponse {
        data: users.into_iter().map(UserResponse::from).collect(),
        pagination: Pagination::new(page, per_page, total),
    })))
}

#[utoipa::path(
    patch,
    path = "/{id}/status",
    tag = "Users",
    operation_id = "updateUserStatus",
    summary = "Activate or deactivate a user",
    description = "Deactivating also ends every session of that user. Admins cannot deactivate themselves.",
    params(("id" = i32, Path, description = "User ID")),
    request_body = UpdateUserStatusRequest,
    responses(
        (status = 200, description = "Updated user", body = ApiResponse<UserResponse>),
        (status = 403, description = "Admins only (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "User not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("session" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(user_id = %id))]
pub async fn update_user_status(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<UpdateUserStatusRequest>,
) -> Result<Json<ApiResponse<UserResponse>>, AppError> {
    auth_user.require_role(Role::Admin)?;
    if id == auth_user.user_id && payload.status == UserStatus::Inactive {
        return Err(AppError::Validation(
            "You cannot deactivate your own account".into(),
        ));
    }

    let txn = state.db.begin().await?;

    let existing = user::Entity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    let mut active: user::ActiveModel = existing.into();
    active.status = Set(payload.status);
    let updated = active.update(&txn).await?;

    if payload.status == UserStatus::Inactive {
        let ended = session::Entity::delete_many()
            .filter(session::Column::UserId.eq(id))
            .exec(&txn)
            .await?;
        tracing::info!(user_id = id, sessions = ended.rows_affected, "User deactivated");
    }

    txn.commit().await?;

    Ok(Json(ApiResponse::ok(UserResponse::from(updated))))
}

#[utoipa::path(
    get,
    path = "/me/profile",
    tag = "Users",
    operation_id = "getMyProfile",
    summary = "Get own profile",
    responses(
        (status = 200, description = "Profile (fields null when never saved)", body = ApiResponse<ProfileResponse>),
        (status = 401, description = "Not signed in (SESSION_MISSING, SESSION_INVALID)", body = ErrorBody),
    ),
    security(("session" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id))]
pub async fn get_my_profile(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<ProfileResponse>>, AppError> {
    let profile = user_profile::Entity::find_by_id(auth_user.user_id)
        .one(&state.db)
        .await?
        .map(ProfileResponse::from)
        .unwrap_or_else(|| ProfileResponse::empty(auth_user.user_id));
    Ok(Json(ApiResponse::ok(profile)))
}

#[utoipa::path(
    put,
    path = "/me/profile",
    tag = "Users",
    operation_id = "updateMyProfile",
    summary = "Create or replace own profile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Saved profile", body = ApiResponse<ProfileResponse>),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
    ),
    security(("session" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(user_id = auth_user.user_id))]
pub async fn update_my_profile(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<UpdateProfileRequest>,
) -> Result<Json<ApiResponse<ProfileResponse>>, AppError> {
    validate_update_profile(&payload)?;

    let model = user_profile::ActiveModel {
        user_id: Set(auth_user.user_id),
        phone: Set(non_blank(payload.phone)),
        address: Set(non_blank(payload.address)),
        bio: Set(non_blank(payload.bio)),
        updated_at: Set(Utc::now()),
        ..Default::default()
    };

    user_profile::Entity::insert(model)
        .on_conflict(
            OnConflict::column(user_profile::Column::UserId)
                .update_columns([
                    user_profile::Column::Phone,
                    user_profile::Column::Address,
                    user_profile::Column::Bio,
                    user_profile::Column::UpdatedAt,
                ])
                .to_owned(),
        )
        .exec_without_returning(&state.db)
        .await?;

    let saved = user_profile::Entity::find_by_id(auth_user.user_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::Upstream("profile missing after upsert".into()))?;

    Ok(Json(ApiResponse::ok(ProfileResponse::from(saved))))
}
