use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use common::payment::balance;
use common::{EnrollmentStatus, PaymentStatus, ProgramStatus, Role, UserStatus};
use rust_decimal::Decimal;
use sea_orm::sea_query::LockType;
use sea_orm::*;
use tracing::instrument;

use crate::entity::{enrollment, payment, program, user};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::models::enrollment::{
    BalanceResponse, CreateEnrollmentRequest, EnrollmentListQuery, EnrollmentListResponse,
    EnrollmentResponse, UpdateEnrollmentStatusRequest,
};
use crate::models::shared::{ApiResponse, Pagination, page_params};
use crate::state::AppState;
use crate::utils::access::{find_program, manages_program};

pub(crate) async fn find_enrollment_by_id<C: ConnectionTrait>(
    db: &C,
    id: i32,
) -> Result<enrollment::Model, AppError> {
    enrollment::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Enrollment not found".into()))
}

/// Owner student, the program's tutor, or an admin.
pub(crate) fn require_enrollment_viewer(
    auth: &AuthUser,
    enrollment: &enrollment::Model,
    program: &program::Model,
) -> Result<(), AppError> {
    if enrollment.student_id == auth.user_id || manages_program(auth, program) {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

/// `program fee - sum(validated payments)`, always recomputed.
pub(crate) async fn compute_balance<C: ConnectionTrait>(
    db: &C,
    enrollment: &enrollment::Model,
    program: &program::Model,
) -> Result<BalanceResponse, AppError> {
    let validated: Vec<Decimal> = payment::Entity::find()
        .select_only()
        .column(payment::Column::Amount)
        .filter(payment::Column::EnrollmentId.eq(enrollment.id))
        .filter(payment::Column::Status.eq(PaymentStatus::Validated))
        .into_tuple()
        .all(db)
        .await?;

    let total_paid: Decimal = validated.iter().sum();
    Ok(BalanceResponse {
        enrollment_id: enrollment.id,
        total_fee: program.fee,
        total_paid: total_paid.normalize(),
        balance: balance(program.fee, validated),
    })
}

#[utoipa::path(
    post,
    path = "/",
    tag = "Enrollments",
    operation_id = "createEnrollment",
    summary = "Enroll a student in a program",
    description = "Students enroll themselves and start as `pending`; admins enroll a given \
        student directly as `active`.",
    request_body = CreateEnrollmentRequest,
    responses(
        (status = 201, description = "Enrollment created", body = ApiResponse<EnrollmentResponse>),
        (status = 400, description = "Program inactive or bad student (VALIDATION_ERROR)", body = ErrorBody),
        (status = 403, description = "Tutors cannot enroll (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Program not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Already enrolled or program full (CONFLICT)", body = ErrorBody),
    ),
    security(("session" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(program_id = payload.program_id))]
pub async fn create_enrollment(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateEnrollmentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<EnrollmentResponse>>), AppError> {
    auth_user.require_any_role(&[Role::Admin, Role::Student])?;

    let (student_id, initial_status) = if auth_user.is_admin() {
        let student_id = payload
            .student_id
            .ok_or_else(|| AppError::Validation("student_id is required".into()))?;
        (student_id, EnrollmentStatus::Active)
    } else {
        (auth_user.user_id, EnrollmentStatus::Pending)
    };

    let txn = state.db.begin().await?;

    // Lock the program row so capacity checks don't race.
    let program = program::Entity::find_by_id(payload.program_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Program not found".into()))?;
    if program.status != ProgramStatus::Active {
        return Err(AppError::Validation(
            "Program is not open for enrollment".into(),
        ));
    }

    let student = user::Entity::find_by_id(student_id).one(&txn).await?;
    if !matches!(student, Some(ref s) if s.role == Role::Student && s.status == UserStatus::Active)
    {
        return Err(AppError::Validation(format!(
            "User {student_id} is not an active student"
        )));
    }

    if let Some(max) = program.max_students {
        let active = enrollment::Entity::find()
            .filter(enrollment::Column::ProgramId.eq(program.id))
            .filter(enrollment::Column::Status.eq(EnrollmentStatus::Active))
            .count(&txn)
            .await?;
        if active >= max as u64 {
            return Err(AppError::Conflict("Program is full".into()));
        }
    }

    let now = Utc::now();
    let created = enrollment::ActiveModel {
        program_id: Set(program.id),
        student_id: Set(student_id),
        status: Set(initial_status),
        enrolled_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await
    .map_err(|e| match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            AppError::Conflict("Student is already enrolled in this program".into())
        }
        _ => AppError::from(e),
    })?;

    txn.commit().await?;

    tracing::info!(enrollment_id = created.id, student_id, "Enrollment created");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(EnrollmentResponse::from(created))),
    ))
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Enrollments",
    operation_id = "listEnrollments",
    summary = "List enrollments",
    description = "Students see their own, tutors those in their programs, admins all.",
    params(EnrollmentListQuery),
    responses(
        (status = 200, description = "Paginated enrollments", body = ApiResponse<EnrollmentListResponse>),
    ),
    security(("session" = [])),
)]
#[instrument(skip(state, auth_user, query))]
pub async fn list_enrollments(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<EnrollmentListQuery>,
) -> Result<Json<ApiResponse<EnrollmentListResponse>>, AppError> {
    let (page, per_page) = page_params(query.page, query.per_page);

    let mut select = enrollment::Entity::find();
    match auth_user.role {
        Role::Admin => {}
        Role::Student => {
            select = select.filter(enrollment::Column::StudentId.eq(auth_user.user_id))
        }
        Role::Tutor => {
            let own: Vec<i32> = program::Entity::find()
                .select_only()
                .column(program::Column::Id)
                .filter(program::Column::TutorId.eq(auth_user.user_id))
                .into_tuple()
                .all(&state.db)
                .await?;
            select = select.filter(enrollment::Column::ProgramId.is_in(own));
        }
    }
    if let Some(program_id) = query.program_id {
        select = select.filter(enrollment::Column::ProgramId.eq(program_id));
    }
    if let Some(status) = query.status {
        select = select.filter(enrollment::Column::Status.eq(status));
    }

    let total = select.clone().count(&state.db).await?;
    let rows = select
        .order_by_desc(enrollment::Column::EnrolledAt)
        .order_by_desc(enrollment::Column::Id)
        .offset(Some((page - 1) * per_page))
        .limit(Some(per_page))
        .all(&state.db)
        .await?;

    Ok(Json(ApiResponse::ok(EnrollmentListResponse {
        data: rows.into_iter().map(EnrollmentResponse::from).collect(),
        pagination: Pagination::new(page, per_page, total),
    })))
}

#[utoipa::path(
    patch,
    path = "/{id}/status",
    tag = "Enrollments",
    operation_id = "updateEnrollmentStatus",
    summary = "Change an enrollment's status",
    description = "Admins may make any allowed transition. The program's tutor may only \
        activate or complete.",
    params(("id" = i32, Path, description = "Enrollment ID")),
    request_body = UpdateEnrollmentStatusRequest,
    responses(
        (status = 200, description = "Updated enrollment", body = ApiResponse<EnrollmentResponse>),
        (status = 403, description = "Not allowed (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Enrollment not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Transition not allowed from current status (CONFLICT)", body = ErrorBody),
    ),
    security(("session" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(enrollment_id = %id))]
pub async fn update_enrollment_status(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<UpdateEnrollmentStatusRequest>,
) -> Result<Json<ApiResponse<EnrollmentResponse>>, AppError> {
    let txn = state.db.begin().await?;

    let current = enrollment::Entity::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Enrollment not found".into()))?;
    let program = find_program(&txn, current.program_id).await?;

    let tutor_allowed = matches!(
        payload.status,
        EnrollmentStatus::Active | EnrollmentStatus::Completed
    );
    if !(auth_user.is_admin() || (tutor_allowed && manages_program(&auth_user, &program))) {
        return Err(AppError::Forbidden);
    }

    if !current.status.can_transition_to(payload.status) {
        return Err(AppError::Conflict(format!(
            "Cannot change enrollment from {} to {}",
            current.status.as_str(),
            payload.status.as_str()
        )));
    }

    let mut active: enrollment::ActiveModel = current.into();
    active.status = Set(payload.status);
    active.updated_at = Set(Utc::now());
    let updated = active.update(&txn).await?;

    txn.commit().await?;

    Ok(Json(ApiResponse::ok(EnrollmentResponse::from(updated))))
}

#[utoipa::path(
    get,
    path = "/{id}/balance",
    tag = "Enrollments",
    operation_id = "getEnrollmentBalance",
    summary = "Outstanding balance",
    description = "Program fee minus the sum of validated payments. Computed on every read.",
    params(("id" = i32, Path, description = "Enrollment ID")),
    responses(
        (status = 200, description = "Balance", body = ApiResponse<BalanceResponse>),
        (status = 403, description = "Not the student, tutor or an admin (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Enrollment not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("session" = [])),
)]
#[instrument(skip(state, auth_user), fields(enrollment_id = %id))]
pub async fn get_balance(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<BalanceResponse>>, AppError> {
    let enrollment = find_enrollment_by_id(&state.db, id).await?;
    let program = find_program(&state.db, enrollment.program_id).await?;
    require_enrollment_viewer(&auth_user, &enrollment, &program)?;

    let balance = compute_balance(&state.db, &enrollment, &program).await?;
    Ok(Json(ApiResponse::ok(balance)))
}
