//! Assessment attempt lifecycle: start, submit, edit before grading, grade.
//!
//! Expiry is lazy. Every handler that touches an in-progress attempt first
//! asks `common::attempt` whether the time limit has passed and persists
//! `expired` when it has.

use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use common::attempt::{
    EditRejection, StartDecision, SubmitDecision, can_grade_attempt, check_attempt_edit,
    decide_start, decide_submit, time_limit_end,
};
use common::grading::{percentage, validate_score};
use common::storage::UploadKind;
use common::{AttemptStatus, Role};
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::*;
use tracing::instrument;

use super::assessment::{AssessmentContext, load_assessment};
use super::file::{file_info, file_infos};
use crate::entity::assessment_attempt;
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::models::assessment::{
    AttemptListResponse, AttemptResponse, GradeRequest, validate_grade_request,
};
use crate::models::shared::{ApiResponse, non_blank};
use crate::state::AppState;
use crate::utils::access::{require_enrolled, require_program_manager};
use crate::utils::activity;
use crate::utils::upload::{UploadForm, delete_file_row, read_upload_form, remove_stored_file};

async fn find_attempt<C: ConnectionTrait>(
    db: &C,
    id: i32,
    lock: bool,
) -> Result<assessment_attempt::Model, AppError> {
    let mut select = assessment_attempt::Entity::find_by_id(id);
    if lock {
        select = select.lock(LockType::Update);
    }
    select
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Attempt not found".into()))
}

/// Persist `expired` on every overdue in-progress attempt of an assessment,
/// optionally for one student only.
async fn expire_overdue<C: ConnectionTrait>(
    db: &C,
    assessment_id: i32,
    student_id: Option<i32>,
    now: DateTime<Utc>,
) -> Result<u64, AppError> {
    let mut update = assessment_attempt::Entity::update_many()
        .col_expr(
            assessment_attempt::Column::Status,
            Expr::value(AttemptStatus::Expired),
        )
        .col_expr(assessment_attempt::Column::UpdatedAt, Expr::value(now))
        .filter(assessment_attempt::Column::AssessmentId.eq(assessment_id))
        .filter(assessment_attempt::Column::Status.eq(AttemptStatus::InProgress))
        .filter(assessment_attempt::Column::SubmittedAt.is_null())
        .filter(assessment_attempt::Column::TimeLimitEnd.lt(now));
    if let Some(student_id) = student_id {
        update = update.filter(assessment_attempt::Column::StudentId.eq(student_id));
    }
    let expired = update.exec(db).await?.rows_affected;
    if expired > 0 {
        tracing::info!(assessment_id, expired, "Expired overdue attempts");
    }
    Ok(expired)
}

/// Mark one attempt expired inside the caller's transaction.
async fn mark_expired<C: ConnectionTrait>(
    db: &C,
    attempt: assessment_attempt::Model,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    let id = attempt.id;
    let mut active: assessment_attempt::ActiveModel = attempt.into();
    active.status = Set(AttemptStatus::Expired);
    active.updated_at = Set(now);
    active.update(db).await?;
    tracing::info!(attempt_id = id, "Attempt expired past its time limit");
    Ok(())
}

async fn attempt_response<C: ConnectionTrait>(
    db: &C,
    attempt: assessment_attempt::Model,
) -> Result<AttemptResponse, AppError> {
    let file = file_info(db, attempt.file_id).await?;
    Ok(AttemptResponse::new(attempt, file))
}

fn edit_conflict(rejection: EditRejection) -> AppError {
    match rejection {
        EditRejection::Expired => AppError::AttemptExpired,
        other => AppError::Conflict(other.message().into()),
    }
}

#[utoipa::path(
    post,
    path = "/{id}/attempts",
    tag = "Attempts",
    operation_id = "startAttempt",
    summary = "Start or resume an attempt",
    description = "Creates the caller's attempt (201) or returns the running one (200). \
        A running attempt past its time limit is marked expired and ATTEMPT_EXPIRED is returned; \
        no new attempt is created. Starting after submitting fails with CONFLICT.",
    params(("id" = i32, Path, description = "Assessment ID")),
    responses(
        (status = 200, description = "Existing attempt resumed", body = ApiResponse<AttemptResponse>),
        (status = 201, description = "Attempt started", body = ApiResponse<AttemptResponse>),
        (status = 403, description = "Not an enrolled student (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Assessment not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Already submitted (CONFLICT) or time is up (ATTEMPT_EXPIRED)", body = ErrorBody),
    ),
    security(("session" = [])),
)]
#[instrument(skip(state, auth_user), fields(assessment_id = %id, student_id = auth_user.user_id))]
pub async fn start_attempt(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<(StatusCode, Json<ApiResponse<AttemptResponse>>), AppError> {
    auth_user.require_role(Role::Student)?;

    let ctx = load_assessment(&state.db, id).await?;
    require_enrolled(&state.db, ctx.program.id, auth_user.user_id).await?;

    let now = Utc::now();
    let txn = state.db.begin().await?;

    let existing = assessment_attempt::Entity::find()
        .filter(assessment_attempt::Column::AssessmentId.eq(id))
        .filter(assessment_attempt::Column::StudentId.eq(auth_user.user_id))
        .lock(LockType::Update)
        .one(&txn)
        .await?;

    let decision = decide_start(existing.as_ref().map(|a| a.state()).as_ref(), now);

    match (decision, existing) {
        (StartDecision::Resume, Some(attempt)) => {
            txn.commit().await?;
            let response = attempt_response(&state.db, attempt).await?;
            Ok((StatusCode::OK, Json(ApiResponse::ok(response))))
        }
        (StartDecision::Expire, Some(attempt)) => {
            mark_expired(&txn, attempt, now).await?;
            txn.commit().await?;
            Err(AppError::AttemptExpired)
        }
        (StartDecision::AlreadyExpired, _) => Err(AppError::AttemptExpired),
        (StartDecision::AlreadySubmitted, _) => Err(AppError::Conflict(
            "This assessment has already been submitted".into(),
        )),
        (StartDecision::Create, _) | (_, None) => {
            let created = assessment_attempt::ActiveModel {
                assessment_id: Set(id),
                student_id: Set(auth_user.user_id),
                status: Set(AttemptStatus::InProgress),
                started_at: Set(now),
                time_limit_end: Set(time_limit_end(now, ctx.assessment.time_limit_minutes)),
                submitted_at: Set(None),
                is_late: Set(false),
                file_id: Set(None),
                comments: Set(None),
                edited_at: Set(None),
                score: Set(None),
                percentage: Set(None),
                feedback: Set(None),
                graded_by: Set(None),
                graded_at: Set(None),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(&txn)
            .await
            .map_err(|e| match e.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(_)) => {
                    AppError::Conflict("An attempt was started concurrently; retry".into())
                }
                _ => AppError::from(e),
            })?;
            txn.commit().await?;

            tracing::info!(attempt_id = created.id, "Attempt started");
            Ok((
                StatusCode::CREATED,
                Json(ApiResponse::ok(AttemptResponse::new(created, None))),
            ))
        }
    }
}

#[utoipa::path(
    get,
    path = "/{id}/attempts",
    tag = "Attempts",
    operation_id = "listAttempts",
    summary = "List all attempts on an assessment",
    params(("id" = i32, Path, description = "Assessment ID")),
    responses(
        (status = 200, description = "Attempts", body = ApiResponse<AttemptListResponse>),
        (status = 403, description = "Not the program's tutor (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Assessment not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("session" = [])),
)]
#[instrument(skip(state, auth_user), fields(assessment_id = %id))]
pub async fn list_attempts(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<AttemptListResponse>>, AppError> {
    let ctx = load_assessment(&state.db, id).await?;
    require_program_manager(&auth_user, &ctx.program)?;

    expire_overdue(&state.db, id, None, Utc::now()).await?;

    let attempts = assessment_attempt::Entity::find()
        .filter(assessment_attempt::Column::AssessmentId.eq(id))
        .order_by_asc(assessment_attempt::Column::StartedAt)
        .all(&state.db)
        .await?;

    let mut files = file_infos(&state.db, attempts.iter().filter_map(|a| a.file_id)).await?;
    let data = attempts
        .into_iter()
        .map(|a| {
            let file = a.file_id.and_then(|f| files.remove(&f));
            AttemptResponse::new(a, file)
        })
        .collect();

    Ok(Json(ApiResponse::ok(AttemptListResponse { data })))
}

#[utoipa::path(
    get,
    path = "/{id}/attempts/me",
    tag = "Attempts",
    operation_id = "getMyAttempt",
    summary = "Get own attempt",
    description = "An in-progress attempt past its time limit is reported (and stored) as `expired`.",
    params(("id" = i32, Path, description = "Assessment ID")),
    responses(
        (status = 200, description = "The caller's attempt", body = ApiResponse<AttemptResponse>),
        (status = 404, description = "No attempt yet (NOT_FOUND)", body = ErrorBody),
    ),
    security(("session" = [])),
)]
#[instrument(skip(state, auth_user), fields(assessment_id = %id, student_id = auth_user.user_id))]
pub async fn get_my_attempt(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<AttemptResponse>>, AppError> {
    auth_user.require_role(Role::Student)?;

    expire_overdue(&state.db, id, Some(auth_user.user_id), Utc::now()).await?;

    let attempt = assessment_attempt::Entity::find()
        .filter(assessment_attempt::Column::AssessmentId.eq(id))
        .filter(assessment_attempt::Column::StudentId.eq(auth_user.user_id))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("No attempt for this assessment".into()))?;

    Ok(Json(ApiResponse::ok(
        attempt_response(&state.db, attempt).await?,
    )))
}

/// Record the new upload (if any) and comments on the attempt.
async fn apply_upload<C: ConnectionTrait>(
    txn: &C,
    mut active: assessment_attempt::ActiveModel,
    form: &UploadForm,
    owner_id: i32,
) -> Result<assessment_attempt::ActiveModel, AppError> {
    if let Some(upload) = &form.file {
        let row = upload.insert(txn, owner_id).await?;
        active.file_id = Set(Some(row.id));
    }
    if let Some(comments) = form.text("comments") {
        active.comments = Set(Some(comments));
    }
    Ok(active)
}

/// Drop the file row an attempt no longer points at; returns its stored path.
async fn release_previous_file<C: ConnectionTrait>(
    txn: &C,
    previous: Option<i32>,
    current: Option<i32>,
) -> Result<Option<String>, AppError> {
    match previous {
        Some(old) if current != Some(old) => delete_file_row(txn, old).await,
        _ => Ok(None),
    }
}

/// Settle disk state once the transaction outcome is known: a replaced file
/// is removed after commit, a fresh upload is removed after failure.
async fn finish_with_upload(
    state: &AppState,
    form: UploadForm,
    result: Result<(assessment_attempt::Model, Option<String>), AppError>,
) -> Result<assessment_attempt::Model, AppError> {
    match result {
        Ok((attempt, replaced_path)) => {
            if let Some(path) = replaced_path {
                remove_stored_file(&*state.store, &path).await;
                tracing::info!(attempt_id = attempt.id, "Replaced attempt file");
            }
            Ok(attempt)
        }
        Err(e) => {
            if let Some(upload) = form.file {
                upload.discard(&*state.store).await;
            }
            Err(e)
        }
    }
}

async fn submit_in_txn(
    state: &AppState,
    attempt_id: i32,
    ctx: &AssessmentContext,
    form: &UploadForm,
    owner_id: i32,
    now: DateTime<Utc>,
) -> Result<(assessment_attempt::Model, Option<String>), AppError> {
    let txn = state.db.begin().await?;
    let attempt = find_attempt(&txn, attempt_id, true).await?;

    match decide_submit(&attempt.state(), ctx.due_date(), now) {
        SubmitDecision::AlreadySubmitted => Err(AppError::Conflict(
            "This assessment has already been submitted".into(),
        )),
        SubmitDecision::AlreadyExpired => Err(AppError::AttemptExpired),
        SubmitDecision::Expire => {
            mark_expired(&txn, attempt, now).await?;
            txn.commit().await?;
            Err(AppError::AttemptExpired)
        }
        SubmitDecision::Accept { late } => {
            let previous_file = attempt.file_id;
            let mut active: assessment_attempt::ActiveModel = attempt.into();
            active.status = Set(AttemptStatus::Submitted);
            active.submitted_at = Set(Some(now));
            active.is_late = Set(late);
            active.updated_at = Set(now);
            let updated = apply_upload(&txn, active, form, owner_id)
                .await?
                .update(&txn)
                .await?;
            let replaced = release_previous_file(&txn, previous_file, updated.file_id).await?;
            txn.commit().await?;
            if late {
                tracing::info!(attempt_id, "Late submission accepted");
            }
            Ok((updated, replaced))
        }
    }
}

#[utoipa::path(
    post,
    path = "/{id}/submit",
    tag = "Attempts",
    operation_id = "submitAttempt",
    summary = "Submit an attempt",
    description = "Multipart form with an optional `file` and optional `comments`; at least one is \
        required. Late submissions are accepted and flagged. Submitting after the time limit \
        marks the attempt expired and fails with ATTEMPT_EXPIRED.",
    params(("id" = i32, Path, description = "Attempt ID")),
    request_body(content_type = "multipart/form-data", description = "`file` and/or `comments`"),
    responses(
        (status = 200, description = "Submitted attempt", body = ApiResponse<AttemptResponse>),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 403, description = "Not your attempt (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Attempt not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Already submitted (CONFLICT) or time is up (ATTEMPT_EXPIRED)", body = ErrorBody),
        (status = 413, description = "File too large (PAYLOAD_TOO_LARGE)", body = ErrorBody),
    ),
    security(("session" = [])),
)]
#[instrument(skip(state, auth_user, multipart), fields(attempt_id = %id))]
pub async fn submit_attempt(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<AttemptResponse>>, AppError> {
    let attempt = find_attempt(&state.db, id, false).await?;
    if attempt.student_id != auth_user.user_id {
        return Err(AppError::Forbidden);
    }
    let ctx = load_assessment(&state.db, attempt.assessment_id).await?;

    // Reject obvious cases before accepting any bytes.
    let now = Utc::now();
    match decide_submit(&attempt.state(), ctx.due_date(), now) {
        SubmitDecision::AlreadySubmitted => {
            return Err(AppError::Conflict(
                "This assessment has already been submitted".into(),
            ));
        }
        SubmitDecision::AlreadyExpired => return Err(AppError::AttemptExpired),
        SubmitDecision::Expire | SubmitDecision::Accept { .. } => {}
    }

    let form = read_upload_form(
        &mut multipart,
        UploadKind::Assessments,
        &*state.store,
        &["comments"],
    )
    .await?;
    if form.file.is_none() && form.text("comments").is_none() {
        return Err(AppError::Validation(
            "Provide a file, comments, or both".into(),
        ));
    }

    let result = submit_in_txn(&state, id, &ctx, &form, auth_user.user_id, Utc::now()).await;
    let attempt = finish_with_upload(&state, form, result).await?;

    Ok(Json(ApiResponse::ok(
        attempt_response(&state.db, attempt).await?,
    )))
}

async fn edit_in_txn(
    state: &AppState,
    attempt_id: i32,
    ctx: &AssessmentContext,
    form: &UploadForm,
    owner_id: i32,
) -> Result<(assessment_attempt::Model, Option<String>), AppError> {
    let now = Utc::now();
    let txn = state.db.begin().await?;
    let attempt = find_attempt(&txn, attempt_id, true).await?;

    check_attempt_edit(attempt.status, attempt.edited_at, ctx.due_date(), now)
        .map_err(edit_conflict)?;

    let previous_file = attempt.file_id;
    let mut active: assessment_attempt::ActiveModel = attempt.into();
    active.edited_at = Set(Some(now));
    active.updated_at = Set(now);
    let updated = apply_upload(&txn, active, form, owner_id)
        .await?
        .update(&txn)
        .await?;
    let replaced = release_previous_file(&txn, previous_file, updated.file_id).await?;
    txn.commit().await?;
    Ok((updated, replaced))
}

#[utoipa::path(
    put,
    path = "/{id}",
    tag = "Attempts",
    operation_id = "editAttempt",
    summary = "Edit a submitted attempt before grading",
    description = "Replaces the file and/or comments. Only one edit is allowed, and none once the \
        attempt is graded or past its due date, whoever the caller is (CONFLICT).",
    params(("id" = i32, Path, description = "Attempt ID")),
    request_body(content_type = "multipart/form-data", description = "`file` and/or `comments`"),
    responses(
        (status = 200, description = "Updated attempt", body = ApiResponse<AttemptResponse>),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 403, description = "Not your attempt (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Attempt not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Already edited, graded, past due or not submitted (CONFLICT)", body = ErrorBody),
    ),
    security(("session" = [])),
)]
#[instrument(skip(state, auth_user, multipart), fields(attempt_id = %id))]
pub async fn edit_attempt(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<AttemptResponse>>, AppError> {
    let attempt = find_attempt(&state.db, id, false).await?;
    let ctx = load_assessment(&state.db, attempt.assessment_id).await?;

    // State first: graded work is closed to everyone.
    check_attempt_edit(attempt.status, attempt.edited_at, ctx.due_date(), Utc::now())
        .map_err(edit_conflict)?;
    if attempt.student_id != auth_user.user_id {
        return Err(AppError::Forbidden);
    }

    let form = read_upload_form(
        &mut multipart,
        UploadKind::Assessments,
        &*state.store,
        &["comments"],
    )
    .await?;
    if form.file.is_none() && form.text("comments").is_none() {
        return Err(AppError::Validation("Nothing to update".into()));
    }

    let result = edit_in_txn(&state, id, &ctx, &form, auth_user.user_id).await;
    let attempt = finish_with_upload(&state, form, result).await?;

    Ok(Json(ApiResponse::ok(
        attempt_response(&state.db, attempt).await?,
    )))
}

#[utoipa::path(
    post,
    path = "/{id}/grade",
    tag = "Attempts",
    operation_id = "gradeAttempt",
    summary = "Grade an attempt",
    description = "Tutor of the owning program only. `score` is in points, `0..=total_points`; \
        `percentage = score / total_points * 100`. Re-grading overwrites. The grade and its \
        activity-log entry are written in one transaction.",
    params(("id" = i32, Path, description = "Attempt ID")),
    request_body = GradeRequest,
    responses(
        (status = 200, description = "Graded attempt", body = ApiResponse<AttemptResponse>),
        (status = 400, description = "Score out of range (VALIDATION_ERROR)", body = ErrorBody),
        (status = 403, description = "Not the program's tutor (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Attempt not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Attempt not submitted (CONFLICT)", body = ErrorBody),
    ),
    security(("session" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(attempt_id = %id, score = payload.score))]
pub async fn grade_attempt(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<GradeRequest>,
) -> Result<Json<ApiResponse<AttemptResponse>>, AppError> {
    auth_user.require_role(Role::Tutor)?;
    validate_grade_request(&payload)?;

    let attempt = find_attempt(&state.db, id, false).await?;
    let ctx = load_assessment(&state.db, attempt.assessment_id).await?;
    require_program_manager(&auth_user, &ctx.program)?;

    let max = ctx.assessment.total_points;
    validate_score(payload.score, max).map_err(|e| AppError::Validation(e.to_string()))?;
    let pct = percentage(payload.score, max);

    let now = Utc::now();
    let txn = state.db.begin().await?;
    let attempt = find_attempt(&txn, id, true).await?;
    if !can_grade_attempt(attempt.status) {
        return Err(AppError::Conflict(
            "Only submitted attempts can be graded".into(),
        ));
    }

    let mut active: assessment_attempt::ActiveModel = attempt.into();
    active.status = Set(AttemptStatus::Graded);
    active.score = Set(Some(payload.score));
    active.percentage = Set(Some(pct));
    active.feedback = Set(non_blank(payload.feedback));
    active.graded_by = Set(Some(auth_user.user_id));
    active.graded_at = Set(Some(now));
    active.updated_at = Set(now);
    let graded = active.update(&txn).await?;

    activity::record(
        &txn,
        auth_user.user_id,
        "attempt.graded",
        "assessment_attempt",
        graded.id,
        Some(format!("score={} percentage={pct:.2}", payload.score)),
    )
    .await?;

    txn.commit().await?;

    tracing::info!(attempt_id = id, percentage = pct, "Attempt graded");

    Ok(Json(ApiResponse::ok(
        attempt_response(&state.db, graded).await?,
    )))
}
