use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use common::attempt::{check_submission_edit, effective_due_date, is_late};
use common::grading::{percentage, validate_score};
use common::storage::UploadKind;
use common::{Role, SubmissionStatus};
use sea_orm::sea_query::LockType;
use sea_orm::*;
use tracing::instrument;

use super::file::{file_info, file_infos};
use crate::entity::{assignment, assignment_submission, material, program};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::models::assessment::{GradeRequest, validate_grade_request};
use crate::models::assignment::{
    AssignmentResponse, CreateAssignmentRequest, DEFAULT_MAX_SCORE, SubmissionListResponse,
    SubmissionResponse, validate_create_assignment,
};
use crate::models::shared::{ApiResponse, non_blank};
use crate::state::AppState;
use crate::utils::access::{
    find_material_with_program, require_enrolled, require_program_manager,
    require_program_reader, require_work_viewer,
};
use crate::utils::activity;
use crate::utils::upload::{UploadForm, delete_file_row, read_upload_form, remove_stored_file};

const SUBMISSION_TEXT_FIELD: &str = "submission_text";

struct AssignmentContext {
    assignment: assignment::Model,
    material: material::Model,
    program: program::Model,
}

impl AssignmentContext {
    fn due_date(&self) -> Option<DateTime<Utc>> {
        effective_due_date(self.assignment.due_date, self.material.due_date)
    }
}

async fn load_assignment<C: ConnectionTrait>(
    db: &C,
    id: i32,
) -> Result<AssignmentContext, AppError> {
    let assignment = assignment::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Assignment not found".into()))?;
    let (material, program) = find_material_with_program(db, assignment.material_id).await?;
    Ok(AssignmentContext {
        assignment,
        material,
        program,
    })
}

async fn find_submission<C: ConnectionTrait>(
    db: &C,
    id: i32,
    lock: bool,
) -> Result<assignment_submission::Model, AppError> {
    let mut select = assignment_submission::Entity::find_by_id(id);
    if lock {
        select = select.lock(LockType::Update);
    }
    select
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Submission not found".into()))
}

async fn submission_response<C: ConnectionTrait>(
    db: &C,
    submission: assignment_submission::Model,
) -> Result<SubmissionResponse, AppError> {
    let file = file_info(db, submission.file_id).await?;
    Ok(SubmissionResponse::new(submission, file))
}

async fn read_submission_form(
    state: &AppState,
    multipart: &mut Multipart,
) -> Result<UploadForm, AppError> {
    let form = read_upload_form(
        multipart,
        UploadKind::AssignmentSubmissions,
        &*state.store,
        &[SUBMISSION_TEXT_FIELD],
    )
    .await?;
    if form.file.is_none() && form.text(SUBMISSION_TEXT_FIELD).is_none() {
        return Err(AppError::Validation(
            "Provide submission_text, a file, or both".into(),
        ));
    }
    Ok(form)
}

#[utoipa::path(
    post,
    path = "/",
    tag = "Assignments",
    operation_id = "createAssignment",
    summary = "Create an assignment",
    description = "`max_score` defaults to 100.",
    request_body = CreateAssignmentRequest,
    responses(
        (status = 201, description = "Assignment created", body = ApiResponse<AssignmentResponse>),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 403, description = "Not the program's tutor (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Material not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("session" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(material_id = payload.material_id))]
pub async fn create_assignment(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateAssignmentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<AssignmentResponse>>), AppError> {
    validate_create_assignment(&payload)?;

    let (material, program) = find_material_with_program(&state.db, payload.material_id).await?;
    require_program_manager(&auth_user, &program)?;

    let created = assignment::ActiveModel {
        material_id: Set(material.id),
        title: Set(payload.title.trim().to_string()),
        instructions: Set(non_blank(payload.instructions)),
        max_score: Set(payload.max_score.unwrap_or(DEFAULT_MAX_SCORE)),
        due_date: Set(payload.due_date),
        created_by: Set(auth_user.user_id),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    tracing::info!(assignment_id = created.id, "Assignment created");

    let due = effective_due_date(created.due_date, material.due_date);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(AssignmentResponse::new(
            created, program.id, due,
        ))),
    ))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Assignments",
    operation_id = "getAssignment",
    summary = "Get an assignment",
    params(("id" = i32, Path, description = "Assignment ID")),
    responses(
        (status = 200, description = "Assignment", body = ApiResponse<AssignmentResponse>),
        (status = 403, description = "Not enrolled or not the tutor (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Assignment not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("session" = [])),
)]
#[instrument(skip(state, auth_user), fields(assignment_id = %id))]
pub async fn get_assignment(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<AssignmentResponse>>, AppError> {
    let ctx = load_assignment(&state.db, id).await?;
    require_program_reader(&state.db, &auth_user, &ctx.program).await?;

    let due = ctx.due_date();
    Ok(Json(ApiResponse::ok(AssignmentResponse::new(
        ctx.assignment,
        ctx.program.id,
        due,
    ))))
}

#[utoipa::path(
    post,
    path = "/{id}/submissions",
    tag = "Assignments",
    operation_id = "submitAssignment",
    summary = "Submit work for an assignment",
    description = "Multipart form with `submission_text` and/or `file`. One submission per \
        student; a second one fails with CONFLICT (edit the existing one instead). \
        Submissions after the due date are accepted and flagged `is_late`.",
    params(("id" = i32, Path, description = "Assignment ID")),
    request_body(content_type = "multipart/form-data", description = "`submission_text` and/or `file`"),
    responses(
        (status = 201, description = "Submission stored", body = ApiResponse<SubmissionResponse>),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 403, description = "Not an enrolled student (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Assignment not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Already submitted (CONFLICT)", body = ErrorBody),
        (status = 413, description = "File too large (PAYLOAD_TOO_LARGE)", body = ErrorBody),
    ),
    security(("session" = [])),
)]
#[instrument(skip(state, auth_user, multipart), fields(assignment_id = %id, student_id = auth_user.user_id))]
pub async fn submit_assignment(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<SubmissionResponse>>), AppError> {
    auth_user.require_role(Role::Student)?;

    let ctx = load_assignment(&state.db, id).await?;
    require_enrolled(&state.db, ctx.program.id, auth_user.user_id).await?;

    let already = assignment_submission::Entity::find()
        .filter(assignment_submission::Column::AssignmentId.eq(id))
        .filter(assignment_submission::Column::StudentId.eq(auth_user.user_id))
        .count(&state.db)
        .await?;
    if already > 0 {
        return Err(AppError::Conflict(
            "You have already submitted this assignment".into(),
        ));
    }

    let form = read_submission_form(&state, &mut multipart).await?;

    let now = Utc::now();
    let late = is_late(now, ctx.due_date());

    let result = async {
        let txn = state.db.begin().await?;
        let file_id = match &form.file {
            Some(upload) => Some(upload.insert(&txn, auth_user.user_id).await?.id),
            None => None,
        };
        let created = assignment_submission::ActiveModel {
            assignment_id: Set(id),
            student_id: Set(auth_user.user_id),
            submission_text: Set(form.text(SUBMISSION_TEXT_FIELD)),
            file_id: Set(file_id),
            status: Set(SubmissionStatus::Submitted),
            is_late: Set(late),
            submitted_at: Set(now),
            edited_at: Set(None),
            updated_at: Set(now),
            score: Set(None),
            percentage: Set(None),
            feedback: Set(None),
            graded_by: Set(None),
            graded_at: Set(None),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(|e| match e.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => {
                AppError::Conflict("You have already submitted this assignment".into())
            }
            _ => AppError::from(e),
        })?;
        txn.commit().await?;
        Ok::<_, AppError>(created)
    }
    .await;

    let created = match result {
        Ok(created) => created,
        Err(e) => {
            if let Some(upload) = form.file {
                upload.discard(&*state.store).await;
            }
            return Err(e);
        }
    };

    tracing::info!(submission_id = created.id, late, "Assignment submitted");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            submission_response(&state.db, created).await?,
        )),
    ))
}

#[utoipa::path(
    get,
    path = "/{id}/submissions",
    tag = "Assignments",
    operation_id = "listSubmissions",
    summary = "List submissions for an assignment",
    params(("id" = i32, Path, description = "Assignment ID")),
    responses(
        (status = 200, description = "Submissions", body = ApiResponse<SubmissionListResponse>),
        (status = 403, description = "Not the program's tutor (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Assignment not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("session" = [])),
)]
#[instrument(skip(state, auth_user), fields(assignment_id = %id))]
pub async fn list_submissions(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<SubmissionListResponse>>, AppError> {
    let ctx = load_assignment(&state.db, id).await?;
    require_program_manager(&auth_user, &ctx.program)?;

    let submissions = assignment_submission::Entity::find()
        .filter(assignment_submission::Column::AssignmentId.eq(id))
        .order_by_asc(assignment_submission::Column::SubmittedAt)
        .all(&state.db)
        .await?;

    let mut files = file_infos(&state.db, submissions.iter().filter_map(|s| s.file_id)).await?;
    let data = submissions
        .into_iter()
        .map(|s| {
            let file = s.file_id.and_then(|f| files.remove(&f));
            SubmissionResponse::new(s, file)
        })
        .collect();

    Ok(Json(ApiResponse::ok(SubmissionListResponse { data })))
}

#[utoipa::path(
    get,
    path = "/{id}/submissions/me",
    tag = "Assignments",
    operation_id = "getMySubmission",
    summary = "Get own submission",
    params(("id" = i32, Path, description = "Assignment ID")),
    responses(
        (status = 200, description = "The caller's submission", body = ApiResponse<SubmissionResponse>),
        (status = 404, description = "Nothing submitted yet (NOT_FOUND)", body = ErrorBody),
    ),
    security(("session" = [])),
)]
#[instrument(skip(state, auth_user), fields(assignment_id = %id))]
pub async fn get_my_submission(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<SubmissionResponse>>, AppError> {
    let submission = assignment_submission::Entity::find()
        .filter(assignment_submission::Column::AssignmentId.eq(id))
        .filter(assignment_submission::Column::StudentId.eq(auth_user.user_id))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("No submission for this assignment".into()))?;

    Ok(Json(ApiResponse::ok(
        submission_response(&state.db, submission).await?,
    )))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Assignments",
    operation_id = "getSubmission",
    summary = "Get a submission",
    params(("id" = i32, Path, description = "Submission ID")),
    responses(
        (status = 200, description = "Submission", body = ApiResponse<SubmissionResponse>),
        (status = 403, description = "Not the owner or the program's tutor (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Submission not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("session" = [])),
)]
#[instrument(skip(state, auth_user), fields(submission_id = %id))]
pub async fn get_submission(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<SubmissionResponse>>, AppError> {
    let submission = find_submission(&state.db, id, false).await?;
    let ctx = load_assignment(&state.db, submission.assignment_id).await?;
    require_work_viewer(&auth_user, &ctx.program, submission.student_id)?;

    Ok(Json(ApiResponse::ok(
        submission_response(&state.db, submission).await?,
    )))
}

#[utoipa::path(
    put,
    path = "/{id}",
    tag = "Assignments",
    operation_id = "editSubmission",
    summary = "Edit a submission before grading",
    description = "Replaces `submission_text` and/or the file. Only one edit is allowed, and none \
        once graded or after the due date (CONFLICT).",
    params(("id" = i32, Path, description = "Submission ID")),
    request_body(content_type = "multipart/form-data", description = "`submission_text` and/or `file`"),
    responses(
        (status = 200, description = "Updated submission", body = ApiResponse<SubmissionResponse>),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 403, description = "Not your submission (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Submission not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Graded or past due (CONFLICT)", body = ErrorBody),
    ),
    security(("session" = [])),
)]
#[instrument(skip(state, auth_user, multipart), fields(submission_id = %id))]
pub async fn edit_submission(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<SubmissionResponse>>, AppError> {
    let submission = find_submission(&state.db, id, false).await?;
    let ctx = load_assignment(&state.db, submission.assignment_id).await?;

    check_submission_edit(
        submission.status,
        submission.edited_at,
        ctx.due_date(),
        Utc::now(),
    )
    .map_err(|r| AppError::Conflict(r.message().into()))?;
    if submission.student_id != auth_user.user_id {
        return Err(AppError::Forbidden);
    }

    let form = read_submission_form(&state, &mut multipart).await?;

    let result = async {
        let now = Utc::now();
        let txn = state.db.begin().await?;
        let submission = find_submission(&txn, id, true).await?;
        check_submission_edit(submission.status, submission.edited_at, ctx.due_date(), now)
            .map_err(|r| AppError::Conflict(r.message().into()))?;

        let previous_file = submission.file_id;
        let mut active: assignment_submission::ActiveModel = submission.into();
        if let Some(upload) = &form.file {
            let row = upload.insert(&txn, auth_user.user_id).await?;
            active.file_id = Set(Some(row.id));
        }
        if let Some(text) = form.text(SUBMISSION_TEXT_FIELD) {
            active.submission_text = Set(Some(text));
        }
        active.edited_at = Set(Some(now));
        active.updated_at = Set(now);
        let updated = active.update(&txn).await?;

        let replaced = match previous_file {
            Some(old) if updated.file_id != Some(old) => delete_file_row(&txn, old).await?,
            _ => None,
        };
        txn.commit().await?;
        Ok::<_, AppError>((updated, replaced))
    }
    .await;

    let updated = match result {
        Ok((updated, replaced)) => {
            if let Some(path) = replaced {
                remove_stored_file(&*state.store, &path).await;
            }
            updated
        }
        Err(e) => {
            if let Some(upload) = form.file {
                upload.discard(&*state.store).await;
            }
            return Err(e);
        }
    };

    tracing::info!(submission_id = id, "Submission edited");

    Ok(Json(ApiResponse::ok(
        submission_response(&state.db, updated).await?,
    )))
}

#[utoipa::path(
    post,
    path = "/{id}/grade",
    tag = "Assignments",
    operation_id = "gradeSubmission",
    summary = "Grade a submission",
    description = "Tutor of the owning program only. `score` is in points, `0..=max_score`. \
        Re-grading overwrites.",
    params(("id" = i32, Path, description = "Submission ID")),
    request_body = GradeRequest,
    responses(
        (status = 200, description = "Graded submission", body = ApiResponse<SubmissionResponse>),
        (status = 400, description = "Score out of range (VALIDATION_ERROR)", body = ErrorBody),
        (status = 403, description = "Not the program's tutor (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Submission not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("session" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(submission_id = %id, score = payload.score))]
pub async fn grade_submission(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<GradeRequest>,
) -> Result<Json<ApiResponse<SubmissionResponse>>, AppError> {
    auth_user.require_role(Role::Tutor)?;
    validate_grade_request(&payload)?;

    let submission = find_submission(&state.db, id, false).await?;
    let ctx = load_assignment(&state.db, submission.assignment_id).await?;
    require_program_manager(&auth_user, &ctx.program)?;

    let max = ctx.assignment.max_score;
    validate_score(payload.score, max).map_err(|e| AppError::Validation(e.to_string()))?;
    let pct = percentage(payload.score, max);

    let now = Utc::now();
    let txn = state.db.begin().await?;
    let submission = find_submission(&txn, id, true).await?;

    let mut active: assignment_submission::ActiveModel = submission.into();
    active.status = Set(SubmissionStatus::Graded);
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
        "submission.graded",
        "assignment_submission",
        graded.id,
        Some(format!("score={} percentage={pct:.2}", payload.score)),
    )
    .await?;

    txn.commit().await?;

    tracing::info!(submission_id = id, percentage = pct, "Submission graded");

    Ok(Json(ApiResponse::ok(
        submission_response(&state.db, graded).await?,
    )))
}
