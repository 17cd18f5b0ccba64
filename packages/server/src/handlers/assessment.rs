use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use common::Role;
use common::attempt::effective_due_date;
use sea_orm::*;
use tracing::instrument;

use crate::entity::{assessment, assessment_attempt, assessment_question, material, program};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::models::assessment::{
    AssessmentDeletedResponse, AssessmentResponse, CreateAssessmentRequest, QuestionResponse,
    validate_create_assessment,
};
use crate::models::shared::{ApiResponse, non_blank};
use crate::state::AppState;
use crate::utils::access::{
    find_material_with_program, manages_program, require_program_manager,
    require_program_reader,
};
use crate::utils::upload::{delete_file_row, remove_stored_file};

/// An assessment with the material and program it hangs off.
pub(crate) struct AssessmentContext {
    pub assessment: assessment::Model,
    pub material: material::Model,
    pub program: program::Model,
}

impl AssessmentContext {
    pub fn due_date(&self) -> Option<DateTime<Utc>> {
        effective_due_date(self.assessment.due_date, self.material.due_date)
    }
}

pub(crate) async fn load_assessment<C: ConnectionTrait>(
    db: &C,
    id: i32,
) -> Result<AssessmentContext, AppError> {
    let assessment = assessment::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Assessment not found".into()))?;
    let (material, program) = find_material_with_program(db, assessment.material_id).await?;
    Ok(AssessmentContext {
        assessment,
        material,
        program,
    })
}

async fn load_questions<C: ConnectionTrait>(
    db: &C,
    assessment_id: i32,
    reveal_answers: bool,
) -> Result<Vec<QuestionResponse>, AppError> {
    let questions = assessment_question::Entity::find()
        .filter(assessment_question::Column::AssessmentId.eq(assessment_id))
        .order_by_asc(assessment_question::Column::Position)
        .all(db)
        .await?;
    Ok(questions
        .into_iter()
        .map(|q| QuestionResponse::from_model(q, reveal_answers))
        .collect())
}

#[utoipa::path(
    post,
    path = "/",
    tag = "Assessments",
    operation_id = "createAssessment",
    summary = "Create an assessment with its questions",
    description = "The assessment and all questions are written in one transaction. \
        Question points must not add up to more than `total_points`.",
    request_body = CreateAssessmentRequest,
    responses(
        (status = 201, description = "Assessment created", body = ApiResponse<AssessmentResponse>),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 403, description = "Not the program's tutor (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Material not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("session" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(material_id = payload.material_id))]
pub async fn create_assessment(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateAssessmentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<AssessmentResponse>>), AppError> {
    validate_create_assessment(&payload)?;

    let (material, program) = find_material_with_program(&state.db, payload.material_id).await?;
    require_program_manager(&auth_user, &program)?;

    let txn = state.db.begin().await?;

    let created = assessment::ActiveModel {
        material_id: Set(material.id),
        title: Set(payload.title.trim().to_string()),
        instructions: Set(non_blank(payload.instructions)),
        total_points: Set(payload.total_points),
        due_date: Set(payload.due_date),
        time_limit_minutes: Set(payload.time_limit_minutes),
        created_by: Set(auth_user.user_id),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let mut questions = Vec::with_capacity(payload.questions.len());
    for (i, q) in payload.questions.into_iter().enumerate() {
        let row = assessment_question::ActiveModel {
            assessment_id: Set(created.id),
            position: Set(i as i32 + 1),
            prompt: Set(q.prompt.trim().to_string()),
            question_type: Set(q.question_type.as_str().to_string()),
            choices: Set(serde_json::json!(q.choices)),
            answer: Set(non_blank(q.answer)),
            points: Set(q.points),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        questions.push(QuestionResponse::from_model(row, true));
    }

    txn.commit().await?;

    tracing::info!(
        assessment_id = created.id,
        questions = questions.len(),
        "Assessment created"
    );

    let due = effective_due_date(created.due_date, material.due_date);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(AssessmentResponse::new(
            created, program.id, due, questions,
        ))),
    ))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Assessments",
    operation_id = "getAssessment",
    summary = "Get an assessment",
    description = "Includes questions. Expected answers are only shown to the program's tutor and admins.",
    params(("id" = i32, Path, description = "Assessment ID")),
    responses(
        (status = 200, description = "Assessment", body = ApiResponse<AssessmentResponse>),
        (status = 403, description = "Not enrolled or not the tutor (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Assessment not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("session" = [])),
)]
#[instrument(skip(state, auth_user), fields(assessment_id = %id))]
pub async fn get_assessment(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<AssessmentResponse>>, AppError> {
    let ctx = load_assessment(&state.db, id).await?;
    require_program_reader(&state.db, &auth_user, &ctx.program).await?;

    let reveal = manages_program(&auth_user, &ctx.program);
    let questions = load_questions(&state.db, id, reveal).await?;
    let due = ctx.due_date();

    Ok(Json(ApiResponse::ok(AssessmentResponse::new(
        ctx.assessment,
        ctx.program.id,
        due,
        questions,
    ))))
}

#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Assessments",
    operation_id = "deleteAssessment",
    summary = "Delete an assessment and everything under it",
    description = "Removes questions, attempts and their uploaded files in one transaction. \
        Files are removed from disk after the commit.",
    params(("id" = i32, Path, description = "Assessment ID")),
    responses(
        (status = 200, description = "Deleted", body = ApiResponse<AssessmentDeletedResponse>),
        (status = 403, description = "Admins only (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Assessment not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("session" = [])),
)]
#[instrument(skip(state, auth_user), fields(assessment_id = %id))]
pub async fn delete_assessment(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<AssessmentDeletedResponse>>, AppError> {
    auth_user.require_role(Role::Admin)?;

    let txn = state.db.begin().await?;

    assessment::Entity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Assessment not found".into()))?;

    let file_ids: Vec<Option<i32>> = assessment_attempt::Entity::find()
        .select_only()
        .column(assessment_attempt::Column::FileId)
        .filter(assessment_attempt::Column::AssessmentId.eq(id))
        .into_tuple()
        .all(&txn)
        .await?;

    let deleted_attempts = assessment_attempt::Entity::delete_many()
        .filter(assessment_attempt::Column::AssessmentId.eq(id))
        .exec(&txn)
        .await?
        .rows_affected;

    let mut orphaned_paths = Vec::new();
    for file_id in file_ids.into_iter().flatten() {
        if let Some(path) = delete_file_row(&txn, file_id).await? {
            orphaned_paths.push(path);
        }
    }

    assessment_question::Entity::delete_many()
        .filter(assessment_question::Column::AssessmentId.eq(id))
        .exec(&txn)
        .await?;
    assessment::Entity::delete_by_id(id).exec(&txn).await?;

    txn.commit().await?;

    for path in &orphaned_paths {
        remove_stored_file(&*state.store, path).await;
    }

    tracing::info!(
        assessment_id = id,
        deleted_attempts,
        deleted_files = orphaned_paths.len(),
        "Assessment deleted"
    );

    Ok(Json(ApiResponse::ok(AssessmentDeletedResponse {
        id,
        deleted_attempts,
        deleted_files: orphaned_paths.len() as u64,
    })))
}
