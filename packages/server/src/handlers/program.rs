use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use common::{ProgramStatus, Role, UserStatus};
use sea_orm::sea_query::LockType;
use sea_orm::*;
use tracing::instrument;

use crate::entity::{material, program, program_session, user};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::models::program::{
    CreateMaterialRequest, CreateProgramRequest, CreateSessionRequest, MaterialListResponse,
    MaterialResponse, ProgramListQuery, ProgramListResponse, ProgramResponse,
    SessionListResponse, SessionResponse, UpdateProgramRequest, validate_create_material,
    validate_create_program, validate_create_session, validate_update_program,
};
use crate::models::shared::{ApiResponse, Pagination, non_blank, page_params};
use crate::state::AppState;
use crate::utils::access::{
    find_program, manages_program, require_program_manager, require_program_reader,
};

/// A tutor assignment must point at an active tutor account.
async fn check_tutor<C: ConnectionTrait>(db: &C, tutor_id: i32) -> Result<(), AppError> {
    let tutor = user::Entity::find_by_id(tutor_id).one(db).await?;
    match tutor {
        Some(t) if t.role == Role::Tutor && t.status == UserStatus::Active => Ok(()),
        _ => Err(AppError::Validation(format!(
            "User {tutor_id} is not an active tutor"
        ))),
    }
}

#[utoipa::path(
    post,
    path = "/",
    tag = "Programs",
    operation_id = "createProgram",
    summary = "Create a program",
    request_body = CreateProgramRequest,
    responses(
        (status = 201, description = "Program created", body = ApiResponse<ProgramResponse>),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 403, description = "Admins only (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("session" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(name = %payload.name))]
pub async fn create_program(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateProgramRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ProgramResponse>>), AppError> {
    auth_user.require_role(Role::Admin)?;
    validate_create_program(&payload)?;

    if let Some(tutor_id) = payload.tutor_id {
        check_tutor(&state.db, tutor_id).await?;
    }

    let model = program::ActiveModel {
        name: Set(payload.name.trim().to_string()),
        description: Set(non_blank(payload.description)),
        tutor_id: Set(payload.tutor_id),
        fee: Set(payload.fee),
        max_students: Set(payload.max_students),
        status: Set(ProgramStatus::Active),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(ProgramResponse::from(model))),
    ))
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Programs",
    operation_id = "listPrograms",
    summary = "List programs",
    description = "Admins see every program, tutors the programs assigned to them, \
        students the active catalogue.",
    params(ProgramListQuery),
    responses(
        (status = 200, description = "Paginated programs", body = ApiResponse<ProgramListResponse>),
    ),
    security(("session" = [])),
)]
#[instrument(skip(state, auth_user, query))]
pub async fn list_programs(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ProgramListQuery>,
) -> Result<Json<ApiResponse<ProgramListResponse>>, AppError> {
    let (page, per_page) = page_params(query.page, query.per_page);

    let mut select = program::Entity::find();
    match auth_user.role {
        Role::Admin => {}
        Role::Tutor => select = select.filter(program::Column::TutorId.eq(auth_user.user_id)),
        Role::Student => {
            select = select.filter(program::Column::Status.eq(ProgramStatus::Active))
        }
    }
    if let Some(status) = query.status
        && auth_user.role != Role::Student
    {
        select = select.filter(program::Column::Status.eq(status));
    }

    let total = select.clone().count(&state.db).await?;
    let programs = select
        .order_by_asc(program::Column::Name)
        .order_by_asc(program::Column::Id)
        .offset(Some((page - 1) * per_page))
        .limit(Some(per_page))
        .all(&state.db)
        .await?;

    Ok(Json(ApiResponse::ok(ProgramListResponse {
        data: programs.into_iter().map(ProgramResponse::from).collect(),
        pagination: Pagination::new(page, per_page, total),
    })))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Programs",
    operation_id = "getProgram",
    summary = "Get a program",
    params(("id" = i32, Path, description = "Program ID")),
    responses(
        (status = 200, description = "Program", body = ApiResponse<ProgramResponse>),
        (status = 404, description = "Program not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("session" = [])),
)]
#[instrument(skip(state, auth_user), fields(program_id = %id))]
pub async fn get_program(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<ProgramResponse>>, AppError> {
    let program = find_program(&state.db, id).await?;

    let visible = manages_program(&auth_user, &program)
        || (auth_user.is(Role::Student) && program.status == ProgramStatus::Active);
    if !visible {
        return Err(AppError::NotFound("Program not found".into()));
    }

    Ok(Json(ApiResponse::ok(ProgramResponse::from(program))))
}

#[utoipa::path(
    patch,
    path = "/{id}",
    tag = "Programs",
    operation_id = "updateProgram",
    summary = "Update a program",
    params(("id" = i32, Path, description = "Program ID")),
    request_body = UpdateProgramRequest,
    responses(
        (status = 200, description = "Updated program", body = ApiResponse<ProgramResponse>),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 403, description = "Admins only (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Program not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("session" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(program_id = %id))]
pub async fn update_program(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<UpdateProgramRequest>,
) -> Result<Json<ApiResponse<ProgramResponse>>, AppError> {
    auth_user.require_role(Role::Admin)?;
    validate_update_program(&payload)?;

    if let Some(Some(tutor_id)) = payload.tutor_id {
        check_tutor(&state.db, tutor_id).await?;
    }

    let existing = find_program(&state.db, id).await?;
    let mut active: program::ActiveModel = existing.into();

    if let Some(name) = payload.name {
        active.name = Set(name.trim().to_string());
    }
    if let Some(description) = payload.description {
        active.description = Set(non_blank(description));
    }
    if let Some(tutor_id) = payload.tutor_id {
        active.tutor_id = Set(tutor_id);
    }
    if let Some(fee) = payload.fee {
        active.fee = Set(fee);
    }
    if let Some(max_students) = payload.max_students {
        active.max_students = Set(max_students);
    }
    if let Some(status) = payload.status {
        active.status = Set(status);
    }

    let updated = active.update(&state.db).await?;
    Ok(Json(ApiResponse::ok(ProgramResponse::from(updated))))
}

#[utoipa::path(
    post,
    path = "/{id}/sessions",
    tag = "Programs",
    operation_id = "createProgramSession",
    summary = "Schedule a class session",
    description = "Fails with CONFLICT when the slot overlaps another session of this program \
        or of any other program taught by the same tutor.",
    params(("id" = i32, Path, description = "Program ID")),
    request_body = CreateSessionRequest,
    responses(
        (status = 201, description = "Session scheduled", body = ApiResponse<SessionResponse>),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 403, description = "Not the program's tutor (PERMISSION_DENIED)", body = ErrorBody),
        (status = 409, description = "Scheduling overlap (CONFLICT)", body = ErrorBody),
    ),
    security(("session" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(program_id = %id))]
pub async fn create_session(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<CreateSessionRequest>,
) -> Result<(StatusCode, Json<ApiResponse<SessionResponse>>), AppError> {
    validate_create_session(&payload)?;

    let txn = state.db.begin().await?;

    // Serialize scheduling per program.
    let program = program::Entity::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Program not found".into()))?;
    require_program_manager(&auth_user, &program)?;

    let mut program_ids = vec![program.id];
    if let Some(tutor_id) = program.tutor_id {
        let taught: Vec<i32> = program::Entity::find()
            .select_only()
            .column(program::Column::Id)
            .filter(program::Column::TutorId.eq(tutor_id))
            .filter(program::Column::Id.ne(program.id))
            .into_tuple()
            .all(&txn)
            .await?;
        program_ids.extend(taught);
    }

    let clash = program_session::Entity::find()
        .filter(program_session::Column::ProgramId.is_in(program_ids))
        .filter(program_session::Column::StartsAt.lt(payload.ends_at))
        .filter(program_session::Column::EndsAt.gt(payload.starts_at))
        .one(&txn)
        .await?;
    if let Some(clash) = clash {
        let whose = if clash.program_id == program.id {
            "this program"
        } else {
            "another program taught by the same tutor"
        };
        return Err(AppError::Conflict(format!(
            "Overlaps session \"{}\" of {whose}",
            clash.title
        )));
    }

    let session = program_session::ActiveModel {
        program_id: Set(program.id),
        title: Set(payload.title.trim().to_string()),
        starts_at: Set(payload.starts_at),
        ends_at: Set(payload.ends_at),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(SessionResponse::from(session))),
    ))
}

#[utoipa::path(
    get,
    path = "/{id}/sessions",
    tag = "Programs",
    operation_id = "listProgramSessions",
    summary = "List a program's sessions",
    params(("id" = i32, Path, description = "Program ID")),
    responses(
        (status = 200, description = "Sessions ordered by start time", body = ApiResponse<SessionListResponse>),
        (status = 403, description = "Not enrolled or not the tutor (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Program not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("session" = [])),
)]
#[instrument(skip(state, auth_user), fields(program_id = %id))]
pub async fn list_sessions(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<SessionListResponse>>, AppError> {
    let program = find_program(&state.db, id).await?;
    require_program_reader(&state.db, &auth_user, &program).await?;

    let sessions = program_session::Entity::find()
        .filter(program_session::Column::ProgramId.eq(id))
        .order_by_asc(program_session::Column::StartsAt)
        .all(&state.db)
        .await?;

    Ok(Json(ApiResponse::ok(SessionListResponse {
        data: sessions.into_iter().map(SessionResponse::from).collect(),
    })))
}

#[utoipa::path(
    post,
    path = "/{id}/materials",
    tag = "Programs",
    operation_id = "createMaterial",
    summary = "Add a material to a program",
    params(("id" = i32, Path, description = "Program ID")),
    request_body = CreateMaterialRequest,
    responses(
        (status = 201, description = "Material created", body = ApiResponse<MaterialResponse>),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 403, description = "Not the program's tutor (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Program not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("session" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(program_id = %id))]
pub async fn create_material(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<CreateMaterialRequest>,
) -> Result<(StatusCode, Json<ApiResponse<MaterialResponse>>), AppError> {
    validate_create_material(&payload)?;

    let program = find_program(&state.db, id).await?;
    require_program_manager(&auth_user, &program)?;

    let material = material::ActiveModel {
        program_id: Set(program.id),
        title: Set(payload.title.trim().to_string()),
        description: Set(non_blank(payload.description)),
        due_date: Set(payload.due_date),
        created_by: Set(auth_user.user_id),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(MaterialResponse::from(material))),
    ))
}

#[utoipa::path(
    get,
    path = "/{id}/materials",
    tag = "Programs",
    operation_id = "listMaterials",
    summary = "List a program's materials",
    params(("id" = i32, Path, description = "Program ID")),
    responses(
        (status = 200, description = "Materials", body = ApiResponse<MaterialListResponse>),
        (status = 403, description = "Not enrolled or not the tutor (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Program not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("session" = [])),
)]
#[instrument(skip(state, auth_user), fields(program_id = %id))]
pub async fn list_materials(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<MaterialListResponse>>, AppError> {
    let program = find_program(&state.db, id).await?;
    require_program_reader(&state.db, &auth_user, &program).await?;

    let materials = material::Entity::find()
        .filter(material::Column::ProgramId.eq(id))
        .order_by_asc(material::Column::CreatedAt)
        .order_by_asc(material::Column::Id)
        .all(&state.db)
        .await?;

    Ok(Json(ApiResponse::ok(MaterialListResponse {
        data: materials.into_iter().map(MaterialResponse::from).collect(),
    })))
}
