use std::collections::HashMap;

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use common::storage::{FileStore, UploadKind};
use sea_orm::*;
use tokio_util::io::ReaderStream;
use tracing::instrument;

use crate::entity::{
    assessment, assessment_attempt, assignment, assignment_submission, enrollment, file_upload,
    payment, payment_attachment,
};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::models::file::{Disposition, FileInfo, FileQuery};
use crate::state::AppState;
use crate::utils::access::{find_material_with_program, find_program, require_work_viewer};

pub(crate) async fn file_info<C: ConnectionTrait>(
    db: &C,
    file_id: Option<i32>,
) -> Result<Option<FileInfo>, AppError> {
    let Some(id) = file_id else {
        return Ok(None);
    };
    Ok(file_upload::Entity::find_by_id(id)
        .one(db)
        .await?
        .map(FileInfo::from))
}

/// Batch variant of [`file_info`] for list endpoints.
pub(crate) async fn file_infos<C: ConnectionTrait>(
    db: &C,
    ids: impl IntoIterator<Item = i32>,
) -> Result<HashMap<i32, FileInfo>, AppError> {
    let ids: Vec<i32> = ids.into_iter().collect();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = file_upload::Entity::find()
        .filter(file_upload::Column::Id.is_in(ids))
        .all(db)
        .await?;
    Ok(rows.into_iter().map(|f| (f.id, FileInfo::from(f))).collect())
}

/// Find the work that references `file` and check the caller may read it.
async fn authorize_file<C: ConnectionTrait>(
    db: &C,
    auth: &AuthUser,
    file: &file_upload::Model,
) -> Result<(), AppError> {
    let not_found = || AppError::NotFound("File not found".into());

    let (program_id, student_id) = match file.kind {
        UploadKind::Assessments => {
            let attempt = assessment_attempt::Entity::find()
                .filter(assessment_attempt::Column::FileId.eq(file.id))
                .one(db)
                .await?
                .ok_or_else(not_found)?;
            let assessment = assessment::Entity::find_by_id(attempt.assessment_id)
                .one(db)
                .await?
                .ok_or_else(not_found)?;
            let (_, program) = find_material_with_program(db, assessment.material_id).await?;
            (program.id, attempt.student_id)
        }
        UploadKind::AssignmentSubmissions => {
            let submission = assignment_submission::Entity::find()
                .filter(assignment_submission::Column::FileId.eq(file.id))
                .one(db)
                .await?
                .ok_or_else(not_found)?;
            let assignment = assignment::Entity::find_by_id(submission.assignment_id)
                .one(db)
                .await?
                .ok_or_else(not_found)?;
            let (_, program) = find_material_with_program(db, assignment.material_id).await?;
            (program.id, submission.student_id)
        }
        UploadKind::PaymentReceipts => {
            let attachment = payment_attachment::Entity::find()
                .filter(payment_attachment::Column::FileId.eq(file.id))
                .one(db)
                .await?
                .ok_or_else(not_found)?;
            let (_, enrollment) = payment::Entity::find_by_id(attachment.payment_id)
                .find_also_related(enrollment::Entity)
                .one(db)
                .await?
                .ok_or_else(not_found)?;
            let enrollment = enrollment.ok_or_else(not_found)?;
            (enrollment.program_id, enrollment.student_id)
        }
    };

    let program = find_program(db, program_id).await?;
    require_work_viewer(auth, &program, student_id)
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Files",
    operation_id = "downloadFile",
    summary = "Download an uploaded file",
    description = "Streams a file attached to an attempt, assignment submission or payment. \
        Readable by the owning student, the program's tutor and admins. Supports ETag-based \
        caching via If-None-Match. Errors use the usual JSON body.",
    params(
        ("id" = i32, Path, description = "File ID"),
        FileQuery,
    ),
    responses(
        (status = 200, description = "File content"),
        (status = 304, description = "Not Modified (ETag match)"),
        (status = 401, description = "Not signed in (SESSION_MISSING, SESSION_INVALID)", body = ErrorBody),
        (status = 403, description = "Not allowed (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "File not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("session" = [])),
)]
#[instrument(skip(state, auth_user, headers, query), fields(file_id = %id))]
pub async fn download_file(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Query(query): Query<FileQuery>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let file = file_upload::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("File not found".into()))?;

    authorize_file(&state.db, &auth_user, &file).await?;

    build_file_response(&file, query.disposition, &headers, &*state.store).await
}

/// Stream a stored file with caching and disposition headers.
pub(crate) async fn build_file_response(
    file: &file_upload::Model,
    disposition: Disposition,
    headers: &HeaderMap,
    store: &dyn FileStore,
) -> Result<Response, AppError> {
    let etag_value = format!("\"{}\"", file.content_hash);
    if let Some(if_none_match) = headers.get(header::IF_NONE_MATCH)
        && let Ok(val) = if_none_match.to_str()
        && val.split(',').any(|tag| {
            let tag = tag.trim();
            tag == etag_value || tag == "*"
        })
    {
        return Ok((
            StatusCode::NOT_MODIFIED,
            [(header::ETAG, etag_value)],
        )
            .into_response());
    }

    let reader = store.get_stream(&file.stored_path).await?;
    let body = Body::from_stream(ReaderStream::new(reader));

    let content_type = file
        .mime_type
        .clone()
        .or_else(|| {
            mime_guess::from_path(&file.original_filename)
                .first()
                .map(|m| m.essence_str().to_string())
        })
        .unwrap_or_else(|| "application/octet-stream".to_string());

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, file.size.to_string())
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition_value(disposition, &file.original_filename),
        )
        .header(header::ETAG, &etag_value)
        .header(header::CACHE_CONTROL, "private, max-age=3600")
        .header("X-Content-Type-Options", "nosniff")
        .body(body)
        .map_err(|e| AppError::Upstream(format!("Failed to build response: {e}")))
}

/// `Content-Disposition` with an ASCII fallback name and an RFC 5987 `filename*`.
pub(crate) fn content_disposition_value(disposition: Disposition, filename: &str) -> String {
    let ascii: String = filename
        .chars()
        .filter(|c| c.is_ascii_graphic() && !matches!(c, '"' | ';' | '\\'))
        .collect();
    let ascii = if ascii.is_empty() {
        "download".to_string()
    } else {
        ascii
    };

    let encoded: String = filename
        .bytes()
        .map(|b| {
            if b.is_ascii_alphanumeric() || b"!#$&+-.^_`|~".contains(&b) {
                (b as char).to_string()
            } else {
                format!("%{b:02X}")
            }
        })
        .collect();

    format!(
        "{}; filename=\"{ascii}\"; filename*=UTF-8''{encoded}",
        disposition.as_str()
    )
}
