//! Payment recording, admin decisions, proof-of-payment files and receipts.

use std::collections::HashSet;

use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{Html, Response},
};
use chrono::Utc;
use common::payment::format_display_id;
use common::storage::UploadKind;
use common::{PaymentRef, PaymentStatus, Role};
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::*;
use tracing::instrument;

use super::enrollment::{compute_balance, find_enrollment_by_id, require_enrollment_viewer};
use super::file::build_file_response;
use crate::entity::{enrollment, file_upload, payment, payment_attachment, program, user};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::models::file::{FileInfo, FileQuery};
use crate::models::payment::{
    CreatePaymentRequest, PaymentAttachmentResponse, PaymentDecisionResponse,
    PaymentListQuery, PaymentListResponse, PaymentResponse, RefundPaymentRequest,
    ValidatePaymentRequest, validate_create_payment, validate_validate_request,
};
use crate::models::shared::{ApiResponse, Pagination, non_blank, page_params};
use crate::state::AppState;
use crate::utils::access::find_program;
use crate::utils::activity;
use crate::utils::receipt::{ReceiptView, render_receipt};
use crate::utils::upload::{delete_file_row, read_upload_form, remove_stored_file};

struct PaymentContext {
    payment: payment::Model,
    enrollment: enrollment::Model,
    program: program::Model,
}

async fn load_payment<C: ConnectionTrait>(db: &C, id: i32) -> Result<PaymentContext, AppError> {
    let payment = payment::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Payment not found".into()))?;
    let enrollment = find_enrollment_by_id(db, payment.enrollment_id).await?;
    let program = find_program(db, enrollment.program_id).await?;
    Ok(PaymentContext {
        payment,
        enrollment,
        program,
    })
}

/// Payment records are visible to the paying student and to admins.
fn require_payment_owner(auth: &AuthUser, ctx: &PaymentContext) -> Result<(), AppError> {
    if auth.is_admin() || ctx.enrollment.student_id == auth.user_id {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

async fn has_attachment<C: ConnectionTrait>(db: &C, payment_id: i32) -> Result<bool, AppError> {
    Ok(payment_attachment::Entity::find()
        .filter(payment_attachment::Column::PaymentId.eq(payment_id))
        .count(db)
        .await?
        > 0)
}

async fn payment_response<C: ConnectionTrait>(
    db: &C,
    payment: payment::Model,
) -> Result<PaymentResponse, AppError> {
    let attached = has_attachment(db, payment.id).await?;
    Ok(PaymentResponse::new(payment, attached))
}

/// Move a payment to `to` only if it is still in the state that precedes it.
///
/// Returns the number of rows changed, which is zero when another request
/// already processed the payment.
async fn transition<C: ConnectionTrait>(
    db: &C,
    id: i32,
    to: PaymentStatus,
    admin_id: i32,
    notes: Option<String>,
) -> Result<u64, AppError> {
    let from = PaymentStatus::required_predecessor(to)
        .ok_or_else(|| AppError::Validation(format!("Cannot move a payment to {to}")))?;
    let now = Utc::now();
    let mut update = payment::Entity::update_many()
        .col_expr(payment::Column::Status, Expr::value(to))
        .filter(payment::Column::Id.eq(id))
        .filter(payment::Column::Status.eq(from));
    if to != PaymentStatus::Refunded {
        update = update
            .col_expr(payment::Column::ValidatedBy, Expr::value(admin_id))
            .col_expr(payment::Column::ValidatedAt, Expr::value(now));
    }
    if let Some(notes) = notes {
        update = update.col_expr(payment::Column::Notes, Expr::value(notes));
    }
    Ok(update.exec(db).await?.rows_affected)
}

#[utoipa::path(
    post,
    path = "/",
    tag = "Payments",
    operation_id = "createPayment",
    summary = "Record a payment",
    description = "Students record payments against their own enrollment; admins against any. \
        Payments start as `pending`. Overpayment is not checked here.",
    request_body = CreatePaymentRequest,
    responses(
        (status = 201, description = "Payment recorded", body = ApiResponse<PaymentResponse>),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 403, description = "Not your enrollment (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Enrollment not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("session" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(enrollment_id = payload.enrollment_id, amount = %payload.amount))]
pub async fn create_payment(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<PaymentResponse>>), AppError> {
    auth_user.require_any_role(&[Role::Admin, Role::Student])?;
    validate_create_payment(&payload)?;

    let enrollment = find_enrollment_by_id(&state.db, payload.enrollment_id).await?;
    if !auth_user.is_admin() && enrollment.student_id != auth_user.user_id {
        return Err(AppError::Forbidden);
    }
    if !enrollment.status.accepts_payments() {
        return Err(AppError::Validation(format!(
            "Payments cannot be recorded for a {} enrollment",
            enrollment.status.as_str()
        )));
    }

    let created = payment::ActiveModel {
        enrollment_id: Set(enrollment.id),
        amount: Set(payload.amount),
        method: Set(payload.method),
        reference_number: Set(non_blank(payload.reference_number)),
        status: Set(PaymentStatus::Pending),
        notes: Set(non_blank(payload.notes)),
        validated_by: Set(None),
        validated_at: Set(None),
        recorded_by: Set(auth_user.user_id),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    tracing::info!(
        payment_id = created.id,
        display_id = %format_display_id(created.id, created.created_at),
        "Payment recorded"
    );

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(PaymentResponse::new(created, false))),
    ))
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Payments",
    operation_id = "listPayments",
    summary = "List payments",
    description = "Students see payments on their own enrollments; admins see all.",
    params(PaymentListQuery),
    responses(
        (status = 200, description = "Paginated payments", body = ApiResponse<PaymentListResponse>),
        (status = 403, description = "Tutors have no payment access (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("session" = [])),
)]
#[instrument(skip(state, auth_user, query))]
pub async fn list_payments(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<PaymentListQuery>,
) -> Result<Json<ApiResponse<PaymentListResponse>>, AppError> {
    auth_user.require_any_role(&[Role::Admin, Role::Student])?;
    let (page, per_page) = page_params(query.page, query.per_page);

    let mut select = payment::Entity::find();
    if !auth_user.is_admin() {
        let own: Vec<i32> = enrollment::Entity::find()
            .select_only()
            .column(enrollment::Column::Id)
            .filter(enrollment::Column::StudentId.eq(auth_user.user_id))
            .into_tuple()
            .all(&state.db)
            .await?;
        select = select.filter(payment::Column::EnrollmentId.is_in(own));
    }
    if let Some(status) = query.status {
        select = select.filter(payment::Column::Status.eq(status));
    }
    if let Some(enrollment_id) = query.enrollment_id {
        select = select.filter(payment::Column::EnrollmentId.eq(enrollment_id));
    }

    let total = select.clone().count(&state.db).await?;
    let rows = select
        .order_by_desc(payment::Column::CreatedAt)
        .order_by_desc(payment::Column::Id)
        .offset(Some((page - 1) * per_page))
        .limit(Some(per_page))
        .all(&state.db)
        .await?;

    let ids: Vec<i32> = rows.iter().map(|p| p.id).collect();
    let attached: HashSet<i32> = if ids.is_empty() {
        HashSet::new()
    } else {
        payment_attachment::Entity::find()
            .select_only()
            .column(payment_attachment::Column::PaymentId)
            .filter(payment_attachment::Column::PaymentId.is_in(ids))
            .into_tuple::<i32>()
            .all(&state.db)
            .await?
            .into_iter()
            .collect()
    };

    let data = rows
        .into_iter()
        .map(|p| {
            let has = attached.contains(&p.id);
            PaymentResponse::new(p, has)
        })
        .collect();

    Ok(Json(ApiResponse::ok(PaymentListResponse {
        data,
        pagination: Pagination::new(page, per_page, total),
    })))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Payments",
    operation_id = "getPayment",
    summary = "Get a payment",
    params(("id" = i32, Path, description = "Payment ID")),
    responses(
        (status = 200, description = "Payment", body = ApiResponse<PaymentResponse>),
        (status = 403, description = "Not your payment (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Payment not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("session" = [])),
)]
#[instrument(skip(state, auth_user), fields(payment_id = %id))]
pub async fn get_payment(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<PaymentResponse>>, AppError> {
    let ctx = load_payment(&state.db, id).await?;
    require_payment_owner(&auth_user, &ctx)?;

    Ok(Json(ApiResponse::ok(
        payment_response(&state.db, ctx.payment).await?,
    )))
}

#[utoipa::path(
    post,
    path = "/{id}/validate",
    tag = "Payments",
    operation_id = "validatePayment",
    summary = "Validate or reject a pending payment",
    description = "Admin only. `pending -> validated | rejected`, exactly once: a payment that is \
        no longer pending fails with CONFLICT. Rejection requires `notes` (the reason). \
        The response carries the recomputed enrollment balance.",
    params(("id" = i32, Path, description = "Payment ID")),
    request_body = ValidatePaymentRequest,
    responses(
        (status = 200, description = "Decision recorded", body = ApiResponse<PaymentDecisionResponse>),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 403, description = "Admins only (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Payment not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Already processed (CONFLICT)", body = ErrorBody),
    ),
    security(("session" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(payment_id = %id, action = ?payload.action))]
pub async fn validate_payment(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<ValidatePaymentRequest>,
) -> Result<Json<ApiResponse<PaymentDecisionResponse>>, AppError> {
    auth_user.require_role(Role::Admin)?;
    validate_validate_request(&payload)?;

    let target = payload.action.target_status();
    let txn = state.db.begin().await?;

    let ctx = load_payment(&txn, id).await?;
    let notes = non_blank(payload.notes);
    let changed = transition(
        &txn,
        id,
        target,
        auth_user.user_id,
        notes.clone(),
    )
    .await?;
    if changed == 0 {
        return Err(AppError::Conflict(format!(
            "Payment {} has already been processed",
            format_display_id(id, ctx.payment.created_at)
        )));
    }

    activity::record(
        &txn,
        auth_user.user_id,
        &format!("payment.{}", target.as_str()),
        "payment",
        id,
        notes,
    )
    .await?;

    let updated = payment::Entity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Payment not found".into()))?;
    let balance = compute_balance(&txn, &ctx.enrollment, &ctx.program).await?;

    txn.commit().await?;

    tracing::info!(
        payment_id = id,
        status = target.as_str(),
        balance = %balance.balance,
        "Payment decision recorded"
    );

    Ok(Json(ApiResponse::ok(PaymentDecisionResponse {
        payment: payment_response(&state.db, updated).await?,
        balance,
    })))
}

#[utoipa::path(
    post,
    path = "/{id}/refund",
    tag = "Payments",
    operation_id = "refundPayment",
    summary = "Refund a validated payment",
    description = "Admin only. `validated -> refunded`; the amount stops counting toward the balance.",
    params(("id" = i32, Path, description = "Payment ID")),
    request_body = RefundPaymentRequest,
    responses(
        (status = 200, description = "Refund recorded", body = ApiResponse<PaymentDecisionResponse>),
        (status = 403, description = "Admins only (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Payment not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Payment is not validated (CONFLICT)", body = ErrorBody),
    ),
    security(("session" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(payment_id = %id))]
pub async fn refund_payment(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<RefundPaymentRequest>,
) -> Result<Json<ApiResponse<PaymentDecisionResponse>>, AppError> {
    auth_user.require_role(Role::Admin)?;

    let txn = state.db.begin().await?;
    let ctx = load_payment(&txn, id).await?;
    let notes = non_blank(payload.notes);

    let changed = transition(
        &txn,
        id,
        PaymentStatus::Refunded,
        auth_user.user_id,
        notes.clone(),
    )
    .await?;
    if changed == 0 {
        return Err(AppError::Conflict(
            "Only validated payments can be refunded".into(),
        ));
    }

    activity::record(&txn, auth_user.user_id, "payment.refunded", "payment", id, notes).await?;

    let updated = payment::Entity::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Payment not found".into()))?;
    let balance = compute_balance(&txn, &ctx.enrollment, &ctx.program).await?;

    txn.commit().await?;

    tracing::info!(payment_id = id, balance = %balance.balance, "Payment refunded");

    Ok(Json(ApiResponse::ok(PaymentDecisionResponse {
        payment: payment_response(&state.db, updated).await?,
        balance,
    })))
}

#[utoipa::path(
    post,
    path = "/{id}/attachment",
    tag = "Payments",
    operation_id = "uploadPaymentAttachment",
    summary = "Upload proof of payment",
    description = "Multipart form with a single `file` (pdf, png, jpg, jpeg). Creates the \
        payment's proof file or replaces the existing one. Only while the payment is pending.",
    params(("id" = i32, Path, description = "Payment ID")),
    request_body(content_type = "multipart/form-data", description = "`file`"),
    responses(
        (status = 200, description = "Attachment stored", body = ApiResponse<PaymentAttachmentResponse>),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 403, description = "Not your payment (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Payment not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Payment is no longer pending (CONFLICT)", body = ErrorBody),
        (status = 413, description = "File too large (PAYLOAD_TOO_LARGE)", body = ErrorBody),
    ),
    security(("session" = [])),
)]
#[instrument(skip(state, auth_user, multipart), fields(payment_id = %id))]
pub async fn upload_attachment(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<PaymentAttachmentResponse>>, AppError> {
    let ctx = load_payment(&state.db, id).await?;
    require_payment_owner(&auth_user, &ctx)?;
    if ctx.payment.status != PaymentStatus::Pending {
        return Err(AppError::Conflict(
            "Proof of payment can only be changed while the payment is pending".into(),
        ));
    }

    let form = read_upload_form(
        &mut multipart,
        UploadKind::PaymentReceipts,
        &*state.store,
        &[],
    )
    .await?;
    let Some(upload) = form.file else {
        return Err(AppError::Validation("A file is required".into()));
    };

    let result = async {
        let now = Utc::now();
        let txn = state.db.begin().await?;

        let locked = payment::Entity::find_by_id(id)
            .lock(LockType::Update)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound("Payment not found".into()))?;
        if locked.status != PaymentStatus::Pending {
            return Err(AppError::Conflict(
                "Proof of payment can only be changed while the payment is pending".into(),
            ));
        }

        let file = upload.insert(&txn, auth_user.user_id).await?;
        let existing = payment_attachment::Entity::find()
            .filter(payment_attachment::Column::PaymentId.eq(id))
            .one(&txn)
            .await?;

        let (attachment, replaced) = match existing {
            Some(existing) => {
                let old_file = existing.file_id;
                let mut active: payment_attachment::ActiveModel = existing.into();
                active.file_id = Set(file.id);
                active.uploaded_at = Set(now);
                let updated = active.update(&txn).await?;
                (updated, delete_file_row(&txn, old_file).await?)
            }
            None => {
                let created = payment_attachment::ActiveModel {
                    payment_id: Set(id),
                    file_id: Set(file.id),
                    uploaded_at: Set(now),
                    ..Default::default()
                }
                .insert(&txn)
                .await?;
                (created, None)
            }
        };

        txn.commit().await?;
        Ok::<_, AppError>((attachment, file, replaced))
    }
    .await;

    let (attachment, file, replaced) = match result {
        Ok(done) => done,
        Err(e) => {
            upload.discard(&*state.store).await;
            return Err(e);
        }
    };
    if let Some(path) = replaced {
        remove_stored_file(&*state.store, &path).await;
        tracing::info!(payment_id = id, "Replaced proof of payment");
    }

    Ok(Json(ApiResponse::ok(PaymentAttachmentResponse {
        payment_id: id,
        display_id: format_display_id(id, ctx.payment.created_at),
        file: FileInfo::from(file),
        uploaded_at: attachment.uploaded_at,
    })))
}

#[utoipa::path(
    get,
    path = "/{id}/attachment",
    tag = "Payments",
    operation_id = "downloadPaymentAttachment",
    summary = "Download proof of payment",
    description = "`id` is either the numeric id or the display id \
        `PAY-YYYYMMDD-NNNNNN`; a display id whose date does not match the payment is not found.",
    params(
        ("id" = String, Path, description = "Payment ID or display ID (PAY-YYYYMMDD-NNNNNN)"),
        FileQuery,
    ),
    responses(
        (status = 200, description = "File content"),
        (status = 304, description = "Not Modified (ETag match)"),
        (status = 400, description = "Malformed reference (VALIDATION_ERROR)", body = ErrorBody),
        (status = 403, description = "Not allowed (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Payment or attachment not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("session" = [])),
)]
#[instrument(skip(state, auth_user, headers, query), fields(payment_ref = %payment_ref))]
pub async fn download_attachment(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(payment_ref): Path<String>,
    Query(query): Query<FileQuery>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let parsed: PaymentRef = payment_ref
        .parse()
        .map_err(|e: common::payment::PaymentRefError| AppError::Validation(e.to_string()))?;

    let ctx = load_payment(&state.db, parsed.id).await?;
    if !parsed.matches_date(ctx.payment.created_at) {
        tracing::debug!(
            requested = %parsed.to_display(),
            actual = %format_display_id(ctx.payment.id, ctx.payment.created_at),
            "Payment reference date mismatch"
        );
        return Err(AppError::NotFound("Payment not found".into()));
    }
    require_enrollment_viewer(&auth_user, &ctx.enrollment, &ctx.program)?;

    let attachment = payment_attachment::Entity::find()
        .filter(payment_attachment::Column::PaymentId.eq(ctx.payment.id))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("No proof of payment uploaded".into()))?;
    let file = file_upload::Entity::find_by_id(attachment.file_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("File not found".into()))?;

    build_file_response(&file, query.disposition, &headers, &*state.store).await
}

#[utoipa::path(
    get,
    path = "/{id}/receipt",
    tag = "Payments",
    operation_id = "getPaymentReceipt",
    summary = "Printable receipt",
    description = "HTML receipt for a validated payment, with the balance after all validated payments.",
    params(("id" = i32, Path, description = "Payment ID")),
    responses(
        (status = 200, description = "Receipt", content_type = "text/html", body = String),
        (status = 403, description = "Not allowed (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Payment not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Payment is not validated (NOT_VALIDATED)", body = ErrorBody),
    ),
    security(("session" = [])),
)]
#[instrument(skip(state, auth_user), fields(payment_id = %id))]
pub async fn get_receipt(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Html<String>, AppError> {
    let ctx = load_payment(&state.db, id).await?;
    require_enrollment_viewer(&auth_user, &ctx.enrollment, &ctx.program)?;
    if ctx.payment.status != PaymentStatus::Validated {
        return Err(AppError::NotValidated);
    }

    let student = user::Entity::find_by_id(ctx.enrollment.student_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Student not found".into()))?;
    let validator = match ctx.payment.validated_by {
        Some(admin_id) => user::Entity::find_by_id(admin_id).one(&state.db).await?,
        None => None,
    };
    let balance = compute_balance(&state.db, &ctx.enrollment, &ctx.program).await?;

    let display_id = format_display_id(ctx.payment.id, ctx.payment.created_at);
    let html = render_receipt(&ReceiptView {
        display_id: &display_id,
        student_name: &student.full_name,
        program_name: &ctx.program.name,
        amount: ctx.payment.amount,
        method: ctx.payment.method,
        reference_number: ctx.payment.reference_number.as_deref(),
        paid_at: ctx.payment.created_at,
        validated_at: ctx.payment.validated_at,
        validated_by: validator.as_ref().map(|u| u.full_name.as_str()),
        balance: balance.balance,
    });

    Ok(Html(html))
}
