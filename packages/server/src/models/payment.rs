use chrono::{DateTime, Utc};
use common::payment::format_display_id;
use common::{PaymentMethod, PaymentStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::enrollment::BalanceResponse;
use super::file::FileInfo;
use super::shared::{Pagination, validate_text};
use crate::entity::payment;
use crate::error::AppError;

/// Request body for recording a payment. Overpayment is allowed.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreatePaymentRequest {
    #[schema(example = 11)]
    pub enrollment_id: i32,
    /// At most two decimal places.
    #[schema(example = 500.0)]
    pub amount: Decimal,
    pub method: PaymentMethod,
    /// Bank or e-wallet transaction reference.
    #[schema(example = "GC-20240315-8812")]
    pub reference_number: Option<String>,
    pub notes: Option<String>,
}

pub fn validate_create_payment(payload: &CreatePaymentRequest) -> Result<(), AppError> {
    if payload.amount <= Decimal::ZERO {
        return Err(AppError::Validation(
            "Amount must be greater than zero".into(),
        ));
    }
    if payload.amount > Decimal::from(10_000_000) {
        return Err(AppError::Validation("Amount is unrealistically large".into()));
    }
    if payload.amount.normalize().scale() > 2 {
        return Err(AppError::Validation(
            "Amount must have at most two decimal places".into(),
        ));
    }
    validate_text(payload.reference_number.as_deref(), "Reference number", 128)?;
    validate_text(payload.notes.as_deref(), "Notes", 1000)?;
    if payload.method != PaymentMethod::Cash
        && payload
            .reference_number
            .as_deref()
            .is_none_or(|r| r.trim().is_empty())
    {
        return Err(AppError::Validation(
            "A reference number is required for non-cash payments".into(),
        ));
    }
    Ok(())
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct PaymentResponse {
    #[schema(example = 42)]
    pub id: i32,
    #[schema(example = "PAY-20240315-000042")]
    pub display_id: String,
    pub enrollment_id: i32,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub reference_number: Option<String>,
    pub status: PaymentStatus,
    /// Admin note; the rejection reason for rejected payments.
    pub notes: Option<String>,
    pub validated_by: Option<i32>,
    pub validated_at: Option<DateTime<Utc>>,
    pub recorded_by: i32,
    pub created_at: DateTime<Utc>,
    pub has_attachment: bool,
}

impl PaymentResponse {
    pub fn new(p: payment::Model, has_attachment: bool) -> Self {
        Self {
            display_id: format_display_id(p.id, p.created_at),
            id: p.id,
            enrollment_id: p.enrollment_id,
            amount: p.amount,
            method: p.method,
            reference_number: p.reference_number,
            status: p.status,
            notes: p.notes,
            validated_by: p.validated_by,
            validated_at: p.validated_at,
            recorded_by: p.recorded_by,
            created_at: p.created_at,
            has_attachment,
        }
    }
}

#[derive(Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PaymentListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub status: Option<PaymentStatus>,
    pub enrollment_id: Option<i32>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct PaymentListResponse {
    pub data: Vec<PaymentResponse>,
    pub pagination: Pagination,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ValidationAction {
    Validate,
    Reject,
}

impl ValidationAction {
    pub fn target_status(&self) -> PaymentStatus {
        match self {
            Self::Validate => PaymentStatus::Validated,
            Self::Reject => PaymentStatus::Rejected,
        }
    }
}

/// Admin decision on a pending payment.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct ValidatePaymentRequest {
    pub action: ValidationAction,
    /// Required when rejecting.
    pub notes: Option<String>,
}

pub fn validate_validate_request(payload: &ValidatePaymentRequest) -> Result<(), AppError> {
    validate_text(payload.notes.as_deref(), "Notes", 1000)?;
    if payload.action == ValidationAction::Reject
        && payload.notes.as_deref().is_none_or(|n| n.trim().is_empty())
    {
        return Err(AppError::Validation(
            "A rejection reason is required".into(),
        ));
    }
    Ok(())
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct RefundPaymentRequest {
    pub notes: Option<String>,
}

/// A payment after an admin decision, with the recomputed enrollment balance.
#[derive(Serialize, utoipa::ToSchema)]
pub struct PaymentDecisionResponse {
    pub payment: PaymentResponse,
    pub balance: BalanceResponse,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct PaymentAttachmentResponse {
    pub payment_id: i32,
    #[schema(example = "PAY-20240315-000042")]
    pub display_id: String,
    pub file: FileInfo,
    pub uploaded_at: DateTime<Utc>,
}
