#[cfg(feature = "sea-orm")]
use sea_orm::prelude::StringLen;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Accepted payment channels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "cash"))]
    Cash,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "bank_transfer"))]
    BankTransfer,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "gcash"))]
    Gcash,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "paypal"))]
    Paypal,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "credit_card"))]
    CreditCard,
}

impl PaymentMethod {
    pub const ALL: &'static [PaymentMethod] = &[
        Self::Cash,
        Self::BankTransfer,
        Self::Gcash,
        Self::Paypal,
        Self::CreditCard,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::BankTransfer => "bank_transfer",
            Self::Gcash => "gcash",
            Self::Paypal => "paypal",
            Self::CreditCard => "credit_card",
        }
    }

    /// Label used on rendered receipts.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Cash => "Cash",
            Self::BankTransfer => "Bank Transfer",
            Self::Gcash => "GCash",
            Self::Paypal => "PayPal",
            Self::CreditCard => "Credit Card",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment lifecycle. `pending -> {validated, rejected}`, `validated -> refunded`.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema,
)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "pending"))]
    Pending,
    /// Confirmed received by an admin. Only these count toward balance and revenue.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "validated"))]
    Validated,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "rejected"))]
    Rejected,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "refunded"))]
    Refunded,
}

impl PaymentStatus {
    pub const ALL: &'static [PaymentStatus] = &[
        Self::Pending,
        Self::Validated,
        Self::Rejected,
        Self::Refunded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Validated => "validated",
            Self::Rejected => "rejected",
            Self::Refunded => "refunded",
        }
    }

    /// The state a payment must be in before moving to `next`.
    pub fn required_predecessor(next: PaymentStatus) -> Option<PaymentStatus> {
        match next {
            Self::Validated | Self::Rejected => Some(Self::Pending),
            Self::Refunded => Some(Self::Validated),
            Self::Pending => None,
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outstanding balance of an enrollment: program fee minus validated payments.
///
/// Never persisted; callers recompute it from the current payment rows.
pub fn balance<I>(total_fee: Decimal, validated_amounts: I) -> Decimal
where
    I: IntoIterator<Item = Decimal>,
{
    let paid: Decimal = validated_amounts.into_iter().sum();
    (total_fee - paid).normalize()
}

/// Format the human-facing payment id: `PAY-YYYYMMDD-NNNNNN`.
///
/// The numeric suffix is zero-padded to six digits; larger ids keep all their digits.
pub fn format_display_id(id: i32, created_at: DateTime<Utc>) -> String {
    format!("PAY-{}-{:06}", created_at.format("%Y%m%d"), id)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentRefError {
    #[error("Payment reference must not be empty")]
    Empty,
    #[error("Invalid payment reference '{0}': expected an id or PAY-YYYYMMDD-NNNNNN")]
    Malformed(String),
    #[error("Invalid date in payment reference '{0}'")]
    InvalidDate(String),
    #[error("Invalid id in payment reference '{0}'")]
    InvalidId(String),
}

/// A payment identifier given either as a raw id or as a display id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentRef {
    pub id: i32,
    /// Creation date encoded in a display id; `None` for raw ids.
    pub date: Option<NaiveDate>,
}

impl PaymentRef {
    /// Canonical display form. Raw refs have no date and fall back to the bare id.
    pub fn to_display(&self) -> String {
        match self.date {
            Some(date) => format!("PAY-{}-{:06}", date.format("%Y%m%d"), self.id),
            None => self.id.to_string(),
        }
    }

    /// Whether this reference names a payment created at `created_at`.
    pub fn matches_date(&self, created_at: DateTime<Utc>) -> bool {
        self.date.is_none_or(|d| d == created_at.date_naive())
    }
}

fn parse_positive_id(digits: &str, original: &str) -> Result<i32, PaymentRefError> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(PaymentRefError::Malformed(original.to_string()));
    }
    match digits.parse::<i32>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(PaymentRefError::InvalidId(original.to_string())),
    }
}

impl FromStr for PaymentRef {
    type Err = PaymentRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(PaymentRefError::Empty);
        }

        let Some(rest) = s.strip_prefix("PAY-") else {
            let id = parse_positive_id(s, s)?;
            return Ok(Self { id, date: None });
        };

        let (date_part, id_part) = rest
            .split_once('-')
            .ok_or_else(|| PaymentRefError::Malformed(s.to_string()))?;

        if date_part.len() != 8 || !date_part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PaymentRefError::Malformed(s.to_string()));
        }
        let date = NaiveDate::parse_from_str(date_part, "%Y%m%d")
            .map_err(|_| PaymentRefError::InvalidDate(s.to_string()))?;

        // Below six digits the suffix is not zero-padded; above six a leading
        // zero could never have been produced by the formatter.
        if id_part.len() < 6 || (id_part.len() > 6 && id_part.starts_with('0')) {
            return Err(PaymentRefError::Malformed(s.to_string()));
        }
        let id = parse_positive_id(id_part, s)?;

        Ok(Self {
            id,
            date: Some(date),
        })
    }
}
