use chrono::NaiveDate;
use common::grading::LetterGrade;
use common::{PaymentMethod, PaymentStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Optional inclusive creation-date window.
#[derive(Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RevenueQuery {
    #[param(example = "2024-01-01")]
    pub from: Option<NaiveDate>,
    #[param(example = "2024-12-31")]
    pub to: Option<NaiveDate>,
}

pub fn validate_revenue_query(query: &RevenueQuery) -> Result<(), AppError> {
    if let (Some(from), Some(to)) = (query.from, query.to)
        && from > to
    {
        return Err(AppError::Validation("`from` must not be after `to`".into()));
    }
    Ok(())
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct StatusTotal {
    pub status: PaymentStatus,
    pub count: u64,
    pub amount: Decimal,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct MethodTotal {
    pub method: PaymentMethod,
    pub count: u64,
    pub amount: Decimal,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct MonthTotal {
    #[schema(example = "2024-03")]
    pub month: String,
    pub count: u64,
    pub amount: Decimal,
}

/// Only validated payments count toward revenue; `by_status` covers all.
#[derive(Serialize, utoipa::ToSchema)]
pub struct RevenueReport {
    #[schema(example = 125000.0)]
    pub total_revenue: Decimal,
    pub by_status: Vec<StatusTotal>,
    pub by_method: Vec<MethodTotal>,
    pub by_month: Vec<MonthTotal>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ProgramCompletion {
    pub program_id: i32,
    pub program_name: String,
    pub total_enrollments: u64,
    pub completed: u64,
    /// Percentage with two decimals; 0 when there are no enrollments.
    #[schema(example = 66.67)]
    pub completion_rate: f64,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct CompletionReport {
    pub data: Vec<ProgramCompletion>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ProgramGrades {
    pub program_id: i32,
    pub program_name: String,
    pub graded_assessments: u64,
    pub graded_assignments: u64,
    pub assessment_average: Option<f64>,
    pub assignment_average: Option<f64>,
    /// 50% assessments, 50% assignments; a lone category counts fully.
    pub final_percentage: Option<f64>,
    pub letter_grade: Option<LetterGrade>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct StudentGradesReport {
    pub student_id: i32,
    pub programs: Vec<ProgramGrades>,
}
