//! Read-only rollups. Aggregation happens in Rust over narrow tuple queries.

use std::collections::{BTreeMap, HashMap, HashSet};

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::{DateTime, Utc};
use common::grading::{LetterGrade, average, round2, weighted_final};
use common::{
    AttemptStatus, EnrollmentStatus, PaymentMethod, PaymentStatus, Role, SubmissionStatus,
};
use rust_decimal::Decimal;
use sea_orm::*;
use tracing::instrument;

use crate::entity::{
    assessment, assessment_attempt, assignment, assignment_submission, enrollment, material,
    payment, program,
};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::models::report::{
    CompletionReport, MethodTotal, MonthTotal, ProgramCompletion, ProgramGrades, RevenueQuery,
    RevenueReport, StatusTotal, StudentGradesReport, validate_revenue_query,
};
use crate::models::shared::ApiResponse;
use crate::state::AppState;

type PaymentRow = (Decimal, PaymentMethod, PaymentStatus, DateTime<Utc>);

fn summarize_revenue(rows: &[PaymentRow]) -> RevenueReport {
    let by_status = PaymentStatus::ALL
        .iter()
        .map(|&status| {
            let matching: Vec<Decimal> = rows
                .iter()
                .filter(|r| r.2 == status)
                .map(|r| r.0)
                .collect();
            StatusTotal {
                status,
                count: matching.len() as u64,
                amount: matching.iter().sum::<Decimal>().normalize(),
            }
        })
        .collect();

    let validated: Vec<&PaymentRow> = rows
        .iter()
        .filter(|r| r.2 == PaymentStatus::Validated)
        .collect();

    let by_method = PaymentMethod::ALL
        .iter()
        .map(|&method| {
            let matching: Vec<Decimal> = validated
                .iter()
                .filter(|r| r.1 == method)
                .map(|r| r.0)
                .collect();
            MethodTotal {
                method,
                count: matching.len() as u64,
                amount: matching.iter().sum::<Decimal>().normalize(),
            }
        })
        .filter(|m| m.count > 0)
        .collect();

    let mut months: BTreeMap<String, (u64, Decimal)> = BTreeMap::new();
    for row in &validated {
        let entry = months
            .entry(row.3.format("%Y-%m").to_string())
            .or_default();
        entry.0 += 1;
        entry.1 += row.0;
    }
    let by_month = months
        .into_iter()
        .map(|(month, (count, amount))| MonthTotal {
            month,
            count,
            amount: amount.normalize(),
        })
        .collect();

    RevenueReport {
        total_revenue: validated.iter().map(|r| r.0).sum::<Decimal>().normalize(),
        by_status,
        by_method,
        by_month,
    }
}

fn completion_rate(completed: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        round2(completed as f64 / total as f64 * 100.0)
    }
}

#[utoipa::path(
    get,
    path = "/revenue",
    tag = "Reports",
    operation_id = "revenueReport",
    summary = "Revenue summary",
    description = "Admin only. Validated payments make up revenue; counts per status include \
        every payment in the window. Months are `YYYY-MM` of the payment's creation date.",
    params(RevenueQuery),
    responses(
        (status = 200, description = "Revenue report", body = ApiResponse<RevenueReport>),
        (status = 400, description = "Bad date window (VALIDATION_ERROR)", body = ErrorBody),
        (status = 403, description = "Admins only (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("session" = [])),
)]
#[instrument(skip(state, auth_user, query))]
pub async fn revenue_report(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<RevenueQuery>,
) -> Result<Json<ApiResponse<RevenueReport>>, AppError> {
    auth_user.require_role(Role::Admin)?;
    validate_revenue_query(&query)?;

    let mut select = payment::Entity::find()
        .select_only()
        .column(payment::Column::Amount)
        .column(payment::Column::Method)
        .column(payment::Column::Status)
        .column(payment::Column::CreatedAt);
    if let Some(from) = query.from.and_then(|d| d.and_hms_opt(0, 0, 0)) {
        select = select.filter(payment::Column::CreatedAt.gte(from.and_utc()));
    }
    if let Some(to) = query
        .to
        .and_then(|d| d.succ_opt())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        select = select.filter(payment::Column::CreatedAt.lt(to.and_utc()));
    }
    let rows: Vec<PaymentRow> = select.into_tuple().all(&state.db).await?;

    Ok(Json(ApiResponse::ok(summarize_revenue(&rows))))
}

#[utoipa::path(
    get,
    path = "/completion",
    tag = "Reports",
    operation_id = "completionReport",
    summary = "Completion rate per program",
    description = "Admins see every program, tutors their own. Cancelled enrollments count \
        toward the total.",
    responses(
        (status = 200, description = "Completion report", body = ApiResponse<CompletionReport>),
        (status = 403, description = "Students have no access (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("session" = [])),
)]
#[instrument(skip(state, auth_user))]
pub async fn completion_report(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<CompletionReport>>, AppError> {
    auth_user.require_any_role(&[Role::Admin, Role::Tutor])?;

    let mut programs = program::Entity::find().order_by_asc(program::Column::Id);
    if !auth_user.is_admin() {
        programs = programs.filter(program::Column::TutorId.eq(auth_user.user_id));
    }
    let programs = programs.all(&state.db).await?;
    let ids: Vec<i32> = programs.iter().map(|p| p.id).collect();

    let statuses: Vec<(i32, EnrollmentStatus)> = if ids.is_empty() {
        Vec::new()
    } else {
        enrollment::Entity::find()
            .select_only()
            .column(enrollment::Column::ProgramId)
            .column(enrollment::Column::Status)
            .filter(enrollment::Column::ProgramId.is_in(ids))
            .into_tuple()
            .all(&state.db)
            .await?
    };

    let mut counts: HashMap<i32, (u64, u64)> = HashMap::new();
    for (program_id, status) in statuses {
        let entry = counts.entry(program_id).or_default();
        entry.0 += 1;
        if status == EnrollmentStatus::Completed {
            entry.1 += 1;
        }
    }

    let data = programs
        .into_iter()
        .map(|p| {
            let (total, completed) = counts.get(&p.id).copied().unwrap_or_default();
            ProgramCompletion {
                program_id: p.id,
                program_name: p.name,
                total_enrollments: total,
                completed,
                completion_rate: completion_rate(completed, total),
            }
        })
        .collect();

    Ok(Json(ApiResponse::ok(CompletionReport { data })))
}

/// Material id -> program id for the given materials.
async fn material_programs<C: ConnectionTrait>(
    db: &C,
    material_ids: HashSet<i32>,
) -> Result<HashMap<i32, i32>, AppError> {
    if material_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows: Vec<(i32, i32)> = material::Entity::find()
        .select_only()
        .column(material::Column::Id)
        .column(material::Column::ProgramId)
        .filter(material::Column::Id.is_in(material_ids))
        .into_tuple()
        .all(db)
        .await?;
    Ok(rows.into_iter().collect())
}

/// Graded percentages grouped by program.
async fn graded_by_program<C: ConnectionTrait>(
    db: &C,
    student_id: i32,
) -> Result<(HashMap<i32, Vec<f64>>, HashMap<i32, Vec<f64>>), AppError> {
    let attempts: Vec<(i32, Option<f64>)> = assessment_attempt::Entity::find()
        .select_only()
        .column(assessment_attempt::Column::AssessmentId)
        .column(assessment_attempt::Column::Percentage)
        .filter(assessment_attempt::Column::StudentId.eq(student_id))
        .filter(assessment_attempt::Column::Status.eq(AttemptStatus::Graded))
        .into_tuple()
        .all(db)
        .await?;
    let submissions: Vec<(i32, Option<f64>)> = assignment_submission::Entity::find()
        .select_only()
        .column(assignment_submission::Column::AssignmentId)
        .column(assignment_submission::Column::Percentage)
        .filter(assignment_submission::Column::StudentId.eq(student_id))
        .filter(assignment_submission::Column::Status.eq(SubmissionStatus::Graded))
        .into_tuple()
        .all(db)
        .await?;

    let assessment_materials: HashMap<i32, i32> = if attempts.is_empty() {
        HashMap::new()
    } else {
        assessment::Entity::find()
            .select_only()
            .column(assessment::Column::Id)
            .column(assessment::Column::MaterialId)
            .filter(assessment::Column::Id.is_in(attempts.iter().map(|a| a.0)))
            .into_tuple::<(i32, i32)>()
            .all(db)
            .await?
            .into_iter()
            .collect()
    };
    let assignment_materials: HashMap<i32, i32> = if submissions.is_empty() {
        HashMap::new()
    } else {
        assignment::Entity::find()
            .select_only()
            .column(assignment::Column::Id)
            .column(assignment::Column::MaterialId)
            .filter(assignment::Column::Id.is_in(submissions.iter().map(|s| s.0)))
            .into_tuple::<(i32, i32)>()
            .all(db)
            .await?
            .into_iter()
            .collect()
    };

    let programs_of = material_programs(
        db,
        assessment_materials
            .values()
            .chain(assignment_materials.values())
            .copied()
            .collect(),
    )
    .await?;

    let group = |rows: Vec<(i32, Option<f64>)>, materials: &HashMap<i32, i32>| {
        let mut grouped: HashMap<i32, Vec<f64>> = HashMap::new();
        for (item_id, pct) in rows {
            let program_id = materials.get(&item_id).and_then(|m| programs_of.get(m));
            if let (Some(&program_id), Some(pct)) = (program_id, pct) {
                grouped.entry(program_id).or_default().push(pct);
            }
        }
        grouped
    };

    Ok((
        group(attempts, &assessment_materials),
        group(submissions, &assignment_materials),
    ))
}

#[utoipa::path(
    get,
    path = "/students/{id}/grades",
    tag = "Reports",
    operation_id = "studentGradesReport",
    summary = "A student's grades per program",
    description = "Average assessment and assignment percentages per enrolled program, the \
        50/50 weighted final and its letter grade. Visible to the student, admins, and tutors \
        (restricted to the programs they teach).",
    params(("id" = i32, Path, description = "Student user ID")),
    responses(
        (status = 200, description = "Grades report", body = ApiResponse<StudentGradesReport>),
        (status = 403, description = "Not allowed (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("session" = [])),
)]
#[instrument(skip(state, auth_user), fields(student_id = %id))]
pub async fn student_grades_report(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<StudentGradesReport>>, AppError> {
    let program_ids: Vec<i32> = enrollment::Entity::find()
        .select_only()
        .column(enrollment::Column::ProgramId)
        .filter(enrollment::Column::StudentId.eq(id))
        .into_tuple()
        .all(&state.db)
        .await?;

    let mut programs = if program_ids.is_empty() {
        Vec::new()
    } else {
        program::Entity::find()
            .filter(program::Column::Id.is_in(program_ids))
            .order_by_asc(program::Column::Id)
            .all(&state.db)
            .await?
    };

    match auth_user.role {
        Role::Admin => {}
        Role::Student if auth_user.user_id == id => {}
        Role::Tutor => {
            programs.retain(|p| p.tutor_id == Some(auth_user.user_id));
            if programs.is_empty() {
                return Err(AppError::Forbidden);
            }
        }
        Role::Student => return Err(AppError::Forbidden),
    }

    let (mut assessments, mut assignments) = graded_by_program(&state.db, id).await?;

    let programs = programs
        .into_iter()
        .map(|p| {
            let assessment_pcts = assessments.remove(&p.id).unwrap_or_default();
            let assignment_pcts = assignments.remove(&p.id).unwrap_or_default();
            let graded_assessments = assessment_pcts.len() as u64;
            let graded_assignments = assignment_pcts.len() as u64;
            let assessment_average = average(assessment_pcts);
            let assignment_average = average(assignment_pcts);
            let final_percentage = weighted_final(assessment_average, assignment_average);
            ProgramGrades {
                program_id: p.id,
                program_name: p.name,
                graded_assessments,
                graded_assignments,
                assessment_average,
                assignment_average,
                final_percentage,
                letter_grade: final_percentage.map(LetterGrade::from_percentage),
            }
        })
        .collect();

    Ok(Json(ApiResponse::ok(StudentGradesReport {
        student_id: id,
        programs,
    })))
}
