use common::{Role, UserStatus};
use sea_orm::sea_query::{Index, IndexCreateStatement, PostgresQueryBuilder};
use sea_orm::*;
use tracing::info;

use crate::config::AuthConfig;
use crate::entity::{
    assessment_attempt, assignment_submission, enrollment, payment, program_session, user,
};
use crate::utils::hash::hash_password;

/// Composite unique indexes the workflows depend on for one-per-student rules.
fn unique_indexes() -> Vec<(&'static str, IndexCreateStatement)> {
    vec![
        (
            "uq_attempt_assessment_student",
            Index::create()
                .if_not_exists()
                .unique()
                .name("uq_attempt_assessment_student")
                .table(assessment_attempt::Entity)
                .col(assessment_attempt::Column::AssessmentId)
                .col(assessment_attempt::Column::StudentId)
                .to_owned(),
        ),
        (
            "uq_submission_assignment_student",
            Index::create()
                .if_not_exists()
                .unique()
                .name("uq_submission_assignment_student")
                .table(assignment_submission::Entity)
                .col(assignment_submission::Column::AssignmentId)
                .col(assignment_submission::Column::StudentId)
                .to_owned(),
        ),
        (
            "uq_enrollment_program_student",
            Index::create()
                .if_not_exists()
                .unique()
                .name("uq_enrollment_program_student")
                .table(enrollment::Entity)
                .col(enrollment::Column::ProgramId)
                .col(enrollment::Column::StudentId)
                .to_owned(),
        ),
    ]
}

/// Ensure required database indexes exist.
///
/// Schema sync only knows single-column uniqueness, so composite indexes are
/// created here on startup. Unique indexes are required; lookup indexes are
/// best effort.
pub async fn ensure_indexes(db: &DatabaseConnection) -> Result<(), DbErr> {
    for (name, stmt) in unique_indexes() {
        db.execute_unprepared(&stmt.to_string(PostgresQueryBuilder))
            .await?;
        info!("Ensured index {} exists", name);
    }

    // Balance and revenue queries:
    // SELECT amount FROM payment WHERE enrollment_id = ? AND status = 'validated'
    let stmt = Index::create()
        .if_not_exists()
        .name("idx_payment_enrollment_status")
        .table(payment::Entity)
        .col(payment::Column::EnrollmentId)
        .col(payment::Column::Status)
        .to_string(PostgresQueryBuilder);
    if let Err(e) = db.execute_unprepared(&stmt).await {
        tracing::warn!("Failed to create index idx_payment_enrollment_status: {}", e);
    }

    // Overlap checks scan a program's sessions by start time.
    let stmt = Index::create()
        .if_not_exists()
        .name("idx_program_session_program_starts")
        .table(program_session::Entity)
        .col(program_session::Column::ProgramId)
        .col(program_session::Column::StartsAt)
        .to_string(PostgresQueryBuilder);
    if let Err(e) = db.execute_unprepared(&stmt).await {
        tracing::warn!(
            "Failed to create index idx_program_session_program_starts: {}",
            e
        );
    }

    Ok(())
}

/// Create the configured admin account when no admin exists yet.
///
/// Does nothing unless both bootstrap username and password are configured.
pub async fn ensure_bootstrap_admin(db: &DatabaseConnection, auth: &AuthConfig) -> Result<(), DbErr> {
    let (Some(username), Some(password)) = (
        auth.bootstrap_admin_username.as_deref(),
        auth.bootstrap_admin_password.as_deref(),
    ) else {
        return Ok(());
    };

    let admins = user::Entity::find()
        .filter(user::Column::Role.eq(Role::Admin))
        .count(db)
        .await?;
    if admins > 0 {
        return Ok(());
    }

    let password_hash =
        hash_password(password).map_err(|e| DbErr::Custom(format!("hashing failed: {e}")))?;

    let result = user::Entity::insert(user::ActiveModel {
        username: Set(username.to_string()),
        password: Set(password_hash),
        full_name: Set("Administrator".into()),
        email: Set(None),
        role: Set(Role::Admin),
        status: Set(UserStatus::Active),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    })
    .on_conflict(
        sea_orm::sea_query::OnConflict::column(user::Column::Username)
            .do_nothing()
            .to_owned(),
    )
    .exec_without_returning(db)
    .await;

    match result {
        Ok(0) | Err(DbErr::RecordNotInserted) => {
            tracing::warn!(
                username,
                "Bootstrap admin not created: username already in use"
            );
        }
        Ok(_) => info!(username, "Created bootstrap admin account"),
        Err(e) => return Err(e),
    }

    Ok(())
}
