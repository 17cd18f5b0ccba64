use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::config::AppConfig;
use crate::handlers::{
    assessment, assignment, attempt, auth, enrollment, file, payment, program, report, user,
};
use crate::state::AppState;
use crate::utils::upload::upload_body_limit;

pub fn routes(config: &AppConfig) -> OpenApiRouter<AppState> {
    let max_upload = config.storage.max_upload_size;

    OpenApiRouter::new()
        .nest("/auth", auth_routes())
        .nest("/users", user_routes())
        .nest("/programs", program_routes())
        .nest("/enrollments", enrollment_routes())
        .nest("/assessments", assessment_routes())
        .nest("/attempts", attempt_routes(max_upload))
        .nest("/assignments", assignment_routes(max_upload))
        .nest("/assignment-submissions", submission_routes(max_upload))
        .nest("/payments", payment_routes(max_upload))
        .nest("/files", OpenApiRouter::new().routes(routes!(file::download_file)))
        .nest("/reports", report_routes())
}

fn auth_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(auth::login))
        .routes(routes!(auth::logout))
        .routes(routes!(auth::me))
}

fn user_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(user::create_user, user::list_users))
        .routes(routes!(user::update_user_status))
        .routes(routes!(user::get_my_profile, user::update_my_profile))
}

fn program_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(program::create_program, program::list_programs))
        .routes(routes!(program::get_program, program::update_program))
        .routes(routes!(program::create_session, program::list_sessions))
        .routes(routes!(program::create_material, program::list_materials))
}

fn enrollment_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(
            enrollment::create_enrollment,
            enrollment::list_enrollments
        ))
        .routes(routes!(enrollment::update_enrollment_status))
        .routes(routes!(enrollment::get_balance))
}

fn assessment_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(assessment::create_assessment))
        .routes(routes!(
            assessment::get_assessment,
            assessment::delete_assessment
        ))
        .routes(routes!(attempt::start_attempt, attempt::list_attempts))
        .routes(routes!(attempt::get_my_attempt))
}

fn attempt_routes(max_upload: u64) -> OpenApiRouter<AppState> {
    let uploads = OpenApiRouter::new()
        .routes(routes!(attempt::submit_attempt))
        .routes(routes!(attempt::edit_attempt))
        .layer(upload_body_limit(max_upload));

    OpenApiRouter::new()
        .routes(routes!(attempt::grade_attempt))
        .merge(uploads)
}

fn assignment_routes(max_upload: u64) -> OpenApiRouter<AppState> {
    let uploads = OpenApiRouter::new()
        .routes(routes!(assignment::submit_assignment))
        .layer(upload_body_limit(max_upload));

    OpenApiRouter::new()
        .routes(routes!(assignment::create_assignment))
        .routes(routes!(assignment::get_assignment))
        .routes(routes!(assignment::list_submissions))
        .routes(routes!(assignment::get_my_submission))
        .merge(uploads)
}

fn submission_routes(max_upload: u64) -> OpenApiRouter<AppState> {
    // GET and PUT share `/{id}`, so the limit covers the whole group.
    OpenApiRouter::new()
        .routes(routes!(
            assignment::get_submission,
            assignment::edit_submission
        ))
        .routes(routes!(assignment::grade_submission))
        .layer(upload_body_limit(max_upload))
}

fn payment_routes(max_upload: u64) -> OpenApiRouter<AppState> {
    let uploads = OpenApiRouter::new()
        .routes(routes!(payment::upload_attachment))
        .layer(upload_body_limit(max_upload));

    OpenApiRouter::new()
        .routes(routes!(payment::create_payment, payment::list_payments))
        .routes(routes!(payment::get_payment))
        .routes(routes!(payment::validate_payment))
        .routes(routes!(payment::refund_payment))
        .routes(routes!(payment::download_attachment))
        .routes(routes!(payment::get_receipt))
        .merge(uploads)
}

fn report_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(report::revenue_report))
        .routes(routes!(report::completion_report))
        .routes(routes!(report::student_grades_report))
}
