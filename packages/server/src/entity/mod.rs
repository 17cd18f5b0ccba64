pub mod activity_log;
pub mod assessment;
pub mod assessment_attempt;
pub mod assessment_question;
pub mod assignment;
pub mod assignment_submission;
pub mod enrollment;
pub mod file_upload;
pub mod material;
pub mod payment;
pub mod payment_attachment;
pub mod program;
pub mod program_session;
pub mod session;
pub mod user;
pub mod user_profile;
