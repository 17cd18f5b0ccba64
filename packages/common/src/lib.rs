pub mod attempt;
pub mod config;
pub mod grading;
pub mod payment;
pub mod role;
pub mod status;
pub mod storage;

pub use payment::{PaymentMethod, PaymentRef, PaymentStatus};
pub use role::{Role, UserStatus};
pub use status::{AttemptStatus, EnrollmentStatus, ProgramStatus, SubmissionStatus};
