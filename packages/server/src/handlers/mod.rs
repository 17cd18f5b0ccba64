pub mod assessment;
pub mod assignment;
pub mod attempt;
pub mod auth;
pub mod enrollment;
pub mod file;
pub mod payment;
pub mod program;
pub mod report;
pub mod user;
