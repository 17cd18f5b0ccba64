pub mod assessment;
pub mod assignment;
pub mod auth;
pub mod enrollment;
pub mod file;
pub mod payment;
pub mod program;
pub mod report;
pub mod shared;
pub mod user;
