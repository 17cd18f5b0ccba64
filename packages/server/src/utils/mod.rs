pub mod access;
pub mod activity;
pub mod filename;
pub mod hash;
pub mod receipt;
pub mod upload;
