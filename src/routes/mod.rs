//! HTTP routes for caselog

pub mod activities;
pub mod envelope;
pub mod health;

pub use activities::handle_activities_request;
pub use health::{health_check, readiness_check, version_info};
