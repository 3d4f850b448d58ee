//! Caselog - activity trail service for an insurance-agency CRM
//!
//! Caselog records and serves the agency's activity feed: audit entries
//! describing actions taken on clients, policies, claims, quotations,
//! leads, agents, and users.
//!
//! ## Services
//!
//! - **List**: role-scoped, filterable, paginated activity reads
//! - **Stats**: per-type and grouped aggregation over the same filters
//! - **Search**: relevance-ranked text search
//! - **Mutations**: create, update, soft delete, and bulk actions

pub mod activity;
pub mod auth;
pub mod config;
pub mod db;
pub mod routes;
pub mod server;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{CaselogError, Result};
