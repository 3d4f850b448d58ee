//! Database schemas for caselog
//!
//! Defines the MongoDB document structure for activities. Reference data
//! (agents, clients, users) is owned by other CRM services and read
//! untyped; see `db::refs`.

mod activity;

pub use activity::{
    ActivityDoc, ActivityMetadata, ActivityStatus, ActivityType, EntityType, Priority,
    ACTIVITY_COLLECTION,
};
