//! Activity domain: the role-aware, filterable, paginated query and
//! mutation service behind the `/activities` routes.
//!
//! Submodules:
//! - `filter` - query-parameter parsing and MongoDB filter construction
//! - `validate` - declarative payload validation with per-field errors
//! - `types` - wire DTOs (requests and camelCase views)
//! - `query` / `stats` / `mutate` - the read, aggregation, and write
//!   operations
//! - `expand` - read-side display expansion of agent/user/client references

pub mod filter;
pub mod types;
pub mod validate;

mod expand;
mod mutate;
mod query;
mod stats;

use std::sync::Arc;

use crate::db::refs::{MongoReferenceStore, ReferenceStore};
use crate::db::schemas::{ActivityDoc, ACTIVITY_COLLECTION};
use crate::db::{MongoClient, MongoCollection};
use crate::types::Result;

pub use filter::{ListQuery, Params, SearchQuery, StatsQuery};
pub use types::{
    ActivityPage, ActivityStats, ActivityView, BulkActionRequest, BulkResult,
    CreateActivityRequest, RequestContext, UpdateActivityRequest,
};
pub use validate::BulkOp;

/// Stateless per-request handle on the activity collection and the
/// reference store used for display expansion.
pub struct ActivityService {
    activities: MongoCollection<ActivityDoc>,
    refs: Arc<dyn ReferenceStore>,
}

impl ActivityService {
    /// Open the service against a connected MongoDB client
    pub async fn open(mongo: &MongoClient) -> Result<Self> {
        let activities = mongo.collection::<ActivityDoc>(ACTIVITY_COLLECTION).await?;
        let refs: Arc<dyn ReferenceStore> = Arc::new(MongoReferenceStore::new(mongo.clone()));
        Ok(Self { activities, refs })
    }

    /// Construct from parts (used by tests with a stub reference store)
    pub fn from_parts(
        activities: MongoCollection<ActivityDoc>,
        refs: Arc<dyn ReferenceStore>,
    ) -> Self {
        Self { activities, refs }
    }
}
