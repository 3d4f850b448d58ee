//! Read operations: list, get-by-id, and text search

use bson::{doc, oid::ObjectId};
use chrono::Utc;
use mongodb::options::FindOptions;
use tracing::debug;

use crate::activity::filter::{build_list_filter, build_search_filter, ListQuery, SearchQuery};
use crate::activity::types::{ActivityPage, ActivityView, Pagination};
use crate::activity::ActivityService;
use crate::auth::Actor;
use crate::db::schemas::ActivityDoc;
use crate::types::{CaselogError, Result};

/// Parse a path id into an ObjectId
pub(crate) fn parse_activity_id(id: &str) -> Result<ObjectId> {
    ObjectId::parse_str(id)
        .map_err(|_| CaselogError::BadRequest(format!("Invalid activity id: {}", id)))
}

/// Agents may only read activities they own or performed. The check runs
/// after existence is established, so a foreign activity yields 403, not
/// 404.
pub(crate) fn ensure_read_access(actor: &Actor, doc: &ActivityDoc) -> Result<()> {
    if actor.role.is_scoped() && doc.agent_id != actor.id && doc.user_id != actor.id {
        return Err(CaselogError::Forbidden(
            "You do not have access to this activity".into(),
        ));
    }
    Ok(())
}

impl ActivityService {
    /// List activities matching the query, paginated and display-expanded
    pub async fn list(&self, query: &ListQuery, actor: &Actor) -> Result<ActivityPage> {
        let now = Utc::now();
        let filter = build_list_filter(query, actor, now);
        debug!(filter = %filter, page = query.page, limit = query.limit, "listing activities");

        let options = FindOptions::builder()
            .sort(query.sort_doc())
            .skip(query.skip())
            .limit(query.limit as i64)
            .build();

        // Count and page are two independent reads over the same filter;
        // the total may lag concurrent writers.
        let (total, docs) = tokio::try_join!(
            self.activities.count(filter.clone()),
            self.activities.find_many(filter, Some(options)),
        )?;

        let activities = self.expand(docs).await;

        Ok(ActivityPage {
            activities,
            pagination: Pagination::build(query.page, query.limit, total),
        })
    }

    /// Fetch one activity by id.
    ///
    /// The visibility flag is deliberately not applied: a hidden activity
    /// is still fetchable by id by an authorized actor.
    pub async fn get(&self, id: &str, actor: &Actor) -> Result<ActivityView> {
        let oid = parse_activity_id(id)?;

        let doc = self
            .activities
            .find_one(doc! { "_id": oid })
            .await?
            .ok_or_else(|| CaselogError::NotFound("Activity not found".into()))?;

        ensure_read_access(actor, &doc)?;

        Ok(self.expand_one(doc).await)
    }

    /// Relevance-ranked text search over active, visible activities
    pub async fn search(&self, query: &SearchQuery, actor: &Actor) -> Result<Vec<ActivityView>> {
        let filter = build_search_filter(query, actor);
        debug!(filter = %filter, limit = query.limit, "searching activities");

        let options = FindOptions::builder()
            .projection(doc! { "score": { "$meta": "textScore" } })
            .sort(doc! { "score": { "$meta": "textScore" }, "created_at": -1 })
            .limit(query.limit as i64)
            .build();

        let docs = self.activities.find_many(filter, Some(options)).await?;
        Ok(self.expand(docs).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::db::schemas::{ActivityMetadata, ActivityStatus, ActivityType, EntityType, Priority};

    fn doc_owned_by(agent_id: &str, user_id: &str) -> ActivityDoc {
        ActivityDoc {
            _id: Some(ObjectId::new()),
            activity_type: ActivityType::Claim,
            entity_type: EntityType::Claim,
            entity_id: "CLM-1".into(),
            entity_name: "Claim 1".into(),
            action: "Claim filed".into(),
            description: "A new claim was filed".into(),
            details: None,
            agent_id: agent_id.into(),
            agent_name: "Agent".into(),
            user_id: user_id.into(),
            user_name: "User".into(),
            client_id: None,
            metadata: ActivityMetadata::default(),
            priority: Priority::Medium,
            status: ActivityStatus::Active,
            is_visible: true,
            tags: vec![],
            is_system_generated: false,
            created_at: None,
            updated_at: None,
            created_by: user_id.into(),
            updated_by: user_id.into(),
        }
    }

    fn actor(id: &str, role: Role) -> Actor {
        Actor {
            id: id.into(),
            role,
            first_name: "T".into(),
            last_name: "U".into(),
        }
    }

    #[test]
    fn invalid_ids_are_bad_requests() {
        let err = parse_activity_id("not-an-oid").unwrap_err();
        assert!(matches!(err, CaselogError::BadRequest(_)));
    }

    #[test]
    fn agents_read_own_activity() {
        let doc = doc_owned_by("a1", "u9");
        assert!(ensure_read_access(&actor("a1", Role::Agent), &doc).is_ok());
        // self-attributed counts too
        assert!(ensure_read_access(&actor("u9", Role::Agent), &doc).is_ok());
    }

    #[test]
    fn foreign_agents_are_denied_not_hidden() {
        let doc = doc_owned_by("a1", "u9");
        let err = ensure_read_access(&actor("a2", Role::Agent), &doc).unwrap_err();
        assert!(matches!(err, CaselogError::Forbidden(_)));
    }

    #[test]
    fn managers_read_everything() {
        let doc = doc_owned_by("a1", "u9");
        assert!(ensure_read_access(&actor("m1", Role::Manager), &doc).is_ok());
        assert!(ensure_read_access(&actor("s1", Role::SuperAdmin), &doc).is_ok());
    }
}
