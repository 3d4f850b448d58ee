//! Write operations: create, update, soft delete, and bulk actions

use bson::{doc, Bson, DateTime, Document};
use tracing::info;

use crate::activity::filter::FilterTree;
use crate::activity::query::{ensure_read_access, parse_activity_id};
use crate::activity::types::{
    BulkActionRequest, BulkResult, CreateActivityRequest, MetadataInput, RequestContext,
    UpdateActivityRequest,
};
use crate::activity::validate::{validate_bulk, validate_create, validate_update, BulkOp};
use crate::activity::{ActivityService, ActivityView};
use crate::auth::Actor;
use crate::db::schemas::{ActivityDoc, ActivityStatus};
use crate::types::{CaselogError, FieldError, Result};

/// Drop duplicate ids, preserving first-seen order.
///
/// Deduplicating before the eligibility comparison keeps the bulk
/// authorization check honest: a repeated id can never stand in for a
/// missing or unauthorized one.
fn dedup_ids(ids: &[String]) -> Vec<String> {
    let mut seen = Vec::with_capacity(ids.len());
    for id in ids {
        if !seen.contains(id) {
            seen.push(id.clone());
        }
    }
    seen
}

/// Fold the request origin into activity metadata. The captured values
/// win over anything the caller supplied.
fn merge_request_context(
    metadata: Option<MetadataInput>,
    ctx: &RequestContext,
) -> crate::db::schemas::ActivityMetadata {
    let mut metadata = metadata.map(MetadataInput::into_stored).unwrap_or_default();
    metadata.ip_address = ctx.ip_address.clone().or(metadata.ip_address);
    metadata.user_agent = ctx.user_agent.clone().or(metadata.user_agent);
    metadata
}

/// Default the acting user to the authenticated actor when the payload
/// leaves it out
fn resolve_acting_user(
    user_id: Option<String>,
    user_name: Option<String>,
    actor: &Actor,
) -> (String, String) {
    let user_id = user_id
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| actor.id.clone());
    let user_name = user_name
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| actor.display_name());
    (user_id, user_name)
}

/// Render the update document for a bulk operation.
/// Tag edits do not reattribute the record; everything else stamps
/// `updated_by`.
fn bulk_update_doc(op: &BulkOp, actor: &Actor, now: DateTime) -> Document {
    match op {
        BulkOp::Archive => doc! { "$set": {
            "status": ActivityStatus::Archived.as_str(),
            "updated_by": &actor.id,
            "updated_at": now,
        }},
        BulkOp::Hide => doc! { "$set": {
            "is_visible": false,
            "updated_by": &actor.id,
            "updated_at": now,
        }},
        BulkOp::Show => doc! { "$set": {
            "is_visible": true,
            "updated_by": &actor.id,
            "updated_at": now,
        }},
        BulkOp::Delete => doc! { "$set": {
            "status": ActivityStatus::Hidden.as_str(),
            "is_visible": false,
            "updated_by": &actor.id,
            "updated_at": now,
        }},
        BulkOp::AddTag(tag) => doc! {
            "$addToSet": { "tags": tag },
            "$set": { "updated_at": now },
        },
        BulkOp::RemoveTag(tag) => doc! {
            "$pull": { "tags": tag },
            "$set": { "updated_at": now },
        },
        BulkOp::ChangePriority(priority) => doc! { "$set": {
            "priority": priority.as_str(),
            "updated_by": &actor.id,
            "updated_at": now,
        }},
    }
}

impl ActivityService {
    /// Record a new activity on behalf of the actor
    pub async fn create(
        &self,
        req: CreateActivityRequest,
        actor: &Actor,
        ctx: &RequestContext,
    ) -> Result<ActivityView> {
        let valid = validate_create(&req)?;

        let metadata = merge_request_context(req.metadata, ctx);
        let (user_id, user_name) = resolve_acting_user(req.user_id, req.user_name, actor);

        let activity = ActivityDoc {
            _id: None,
            activity_type: valid.activity_type,
            entity_type: valid.entity_type,
            entity_id: req.entity_id,
            entity_name: req.entity_name,
            action: req.action,
            description: req.description,
            details: req.details,
            agent_id: req.agent_id,
            agent_name: req.agent_name,
            user_id,
            user_name,
            client_id: req.client_id,
            metadata,
            priority: valid.priority,
            status: ActivityStatus::Active,
            is_visible: true,
            tags: req.tags.unwrap_or_default(),
            is_system_generated: req.is_system_generated.unwrap_or(false),
            created_at: None,
            updated_at: None,
            created_by: actor.id.clone(),
            updated_by: actor.id.clone(),
        };

        let id = self.activities.insert_one(activity).await?;
        info!(activity = %id, actor = %actor.id, "activity created");

        let stored = self
            .activities
            .find_one(doc! { "_id": id })
            .await?
            .ok_or_else(|| {
                CaselogError::Database("Inserted activity could not be read back".into())
            })?;

        Ok(self.expand_one(stored).await)
    }

    /// Apply a patch to an activity's mutable fields
    pub async fn update(
        &self,
        id: &str,
        patch: UpdateActivityRequest,
        actor: &Actor,
    ) -> Result<ActivityView> {
        let oid = parse_activity_id(id)?;
        let valid = validate_update(&patch)?;

        let existing = self
            .activities
            .find_one(doc! { "_id": oid })
            .await?
            .ok_or_else(|| CaselogError::NotFound("Activity not found".into()))?;

        // Same ownership rule as reads: agents touch only their own
        ensure_read_access(actor, &existing)?;

        let mut set = Document::new();
        if let Some(action) = patch.action {
            set.insert("action", action);
        }
        if let Some(t) = valid.activity_type {
            set.insert("activity_type", t.as_str());
        }
        if let Some(description) = patch.description {
            set.insert("description", description);
        }
        if let Some(details) = patch.details {
            set.insert("details", details);
        }
        if let Some(name) = patch.entity_name {
            set.insert("entity_name", name);
        }
        if let Some(agent_id) = patch.agent_id {
            set.insert("agent_id", agent_id);
        }
        if let Some(agent_name) = patch.agent_name {
            set.insert("agent_name", agent_name);
        }
        if let Some(user_id) = patch.user_id {
            set.insert("user_id", user_id);
        }
        if let Some(user_name) = patch.user_name {
            set.insert("user_name", user_name);
        }
        if let Some(client_id) = patch.client_id {
            set.insert("client_id", client_id);
        }
        if let Some(metadata) = patch.metadata {
            let stored = metadata.into_stored();
            let value = bson::to_bson(&stored)
                .map_err(|e| CaselogError::Internal(format!("Metadata encoding failed: {}", e)))?;
            set.insert("metadata", value);
        }
        if let Some(p) = valid.priority {
            set.insert("priority", p.as_str());
        }
        if let Some(s) = valid.status {
            set.insert("status", s.as_str());
        }
        if let Some(is_visible) = patch.is_visible {
            set.insert("is_visible", is_visible);
        }
        if let Some(tags) = patch.tags {
            set.insert("tags", tags);
        }
        if let Some(flag) = patch.is_system_generated {
            set.insert("is_system_generated", flag);
        }

        set.insert("updated_by", &actor.id);
        set.insert("updated_at", DateTime::now());

        let updated = self
            .activities
            .update_and_fetch(doc! { "_id": oid }, doc! { "$set": set })
            .await?
            .ok_or_else(|| CaselogError::NotFound("Activity not found".into()))?;

        info!(activity = %id, actor = %actor.id, "activity updated");

        Ok(self.expand_one(updated).await)
    }

    /// Soft delete: the record stays in the store, hidden from every
    /// list/search/stat query. Idempotent.
    pub async fn delete(&self, id: &str, actor: &Actor) -> Result<()> {
        if !actor.role.can_delete() {
            return Err(CaselogError::Forbidden(
                "Only managers may delete activities".into(),
            ));
        }

        let oid = parse_activity_id(id)?;

        let result = self
            .activities
            .update_one(
                doc! { "_id": oid },
                doc! { "$set": {
                    "status": ActivityStatus::Hidden.as_str(),
                    "is_visible": false,
                    "updated_by": &actor.id,
                    "updated_at": DateTime::now(),
                }},
            )
            .await?;

        if result.matched_count == 0 {
            return Err(CaselogError::NotFound("Activity not found".into()));
        }

        info!(activity = %id, actor = %actor.id, "activity deleted");
        Ok(())
    }

    /// Apply one mutation uniformly across a set of activities.
    ///
    /// Authorization is all-or-nothing: every requested id must resolve
    /// inside the actor's eligible set before anything is touched.
    pub async fn bulk(&self, req: BulkActionRequest, actor: &Actor) -> Result<BulkResult> {
        let op = validate_bulk(&req)?;

        if op.is_delete() && !actor.role.can_delete() {
            return Err(CaselogError::Forbidden(
                "Only managers may bulk-delete activities".into(),
            ));
        }

        let distinct = dedup_ids(&req.activity_ids);
        let mut oids = Vec::with_capacity(distinct.len());
        for id in &distinct {
            match bson::oid::ObjectId::parse_str(id) {
                Ok(oid) => oids.push(Bson::ObjectId(oid)),
                Err(_) => {
                    return Err(CaselogError::Validation(vec![FieldError::new(
                        "activityIds",
                        format!("contains an invalid id: {}", id),
                    )]));
                }
            }
        }

        let mut tree = FilterTree::new();
        tree.clause(doc! { "_id": { "$in": oids } });
        if actor.role.is_scoped() {
            tree.any_of(vec![
                doc! { "agent_id": &actor.id },
                doc! { "user_id": &actor.id },
            ]);
        }
        let filter = tree.into_document();

        // Authorization gate runs once, before any mutation
        let eligible = self.activities.count(filter.clone()).await?;
        if (eligible as usize) < distinct.len() {
            return Err(CaselogError::Forbidden(
                "One or more activities are not accessible".into(),
            ));
        }

        let update = bulk_update_doc(&op, actor, DateTime::now());
        self.activities.update_many(filter, update).await?;

        info!(
            action = op.name(),
            count = distinct.len(),
            actor = %actor.id,
            "bulk action applied"
        );

        Ok(BulkResult {
            affected: distinct.len(),
            action: op.name().to_string(),
            value: req.value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::db::schemas::Priority;

    fn manager() -> Actor {
        Actor {
            id: "m1".into(),
            role: Role::Manager,
            first_name: "M".into(),
            last_name: "N".into(),
        }
    }

    fn agent(id: &str) -> Actor {
        Actor {
            id: id.into(),
            role: Role::Agent,
            first_name: "Amit".into(),
            last_name: "Shah".into(),
        }
    }

    #[test]
    fn acting_user_defaults_to_the_actor() {
        let (user_id, user_name) = resolve_acting_user(None, None, &agent("u1"));
        assert_eq!(user_id, "u1");
        assert_eq!(user_name, "Amit Shah");

        // blank strings count as absent
        let (user_id, _) = resolve_acting_user(Some("  ".into()), None, &agent("u1"));
        assert_eq!(user_id, "u1");

        // supplied values survive
        let (user_id, user_name) =
            resolve_acting_user(Some("u2".into()), Some("Priya Desai".into()), &agent("u1"));
        assert_eq!(user_id, "u2");
        assert_eq!(user_name, "Priya Desai");
    }

    #[test]
    fn request_origin_wins_over_caller_metadata() {
        let ctx = RequestContext {
            ip_address: Some("10.0.0.9".into()),
            user_agent: Some("crm-web/2.1".into()),
        };
        let supplied = MetadataInput {
            ip_address: Some("1.2.3.4".into()),
            amount: Some(150_000.0),
            ..Default::default()
        };
        let merged = merge_request_context(Some(supplied), &ctx);
        assert_eq!(merged.ip_address.as_deref(), Some("10.0.0.9"));
        assert_eq!(merged.user_agent.as_deref(), Some("crm-web/2.1"));
        assert_eq!(merged.amount, Some(150_000.0));

        // created when absent
        let merged = merge_request_context(None, &ctx);
        assert_eq!(merged.ip_address.as_deref(), Some("10.0.0.9"));
    }

    #[test]
    fn dedup_preserves_first_seen_order() {
        let ids = vec![
            "b".to_string(),
            "a".to_string(),
            "b".to_string(),
            "c".to_string(),
            "a".to_string(),
        ];
        assert_eq!(dedup_ids(&ids), vec!["b", "a", "c"]);
    }

    #[test]
    fn delete_update_hides_and_reattributes() {
        let update = bulk_update_doc(&BulkOp::Delete, &manager(), DateTime::now());
        let set = update.get_document("$set").unwrap();
        assert_eq!(set.get_str("status").unwrap(), "hidden");
        assert!(!set.get_bool("is_visible").unwrap());
        assert_eq!(set.get_str("updated_by").unwrap(), "m1");
    }

    #[test]
    fn tag_updates_do_not_reattribute() {
        let update = bulk_update_doc(&BulkOp::AddTag("vip".into()), &manager(), DateTime::now());
        assert_eq!(
            update.get_document("$addToSet").unwrap().get_str("tags").unwrap(),
            "vip"
        );
        let set = update.get_document("$set").unwrap();
        assert!(set.get_str("updated_by").is_err());

        let update = bulk_update_doc(&BulkOp::RemoveTag("vip".into()), &manager(), DateTime::now());
        assert_eq!(
            update.get_document("$pull").unwrap().get_str("tags").unwrap(),
            "vip"
        );
    }

    #[test]
    fn priority_update_sets_the_enum_name() {
        let update = bulk_update_doc(
            &BulkOp::ChangePriority(Priority::Critical),
            &manager(),
            DateTime::now(),
        );
        let set = update.get_document("$set").unwrap();
        assert_eq!(set.get_str("priority").unwrap(), "critical");
    }

    #[test]
    fn show_and_hide_flip_visibility() {
        let now = DateTime::now();
        let hide = bulk_update_doc(&BulkOp::Hide, &manager(), now);
        assert!(!hide.get_document("$set").unwrap().get_bool("is_visible").unwrap());
        let show = bulk_update_doc(&BulkOp::Show, &manager(), now);
        assert!(show.get_document("$set").unwrap().get_bool("is_visible").unwrap());
    }
}
