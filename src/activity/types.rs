//! Request and response shapes for the activity API
//!
//! Requests keep enum-valued fields as raw strings so validation can
//! produce per-field messages instead of opaque deserialization errors;
//! `validate` turns them into typed values. Responses are camelCase views
//! over the snake_case stored documents.

use serde::{Deserialize, Serialize};

use crate::db::refs::RefDisplay;
use crate::db::schemas::{ActivityDoc, ActivityMetadata};

/// Body of POST /activities
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CreateActivityRequest {
    #[serde(default)]
    pub action: String,
    #[serde(rename = "type", default)]
    pub activity_type: String,
    #[serde(default)]
    pub description: String,
    pub details: Option<String>,
    #[serde(default)]
    pub entity_type: String,
    #[serde(default)]
    pub entity_id: String,
    #[serde(default)]
    pub entity_name: String,
    #[serde(default)]
    pub agent_id: String,
    #[serde(default)]
    pub agent_name: String,
    pub user_id: Option<String>,
    pub user_name: Option<String>,
    pub client_id: Option<String>,
    pub metadata: Option<MetadataInput>,
    pub priority: Option<String>,
    pub tags: Option<Vec<String>>,
    pub is_system_generated: Option<bool>,
}

/// Body of PUT /activities/{id}
///
/// Only mutable fields exist here; immutable wire fields (activityId,
/// entityType, entityId, createdBy, createdAt) are dropped during
/// deserialization, which is what enforces update immutability.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateActivityRequest {
    pub action: Option<String>,
    #[serde(rename = "type")]
    pub activity_type: Option<String>,
    pub description: Option<String>,
    pub details: Option<String>,
    pub entity_name: Option<String>,
    pub agent_id: Option<String>,
    pub agent_name: Option<String>,
    pub user_id: Option<String>,
    pub user_name: Option<String>,
    pub client_id: Option<String>,
    pub metadata: Option<MetadataInput>,
    pub priority: Option<String>,
    pub status: Option<String>,
    pub is_visible: Option<bool>,
    pub tags: Option<Vec<String>>,
    pub is_system_generated: Option<bool>,
}

impl UpdateActivityRequest {
    pub fn is_empty(&self) -> bool {
        self.action.is_none()
            && self.activity_type.is_none()
            && self.description.is_none()
            && self.details.is_none()
            && self.entity_name.is_none()
            && self.agent_id.is_none()
            && self.agent_name.is_none()
            && self.user_id.is_none()
            && self.user_name.is_none()
            && self.client_id.is_none()
            && self.metadata.is_none()
            && self.priority.is_none()
            && self.status.is_none()
            && self.is_visible.is_none()
            && self.tags.is_none()
            && self.is_system_generated.is_none()
    }
}

/// Caller-supplied metadata (camelCase wire form)
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MetadataInput {
    pub policy_id: Option<String>,
    pub claim_id: Option<String>,
    pub quotation_id: Option<String>,
    pub lead_id: Option<String>,
    pub amount: Option<f64>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl MetadataInput {
    pub fn into_stored(self) -> ActivityMetadata {
        ActivityMetadata {
            policy_id: self.policy_id,
            claim_id: self.claim_id,
            quotation_id: self.quotation_id,
            lead_id: self.lead_id,
            amount: self.amount,
            old_value: self.old_value,
            new_value: self.new_value,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
        }
    }
}

/// Body of POST /activities/bulk
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct BulkActionRequest {
    #[serde(default)]
    pub activity_ids: Vec<String>,
    #[serde(default)]
    pub action: String,
    pub value: Option<String>,
}

/// IP and user agent captured from the inbound request on create
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Metadata as returned to the caller
#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MetadataView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claim_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quotation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lead_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl From<&ActivityMetadata> for MetadataView {
    fn from(m: &ActivityMetadata) -> Self {
        Self {
            policy_id: m.policy_id.clone(),
            claim_id: m.claim_id.clone(),
            quotation_id: m.quotation_id.clone(),
            lead_id: m.lead_id.clone(),
            amount: m.amount,
            old_value: m.old_value.clone(),
            new_value: m.new_value.clone(),
            ip_address: m.ip_address.clone(),
            user_agent: m.user_agent.clone(),
        }
    }
}

/// One activity as returned by list/get/create/update/search
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityView {
    pub id: String,
    #[serde(rename = "type")]
    pub activity_type: &'static str,
    pub entity_type: &'static str,
    pub entity_id: String,
    pub entity_name: String,
    pub action: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub agent_id: String,
    pub agent_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<RefDisplay>,
    pub user_id: String,
    pub user_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<RefDisplay>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client: Option<RefDisplay>,
    pub metadata: MetadataView,
    pub priority: &'static str,
    pub status: &'static str,
    pub is_visible: bool,
    pub tags: Vec<String>,
    pub is_system_generated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    pub created_by: String,
    pub updated_by: String,
}

impl ActivityView {
    /// Build a view without reference expansion; `expand` fills those in
    pub fn from_doc(doc: &ActivityDoc) -> Self {
        Self {
            id: doc._id.map(|o| o.to_hex()).unwrap_or_default(),
            activity_type: doc.activity_type.as_str(),
            entity_type: doc.entity_type.as_str(),
            entity_id: doc.entity_id.clone(),
            entity_name: doc.entity_name.clone(),
            action: doc.action.clone(),
            description: doc.description.clone(),
            details: doc.details.clone(),
            agent_id: doc.agent_id.clone(),
            agent_name: doc.agent_name.clone(),
            agent: None,
            user_id: doc.user_id.clone(),
            user_name: doc.user_name.clone(),
            user: None,
            client_id: doc.client_id.clone(),
            client: None,
            metadata: MetadataView::from(&doc.metadata),
            priority: doc.priority.as_str(),
            status: doc.status.as_str(),
            is_visible: doc.is_visible,
            tags: doc.tags.clone(),
            is_system_generated: doc.is_system_generated,
            created_at: doc.created_at.map(|d| d.to_chrono().to_rfc3339()),
            updated_at: doc.updated_at.map(|d| d.to_chrono().to_rfc3339()),
            created_by: doc.created_by.clone(),
            updated_by: doc.updated_by.clone(),
        }
    }
}

/// Pagination envelope for list responses
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u32,
    pub total_count: u64,
    pub has_next_page: bool,
    pub has_prev_page: bool,
    pub limit: u32,
}

impl Pagination {
    pub fn build(page: u32, limit: u32, total_count: u64) -> Self {
        let total_pages = if limit == 0 {
            0
        } else {
            total_count.div_ceil(limit as u64) as u32
        };
        Self {
            current_page: page,
            total_pages,
            total_count,
            has_next_page: page < total_pages,
            has_prev_page: page > 1,
            limit,
        }
    }
}

/// Response of GET /activities
#[derive(Debug, Clone, Serialize)]
pub struct ActivityPage {
    pub activities: Vec<ActivityView>,
    pub pagination: Pagination,
}

/// Per-type stats row
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TypeBreakdown {
    #[serde(rename = "type")]
    pub activity_type: String,
    pub count: i64,
    pub high_priority: i64,
}

/// One row of an optional groupBy aggregation
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GroupRow {
    pub key: String,
    pub count: i64,
    pub types: Vec<String>,
}

/// Optional groupBy section of the stats response
#[derive(Debug, Clone, Serialize)]
pub struct GroupedStats {
    pub field: String,
    pub data: Vec<GroupRow>,
}

/// Response of GET /activities/stats
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityStats {
    pub total: u64,
    pub recent: u64,
    pub by_type: Vec<TypeBreakdown>,
    pub period: String,
    /// Serialized as null when no groupBy was requested
    pub grouped_by: Option<GroupedStats>,
}

/// Response of POST /activities/bulk
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkResult {
    pub affected: usize,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_arithmetic() {
        // 45 records, 20 per page, page 2
        let p = Pagination::build(2, 20, 45);
        assert_eq!(p.total_pages, 3);
        assert!(p.has_next_page);
        assert!(p.has_prev_page);

        // exact multiple
        let p = Pagination::build(2, 20, 40);
        assert_eq!(p.total_pages, 2);
        assert!(!p.has_next_page);

        // empty result set
        let p = Pagination::build(1, 20, 0);
        assert_eq!(p.total_pages, 0);
        assert!(!p.has_next_page);
        assert!(!p.has_prev_page);

        // page beyond the end
        let p = Pagination::build(5, 20, 45);
        assert!(!p.has_next_page);
        assert!(p.has_prev_page);
    }

    #[test]
    fn grouped_by_serializes_as_null_when_absent() {
        let stats = ActivityStats {
            total: 0,
            recent: 0,
            by_type: vec![],
            period: "last30days".into(),
            grouped_by: None,
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert!(json.get("groupedBy").unwrap().is_null());
    }

    #[test]
    fn update_request_drops_immutable_fields() {
        // Wire fields for immutable attributes simply do not deserialize
        let patch: UpdateActivityRequest = serde_json::from_str(
            r#"{"action":"Renewed","entityId":"E9","createdBy":"mallory","createdAt":"2020-01-01"}"#,
        )
        .unwrap();
        assert_eq!(patch.action.as_deref(), Some("Renewed"));
        // the rest of the payload has no landing place
        assert!(patch.entity_name.is_none());
    }
}
