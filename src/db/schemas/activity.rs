//! Activity document schema
//!
//! One record per audit/feed event: something happened to (or was done by)
//! a client, policy, claim, quotation, lead, agent, or user. Records are
//! never physically deleted; soft delete flips `status`/`is_visible`.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::db::mongo::{IntoIndexes, Stamped};

/// Collection name for activities
pub const ACTIVITY_COLLECTION: &str = "activities";

/// Category of the event an activity records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityType {
    Client,
    Policy,
    Claim,
    Quotation,
    Lead,
    Payment,
    Document,
    Commission,
    Reminder,
    System,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Policy => "policy",
            Self::Claim => "claim",
            Self::Quotation => "quotation",
            Self::Lead => "lead",
            Self::Payment => "payment",
            Self::Document => "document",
            Self::Commission => "commission",
            Self::Reminder => "reminder",
            Self::System => "system",
        }
    }
}

impl FromStr for ActivityType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, ()> {
        match s {
            "client" => Ok(Self::Client),
            "policy" => Ok(Self::Policy),
            "claim" => Ok(Self::Claim),
            "quotation" => Ok(Self::Quotation),
            "lead" => Ok(Self::Lead),
            "payment" => Ok(Self::Payment),
            "document" => Ok(Self::Document),
            "commission" => Ok(Self::Commission),
            "reminder" => Ok(Self::Reminder),
            "system" => Ok(Self::System),
            _ => Err(()),
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of business object an activity points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Client,
    Policy,
    Claim,
    Quotation,
    Lead,
    Agent,
    User,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Policy => "policy",
            Self::Claim => "claim",
            Self::Quotation => "quotation",
            Self::Lead => "lead",
            Self::Agent => "agent",
            Self::User => "user",
        }
    }
}

impl FromStr for EntityType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, ()> {
        match s {
            "client" => Ok(Self::Client),
            "policy" => Ok(Self::Policy),
            "claim" => Ok(Self::Claim),
            "quotation" => Ok(Self::Quotation),
            "lead" => Ok(Self::Lead),
            "agent" => Ok(Self::Agent),
            "user" => Ok(Self::User),
            _ => Err(()),
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Activity priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl FromStr for Priority {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, ()> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status; `Hidden` is the soft-deleted state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ActivityStatus {
    #[default]
    Active,
    Archived,
    Hidden,
}

impl ActivityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Archived => "archived",
            Self::Hidden => "hidden",
        }
    }
}

impl FromStr for ActivityStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, ()> {
        match s {
            "active" => Ok(Self::Active),
            "archived" => Ok(Self::Archived),
            "hidden" => Ok(Self::Hidden),
            _ => Err(()),
        }
    }
}

impl fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Known optional metadata fields attached to an activity.
///
/// `ip_address` and `user_agent` are filled in by the service from the
/// inbound request; the rest are caller-supplied.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ActivityMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub claim_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub quotation_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub lead_id: Option<String>,

    /// Monetary amount involved, if any (non-negative)
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

/// Activity document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ActivityDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Event category
    pub activity_type: ActivityType,

    /// Polymorphic reference to the business object described.
    /// No referential integrity is enforced; the entity is owned elsewhere.
    pub entity_type: EntityType,
    pub entity_id: String,
    pub entity_name: String,

    /// Short human-readable label (2-200 chars)
    pub action: String,

    /// What happened (2-1000 chars)
    pub description: String,

    /// Optional free text (up to 2000 chars)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,

    /// Acting agent
    pub agent_id: String,
    pub agent_name: String,

    /// Acting user (defaults to the actor at create time)
    pub user_id: String,
    pub user_name: String,

    /// Associated client, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    #[serde(default)]
    pub metadata: ActivityMetadata,

    #[serde(default)]
    pub priority: Priority,

    #[serde(default)]
    pub status: ActivityStatus,

    /// Hidden activities never appear in list/search/stats
    #[serde(default = "default_true")]
    pub is_visible: bool,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub is_system_generated: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime>,

    pub created_by: String,
    pub updated_by: String,
}

fn default_true() -> bool {
    true
}

impl IntoIndexes for ActivityDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Agent feed reads
            (
                doc! { "agent_id": 1, "created_at": -1 },
                Some(
                    IndexOptions::builder()
                        .name("agent_created_index".to_string())
                        .build(),
                ),
            ),
            // Self-attributed activity reads
            (
                doc! { "user_id": 1, "created_at": -1 },
                Some(
                    IndexOptions::builder()
                        .name("user_created_index".to_string())
                        .build(),
                ),
            ),
            // Type-filtered feeds
            (
                doc! { "activity_type": 1, "created_at": -1 },
                Some(
                    IndexOptions::builder()
                        .name("type_created_index".to_string())
                        .build(),
                ),
            ),
            // Visibility scans (every list/search/stat query filters these)
            (
                doc! { "status": 1, "is_visible": 1 },
                Some(
                    IndexOptions::builder()
                        .name("status_visible_index".to_string())
                        .build(),
                ),
            ),
            // Tag membership
            (
                doc! { "tags": 1 },
                Some(
                    IndexOptions::builder()
                        .name("tags_index".to_string())
                        .build(),
                ),
            ),
            // Relevance-ranked text search
            (
                doc! { "action": "text", "description": "text", "entity_name": "text" },
                Some(
                    IndexOptions::builder()
                        .name("activity_text_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl Stamped for ActivityDoc {
    fn stamp_created(&mut self, at: DateTime) {
        self.created_at = Some(at);
    }

    fn stamp_updated(&mut self, at: DateTime) {
        self.updated_at = Some(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enums_round_trip_their_wire_names() {
        for s in [
            "client", "policy", "claim", "quotation", "lead", "payment", "document",
            "commission", "reminder", "system",
        ] {
            assert_eq!(s.parse::<ActivityType>().unwrap().as_str(), s);
        }
        for s in ["low", "medium", "high", "critical"] {
            assert_eq!(s.parse::<Priority>().unwrap().as_str(), s);
        }
        for s in ["active", "archived", "hidden"] {
            assert_eq!(s.parse::<ActivityStatus>().unwrap().as_str(), s);
        }
        assert!("all".parse::<ActivityType>().is_err());
    }

    #[test]
    fn serde_uses_lowercase_names() {
        assert_eq!(
            serde_json::to_string(&ActivityType::Quotation).unwrap(),
            "\"quotation\""
        );
        assert_eq!(
            serde_json::to_string(&ActivityStatus::Hidden).unwrap(),
            "\"hidden\""
        );
    }

    #[test]
    fn text_index_spans_searchable_fields() {
        let indices = ActivityDoc::into_indices();
        let text = indices
            .iter()
            .find(|(keys, _)| keys.get_str("action").is_ok())
            .expect("text index present");
        assert_eq!(text.0.get_str("description").unwrap(), "text");
        assert_eq!(text.0.get_str("entity_name").unwrap(), "text");
    }
}
