//! Read-side reference data for display expansion
//!
//! Agent/client/user records are owned by other CRM services; caselog only
//! projects a few display fields (name, email, phone) onto returned
//! activities. Nothing here validates that a reference exists.

use async_trait::async_trait;
use bson::{doc, oid::ObjectId, Bson, Document};
use futures_util::StreamExt;
use serde::Serialize;
use std::collections::HashMap;
use tracing::warn;

use crate::db::MongoClient;
use crate::types::Result;

/// Which reference collection an id points into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefKind {
    Agent,
    Client,
    User,
}

impl RefKind {
    pub fn collection(&self) -> &'static str {
        match self {
            Self::Agent => "agents",
            Self::Client => "clients",
            Self::User => "users",
        }
    }
}

/// Display projection of a referenced record
#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RefDisplay {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Seam for display expansion - swappable for tests and future caching
#[async_trait]
pub trait ReferenceStore: Send + Sync {
    /// Fetch display projections for a batch of ids of one kind.
    /// Unknown ids are simply absent from the returned map.
    async fn displays(&self, kind: RefKind, ids: &[String]) -> Result<HashMap<String, RefDisplay>>;
}

/// MongoDB-backed reference store
pub struct MongoReferenceStore {
    mongo: MongoClient,
}

impl MongoReferenceStore {
    pub fn new(mongo: MongoClient) -> Self {
        Self { mongo }
    }
}

/// Build an `_id` value that works whether references are stored as
/// ObjectIds or as plain strings.
fn id_to_bson(id: &str) -> Bson {
    if let Ok(oid) = ObjectId::parse_str(id) {
        Bson::ObjectId(oid)
    } else {
        Bson::String(id.to_string())
    }
}

/// Pull a display projection out of an untyped reference document
fn display_from_doc(doc: &Document) -> RefDisplay {
    let name = doc
        .get_str("name")
        .map(|s| s.to_string())
        .ok()
        .or_else(|| {
            let first = doc.get_str("first_name").unwrap_or("");
            let last = doc.get_str("last_name").unwrap_or("");
            let joined = format!("{} {}", first, last).trim().to_string();
            if joined.is_empty() {
                None
            } else {
                Some(joined)
            }
        });

    RefDisplay {
        name,
        email: doc.get_str("email").map(|s| s.to_string()).ok(),
        phone: doc.get_str("phone").map(|s| s.to_string()).ok(),
    }
}

/// Stringify a reference `_id` back to the form activities store it in
fn id_from_doc(doc: &Document) -> Option<String> {
    match doc.get("_id") {
        Some(Bson::ObjectId(oid)) => Some(oid.to_hex()),
        Some(Bson::String(s)) => Some(s.clone()),
        _ => None,
    }
}

#[async_trait]
impl ReferenceStore for MongoReferenceStore {
    async fn displays(&self, kind: RefKind, ids: &[String]) -> Result<HashMap<String, RefDisplay>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let bson_ids: Vec<Bson> = ids.iter().map(|id| id_to_bson(id)).collect();
        let collection = self
            .mongo
            .inner()
            .database(self.mongo.db_name())
            .collection::<Document>(kind.collection());

        let mut cursor = collection
            .find(doc! { "_id": { "$in": bson_ids } })
            .projection(doc! { "name": 1, "first_name": 1, "last_name": 1, "email": 1, "phone": 1 })
            .await
            .map_err(|e| {
                crate::types::CaselogError::Database(format!("Reference lookup failed: {}", e))
            })?;

        let mut displays = HashMap::new();
        while let Some(result) = cursor.next().await {
            match result {
                Ok(doc) => {
                    if let Some(id) = id_from_doc(&doc) {
                        displays.insert(id, display_from_doc(&doc));
                    }
                }
                Err(e) => warn!("Error reading {} reference: {}", kind.collection(), e),
            }
        }

        Ok(displays)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefers_name_field() {
        let doc = doc! { "name": "Meera Iyer", "email": "meera@agency.in" };
        let display = display_from_doc(&doc);
        assert_eq!(display.name.as_deref(), Some("Meera Iyer"));
        assert_eq!(display.email.as_deref(), Some("meera@agency.in"));
        assert!(display.phone.is_none());
    }

    #[test]
    fn display_falls_back_to_split_name() {
        let doc = doc! { "first_name": "Amit", "last_name": "Shah", "phone": "+91-98" };
        let display = display_from_doc(&doc);
        assert_eq!(display.name.as_deref(), Some("Amit Shah"));
        assert_eq!(display.phone.as_deref(), Some("+91-98"));
    }

    #[test]
    fn ids_survive_both_storage_forms() {
        let oid = ObjectId::new();
        assert!(matches!(id_to_bson(&oid.to_hex()), Bson::ObjectId(_)));
        assert!(matches!(id_to_bson("agent-42"), Bson::String(_)));

        let doc = doc! { "_id": "agent-42" };
        assert_eq!(id_from_doc(&doc).as_deref(), Some("agent-42"));
    }
}
