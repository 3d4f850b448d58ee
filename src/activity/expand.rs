//! Read-side display expansion
//!
//! Attaches name/email/phone projections of the referenced agent, user,
//! and client to each returned activity. Expansion is a convenience:
//! reference-store failures degrade to unexpanded views rather than
//! failing the read.

use std::collections::HashMap;
use tracing::warn;

use crate::activity::types::ActivityView;
use crate::activity::ActivityService;
use crate::db::refs::{RefDisplay, RefKind};
use crate::db::schemas::ActivityDoc;

fn distinct_ids<'a, I: Iterator<Item = Option<&'a str>>>(ids: I) -> Vec<String> {
    let mut seen = Vec::new();
    for id in ids.flatten() {
        if !id.is_empty() && !seen.iter().any(|s| s == id) {
            seen.push(id.to_string());
        }
    }
    seen
}

impl ActivityService {
    pub(crate) async fn expand(&self, docs: Vec<ActivityDoc>) -> Vec<ActivityView> {
        let agent_ids = distinct_ids(docs.iter().map(|d| Some(d.agent_id.as_str())));
        let user_ids = distinct_ids(docs.iter().map(|d| Some(d.user_id.as_str())));
        let client_ids = distinct_ids(docs.iter().map(|d| d.client_id.as_deref()));

        let (agents, users, clients) = tokio::join!(
            self.refs.displays(RefKind::Agent, &agent_ids),
            self.refs.displays(RefKind::User, &user_ids),
            self.refs.displays(RefKind::Client, &client_ids),
        );

        let agents = unwrap_displays(agents, RefKind::Agent);
        let users = unwrap_displays(users, RefKind::User);
        let clients = unwrap_displays(clients, RefKind::Client);

        docs.iter()
            .map(|doc| {
                let mut view = ActivityView::from_doc(doc);
                view.agent = agents.get(&doc.agent_id).cloned();
                view.user = users.get(&doc.user_id).cloned();
                view.client = doc
                    .client_id
                    .as_ref()
                    .and_then(|id| clients.get(id))
                    .cloned();
                view
            })
            .collect()
    }

    pub(crate) async fn expand_one(&self, doc: ActivityDoc) -> ActivityView {
        self.expand(vec![doc])
            .await
            .pop()
            .expect("expand preserves input length")
    }
}

fn unwrap_displays(
    result: crate::types::Result<HashMap<String, RefDisplay>>,
    kind: RefKind,
) -> HashMap<String, RefDisplay> {
    result.unwrap_or_else(|e| {
        warn!("Display expansion of {} references failed: {}", kind.collection(), e);
        HashMap::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_ids_dedupes_and_drops_empties() {
        let ids = [Some("a1"), Some("a2"), Some("a1"), None, Some("")];
        assert_eq!(distinct_ids(ids.into_iter()), vec!["a1", "a2"]);
    }
}
