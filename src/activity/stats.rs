//! Aggregation mode: totals, per-type breakdown, recent counter, and the
//! optional top-10 grouping

use bson::{doc, Bson, Document};
use chrono::Utc;
use tracing::debug;

use crate::activity::filter::{
    build_stats_filter, build_stats_recent_filter, GroupByField, StatsQuery,
};
use crate::activity::types::{ActivityStats, GroupRow, GroupedStats, TypeBreakdown};
use crate::activity::ActivityService;
use crate::auth::Actor;
use crate::types::Result;

/// Per-type breakdown with a high/critical priority counter
pub(crate) fn by_type_pipeline(match_doc: Document) -> Vec<Document> {
    vec![
        doc! { "$match": match_doc },
        doc! { "$group": {
            "_id": "$activity_type",
            "count": { "$sum": 1 },
            "high_priority": {
                "$sum": { "$cond": [ { "$in": [ "$priority", ["high", "critical"] ] }, 1, 0 ] }
            },
        }},
        doc! { "$sort": { "count": -1 } },
    ]
}

/// Top-10 grouping by the requested field, with the distinct type set per
/// group
pub(crate) fn group_pipeline(match_doc: Document, field: GroupByField) -> Vec<Document> {
    vec![
        doc! { "$match": match_doc },
        doc! { "$group": {
            "_id": field.group_expr(),
            "count": { "$sum": 1 },
            "types": { "$addToSet": "$activity_type" },
        }},
        doc! { "$sort": { "count": -1 } },
        doc! { "$limit": 10 },
    ]
}

fn read_count(row: &Document, key: &str) -> i64 {
    match row.get(key) {
        Some(Bson::Int32(v)) => i64::from(*v),
        Some(Bson::Int64(v)) => *v,
        Some(Bson::Double(v)) => *v as i64,
        _ => 0,
    }
}

fn read_group_key(row: &Document) -> String {
    match row.get("_id") {
        Some(Bson::String(s)) => s.clone(),
        Some(Bson::Null) | None => "unknown".to_string(),
        Some(other) => other.to_string(),
    }
}

fn read_types(row: &Document) -> Vec<String> {
    row.get_array("types")
        .map(|types| {
            types
                .iter()
                .filter_map(|t| t.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn type_breakdown(row: &Document) -> TypeBreakdown {
    TypeBreakdown {
        activity_type: read_group_key(row),
        count: read_count(row, "count"),
        high_priority: read_count(row, "high_priority"),
    }
}

fn group_row(row: &Document) -> GroupRow {
    GroupRow {
        key: read_group_key(row),
        count: read_count(row, "count"),
        types: read_types(row),
    }
}

impl ActivityService {
    /// Compute activity statistics for the requested period
    pub async fn stats(&self, query: &StatsQuery, actor: &Actor) -> Result<ActivityStats> {
        let now = Utc::now();
        let match_doc = build_stats_filter(query, actor, now);
        let recent_doc = build_stats_recent_filter(query, actor, now);
        debug!(filter = %match_doc, period = query.period.as_str(), "computing activity stats");

        let (total, recent, type_rows) = tokio::try_join!(
            self.activities.count(match_doc.clone()),
            self.activities.count(recent_doc),
            self.activities.aggregate(by_type_pipeline(match_doc.clone())),
        )?;

        let by_type = type_rows.iter().map(type_breakdown).collect();

        let grouped_by = match query.group_by {
            Some(field) => {
                let rows = self
                    .activities
                    .aggregate(group_pipeline(match_doc, field))
                    .await?;
                Some(GroupedStats {
                    field: field.as_str().to_string(),
                    data: rows.iter().map(group_row).collect(),
                })
            }
            None => None,
        };

        Ok(ActivityStats {
            total,
            recent,
            by_type,
            period: query.period.as_str().to_string(),
            grouped_by,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn by_type_pipeline_counts_high_and_critical() {
        let pipeline = by_type_pipeline(doc! { "is_visible": true });
        assert_eq!(pipeline.len(), 3);

        let group = pipeline[1].get_document("$group").unwrap();
        assert_eq!(group.get_str("_id").unwrap(), "$activity_type");

        let cond = group
            .get_document("high_priority")
            .unwrap()
            .get_document("$sum")
            .unwrap()
            .get_array("$cond")
            .unwrap();
        let in_expr = cond[0].as_document().unwrap().get_array("$in").unwrap();
        let priorities: Vec<&str> = in_expr[1]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|b| b.as_str())
            .collect();
        assert_eq!(priorities, vec!["high", "critical"]);
    }

    #[test]
    fn group_pipeline_caps_at_ten() {
        let pipeline = group_pipeline(doc! {}, GroupByField::Agent);
        assert_eq!(
            pipeline.last().unwrap().get_i32("$limit").unwrap(),
            10
        );
        let sort = pipeline[2].get_document("$sort").unwrap();
        assert_eq!(sort.get_i32("count").unwrap(), -1);
    }

    #[test]
    fn rows_parse_driver_integer_widths() {
        let row = doc! { "_id": "claim", "count": 7_i32, "high_priority": 2_i64 };
        let breakdown = type_breakdown(&row);
        assert_eq!(breakdown.activity_type, "claim");
        assert_eq!(breakdown.count, 7);
        assert_eq!(breakdown.high_priority, 2);
    }

    #[test]
    fn null_group_keys_become_unknown() {
        let row = doc! { "_id": Bson::Null, "count": 3_i32, "types": ["claim", "policy"] };
        let parsed = group_row(&row);
        assert_eq!(parsed.key, "unknown");
        assert_eq!(parsed.types, vec!["claim", "policy"]);
    }
}
