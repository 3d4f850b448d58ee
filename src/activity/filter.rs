//! Query-parameter parsing and MongoDB filter construction
//!
//! Filters are built as an explicit conjunction of clauses so the agent
//! visibility rule - an OR across `agent_id`/`user_id` nested inside the
//! outer AND - keeps its structure instead of being flattened into a
//! key-value map. The wire sentinel `"all"` is translated to "absent"
//! here; nothing downstream ever sees it.

use bson::{doc, Bson, Document};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use std::collections::HashMap;
use std::str::FromStr;

use crate::auth::Actor;
use crate::db::schemas::{ActivityStatus, ActivityType, EntityType, Priority};
use crate::types::{CaselogError, FieldError, Result};

/// Decoded query-string parameters
pub type Params = HashMap<String, String>;

/// Sort keys accepted by the list endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    CreatedAt,
    UpdatedAt,
    Action,
    Type,
    Priority,
    EntityName,
}

impl SortKey {
    /// Stored field name this key sorts on
    pub fn field(&self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
            Self::Action => "action",
            Self::Type => "activity_type",
            Self::Priority => "priority",
            Self::EntityName => "entity_name",
        }
    }
}

impl FromStr for SortKey {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, ()> {
        match s {
            "createdAt" => Ok(Self::CreatedAt),
            "updatedAt" => Ok(Self::UpdatedAt),
            "action" => Ok(Self::Action),
            "type" => Ok(Self::Type),
            "priority" => Ok(Self::Priority),
            "entityName" => Ok(Self::EntityName),
            _ => Err(()),
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn direction(&self) -> i32 {
        match self {
            Self::Asc => 1,
            Self::Desc => -1,
        }
    }
}

/// Named date windows on `created_at`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFilter {
    Today,
    Yesterday,
    Last7Days,
    Last30Days,
    Last90Days,
}

impl FromStr for DateFilter {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, ()> {
        match s {
            "today" => Ok(Self::Today),
            "yesterday" => Ok(Self::Yesterday),
            "last7days" => Ok(Self::Last7Days),
            "last30days" => Ok(Self::Last30Days),
            "last90days" => Ok(Self::Last90Days),
            _ => Err(()),
        }
    }
}

/// Stats period: the named windows plus an explicit custom range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Period {
    Today,
    Yesterday,
    Last7Days,
    #[default]
    Last30Days,
    Last90Days,
    Custom,
}

impl Period {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Today => "today",
            Self::Yesterday => "yesterday",
            Self::Last7Days => "last7days",
            Self::Last30Days => "last30days",
            Self::Last90Days => "last90days",
            Self::Custom => "custom",
        }
    }

    pub fn date_filter(&self) -> Option<DateFilter> {
        match self {
            Self::Today => Some(DateFilter::Today),
            Self::Yesterday => Some(DateFilter::Yesterday),
            Self::Last7Days => Some(DateFilter::Last7Days),
            Self::Last30Days => Some(DateFilter::Last30Days),
            Self::Last90Days => Some(DateFilter::Last90Days),
            Self::Custom => None,
        }
    }
}

impl FromStr for Period {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, ()> {
        match s {
            "today" => Ok(Self::Today),
            "yesterday" => Ok(Self::Yesterday),
            "last7days" => Ok(Self::Last7Days),
            "last30days" => Ok(Self::Last30Days),
            "last90days" => Ok(Self::Last90Days),
            "custom" => Ok(Self::Custom),
            _ => Err(()),
        }
    }
}

/// Fields the stats endpoint can group on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupByField {
    Type,
    Agent,
    Client,
    Day,
    Week,
    Month,
}

impl GroupByField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Type => "type",
            Self::Agent => "agent",
            Self::Client => "client",
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
        }
    }

    /// Aggregation expression used as the `$group` key
    pub fn group_expr(&self) -> Bson {
        match self {
            Self::Type => Bson::String("$activity_type".into()),
            Self::Agent => Bson::String("$agent_id".into()),
            Self::Client => Bson::String("$client_id".into()),
            Self::Day => Bson::Document(
                doc! { "$dateToString": { "format": "%Y-%m-%d", "date": "$created_at" } },
            ),
            Self::Week => Bson::Document(
                doc! { "$dateToString": { "format": "%G-W%V", "date": "$created_at" } },
            ),
            Self::Month => Bson::Document(
                doc! { "$dateToString": { "format": "%Y-%m", "date": "$created_at" } },
            ),
        }
    }
}

impl FromStr for GroupByField {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, ()> {
        match s {
            "type" => Ok(Self::Type),
            "agent" => Ok(Self::Agent),
            "client" => Ok(Self::Client),
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            _ => Err(()),
        }
    }
}

/// Validated parameters for the list endpoint
#[derive(Debug, Clone)]
pub struct ListQuery {
    pub page: u32,
    pub limit: u32,
    pub activity_type: Option<ActivityType>,
    pub entity_type: Option<EntityType>,
    pub agent_id: Option<String>,
    pub client_id: Option<String>,
    pub user_id: Option<String>,
    pub entity_id: Option<String>,
    pub priority: Option<Priority>,
    pub status: Option<ActivityStatus>,
    pub search: Option<String>,
    pub sort_by: SortKey,
    pub sort_order: SortOrder,
    pub date_filter: Option<DateFilter>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub is_recent: bool,
    pub tags: Vec<String>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 20,
            activity_type: None,
            entity_type: None,
            agent_id: None,
            client_id: None,
            user_id: None,
            entity_id: None,
            priority: None,
            status: Some(ActivityStatus::Active),
            search: None,
            sort_by: SortKey::default(),
            sort_order: SortOrder::default(),
            date_filter: None,
            start_date: None,
            end_date: None,
            is_recent: false,
            tags: Vec::new(),
        }
    }
}

/// Validated parameters for the stats endpoint
#[derive(Debug, Clone, Default)]
pub struct StatsQuery {
    pub agent_id: Option<String>,
    pub period: Period,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub group_by: Option<GroupByField>,
}

/// Validated parameters for the search endpoint
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub query: String,
    pub limit: u32,
    pub activity_type: Option<ActivityType>,
    pub agent_id: Option<String>,
}

/// Maximum page size for list, and result cap for search
pub const MAX_PAGE_SIZE: u32 = 100;
pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const DEFAULT_SEARCH_LIMIT: u32 = 10;
pub const MAX_SEARCH_LIMIT: u32 = 50;

/// `"all"` on an enum-like filter means "no filter"
fn non_sentinel(value: Option<&String>) -> Option<&String> {
    value.filter(|v| v.as_str() != "all" && !v.is_empty())
}

fn parse_enum<T: FromStr>(
    params: &Params,
    key: &str,
    label: &str,
    errors: &mut Vec<FieldError>,
) -> Option<T> {
    let raw = non_sentinel(params.get(key))?;
    match raw.parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            errors.push(FieldError::new(key, format!("invalid {}: {}", label, raw)));
            None
        }
    }
}

fn parse_bounded_int(
    params: &Params,
    key: &str,
    default: u32,
    min: u32,
    max: u32,
    errors: &mut Vec<FieldError>,
) -> u32 {
    match params.get(key) {
        None => default,
        Some(raw) => match raw.parse::<u32>() {
            Ok(v) if v >= min && v <= max => v,
            _ => {
                errors.push(FieldError::new(
                    key,
                    format!("must be an integer between {} and {}", min, max),
                ));
                default
            }
        },
    }
}

fn parse_bool(params: &Params, key: &str, errors: &mut Vec<FieldError>) -> bool {
    match params.get(key).map(|s| s.as_str()) {
        None => false,
        Some("true") | Some("1") => true,
        Some("false") | Some("0") => false,
        Some(_) => {
            errors.push(FieldError::new(key, "must be a boolean"));
            false
        }
    }
}

/// Accepts RFC3339 timestamps or plain dates (taken as midnight UTC)
fn parse_date(
    params: &Params,
    key: &str,
    errors: &mut Vec<FieldError>,
) -> Option<DateTime<Utc>> {
    let raw = params.get(key)?;
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(date) = raw.parse::<NaiveDate>() {
        return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap()));
    }
    errors.push(FieldError::new(
        key,
        "must be an RFC 3339 timestamp or YYYY-MM-DD date",
    ));
    None
}

fn opt_string(params: &Params, key: &str) -> Option<String> {
    non_sentinel(params.get(key)).map(|s| s.to_string())
}

impl ListQuery {
    pub fn from_params(params: &Params) -> Result<Self> {
        let mut errors = Vec::new();

        let page = parse_bounded_int(params, "page", 1, 1, u32::MAX, &mut errors);
        let limit = parse_bounded_int(
            params,
            "limit",
            DEFAULT_PAGE_SIZE,
            1,
            MAX_PAGE_SIZE,
            &mut errors,
        );

        let activity_type = parse_enum::<ActivityType>(params, "type", "activity type", &mut errors);
        let entity_type = parse_enum::<EntityType>(params, "entityType", "entity type", &mut errors);
        let priority = parse_enum::<Priority>(params, "priority", "priority", &mut errors);

        // status defaults to active; "all" disables the filter entirely
        let status = match params.get("status").map(|s| s.as_str()) {
            None => Some(ActivityStatus::Active),
            Some("all") => None,
            Some(raw) => match raw.parse::<ActivityStatus>() {
                Ok(v) => Some(v),
                Err(_) => {
                    errors.push(FieldError::new("status", format!("invalid status: {}", raw)));
                    None
                }
            },
        };

        let sort_by = match params.get("sortBy") {
            None => SortKey::default(),
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                errors.push(FieldError::new("sortBy", format!("invalid sort key: {}", raw)));
                SortKey::default()
            }),
        };

        let sort_order = match params.get("sortOrder").map(|s| s.as_str()) {
            None => SortOrder::default(),
            Some("asc") => SortOrder::Asc,
            Some("desc") => SortOrder::Desc,
            Some(raw) => {
                errors.push(FieldError::new(
                    "sortOrder",
                    format!("invalid sort order: {}", raw),
                ));
                SortOrder::default()
            }
        };

        let date_filter = parse_enum::<DateFilter>(params, "dateFilter", "date filter", &mut errors);
        let start_date = parse_date(params, "startDate", &mut errors);
        let end_date = parse_date(params, "endDate", &mut errors);
        let is_recent = parse_bool(params, "isRecent", &mut errors);

        let tags = params
            .get("tags")
            .map(|raw| {
                raw.split(',')
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let search = params
            .get("search")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        if !errors.is_empty() {
            return Err(CaselogError::Validation(errors));
        }

        Ok(Self {
            page,
            limit,
            activity_type,
            entity_type,
            agent_id: opt_string(params, "agentId"),
            client_id: opt_string(params, "clientId"),
            user_id: opt_string(params, "userId"),
            entity_id: opt_string(params, "entityId"),
            priority,
            status,
            search,
            sort_by,
            sort_order,
            date_filter,
            start_date,
            end_date,
            is_recent,
            tags,
        })
    }

    pub fn skip(&self) -> u64 {
        (self.page as u64 - 1) * self.limit as u64
    }

    pub fn sort_doc(&self) -> Document {
        doc! { self.sort_by.field(): self.sort_order.direction() }
    }
}

impl StatsQuery {
    pub fn from_params(params: &Params) -> Result<Self> {
        let mut errors = Vec::new();

        let period = match params.get("period") {
            None => Period::default(),
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                errors.push(FieldError::new("period", format!("invalid period: {}", raw)));
                Period::default()
            }),
        };

        let start_date = parse_date(params, "startDate", &mut errors);
        let end_date = parse_date(params, "endDate", &mut errors);

        if period == Period::Custom && (start_date.is_none() || end_date.is_none()) {
            errors.push(FieldError::new(
                "period",
                "startDate and endDate are required for a custom period",
            ));
        }

        let group_by = match params.get("groupBy") {
            None => None,
            Some(raw) => match raw.parse::<GroupByField>() {
                Ok(g) => Some(g),
                Err(_) => {
                    errors.push(FieldError::new(
                        "groupBy",
                        format!("invalid groupBy field: {}", raw),
                    ));
                    None
                }
            },
        };

        if !errors.is_empty() {
            return Err(CaselogError::Validation(errors));
        }

        Ok(Self {
            agent_id: opt_string(params, "agentId"),
            period,
            start_date,
            end_date,
            group_by,
        })
    }
}

impl SearchQuery {
    pub fn from_params(query: &str, params: &Params) -> Result<Self> {
        let mut errors = Vec::new();

        let query = query.trim().to_string();
        if query.chars().count() < 2 {
            errors.push(FieldError::new(
                "query",
                "search query must be at least 2 characters",
            ));
        }

        let limit = parse_bounded_int(
            params,
            "limit",
            DEFAULT_SEARCH_LIMIT,
            1,
            MAX_SEARCH_LIMIT,
            &mut errors,
        );
        let activity_type = parse_enum::<ActivityType>(params, "type", "activity type", &mut errors);

        if !errors.is_empty() {
            return Err(CaselogError::Validation(errors));
        }

        Ok(Self {
            query,
            limit,
            activity_type,
            agent_id: opt_string(params, "agentId"),
        })
    }
}

// ---------------------------------------------------------------------------
// Filter tree
// ---------------------------------------------------------------------------

/// Conjunction of filter clauses.
///
/// Each clause is a standalone document; one clause may itself be a `$or`
/// disjunction. Rendering keeps the clause structure ({"$and": [...]})
/// whenever more than one clause is present.
#[derive(Debug, Default)]
pub struct FilterTree {
    clauses: Vec<Document>,
}

impl FilterTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clause(&mut self, clause: Document) -> &mut Self {
        self.clauses.push(clause);
        self
    }

    pub fn eq(&mut self, field: &str, value: impl Into<Bson>) -> &mut Self {
        self.clause(doc! { field: value.into() })
    }

    /// Add a disjunction clause: matches when any alternative matches
    pub fn any_of(&mut self, alternatives: Vec<Document>) -> &mut Self {
        self.clause(doc! { "$or": alternatives })
    }

    pub fn into_document(mut self) -> Document {
        match self.clauses.len() {
            0 => Document::new(),
            1 => self.clauses.remove(0),
            _ => doc! { "$and": self.clauses },
        }
    }
}

// ---------------------------------------------------------------------------
// Date windows
// ---------------------------------------------------------------------------

fn start_of_day(at: DateTime<Utc>) -> DateTime<Utc> {
    Utc.from_utc_datetime(&at.date_naive().and_hms_opt(0, 0, 0).unwrap())
}

fn bdt(at: DateTime<Utc>) -> bson::DateTime {
    bson::DateTime::from_chrono(at)
}

/// Resolve a named window to a `created_at` range document.
///
/// `yesterday` is the exact half-open [start of yesterday, start of today);
/// every other window ends at `now` inclusive.
pub fn date_window(filter: DateFilter, now: DateTime<Utc>) -> Document {
    match filter {
        DateFilter::Today => doc! { "$gte": bdt(start_of_day(now)), "$lte": bdt(now) },
        DateFilter::Yesterday => {
            let today = start_of_day(now);
            doc! { "$gte": bdt(today - Duration::days(1)), "$lt": bdt(today) }
        }
        DateFilter::Last7Days => doc! { "$gte": bdt(now - Duration::days(7)), "$lte": bdt(now) },
        DateFilter::Last30Days => doc! { "$gte": bdt(now - Duration::days(30)), "$lte": bdt(now) },
        DateFilter::Last90Days => doc! { "$gte": bdt(now - Duration::days(90)), "$lte": bdt(now) },
    }
}

/// The [now - 24h, now] window used by `isRecent` and the stats `recent`
/// counter
pub fn recent_window(now: DateTime<Utc>) -> Document {
    doc! { "$gte": bdt(now - Duration::hours(24)), "$lte": bdt(now) }
}

/// Inclusive explicit range
pub fn explicit_window(start: DateTime<Utc>, end: DateTime<Utc>) -> Document {
    doc! { "$gte": bdt(start), "$lte": bdt(end) }
}

// ---------------------------------------------------------------------------
// Filter assembly
// ---------------------------------------------------------------------------

/// Push the common field-equality clauses of a list query
fn push_equality_clauses(tree: &mut FilterTree, query: &ListQuery) {
    if let Some(t) = query.activity_type {
        tree.eq("activity_type", t.as_str());
    }
    if let Some(t) = query.entity_type {
        tree.eq("entity_type", t.as_str());
    }
    if let Some(ref id) = query.agent_id {
        tree.eq("agent_id", id.as_str());
    }
    if let Some(ref id) = query.client_id {
        tree.eq("client_id", id.as_str());
    }
    if let Some(ref id) = query.user_id {
        tree.eq("user_id", id.as_str());
    }
    if let Some(ref id) = query.entity_id {
        tree.eq("entity_id", id.as_str());
    }
    if let Some(p) = query.priority {
        tree.eq("priority", p.as_str());
    }
    if let Some(s) = query.status {
        tree.eq("status", s.as_str());
    }
}

/// Restrict an agent to activities it owns or performed.
/// Other roles see everything.
fn push_role_clause(tree: &mut FilterTree, actor: &Actor) {
    if actor.role.is_scoped() {
        tree.any_of(vec![
            doc! { "agent_id": &actor.id },
            doc! { "user_id": &actor.id },
        ]);
    }
}

/// Build the complete filter for the list endpoint.
///
/// Date precedence: `isRecent` wins over everything; an explicit
/// startDate+endDate pair wins over `dateFilter`.
pub fn build_list_filter(query: &ListQuery, actor: &Actor, now: DateTime<Utc>) -> Document {
    let mut tree = FilterTree::new();

    push_equality_clauses(&mut tree, query);

    // Hidden records never leave the store through a list query
    tree.eq("is_visible", true);

    if query.is_recent {
        tree.clause(doc! { "created_at": recent_window(now) });
    } else if let (Some(start), Some(end)) = (query.start_date, query.end_date) {
        tree.clause(doc! { "created_at": explicit_window(start, end) });
    } else if let Some(df) = query.date_filter {
        tree.clause(doc! { "created_at": date_window(df, now) });
    }

    if !query.tags.is_empty() {
        tree.clause(doc! { "tags": { "$in": &query.tags } });
    }

    if let Some(ref search) = query.search {
        tree.clause(doc! { "$text": { "$search": search } });
    }

    push_role_clause(&mut tree, actor);

    tree.into_document()
}

/// Build the base stats filter (active + visible + role scoping + optional
/// agent), without any date clause
pub fn build_stats_base(query: &StatsQuery, actor: &Actor) -> FilterTree {
    let mut tree = FilterTree::new();

    tree.eq("status", ActivityStatus::Active.as_str());
    tree.eq("is_visible", true);

    // Non-agent callers may narrow stats to a single agent; agents are
    // already pinned to themselves by the role clause.
    if !actor.role.is_scoped() {
        if let Some(ref id) = query.agent_id {
            tree.eq("agent_id", id.as_str());
        }
    }

    push_role_clause(&mut tree, actor);

    tree
}

/// Full stats match for the requested period
pub fn build_stats_filter(query: &StatsQuery, actor: &Actor, now: DateTime<Utc>) -> Document {
    let mut tree = build_stats_base(query, actor);

    match query.period.date_filter() {
        Some(df) => {
            tree.clause(doc! { "created_at": date_window(df, now) });
        }
        None => {
            // custom period; validation guarantees both bounds
            if let (Some(start), Some(end)) = (query.start_date, query.end_date) {
                tree.clause(doc! { "created_at": explicit_window(start, end) });
            }
        }
    }

    tree.into_document()
}

/// Stats match for the last-24h counter, independent of the period
pub fn build_stats_recent_filter(
    query: &StatsQuery,
    actor: &Actor,
    now: DateTime<Utc>,
) -> Document {
    let mut tree = build_stats_base(query, actor);
    tree.clause(doc! { "created_at": recent_window(now) });
    tree.into_document()
}

/// Build the filter for the dedicated search endpoint
pub fn build_search_filter(query: &SearchQuery, actor: &Actor) -> Document {
    let mut tree = FilterTree::new();

    tree.clause(doc! { "$text": { "$search": &query.query } });
    tree.eq("status", ActivityStatus::Active.as_str());
    tree.eq("is_visible", true);

    if let Some(t) = query.activity_type {
        tree.eq("activity_type", t.as_str());
    }
    if let Some(ref id) = query.agent_id {
        tree.eq("agent_id", id.as_str());
    }

    push_role_clause(&mut tree, actor);

    tree.into_document()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;

    fn agent(id: &str) -> Actor {
        Actor {
            id: id.into(),
            role: Role::Agent,
            first_name: "A".into(),
            last_name: "B".into(),
        }
    }

    fn manager() -> Actor {
        Actor {
            id: "m1".into(),
            role: Role::Manager,
            first_name: "M".into(),
            last_name: "N".into(),
        }
    }

    fn params(pairs: &[(&str, &str)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn fixed_now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-06-10T15:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn defaults_apply_when_params_absent() {
        let q = ListQuery::from_params(&params(&[])).unwrap();
        assert_eq!(q.page, 1);
        assert_eq!(q.limit, 20);
        assert_eq!(q.status, Some(ActivityStatus::Active));
        assert_eq!(q.sort_by, SortKey::CreatedAt);
        assert_eq!(q.sort_order, SortOrder::Desc);
    }

    #[test]
    fn all_sentinel_clears_the_filter() {
        let q = ListQuery::from_params(&params(&[
            ("type", "all"),
            ("priority", "all"),
            ("status", "all"),
            ("agentId", "all"),
        ]))
        .unwrap();
        assert!(q.activity_type.is_none());
        assert!(q.priority.is_none());
        assert!(q.status.is_none());
        assert!(q.agent_id.is_none());
    }

    #[test]
    fn invalid_enum_values_are_rejected() {
        let err = ListQuery::from_params(&params(&[("type", "starship")])).unwrap_err();
        let fields = err.field_errors().unwrap();
        assert_eq!(fields[0].field, "type");
    }

    #[test]
    fn limit_is_bounded() {
        assert!(ListQuery::from_params(&params(&[("limit", "101")])).is_err());
        assert!(ListQuery::from_params(&params(&[("limit", "0")])).is_err());
        assert!(ListQuery::from_params(&params(&[("page", "0")])).is_err());
    }

    #[test]
    fn tags_split_and_trim() {
        let q = ListQuery::from_params(&params(&[("tags", " urgent, renewal ,,vip")])).unwrap();
        assert_eq!(q.tags, vec!["urgent", "renewal", "vip"]);
    }

    #[test]
    fn yesterday_is_a_half_open_range() {
        // now = 2025-06-10T15:00:00Z
        let window = date_window(DateFilter::Yesterday, fixed_now());
        let gte = window.get_datetime("$gte").unwrap().to_chrono();
        let lt = window.get_datetime("$lt").unwrap().to_chrono();
        assert_eq!(gte.to_rfc3339(), "2025-06-09T00:00:00+00:00");
        assert_eq!(lt.to_rfc3339(), "2025-06-10T00:00:00+00:00");
        assert!(window.get("$lte").is_none());
    }

    #[test]
    fn today_starts_at_midnight() {
        let window = date_window(DateFilter::Today, fixed_now());
        let gte = window.get_datetime("$gte").unwrap().to_chrono();
        assert_eq!(gte.to_rfc3339(), "2025-06-10T00:00:00+00:00");
        let lte = window.get_datetime("$lte").unwrap().to_chrono();
        assert_eq!(lte.to_rfc3339(), "2025-06-10T15:00:00+00:00");
    }

    #[test]
    fn is_recent_overrides_other_date_filters() {
        let query = ListQuery {
            is_recent: true,
            date_filter: Some(DateFilter::Last90Days),
            start_date: Some(fixed_now() - Duration::days(365)),
            end_date: Some(fixed_now()),
            ..Default::default()
        };
        let filter = build_list_filter(&query, &manager(), fixed_now());
        let clauses = filter.get_array("$and").unwrap();
        let created = clauses
            .iter()
            .filter_map(|c| c.as_document())
            .find_map(|c| c.get_document("created_at").ok())
            .unwrap();
        let gte = created.get_datetime("$gte").unwrap().to_chrono();
        assert_eq!(gte.to_rfc3339(), "2025-06-09T15:00:00+00:00");
    }

    #[test]
    fn explicit_range_overrides_date_filter() {
        let start = fixed_now() - Duration::days(3);
        let query = ListQuery {
            date_filter: Some(DateFilter::Today),
            start_date: Some(start),
            end_date: Some(fixed_now()),
            ..Default::default()
        };
        let filter = build_list_filter(&query, &manager(), fixed_now());
        let clauses = filter.get_array("$and").unwrap();
        let created = clauses
            .iter()
            .filter_map(|c| c.as_document())
            .find_map(|c| c.get_document("created_at").ok())
            .unwrap();
        let gte = created.get_datetime("$gte").unwrap().to_chrono();
        assert_eq!(gte, start);
        // inclusive range uses $lte
        assert!(created.get("$lte").is_some());
    }

    #[test]
    fn agent_scope_is_a_nested_disjunction() {
        let query = ListQuery::default();
        let filter = build_list_filter(&query, &agent("a7"), fixed_now());
        let clauses = filter.get_array("$and").unwrap();

        // exactly one $or clause, carrying both identity alternatives
        let ors: Vec<_> = clauses
            .iter()
            .filter_map(|c| c.as_document())
            .filter(|c| c.contains_key("$or"))
            .collect();
        assert_eq!(ors.len(), 1);
        let alternatives = ors[0].get_array("$or").unwrap();
        assert_eq!(alternatives.len(), 2);
        let fields: Vec<&str> = alternatives
            .iter()
            .filter_map(|a| a.as_document())
            .flat_map(|d| d.keys().map(|k| k.as_str()))
            .collect();
        assert!(fields.contains(&"agent_id"));
        assert!(fields.contains(&"user_id"));

        // and the top level must never contain bare identity equalities
        assert!(clauses
            .iter()
            .filter_map(|c| c.as_document())
            .all(|c| !c.contains_key("agent_id") && !c.contains_key("user_id")));
    }

    #[test]
    fn managers_are_not_scoped() {
        let filter = build_list_filter(&ListQuery::default(), &manager(), fixed_now());
        let rendered = format!("{}", filter);
        assert!(!rendered.contains("$or"));
    }

    #[test]
    fn visibility_is_always_forced() {
        for actor in [agent("a1"), manager()] {
            let filter = build_list_filter(&ListQuery::default(), &actor, fixed_now());
            let rendered = format!("{}", filter);
            assert!(rendered.contains("is_visible"));
        }
    }

    #[test]
    fn search_filter_pins_active_and_visible() {
        let query = SearchQuery {
            query: "renewal".into(),
            limit: 10,
            activity_type: None,
            agent_id: None,
        };
        let filter = build_search_filter(&query, &agent("a1"));
        let rendered = format!("{}", filter);
        assert!(rendered.contains("$text"));
        assert!(rendered.contains("active"));
        assert!(rendered.contains("is_visible"));
        assert!(rendered.contains("$or"));
    }

    #[test]
    fn stats_custom_period_requires_bounds() {
        let err = StatsQuery::from_params(&params(&[("period", "custom")])).unwrap_err();
        assert!(err.field_errors().is_some());

        let ok = StatsQuery::from_params(&params(&[
            ("period", "custom"),
            ("startDate", "2025-01-01"),
            ("endDate", "2025-02-01"),
        ]))
        .unwrap();
        assert_eq!(ok.period, Period::Custom);
        assert!(ok.start_date.is_some());
    }

    #[test]
    fn stats_agent_param_ignored_for_scoped_actors() {
        let query = StatsQuery {
            agent_id: Some("someone-else".into()),
            ..Default::default()
        };
        let filter = build_stats_filter(&query, &agent("a1"), fixed_now());
        let rendered = format!("{}", filter);
        // the only agent_id mention is inside the role $or clause
        assert!(!rendered.contains("someone-else"));
        assert!(rendered.contains("$or"));
    }

    #[test]
    fn stats_recent_ignores_period() {
        let query = StatsQuery {
            period: Period::Last90Days,
            ..Default::default()
        };
        let filter = build_stats_recent_filter(&query, &manager(), fixed_now());
        let clauses = filter.get_array("$and").unwrap();
        let created = clauses
            .iter()
            .filter_map(|c| c.as_document())
            .find_map(|c| c.get_document("created_at").ok())
            .unwrap();
        let gte = created.get_datetime("$gte").unwrap().to_chrono();
        assert_eq!(gte.to_rfc3339(), "2025-06-09T15:00:00+00:00");
    }

    #[test]
    fn search_query_enforces_minimum_length() {
        assert!(SearchQuery::from_params("a", &params(&[])).is_err());
        assert!(SearchQuery::from_params("ab", &params(&[])).is_ok());
        // whitespace does not count
        assert!(SearchQuery::from_params(" a ", &params(&[])).is_err());
    }

    #[test]
    fn group_by_expressions() {
        assert_eq!(
            GroupByField::Agent.group_expr(),
            Bson::String("$agent_id".into())
        );
        let day = GroupByField::Day.group_expr();
        let day_doc = day.as_document().unwrap();
        assert!(day_doc.contains_key("$dateToString"));
    }

    #[test]
    fn single_clause_filters_stay_flat() {
        let mut tree = FilterTree::new();
        tree.eq("is_visible", true);
        let doc = tree.into_document();
        assert!(doc.contains_key("is_visible"));
        assert!(!doc.contains_key("$and"));
    }
}
