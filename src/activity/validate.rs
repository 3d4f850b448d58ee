//! Declarative validation for activity payloads
//!
//! Every rule produces a per-field error; a request is rejected as a whole
//! with the full list, before any persistence access.

use std::str::FromStr;

use crate::activity::types::{BulkActionRequest, CreateActivityRequest, MetadataInput,
                             UpdateActivityRequest};
use crate::db::schemas::{ActivityStatus, ActivityType, EntityType, Priority};
use crate::types::{CaselogError, FieldError, Result};

pub const ACTION_MIN: usize = 2;
pub const ACTION_MAX: usize = 200;
pub const DESCRIPTION_MIN: usize = 2;
pub const DESCRIPTION_MAX: usize = 1000;
pub const DETAILS_MAX: usize = 2000;
pub const TAG_MAX: usize = 50;
pub const VALUE_MAX: usize = 500;
pub const IP_MAX: usize = 45;
pub const USER_AGENT_MAX: usize = 500;

fn check_required_len(
    errors: &mut Vec<FieldError>,
    field: &str,
    value: &str,
    min: usize,
    max: usize,
) {
    let len = value.chars().count();
    if len < min || len > max {
        errors.push(FieldError::new(
            field,
            format!("must be {}-{} characters", min, max),
        ));
    }
}

fn check_optional_max(errors: &mut Vec<FieldError>, field: &str, value: &Option<String>, max: usize) {
    if let Some(v) = value {
        if v.chars().count() > max {
            errors.push(FieldError::new(
                field,
                format!("must be at most {} characters", max),
            ));
        }
    }
}

fn check_required(errors: &mut Vec<FieldError>, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.push(FieldError::new(field, "is required"));
    }
}

fn parse_required_enum<T: FromStr>(
    errors: &mut Vec<FieldError>,
    field: &str,
    label: &str,
    value: &str,
) -> Option<T> {
    if value.trim().is_empty() {
        errors.push(FieldError::new(field, "is required"));
        return None;
    }
    match value.parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            errors.push(FieldError::new(field, format!("invalid {}: {}", label, value)));
            None
        }
    }
}

fn parse_optional_enum<T: FromStr>(
    errors: &mut Vec<FieldError>,
    field: &str,
    label: &str,
    value: &Option<String>,
) -> Option<T> {
    let raw = value.as_deref()?;
    match raw.parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            errors.push(FieldError::new(field, format!("invalid {}: {}", label, raw)));
            None
        }
    }
}

fn check_metadata(errors: &mut Vec<FieldError>, metadata: &MetadataInput) {
    if let Some(amount) = metadata.amount {
        if amount < 0.0 || !amount.is_finite() {
            errors.push(FieldError::new("metadata.amount", "must be a non-negative number"));
        }
    }
    check_optional_max(errors, "metadata.oldValue", &metadata.old_value, VALUE_MAX);
    check_optional_max(errors, "metadata.newValue", &metadata.new_value, VALUE_MAX);
    check_optional_max(errors, "metadata.ipAddress", &metadata.ip_address, IP_MAX);
    check_optional_max(errors, "metadata.userAgent", &metadata.user_agent, USER_AGENT_MAX);
}

fn check_tags(errors: &mut Vec<FieldError>, tags: &[String]) {
    for tag in tags {
        if tag.trim().is_empty() || tag.chars().count() > TAG_MAX {
            errors.push(FieldError::new(
                "tags",
                format!("each tag must be 1-{} characters", TAG_MAX),
            ));
            break;
        }
    }
}

/// Enum fields of a create payload after validation
#[derive(Debug, Clone, Copy)]
pub struct ValidCreate {
    pub activity_type: ActivityType,
    pub entity_type: EntityType,
    pub priority: Priority,
}

/// Validate a create payload, returning its parsed enum fields
pub fn validate_create(req: &CreateActivityRequest) -> Result<ValidCreate> {
    let mut errors = Vec::new();

    check_required_len(&mut errors, "action", &req.action, ACTION_MIN, ACTION_MAX);
    check_required_len(
        &mut errors,
        "description",
        &req.description,
        DESCRIPTION_MIN,
        DESCRIPTION_MAX,
    );
    check_optional_max(&mut errors, "details", &req.details, DETAILS_MAX);

    let activity_type =
        parse_required_enum::<ActivityType>(&mut errors, "type", "activity type", &req.activity_type);
    let entity_type =
        parse_required_enum::<EntityType>(&mut errors, "entityType", "entity type", &req.entity_type);

    check_required(&mut errors, "entityId", &req.entity_id);
    check_required(&mut errors, "entityName", &req.entity_name);
    check_required(&mut errors, "agentId", &req.agent_id);
    check_required(&mut errors, "agentName", &req.agent_name);

    let priority =
        parse_optional_enum::<Priority>(&mut errors, "priority", "priority", &req.priority)
            .unwrap_or_default();

    if let Some(ref metadata) = req.metadata {
        check_metadata(&mut errors, metadata);
    }
    if let Some(ref tags) = req.tags {
        check_tags(&mut errors, tags);
    }

    // parse failures above always record an error, so both enums are
    // present exactly when the error list is empty
    match (activity_type, entity_type, errors.is_empty()) {
        (Some(activity_type), Some(entity_type), true) => Ok(ValidCreate {
            activity_type,
            entity_type,
            priority,
        }),
        _ => Err(CaselogError::Validation(errors)),
    }
}

/// Enum fields of an update payload after validation
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidUpdate {
    pub activity_type: Option<ActivityType>,
    pub priority: Option<Priority>,
    pub status: Option<ActivityStatus>,
}

/// Validate an update patch; every field is optional but must satisfy the
/// create constraints when present
pub fn validate_update(patch: &UpdateActivityRequest) -> Result<ValidUpdate> {
    let mut errors = Vec::new();

    if let Some(ref action) = patch.action {
        check_required_len(&mut errors, "action", action, ACTION_MIN, ACTION_MAX);
    }
    if let Some(ref description) = patch.description {
        check_required_len(
            &mut errors,
            "description",
            description,
            DESCRIPTION_MIN,
            DESCRIPTION_MAX,
        );
    }
    check_optional_max(&mut errors, "details", &patch.details, DETAILS_MAX);

    if let Some(ref name) = patch.entity_name {
        check_required(&mut errors, "entityName", name);
    }
    if let Some(ref id) = patch.agent_id {
        check_required(&mut errors, "agentId", id);
    }
    if let Some(ref id) = patch.user_id {
        check_required(&mut errors, "userId", id);
    }

    let activity_type =
        parse_optional_enum::<ActivityType>(&mut errors, "type", "activity type", &patch.activity_type);
    let priority =
        parse_optional_enum::<Priority>(&mut errors, "priority", "priority", &patch.priority);
    let status =
        parse_optional_enum::<ActivityStatus>(&mut errors, "status", "status", &patch.status);

    if let Some(ref metadata) = patch.metadata {
        check_metadata(&mut errors, metadata);
    }
    if let Some(ref tags) = patch.tags {
        check_tags(&mut errors, tags);
    }

    if !errors.is_empty() {
        return Err(CaselogError::Validation(errors));
    }

    Ok(ValidUpdate {
        activity_type,
        priority,
        status,
    })
}

/// A bulk action with its validated value
#[derive(Debug, Clone, PartialEq)]
pub enum BulkOp {
    Archive,
    Hide,
    Show,
    Delete,
    AddTag(String),
    RemoveTag(String),
    ChangePriority(Priority),
}

impl BulkOp {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Archive => "archive",
            Self::Hide => "hide",
            Self::Show => "show",
            Self::Delete => "delete",
            Self::AddTag(_) => "addTag",
            Self::RemoveTag(_) => "removeTag",
            Self::ChangePriority(_) => "changePriority",
        }
    }

    /// Whether this op is the role-gated soft delete
    pub fn is_delete(&self) -> bool {
        matches!(self, Self::Delete)
    }
}

/// Validate a bulk request: known action, value shape matching the action,
/// and a non-empty id list
pub fn validate_bulk(req: &BulkActionRequest) -> Result<BulkOp> {
    let mut errors = Vec::new();

    if req.activity_ids.is_empty() {
        errors.push(FieldError::new("activityIds", "must contain at least one id"));
    }

    let value = req.value.as_deref();
    let op = match req.action.as_str() {
        "archive" | "hide" | "show" | "delete" => {
            if value.is_some() {
                errors.push(FieldError::new(
                    "value",
                    format!("must be absent for action '{}'", req.action),
                ));
            }
            match req.action.as_str() {
                "archive" => Some(BulkOp::Archive),
                "hide" => Some(BulkOp::Hide),
                "show" => Some(BulkOp::Show),
                _ => Some(BulkOp::Delete),
            }
        }
        "addTag" | "removeTag" => match value {
            Some(tag) if !tag.trim().is_empty() && tag.chars().count() <= TAG_MAX => {
                let tag = tag.to_string();
                if req.action == "addTag" {
                    Some(BulkOp::AddTag(tag))
                } else {
                    Some(BulkOp::RemoveTag(tag))
                }
            }
            _ => {
                errors.push(FieldError::new(
                    "value",
                    format!("must be a 1-{} character tag", TAG_MAX),
                ));
                None
            }
        },
        "changePriority" => match value.and_then(|v| v.parse::<Priority>().ok()) {
            Some(priority) => Some(BulkOp::ChangePriority(priority)),
            None => {
                errors.push(FieldError::new(
                    "value",
                    "must be one of low, medium, high, critical",
                ));
                None
            }
        },
        other => {
            errors.push(FieldError::new("action", format!("unknown action: {}", other)));
            None
        }
    };

    match (op, errors.is_empty()) {
        (Some(op), true) => Ok(op),
        (_, _) => Err(CaselogError::Validation(errors)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_create_request() -> CreateActivityRequest {
        CreateActivityRequest {
            action: "Policy renewed".into(),
            activity_type: "policy".into(),
            description: "Annual renewal processed for Horizon Motor policy".into(),
            entity_type: "policy".into(),
            entity_id: "POL-1042".into(),
            entity_name: "Horizon Motor Policy".into(),
            agent_id: "agent-7".into(),
            agent_name: "Amit Shah".into(),
            ..Default::default()
        }
    }

    #[test]
    fn accepts_a_complete_payload() {
        let valid = validate_create(&valid_create_request()).unwrap();
        assert_eq!(valid.activity_type, ActivityType::Policy);
        assert_eq!(valid.priority, Priority::Medium);
    }

    #[test]
    fn rejects_short_action() {
        let mut req = valid_create_request();
        req.action = "x".into();
        let err = validate_create(&req).unwrap_err();
        assert_eq!(err.field_errors().unwrap()[0].field, "action");
    }

    #[test]
    fn rejects_overlong_description() {
        let mut req = valid_create_request();
        req.description = "d".repeat(1001);
        assert!(validate_create(&req).is_err());
    }

    #[test]
    fn collects_multiple_field_errors() {
        let req = CreateActivityRequest::default();
        let err = validate_create(&req).unwrap_err();
        let fields: Vec<&str> = err
            .field_errors()
            .unwrap()
            .iter()
            .map(|f| f.field.as_str())
            .collect();
        assert!(fields.contains(&"action"));
        assert!(fields.contains(&"type"));
        assert!(fields.contains(&"entityId"));
        assert!(fields.contains(&"agentName"));
    }

    #[test]
    fn rejects_negative_amount() {
        let mut req = valid_create_request();
        req.metadata = Some(MetadataInput {
            amount: Some(-10.0),
            ..Default::default()
        });
        let err = validate_create(&req).unwrap_err();
        assert_eq!(err.field_errors().unwrap()[0].field, "metadata.amount");
    }

    #[test]
    fn rejects_overlong_tag() {
        let mut req = valid_create_request();
        req.tags = Some(vec!["ok".into(), "t".repeat(51)]);
        assert!(validate_create(&req).is_err());
    }

    #[test]
    fn update_accepts_empty_patch_fields() {
        let valid = validate_update(&UpdateActivityRequest::default()).unwrap();
        assert!(valid.activity_type.is_none());
        assert!(valid.status.is_none());
    }

    #[test]
    fn update_checks_present_fields() {
        let patch = UpdateActivityRequest {
            action: Some("x".into()),
            status: Some("vanished".into()),
            ..Default::default()
        };
        let err = validate_update(&patch).unwrap_err();
        let fields: Vec<&str> = err
            .field_errors()
            .unwrap()
            .iter()
            .map(|f| f.field.as_str())
            .collect();
        assert!(fields.contains(&"action"));
        assert!(fields.contains(&"status"));
    }

    #[test]
    fn bulk_value_shape_is_action_dependent() {
        // archive must not carry a value
        let req = BulkActionRequest {
            activity_ids: vec!["a".into()],
            action: "archive".into(),
            value: Some("nope".into()),
        };
        assert!(validate_bulk(&req).is_err());

        // addTag requires one
        let req = BulkActionRequest {
            activity_ids: vec!["a".into()],
            action: "addTag".into(),
            value: None,
        };
        assert!(validate_bulk(&req).is_err());

        // changePriority takes a priority name
        let req = BulkActionRequest {
            activity_ids: vec!["a".into()],
            action: "changePriority".into(),
            value: Some("critical".into()),
        };
        assert_eq!(
            validate_bulk(&req).unwrap(),
            BulkOp::ChangePriority(Priority::Critical)
        );
    }

    #[test]
    fn bulk_rejects_unknown_action() {
        let req = BulkActionRequest {
            activity_ids: vec!["a".into()],
            action: "obliterate".into(),
            value: None,
        };
        let err = validate_bulk(&req).unwrap_err();
        assert_eq!(err.field_errors().unwrap()[0].field, "action");
    }

    #[test]
    fn bulk_rejects_empty_id_list() {
        let req = BulkActionRequest {
            activity_ids: vec![],
            action: "archive".into(),
            value: None,
        };
        assert!(validate_bulk(&req).is_err());
    }
}
