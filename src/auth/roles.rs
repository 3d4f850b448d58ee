//! Actor roles and authorization rules
//!
//! Roles form an ordered hierarchy: agents see only their own activity,
//! managers and super admins see everything and may delete.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role carried by every authenticated actor
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Role {
    /// Field agent - visibility restricted to own activity
    #[default]
    Agent = 0,
    /// Agency manager - full visibility, may delete
    Manager = 1,
    /// Platform administrator - full visibility, may delete
    SuperAdmin = 2,
}

impl Role {
    /// Whether this role is scoped to its own activity when reading
    pub fn is_scoped(&self) -> bool {
        matches!(self, Role::Agent)
    }

    /// Whether this role may soft-delete activities (single or bulk)
    pub fn can_delete(&self) -> bool {
        matches!(self, Role::Manager | Role::SuperAdmin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Agent => write!(f, "agent"),
            Role::Manager => write!(f, "manager"),
            Role::SuperAdmin => write!(f, "super_admin"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_ordering() {
        assert!(Role::SuperAdmin > Role::Manager);
        assert!(Role::Manager > Role::Agent);
    }

    #[test]
    fn only_agents_are_scoped() {
        assert!(Role::Agent.is_scoped());
        assert!(!Role::Manager.is_scoped());
        assert!(!Role::SuperAdmin.is_scoped());
    }

    #[test]
    fn delete_is_role_gated() {
        assert!(!Role::Agent.can_delete());
        assert!(Role::Manager.can_delete());
        assert!(Role::SuperAdmin.can_delete());
    }

    #[test]
    fn wire_format_is_snake_case() {
        assert_eq!(serde_json::to_string(&Role::SuperAdmin).unwrap(), "\"super_admin\"");
        let role: Role = serde_json::from_str("\"agent\"").unwrap();
        assert_eq!(role, Role::Agent);
    }
}
