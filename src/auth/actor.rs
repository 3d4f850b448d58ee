//! The authenticated actor behind a request

use crate::auth::{Claims, Role};

/// Identity resolved from a verified token.
///
/// Everything downstream of the route layer works in terms of this type;
/// it is the only authentication artifact the domain logic ever sees.
#[derive(Debug, Clone)]
pub struct Actor {
    pub id: String,
    pub role: Role,
    pub first_name: String,
    pub last_name: String,
}

impl Actor {
    pub fn from_claims(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            role: claims.role,
            first_name: claims.first_name,
            last_name: claims.last_name,
        }
    }

    /// "First Last" as used to default userName on create
    pub fn display_name(&self) -> String {
        match (self.first_name.is_empty(), self.last_name.is_empty()) {
            (true, true) => self.id.clone(),
            (false, true) => self.first_name.clone(),
            (true, false) => self.last_name.clone(),
            (false, false) => format!("{} {}", self.first_name, self.last_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor(first: &str, last: &str) -> Actor {
        Actor {
            id: "u1".into(),
            role: Role::Agent,
            first_name: first.into(),
            last_name: last.into(),
        }
    }

    #[test]
    fn display_name_joins_parts() {
        assert_eq!(actor("Amit", "Shah").display_name(), "Amit Shah");
        assert_eq!(actor("Amit", "").display_name(), "Amit");
        assert_eq!(actor("", "").display_name(), "u1");
    }
}
