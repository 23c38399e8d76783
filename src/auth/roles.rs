//! Roles and the authenticated caller
//!
//! Role rows live in the identity store and are keyed by generated ids. The
//! registry is loaded once at startup so authorization never compares
//! against hard-coded identifier strings.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Kind of account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    Student,
    Advisor,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Student, Role::Advisor];

    /// Name stored in the `roles` table
    pub fn name(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Student => "Student",
            Role::Advisor => "Advisor",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Role::Admin => "Manages users and sees every achievement",
            Role::Student => "Submits achievements for verification",
            Role::Advisor => "Verifies achievements of assigned students",
        }
    }

    pub fn from_name(name: &str) -> Option<Role> {
        Role::ALL
            .into_iter()
            .find(|r| r.name().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Mapping between role ids in the identity store and [`Role`]
#[derive(Debug, Clone, Default)]
pub struct RoleRegistry {
    by_id: HashMap<String, Role>,
    ids: HashMap<Role, String>,
}

impl RoleRegistry {
    /// Build from `(id, name)` rows; rows with unknown names are skipped
    pub fn from_rows<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut registry = Self::default();
        for (id, name) in rows {
            if let Some(role) = Role::from_name(&name) {
                registry.ids.insert(role, id.clone());
                registry.by_id.insert(id, role);
            }
        }
        registry
    }

    pub fn role_for(&self, role_id: &str) -> Option<Role> {
        self.by_id.get(role_id).copied()
    }

    pub fn id_for(&self, role: Role) -> Option<&str> {
        self.ids.get(&role).map(String::as_str)
    }

    /// Every known role is present
    pub fn is_complete(&self) -> bool {
        Role::ALL.iter().all(|r| self.ids.contains_key(r))
    }
}

/// Authenticated caller, resolved from a bearer token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub role: Role,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_student(&self) -> bool {
        self.role == Role::Student
    }

    pub fn is_advisor(&self) -> bool {
        self.role == Role::Advisor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_round_trip() {
        let registry = RoleRegistry::from_rows(vec![
            ("r-1".to_string(), "Admin".to_string()),
            ("r-2".to_string(), "student".to_string()),
            ("r-3".to_string(), "Advisor".to_string()),
            ("r-4".to_string(), "Janitor".to_string()),
        ]);

        assert!(registry.is_complete());
        assert_eq!(registry.role_for("r-2"), Some(Role::Student));
        assert_eq!(registry.id_for(Role::Advisor), Some("r-3"));
        assert_eq!(registry.role_for("r-4"), None);
    }

    #[test]
    fn test_incomplete_registry() {
        let registry = RoleRegistry::from_rows(vec![("a".to_string(), "Admin".to_string())]);
        assert!(!registry.is_complete());
    }
}
