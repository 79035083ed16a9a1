//! Caller roles and the typed query scope derived from them.

use serde::{Deserialize, Serialize};

/// Role assigned to an authenticated caller via `user_role_maps`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    Employee,
}

impl Role {
    /// Parse the role column value; unknown strings map to the least
    /// privileged role.
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "admin" => Self::Admin,
            "manager" => Self::Manager,
            _ => Self::Employee,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Manager => "manager",
            Self::Employee => "employee",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed row-visibility scope applied by every repository query.
///
/// Administrators (and managers) see all rows; everyone else is restricted
/// to rows they own through `assigned_to` or `created_by`. Building the
/// predicate from this enum keeps the set of allowed filters closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleScope {
    /// No row filtering.
    All,
    /// Restrict to rows where `assigned_to` or `created_by` equals the
    /// caller's employee id.
    SelfOnly { employee_id: i64 },
}

impl RoleScope {
    /// Derive the scope for a caller. Callers without a linked employee row
    /// get an impossible id so self-only queries match nothing rather than
    /// everything.
    pub fn for_caller(role: Role, employee_id: Option<i64>) -> Self {
        match role {
            Role::Admin | Role::Manager => Self::All,
            Role::Employee => Self::SelfOnly {
                employee_id: employee_id.unwrap_or(-1),
            },
        }
    }

    /// Per-user segment for cache keys. Shared (all-rows) pages use `-`;
    /// self-scoped pages carry the employee id so callers never collide.
    pub fn cache_segment(&self) -> String {
        match self {
            Self::All => "-".to_string(),
            Self::SelfOnly { employee_id } => employee_id.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse() {
        assert_eq!(Role::parse("admin"), Role::Admin);
        assert_eq!(Role::parse("ADMIN"), Role::Admin);
        assert_eq!(Role::parse("manager"), Role::Manager);
        assert_eq!(Role::parse("employee"), Role::Employee);
        assert_eq!(Role::parse("something-else"), Role::Employee);
    }

    #[test]
    fn test_scope_for_caller() {
        assert_eq!(RoleScope::for_caller(Role::Admin, Some(3)), RoleScope::All);
        assert_eq!(
            RoleScope::for_caller(Role::Employee, Some(3)),
            RoleScope::SelfOnly { employee_id: 3 }
        );
        // No employee row linked: must not widen to everything.
        assert_eq!(
            RoleScope::for_caller(Role::Employee, None),
            RoleScope::SelfOnly { employee_id: -1 }
        );
    }

    #[test]
    fn test_scope_cache_segments_differ() {
        assert_eq!(RoleScope::All.cache_segment(), "-");
        assert_eq!(RoleScope::SelfOnly { employee_id: 1 }.cache_segment(), "1");
        assert_ne!(
            RoleScope::SelfOnly { employee_id: 1 }.cache_segment(),
            RoleScope::SelfOnly { employee_id: 2 }.cache_segment()
        );
    }

    #[test]
    fn test_role_serde_round_trip() {
        let json = serde_json::to_string(&Role::Admin).unwrap();
        assert_eq!(json, "\"admin\"");
        let role: Role = serde_json::from_str("\"employee\"").unwrap();
        assert_eq!(role, Role::Employee);
    }
}
