//! SQL predicate construction for role-scoped queries.
//!
//! Repositories never build WHERE fragments from strings at call sites;
//! they pick a [`ScopeColumns`] variant and let this module render the
//! predicate for the caller's [`RoleScope`]. The set of allowed filters
//! stays closed and checkable.

use ems_core::RoleScope;

/// Which columns tie a row to the calling employee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeColumns {
    /// Row is visible if `assigned_to` or `created_by` matches.
    Owned,
    /// Row is visible if `employee_id` matches (attendance logs).
    EmployeeId,
    /// Row is visible if `created_by` matches (integrations, which have
    /// no assignee).
    CreatedBy,
    /// Row is visible if the primary key matches (employees table:
    /// non-admins see only their own record).
    Id,
}

/// Rendered scope predicate: a SQL fragment (starting with ` AND `) and
/// the single bind value it references, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopePredicate {
    pub fragment: String,
    pub bind: Option<i64>,
}

impl ScopePredicate {
    /// Render the predicate for `scope` over `columns`, binding at
    /// positional parameter `$param`.
    pub fn render(scope: RoleScope, columns: ScopeColumns, param: usize) -> Self {
        match scope {
            RoleScope::All => Self {
                fragment: String::new(),
                bind: None,
            },
            RoleScope::SelfOnly { employee_id } => {
                let fragment = match columns {
                    ScopeColumns::Owned => {
                        format!(" AND (assigned_to = ${param} OR created_by = ${param})")
                    }
                    ScopeColumns::EmployeeId => format!(" AND employee_id = ${param}"),
                    ScopeColumns::CreatedBy => format!(" AND created_by = ${param}"),
                    ScopeColumns::Id => format!(" AND id = ${param}"),
                };
                Self {
                    fragment,
                    bind: Some(employee_id),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_scope_renders_nothing() {
        let p = ScopePredicate::render(RoleScope::All, ScopeColumns::Owned, 3);
        assert!(p.fragment.is_empty());
        assert!(p.bind.is_none());
    }

    #[test]
    fn test_self_only_owned_columns() {
        let p = ScopePredicate::render(
            RoleScope::SelfOnly { employee_id: 7 },
            ScopeColumns::Owned,
            3,
        );
        assert_eq!(p.fragment, " AND (assigned_to = $3 OR created_by = $3)");
        assert_eq!(p.bind, Some(7));
    }

    #[test]
    fn test_self_only_employee_id_column() {
        let p = ScopePredicate::render(
            RoleScope::SelfOnly { employee_id: 2 },
            ScopeColumns::EmployeeId,
            1,
        );
        assert_eq!(p.fragment, " AND employee_id = $1");
    }

    #[test]
    fn test_self_only_created_by_column() {
        let p = ScopePredicate::render(
            RoleScope::SelfOnly { employee_id: 5 },
            ScopeColumns::CreatedBy,
            2,
        );
        assert_eq!(p.fragment, " AND created_by = $2");
        assert_eq!(p.bind, Some(5));
    }

    #[test]
    fn test_self_only_id_column() {
        let p =
            ScopePredicate::render(RoleScope::SelfOnly { employee_id: 2 }, ScopeColumns::Id, 2);
        assert_eq!(p.fragment, " AND id = $2");
    }
}
