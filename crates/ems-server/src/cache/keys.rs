//! Cache key scheme.
//!
//! Keys are colon-delimited: `<entity>:list:<role>:<user>:<page>:<limit>`
//! for scoped list pages and `<entity>:detail:<id>` for single rows. The
//! role and user segments keep scoped lists from ever colliding across
//! callers.

use std::time::Duration;

use ems_core::{Role, RoleScope};

/// TTL for cached list pages.
pub const LIST_TTL: Duration = Duration::from_secs(300);

/// TTL for cached detail rows.
pub const DETAIL_TTL: Duration = Duration::from_secs(300);

pub struct CacheKey;

impl CacheKey {
    pub fn list(entity: &str, role: Role, scope: RoleScope, page: u32, limit: u32) -> String {
        format!(
            "{entity}:list:{}:{}:{page}:{limit}",
            role.as_str(),
            scope.cache_segment()
        )
    }

    /// Prefix covering every list page of an entity, for post-write
    /// invalidation.
    pub fn list_prefix(entity: &str) -> String {
        format!("{entity}:list:")
    }

    pub fn detail(entity: &str, id: i64) -> String {
        format!("{entity}:detail:{id}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_keys_differ_across_role_user_page_limit() {
        let admin = CacheKey::list("licenses", Role::Admin, RoleScope::All, 1, 10);
        let emp = CacheKey::list(
            "licenses",
            Role::Employee,
            RoleScope::SelfOnly { employee_id: 7 },
            1,
            10,
        );
        let other_emp = CacheKey::list(
            "licenses",
            Role::Employee,
            RoleScope::SelfOnly { employee_id: 8 },
            1,
            10,
        );
        let page2 = CacheKey::list("licenses", Role::Admin, RoleScope::All, 2, 10);
        let limit20 = CacheKey::list("licenses", Role::Admin, RoleScope::All, 1, 20);

        let keys = [&admin, &emp, &other_emp, &page2, &limit20];
        for (i, a) in keys.iter().enumerate() {
            for b in keys.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
        assert_eq!(admin, "licenses:list:admin:-:1:10");
        assert_eq!(emp, "licenses:list:employee:7:1:10");
    }

    #[test]
    fn test_list_prefix_covers_pages() {
        let key = CacheKey::list("tickets", Role::Admin, RoleScope::All, 3, 50);
        assert!(key.starts_with(&CacheKey::list_prefix("tickets")));
        assert!(!key.starts_with(&CacheKey::list_prefix("licenses")));
    }

    #[test]
    fn test_detail_key() {
        assert_eq!(CacheKey::detail("hardware", 42), "hardware:detail:42");
    }
}
