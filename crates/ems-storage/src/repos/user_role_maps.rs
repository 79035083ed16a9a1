//! Role-mapping repository.
//!
//! `user_role_maps` links an identity-provider subject (or an email, when
//! no subject has been seen yet) to a local role and, optionally, an
//! employee row.
//!
//! Known gap: the intended invariant "at least one of employee_id or email
//! is present" is deliberately relaxed; provider-only accounts arrive
//! before their employee row exists. See the migration comment before
//! tightening this.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_postgres::PgPool;

use ems_core::Role;

use crate::error::{Result, StorageError};

const ENTITY: &str = "UserRoleMap";

const COLUMNS: &str = "id, provider_subject_id, email, role, employee_id, is_active, \
                       created_at, updated_at";

type UserRoleMapRow = (
    i64,
    Option<String>,
    Option<String>,
    String,
    Option<i64>,
    bool,
    DateTime<Utc>,
    DateTime<Utc>,
);

#[derive(Debug, Clone, Serialize)]
pub struct UserRoleMap {
    pub id: i64,
    pub provider_subject_id: Option<String>,
    pub email: Option<String>,
    pub role: String,
    pub employee_id: Option<i64>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRoleMap {
    pub fn role(&self) -> Role {
        Role::parse(&self.role)
    }
}

impl From<UserRoleMapRow> for UserRoleMap {
    fn from(r: UserRoleMapRow) -> Self {
        Self {
            id: r.0,
            provider_subject_id: r.1,
            email: r.2,
            role: r.3,
            employee_id: r.4,
            is_active: r.5,
            created_at: r.6,
            updated_at: r.7,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUserRoleMap {
    pub provider_subject_id: Option<String>,
    pub email: Option<String>,
    pub role: String,
    pub employee_id: Option<i64>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// Lookup used by the redirect leg of the login flow: match the provider
/// subject id first, fall back to email. Only active rows qualify.
pub async fn find_active_by_subject_or_email(
    pool: &PgPool,
    subject_id: &str,
    email: &str,
) -> Result<Option<UserRoleMap>> {
    let sql = format!(
        "SELECT {COLUMNS} FROM user_role_maps \
         WHERE is_active AND (provider_subject_id = $1 OR lower(email) = lower($2)) \
         ORDER BY (provider_subject_id = $1) DESC \
         LIMIT 1"
    );
    Ok(query_as::<_, UserRoleMapRow>(&sql)
        .bind(subject_id)
        .bind(email)
        .fetch_optional(pool)
        .await?
        .map(UserRoleMap::from))
}

/// Lookup by primary key, active rows only (refresh-token validation).
pub async fn find_active_by_id(pool: &PgPool, id: i64) -> Result<Option<UserRoleMap>> {
    let sql = format!("SELECT {COLUMNS} FROM user_role_maps WHERE id = $1 AND is_active");
    Ok(query_as::<_, UserRoleMapRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .map(UserRoleMap::from))
}

pub async fn create(pool: &PgPool, new: NewUserRoleMap) -> Result<UserRoleMap> {
    let sql = format!(
        "INSERT INTO user_role_maps (provider_subject_id, email, role, employee_id, is_active) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING {COLUMNS}"
    );
    let row: UserRoleMapRow = query_as(&sql)
        .bind(&new.provider_subject_id)
        .bind(&new.email)
        .bind(&new.role)
        .bind(new.employee_id)
        .bind(new.is_active)
        .fetch_one(pool)
        .await
        .map_err(|e| StorageError::from_write(ENTITY, e))?;
    Ok(row.into())
}

/// Record the provider subject id on first successful login via email
/// match, so subsequent logins hit the primary lookup path.
pub async fn attach_subject_id(pool: &PgPool, id: i64, subject_id: &str) -> Result<()> {
    query(
        "UPDATE user_role_maps SET provider_subject_id = $2, updated_at = now() \
         WHERE id = $1 AND provider_subject_id IS NULL",
    )
    .bind(id)
    .bind(subject_id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn deactivate(pool: &PgPool, id: i64) -> Result<()> {
    let result = query("UPDATE user_role_maps SET is_active = FALSE, updated_at = now() WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StorageError::not_found(ENTITY, id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_accessor_parses_column() {
        let map = UserRoleMap {
            id: 1,
            provider_subject_id: Some("sub-1".into()),
            email: Some("a@b.c".into()),
            role: "ADMIN".into(),
            employee_id: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(map.role().is_admin());
    }

    #[test]
    fn test_new_map_defaults_active() {
        let new: NewUserRoleMap =
            serde_json::from_str(r#"{"email": "a@b.c", "role": "employee"}"#).unwrap();
        assert!(new.is_active);
        // Both identity columns may be absent; the presence invariant is
        // relaxed, see the module docs.
        assert!(new.provider_subject_id.is_none());
    }
}
