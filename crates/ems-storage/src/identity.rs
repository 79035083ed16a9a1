//! Identity lookups behind a trait, so the login flow and the auth
//! middleware can run against a double in router tests while production
//! wires in Postgres.

use async_trait::async_trait;
use sqlx_postgres::PgPool;

use crate::error::Result;
use crate::repos::{employees, user_role_maps};
use crate::repos::user_role_maps::UserRoleMap;

/// The subset of storage the authentication flow depends on.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Resolve an employee code to the employee's email.
    async fn employee_email_by_code(&self, code: &str) -> Result<Option<String>>;

    /// Active role mapping by provider subject, falling back to email.
    async fn active_mapping_by_subject_or_email(
        &self,
        subject_id: &str,
        email: &str,
    ) -> Result<Option<UserRoleMap>>;

    /// Active role mapping by primary key.
    async fn active_mapping_by_id(&self, id: i64) -> Result<Option<UserRoleMap>>;

    /// Pin the provider subject id after a first login matched by email.
    async fn attach_subject_id(&self, id: i64, subject_id: &str) -> Result<()>;
}

/// Postgres-backed [`IdentityStore`] delegating to the repositories.
pub struct PgIdentityStore {
    pool: PgPool,
}

impl PgIdentityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityStore for PgIdentityStore {
    async fn employee_email_by_code(&self, code: &str) -> Result<Option<String>> {
        Ok(employees::find_by_employee_code(&self.pool, code)
            .await?
            .map(|e| e.email))
    }

    async fn active_mapping_by_subject_or_email(
        &self,
        subject_id: &str,
        email: &str,
    ) -> Result<Option<UserRoleMap>> {
        user_role_maps::find_active_by_subject_or_email(&self.pool, subject_id, email).await
    }

    async fn active_mapping_by_id(&self, id: i64) -> Result<Option<UserRoleMap>> {
        user_role_maps::find_active_by_id(&self.pool, id).await
    }

    async fn attach_subject_id(&self, id: i64, subject_id: &str) -> Result<()> {
        user_role_maps::attach_subject_id(&self.pool, id, subject_id).await
    }
}
