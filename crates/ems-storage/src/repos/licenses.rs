//! License repository.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_core::query_scalar::query_scalar;
use sqlx_postgres::PgPool;

use ems_core::RoleScope;

use crate::error::{Result, StorageError};
use crate::scope::{ScopeColumns, ScopePredicate};

const ENTITY: &str = "License";

const COLUMNS: &str = "id, name, vendor, license_key, seats, expiry_date, status, \
                       assigned_to, created_by, created_at, updated_at";

type LicenseRow = (
    i64,
    String,
    Option<String>,
    Option<String>,
    i32,
    Option<NaiveDate>,
    String,
    Option<i64>,
    Option<i64>,
    DateTime<Utc>,
    DateTime<Utc>,
);

#[derive(Debug, Clone, Serialize)]
pub struct License {
    pub id: i64,
    pub name: String,
    pub vendor: Option<String>,
    pub license_key: Option<String>,
    pub seats: i32,
    pub expiry_date: Option<NaiveDate>,
    pub status: String,
    pub assigned_to: Option<i64>,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<LicenseRow> for License {
    fn from(r: LicenseRow) -> Self {
        Self {
            id: r.0,
            name: r.1,
            vendor: r.2,
            license_key: r.3,
            seats: r.4,
            expiry_date: r.5,
            status: r.6,
            assigned_to: r.7,
            created_by: r.8,
            created_at: r.9,
            updated_at: r.10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewLicense {
    pub name: String,
    pub vendor: Option<String>,
    pub license_key: Option<String>,
    #[serde(default = "default_seats")]
    pub seats: i32,
    pub expiry_date: Option<NaiveDate>,
    pub status: Option<String>,
    pub assigned_to: Option<i64>,
}

fn default_seats() -> i32 {
    1
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LicenseUpdate {
    pub name: Option<String>,
    pub vendor: Option<String>,
    pub license_key: Option<String>,
    pub seats: Option<i32>,
    pub expiry_date: Option<NaiveDate>,
    pub status: Option<String>,
    pub assigned_to: Option<i64>,
}

/// Role-scoped paginated listing. Returns the page rows and the total
/// row count under the same scope.
pub async fn list(
    pool: &PgPool,
    scope: RoleScope,
    limit: u32,
    offset: u64,
) -> Result<(Vec<License>, u64)> {
    let pred = ScopePredicate::render(scope, ScopeColumns::Owned, 3);
    let sql = format!(
        "SELECT {COLUMNS} FROM licenses WHERE TRUE{} ORDER BY id DESC LIMIT $1 OFFSET $2",
        pred.fragment
    );
    let mut q = query_as::<_, LicenseRow>(&sql)
        .bind(i64::from(limit))
        .bind(offset as i64);
    if let Some(id) = pred.bind {
        q = q.bind(id);
    }
    let rows = q.fetch_all(pool).await?;

    let count_pred = ScopePredicate::render(scope, ScopeColumns::Owned, 1);
    let count_sql = format!(
        "SELECT COUNT(*) FROM licenses WHERE TRUE{}",
        count_pred.fragment
    );
    let mut cq = query_scalar::<_, i64>(&count_sql);
    if let Some(id) = count_pred.bind {
        cq = cq.bind(id);
    }
    let total = cq.fetch_one(pool).await?;

    Ok((rows.into_iter().map(License::from).collect(), total as u64))
}

/// Scoped lookup by id. Rows outside the caller's scope read as absent.
pub async fn find_by_id(pool: &PgPool, scope: RoleScope, id: i64) -> Result<Option<License>> {
    let pred = ScopePredicate::render(scope, ScopeColumns::Owned, 2);
    let sql = format!(
        "SELECT {COLUMNS} FROM licenses WHERE id = $1{}",
        pred.fragment
    );
    let mut q = query_as::<_, LicenseRow>(&sql).bind(id);
    if let Some(eid) = pred.bind {
        q = q.bind(eid);
    }
    Ok(q.fetch_optional(pool).await?.map(License::from))
}

pub async fn create(pool: &PgPool, new: NewLicense, created_by: Option<i64>) -> Result<License> {
    let sql = format!(
        "INSERT INTO licenses (name, vendor, license_key, seats, expiry_date, status, assigned_to, created_by) \
         VALUES ($1, $2, $3, $4, $5, COALESCE($6, 'active'), $7, $8) \
         RETURNING {COLUMNS}"
    );
    let row: LicenseRow = query_as(&sql)
        .bind(&new.name)
        .bind(&new.vendor)
        .bind(&new.license_key)
        .bind(new.seats)
        .bind(new.expiry_date)
        .bind(&new.status)
        .bind(new.assigned_to)
        .bind(created_by)
        .fetch_one(pool)
        .await
        .map_err(|e| StorageError::from_write(ENTITY, e))?;
    Ok(row.into())
}

/// Scoped update; absent fields keep their current values.
pub async fn update(
    pool: &PgPool,
    scope: RoleScope,
    id: i64,
    upd: LicenseUpdate,
) -> Result<License> {
    let pred = ScopePredicate::render(scope, ScopeColumns::Owned, 9);
    let sql = format!(
        "UPDATE licenses SET \
           name = COALESCE($2, name), \
           vendor = COALESCE($3, vendor), \
           license_key = COALESCE($4, license_key), \
           seats = COALESCE($5, seats), \
           expiry_date = COALESCE($6, expiry_date), \
           status = COALESCE($7, status), \
           assigned_to = COALESCE($8, assigned_to), \
           updated_at = now() \
         WHERE id = $1{} \
         RETURNING {COLUMNS}",
        pred.fragment
    );
    let mut q = query_as::<_, LicenseRow>(&sql)
        .bind(id)
        .bind(&upd.name)
        .bind(&upd.vendor)
        .bind(&upd.license_key)
        .bind(upd.seats)
        .bind(upd.expiry_date)
        .bind(&upd.status)
        .bind(upd.assigned_to);
    if let Some(eid) = pred.bind {
        q = q.bind(eid);
    }
    q.fetch_optional(pool)
        .await
        .map_err(|e| StorageError::from_write(ENTITY, e))?
        .map(License::from)
        .ok_or_else(|| StorageError::not_found(ENTITY, id))
}

/// Scoped delete. Deleting a row outside scope reports not-found.
pub async fn delete(pool: &PgPool, scope: RoleScope, id: i64) -> Result<()> {
    let pred = ScopePredicate::render(scope, ScopeColumns::Owned, 2);
    let sql = format!("DELETE FROM licenses WHERE id = $1{}", pred.fragment);
    let mut q = query(&sql).bind(id);
    if let Some(eid) = pred.bind {
        q = q.bind(eid);
    }
    let result = q.execute(pool).await?;
    if result.rows_affected() == 0 {
        return Err(StorageError::not_found(ENTITY, id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_license_defaults() {
        let new: NewLicense =
            serde_json::from_str(r#"{"name": "IntelliJ", "vendor": "JetBrains"}"#).unwrap();
        assert_eq!(new.seats, 1);
        assert!(new.status.is_none());
    }

    #[test]
    fn test_update_accepts_partial_body() {
        let upd: LicenseUpdate = serde_json::from_str(r#"{"status": "expired"}"#).unwrap();
        assert_eq!(upd.status.as_deref(), Some("expired"));
        assert!(upd.name.is_none());
    }
}
