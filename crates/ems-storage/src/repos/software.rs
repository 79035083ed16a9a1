//! Software inventory repository.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_core::query_scalar::query_scalar;
use sqlx_postgres::PgPool;

use ems_core::RoleScope;

use crate::error::{Result, StorageError};
use crate::scope::{ScopeColumns, ScopePredicate};

const ENTITY: &str = "Software";

const COLUMNS: &str = "id, name, version, vendor, license_id, status, \
                       assigned_to, created_by, created_at, updated_at";

type SoftwareRow = (
    i64,
    String,
    Option<String>,
    Option<String>,
    Option<i64>,
    String,
    Option<i64>,
    Option<i64>,
    DateTime<Utc>,
    DateTime<Utc>,
);

#[derive(Debug, Clone, Serialize)]
pub struct Software {
    pub id: i64,
    pub name: String,
    pub version: Option<String>,
    pub vendor: Option<String>,
    pub license_id: Option<i64>,
    pub status: String,
    pub assigned_to: Option<i64>,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<SoftwareRow> for Software {
    fn from(r: SoftwareRow) -> Self {
        Self {
            id: r.0,
            name: r.1,
            version: r.2,
            vendor: r.3,
            license_id: r.4,
            status: r.5,
            assigned_to: r.6,
            created_by: r.7,
            created_at: r.8,
            updated_at: r.9,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewSoftware {
    pub name: String,
    pub version: Option<String>,
    pub vendor: Option<String>,
    pub license_id: Option<i64>,
    pub status: Option<String>,
    pub assigned_to: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SoftwareUpdate {
    pub name: Option<String>,
    pub version: Option<String>,
    pub vendor: Option<String>,
    pub license_id: Option<i64>,
    pub status: Option<String>,
    pub assigned_to: Option<i64>,
}

pub async fn list(
    pool: &PgPool,
    scope: RoleScope,
    limit: u32,
    offset: u64,
) -> Result<(Vec<Software>, u64)> {
    let pred = ScopePredicate::render(scope, ScopeColumns::Owned, 3);
    let sql = format!(
        "SELECT {COLUMNS} FROM software WHERE TRUE{} ORDER BY id DESC LIMIT $1 OFFSET $2",
        pred.fragment
    );
    let mut q = query_as::<_, SoftwareRow>(&sql)
        .bind(i64::from(limit))
        .bind(offset as i64);
    if let Some(id) = pred.bind {
        q = q.bind(id);
    }
    let rows = q.fetch_all(pool).await?;

    let count_pred = ScopePredicate::render(scope, ScopeColumns::Owned, 1);
    let count_sql = format!(
        "SELECT COUNT(*) FROM software WHERE TRUE{}",
        count_pred.fragment
    );
    let mut cq = query_scalar::<_, i64>(&count_sql);
    if let Some(id) = count_pred.bind {
        cq = cq.bind(id);
    }
    let total = cq.fetch_one(pool).await?;

    Ok((rows.into_iter().map(Software::from).collect(), total as u64))
}

pub async fn find_by_id(pool: &PgPool, scope: RoleScope, id: i64) -> Result<Option<Software>> {
    let pred = ScopePredicate::render(scope, ScopeColumns::Owned, 2);
    let sql = format!(
        "SELECT {COLUMNS} FROM software WHERE id = $1{}",
        pred.fragment
    );
    let mut q = query_as::<_, SoftwareRow>(&sql).bind(id);
    if let Some(eid) = pred.bind {
        q = q.bind(eid);
    }
    Ok(q.fetch_optional(pool).await?.map(Software::from))
}

pub async fn create(pool: &PgPool, new: NewSoftware, created_by: Option<i64>) -> Result<Software> {
    let sql = format!(
        "INSERT INTO software (name, version, vendor, license_id, status, assigned_to, created_by) \
         VALUES ($1, $2, $3, $4, COALESCE($5, 'active'), $6, $7) \
         RETURNING {COLUMNS}"
    );
    let row: SoftwareRow = query_as(&sql)
        .bind(&new.name)
        .bind(&new.version)
        .bind(&new.vendor)
        .bind(new.license_id)
        .bind(&new.status)
        .bind(new.assigned_to)
        .bind(created_by)
        .fetch_one(pool)
        .await
        .map_err(|e| StorageError::from_write(ENTITY, e))?;
    Ok(row.into())
}

pub async fn update(
    pool: &PgPool,
    scope: RoleScope,
    id: i64,
    upd: SoftwareUpdate,
) -> Result<Software> {
    let pred = ScopePredicate::render(scope, ScopeColumns::Owned, 8);
    let sql = format!(
        "UPDATE software SET \
           name = COALESCE($2, name), \
           version = COALESCE($3, version), \
           vendor = COALESCE($4, vendor), \
           license_id = COALESCE($5, license_id), \
           status = COALESCE($6, status), \
           assigned_to = COALESCE($7, assigned_to), \
           updated_at = now() \
         WHERE id = $1{} \
         RETURNING {COLUMNS}",
        pred.fragment
    );
    let mut q = query_as::<_, SoftwareRow>(&sql)
        .bind(id)
        .bind(&upd.name)
        .bind(&upd.version)
        .bind(&upd.vendor)
        .bind(upd.license_id)
        .bind(&upd.status)
        .bind(upd.assigned_to);
    if let Some(eid) = pred.bind {
        q = q.bind(eid);
    }
    q.fetch_optional(pool)
        .await
        .map_err(|e| StorageError::from_write(ENTITY, e))?
        .map(Software::from)
        .ok_or_else(|| StorageError::not_found(ENTITY, id))
}

pub async fn delete(pool: &PgPool, scope: RoleScope, id: i64) -> Result<()> {
    let pred = ScopePredicate::render(scope, ScopeColumns::Owned, 2);
    let sql = format!("DELETE FROM software WHERE id = $1{}", pred.fragment);
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
