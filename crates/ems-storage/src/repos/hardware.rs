//! Hardware asset repository.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_core::query_scalar::query_scalar;
use sqlx_postgres::PgPool;

use ems_core::RoleScope;

use crate::error::{Result, StorageError};
use crate::scope::{ScopeColumns, ScopePredicate};

const ENTITY: &str = "Hardware";

const COLUMNS: &str = "id, asset_tag, kind, model, serial_number, status, \
                       assigned_to, created_by, created_at, updated_at";

type HardwareRow = (
    i64,
    String,
    String,
    Option<String>,
    Option<String>,
    String,
    Option<i64>,
    Option<i64>,
    DateTime<Utc>,
    DateTime<Utc>,
);

#[derive(Debug, Clone, Serialize)]
pub struct Hardware {
    pub id: i64,
    pub asset_tag: String,
    pub kind: String,
    pub model: Option<String>,
    pub serial_number: Option<String>,
    pub status: String,
    pub assigned_to: Option<i64>,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<HardwareRow> for Hardware {
    fn from(r: HardwareRow) -> Self {
        Self {
            id: r.0,
            asset_tag: r.1,
            kind: r.2,
            model: r.3,
            serial_number: r.4,
            status: r.5,
            assigned_to: r.6,
            created_by: r.7,
            created_at: r.8,
            updated_at: r.9,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewHardware {
    pub asset_tag: String,
    pub kind: String,
    pub model: Option<String>,
    pub serial_number: Option<String>,
    pub status: Option<String>,
    pub assigned_to: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HardwareUpdate {
    pub asset_tag: Option<String>,
    pub kind: Option<String>,
    pub model: Option<String>,
    pub serial_number: Option<String>,
    pub status: Option<String>,
    pub assigned_to: Option<i64>,
}

pub async fn list(
    pool: &PgPool,
    scope: RoleScope,
    limit: u32,
    offset: u64,
) -> Result<(Vec<Hardware>, u64)> {
    let pred = ScopePredicate::render(scope, ScopeColumns::Owned, 3);
    let sql = format!(
        "SELECT {COLUMNS} FROM hardware WHERE TRUE{} ORDER BY id DESC LIMIT $1 OFFSET $2",
        pred.fragment
    );
    let mut q = query_as::<_, HardwareRow>(&sql)
        .bind(i64::from(limit))
        .bind(offset as i64);
    if let Some(id) = pred.bind {
        q = q.bind(id);
    }
    let rows = q.fetch_all(pool).await?;

    let count_pred = ScopePredicate::render(scope, ScopeColumns::Owned, 1);
    let count_sql = format!(
        "SELECT COUNT(*) FROM hardware WHERE TRUE{}",
        count_pred.fragment
    );
    let mut cq = query_scalar::<_, i64>(&count_sql);
    if let Some(id) = count_pred.bind {
        cq = cq.bind(id);
    }
    let total = cq.fetch_one(pool).await?;

    Ok((rows.into_iter().map(Hardware::from).collect(), total as u64))
}

pub async fn find_by_id(pool: &PgPool, scope: RoleScope, id: i64) -> Result<Option<Hardware>> {
    let pred = ScopePredicate::render(scope, ScopeColumns::Owned, 2);
    let sql = format!(
        "SELECT {COLUMNS} FROM hardware WHERE id = $1{}",
        pred.fragment
    );
    let mut q = query_as::<_, HardwareRow>(&sql).bind(id);
    if let Some(eid) = pred.bind {
        q = q.bind(eid);
    }
    Ok(q.fetch_optional(pool).await?.map(Hardware::from))
}

pub async fn create(pool: &PgPool, new: NewHardware, created_by: Option<i64>) -> Result<Hardware> {
    let sql = format!(
        "INSERT INTO hardware (asset_tag, kind, model, serial_number, status, assigned_to, created_by) \
         VALUES ($1, $2, $3, $4, COALESCE($5, 'in_stock'), $6, $7) \
         RETURNING {COLUMNS}"
    );
    let row: HardwareRow = query_as(&sql)
        .bind(&new.asset_tag)
        .bind(&new.kind)
        .bind(&new.model)
        .bind(&new.serial_number)
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
    upd: HardwareUpdate,
) -> Result<Hardware> {
    let pred = ScopePredicate::render(scope, ScopeColumns::Owned, 8);
    let sql = format!(
        "UPDATE hardware SET \
           asset_tag = COALESCE($2, asset_tag), \
           kind = COALESCE($3, kind), \
           model = COALESCE($4, model), \
           serial_number = COALESCE($5, serial_number), \
           status = COALESCE($6, status), \
           assigned_to = COALESCE($7, assigned_to), \
           updated_at = now() \
         WHERE id = $1{} \
         RETURNING {COLUMNS}",
        pred.fragment
    );
    let mut q = query_as::<_, HardwareRow>(&sql)
        .bind(id)
        .bind(&upd.asset_tag)
        .bind(&upd.kind)
        .bind(&upd.model)
        .bind(&upd.serial_number)
        .bind(&upd.status)
        .bind(upd.assigned_to);
    if let Some(eid) = pred.bind {
        q = q.bind(eid);
    }
    q.fetch_optional(pool)
        .await
        .map_err(|e| StorageError::from_write(ENTITY, e))?
        .map(Hardware::from)
        .ok_or_else(|| StorageError::not_found(ENTITY, id))
}

pub async fn delete(pool: &PgPool, scope: RoleScope, id: i64) -> Result<()> {
    let pred = ScopePredicate::render(scope, ScopeColumns::Owned, 2);
    let sql = format!("DELETE FROM hardware WHERE id = $1{}", pred.fragment);
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
