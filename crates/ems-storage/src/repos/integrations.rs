//! Integration registry repository.
//!
//! Integrations carry no `assigned_to` column; ownership scoping uses
//! [`ScopeColumns::CreatedBy`] only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_core::query_scalar::query_scalar;
use sqlx_postgres::PgPool;

use ems_core::RoleScope;

use crate::error::{Result, StorageError};
use crate::scope::{ScopeColumns, ScopePredicate};

const ENTITY: &str = "Integration";

const COLUMNS: &str =
    "id, name, kind, endpoint_url, status, config, created_by, created_at, updated_at";

type IntegrationRow = (
    i64,
    String,
    String,
    Option<String>,
    String,
    Value,
    Option<i64>,
    DateTime<Utc>,
    DateTime<Utc>,
);

#[derive(Debug, Clone, Serialize)]
pub struct Integration {
    pub id: i64,
    pub name: String,
    pub kind: String,
    pub endpoint_url: Option<String>,
    pub status: String,
    pub config: Value,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<IntegrationRow> for Integration {
    fn from(r: IntegrationRow) -> Self {
        Self {
            id: r.0,
            name: r.1,
            kind: r.2,
            endpoint_url: r.3,
            status: r.4,
            config: r.5,
            created_by: r.6,
            created_at: r.7,
            updated_at: r.8,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewIntegration {
    pub name: String,
    pub kind: String,
    pub endpoint_url: Option<String>,
    pub status: Option<String>,
    pub config: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IntegrationUpdate {
    pub name: Option<String>,
    pub kind: Option<String>,
    pub endpoint_url: Option<String>,
    pub status: Option<String>,
    pub config: Option<Value>,
}

pub async fn list(
    pool: &PgPool,
    scope: RoleScope,
    limit: u32,
    offset: u64,
) -> Result<(Vec<Integration>, u64)> {
    let ScopePredicate { fragment, bind } =
        ScopePredicate::render(scope, ScopeColumns::CreatedBy, 3);
    let sql = format!(
        "SELECT {COLUMNS} FROM integrations WHERE TRUE{fragment} ORDER BY id DESC LIMIT $1 OFFSET $2"
    );
    let mut q = query_as::<_, IntegrationRow>(&sql)
        .bind(i64::from(limit))
        .bind(offset as i64);
    if let Some(id) = bind {
        q = q.bind(id);
    }
    let rows = q.fetch_all(pool).await?;

    let ScopePredicate {
        fragment: count_fragment,
        bind: count_bind,
    } = ScopePredicate::render(scope, ScopeColumns::CreatedBy, 1);
    let count_sql = format!("SELECT COUNT(*) FROM integrations WHERE TRUE{count_fragment}");
    let mut cq = query_scalar::<_, i64>(&count_sql);
    if let Some(id) = count_bind {
        cq = cq.bind(id);
    }
    let total = cq.fetch_one(pool).await?;

    Ok((
        rows.into_iter().map(Integration::from).collect(),
        total as u64,
    ))
}

pub async fn find_by_id(pool: &PgPool, scope: RoleScope, id: i64) -> Result<Option<Integration>> {
    let ScopePredicate { fragment, bind } =
        ScopePredicate::render(scope, ScopeColumns::CreatedBy, 2);
    let sql = format!("SELECT {COLUMNS} FROM integrations WHERE id = $1{fragment}");
    let mut q = query_as::<_, IntegrationRow>(&sql).bind(id);
    if let Some(eid) = bind {
        q = q.bind(eid);
    }
    Ok(q.fetch_optional(pool).await?.map(Integration::from))
}

pub async fn create(
    pool: &PgPool,
    new: NewIntegration,
    created_by: Option<i64>,
) -> Result<Integration> {
    let sql = format!(
        "INSERT INTO integrations (name, kind, endpoint_url, status, config, created_by) \
         VALUES ($1, $2, $3, COALESCE($4, 'enabled'), COALESCE($5, '{{}}'::jsonb), $6) \
         RETURNING {COLUMNS}"
    );
    let row: IntegrationRow = query_as(&sql)
        .bind(&new.name)
        .bind(&new.kind)
        .bind(&new.endpoint_url)
        .bind(&new.status)
        .bind(&new.config)
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
    upd: IntegrationUpdate,
) -> Result<Integration> {
    let ScopePredicate { fragment, bind } =
        ScopePredicate::render(scope, ScopeColumns::CreatedBy, 7);
    let sql = format!(
        "UPDATE integrations SET \
           name = COALESCE($2, name), \
           kind = COALESCE($3, kind), \
           endpoint_url = COALESCE($4, endpoint_url), \
           status = COALESCE($5, status), \
           config = COALESCE($6, config), \
           updated_at = now() \
         WHERE id = $1{fragment} \
         RETURNING {COLUMNS}"
    );
    let mut q = query_as::<_, IntegrationRow>(&sql)
        .bind(id)
        .bind(&upd.name)
        .bind(&upd.kind)
        .bind(&upd.endpoint_url)
        .bind(&upd.status)
        .bind(&upd.config);
    if let Some(eid) = bind {
        q = q.bind(eid);
    }
    q.fetch_optional(pool)
        .await
        .map_err(|e| StorageError::from_write(ENTITY, e))?
        .map(Integration::from)
        .ok_or_else(|| StorageError::not_found(ENTITY, id))
}

pub async fn delete(pool: &PgPool, scope: RoleScope, id: i64) -> Result<()> {
    let ScopePredicate { fragment, bind } =
        ScopePredicate::render(scope, ScopeColumns::CreatedBy, 2);
    let sql = format!("DELETE FROM integrations WHERE id = $1{fragment}");
    let mut q = query(&sql).bind(id);
    if let Some(eid) = bind {
        q = q.bind(eid);
    }
    let result = q.execute(pool).await?;
    if result.rows_affected() == 0 {
        return Err(StorageError::not_found(ENTITY, id));
    }
    Ok(())
}

