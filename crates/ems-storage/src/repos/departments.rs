//! Department repository.
//!
//! Departments are reference data: every authenticated caller may list
//! them, so queries are unscoped. Admin-only writes are enforced at the
//! handler layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_core::query_scalar::query_scalar;
use sqlx_postgres::PgPool;

use crate::error::{Result, StorageError};

const ENTITY: &str = "Department";

const COLUMNS: &str = "id, name, description, created_at, updated_at";

type DepartmentRow = (i64, String, Option<String>, DateTime<Utc>, DateTime<Utc>);

#[derive(Debug, Clone, Serialize)]
pub struct Department {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DepartmentRow> for Department {
    fn from(r: DepartmentRow) -> Self {
        Self {
            id: r.0,
            name: r.1,
            description: r.2,
            created_at: r.3,
            updated_at: r.4,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewDepartment {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DepartmentUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
}

pub async fn list(pool: &PgPool, limit: u32, offset: u64) -> Result<(Vec<Department>, u64)> {
    let sql =
        format!("SELECT {COLUMNS} FROM departments ORDER BY name LIMIT $1 OFFSET $2");
    let rows = query_as::<_, DepartmentRow>(&sql)
        .bind(i64::from(limit))
        .bind(offset as i64)
        .fetch_all(pool)
        .await?;

    let total: i64 = query_scalar("SELECT COUNT(*) FROM departments")
        .fetch_one(pool)
        .await?;

    Ok((
        rows.into_iter().map(Department::from).collect(),
        total as u64,
    ))
}

pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Department>> {
    let sql = format!("SELECT {COLUMNS} FROM departments WHERE id = $1");
    Ok(query_as::<_, DepartmentRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .map(Department::from))
}

pub async fn create(pool: &PgPool, new: NewDepartment) -> Result<Department> {
    let sql = format!(
        "INSERT INTO departments (name, description) VALUES ($1, $2) RETURNING {COLUMNS}"
    );
    let row: DepartmentRow = query_as(&sql)
        .bind(&new.name)
        .bind(&new.description)
        .fetch_one(pool)
        .await
        .map_err(|e| StorageError::from_write(ENTITY, e))?;
    Ok(row.into())
}

pub async fn update(pool: &PgPool, id: i64, upd: DepartmentUpdate) -> Result<Department> {
    let sql = format!(
        "UPDATE departments SET \
           name = COALESCE($2, name), \
           description = COALESCE($3, description), \
           updated_at = now() \
         WHERE id = $1 \
         RETURNING {COLUMNS}"
    );
    query_as::<_, DepartmentRow>(&sql)
        .bind(id)
        .bind(&upd.name)
        .bind(&upd.description)
        .fetch_optional(pool)
        .await
        .map_err(|e| StorageError::from_write(ENTITY, e))?
        .map(Department::from)
        .ok_or_else(|| StorageError::not_found(ENTITY, id))
}

pub async fn delete(pool: &PgPool, id: i64) -> Result<()> {
    let result = query("DELETE FROM departments WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StorageError::not_found(ENTITY, id));
    }
    Ok(())
}
