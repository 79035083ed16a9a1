//! Employee repository.
//!
//! Non-admin callers see only their own record (`ScopeColumns::Id`);
//! `find_by_employee_code` is unscoped because the login flow runs
//! before any caller identity exists.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_core::query_scalar::query_scalar;
use sqlx_postgres::PgPool;

use ems_core::RoleScope;

use crate::error::{Result, StorageError};
use crate::scope::{ScopeColumns, ScopePredicate};

const ENTITY: &str = "Employee";

const COLUMNS: &str = "id, employee_code, first_name, last_name, email, department_id, \
                       position, status, hired_on, created_at, updated_at";

type EmployeeRow = (
    i64,
    String,
    String,
    String,
    String,
    Option<i64>,
    Option<String>,
    String,
    Option<NaiveDate>,
    DateTime<Utc>,
    DateTime<Utc>,
);

#[derive(Debug, Clone, Serialize)]
pub struct Employee {
    pub id: i64,
    pub employee_code: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub department_id: Option<i64>,
    pub position: Option<String>,
    pub status: String,
    pub hired_on: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<EmployeeRow> for Employee {
    fn from(r: EmployeeRow) -> Self {
        Self {
            id: r.0,
            employee_code: r.1,
            first_name: r.2,
            last_name: r.3,
            email: r.4,
            department_id: r.5,
            position: r.6,
            status: r.7,
            hired_on: r.8,
            created_at: r.9,
            updated_at: r.10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewEmployee {
    pub employee_code: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub department_id: Option<i64>,
    pub position: Option<String>,
    pub status: Option<String>,
    pub hired_on: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmployeeUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub department_id: Option<i64>,
    pub position: Option<String>,
    pub status: Option<String>,
    pub hired_on: Option<NaiveDate>,
}

pub async fn list(
    pool: &PgPool,
    scope: RoleScope,
    limit: u32,
    offset: u64,
) -> Result<(Vec<Employee>, u64)> {
    let pred = ScopePredicate::render(scope, ScopeColumns::Id, 3);
    let sql = format!(
        "SELECT {COLUMNS} FROM employees WHERE TRUE{} ORDER BY id LIMIT $1 OFFSET $2",
        pred.fragment
    );
    let mut q = query_as::<_, EmployeeRow>(&sql)
        .bind(i64::from(limit))
        .bind(offset as i64);
    if let Some(id) = pred.bind {
        q = q.bind(id);
    }
    let rows = q.fetch_all(pool).await?;

    let count_pred = ScopePredicate::render(scope, ScopeColumns::Id, 1);
    let count_sql = format!(
        "SELECT COUNT(*) FROM employees WHERE TRUE{}",
        count_pred.fragment
    );
    let mut cq = query_scalar::<_, i64>(&count_sql);
    if let Some(id) = count_pred.bind {
        cq = cq.bind(id);
    }
    let total = cq.fetch_one(pool).await?;

    Ok((rows.into_iter().map(Employee::from).collect(), total as u64))
}

pub async fn find_by_id(pool: &PgPool, scope: RoleScope, id: i64) -> Result<Option<Employee>> {
    let pred = ScopePredicate::render(scope, ScopeColumns::Id, 2);
    let sql = format!(
        "SELECT {COLUMNS} FROM employees WHERE id = $1{}",
        pred.fragment
    );
    let mut q = query_as::<_, EmployeeRow>(&sql).bind(id);
    if let Some(eid) = pred.bind {
        q = q.bind(eid);
    }
    Ok(q.fetch_optional(pool).await?.map(Employee::from))
}

/// Unscoped lookup by employee code (login identifier resolution).
pub async fn find_by_employee_code(pool: &PgPool, code: &str) -> Result<Option<Employee>> {
    let sql = format!("SELECT {COLUMNS} FROM employees WHERE employee_code = $1");
    Ok(query_as::<_, EmployeeRow>(&sql)
        .bind(code)
        .fetch_optional(pool)
        .await?
        .map(Employee::from))
}

/// Unscoped lookup by email, case-insensitive.
pub async fn create(pool: &PgPool, new: NewEmployee) -> Result<Employee> {
    let sql = format!(
        "INSERT INTO employees (employee_code, first_name, last_name, email, department_id, position, status, hired_on) \
         VALUES ($1, $2, $3, $4, $5, $6, COALESCE($7, 'active'), $8) \
         RETURNING {COLUMNS}"
    );
    let row: EmployeeRow = query_as(&sql)
        .bind(&new.employee_code)
        .bind(&new.first_name)
        .bind(&new.last_name)
        .bind(&new.email)
        .bind(new.department_id)
        .bind(&new.position)
        .bind(&new.status)
        .bind(new.hired_on)
        .fetch_one(pool)
        .await
        .map_err(|e| StorageError::from_write(ENTITY, e))?;
    Ok(row.into())
}

pub async fn update(
    pool: &PgPool,
    scope: RoleScope,
    id: i64,
    upd: EmployeeUpdate,
) -> Result<Employee> {
    let pred = ScopePredicate::render(scope, ScopeColumns::Id, 9);
    let sql = format!(
        "UPDATE employees SET \
           first_name = COALESCE($2, first_name), \
           last_name = COALESCE($3, last_name), \
           email = COALESCE($4, email), \
           department_id = COALESCE($5, department_id), \
           position = COALESCE($6, position), \
           status = COALESCE($7, status), \
           hired_on = COALESCE($8, hired_on), \
           updated_at = now() \
         WHERE id = $1{} \
         RETURNING {COLUMNS}",
        pred.fragment
    );
    let mut q = query_as::<_, EmployeeRow>(&sql)
        .bind(id)
        .bind(&upd.first_name)
        .bind(&upd.last_name)
        .bind(&upd.email)
        .bind(upd.department_id)
        .bind(&upd.position)
        .bind(&upd.status)
        .bind(upd.hired_on);
    if let Some(eid) = pred.bind {
        q = q.bind(eid);
    }
    q.fetch_optional(pool)
        .await
        .map_err(|e| StorageError::from_write(ENTITY, e))?
        .map(Employee::from)
        .ok_or_else(|| StorageError::not_found(ENTITY, id))
}

pub async fn delete(pool: &PgPool, id: i64) -> Result<()> {
    let result = query("DELETE FROM employees WHERE id = $1")
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
    fn test_new_employee_body() {
        let new: NewEmployee = serde_json::from_str(
            r#"{"employee_code": "EMP001", "first_name": "Ana", "last_name": "Ruiz",
                "email": "ana@example.com"}"#,
        )
        .unwrap();
        assert_eq!(new.employee_code, "EMP001");
        assert!(new.department_id.is_none());
    }
}
