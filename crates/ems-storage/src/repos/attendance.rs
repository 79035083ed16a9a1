//! Attendance log repository (time tracking).

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx_core::query_as::query_as;
use sqlx_core::query_scalar::query_scalar;
use sqlx_postgres::PgPool;

use ems_core::RoleScope;

use crate::error::{Result, StorageError};
use crate::scope::{ScopeColumns, ScopePredicate};

const ENTITY: &str = "AttendanceLog";

const COLUMNS: &str = "id, employee_id, check_in, check_out, source, created_at";

type AttendanceRow = (
    i64,
    i64,
    DateTime<Utc>,
    Option<DateTime<Utc>>,
    String,
    DateTime<Utc>,
);

#[derive(Debug, Clone, Serialize)]
pub struct AttendanceLog {
    pub id: i64,
    pub employee_id: i64,
    pub check_in: DateTime<Utc>,
    pub check_out: Option<DateTime<Utc>>,
    pub source: String,
    pub created_at: DateTime<Utc>,
}

impl From<AttendanceRow> for AttendanceLog {
    fn from(r: AttendanceRow) -> Self {
        Self {
            id: r.0,
            employee_id: r.1,
            check_in: r.2,
            check_out: r.3,
            source: r.4,
            created_at: r.5,
        }
    }
}

/// Opens a new attendance log. Fails with a conflict when the employee
/// already has an open log (checked in without checking out).
pub async fn check_in(pool: &PgPool, employee_id: i64, source: &str) -> Result<AttendanceLog> {
    let open: i64 = query_scalar(
        "SELECT COUNT(*) FROM attendance_logs WHERE employee_id = $1 AND check_out IS NULL",
    )
    .bind(employee_id)
    .fetch_one(pool)
    .await?;
    if open > 0 {
        return Err(StorageError::conflict(ENTITY, "already checked in"));
    }

    let sql = format!(
        "INSERT INTO attendance_logs (employee_id, check_in, source) \
         VALUES ($1, now(), $2) \
         RETURNING {COLUMNS}"
    );
    let row: AttendanceRow = query_as(&sql)
        .bind(employee_id)
        .bind(source)
        .fetch_one(pool)
        .await?;
    Ok(row.into())
}

/// Closes the employee's open log. Not-found when nothing is open.
pub async fn check_out(pool: &PgPool, employee_id: i64) -> Result<AttendanceLog> {
    let sql = format!(
        "UPDATE attendance_logs SET check_out = now() \
         WHERE id = (SELECT id FROM attendance_logs \
                     WHERE employee_id = $1 AND check_out IS NULL \
                     ORDER BY check_in DESC LIMIT 1) \
         RETURNING {COLUMNS}"
    );
    query_as::<_, AttendanceRow>(&sql)
        .bind(employee_id)
        .fetch_optional(pool)
        .await?
        .map(AttendanceLog::from)
        .ok_or_else(|| StorageError::not_found(ENTITY, employee_id))
}

/// Role-scoped paginated listing, newest first.
pub async fn list(
    pool: &PgPool,
    scope: RoleScope,
    limit: u32,
    offset: u64,
) -> Result<(Vec<AttendanceLog>, u64)> {
    let pred = ScopePredicate::render(scope, ScopeColumns::EmployeeId, 3);
    let sql = format!(
        "SELECT {COLUMNS} FROM attendance_logs WHERE TRUE{} ORDER BY check_in DESC LIMIT $1 OFFSET $2",
        pred.fragment
    );
    let mut q = query_as::<_, AttendanceRow>(&sql)
        .bind(i64::from(limit))
        .bind(offset as i64);
    if let Some(id) = pred.bind {
        q = q.bind(id);
    }
    let rows = q.fetch_all(pool).await?;

    let count_pred = ScopePredicate::render(scope, ScopeColumns::EmployeeId, 1);
    let count_sql = format!(
        "SELECT COUNT(*) FROM attendance_logs WHERE TRUE{}",
        count_pred.fragment
    );
    let mut cq = query_scalar::<_, i64>(&count_sql);
    if let Some(id) = count_pred.bind {
        cq = cq.bind(id);
    }
    let total = cq.fetch_one(pool).await?;

    Ok((
        rows.into_iter().map(AttendanceLog::from).collect(),
        total as u64,
    ))
}
