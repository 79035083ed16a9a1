//! Ticket repository.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_core::query_scalar::query_scalar;
use sqlx_postgres::PgPool;

use ems_core::RoleScope;

use crate::error::{Result, StorageError};
use crate::scope::{ScopeColumns, ScopePredicate};

const ENTITY: &str = "Ticket";

const COLUMNS: &str =
    "id, subject, description, status, priority, assigned_to, created_by, created_at, updated_at";

type TicketRow = (
    i64,
    String,
    Option<String>,
    String,
    String,
    Option<i64>,
    Option<i64>,
    DateTime<Utc>,
    DateTime<Utc>,
);

#[derive(Debug, Clone, Serialize)]
pub struct Ticket {
    pub id: i64,
    pub subject: String,
    pub description: Option<String>,
    pub status: String,
    pub priority: String,
    pub assigned_to: Option<i64>,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<TicketRow> for Ticket {
    fn from(r: TicketRow) -> Self {
        Self {
            id: r.0,
            subject: r.1,
            description: r.2,
            status: r.3,
            priority: r.4,
            assigned_to: r.5,
            created_by: r.6,
            created_at: r.7,
            updated_at: r.8,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTicket {
    pub subject: String,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub assigned_to: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TicketUpdate {
    pub subject: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub assigned_to: Option<i64>,
}

pub async fn list(
    pool: &PgPool,
    scope: RoleScope,
    limit: u32,
    offset: u64,
) -> Result<(Vec<Ticket>, u64)> {
    let pred = ScopePredicate::render(scope, ScopeColumns::Owned, 3);
    let sql = format!(
        "SELECT {COLUMNS} FROM tickets WHERE TRUE{} ORDER BY id DESC LIMIT $1 OFFSET $2",
        pred.fragment
    );
    let mut q = query_as::<_, TicketRow>(&sql)
        .bind(i64::from(limit))
        .bind(offset as i64);
    if let Some(id) = pred.bind {
        q = q.bind(id);
    }
    let rows = q.fetch_all(pool).await?;

    let count_pred = ScopePredicate::render(scope, ScopeColumns::Owned, 1);
    let count_sql = format!(
        "SELECT COUNT(*) FROM tickets WHERE TRUE{}",
        count_pred.fragment
    );
    let mut cq = query_scalar::<_, i64>(&count_sql);
    if let Some(id) = count_pred.bind {
        cq = cq.bind(id);
    }
    let total = cq.fetch_one(pool).await?;

    Ok((rows.into_iter().map(Ticket::from).collect(), total as u64))
}

pub async fn find_by_id(pool: &PgPool, scope: RoleScope, id: i64) -> Result<Option<Ticket>> {
    let pred = ScopePredicate::render(scope, ScopeColumns::Owned, 2);
    let sql = format!(
        "SELECT {COLUMNS} FROM tickets WHERE id = $1{}",
        pred.fragment
    );
    let mut q = query_as::<_, TicketRow>(&sql).bind(id);
    if let Some(eid) = pred.bind {
        q = q.bind(eid);
    }
    Ok(q.fetch_optional(pool).await?.map(Ticket::from))
}

pub async fn create(pool: &PgPool, new: NewTicket, created_by: Option<i64>) -> Result<Ticket> {
    let sql = format!(
        "INSERT INTO tickets (subject, description, priority, assigned_to, created_by) \
         VALUES ($1, $2, COALESCE($3, 'medium'), $4, $5) \
         RETURNING {COLUMNS}"
    );
    let row: TicketRow = query_as(&sql)
        .bind(&new.subject)
        .bind(&new.description)
        .bind(&new.priority)
        .bind(new.assigned_to)
        .bind(created_by)
        .fetch_one(pool)
        .await
        .map_err(|e| StorageError::from_write(ENTITY, e))?;
    Ok(row.into())
}

pub async fn update(pool: &PgPool, scope: RoleScope, id: i64, upd: TicketUpdate) -> Result<Ticket> {
    let pred = ScopePredicate::render(scope, ScopeColumns::Owned, 7);
    let sql = format!(
        "UPDATE tickets SET \
           subject = COALESCE($2, subject), \
           description = COALESCE($3, description), \
           status = COALESCE($4, status), \
           priority = COALESCE($5, priority), \
           assigned_to = COALESCE($6, assigned_to), \
           updated_at = now() \
         WHERE id = $1{} \
         RETURNING {COLUMNS}",
        pred.fragment
    );
    let mut q = query_as::<_, TicketRow>(&sql)
        .bind(id)
        .bind(&upd.subject)
        .bind(&upd.description)
        .bind(&upd.status)
        .bind(&upd.priority)
        .bind(upd.assigned_to);
    if let Some(eid) = pred.bind {
        q = q.bind(eid);
    }
    q.fetch_optional(pool)
        .await
        .map_err(|e| StorageError::from_write(ENTITY, e))?
        .map(Ticket::from)
        .ok_or_else(|| StorageError::not_found(ENTITY, id))
}

pub async fn delete(pool: &PgPool, scope: RoleScope, id: i64) -> Result<()> {
    let pred = ScopePredicate::render(scope, ScopeColumns::Owned, 2);
    let sql = format!("DELETE FROM tickets WHERE id = $1{}", pred.fragment);
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
    fn test_new_ticket_minimal_body() {
        let new: NewTicket = serde_json::from_str(r#"{"subject": "Laptop broken"}"#).unwrap();
        assert!(new.priority.is_none());
        assert!(new.assigned_to.is_none());
    }
}
