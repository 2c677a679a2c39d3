//! Repair orders repository

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Transaction};

use super::Filters;
use crate::{
    error::{AppError, AppResult},
    models::repair::{
        NewRepairLog, NewRepairOrder, RepairLog, RepairOrder, RepairQuery, RepairStatus,
        RepairTransition,
    },
};

const ORDER_COLUMNS: &str = "id, equipment_id, reporter_id, assigned_to, fault_description, \
                             fault_code, photos, priority, status, solution, actual_hours, \
                             started_at, completed_at, confirmed_at, audited_at, created_at, updated_at";

/// Persistence of repair orders and their log
#[async_trait]
pub trait RepairStore: Send + Sync {
    async fn get(&self, id: i32) -> AppResult<RepairOrder>;

    /// Insert the order, put its equipment under maintenance and log the
    /// creation, all in one transaction.
    async fn create(&self, order: &NewRepairOrder) -> AppResult<RepairOrder>;

    /// Persist a transition if the order is still in `transition.from`;
    /// otherwise nothing is written and `InvalidState` is returned.
    async fn apply(&self, order_id: i32, transition: &RepairTransition) -> AppResult<RepairOrder>;

    /// Orders ordered by priority then most recent first.
    async fn list(&self, query: &RepairQuery) -> AppResult<(Vec<RepairOrder>, i64)>;

    /// Orders of a technician still in assigned, in progress or testing.
    async fn assigned_active(&self, user_id: i32) -> AppResult<Vec<RepairOrder>>;

    /// Log entries of an order, oldest first.
    async fn logs(&self, order_id: i32) -> AppResult<Vec<RepairLog>>;
}

#[derive(Clone)]
pub struct RepairsRepository {
    pool: Pool<Postgres>,
}

impl RepairsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

async fn append_log(
    tx: &mut Transaction<'_, Postgres>,
    order_id: i32,
    log: &NewRepairLog,
) -> AppResult<()> {
    sqlx::query("INSERT INTO repair_logs (order_id, user_id, action, content) VALUES ($1, $2, $3, $4)")
        .bind(order_id)
        .bind(log.user_id)
        .bind(log.action)
        .bind(&log.content)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

#[async_trait]
impl RepairStore for RepairsRepository {
    async fn get(&self, id: i32) -> AppResult<RepairOrder> {
        sqlx::query_as::<_, RepairOrder>(&format!(
            "SELECT {} FROM repair_orders WHERE id = $1",
            ORDER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Repair order {} not found", id)))
    }

    async fn create(&self, order: &NewRepairOrder) -> AppResult<RepairOrder> {
        let mut tx = self.pool.begin().await?;

        let created = sqlx::query_as::<_, RepairOrder>(&format!(
            r#"
            INSERT INTO repair_orders (equipment_id, reporter_id, fault_description, fault_code, photos, priority, status)
            VALUES ($1, $2, $3, $4, $5, $6, 'pending')
            RETURNING {}
            "#,
            ORDER_COLUMNS
        ))
        .bind(order.equipment_id)
        .bind(order.reporter_id)
        .bind(&order.fault_description)
        .bind(&order.fault_code)
        .bind(&order.photos)
        .bind(order.priority)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE equipment SET status = 'maintenance' WHERE id = $1 AND status <> 'scrapped'")
            .bind(order.equipment_id)
            .execute(&mut *tx)
            .await?;

        append_log(
            &mut tx,
            created.id,
            &NewRepairLog {
                user_id: order.reporter_id,
                action: crate::models::repair::RepairAction::Created,
                content: "Repair order created".to_string(),
            },
        )
        .await?;

        tx.commit().await?;
        Ok(created)
    }

    async fn apply(&self, order_id: i32, transition: &RepairTransition) -> AppResult<RepairOrder> {
        let next = &transition.order;
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query_as::<_, RepairOrder>(&format!(
            r#"
            UPDATE repair_orders
            SET assigned_to = $3, status = $4, solution = $5, photos = $6, actual_hours = $7,
                started_at = $8, completed_at = $9, confirmed_at = $10, audited_at = $11,
                updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING {}
            "#,
            ORDER_COLUMNS
        ))
        .bind(order_id)
        .bind(transition.from)
        .bind(next.assigned_to)
        .bind(next.status)
        .bind(&next.solution)
        .bind(&next.photos)
        .bind(next.actual_hours)
        .bind(next.started_at)
        .bind(next.completed_at)
        .bind(next.confirmed_at)
        .bind(next.audited_at)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| {
            AppError::InvalidState(format!(
                "Repair order {} is no longer in status '{}'",
                order_id, transition.from
            ))
        })?;

        if transition.release_equipment {
            sqlx::query(
                r#"
                UPDATE equipment SET status = 'running'
                WHERE id = $1 AND status = 'maintenance'
                  AND NOT EXISTS (
                      SELECT 1 FROM repair_orders
                      WHERE equipment_id = $1 AND id <> $2 AND status <> 'closed'
                  )
                "#,
            )
            .bind(updated.equipment_id)
            .bind(updated.id)
            .execute(&mut *tx)
            .await?;
        }

        append_log(&mut tx, updated.id, &transition.log).await?;

        tx.commit().await?;
        Ok(updated)
    }

    async fn list(&self, query: &RepairQuery) -> AppResult<(Vec<RepairOrder>, i64)> {
        let (limit, offset) = crate::models::page_window(query.page, query.per_page, i64::MAX);

        let mut filters = Filters::new();
        if query.status.is_some() {
            filters.push("status = $?");
        }
        if query.priority.is_some() {
            filters.push("priority = $?");
        }
        if query.equipment_id.is_some() {
            filters.push("equipment_id = $?");
        }
        if query.assigned_to.is_some() {
            filters.push("assigned_to = $?");
        }
        if query.date_from.is_some() {
            filters.push("created_at::date >= $?");
        }
        if query.date_to.is_some() {
            filters.push("created_at::date <= $?");
        }
        let where_clause = filters.where_clause();

        // Count total
        let count_q = format!("SELECT COUNT(*) FROM repair_orders {}", where_clause);
        let mut count_builder = sqlx::query_scalar::<_, i64>(&count_q);
        if let Some(v) = query.status { count_builder = count_builder.bind(v); }
        if let Some(v) = query.priority { count_builder = count_builder.bind(v); }
        if let Some(v) = query.equipment_id { count_builder = count_builder.bind(v); }
        if let Some(v) = query.assigned_to { count_builder = count_builder.bind(v); }
        if let Some(v) = query.date_from { count_builder = count_builder.bind(v); }
        if let Some(v) = query.date_to { count_builder = count_builder.bind(v); }
        let total = count_builder.fetch_one(&self.pool).await?;

        // Fetch rows
        let select_q = format!(
            "SELECT {} FROM repair_orders {} ORDER BY priority ASC, created_at DESC, id DESC LIMIT {} OFFSET {}",
            ORDER_COLUMNS, where_clause, limit, offset
        );
        let mut builder = sqlx::query_as::<_, RepairOrder>(&select_q);
        if let Some(v) = query.status { builder = builder.bind(v); }
        if let Some(v) = query.priority { builder = builder.bind(v); }
        if let Some(v) = query.equipment_id { builder = builder.bind(v); }
        if let Some(v) = query.assigned_to { builder = builder.bind(v); }
        if let Some(v) = query.date_from { builder = builder.bind(v); }
        if let Some(v) = query.date_to { builder = builder.bind(v); }

        let rows = builder.fetch_all(&self.pool).await?;
        Ok((rows, total))
    }

    async fn assigned_active(&self, user_id: i32) -> AppResult<Vec<RepairOrder>> {
        let statuses: Vec<String> = RepairStatus::ACTIVE_FOR_ASSIGNEE
            .iter()
            .map(|s| s.as_str().to_string())
            .collect();
        let rows = sqlx::query_as::<_, RepairOrder>(&format!(
            "SELECT {} FROM repair_orders WHERE assigned_to = $1 AND status = ANY($2) \
             ORDER BY priority ASC, created_at DESC",
            ORDER_COLUMNS
        ))
        .bind(user_id)
        .bind(statuses)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn logs(&self, order_id: i32) -> AppResult<Vec<RepairLog>> {
        let rows = sqlx::query_as::<_, RepairLog>(
            "SELECT id, order_id, user_id, action, content, created_at FROM repair_logs \
             WHERE order_id = $1 ORDER BY created_at, id",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
