//! Maintenance plans and tasks repository

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Pool, Postgres};

use super::{insert_checklist_records, Filters, Insertion};
use crate::{
    error::{AppError, AppResult},
    models::{
        maintenance::{MaintenanceOutcome, MaintenancePlan, MaintenanceTask, NewMaintenanceTask},
        task::{ChecklistItem, ChecklistRecord, Geolocation, TaskCompletion, TaskQuery},
    },
};

const TASK_COLUMNS: &str = "id, plan_id, equipment_id, assigned_to, scheduled_date, due_date, \
                            status, started_at, completed_at, actual_hours, latitude, longitude, \
                            remark, created_at";

/// Advisory lock namespace serializing task generation per equipment
const GENERATION_LOCK_NAMESPACE: i32 = 0x4d54;

/// Maintenance plans and their checklists
#[async_trait]
pub trait MaintenanceCatalog: Send + Sync {
    async fn get_plan(&self, id: i32) -> AppResult<MaintenancePlan>;

    /// Items of a plan in checklist order.
    async fn plan_items(&self, plan_id: i32) -> AppResult<Vec<ChecklistItem>>;
}

/// Persistence of maintenance tasks and their results
#[async_trait]
pub trait MaintenanceTaskStore: Send + Sync {
    async fn get(&self, id: i32) -> AppResult<MaintenanceTask>;

    /// Insert unless a task for the same equipment, under any plan, is
    /// already scheduled within `[scheduled_date, due_date]`.
    async fn insert_if_absent(&self, task: &NewMaintenanceTask) -> AppResult<Insertion<MaintenanceTask>>;

    /// `pending -> in_progress`; `InvalidState` if the task moved meanwhile.
    async fn start(
        &self,
        id: i32,
        started_at: DateTime<Utc>,
        location: Geolocation,
    ) -> AppResult<MaintenanceTask>;

    /// Close the task and store its results in one transaction.
    async fn complete(
        &self,
        completion: &TaskCompletion,
        outcome: &MaintenanceOutcome,
    ) -> AppResult<MaintenanceTask>;

    async fn records(&self, task_id: i32) -> AppResult<Vec<ChecklistRecord>>;

    async fn list(&self, query: &TaskQuery) -> AppResult<(Vec<MaintenanceTask>, i64)>;

    /// Pending or in-progress tasks of a user scheduled within `[from, until]`.
    async fn assigned_between(
        &self,
        user_id: i32,
        from: NaiveDate,
        until: NaiveDate,
    ) -> AppResult<Vec<MaintenanceTask>>;

    /// Mark open tasks whose due date is before `today` as overdue.
    async fn mark_overdue(&self, today: NaiveDate) -> AppResult<u64>;
}

#[derive(Clone)]
pub struct MaintenanceRepository {
    pool: Pool<Postgres>,
}

impl MaintenanceRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MaintenanceCatalog for MaintenanceRepository {
    async fn get_plan(&self, id: i32) -> AppResult<MaintenancePlan> {
        sqlx::query_as::<_, MaintenancePlan>(
            "SELECT id, name, equipment_type_id, level, cycle_days, flexible_days, work_hours \
             FROM maintenance_plans WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Maintenance plan {} not found", id)))
    }

    async fn plan_items(&self, plan_id: i32) -> AppResult<Vec<ChecklistItem>> {
        let rows = sqlx::query_as::<_, ChecklistItem>(
            "SELECT id, name, method, criteria, sequence_order FROM maintenance_plan_items \
             WHERE plan_id = $1 ORDER BY sequence_order, id",
        )
        .bind(plan_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[async_trait]
impl MaintenanceTaskStore for MaintenanceRepository {
    async fn get(&self, id: i32) -> AppResult<MaintenanceTask> {
        sqlx::query_as::<_, MaintenanceTask>(&format!(
            "SELECT {} FROM maintenance_tasks WHERE id = $1",
            TASK_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Maintenance task {} not found", id)))
    }

    async fn insert_if_absent(&self, task: &NewMaintenanceTask) -> AppResult<Insertion<MaintenanceTask>> {
        let mut tx = self.pool.begin().await?;

        // No unique constraint covers a date window; generators for the
        // same equipment serialize on this lock until commit.
        sqlx::query("SELECT pg_advisory_xact_lock($1, $2)")
            .bind(GENERATION_LOCK_NAMESPACE)
            .bind(task.equipment_id)
            .execute(&mut *tx)
            .await?;

        let existing = sqlx::query_as::<_, MaintenanceTask>(&format!(
            r#"
            SELECT {} FROM maintenance_tasks
            WHERE equipment_id = $1
              AND scheduled_date BETWEEN $2 AND $3
            ORDER BY scheduled_date
            LIMIT 1
            "#,
            TASK_COLUMNS
        ))
        .bind(task.equipment_id)
        .bind(task.scheduled_date)
        .bind(task.due_date)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(existing) = existing {
            tx.commit().await?;
            return Ok(Insertion::Existing(existing));
        }

        let created = sqlx::query_as::<_, MaintenanceTask>(&format!(
            r#"
            INSERT INTO maintenance_tasks (plan_id, equipment_id, assigned_to, scheduled_date, due_date, status)
            VALUES ($1, $2, $3, $4, $5, 'pending')
            RETURNING {}
            "#,
            TASK_COLUMNS
        ))
        .bind(task.plan_id)
        .bind(task.equipment_id)
        .bind(task.assigned_to)
        .bind(task.scheduled_date)
        .bind(task.due_date)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Insertion::Created(created))
    }

    async fn start(
        &self,
        id: i32,
        started_at: DateTime<Utc>,
        location: Geolocation,
    ) -> AppResult<MaintenanceTask> {
        sqlx::query_as::<_, MaintenanceTask>(&format!(
            r#"
            UPDATE maintenance_tasks
            SET status = 'in_progress', started_at = $2, latitude = $3, longitude = $4
            WHERE id = $1 AND status = 'pending'
            RETURNING {}
            "#,
            TASK_COLUMNS
        ))
        .bind(id)
        .bind(started_at)
        .bind(location.latitude)
        .bind(location.longitude)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::InvalidState(format!("Maintenance task {} is no longer pending", id)))
    }

    async fn complete(
        &self,
        completion: &TaskCompletion,
        outcome: &MaintenanceOutcome,
    ) -> AppResult<MaintenanceTask> {
        let mut tx = self.pool.begin().await?;

        let task = sqlx::query_as::<_, MaintenanceTask>(&format!(
            r#"
            UPDATE maintenance_tasks
            SET status = 'completed', completed_at = $2,
                latitude = COALESCE($3, latitude), longitude = COALESCE($4, longitude),
                actual_hours = COALESCE($5, actual_hours), remark = COALESCE($6, remark)
            WHERE id = $1 AND status IN ('pending', 'in_progress', 'overdue')
            RETURNING {}
            "#,
            TASK_COLUMNS
        ))
        .bind(completion.task_id)
        .bind(completion.completed_at)
        .bind(completion.location.latitude)
        .bind(completion.location.longitude)
        .bind(outcome.actual_hours)
        .bind(&outcome.remark)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| {
            AppError::InvalidState(format!(
                "Maintenance task {} can no longer be completed",
                completion.task_id
            ))
        })?;

        insert_checklist_records(&mut tx, "maintenance_records", task.id, &completion.entries).await?;

        tx.commit().await?;
        Ok(task)
    }

    async fn records(&self, task_id: i32) -> AppResult<Vec<ChecklistRecord>> {
        let rows = sqlx::query_as::<_, ChecklistRecord>(
            "SELECT id, task_id, item_id, result, remark, photo_url, created_at \
             FROM maintenance_records WHERE task_id = $1 ORDER BY id",
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn list(&self, query: &TaskQuery) -> AppResult<(Vec<MaintenanceTask>, i64)> {
        let (limit, offset) = crate::models::page_window(query.page, query.per_page, i64::MAX);

        let mut filters = Filters::new();
        if query.assigned_to.is_some() {
            filters.push("assigned_to = $?");
        }
        if query.equipment_id.is_some() {
            filters.push("equipment_id = $?");
        }
        if query.status.is_some() {
            filters.push("status = $?");
        }
        if query.date_from.is_some() {
            filters.push("scheduled_date >= $?");
        }
        if query.date_to.is_some() {
            filters.push("scheduled_date <= $?");
        }
        let where_clause = filters.where_clause();

        let count_q = format!("SELECT COUNT(*) FROM maintenance_tasks {}", where_clause);
        let mut count_builder = sqlx::query_scalar::<_, i64>(&count_q);
        if let Some(v) = query.assigned_to { count_builder = count_builder.bind(v); }
        if let Some(v) = query.equipment_id { count_builder = count_builder.bind(v); }
        if let Some(v) = query.status { count_builder = count_builder.bind(v); }
        if let Some(v) = query.date_from { count_builder = count_builder.bind(v); }
        if let Some(v) = query.date_to { count_builder = count_builder.bind(v); }
        let total = count_builder.fetch_one(&self.pool).await?;

        let select_q = format!(
            "SELECT {} FROM maintenance_tasks {} ORDER BY scheduled_date DESC, id DESC LIMIT {} OFFSET {}",
            TASK_COLUMNS, where_clause, limit, offset
        );
        let mut builder = sqlx::query_as::<_, MaintenanceTask>(&select_q);
        if let Some(v) = query.assigned_to { builder = builder.bind(v); }
        if let Some(v) = query.equipment_id { builder = builder.bind(v); }
        if let Some(v) = query.status { builder = builder.bind(v); }
        if let Some(v) = query.date_from { builder = builder.bind(v); }
        if let Some(v) = query.date_to { builder = builder.bind(v); }

        let rows = builder.fetch_all(&self.pool).await?;
        Ok((rows, total))
    }

    async fn assigned_between(
        &self,
        user_id: i32,
        from: NaiveDate,
        until: NaiveDate,
    ) -> AppResult<Vec<MaintenanceTask>> {
        let rows = sqlx::query_as::<_, MaintenanceTask>(&format!(
            r#"
            SELECT {} FROM maintenance_tasks
            WHERE assigned_to = $1 AND scheduled_date BETWEEN $2 AND $3
              AND status IN ('pending', 'in_progress')
            ORDER BY due_date, id
            "#,
            TASK_COLUMNS
        ))
        .bind(user_id)
        .bind(from)
        .bind(until)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn mark_overdue(&self, today: NaiveDate) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE maintenance_tasks SET status = 'overdue' \
             WHERE due_date < $1 AND status IN ('pending', 'in_progress')",
        )
        .bind(today)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
