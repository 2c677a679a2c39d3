//! Inspection templates and tasks repository

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Pool, Postgres};

use super::{insert_checklist_records, Filters, Insertion};
use crate::{
    error::{AppError, AppResult},
    models::{
        inspection::{InspectionTask, InspectionTemplate, NewInspectionTask},
        task::{ChecklistItem, ChecklistRecord, Geolocation, TaskCompletion, TaskQuery},
    },
};

const TASK_COLUMNS: &str = "id, equipment_id, template_id, assigned_to, scheduled_date, status, \
                            started_at, completed_at, latitude, longitude, created_at";

/// Inspection templates configured per equipment type
#[async_trait]
pub trait InspectionCatalog: Send + Sync {
    /// Templates for the type, oldest first.
    async fn templates_for_type(&self, equipment_type_id: i32) -> AppResult<Vec<InspectionTemplate>>;

    /// Items of a template in checklist order.
    async fn template_items(&self, template_id: i32) -> AppResult<Vec<ChecklistItem>>;
}

/// Persistence of inspection tasks and their results
#[async_trait]
pub trait InspectionTaskStore: Send + Sync {
    async fn get(&self, id: i32) -> AppResult<InspectionTask>;

    async fn find_for_date(
        &self,
        equipment_id: i32,
        date: NaiveDate,
    ) -> AppResult<Option<InspectionTask>>;

    /// Insert unless a task already exists for the same equipment and day.
    async fn insert_if_absent(&self, task: &NewInspectionTask) -> AppResult<Insertion<InspectionTask>>;

    /// `pending -> in_progress`; `InvalidState` if the task moved meanwhile.
    async fn start(
        &self,
        id: i32,
        started_at: DateTime<Utc>,
        location: Geolocation,
    ) -> AppResult<InspectionTask>;

    /// Close the task and store its results in one transaction.
    async fn complete(&self, completion: &TaskCompletion) -> AppResult<InspectionTask>;

    async fn records(&self, task_id: i32) -> AppResult<Vec<ChecklistRecord>>;

    async fn list(&self, query: &TaskQuery) -> AppResult<(Vec<InspectionTask>, i64)>;

    /// Pending or in-progress tasks of a user scheduled on `date`.
    async fn assigned_on(&self, user_id: i32, date: NaiveDate) -> AppResult<Vec<InspectionTask>>;

    /// Mark open tasks scheduled before `today` as overdue. Returns the count.
    async fn mark_overdue(&self, today: NaiveDate) -> AppResult<u64>;
}

#[derive(Clone)]
pub struct InspectionRepository {
    pool: Pool<Postgres>,
}

impl InspectionRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InspectionCatalog for InspectionRepository {
    async fn templates_for_type(&self, equipment_type_id: i32) -> AppResult<Vec<InspectionTemplate>> {
        let rows = sqlx::query_as::<_, InspectionTemplate>(
            "SELECT id, name, equipment_type_id FROM inspection_templates \
             WHERE equipment_type_id = $1 ORDER BY id",
        )
        .bind(equipment_type_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn template_items(&self, template_id: i32) -> AppResult<Vec<ChecklistItem>> {
        let rows = sqlx::query_as::<_, ChecklistItem>(
            "SELECT id, name, method, criteria, sequence_order FROM inspection_items \
             WHERE template_id = $1 ORDER BY sequence_order, id",
        )
        .bind(template_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[async_trait]
impl InspectionTaskStore for InspectionRepository {
    async fn get(&self, id: i32) -> AppResult<InspectionTask> {
        sqlx::query_as::<_, InspectionTask>(&format!(
            "SELECT {} FROM inspection_tasks WHERE id = $1",
            TASK_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Inspection task {} not found", id)))
    }

    async fn find_for_date(
        &self,
        equipment_id: i32,
        date: NaiveDate,
    ) -> AppResult<Option<InspectionTask>> {
        let row = sqlx::query_as::<_, InspectionTask>(&format!(
            "SELECT {} FROM inspection_tasks WHERE equipment_id = $1 AND scheduled_date = $2",
            TASK_COLUMNS
        ))
        .bind(equipment_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn insert_if_absent(&self, task: &NewInspectionTask) -> AppResult<Insertion<InspectionTask>> {
        let inserted = sqlx::query_as::<_, InspectionTask>(&format!(
            r#"
            INSERT INTO inspection_tasks (equipment_id, template_id, assigned_to, scheduled_date, status)
            VALUES ($1, $2, $3, $4, 'pending')
            ON CONFLICT ON CONSTRAINT inspection_tasks_equipment_date_key DO NOTHING
            RETURNING {}
            "#,
            TASK_COLUMNS
        ))
        .bind(task.equipment_id)
        .bind(task.template_id)
        .bind(task.assigned_to)
        .bind(task.scheduled_date)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(created) = inserted {
            return Ok(Insertion::Created(created));
        }

        self.find_for_date(task.equipment_id, task.scheduled_date)
            .await?
            .map(Insertion::Existing)
            .ok_or_else(|| {
                AppError::Internal(format!(
                    "Inspection task for equipment {} on {} vanished after conflict",
                    task.equipment_id, task.scheduled_date
                ))
            })
    }

    async fn start(
        &self,
        id: i32,
        started_at: DateTime<Utc>,
        location: Geolocation,
    ) -> AppResult<InspectionTask> {
        sqlx::query_as::<_, InspectionTask>(&format!(
            r#"
            UPDATE inspection_tasks
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
        .ok_or_else(|| AppError::InvalidState(format!("Inspection task {} is no longer pending", id)))
    }

    async fn complete(&self, completion: &TaskCompletion) -> AppResult<InspectionTask> {
        let mut tx = self.pool.begin().await?;

        let task = sqlx::query_as::<_, InspectionTask>(&format!(
            r#"
            UPDATE inspection_tasks
            SET status = 'completed', completed_at = $2,
                latitude = COALESCE($3, latitude), longitude = COALESCE($4, longitude)
            WHERE id = $1 AND status IN ('pending', 'in_progress', 'overdue')
            RETURNING {}
            "#,
            TASK_COLUMNS
        ))
        .bind(completion.task_id)
        .bind(completion.completed_at)
        .bind(completion.location.latitude)
        .bind(completion.location.longitude)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| {
            AppError::InvalidState(format!(
                "Inspection task {} can no longer be completed",
                completion.task_id
            ))
        })?;

        insert_checklist_records(&mut tx, "inspection_records", task.id, &completion.entries).await?;

        tx.commit().await?;
        Ok(task)
    }

    async fn records(&self, task_id: i32) -> AppResult<Vec<ChecklistRecord>> {
        let rows = sqlx::query_as::<_, ChecklistRecord>(
            "SELECT id, task_id, item_id, result, remark, photo_url, created_at \
             FROM inspection_records WHERE task_id = $1 ORDER BY id",
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn list(&self, query: &TaskQuery) -> AppResult<(Vec<InspectionTask>, i64)> {
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

        // Count total
        let count_q = format!("SELECT COUNT(*) FROM inspection_tasks {}", where_clause);
        let mut count_builder = sqlx::query_scalar::<_, i64>(&count_q);
        if let Some(v) = query.assigned_to { count_builder = count_builder.bind(v); }
        if let Some(v) = query.equipment_id { count_builder = count_builder.bind(v); }
        if let Some(v) = query.status { count_builder = count_builder.bind(v); }
        if let Some(v) = query.date_from { count_builder = count_builder.bind(v); }
        if let Some(v) = query.date_to { count_builder = count_builder.bind(v); }
        let total = count_builder.fetch_one(&self.pool).await?;

        // Fetch rows
        let select_q = format!(
            "SELECT {} FROM inspection_tasks {} ORDER BY scheduled_date DESC, id DESC LIMIT {} OFFSET {}",
            TASK_COLUMNS, where_clause, limit, offset
        );
        let mut builder = sqlx::query_as::<_, InspectionTask>(&select_q);
        if let Some(v) = query.assigned_to { builder = builder.bind(v); }
        if let Some(v) = query.equipment_id { builder = builder.bind(v); }
        if let Some(v) = query.status { builder = builder.bind(v); }
        if let Some(v) = query.date_from { builder = builder.bind(v); }
        if let Some(v) = query.date_to { builder = builder.bind(v); }

        let rows = builder.fetch_all(&self.pool).await?;
        Ok((rows, total))
    }

    async fn assigned_on(&self, user_id: i32, date: NaiveDate) -> AppResult<Vec<InspectionTask>> {
        let rows = sqlx::query_as::<_, InspectionTask>(&format!(
            "SELECT {} FROM inspection_tasks WHERE assigned_to = $1 AND scheduled_date = $2 \
             AND status IN ('pending', 'in_progress') ORDER BY id",
            TASK_COLUMNS
        ))
        .bind(user_id)
        .bind(date)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn mark_overdue(&self, today: NaiveDate) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE inspection_tasks SET status = 'overdue' \
             WHERE scheduled_date < $1 AND status IN ('pending', 'in_progress')",
        )
        .bind(today)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
