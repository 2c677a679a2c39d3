//! Periodic maintenance workflow

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use tracing::instrument;
use validator::Validate;

use super::task_generator::{TaskGenerator, TaskPlanner};
use crate::{
    error::{AppError, AppResult},
    models::{
        equipment::Equipment,
        maintenance::{
            CompleteMaintenance, GenerateMaintenanceTasks, MaintenanceOutcome, MaintenancePlan,
            MaintenanceTask, MaintenanceTaskDetails, NewMaintenanceTask, StartMaintenance,
        },
        page_window,
        task::{
            validate_entries, CompletionSummary, GenerateTasksReport, Geolocation, TaskCompletion,
            TaskQuery, TaskStatus,
        },
        user::Actor,
    },
    repository::{EquipmentRegistry, Insertion, MaintenanceCatalog, MaintenanceTaskStore},
};

#[derive(Clone)]
pub struct MaintenanceService {
    catalog: Arc<dyn MaintenanceCatalog>,
    tasks: Arc<dyn MaintenanceTaskStore>,
    generator: TaskGenerator,
    lookahead_days: i64,
    page_size_limit: i64,
}

impl MaintenanceService {
    pub fn new(
        equipment: Arc<dyn EquipmentRegistry>,
        catalog: Arc<dyn MaintenanceCatalog>,
        tasks: Arc<dyn MaintenanceTaskStore>,
        lookahead_days: i64,
        page_size_limit: i64,
    ) -> Self {
        Self {
            catalog,
            tasks,
            generator: TaskGenerator::new(equipment),
            lookahead_days,
            page_size_limit,
        }
    }

    /// Schedule `plan_id` on each equipment unless the equipment already
    /// has a maintenance task within the plan window.
    #[instrument(skip(self, request), fields(plan_id = request.plan_id), err)]
    pub async fn generate(&self, actor: Actor, request: GenerateMaintenanceTasks) -> AppResult<GenerateTasksReport> {
        actor.require_scheduler()?;
        request.validate()?;

        let plan = self.catalog.get_plan(request.plan_id).await?;
        let base_date = request.base_date.unwrap_or_else(|| Utc::now().date_naive());
        let (scheduled_date, due_date) = plan.window(base_date)?;
        let planner = MaintenancePlanner {
            plan,
            tasks: self.tasks.clone(),
            requester: actor.id,
            scheduled_date,
            due_date,
        };
        let report = self.generator.generate(&planner, &request.equipment_ids).await;
        tracing::info!(
            created = report.created_count,
            failed = report.errors.len(),
            "Maintenance tasks generated"
        );
        Ok(report)
    }

    #[instrument(skip(self, request), fields(task_id = request.task_id), err)]
    pub async fn start(&self, actor: Actor, request: StartMaintenance) -> AppResult<MaintenanceTask> {
        let location = Geolocation::new(request.latitude, request.longitude)?;
        let task = self.tasks.get(request.task_id).await?;
        if task.status != TaskStatus::Pending {
            return Err(AppError::InvalidState(format!(
                "Maintenance task {} is {}, only pending tasks can be started",
                task.id, task.status
            )));
        }

        let started = self.tasks.start(task.id, Utc::now(), location).await?;
        tracing::info!(task_id = started.id, user_id = actor.id, "Maintenance started");
        Ok(started)
    }

    #[instrument(skip(self, request), fields(task_id = request.task_id), err)]
    pub async fn complete(&self, actor: Actor, request: CompleteMaintenance) -> AppResult<CompletionSummary> {
        request.validate()?;
        let location = Geolocation::new(request.latitude, request.longitude)?;

        let task = self.tasks.get(request.task_id).await?;
        if !task.status.can_complete() {
            return Err(AppError::InvalidState(format!(
                "Maintenance task {} is already {}",
                task.id, task.status
            )));
        }

        let items = self.catalog.plan_items(task.plan_id).await?;
        validate_entries(&request.records, &items)?;

        let completion = TaskCompletion {
            task_id: task.id,
            completed_at: Utc::now(),
            location,
            entries: request.records,
        };
        let outcome = MaintenanceOutcome {
            actual_hours: request.actual_hours,
            remark: request.remark,
        };
        let completed = self.tasks.complete(&completion, &outcome).await?;

        let summary = CompletionSummary::new(
            completed.id,
            completion.completed_at,
            items.len(),
            &completion.entries,
        );
        tracing::info!(
            task_id = completed.id,
            user_id = actor.id,
            ng_count = summary.ng_count,
            "Maintenance completed"
        );
        Ok(summary)
    }

    pub async fn get(&self, id: i32) -> AppResult<MaintenanceTaskDetails> {
        let task = self.tasks.get(id).await?;
        let records = self.tasks.records(id).await?;
        Ok(MaintenanceTaskDetails { task, records })
    }

    pub async fn list(&self, mut query: TaskQuery) -> AppResult<(Vec<MaintenanceTask>, i64)> {
        let (per_page, _) = page_window(query.page, query.per_page, self.page_size_limit);
        query.per_page = Some(per_page);
        self.tasks.list(&query).await
    }

    /// Open tasks of the caller scheduled from `date` (today by default)
    /// up to the lookahead horizon.
    pub async fn my_tasks(&self, actor: Actor, date: Option<NaiveDate>) -> AppResult<Vec<MaintenanceTask>> {
        let from = date.unwrap_or_else(|| Utc::now().date_naive());
        let until = from
            .checked_add_signed(Duration::days(self.lookahead_days))
            .ok_or_else(|| AppError::Validation(format!("Date {} is out of range", from)))?;
        self.tasks.assigned_between(actor.id, from, until).await
    }

    /// Flag open tasks past their due date as overdue.
    #[instrument(skip(self), err)]
    pub async fn mark_overdue(&self, actor: Actor, today: NaiveDate) -> AppResult<u64> {
        actor.require_scheduler()?;
        let count = self.tasks.mark_overdue(today).await?;
        if count > 0 {
            tracing::info!(count, "Maintenance tasks marked overdue");
        }
        Ok(count)
    }
}

struct MaintenancePlanner {
    plan: MaintenancePlan,
    tasks: Arc<dyn MaintenanceTaskStore>,
    requester: i32,
    scheduled_date: NaiveDate,
    due_date: NaiveDate,
}

#[async_trait]
impl TaskPlanner for MaintenancePlanner {
    type Draft = NewMaintenanceTask;

    async fn plan(&self, equipment: &Equipment) -> AppResult<NewMaintenanceTask> {
        if equipment.type_id != self.plan.equipment_type_id {
            return Err(AppError::Validation(format!(
                "equipment type {} does not match plan type {}",
                equipment.type_id, self.plan.equipment_type_id
            )));
        }
        Ok(NewMaintenanceTask {
            plan_id: self.plan.id,
            equipment_id: equipment.id,
            assigned_to: equipment.dedicated_maintainer_id.unwrap_or(self.requester),
            scheduled_date: self.scheduled_date,
            due_date: self.due_date,
        })
    }

    async fn insert(&self, draft: NewMaintenanceTask) -> AppResult<Insertion<i32>> {
        Ok(self.tasks.insert_if_absent(&draft).await?.map(|t| t.id))
    }
}
