//! Daily inspection workflow

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tracing::instrument;
use validator::Validate;

use super::{
    anti_fraud::ScanVerifier,
    task_generator::{TaskGenerator, TaskPlanner},
};
use crate::{
    error::{AppError, AppResult},
    models::{
        equipment::Equipment,
        inspection::{
            CompleteInspection, GenerateInspectionTasks, InspectionTask, InspectionTaskDetails,
            NewInspectionTask, StartInspection, StartedInspection,
        },
        page_window,
        task::{
            validate_entries, CompletionSummary, GenerateTasksReport, Geolocation, TaskCompletion,
            TaskQuery, TaskStatus,
        },
        user::Actor,
    },
    repository::{EquipmentRegistry, InspectionCatalog, InspectionTaskStore, Insertion},
};

#[derive(Clone)]
pub struct InspectionService {
    catalog: Arc<dyn InspectionCatalog>,
    tasks: Arc<dyn InspectionTaskStore>,
    verifier: ScanVerifier,
    generator: TaskGenerator,
    page_size_limit: i64,
}

impl InspectionService {
    pub fn new(
        equipment: Arc<dyn EquipmentRegistry>,
        catalog: Arc<dyn InspectionCatalog>,
        tasks: Arc<dyn InspectionTaskStore>,
        replay_window_secs: i64,
        page_size_limit: i64,
    ) -> Self {
        Self {
            catalog,
            tasks,
            verifier: ScanVerifier::new(equipment.clone(), replay_window_secs),
            generator: TaskGenerator::new(equipment),
            page_size_limit,
        }
    }

    /// Start (or resume) today's inspection of an equipment after a scan.
    ///
    /// A task already completed today is returned as-is without checking
    /// the scan again.
    #[instrument(skip(self, request), fields(equipment_id = request.equipment_id), err)]
    pub async fn start(&self, actor: Actor, request: StartInspection) -> AppResult<StartedInspection> {
        request.validate()?;
        let location = Geolocation::new(request.latitude, request.longitude)?;
        let now = Utc::now();
        let today = now.date_naive();

        let existing = self.tasks.find_for_date(request.equipment_id, today).await?;
        if let Some(task) = existing.as_ref().filter(|t| t.status == TaskStatus::Completed) {
            return self.started_view(task.clone()).await;
        }

        let equipment = self
            .verifier
            .verify(request.equipment_id, &request.qr_code, request.timestamp, now)
            .await?;

        let task = match existing {
            Some(task) => task,
            None => {
                let template_id = first_template(self.catalog.as_ref(), &equipment).await?;
                self.tasks
                    .insert_if_absent(&NewInspectionTask {
                        equipment_id: equipment.id,
                        template_id,
                        assigned_to: actor.id,
                        scheduled_date: today,
                    })
                    .await?
                    .into_inner()
            }
        };

        let task = match task.status {
            TaskStatus::Pending => match self.tasks.start(task.id, now, location).await {
                Ok(started) => {
                    tracing::info!(task_id = started.id, user_id = actor.id, "Inspection started");
                    started
                }
                // A concurrent scan of the same label started it first.
                Err(AppError::InvalidState(_)) => {
                    let current = self.tasks.get(task.id).await?;
                    if !matches!(current.status, TaskStatus::InProgress | TaskStatus::Completed) {
                        return Err(AppError::InvalidState(format!(
                            "Inspection task {} is {}",
                            current.id, current.status
                        )));
                    }
                    tracing::info!(task_id = current.id, user_id = actor.id, "Inspection already started");
                    current
                }
                Err(e) => return Err(e),
            },
            TaskStatus::InProgress | TaskStatus::Completed => task,
            TaskStatus::Overdue => {
                return Err(AppError::InvalidState(format!(
                    "Inspection task {} is overdue",
                    task.id
                )))
            }
        };

        self.started_view(task).await
    }

    /// Submit the checklist results and close the task.
    #[instrument(skip(self, request), fields(task_id = request.task_id), err)]
    pub async fn complete(&self, actor: Actor, request: CompleteInspection) -> AppResult<CompletionSummary> {
        request.validate()?;
        let location = Geolocation::new(request.latitude, request.longitude)?;

        let task = self.tasks.get(request.task_id).await?;
        if !task.status.can_complete() {
            return Err(AppError::InvalidState(format!(
                "Inspection task {} is already {}",
                task.id, task.status
            )));
        }

        let items = self.catalog.template_items(task.template_id).await?;
        validate_entries(&request.records, &items)?;

        let completion = TaskCompletion {
            task_id: task.id,
            completed_at: Utc::now(),
            location,
            entries: request.records,
        };
        let completed = self.tasks.complete(&completion).await?;

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
            "Inspection completed"
        );
        Ok(summary)
    }

    /// Create one task per equipment for `request.date`, assigned to the
    /// caller.
    #[instrument(skip(self, request), err)]
    pub async fn generate(&self, actor: Actor, request: GenerateInspectionTasks) -> AppResult<GenerateTasksReport> {
        actor.require_scheduler()?;
        request.validate()?;

        let planner = InspectionPlanner {
            catalog: self.catalog.clone(),
            tasks: self.tasks.clone(),
            assignee: actor.id,
            date: request.date.unwrap_or_else(|| Utc::now().date_naive()),
        };
        let report = self.generator.generate(&planner, &request.equipment_ids).await;
        tracing::info!(
            created = report.created_count,
            failed = report.errors.len(),
            "Inspection tasks generated"
        );
        Ok(report)
    }

    pub async fn get(&self, id: i32) -> AppResult<InspectionTaskDetails> {
        let task = self.tasks.get(id).await?;
        let records = self.tasks.records(id).await?;
        Ok(InspectionTaskDetails { task, records })
    }

    pub async fn list(&self, mut query: TaskQuery) -> AppResult<(Vec<InspectionTask>, i64)> {
        let (per_page, _) = page_window(query.page, query.per_page, self.page_size_limit);
        query.per_page = Some(per_page);
        self.tasks.list(&query).await
    }

    /// Tasks assigned to the caller for `date` (today by default).
    pub async fn my_tasks(&self, actor: Actor, date: Option<NaiveDate>) -> AppResult<Vec<InspectionTask>> {
        let date = date.unwrap_or_else(|| Utc::now().date_naive());
        self.tasks.assigned_on(actor.id, date).await
    }

    /// Flag open inspections from previous days as overdue.
    #[instrument(skip(self), err)]
    pub async fn mark_overdue(&self, actor: Actor, today: NaiveDate) -> AppResult<u64> {
        actor.require_scheduler()?;
        let count = self.tasks.mark_overdue(today).await?;
        if count > 0 {
            tracing::info!(count, "Inspection tasks marked overdue");
        }
        Ok(count)
    }

    async fn started_view(&self, task: InspectionTask) -> AppResult<StartedInspection> {
        let items = self.catalog.template_items(task.template_id).await?;
        Ok(StartedInspection {
            task_id: task.id,
            equipment_id: task.equipment_id,
            status: task.status,
            started_at: task.started_at,
            items,
        })
    }
}

async fn first_template(catalog: &dyn InspectionCatalog, equipment: &Equipment) -> AppResult<i32> {
    catalog
        .templates_for_type(equipment.type_id)
        .await?
        .first()
        .map(|t| t.id)
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "No inspection template for equipment type {}",
                equipment.type_id
            ))
        })
}

struct InspectionPlanner {
    catalog: Arc<dyn InspectionCatalog>,
    tasks: Arc<dyn InspectionTaskStore>,
    assignee: i32,
    date: NaiveDate,
}

#[async_trait]
impl TaskPlanner for InspectionPlanner {
    type Draft = NewInspectionTask;

    async fn plan(&self, equipment: &Equipment) -> AppResult<NewInspectionTask> {
        let template_id = first_template(self.catalog.as_ref(), equipment).await?;
        Ok(NewInspectionTask {
            equipment_id: equipment.id,
            template_id,
            assigned_to: self.assignee,
            scheduled_date: self.date,
        })
    }

    async fn insert(&self, draft: NewInspectionTask) -> AppResult<Insertion<i32>> {
        Ok(self.tasks.insert_if_absent(&draft).await?.map(|t| t.id))
    }
}
