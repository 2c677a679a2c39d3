//! Batch creation of scheduled tasks
//!
//! Inspection and maintenance generation share the same loop: resolve each
//! equipment, let the workflow build a draft, insert it idempotently and
//! collect per-equipment failures instead of aborting the batch.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    error::AppResult,
    models::{equipment::Equipment, task::GenerateTasksReport},
    repository::{EquipmentRegistry, Insertion},
};

/// Workflow-specific part of task generation
#[async_trait]
pub trait TaskPlanner: Send + Sync {
    type Draft: Send;

    /// Build the task for `equipment`, or fail with the reason it cannot
    /// be scheduled.
    async fn plan(&self, equipment: &Equipment) -> AppResult<Self::Draft>;

    /// Insert unless an equivalent task exists. Returns the task id.
    async fn insert(&self, draft: Self::Draft) -> AppResult<Insertion<i32>>;
}

#[derive(Clone)]
pub struct TaskGenerator {
    equipment: Arc<dyn EquipmentRegistry>,
}

impl TaskGenerator {
    pub fn new(equipment: Arc<dyn EquipmentRegistry>) -> Self {
        Self { equipment }
    }

    /// Generate tasks for every equipment id. Existing tasks are skipped
    /// silently; failures are reported per equipment.
    pub async fn generate<P: TaskPlanner>(
        &self,
        planner: &P,
        equipment_ids: &[i32],
    ) -> GenerateTasksReport {
        let mut report = GenerateTasksReport::default();

        for &equipment_id in equipment_ids {
            match self.generate_one(planner, equipment_id).await {
                Ok(Insertion::Created(task_id)) => {
                    report.created_count += 1;
                    report.task_ids.push(task_id);
                }
                Ok(Insertion::Existing(task_id)) => {
                    tracing::debug!(equipment_id, task_id, "Task already scheduled, skipped");
                }
                Err(e) => {
                    tracing::warn!(equipment_id, error = %e, "Task generation failed for equipment");
                    report.errors.push(format!("Equipment {}: {}", equipment_id, e));
                }
            }
        }

        report
    }

    async fn generate_one<P: TaskPlanner>(
        &self,
        planner: &P,
        equipment_id: i32,
    ) -> AppResult<Insertion<i32>> {
        let equipment = self.equipment.get_by_id(equipment_id).await?;
        let draft = planner.plan(&equipment).await?;
        planner.insert(draft).await
    }
}
