//! Maintenance plans, tasks and requests

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use super::task::{ChecklistEntry, ChecklistRecord, TaskStatus};
use crate::error::{AppError, AppResult};

/// Periodic maintenance plan for an equipment type
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct MaintenancePlan {
    pub id: i32,
    pub name: String,
    pub equipment_type_id: i32,
    /// 1 = daily care, 2 = first level, 3 = second level
    pub level: i16,
    pub cycle_days: i32,
    /// Tolerance after the scheduled date before the task is late
    pub flexible_days: i32,
    pub work_hours: Option<f64>,
}

impl MaintenancePlan {
    pub fn due_date(&self, scheduled_date: NaiveDate) -> AppResult<NaiveDate> {
        scheduled_date
            .checked_add_signed(Duration::days(i64::from(self.flexible_days.max(0))))
            .ok_or_else(|| {
                AppError::Validation(format!("Date {} is out of range for plan {}", scheduled_date, self.id))
            })
    }

    /// Inclusive date range in which an existing task for the same
    /// equipment makes a new one redundant.
    pub fn window(&self, base_date: NaiveDate) -> AppResult<(NaiveDate, NaiveDate)> {
        Ok((base_date, self.due_date(base_date)?))
    }
}

/// Maintenance work scheduled on one piece of equipment
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct MaintenanceTask {
    pub id: i32,
    pub plan_id: i32,
    pub equipment_id: i32,
    pub assigned_to: i32,
    pub scheduled_date: NaiveDate,
    pub due_date: NaiveDate,
    pub status: TaskStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub actual_hours: Option<f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub remark: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl MaintenanceTask {
    /// Maintenance is late only once the flexible window has elapsed.
    pub fn is_overdue_on(&self, today: NaiveDate) -> bool {
        self.status.is_open() && self.due_date < today
    }
}

/// Task to insert unless the equipment's window is already covered
#[derive(Debug, Clone)]
pub struct NewMaintenanceTask {
    pub plan_id: i32,
    pub equipment_id: i32,
    pub assigned_to: i32,
    pub scheduled_date: NaiveDate,
    pub due_date: NaiveDate,
}

/// Task with its recorded results
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MaintenanceTaskDetails {
    #[serde(flatten)]
    pub task: MaintenanceTask,
    pub records: Vec<ChecklistRecord>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct StartMaintenance {
    pub task_id: i32,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CompleteMaintenance {
    pub task_id: i32,
    #[validate(nested)]
    pub records: Vec<ChecklistEntry>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[validate(range(min = 0.0, max = 1000.0))]
    pub actual_hours: Option<f64>,
    #[validate(length(max = 2000))]
    pub remark: Option<String>,
}

/// Extra fields stored when a maintenance task is closed
#[derive(Debug, Clone, Default)]
pub struct MaintenanceOutcome {
    pub actual_hours: Option<f64>,
    pub remark: Option<String>,
}

/// Batch generation of maintenance tasks from a plan
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct GenerateMaintenanceTasks {
    pub plan_id: i32,
    #[validate(length(min = 1, max = 1000))]
    pub equipment_ids: Vec<i32>,
    /// Defaults to today
    pub base_date: Option<NaiveDate>,
}
