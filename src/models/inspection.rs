//! Inspection templates, tasks and requests

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use super::task::{ChecklistEntry, ChecklistItem, ChecklistRecord, TaskStatus};

/// Checklist template attached to an equipment type
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct InspectionTemplate {
    pub id: i32,
    pub name: String,
    pub equipment_type_id: i32,
}

/// Daily inspection of one piece of equipment
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct InspectionTask {
    pub id: i32,
    pub equipment_id: i32,
    pub template_id: i32,
    pub assigned_to: i32,
    pub scheduled_date: NaiveDate,
    pub status: TaskStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl InspectionTask {
    /// An open inspection becomes overdue once its day has passed.
    pub fn is_overdue_on(&self, today: NaiveDate) -> bool {
        self.status.is_open() && self.scheduled_date < today
    }
}

/// Task to insert when none exists yet for `(equipment_id, scheduled_date)`
#[derive(Debug, Clone)]
pub struct NewInspectionTask {
    pub equipment_id: i32,
    pub template_id: i32,
    pub assigned_to: i32,
    pub scheduled_date: NaiveDate,
}

/// Task with its recorded results
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct InspectionTaskDetails {
    #[serde(flatten)]
    pub task: InspectionTask,
    pub records: Vec<ChecklistRecord>,
}

/// Scan request sent when an inspector starts on a machine
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct StartInspection {
    pub equipment_id: i32,
    #[validate(length(min = 1, max = 255))]
    pub qr_code: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Client clock, Unix seconds
    pub timestamp: i64,
}

/// Response to a successful scan
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StartedInspection {
    pub task_id: i32,
    pub equipment_id: i32,
    pub status: TaskStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub items: Vec<ChecklistItem>,
}

/// Completion request for an inspection
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CompleteInspection {
    pub task_id: i32,
    /// One entry per checklist item; empty only for an empty checklist
    #[validate(nested)]
    pub records: Vec<ChecklistEntry>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Batch generation of inspection tasks for one day
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct GenerateInspectionTasks {
    #[validate(length(min = 1, max = 1000))]
    pub equipment_ids: Vec<i32>,
    /// Defaults to today
    pub date: Option<NaiveDate>,
}
