//! Types shared by inspection and maintenance tasks

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::error::{AppError, AppResult};

/// Lifecycle of an inspection or maintenance task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Overdue,
}

text_enum!(TaskStatus {
    Pending => "pending",
    InProgress => "in_progress",
    Completed => "completed",
    Overdue => "overdue",
});

impl TaskStatus {
    /// Overdue tasks may still be completed late.
    pub fn can_complete(self) -> bool {
        matches!(self, TaskStatus::Pending | TaskStatus::InProgress | TaskStatus::Overdue)
    }

    /// Statuses the overdue sweep moves to `Overdue`.
    pub fn is_open(self) -> bool {
        matches!(self, TaskStatus::Pending | TaskStatus::InProgress)
    }
}

/// Outcome of a single checklist item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum CheckResult {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "NG")]
    Ng,
}

text_enum!(CheckResult {
    Ok => "OK",
    Ng => "NG",
});

/// Item of an inspection template or a maintenance plan
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct ChecklistItem {
    pub id: i32,
    pub name: String,
    pub method: Option<String>,
    pub criteria: Option<String>,
    pub sequence_order: i32,
}

/// Stored result of one checklist item for a task
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct ChecklistRecord {
    pub id: i32,
    pub task_id: i32,
    pub item_id: i32,
    pub result: CheckResult,
    pub remark: Option<String>,
    pub photo_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One checklist result submitted on completion
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ChecklistEntry {
    pub item_id: i32,
    pub result: CheckResult,
    #[validate(length(max = 2000))]
    pub remark: Option<String>,
    #[validate(length(max = 500))]
    pub photo_url: Option<String>,
}

/// Optional position reported by the mobile client
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Geolocation {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl Geolocation {
    pub fn new(latitude: Option<f64>, longitude: Option<f64>) -> AppResult<Self> {
        if latitude.is_some_and(|lat| !(-90.0..=90.0).contains(&lat)) {
            return Err(AppError::Validation("latitude must be within [-90, 90]".to_string()));
        }
        if longitude.is_some_and(|lon| !(-180.0..=180.0).contains(&lon)) {
            return Err(AppError::Validation("longitude must be within [-180, 180]".to_string()));
        }
        Ok(Self { latitude, longitude })
    }
}

/// Everything a store needs to close a task and persist its results
#[derive(Debug, Clone)]
pub struct TaskCompletion {
    pub task_id: i32,
    pub completed_at: DateTime<Utc>,
    pub location: Geolocation,
    pub entries: Vec<ChecklistEntry>,
}

/// Check that `entries` answers every checklist item exactly once.
pub fn validate_entries(entries: &[ChecklistEntry], items: &[ChecklistItem]) -> AppResult<()> {
    let expected: HashSet<i32> = items.iter().map(|i| i.id).collect();
    let mut seen = HashSet::with_capacity(entries.len());

    for entry in entries {
        if !expected.contains(&entry.item_id) {
            return Err(AppError::Validation(format!(
                "Item {} is not part of this checklist",
                entry.item_id
            )));
        }
        if !seen.insert(entry.item_id) {
            return Err(AppError::Validation(format!(
                "Item {} was submitted more than once",
                entry.item_id
            )));
        }
    }

    if seen.len() != expected.len() {
        let mut missing: Vec<i32> = expected.difference(&seen).copied().collect();
        missing.sort_unstable();
        return Err(AppError::Validation(format!(
            "Missing results for items {:?}",
            missing
        )));
    }
    Ok(())
}

/// Counts returned when a task is completed
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CompletionSummary {
    pub task_id: i32,
    pub completed_at: DateTime<Utc>,
    pub total_count: usize,
    pub ok_count: usize,
    pub ng_count: usize,
    /// Items that failed; they are candidates for a follow-up repair order
    pub ng_item_ids: Vec<i32>,
}

impl CompletionSummary {
    pub fn new(
        task_id: i32,
        completed_at: DateTime<Utc>,
        total_count: usize,
        entries: &[ChecklistEntry],
    ) -> Self {
        let ng_item_ids: Vec<i32> = entries
            .iter()
            .filter(|e| e.result == CheckResult::Ng)
            .map(|e| e.item_id)
            .collect();
        Self {
            task_id,
            completed_at,
            total_count,
            ok_count: entries.len() - ng_item_ids.len(),
            ng_count: ng_item_ids.len(),
            ng_item_ids,
        }
    }
}

/// Result of a batch task generation
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct GenerateTasksReport {
    pub created_count: usize,
    pub task_ids: Vec<i32>,
    /// Per-equipment failures; they never abort the batch
    pub errors: Vec<String>,
}

/// Query for the caller's own tasks
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MyTasksQuery {
    /// Defaults to today
    pub date: Option<NaiveDate>,
}

/// Query parameters for task lists
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct TaskQuery {
    pub assigned_to: Option<i32>,
    pub equipment_id: Option<i32>,
    pub status: Option<TaskStatus>,
    /// Earliest scheduled date (inclusive)
    pub date_from: Option<NaiveDate>,
    /// Latest scheduled date (inclusive)
    pub date_to: Option<NaiveDate>,
    /// Page number (1-based)
    pub page: Option<i64>,
    /// Items per page
    pub per_page: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(n: i32) -> Vec<ChecklistItem> {
        (1..=n)
            .map(|id| ChecklistItem {
                id,
                name: format!("item {}", id),
                method: None,
                criteria: None,
                sequence_order: id,
            })
            .collect()
    }

    fn entry(item_id: i32, result: CheckResult) -> ChecklistEntry {
        ChecklistEntry {
            item_id,
            result,
            remark: None,
            photo_url: None,
        }
    }

    #[test]
    fn summary_counts_ng_items() {
        let entries = vec![
            entry(1, CheckResult::Ok),
            entry(2, CheckResult::Ng),
            entry(3, CheckResult::Ok),
            entry(4, CheckResult::Ng),
            entry(5, CheckResult::Ok),
        ];
        validate_entries(&entries, &items(5)).unwrap();

        let summary = CompletionSummary::new(9, Utc::now(), 5, &entries);
        assert_eq!(summary.total_count, 5);
        assert_eq!(summary.ok_count, 3);
        assert_eq!(summary.ng_count, 2);
        assert_eq!(summary.ng_item_ids, vec![2, 4]);
    }

    #[test]
    fn entries_must_cover_checklist_exactly_once() {
        let checklist = items(3);
        let partial = vec![entry(1, CheckResult::Ok), entry(2, CheckResult::Ok)];
        assert!(matches!(validate_entries(&partial, &checklist), Err(AppError::Validation(_))));

        let duplicated = vec![
            entry(1, CheckResult::Ok),
            entry(1, CheckResult::Ng),
            entry(2, CheckResult::Ok),
        ];
        assert!(matches!(validate_entries(&duplicated, &checklist), Err(AppError::Validation(_))));

        let foreign = vec![
            entry(1, CheckResult::Ok),
            entry(2, CheckResult::Ok),
            entry(42, CheckResult::Ok),
        ];
        assert!(matches!(validate_entries(&foreign, &checklist), Err(AppError::Validation(_))));

        assert!(matches!(validate_entries(&[], &checklist), Err(AppError::Validation(_))));
    }

    #[test]
    fn empty_checklist_accepts_no_entries() {
        validate_entries(&[], &[]).unwrap();
        assert!(validate_entries(&[entry(1, CheckResult::Ok)], &[]).is_err());
    }

    #[test]
    fn check_result_uses_upper_case_slugs() {
        assert_eq!(serde_json::to_string(&CheckResult::Ng).unwrap(), "\"NG\"");
        assert_eq!("OK".parse::<CheckResult>().unwrap(), CheckResult::Ok);
        assert_eq!(TaskStatus::InProgress.as_str(), "in_progress");
    }

    #[test]
    fn geolocation_rejects_out_of_range() {
        assert!(Geolocation::new(Some(31.2), Some(121.5)).is_ok());
        assert!(Geolocation::new(Some(91.0), None).is_err());
        assert!(Geolocation::new(None, Some(-181.0)).is_err());
    }
}
