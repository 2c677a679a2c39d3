//! Repair orders and their state machine
//!
//! ```text
//! pending -> assigned -> in_progress <-> testing
//!                            |             |
//!                            +-> confirmed <+
//!                                   |
//!               reporter accepts -> audited -> closed (audit approved)
//! ```
//!
//! Rejections by the reporter or the auditor send the order back to
//! `in_progress`. Transitions are computed here without I/O; the store
//! applies them atomically together with their log entry.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::error::{AppError, AppResult};

pub const PRIORITY_HIGH: i16 = 1;
pub const PRIORITY_MEDIUM: i16 = 2;
pub const PRIORITY_LOW: i16 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RepairStatus {
    Pending,
    Assigned,
    InProgress,
    Testing,
    Confirmed,
    Audited,
    Closed,
}

text_enum!(RepairStatus {
    Pending => "pending",
    Assigned => "assigned",
    InProgress => "in_progress",
    Testing => "testing",
    Confirmed => "confirmed",
    Audited => "audited",
    Closed => "closed",
});

impl RepairStatus {
    /// Statuses shown in a technician's work list.
    pub const ACTIVE_FOR_ASSIGNEE: [RepairStatus; 3] = [
        RepairStatus::Assigned,
        RepairStatus::InProgress,
        RepairStatus::Testing,
    ];
}

/// Kind of entry in the repair log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RepairAction {
    Created,
    Assigned,
    Started,
    Updated,
    StatusChanged,
    Confirmed,
    Rejected,
    Audited,
    AuditRejected,
}

text_enum!(RepairAction {
    Created => "created",
    Assigned => "assigned",
    Started => "started",
    Updated => "updated",
    StatusChanged => "status_changed",
    Confirmed => "confirmed",
    Rejected => "rejected",
    Audited => "audited",
    AuditRejected => "audit_rejected",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct RepairOrder {
    pub id: i32,
    pub equipment_id: i32,
    pub reporter_id: i32,
    pub assigned_to: Option<i32>,
    pub fault_description: String,
    pub fault_code: Option<String>,
    pub photos: Vec<String>,
    /// 1 = high, 2 = medium, 3 = low
    pub priority: i16,
    pub status: RepairStatus,
    pub solution: Option<String>,
    pub actual_hours: Option<f64>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub audited_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Append-only audit trail entry
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct RepairLog {
    pub id: i32,
    pub order_id: i32,
    pub user_id: i32,
    pub action: RepairAction,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewRepairLog {
    pub user_id: i32,
    pub action: RepairAction,
    pub content: String,
}

impl NewRepairLog {
    fn new(user_id: i32, action: RepairAction, content: impl Into<String>) -> Self {
        Self {
            user_id,
            action,
            content: content.into(),
        }
    }
}

/// Validated order ready to be inserted
#[derive(Debug, Clone)]
pub struct NewRepairOrder {
    pub equipment_id: i32,
    pub reporter_id: i32,
    pub fault_description: String,
    pub fault_code: Option<String>,
    pub photos: Vec<String>,
    pub priority: i16,
}

/// A computed state change, applied by the store only if the order is
/// still in `from`.
#[derive(Debug, Clone, PartialEq)]
pub struct RepairTransition {
    pub from: RepairStatus,
    pub order: RepairOrder,
    pub log: NewRepairLog,
    /// Return the equipment to running unless another order is still open
    pub release_equipment: bool,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateRepairOrder {
    pub equipment_id: i32,
    #[validate(length(min = 1, max = 5000))]
    pub fault_description: String,
    #[validate(length(max = 50))]
    pub fault_code: Option<String>,
    #[serde(default)]
    pub photos: Vec<String>,
    /// 1 = high, 2 = medium (default), 3 = low
    pub priority: Option<i16>,
}

impl CreateRepairOrder {
    pub fn into_new_order(self, reporter_id: i32) -> AppResult<NewRepairOrder> {
        let priority = match self.priority {
            None | Some(0) => PRIORITY_MEDIUM,
            Some(p) if (PRIORITY_HIGH..=PRIORITY_LOW).contains(&p) => p,
            Some(p) => {
                return Err(AppError::Validation(format!(
                    "priority must be between 1 and 3, got {}",
                    p
                )))
            }
        };
        Ok(NewRepairOrder {
            equipment_id: self.equipment_id,
            reporter_id,
            fault_description: self.fault_description,
            fault_code: self.fault_code,
            photos: self.photos,
            priority,
        })
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AssignRepairOrder {
    pub technician_id: i32,
}

/// Progress report from the technician
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateRepair {
    #[validate(length(max = 5000))]
    pub solution: Option<String>,
    pub photos: Option<Vec<String>>,
    /// `testing` or `confirmed`; anything else keeps the current status
    pub next_status: Option<RepairStatus>,
    #[validate(length(max = 2000))]
    pub note: Option<String>,
}

/// Reporter's verdict on a finished repair
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct ConfirmRepair {
    pub accepted: bool,
    #[validate(length(max = 2000))]
    pub comment: Option<String>,
}

/// Auditor's verdict on an accepted repair
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct AuditRepair {
    pub approved: bool,
    #[validate(length(max = 2000))]
    pub comment: Option<String>,
    #[validate(range(min = 0.0, max = 10000.0))]
    pub actual_hours: Option<f64>,
}

/// Order with its full log
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RepairOrderDetails {
    #[serde(flatten)]
    pub order: RepairOrder,
    pub logs: Vec<RepairLog>,
}

/// Query parameters for repair order lists
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct RepairQuery {
    pub status: Option<RepairStatus>,
    pub priority: Option<i16>,
    pub equipment_id: Option<i32>,
    pub assigned_to: Option<i32>,
    /// Earliest creation date (inclusive)
    pub date_from: Option<NaiveDate>,
    /// Latest creation date (inclusive)
    pub date_to: Option<NaiveDate>,
    /// Page number (1-based)
    pub page: Option<i64>,
    /// Items per page
    pub per_page: Option<i64>,
}

fn with_comment(prefix: &str, comment: Option<&str>) -> String {
    match comment.map(str::trim).filter(|c| !c.is_empty()) {
        Some(c) => format!("{}: {}", prefix, c),
        None => prefix.to_string(),
    }
}

impl RepairOrder {
    fn guard(&self, action: &str, allowed: &[RepairStatus]) -> AppResult<()> {
        if allowed.contains(&self.status) {
            Ok(())
        } else {
            Err(AppError::InvalidState(format!(
                "Cannot {} repair order {} in status '{}'",
                action, self.id, self.status
            )))
        }
    }

    fn transition(&self, next: RepairOrder, log: NewRepairLog) -> RepairTransition {
        RepairTransition {
            from: self.status,
            order: next,
            log,
            release_equipment: false,
        }
    }

    pub fn assign(&self, technician_id: i32, actor_id: i32) -> AppResult<RepairTransition> {
        self.guard("assign", &[RepairStatus::Pending])?;
        let mut next = self.clone();
        next.assigned_to = Some(technician_id);
        next.status = RepairStatus::Assigned;
        Ok(self.transition(
            next,
            NewRepairLog::new(
                actor_id,
                RepairAction::Assigned,
                format!("Assigned to technician #{}", technician_id),
            ),
        ))
    }

    pub fn start(&self, actor_id: i32, now: DateTime<Utc>) -> AppResult<RepairTransition> {
        self.guard("start", &[RepairStatus::Assigned])?;
        let mut next = self.clone();
        next.status = RepairStatus::InProgress;
        next.started_at = Some(now);
        Ok(self.transition(
            next,
            NewRepairLog::new(actor_id, RepairAction::Started, "Repair started"),
        ))
    }

    pub fn update(
        &self,
        actor_id: i32,
        change: &UpdateRepair,
        now: DateTime<Utc>,
    ) -> AppResult<RepairTransition> {
        self.guard("update", &[RepairStatus::InProgress, RepairStatus::Testing])?;
        let mut next = self.clone();
        if let Some(solution) = &change.solution {
            next.solution = Some(solution.clone());
        }
        if let Some(photos) = &change.photos {
            next.photos = photos.clone();
        }

        let note = change.note.as_deref();
        let log = match change.next_status {
            Some(RepairStatus::Testing) if self.status == RepairStatus::InProgress => {
                next.status = RepairStatus::Testing;
                NewRepairLog::new(
                    actor_id,
                    RepairAction::StatusChanged,
                    with_comment("Repair under test", note),
                )
            }
            Some(RepairStatus::Confirmed) => {
                if next.solution.as_deref().map_or(true, |s| s.trim().is_empty()) {
                    return Err(AppError::Validation(
                        "A solution is required before the repair can be marked done".to_string(),
                    ));
                }
                next.status = RepairStatus::Confirmed;
                next.completed_at = Some(now);
                NewRepairLog::new(
                    actor_id,
                    RepairAction::StatusChanged,
                    with_comment("Repair done, awaiting reporter confirmation", note),
                )
            }
            _ => NewRepairLog::new(
                actor_id,
                RepairAction::Updated,
                with_comment("Progress updated", note),
            ),
        };
        Ok(self.transition(next, log))
    }

    pub fn confirm(
        &self,
        actor_id: i32,
        verdict: &ConfirmRepair,
        now: DateTime<Utc>,
    ) -> AppResult<RepairTransition> {
        self.guard("confirm", &[RepairStatus::Testing, RepairStatus::Confirmed])?;
        let mut next = self.clone();
        let comment = verdict.comment.as_deref();
        let log = if verdict.accepted {
            next.status = RepairStatus::Audited;
            next.confirmed_at = Some(now);
            next.completed_at.get_or_insert(now);
            NewRepairLog::new(
                actor_id,
                RepairAction::Confirmed,
                with_comment("Repair accepted by reporter", comment),
            )
        } else {
            next.status = RepairStatus::InProgress;
            next.completed_at = None;
            next.confirmed_at = None;
            NewRepairLog::new(
                actor_id,
                RepairAction::Rejected,
                with_comment("Repair rejected by reporter", comment),
            )
        };
        Ok(self.transition(next, log))
    }

    pub fn audit(
        &self,
        actor_id: i32,
        verdict: &AuditRepair,
        now: DateTime<Utc>,
    ) -> AppResult<RepairTransition> {
        self.guard("audit", &[RepairStatus::Audited])?;
        let mut next = self.clone();
        let comment = verdict.comment.as_deref();
        if verdict.approved {
            next.status = RepairStatus::Closed;
            next.audited_at = Some(now);
            if verdict.actual_hours.is_some() {
                next.actual_hours = verdict.actual_hours;
            }
            let mut transition = self.transition(
                next,
                NewRepairLog::new(
                    actor_id,
                    RepairAction::Audited,
                    with_comment("Audit approved, order closed", comment),
                ),
            );
            transition.release_equipment = true;
            Ok(transition)
        } else {
            next.status = RepairStatus::InProgress;
            next.confirmed_at = None;
            next.completed_at = None;
            Ok(self.transition(
                next,
                NewRepairLog::new(
                    actor_id,
                    RepairAction::AuditRejected,
                    with_comment("Audit rejected", comment),
                ),
            ))
        }
    }
}
