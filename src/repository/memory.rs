//! In-memory implementation of every store, used by the service tests

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use super::{
    EquipmentRegistry, InspectionCatalog, InspectionTaskStore, Insertion, MaintenanceCatalog,
    MaintenanceTaskStore, RepairStore, UserDirectory,
};
use crate::{
    error::{AppError, AppResult},
    models::{
        equipment::{Equipment, EquipmentStatus},
        inspection::{InspectionTask, InspectionTemplate, NewInspectionTask},
        maintenance::{MaintenanceOutcome, MaintenancePlan, MaintenanceTask, NewMaintenanceTask},
        page_window,
        repair::{
            NewRepairLog, NewRepairOrder, RepairAction, RepairLog, RepairOrder, RepairQuery,
            RepairStatus, RepairTransition,
        },
        task::{ChecklistItem, ChecklistRecord, Geolocation, TaskCompletion, TaskQuery, TaskStatus},
        user::{User, UserRole},
    },
};

#[derive(Default)]
struct State {
    next_id: i32,
    equipment: BTreeMap<i32, Equipment>,
    users: BTreeMap<i32, User>,
    templates: Vec<(InspectionTemplate, Vec<ChecklistItem>)>,
    plans: Vec<(MaintenancePlan, Vec<ChecklistItem>)>,
    inspection_tasks: BTreeMap<i32, InspectionTask>,
    inspection_records: Vec<ChecklistRecord>,
    maintenance_tasks: BTreeMap<i32, MaintenanceTask>,
    maintenance_records: Vec<ChecklistRecord>,
    repairs: BTreeMap<i32, RepairOrder>,
    repair_logs: Vec<RepairLog>,
}

impl State {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn checklist(&mut self, count: usize) -> Vec<ChecklistItem> {
        (0..count)
            .map(|n| ChecklistItem {
                id: self.next_id(),
                name: format!("Check {}", n + 1),
                method: Some("Visual".to_string()),
                criteria: None,
                sequence_order: n as i32 + 1,
            })
            .collect()
    }

    fn push_records(
        &mut self,
        maintenance: bool,
        task_id: i32,
        completion: &TaskCompletion,
    ) {
        let records: Vec<ChecklistRecord> = completion
            .entries
            .iter()
            .map(|entry| ChecklistRecord {
                id: self.next_id(),
                task_id,
                item_id: entry.item_id,
                result: entry.result,
                remark: entry.remark.clone(),
                photo_url: entry.photo_url.clone(),
                created_at: completion.completed_at,
            })
            .collect();
        if maintenance {
            self.maintenance_records.extend(records);
        } else {
            self.inspection_records.extend(records);
        }
    }

    fn push_log(&mut self, order_id: i32, log: &NewRepairLog) {
        let id = self.next_id();
        self.repair_logs.push(RepairLog {
            id,
            order_id,
            user_id: log.user_id,
            action: log.action,
            content: log.content.clone(),
            created_at: Utc::now(),
        });
    }
}

/// Thread-safe store backing all repository traits with plain collections
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn add_user(&self, role: UserRole) -> i32 {
        let mut state = self.lock();
        let id = state.next_id();
        state.users.insert(
            id,
            User {
                id,
                username: format!("user{}", id),
                name: format!("User {}", id),
                role,
                is_active: true,
                created_at: Utc::now(),
            },
        );
        id
    }

    pub fn add_equipment(&self, code: &str, type_id: i32) -> Equipment {
        let mut state = self.lock();
        let id = state.next_id();
        let equipment = Equipment {
            id,
            code: code.to_string(),
            name: format!("Machine {}", code),
            type_id,
            workshop_id: 1,
            qr_code: Equipment::default_qr_code(code),
            status: EquipmentStatus::Running,
            dedicated_maintainer_id: None,
            created_at: Utc::now(),
        };
        state.equipment.insert(id, equipment.clone());
        equipment
    }

    pub fn set_dedicated_maintainer(&self, equipment_id: i32, user_id: i32) {
        if let Some(e) = self.lock().equipment.get_mut(&equipment_id) {
            e.dedicated_maintainer_id = Some(user_id);
        }
    }

    pub fn equipment_status(&self, equipment_id: i32) -> Option<EquipmentStatus> {
        self.lock().equipment.get(&equipment_id).map(|e| e.status)
    }

    /// Template with `item_count` items for an equipment type.
    pub fn add_inspection_template(&self, equipment_type_id: i32, item_count: usize) -> (InspectionTemplate, Vec<ChecklistItem>) {
        let mut state = self.lock();
        let template = InspectionTemplate {
            id: state.next_id(),
            name: format!("Daily check type {}", equipment_type_id),
            equipment_type_id,
        };
        let items = state.checklist(item_count);
        state.templates.push((template.clone(), items.clone()));
        (template, items)
    }

    pub fn add_maintenance_plan(&self, equipment_type_id: i32, flexible_days: i32, item_count: usize) -> (MaintenancePlan, Vec<ChecklistItem>) {
        let mut state = self.lock();
        let plan = MaintenancePlan {
            id: state.next_id(),
            name: format!("Level 1 type {}", equipment_type_id),
            equipment_type_id,
            level: 1,
            cycle_days: 30,
            flexible_days,
            work_hours: Some(2.0),
        };
        let items = state.checklist(item_count);
        state.plans.push((plan.clone(), items.clone()));
        (plan, items)
    }

    pub fn inspection_record_count(&self, task_id: i32) -> usize {
        self.lock().inspection_records.iter().filter(|r| r.task_id == task_id).count()
    }

    pub fn maintenance_task_count(&self) -> usize {
        self.lock().maintenance_tasks.len()
    }

    pub fn repair_log_count(&self, order_id: i32) -> usize {
        self.lock().repair_logs.iter().filter(|l| l.order_id == order_id).count()
    }
}

fn paginate<T>(rows: Vec<T>, page: Option<i64>, per_page: Option<i64>) -> (Vec<T>, i64) {
    let total = rows.len() as i64;
    let (limit, offset) = page_window(page, per_page, i64::MAX);
    let rows = rows
        .into_iter()
        .skip(offset as usize)
        .take(limit as usize)
        .collect();
    (rows, total)
}

fn task_matches(
    query: &TaskQuery,
    assigned_to: i32,
    equipment_id: i32,
    status: TaskStatus,
    scheduled_date: NaiveDate,
) -> bool {
    query.assigned_to.map_or(true, |v| v == assigned_to)
        && query.equipment_id.map_or(true, |v| v == equipment_id)
        && query.status.map_or(true, |v| v == status)
        && query.date_from.map_or(true, |v| scheduled_date >= v)
        && query.date_to.map_or(true, |v| scheduled_date <= v)
}

#[async_trait]
impl EquipmentRegistry for InMemoryStore {
    async fn get_by_id(&self, id: i32) -> AppResult<Equipment> {
        self.lock()
            .equipment
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Equipment {} not found", id)))
    }

    async fn get_by_qr_code(&self, qr_code: &str) -> AppResult<Option<Equipment>> {
        Ok(self
            .lock()
            .equipment
            .values()
            .find(|e| e.qr_code == qr_code)
            .cloned())
    }
}

#[async_trait]
impl UserDirectory for InMemoryStore {
    async fn get_by_id(&self, id: i32) -> AppResult<User> {
        self.lock()
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }
}

#[async_trait]
impl InspectionCatalog for InMemoryStore {
    async fn templates_for_type(&self, equipment_type_id: i32) -> AppResult<Vec<InspectionTemplate>> {
        Ok(self
            .lock()
            .templates
            .iter()
            .filter(|(t, _)| t.equipment_type_id == equipment_type_id)
            .map(|(t, _)| t.clone())
            .collect())
    }

    async fn template_items(&self, template_id: i32) -> AppResult<Vec<ChecklistItem>> {
        Ok(self
            .lock()
            .templates
            .iter()
            .find(|(t, _)| t.id == template_id)
            .map(|(_, items)| items.clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl InspectionTaskStore for InMemoryStore {
    async fn get(&self, id: i32) -> AppResult<InspectionTask> {
        self.lock()
            .inspection_tasks
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Inspection task {} not found", id)))
    }

    async fn find_for_date(&self, equipment_id: i32, date: NaiveDate) -> AppResult<Option<InspectionTask>> {
        Ok(self
            .lock()
            .inspection_tasks
            .values()
            .find(|t| t.equipment_id == equipment_id && t.scheduled_date == date)
            .cloned())
    }

    async fn insert_if_absent(&self, task: &NewInspectionTask) -> AppResult<Insertion<InspectionTask>> {
        let mut state = self.lock();
        if let Some(existing) = state
            .inspection_tasks
            .values()
            .find(|t| t.equipment_id == task.equipment_id && t.scheduled_date == task.scheduled_date)
        {
            return Ok(Insertion::Existing(existing.clone()));
        }
        let id = state.next_id();
        let created = InspectionTask {
            id,
            equipment_id: task.equipment_id,
            template_id: task.template_id,
            assigned_to: task.assigned_to,
            scheduled_date: task.scheduled_date,
            status: TaskStatus::Pending,
            started_at: None,
            completed_at: None,
            latitude: None,
            longitude: None,
            created_at: Utc::now(),
        };
        state.inspection_tasks.insert(id, created.clone());
        Ok(Insertion::Created(created))
    }

    async fn start(&self, id: i32, started_at: DateTime<Utc>, location: Geolocation) -> AppResult<InspectionTask> {
        let mut state = self.lock();
        match state.inspection_tasks.get_mut(&id) {
            Some(task) if task.status == TaskStatus::Pending => {
                task.status = TaskStatus::InProgress;
                task.started_at = Some(started_at);
                task.latitude = location.latitude;
                task.longitude = location.longitude;
                Ok(task.clone())
            }
            _ => Err(AppError::InvalidState(format!("Inspection task {} is no longer pending", id))),
        }
    }

    async fn complete(&self, completion: &TaskCompletion) -> AppResult<InspectionTask> {
        let mut state = self.lock();
        let task = match state.inspection_tasks.get_mut(&completion.task_id) {
            Some(task) if task.status.can_complete() => {
                task.status = TaskStatus::Completed;
                task.completed_at = Some(completion.completed_at);
                task.latitude = completion.location.latitude.or(task.latitude);
                task.longitude = completion.location.longitude.or(task.longitude);
                task.clone()
            }
            _ => {
                return Err(AppError::InvalidState(format!(
                    "Inspection task {} can no longer be completed",
                    completion.task_id
                )))
            }
        };
        state.push_records(false, task.id, completion);
        Ok(task)
    }

    async fn records(&self, task_id: i32) -> AppResult<Vec<ChecklistRecord>> {
        Ok(self
            .lock()
            .inspection_records
            .iter()
            .filter(|r| r.task_id == task_id)
            .cloned()
            .collect())
    }

    async fn list(&self, query: &TaskQuery) -> AppResult<(Vec<InspectionTask>, i64)> {
        let mut rows: Vec<InspectionTask> = self
            .lock()
            .inspection_tasks
            .values()
            .filter(|t| task_matches(query, t.assigned_to, t.equipment_id, t.status, t.scheduled_date))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.scheduled_date.cmp(&a.scheduled_date).then(b.id.cmp(&a.id)));
        Ok(paginate(rows, query.page, query.per_page))
    }

    async fn assigned_on(&self, user_id: i32, date: NaiveDate) -> AppResult<Vec<InspectionTask>> {
        Ok(self
            .lock()
            .inspection_tasks
            .values()
            .filter(|t| t.assigned_to == user_id && t.scheduled_date == date && t.status.is_open())
            .cloned()
            .collect())
    }

    async fn mark_overdue(&self, today: NaiveDate) -> AppResult<u64> {
        let mut count = 0;
        for task in self.lock().inspection_tasks.values_mut() {
            if task.is_overdue_on(today) {
                task.status = TaskStatus::Overdue;
                count += 1;
            }
        }
        Ok(count)
    }
}

#[async_trait]
impl MaintenanceCatalog for InMemoryStore {
    async fn get_plan(&self, id: i32) -> AppResult<MaintenancePlan> {
        self.lock()
            .plans
            .iter()
            .find(|(p, _)| p.id == id)
            .map(|(p, _)| p.clone())
            .ok_or_else(|| AppError::NotFound(format!("Maintenance plan {} not found", id)))
    }

    async fn plan_items(&self, plan_id: i32) -> AppResult<Vec<ChecklistItem>> {
        Ok(self
            .lock()
            .plans
            .iter()
            .find(|(p, _)| p.id == plan_id)
            .map(|(_, items)| items.clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl MaintenanceTaskStore for InMemoryStore {
    async fn get(&self, id: i32) -> AppResult<MaintenanceTask> {
        self.lock()
            .maintenance_tasks
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Maintenance task {} not found", id)))
    }

    async fn insert_if_absent(&self, task: &NewMaintenanceTask) -> AppResult<Insertion<MaintenanceTask>> {
        let mut state = self.lock();
        if let Some(existing) = state.maintenance_tasks.values().find(|t| {
            t.equipment_id == task.equipment_id
                && t.scheduled_date >= task.scheduled_date
                && t.scheduled_date <= task.due_date
        }) {
            return Ok(Insertion::Existing(existing.clone()));
        }
        let id = state.next_id();
        let created = MaintenanceTask {
            id,
            plan_id: task.plan_id,
            equipment_id: task.equipment_id,
            assigned_to: task.assigned_to,
            scheduled_date: task.scheduled_date,
            due_date: task.due_date,
            status: TaskStatus::Pending,
            started_at: None,
            completed_at: None,
            actual_hours: None,
            latitude: None,
            longitude: None,
            remark: None,
            created_at: Utc::now(),
        };
        state.maintenance_tasks.insert(id, created.clone());
        Ok(Insertion::Created(created))
    }

    async fn start(&self, id: i32, started_at: DateTime<Utc>, location: Geolocation) -> AppResult<MaintenanceTask> {
        let mut state = self.lock();
        match state.maintenance_tasks.get_mut(&id) {
            Some(task) if task.status == TaskStatus::Pending => {
                task.status = TaskStatus::InProgress;
                task.started_at = Some(started_at);
                task.latitude = location.latitude;
                task.longitude = location.longitude;
                Ok(task.clone())
            }
            _ => Err(AppError::InvalidState(format!("Maintenance task {} is no longer pending", id))),
        }
    }

    async fn complete(&self, completion: &TaskCompletion, outcome: &MaintenanceOutcome) -> AppResult<MaintenanceTask> {
        let mut state = self.lock();
        let task = match state.maintenance_tasks.get_mut(&completion.task_id) {
            Some(task) if task.status.can_complete() => {
                task.status = TaskStatus::Completed;
                task.completed_at = Some(completion.completed_at);
                task.latitude = completion.location.latitude.or(task.latitude);
                task.longitude = completion.location.longitude.or(task.longitude);
                task.actual_hours = outcome.actual_hours.or(task.actual_hours);
                task.remark = outcome.remark.clone().or(task.remark.take());
                task.clone()
            }
            _ => {
                return Err(AppError::InvalidState(format!(
                    "Maintenance task {} can no longer be completed",
                    completion.task_id
                )))
            }
        };
        state.push_records(true, task.id, completion);
        Ok(task)
    }

    async fn records(&self, task_id: i32) -> AppResult<Vec<ChecklistRecord>> {
        Ok(self
            .lock()
            .maintenance_records
            .iter()
            .filter(|r| r.task_id == task_id)
            .cloned()
            .collect())
    }

    async fn list(&self, query: &TaskQuery) -> AppResult<(Vec<MaintenanceTask>, i64)> {
        let mut rows: Vec<MaintenanceTask> = self
            .lock()
            .maintenance_tasks
            .values()
            .filter(|t| task_matches(query, t.assigned_to, t.equipment_id, t.status, t.scheduled_date))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.scheduled_date.cmp(&a.scheduled_date).then(b.id.cmp(&a.id)));
        Ok(paginate(rows, query.page, query.per_page))
    }

    async fn assigned_between(
        &self,
        user_id: i32,
        from: NaiveDate,
        until: NaiveDate,
    ) -> AppResult<Vec<MaintenanceTask>> {
        let mut rows: Vec<MaintenanceTask> = self
            .lock()
            .maintenance_tasks
            .values()
            .filter(|t| {
                t.assigned_to == user_id
                    && (from..=until).contains(&t.scheduled_date)
                    && t.status.is_open()
            })
            .cloned()
            .collect();
        rows.sort_by_key(|t| (t.due_date, t.id));
        Ok(rows)
    }

    async fn mark_overdue(&self, today: NaiveDate) -> AppResult<u64> {
        let mut count = 0;
        for task in self.lock().maintenance_tasks.values_mut() {
            if task.is_overdue_on(today) {
                task.status = TaskStatus::Overdue;
                count += 1;
            }
        }
        Ok(count)
    }
}

#[async_trait]
impl RepairStore for InMemoryStore {
    async fn get(&self, id: i32) -> AppResult<RepairOrder> {
        self.lock()
            .repairs
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Repair order {} not found", id)))
    }

    async fn create(&self, order: &NewRepairOrder) -> AppResult<RepairOrder> {
        let mut state = self.lock();
        let id = state.next_id();
        let now = Utc::now();
        let created = RepairOrder {
            id,
            equipment_id: order.equipment_id,
            reporter_id: order.reporter_id,
            assigned_to: None,
            fault_description: order.fault_description.clone(),
            fault_code: order.fault_code.clone(),
            photos: order.photos.clone(),
            priority: order.priority,
            status: RepairStatus::Pending,
            solution: None,
            actual_hours: None,
            started_at: None,
            completed_at: None,
            confirmed_at: None,
            audited_at: None,
            created_at: now,
            updated_at: now,
        };
        state.repairs.insert(id, created.clone());
        if let Some(equipment) = state.equipment.get_mut(&order.equipment_id) {
            if equipment.status != EquipmentStatus::Scrapped {
                equipment.status = EquipmentStatus::Maintenance;
            }
        }
        state.push_log(
            id,
            &NewRepairLog {
                user_id: order.reporter_id,
                action: RepairAction::Created,
                content: "Repair order created".to_string(),
            },
        );
        Ok(created)
    }

    async fn apply(&self, order_id: i32, transition: &RepairTransition) -> AppResult<RepairOrder> {
        let mut state = self.lock();
        let current = state
            .repairs
            .get(&order_id)
            .ok_or_else(|| AppError::NotFound(format!("Repair order {} not found", order_id)))?;
        if current.status != transition.from {
            return Err(AppError::InvalidState(format!(
                "Repair order {} is no longer in status '{}'",
                order_id, transition.from
            )));
        }

        let mut updated = transition.order.clone();
        updated.updated_at = Utc::now();
        state.repairs.insert(order_id, updated.clone());

        if transition.release_equipment {
            let other_open = state.repairs.values().any(|o| {
                o.equipment_id == updated.equipment_id
                    && o.id != order_id
                    && o.status != RepairStatus::Closed
            });
            if let Some(equipment) = state.equipment.get_mut(&updated.equipment_id) {
                if !other_open && equipment.status == EquipmentStatus::Maintenance {
                    equipment.status = EquipmentStatus::Running;
                }
            }
        }

        state.push_log(order_id, &transition.log);
        Ok(updated)
    }

    async fn list(&self, query: &RepairQuery) -> AppResult<(Vec<RepairOrder>, i64)> {
        let mut rows: Vec<RepairOrder> = self
            .lock()
            .repairs
            .values()
            .filter(|o| {
                let created = o.created_at.date_naive();
                query.status.map_or(true, |v| v == o.status)
                    && query.priority.map_or(true, |v| v == o.priority)
                    && query.equipment_id.map_or(true, |v| v == o.equipment_id)
                    && query.assigned_to.map_or(true, |v| Some(v) == o.assigned_to)
                    && query.date_from.map_or(true, |v| created >= v)
                    && query.date_to.map_or(true, |v| created <= v)
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then(b.created_at.cmp(&a.created_at))
                .then(b.id.cmp(&a.id))
        });
        Ok(paginate(rows, query.page, query.per_page))
    }

    async fn assigned_active(&self, user_id: i32) -> AppResult<Vec<RepairOrder>> {
        Ok(self
            .lock()
            .repairs
            .values()
            .filter(|o| {
                o.assigned_to == Some(user_id)
                    && RepairStatus::ACTIVE_FOR_ASSIGNEE.contains(&o.status)
            })
            .cloned()
            .collect())
    }

    async fn logs(&self, order_id: i32) -> AppResult<Vec<RepairLog>> {
        Ok(self
            .lock()
            .repair_logs
            .iter()
            .filter(|l| l.order_id == order_id)
            .cloned()
            .collect())
    }
}
