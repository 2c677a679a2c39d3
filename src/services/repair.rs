//! Repair order workflow

use std::sync::Arc;

use chrono::Utc;
use tracing::instrument;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        equipment::EquipmentStatus,
        page_window,
        repair::{
            AuditRepair, ConfirmRepair, CreateRepairOrder, RepairLog, RepairOrder,
            RepairOrderDetails, RepairQuery, RepairTransition, UpdateRepair,
        },
        user::Actor,
    },
    repository::{EquipmentRegistry, RepairStore, UserDirectory},
};

#[derive(Clone)]
pub struct RepairService {
    equipment: Arc<dyn EquipmentRegistry>,
    users: Arc<dyn UserDirectory>,
    orders: Arc<dyn RepairStore>,
    page_size_limit: i64,
}

impl RepairService {
    pub fn new(
        equipment: Arc<dyn EquipmentRegistry>,
        users: Arc<dyn UserDirectory>,
        orders: Arc<dyn RepairStore>,
        page_size_limit: i64,
    ) -> Self {
        Self {
            equipment,
            users,
            orders,
            page_size_limit,
        }
    }

    /// Report a fault. The equipment goes under maintenance.
    #[instrument(skip(self, request), fields(equipment_id = request.equipment_id), err)]
    pub async fn create(&self, actor: Actor, request: CreateRepairOrder) -> AppResult<RepairOrder> {
        request.validate()?;
        let equipment = self.equipment.get_by_id(request.equipment_id).await?;
        if equipment.status == EquipmentStatus::Scrapped {
            return Err(AppError::InvalidState(format!(
                "Equipment {} is scrapped",
                equipment.code
            )));
        }

        let order = self.orders.create(&request.into_new_order(actor.id)?).await?;
        tracing::info!(
            order_id = order.id,
            equipment_id = order.equipment_id,
            priority = order.priority,
            "Repair order created"
        );
        Ok(order)
    }

    #[instrument(skip(self), err)]
    pub async fn assign(&self, actor: Actor, order_id: i32, technician_id: i32) -> AppResult<RepairOrder> {
        let order = self.orders.get(order_id).await?;
        let transition = order.assign(technician_id, actor.id)?;

        let technician = self.users.get_by_id(technician_id).await?;
        if !technician.is_active {
            return Err(AppError::Validation(format!(
                "User {} is not active",
                technician.username
            )));
        }

        self.apply(order_id, transition).await
    }

    #[instrument(skip(self), err)]
    pub async fn start(&self, actor: Actor, order_id: i32) -> AppResult<RepairOrder> {
        let order = self.orders.get(order_id).await?;
        let transition = order.start(actor.id, Utc::now())?;
        self.apply(order_id, transition).await
    }

    #[instrument(skip(self, change), err)]
    pub async fn update(&self, actor: Actor, order_id: i32, change: UpdateRepair) -> AppResult<RepairOrder> {
        change.validate()?;
        let order = self.orders.get(order_id).await?;
        let transition = order.update(actor.id, &change, Utc::now())?;
        self.apply(order_id, transition).await
    }

    /// Reporter accepts or rejects the repair.
    #[instrument(skip(self, verdict), fields(accepted = verdict.accepted), err)]
    pub async fn confirm(&self, actor: Actor, order_id: i32, verdict: ConfirmRepair) -> AppResult<RepairOrder> {
        verdict.validate()?;
        let order = self.orders.get(order_id).await?;
        let transition = order.confirm(actor.id, &verdict, Utc::now())?;
        self.apply(order_id, transition).await
    }

    /// Final sign-off by an admin, engineer or supervisor.
    #[instrument(skip(self, verdict), fields(approved = verdict.approved), err)]
    pub async fn audit(&self, actor: Actor, order_id: i32, verdict: AuditRepair) -> AppResult<RepairOrder> {
        actor.require_auditor()?;
        verdict.validate()?;
        let order = self.orders.get(order_id).await?;
        let transition = order.audit(actor.id, &verdict, Utc::now())?;
        self.apply(order_id, transition).await
    }

    pub async fn get(&self, id: i32) -> AppResult<RepairOrderDetails> {
        let order = self.orders.get(id).await?;
        let logs = self.orders.logs(id).await?;
        Ok(RepairOrderDetails { order, logs })
    }

    pub async fn list(&self, mut query: RepairQuery) -> AppResult<(Vec<RepairOrder>, i64)> {
        if let Some(priority) = query.priority {
            if !(1..=3).contains(&priority) {
                return Err(AppError::Validation(format!("Invalid priority filter {}", priority)));
            }
        }
        let (per_page, _) = page_window(query.page, query.per_page, self.page_size_limit);
        query.per_page = Some(per_page);
        self.orders.list(&query).await
    }

    /// Orders the caller is working on.
    pub async fn my_tasks(&self, actor: Actor) -> AppResult<Vec<RepairOrder>> {
        self.orders.assigned_active(actor.id).await
    }

    pub async fn logs(&self, order_id: i32) -> AppResult<Vec<RepairLog>> {
        self.orders.get(order_id).await?;
        self.orders.logs(order_id).await
    }

    async fn apply(&self, order_id: i32, transition: RepairTransition) -> AppResult<RepairOrder> {
        let from = transition.from;
        let updated = self.orders.apply(order_id, &transition).await?;
        tracing::info!(
            order_id,
            from = %from,
            to = %updated.status,
            action = %transition.log.action,
            "Repair order transition"
        );
        Ok(updated)
    }
}
