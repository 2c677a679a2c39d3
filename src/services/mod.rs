//! Business logic services

pub mod anti_fraud;
pub mod inspection;
pub mod maintenance;
pub mod repair;
pub mod task_generator;

use std::sync::Arc;

use crate::{config::WorkflowConfig, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub inspection: inspection::InspectionService,
    pub maintenance: maintenance::MaintenanceService,
    pub repair: repair::RepairService,
}

impl Services {
    /// Create all services on top of the Postgres repository
    pub fn new(repository: Repository, workflow: &WorkflowConfig) -> Self {
        let equipment = Arc::new(repository.equipment);
        let inspection = Arc::new(repository.inspection);
        let maintenance = Arc::new(repository.maintenance);

        Self {
            inspection: inspection::InspectionService::new(
                equipment.clone(),
                inspection.clone(),
                inspection,
                workflow.replay_window_secs,
                workflow.page_size_limit,
            ),
            maintenance: maintenance::MaintenanceService::new(
                equipment.clone(),
                maintenance.clone(),
                maintenance,
                workflow.maintenance_lookahead_days,
                workflow.page_size_limit,
            ),
            repair: repair::RepairService::new(
                equipment,
                Arc::new(repository.users),
                Arc::new(repository.repairs),
                workflow.page_size_limit,
            ),
        }
    }
}
