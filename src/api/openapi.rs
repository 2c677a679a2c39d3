//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{health, inspection, maintenance, repair};
use crate::models;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "EMS Work-Order API",
        version = "1.0.0",
        description = "Inspection, maintenance and repair work orders for plant equipment"
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Inspection
        inspection::start_inspection,
        inspection::complete_inspection,
        inspection::generate_tasks,
        inspection::list_tasks,
        inspection::get_task,
        inspection::my_tasks,
        inspection::mark_overdue,
        // Maintenance
        maintenance::generate_tasks,
        maintenance::start_maintenance,
        maintenance::complete_maintenance,
        maintenance::list_tasks,
        maintenance::get_task,
        maintenance::my_tasks,
        maintenance::mark_overdue,
        // Repair
        repair::create_order,
        repair::list_orders,
        repair::get_order,
        repair::get_logs,
        repair::assign_order,
        repair::start_order,
        repair::update_order,
        repair::confirm_order,
        repair::audit_order,
        repair::my_tasks,
    ),
    components(
        schemas(
            // Shared
            models::task::TaskStatus,
            models::task::CheckResult,
            models::task::ChecklistItem,
            models::task::ChecklistRecord,
            models::task::ChecklistEntry,
            models::task::CompletionSummary,
            models::task::GenerateTasksReport,
            // Inspection
            models::inspection::InspectionTask,
            models::inspection::InspectionTaskDetails,
            models::inspection::StartInspection,
            models::inspection::StartedInspection,
            models::inspection::CompleteInspection,
            models::inspection::GenerateInspectionTasks,
            inspection::OverdueSweepResponse,
            crate::api::InspectionTaskPage,
            // Maintenance
            models::maintenance::MaintenanceTask,
            models::maintenance::MaintenanceTaskDetails,
            models::maintenance::StartMaintenance,
            models::maintenance::CompleteMaintenance,
            models::maintenance::GenerateMaintenanceTasks,
            crate::api::MaintenanceTaskPage,
            // Repair
            models::repair::RepairStatus,
            models::repair::RepairAction,
            models::repair::RepairOrder,
            models::repair::RepairLog,
            models::repair::RepairOrderDetails,
            models::repair::CreateRepairOrder,
            models::repair::AssignRepairOrder,
            models::repair::UpdateRepair,
            models::repair::ConfirmRepair,
            models::repair::AuditRepair,
            crate::api::RepairOrderPage,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "inspection", description = "Daily equipment inspections"),
        (name = "maintenance", description = "Periodic maintenance tasks"),
        (name = "repair", description = "Repair order lifecycle")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
