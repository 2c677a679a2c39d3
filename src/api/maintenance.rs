//! Maintenance API endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;

use crate::{
    error::AppResult,
    models::{
        maintenance::{
            CompleteMaintenance, GenerateMaintenanceTasks, MaintenanceTask, MaintenanceTaskDetails,
            StartMaintenance,
        },
        page_window,
        task::{CompletionSummary, GenerateTasksReport, MyTasksQuery, TaskQuery},
    },
    AppState,
};

use super::{inspection::OverdueSweepResponse, AuthenticatedUser, MaintenanceTaskPage, PaginatedResponse};

/// Generate maintenance tasks from a plan
#[utoipa::path(
    post,
    path = "/maintenance/tasks/generate",
    tag = "maintenance",
    security(("bearer_auth" = [])),
    request_body = GenerateMaintenanceTasks,
    responses(
        (status = 200, description = "Generation report", body = GenerateTasksReport),
        (status = 403, description = "Admins and engineers only", body = crate::error::ErrorResponse),
        (status = 404, description = "Plan not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn generate_tasks(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<GenerateMaintenanceTasks>,
) -> AppResult<Json<GenerateTasksReport>> {
    let report = state.services.maintenance.generate(claims.actor(), request).await?;
    Ok(Json(report))
}

/// Start a pending maintenance task
#[utoipa::path(
    post,
    path = "/maintenance/start",
    tag = "maintenance",
    security(("bearer_auth" = [])),
    request_body = StartMaintenance,
    responses(
        (status = 200, description = "Task started", body = MaintenanceTask),
        (status = 409, description = "Task is not pending", body = crate::error::ErrorResponse)
    )
)]
pub async fn start_maintenance(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<StartMaintenance>,
) -> AppResult<Json<MaintenanceTask>> {
    let task = state.services.maintenance.start(claims.actor(), request).await?;
    Ok(Json(task))
}

/// Submit checklist results and complete a maintenance task
#[utoipa::path(
    post,
    path = "/maintenance/complete",
    tag = "maintenance",
    security(("bearer_auth" = [])),
    request_body = CompleteMaintenance,
    responses(
        (status = 200, description = "Task completed", body = CompletionSummary),
        (status = 400, description = "Checklist incomplete", body = crate::error::ErrorResponse),
        (status = 409, description = "Task already completed", body = crate::error::ErrorResponse)
    )
)]
pub async fn complete_maintenance(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CompleteMaintenance>,
) -> AppResult<Json<CompletionSummary>> {
    let summary = state.services.maintenance.complete(claims.actor(), request).await?;
    Ok(Json(summary))
}

/// List maintenance tasks
#[utoipa::path(
    get,
    path = "/maintenance/tasks",
    tag = "maintenance",
    security(("bearer_auth" = [])),
    params(TaskQuery),
    responses(
        (status = 200, description = "Maintenance tasks", body = MaintenanceTaskPage)
    )
)]
pub async fn list_tasks(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<TaskQuery>,
) -> AppResult<Json<PaginatedResponse<MaintenanceTask>>> {
    let page = query.page;
    let (per_page, _) = page_window(query.page, query.per_page, state.config.workflow.page_size_limit);
    let (tasks, total) = state.services.maintenance.list(query).await?;
    Ok(Json(PaginatedResponse::new(tasks, total, page, per_page)))
}

/// Get a maintenance task with its results
#[utoipa::path(
    get,
    path = "/maintenance/tasks/{id}",
    tag = "maintenance",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Task details", body = MaintenanceTaskDetails),
        (status = 404, description = "Task not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_task(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<MaintenanceTaskDetails>> {
    let task = state.services.maintenance.get(id).await?;
    Ok(Json(task))
}

/// Open maintenance tasks assigned to the caller
#[utoipa::path(
    get,
    path = "/maintenance/my-tasks",
    tag = "maintenance",
    security(("bearer_auth" = [])),
    params(MyTasksQuery),
    responses(
        (status = 200, description = "Caller's upcoming tasks", body = Vec<MaintenanceTask>)
    )
)]
pub async fn my_tasks(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<MyTasksQuery>,
) -> AppResult<Json<Vec<MaintenanceTask>>> {
    let tasks = state.services.maintenance.my_tasks(claims.actor(), query.date).await?;
    Ok(Json(tasks))
}

/// Mark maintenance tasks past their due date as overdue
#[utoipa::path(
    post,
    path = "/maintenance/tasks/mark-overdue",
    tag = "maintenance",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Number of tasks updated", body = OverdueSweepResponse),
        (status = 403, description = "Admins and engineers only", body = crate::error::ErrorResponse)
    )
)]
pub async fn mark_overdue(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<OverdueSweepResponse>> {
    let today = Utc::now().date_naive();
    let updated = state.services.maintenance.mark_overdue(claims.actor(), today).await?;
    Ok(Json(OverdueSweepResponse { updated }))
}
