//! Inspection API endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::{
        inspection::{
            CompleteInspection, GenerateInspectionTasks, InspectionTask, InspectionTaskDetails,
            StartInspection, StartedInspection,
        },
        page_window,
        task::{CompletionSummary, GenerateTasksReport, MyTasksQuery, TaskQuery},
    },
    AppState,
};

use super::{AuthenticatedUser, InspectionTaskPage, PaginatedResponse};

/// Number of tasks moved to overdue by a sweep
#[derive(Serialize, ToSchema)]
pub struct OverdueSweepResponse {
    pub updated: u64,
}

/// Start today's inspection after scanning the equipment label
#[utoipa::path(
    post,
    path = "/inspection/start",
    tag = "inspection",
    security(("bearer_auth" = [])),
    request_body = StartInspection,
    responses(
        (status = 200, description = "Inspection started or resumed", body = StartedInspection),
        (status = 400, description = "Label mismatch or stale timestamp", body = crate::error::ErrorResponse),
        (status = 404, description = "Equipment or template not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Task cannot be started", body = crate::error::ErrorResponse)
    )
)]
pub async fn start_inspection(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<StartInspection>,
) -> AppResult<Json<StartedInspection>> {
    let started = state.services.inspection.start(claims.actor(), request).await?;
    Ok(Json(started))
}

/// Submit checklist results and complete an inspection
#[utoipa::path(
    post,
    path = "/inspection/complete",
    tag = "inspection",
    security(("bearer_auth" = [])),
    request_body = CompleteInspection,
    responses(
        (status = 200, description = "Inspection completed", body = CompletionSummary),
        (status = 400, description = "Checklist incomplete", body = crate::error::ErrorResponse),
        (status = 409, description = "Task already completed", body = crate::error::ErrorResponse)
    )
)]
pub async fn complete_inspection(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CompleteInspection>,
) -> AppResult<Json<CompletionSummary>> {
    let summary = state.services.inspection.complete(claims.actor(), request).await?;
    Ok(Json(summary))
}

/// Generate inspection tasks for a list of equipment
#[utoipa::path(
    post,
    path = "/inspection/tasks/generate",
    tag = "inspection",
    security(("bearer_auth" = [])),
    request_body = GenerateInspectionTasks,
    responses(
        (status = 200, description = "Generation report", body = GenerateTasksReport),
        (status = 403, description = "Admins and engineers only", body = crate::error::ErrorResponse)
    )
)]
pub async fn generate_tasks(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<GenerateInspectionTasks>,
) -> AppResult<Json<GenerateTasksReport>> {
    let report = state.services.inspection.generate(claims.actor(), request).await?;
    Ok(Json(report))
}

/// List inspection tasks
#[utoipa::path(
    get,
    path = "/inspection/tasks",
    tag = "inspection",
    security(("bearer_auth" = [])),
    params(TaskQuery),
    responses(
        (status = 200, description = "Inspection tasks", body = InspectionTaskPage)
    )
)]
pub async fn list_tasks(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<TaskQuery>,
) -> AppResult<Json<PaginatedResponse<InspectionTask>>> {
    let page = query.page;
    let (per_page, _) = page_window(query.page, query.per_page, state.config.workflow.page_size_limit);
    let (tasks, total) = state.services.inspection.list(query).await?;
    Ok(Json(PaginatedResponse::new(tasks, total, page, per_page)))
}

/// Get an inspection task with its results
#[utoipa::path(
    get,
    path = "/inspection/tasks/{id}",
    tag = "inspection",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Task details", body = InspectionTaskDetails),
        (status = 404, description = "Task not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_task(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<InspectionTaskDetails>> {
    let task = state.services.inspection.get(id).await?;
    Ok(Json(task))
}

/// Inspection tasks assigned to the caller
#[utoipa::path(
    get,
    path = "/inspection/my-tasks",
    tag = "inspection",
    security(("bearer_auth" = [])),
    params(MyTasksQuery),
    responses(
        (status = 200, description = "Caller's tasks for the day", body = Vec<InspectionTask>)
    )
)]
pub async fn my_tasks(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<MyTasksQuery>,
) -> AppResult<Json<Vec<InspectionTask>>> {
    let tasks = state.services.inspection.my_tasks(claims.actor(), query.date).await?;
    Ok(Json(tasks))
}

/// Mark open inspection tasks from previous days as overdue
#[utoipa::path(
    post,
    path = "/inspection/tasks/mark-overdue",
    tag = "inspection",
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
    let updated = state.services.inspection.mark_overdue(claims.actor(), today).await?;
    Ok(Json(OverdueSweepResponse { updated }))
}
