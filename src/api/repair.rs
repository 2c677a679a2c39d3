//! Repair order API endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::{
        page_window,
        repair::{
            AssignRepairOrder, AuditRepair, ConfirmRepair, CreateRepairOrder, RepairLog,
            RepairOrder, RepairOrderDetails, RepairQuery, UpdateRepair,
        },
    },
    AppState,
};

use super::{AuthenticatedUser, PaginatedResponse, RepairOrderPage};

/// Report a fault
#[utoipa::path(
    post,
    path = "/repair/orders",
    tag = "repair",
    security(("bearer_auth" = [])),
    request_body = CreateRepairOrder,
    responses(
        (status = 201, description = "Repair order created", body = RepairOrder),
        (status = 400, description = "Invalid request", body = crate::error::ErrorResponse),
        (status = 404, description = "Equipment not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_order(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CreateRepairOrder>,
) -> AppResult<(StatusCode, Json<RepairOrder>)> {
    let order = state.services.repair.create(claims.actor(), request).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// List repair orders, highest priority first
#[utoipa::path(
    get,
    path = "/repair/orders",
    tag = "repair",
    security(("bearer_auth" = [])),
    params(RepairQuery),
    responses(
        (status = 200, description = "Repair orders", body = RepairOrderPage)
    )
)]
pub async fn list_orders(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<RepairQuery>,
) -> AppResult<Json<PaginatedResponse<RepairOrder>>> {
    let page = query.page;
    let (per_page, _) = page_window(query.page, query.per_page, state.config.workflow.page_size_limit);
    let (orders, total) = state.services.repair.list(query).await?;
    Ok(Json(PaginatedResponse::new(orders, total, page, per_page)))
}

/// Get a repair order with its log
#[utoipa::path(
    get,
    path = "/repair/orders/{id}",
    tag = "repair",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order details", body = RepairOrderDetails),
        (status = 404, description = "Order not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_order(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<RepairOrderDetails>> {
    let order = state.services.repair.get(id).await?;
    Ok(Json(order))
}

/// Log entries of a repair order
#[utoipa::path(
    get,
    path = "/repair/orders/{id}/logs",
    tag = "repair",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order log, oldest first", body = Vec<RepairLog>),
        (status = 404, description = "Order not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_logs(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Vec<RepairLog>>> {
    let logs = state.services.repair.logs(id).await?;
    Ok(Json(logs))
}

/// Assign a pending order to a technician
#[utoipa::path(
    post,
    path = "/repair/orders/{id}/assign",
    tag = "repair",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Order ID")),
    request_body = AssignRepairOrder,
    responses(
        (status = 200, description = "Order assigned", body = RepairOrder),
        (status = 409, description = "Order is not pending", body = crate::error::ErrorResponse)
    )
)]
pub async fn assign_order(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<AssignRepairOrder>,
) -> AppResult<Json<RepairOrder>> {
    let order = state
        .services
        .repair
        .assign(claims.actor(), id, request.technician_id)
        .await?;
    Ok(Json(order))
}

/// Technician starts working on an assigned order
#[utoipa::path(
    post,
    path = "/repair/orders/{id}/start",
    tag = "repair",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Repair started", body = RepairOrder),
        (status = 409, description = "Order is not assigned", body = crate::error::ErrorResponse)
    )
)]
pub async fn start_order(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<RepairOrder>> {
    let order = state.services.repair.start(claims.actor(), id).await?;
    Ok(Json(order))
}

/// Report progress, move to testing or mark the repair done
#[utoipa::path(
    post,
    path = "/repair/orders/{id}/update",
    tag = "repair",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Order ID")),
    request_body = UpdateRepair,
    responses(
        (status = 200, description = "Order updated", body = RepairOrder),
        (status = 400, description = "Solution missing", body = crate::error::ErrorResponse),
        (status = 409, description = "Order is not being worked on", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_order(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<UpdateRepair>,
) -> AppResult<Json<RepairOrder>> {
    let order = state.services.repair.update(claims.actor(), id, request).await?;
    Ok(Json(order))
}

/// Reporter accepts or rejects the repair
#[utoipa::path(
    post,
    path = "/repair/orders/{id}/confirm",
    tag = "repair",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Order ID")),
    request_body = ConfirmRepair,
    responses(
        (status = 200, description = "Verdict recorded", body = RepairOrder),
        (status = 409, description = "Order is not awaiting confirmation", body = crate::error::ErrorResponse)
    )
)]
pub async fn confirm_order(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<ConfirmRepair>,
) -> AppResult<Json<RepairOrder>> {
    let order = state.services.repair.confirm(claims.actor(), id, request).await?;
    Ok(Json(order))
}

/// Approve or reject an accepted repair
#[utoipa::path(
    post,
    path = "/repair/orders/{id}/audit",
    tag = "repair",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Order ID")),
    request_body = AuditRepair,
    responses(
        (status = 200, description = "Audit recorded", body = RepairOrder),
        (status = 403, description = "Admins, engineers and supervisors only", body = crate::error::ErrorResponse),
        (status = 409, description = "Order is not awaiting audit", body = crate::error::ErrorResponse)
    )
)]
pub async fn audit_order(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<AuditRepair>,
) -> AppResult<Json<RepairOrder>> {
    let order = state.services.repair.audit(claims.actor(), id, request).await?;
    Ok(Json(order))
}

/// Orders the caller is working on
#[utoipa::path(
    get,
    path = "/repair/my-tasks",
    tag = "repair",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Assigned, in-progress and testing orders", body = Vec<RepairOrder>)
    )
)]
pub async fn my_tasks(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<RepairOrder>>> {
    let orders = state.services.repair.my_tasks(claims.actor()).await?;
    Ok(Json(orders))
}
