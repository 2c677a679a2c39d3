//! API handlers for the work-order REST endpoints

pub mod health;
pub mod inspection;
pub mod maintenance;
pub mod openapi;
pub mod repair;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppError,
    models::{
        inspection::InspectionTask, maintenance::MaintenanceTask, repair::RepairOrder,
        user::UserClaims,
    },
    AppState,
};

/// Extractor for authenticated user from JWT token
pub struct AuthenticatedUser(pub UserClaims);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Authentication("Missing authorization header".to_string()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Authentication("Invalid authorization header format".to_string()))?;

        let claims = UserClaims::from_token(token, &state.config.auth.jwt_secret)
            .map_err(|e| AppError::Authentication(e.to_string()))?;

        Ok(AuthenticatedUser(claims))
    }
}

/// Paginated response wrapper
#[derive(Serialize, ToSchema)]
#[aliases(
    InspectionTaskPage = PaginatedResponse<InspectionTask>,
    MaintenanceTaskPage = PaginatedResponse<MaintenanceTask>,
    RepairOrderPage = PaginatedResponse<RepairOrder>
)]
pub struct PaginatedResponse<T>
where
    T: for<'a> ToSchema<'a>,
{
    pub items: Vec<T>,
    /// Total number of matching rows
    pub total: i64,
    /// Current page number
    pub page: i64,
    pub per_page: i64,
}

impl<T> PaginatedResponse<T>
where
    T: for<'a> ToSchema<'a>,
{
    pub fn new(items: Vec<T>, total: i64, page: Option<i64>, per_page: i64) -> Self {
        Self {
            items,
            total,
            page: page.unwrap_or(1).max(1),
            per_page,
        }
    }
}
