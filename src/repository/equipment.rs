//! Equipment repository

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::equipment::Equipment,
};

const EQUIPMENT_COLUMNS: &str =
    "id, code, name, type_id, workshop_id, qr_code, status, dedicated_maintainer_id, created_at";

/// Read access to the equipment registry
#[async_trait]
pub trait EquipmentRegistry: Send + Sync {
    async fn get_by_id(&self, id: i32) -> AppResult<Equipment>;

    /// `None` when no equipment carries this QR code.
    async fn get_by_qr_code(&self, qr_code: &str) -> AppResult<Option<Equipment>>;
}

#[derive(Clone)]
pub struct EquipmentRepository {
    pool: Pool<Postgres>,
}

impl EquipmentRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EquipmentRegistry for EquipmentRepository {
    async fn get_by_id(&self, id: i32) -> AppResult<Equipment> {
        sqlx::query_as::<_, Equipment>(&format!(
            "SELECT {} FROM equipment WHERE id = $1",
            EQUIPMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Equipment {} not found", id)))
    }

    async fn get_by_qr_code(&self, qr_code: &str) -> AppResult<Option<Equipment>> {
        let row = sqlx::query_as::<_, Equipment>(&format!(
            "SELECT {} FROM equipment WHERE qr_code = $1",
            EQUIPMENT_COLUMNS
        ))
        .bind(qr_code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}
