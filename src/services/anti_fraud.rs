//! Scan verification for on-site work
//!
//! An inspection may only start when the inspector physically scans the
//! label of the equipment being inspected, and the request is fresh.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{
    error::{AppError, AppResult},
    models::equipment::Equipment,
    repository::EquipmentRegistry,
};

#[derive(Clone)]
pub struct ScanVerifier {
    equipment: Arc<dyn EquipmentRegistry>,
    replay_window_secs: i64,
}

impl ScanVerifier {
    pub fn new(equipment: Arc<dyn EquipmentRegistry>, replay_window_secs: i64) -> Self {
        Self {
            equipment,
            replay_window_secs,
        }
    }

    /// Reject client timestamps (Unix seconds) too far from `now`, in
    /// either direction.
    pub fn check_timestamp(&self, client_timestamp: i64, now: DateTime<Utc>) -> AppResult<()> {
        let skew = now.timestamp().abs_diff(client_timestamp);
        if skew > self.replay_window_secs.unsigned_abs() {
            return Err(AppError::InvalidTimestamp(format!(
                "Request timestamp is {}s away from server time (max {}s)",
                skew, self.replay_window_secs
            )));
        }
        Ok(())
    }

    /// Returns the equipment if `scanned_code` is its label and the
    /// timestamp is fresh. Nothing is written.
    pub async fn verify(
        &self,
        equipment_id: i32,
        scanned_code: &str,
        client_timestamp: i64,
        now: DateTime<Utc>,
    ) -> AppResult<Equipment> {
        self.check_timestamp(client_timestamp, now)?;

        match self.equipment.get_by_qr_code(scanned_code).await? {
            Some(equipment) if equipment.id == equipment_id => Ok(equipment),
            Some(other) => {
                tracing::warn!(
                    equipment_id,
                    scanned_equipment_id = other.id,
                    "Scanned label belongs to another equipment"
                );
                Err(AppError::InvalidQrCode)
            }
            None => {
                tracing::warn!(equipment_id, "Scanned label matches no equipment");
                Err(AppError::InvalidQrCode)
            }
        }
    }
}
