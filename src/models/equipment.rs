//! Equipment model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Operational status of a piece of equipment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentStatus {
    Running,
    Stopped,
    Maintenance,
    Scrapped,
}

text_enum!(EquipmentStatus {
    Running => "running",
    Stopped => "stopped",
    Maintenance => "maintenance",
    Scrapped => "scrapped",
});

/// Equipment record, as far as the work-order engine reads it
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Equipment {
    pub id: i32,
    /// Unique equipment code, e.g. "E1"
    pub code: String,
    pub name: String,
    pub type_id: i32,
    pub workshop_id: i32,
    /// Value printed on the physical QR label
    pub qr_code: String,
    pub status: EquipmentStatus,
    /// Maintainer responsible for periodic maintenance of this unit
    pub dedicated_maintainer_id: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl Equipment {
    /// Label value generated for a code when none is set explicitly.
    pub fn default_qr_code(code: &str) -> String {
        format!("QR_{}", code)
    }
}
