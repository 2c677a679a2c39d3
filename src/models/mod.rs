//! Data models for the work-order engine

/// Implements string conversions and SQLx text mapping for a fieldless enum.
///
/// Status columns are plain VARCHARs, so every enum is stored as its
/// lowercase slug and parsed back on read.
macro_rules! text_enum {
    ($ty:ident { $($variant:ident => $slug:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $slug,)+
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }

        impl std::str::FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($slug => Ok($ty::$variant),)+
                    _ => Err(format!("Invalid {} value: {}", stringify!($ty), s)),
                }
            }
        }

        impl sqlx::Type<sqlx::Postgres> for $ty {
            fn type_info() -> sqlx::postgres::PgTypeInfo {
                <String as sqlx::Type<sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
                <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
            }
        }

        impl<'r> sqlx::Decode<'r, sqlx::Postgres> for $ty {
            fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
                let s: String = sqlx::Decode::<sqlx::Postgres>::decode(value)?;
                s.parse().map_err(|e: String| e.into())
            }
        }

        impl sqlx::Encode<'_, sqlx::Postgres> for $ty {
            fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
                let s: String = self.as_str().to_string();
                <String as sqlx::Encode<sqlx::Postgres>>::encode(s, buf)
            }
        }
    };
}

pub mod equipment;
pub mod inspection;
pub mod maintenance;
pub mod repair;
pub mod task;
pub mod user;

// Re-export commonly used types
pub use equipment::{Equipment, EquipmentStatus};
pub use inspection::InspectionTask;
pub use maintenance::{MaintenancePlan, MaintenanceTask};
pub use repair::{RepairLog, RepairOrder, RepairStatus};
pub use task::{CheckResult, ChecklistItem, TaskStatus};
pub use user::{Actor, User, UserRole};

/// Resolve `page`/`per_page` query values into `(limit, offset)`.
///
/// `page` starts at 1; `per_page` is capped at `max_per_page`.
pub fn page_window(page: Option<i64>, per_page: Option<i64>, max_per_page: i64) -> (i64, i64) {
    let page = page.unwrap_or(1).max(1);
    let per_page = per_page.unwrap_or(20).clamp(1, max_per_page.max(1));
    (per_page, (page - 1).saturating_mul(per_page))
}
