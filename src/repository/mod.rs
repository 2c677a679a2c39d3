//! Repository layer for database operations
//!
//! Each store is exposed to the services through a trait so the workflows
//! can run against Postgres in production and an in-memory store in tests.

pub mod equipment;
pub mod inspection;
pub mod maintenance;
pub mod repairs;
pub mod users;

#[cfg(test)]
pub mod memory;

use sqlx::{Pool, Postgres, Transaction};

use crate::{error::AppResult, models::task::ChecklistEntry};

pub use equipment::EquipmentRegistry;
pub use inspection::{InspectionCatalog, InspectionTaskStore};
pub use maintenance::{MaintenanceCatalog, MaintenanceTaskStore};
pub use repairs::RepairStore;
pub use users::UserDirectory;

/// Outcome of an idempotent insert
#[derive(Debug, Clone, PartialEq)]
pub enum Insertion<T> {
    Created(T),
    /// A row covering the same key already existed and was left untouched
    Existing(T),
}

impl<T> Insertion<T> {
    pub fn into_inner(self) -> T {
        match self {
            Insertion::Created(v) | Insertion::Existing(v) => v,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Insertion<U> {
        match self {
            Insertion::Created(v) => Insertion::Created(f(v)),
            Insertion::Existing(v) => Insertion::Existing(f(v)),
        }
    }
}

/// Main repository struct holding database connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub equipment: equipment::EquipmentRepository,
    pub users: users::UsersRepository,
    pub inspection: inspection::InspectionRepository,
    pub maintenance: maintenance::MaintenanceRepository,
    pub repairs: repairs::RepairsRepository,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            equipment: equipment::EquipmentRepository::new(pool.clone()),
            users: users::UsersRepository::new(pool.clone()),
            inspection: inspection::InspectionRepository::new(pool.clone()),
            maintenance: maintenance::MaintenanceRepository::new(pool.clone()),
            repairs: repairs::RepairsRepository::new(pool.clone()),
            pool,
        }
    }

    /// Round-trip to the database, used by the readiness probe
    pub async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Batch insert of checklist results into `table` inside `tx`.
async fn insert_checklist_records(
    tx: &mut Transaction<'_, Postgres>,
    table: &str,
    task_id: i32,
    entries: &[ChecklistEntry],
) -> AppResult<()> {
    if entries.is_empty() {
        return Ok(());
    }
    let item_ids: Vec<i32> = entries.iter().map(|e| e.item_id).collect();
    let results: Vec<String> = entries.iter().map(|e| e.result.as_str().to_string()).collect();
    let remarks: Vec<Option<String>> = entries.iter().map(|e| e.remark.clone()).collect();
    let photos: Vec<Option<String>> = entries.iter().map(|e| e.photo_url.clone()).collect();

    let query = format!(
        "INSERT INTO {} (task_id, item_id, result, remark, photo_url) \
         SELECT $1, * FROM UNNEST($2::int[], $3::text[], $4::text[], $5::text[])",
        table
    );
    sqlx::query(&query)
        .bind(task_id)
        .bind(&item_ids)
        .bind(&results)
        .bind(&remarks)
        .bind(&photos)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Appends `AND`-joined conditions with numbered placeholders.
struct Filters {
    conditions: Vec<String>,
    idx: usize,
}

impl Filters {
    fn new() -> Self {
        Self {
            conditions: Vec::new(),
            idx: 1,
        }
    }

    fn push(&mut self, condition: &str) {
        self.conditions
            .push(condition.replace("$?", &format!("${}", self.idx)));
        self.idx += 1;
    }

    fn where_clause(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.conditions.join(" AND "))
        }
    }
}
