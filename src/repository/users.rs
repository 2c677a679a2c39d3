//! Users repository

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::user::User,
};

/// Lookup of users referenced by work orders
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_by_id(&self, id: i32) -> AppResult<User>;
}

#[derive(Clone)]
pub struct UsersRepository {
    pool: Pool<Postgres>,
}

impl UsersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for UsersRepository {
    async fn get_by_id(&self, id: i32) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            "SELECT id, username, name, role, is_active, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }
}
