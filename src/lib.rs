//! EMS work-order engine
//!
//! REST JSON API driving the three field workflows of a plant maintenance
//! department: daily inspections started by scanning the equipment label,
//! periodic maintenance generated from plans, and repair orders moving
//! through assignment, repair, confirmation and audit.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
    pub repository: repository::Repository,
}
