//! EMS Server - equipment inspection, maintenance and repair work orders

use axum::{
    routing::{get, post},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ems_server::{
    api,
    config::AppConfig,
    repository::Repository,
    services::Services,
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("ems_server={},tower_http=debug", config.logging.level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Starting EMS Server v{}", env!("CARGO_PKG_VERSION"));

    // Create database connection pool
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect(&config.database.url)
        .await?;

    tracing::info!("Connected to database");

    sqlx::migrate!("./migrations").run(&pool).await?;

    tracing::info!("Database migrations completed");

    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);

    // Create repository and services
    let repository = Repository::new(pool);
    let services = Services::new(repository.clone(), &config.workflow);

    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(services),
        repository,
    };

    let app = create_router(state);

    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes
fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        .route("/ready", get(api::health::readiness_check))
        // Inspection
        .route("/inspection/start", post(api::inspection::start_inspection))
        .route("/inspection/complete", post(api::inspection::complete_inspection))
        .route("/inspection/my-tasks", get(api::inspection::my_tasks))
        .route("/inspection/tasks", get(api::inspection::list_tasks))
        .route("/inspection/tasks/generate", post(api::inspection::generate_tasks))
        .route("/inspection/tasks/mark-overdue", post(api::inspection::mark_overdue))
        .route("/inspection/tasks/:id", get(api::inspection::get_task))
        // Maintenance
        .route("/maintenance/start", post(api::maintenance::start_maintenance))
        .route("/maintenance/complete", post(api::maintenance::complete_maintenance))
        .route("/maintenance/my-tasks", get(api::maintenance::my_tasks))
        .route("/maintenance/tasks", get(api::maintenance::list_tasks))
        .route("/maintenance/tasks/generate", post(api::maintenance::generate_tasks))
        .route("/maintenance/tasks/mark-overdue", post(api::maintenance::mark_overdue))
        .route("/maintenance/tasks/:id", get(api::maintenance::get_task))
        // Repair
        .route("/repair/orders", post(api::repair::create_order).get(api::repair::list_orders))
        .route("/repair/orders/:id", get(api::repair::get_order))
        .route("/repair/orders/:id/logs", get(api::repair::get_logs))
        .route("/repair/orders/:id/assign", post(api::repair::assign_order))
        .route("/repair/orders/:id/start", post(api::repair::start_order))
        .route("/repair/orders/:id/update", post(api::repair::update_order))
        .route("/repair/orders/:id/confirm", post(api::repair::confirm_order))
        .route("/repair/orders/:id/audit", post(api::repair::audit_order))
        .route("/repair/my-tasks", get(api::repair::my_tasks))
        .with_state(state);

    // OpenAPI documentation
    let openapi = api::openapi::create_openapi_router();

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
