//! NHIS Fraud Detection Server
//!
//! Facilities upload CSV batches of patient encounters; every row is
//! labeled by a frozen classifier and stored with its batch summary.
//! Administrators see national aggregates across all facilities.
//!
//! Routes:
//!
//! | Scope | Paths |
//! |---|---|
//! | public | `/health`, `/api/v1/auth/{register,login}` |
//! | facility | `/api/v1/account`, `/api/v1/uploads`, `/api/v1/batches/*`, `/api/v1/model` |
//! | admin | `/api/v1/admin/*` |

mod config;
mod db;
mod models;
mod handlers;
mod middleware;
mod error;

#[cfg(test)]
mod tests;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post, put, delete},
    middleware as axum_middleware,
};
use fraud_core::{FraudPipeline, ResultStore, RetryingStore};
use tower_http::{
    cors::{CorsLayer, Any},
    trace::TraceLayer,
    compression::CompressionLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub use error::{AppError, AppResult};

use models::PgResultStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging (log records from fraud-core are bridged in)
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "fraud_server=debug,fraud_core=info,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env();

    tracing::info!("Fraud Detection Server starting ({})", config.environment);
    tracing::info!("Database: {}", config.database_url.split('@').last().unwrap_or("***"));
    config.ensure_deployable()?;

    // Model artifacts are required: refuse to start without them
    let pipeline = FraudPipeline::from_model_dir(&config.model_dir)
        .with_context(|| format!("Failed to load model from {}", config.model_dir.display()))?;
    for fp in pipeline.model_info().fingerprints {
        tracing::info!("Artifact {} sha256={}", fp.file, fp.sha256);
    }

    // Initialize database pool
    let pool = db::create_pool(&config.database_url).await
        .context("Failed to create database pool")?;

    tracing::info!("Running database migrations...");
    db::run_migrations(&pool).await
        .context("Failed to run migrations")?;
    db::seed_admin(&pool, &config).await
        .context("Failed to seed admin account")?;

    let store = RetryingStore::new(PgResultStore::new(pool.clone()), config.retry_policy());

    // Build application state
    let state = AppState {
        pool,
        config: config.clone(),
        pipeline: Arc::new(pipeline),
        store: Arc::new(store),
    };

    let app = create_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pool: sqlx::PgPool,
    pub config: config::Config,
    pub pipeline: Arc<FraudPipeline>,
    pub store: Arc<dyn ResultStore>,
}

/// Create the main router with all routes
fn create_router(state: AppState) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(handlers::health::check))
        .route("/api/v1/auth/login", post(handlers::auth::login))
        .route("/api/v1/auth/register", post(handlers::auth::register));

    // Facility routes (JWT auth)
    let facility_routes = Router::new()
        // Account
        .route("/api/v1/account", get(handlers::auth::account))
        .route("/api/v1/account/password", put(handlers::auth::change_password))

        // Uploads
        .route("/api/v1/uploads", post(handlers::uploads::create))

        // Batch history
        .route("/api/v1/batches", get(handlers::batches::list))
        .route("/api/v1/batches/:id/summary", get(handlers::batches::summary))
        .route("/api/v1/batches/:id/detail", get(handlers::batches::detail))
        .route("/api/v1/batches/:id/download", get(handlers::batches::download))

        // Model
        .route("/api/v1/model", get(handlers::model::info))

        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_facility_auth
        ));

    // Admin routes (JWT auth + admin flag)
    let admin_routes = Router::new()
        .route(
            "/api/v1/admin/facilities",
            get(handlers::admin::list_facilities).post(handlers::admin::create_admin),
        )
        .route("/api/v1/admin/national", get(handlers::admin::national))
        .route("/api/v1/admin/fraud-cases", get(handlers::admin::fraud_cases))
        .route("/api/v1/admin/data", delete(handlers::admin::delete_data))
        .layer(axum_middleware::from_fn(middleware::auth::require_admin_auth))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_facility_auth
        ));

    let body_limit = state.config.max_upload_bytes();

    Router::new()
        .merge(public_routes)
        .merge(facility_routes)
        .merge(admin_routes)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}
