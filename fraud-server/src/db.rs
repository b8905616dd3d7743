//! Database module - PostgreSQL connection, schema and bootstrap admin

use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::config::Config;
use crate::models::{hash_password, migrate_legacy_counts, Facility};

/// Create database connection pool
pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
}

/// Run database migrations
pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    // Several statements, so the simple query protocol
    sqlx::raw_sql(SCHEMA_SQL)
        .execute(pool)
        .await?;

    let converted = migrate_legacy_counts(pool).await?;
    if converted > 0 {
        tracing::info!("Converted {} legacy summary count columns", converted);
    }

    tracing::info!("Database schema applied successfully");
    Ok(())
}

/// Seed the bootstrap admin when no admin facility exists yet
pub async fn seed_admin(pool: &PgPool, config: &Config) -> anyhow::Result<()> {
    if Facility::admin_exists(pool).await? {
        return Ok(());
    }

    let Some(password) = config.admin_password.as_deref() else {
        tracing::warn!("No admin account exists and ADMIN_PASSWORD is not set; admin views are unreachable");
        return Ok(());
    };

    let password_hash = hash_password(password)?;
    let admin = Facility::create(pool, &config.admin_name, &password_hash, true).await?;
    tracing::info!("Bootstrap admin '{}' created ({})", admin.name, admin.id);
    Ok(())
}

/// Database schema SQL
///
/// Deployments that predate integer counts still carry BYTEA summary
/// columns after this runs; `migrate_legacy_counts` converts them.
const SCHEMA_SQL: &str = r#"
-- Facilities (hospitals and administrators)
CREATE TABLE IF NOT EXISTS facilities (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    name VARCHAR(255) NOT NULL UNIQUE,
    password_hash VARCHAR(255) NOT NULL,
    is_admin BOOLEAN NOT NULL DEFAULT false,
    registered_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

-- Uploaded batches: input rows and labeled rows
CREATE TABLE IF NOT EXISTS batches (
    id UUID PRIMARY KEY,
    facility_id UUID NOT NULL REFERENCES facilities(id) ON DELETE CASCADE,
    uploaded_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    row_count BIGINT NOT NULL,
    input_table JSONB NOT NULL,
    prediction_table JSONB NOT NULL
);

-- Per-batch fraud counts
CREATE TABLE IF NOT EXISTS batch_summaries (
    batch_id UUID PRIMARY KEY REFERENCES batches(id) ON DELETE CASCADE,
    total_cases BIGINT,
    fraud_count BIGINT,
    non_fraud_count BIGINT,
    created_at TIMESTAMPTZ DEFAULT NOW()
);

-- Indexes
CREATE INDEX IF NOT EXISTS idx_batches_facility ON batches(facility_id, uploaded_at);
CREATE INDEX IF NOT EXISTS idx_batches_uploaded ON batches(uploaded_at);
"#;
