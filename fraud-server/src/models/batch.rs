//! Batch model - PostgreSQL implementation of the result store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fraud_core::store::{BatchId, BatchMeta, OwnerId, ResultStore, StoreError, StoreResult, StoredCount};
use fraud_core::{RecordTable, Summary};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction, TypeInfo, ValueRef};
use uuid::Uuid;

/// Replacing an existing summary keeps `save_summary` idempotent
const UPSERT_SUMMARY_SQL: &str = r#"
    INSERT INTO batch_summaries (batch_id, total_cases, fraud_count, non_fraud_count)
    VALUES ($1, $2, $3, $4)
    ON CONFLICT (batch_id) DO UPDATE SET
        total_cases = EXCLUDED.total_cases,
        fraud_count = EXCLUDED.fraud_count,
        non_fraud_count = EXCLUDED.non_fraud_count,
        created_at = NOW()
"#;

/// SQLSTATEs worth retrying: serialization failure, deadlock, lock not available
const TRANSIENT_SQLSTATES: [&str; 3] = ["40001", "40P01", "55P03"];

#[derive(Debug, FromRow)]
struct BatchRow {
    id: Uuid,
    facility_id: Uuid,
    uploaded_at: DateTime<Utc>,
    row_count: i64,
}

impl From<BatchRow> for BatchMeta {
    fn from(row: BatchRow) -> Self {
        BatchMeta {
            batch_id: row.id,
            owner_id: row.facility_id,
            uploaded_at: row.uploaded_at,
            row_count: row.row_count,
        }
    }
}

/// Sort a database failure into busy (retryable) or permanent
pub fn store_error(err: sqlx::Error) -> StoreError {
    let transient = match &err {
        sqlx::Error::PoolTimedOut => true,
        sqlx::Error::Database(db) => db
            .code()
            .map(|code| TRANSIENT_SQLSTATES.contains(&code.as_ref()))
            .unwrap_or(false),
        _ => false,
    };

    if transient {
        StoreError::Busy(err.to_string())
    } else {
        StoreError::Permanent(err.to_string())
    }
}

/// Count columns of `batch_summaries`
const COUNT_COLUMNS: [&str; 3] = ["total_cases", "fraud_count", "non_fraud_count"];

/// Physical type of a count column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CountType {
    Int8,
    Int4,
    Int2,
    /// Little-endian bytes written by older deployments
    Bytea,
}

impl CountType {
    fn from_type_name(column: &str, name: &str) -> StoreResult<Self> {
        match name {
            "INT8" => Ok(CountType::Int8),
            "INT4" => Ok(CountType::Int4),
            "INT2" => Ok(CountType::Int2),
            "BYTEA" => Ok(CountType::Bytea),
            other => Err(StoreError::Permanent(format!(
                "column '{}' has unsupported type {}",
                column, other
            ))),
        }
    }
}

/// Read a count column whatever its physical type
fn read_stored_count(row: &PgRow, column: &str) -> StoreResult<StoredCount> {
    let raw = row.try_get_raw(column).map_err(store_error)?;
    if raw.is_null() {
        return Ok(StoredCount::Absent);
    }
    let count_type = CountType::from_type_name(column, raw.type_info().name())?;

    Ok(match count_type {
        CountType::Int8 => StoredCount::Integer(row.try_get::<i64, _>(column).map_err(store_error)?),
        CountType::Int4 => StoredCount::Integer(row.try_get::<i32, _>(column).map_err(store_error)?.into()),
        CountType::Int2 => StoredCount::Integer(row.try_get::<i16, _>(column).map_err(store_error)?.into()),
        CountType::Bytea => StoredCount::LegacyBytes(row.try_get::<Vec<u8>, _>(column).map_err(store_error)?),
    })
}

fn summary_from_counts([total, fraud, non_fraud]: [StoredCount; 3]) -> StoreResult<Summary> {
    Ok(Summary {
        total_cases: total.normalize()?,
        fraud_count: fraud.normalize()?,
        non_fraud_count: non_fraud.normalize()?,
    })
}

fn summary_from_row(row: &PgRow) -> StoreResult<Summary> {
    summary_from_counts([
        read_stored_count(row, COUNT_COLUMNS[0])?,
        read_stored_count(row, COUNT_COLUMNS[1])?,
        read_stored_count(row, COUNT_COLUMNS[2])?,
    ])
}

/// Convert BYTEA count columns left by older deployments to BIGINT.
///
/// Each legacy value is decoded through [`StoredCount`] into a staging
/// column that then replaces the original, all in one transaction.
/// Returns the number of converted columns.
pub async fn migrate_legacy_counts(pool: &PgPool) -> StoreResult<usize> {
    let bytea_columns: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT column_name::text FROM information_schema.columns
        WHERE table_schema = current_schema()
          AND table_name = 'batch_summaries'
          AND data_type = 'bytea'
        "#
    )
    .fetch_all(pool)
    .await
    .map_err(store_error)?;

    let legacy: Vec<&str> = COUNT_COLUMNS
        .into_iter()
        .filter(|column| bytea_columns.iter().any(|c| c == column))
        .collect();
    if legacy.is_empty() {
        return Ok(0);
    }

    let mut tx = pool.begin().await.map_err(store_error)?;
    for column in &legacy {
        let staging = format!("{}_int", column);
        sqlx::query(&format!("ALTER TABLE batch_summaries ADD COLUMN {} BIGINT", staging))
            .execute(&mut *tx)
            .await
            .map_err(store_error)?;

        let rows = sqlx::query(&format!("SELECT batch_id, {} FROM batch_summaries", column))
            .fetch_all(&mut *tx)
            .await
            .map_err(store_error)?;

        let update = format!("UPDATE batch_summaries SET {} = $1 WHERE batch_id = $2", staging);
        for row in &rows {
            let batch_id: Uuid = row.try_get("batch_id").map_err(store_error)?;
            let value = read_stored_count(row, column)?.normalize()?;
            sqlx::query(&update)
                .bind(value)
                .bind(batch_id)
                .execute(&mut *tx)
                .await
                .map_err(store_error)?;
        }

        sqlx::query(&format!("ALTER TABLE batch_summaries DROP COLUMN {}", column))
            .execute(&mut *tx)
            .await
            .map_err(store_error)?;
        sqlx::query(&format!("ALTER TABLE batch_summaries RENAME COLUMN {} TO {}", staging, column))
            .execute(&mut *tx)
            .await
            .map_err(store_error)?;

        tracing::info!("Converted {} legacy '{}' values to BIGINT", rows.len(), column);
    }
    tx.commit().await.map_err(store_error)?;

    Ok(legacy.len())
}

pub struct PgResultStore {
    pool: PgPool,
}

impl PgResultStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_batch(
        tx: &mut Transaction<'_, Postgres>,
        owner_id: OwnerId,
        records: &RecordTable,
        predictions: &RecordTable,
    ) -> StoreResult<BatchMeta> {
        let row = sqlx::query_as::<_, BatchRow>(
            r#"
            INSERT INTO batches (id, facility_id, uploaded_at, row_count, input_table, prediction_table)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, facility_id, uploaded_at, row_count
            "#
        )
        .bind(Uuid::new_v4())
        .bind(owner_id)
        .bind(Utc::now())
        .bind(predictions.len() as i64)
        .bind(Json(records))
        .bind(Json(predictions))
        .fetch_one(&mut **tx)
        .await
        .map_err(store_error)?;

        Ok(row.into())
    }

    async fn insert_summary(
        tx: &mut Transaction<'_, Postgres>,
        batch_id: BatchId,
        summary: Summary,
    ) -> StoreResult<()> {
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM batches WHERE id = $1)")
            .bind(batch_id)
            .fetch_one(&mut **tx)
            .await
            .map_err(store_error)?;
        if !exists {
            return Err(StoreError::NotFound(batch_id));
        }

        sqlx::query(UPSERT_SUMMARY_SQL)
        .bind(batch_id)
        .bind(summary.total_cases)
        .bind(summary.fraud_count)
        .bind(summary.non_fraud_count)
        .execute(&mut **tx)
        .await
        .map_err(store_error)?;

        Ok(())
    }

    async fn fetch_table(&self, batch_id: BatchId, column: &str) -> StoreResult<Option<RecordTable>> {
        let query = format!("SELECT {} FROM batches WHERE id = $1", column);
        let table = sqlx::query_scalar::<_, Json<RecordTable>>(&query)
            .bind(batch_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;

        Ok(table.map(|Json(t)| t))
    }
}

#[async_trait]
impl ResultStore for PgResultStore {
    async fn save_batch(
        &self,
        owner_id: OwnerId,
        records: &RecordTable,
        predictions: &RecordTable,
    ) -> StoreResult<BatchMeta> {
        let mut tx = self.pool.begin().await.map_err(store_error)?;
        let meta = Self::insert_batch(&mut tx, owner_id, records, predictions).await?;
        tx.commit().await.map_err(store_error)?;
        Ok(meta)
    }

    async fn save_summary(&self, batch_id: BatchId, summary: Summary) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(store_error)?;
        Self::insert_summary(&mut tx, batch_id, summary).await?;
        tx.commit().await.map_err(store_error)
    }

    async fn save_upload(
        &self,
        owner_id: OwnerId,
        records: &RecordTable,
        predictions: &RecordTable,
        summary: Summary,
    ) -> StoreResult<BatchMeta> {
        // Dropping the transaction on error rolls both inserts back
        let mut tx = self.pool.begin().await.map_err(store_error)?;
        let meta = Self::insert_batch(&mut tx, owner_id, records, predictions).await?;
        Self::insert_summary(&mut tx, meta.batch_id, summary).await?;
        tx.commit().await.map_err(store_error)?;

        tracing::debug!("Batch {} committed with summary", meta.batch_id);
        Ok(meta)
    }

    async fn list_batches(&self, owner_id: OwnerId) -> StoreResult<Vec<BatchMeta>> {
        let rows = sqlx::query_as::<_, BatchRow>(
            r#"
            SELECT id, facility_id, uploaded_at, row_count FROM batches
            WHERE facility_id = $1
            ORDER BY uploaded_at DESC
            "#
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(rows.into_iter().map(BatchMeta::from).collect())
    }

    async fn list_all_batches(&self) -> StoreResult<Vec<BatchMeta>> {
        let rows = sqlx::query_as::<_, BatchRow>(
            "SELECT id, facility_id, uploaded_at, row_count FROM batches ORDER BY uploaded_at DESC"
        )
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(rows.into_iter().map(BatchMeta::from).collect())
    }

    async fn get_batch(&self, batch_id: BatchId) -> StoreResult<Option<BatchMeta>> {
        let row = sqlx::query_as::<_, BatchRow>(
            "SELECT id, facility_id, uploaded_at, row_count FROM batches WHERE id = $1"
        )
        .bind(batch_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(row.map(BatchMeta::from))
    }

    async fn get_summary(&self, batch_id: BatchId) -> StoreResult<Option<Summary>> {
        let row = sqlx::query(
            "SELECT total_cases, fraud_count, non_fraud_count FROM batch_summaries WHERE batch_id = $1"
        )
        .bind(batch_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        row.as_ref().map(summary_from_row).transpose()
    }

    async fn get_detail(&self, batch_id: BatchId) -> StoreResult<Option<RecordTable>> {
        self.fetch_table(batch_id, "prediction_table").await
    }

    async fn get_input(&self, batch_id: BatchId) -> StoreResult<Option<RecordTable>> {
        self.fetch_table(batch_id, "input_table").await
    }

    async fn delete_all(&self) -> StoreResult<u64> {
        let mut tx = self.pool.begin().await.map_err(store_error)?;
        sqlx::query("DELETE FROM batch_summaries")
            .execute(&mut *tx)
            .await
            .map_err(store_error)?;
        let removed = sqlx::query("DELETE FROM batches")
            .execute(&mut *tx)
            .await
            .map_err(store_error)?
            .rows_affected();
        tx.commit().await.map_err(store_error)?;

        Ok(removed)
    }
}
