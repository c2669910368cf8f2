use chrono::{DateTime, Utc};
use retag_core::{AppError, FailureRecord};
use sqlx::{PgPool, Pool, Postgres};

const SELECT_COLUMNS: &str =
    "SELECT url, resource_id, reason, first_failure_at, retry_count, last_retry_at FROM tag_failures";

/// Repository for tag-generation failure records, keyed by url.
///
/// Every write touches a single row, so concurrent items in one batch never
/// contend on the same key.
#[derive(Clone)]
pub struct FailureRepository {
    pool: Pool<Postgres>,
}

impl FailureRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, url: &str) -> Result<Option<FailureRecord>, AppError> {
        let row: Option<FailureRow> = sqlx::query_as(&format!("{} WHERE url = $1", SELECT_COLUMNS))
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(FailureRecord::from))
    }

    /// Returns all records, oldest first failure first.
    pub async fn get_all(&self) -> Result<Vec<FailureRecord>, AppError> {
        let rows: Vec<FailureRow> =
            sqlx::query_as(&format!("{} ORDER BY first_failure_at, url", SELECT_COLUMNS))
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(FailureRecord::from).collect())
    }

    /// Inserts or replaces the record for `record.url`.
    pub async fn put(&self, record: &FailureRecord) -> Result<(), AppError> {
        let retry_count = i32::try_from(record.retry_count).unwrap_or(i32::MAX);
        sqlx::query(
            r#"
            INSERT INTO tag_failures (
                url,
                resource_id,
                reason,
                first_failure_at,
                retry_count,
                last_retry_at
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (url)
            DO UPDATE SET
                resource_id = EXCLUDED.resource_id,
                reason = EXCLUDED.reason,
                first_failure_at = EXCLUDED.first_failure_at,
                retry_count = EXCLUDED.retry_count,
                last_retry_at = EXCLUDED.last_retry_at
            "#,
        )
        .bind(&record.url)
        .bind(&record.resource_id)
        .bind(&record.reason)
        .bind(record.first_failure_at)
        .bind(retry_count)
        .bind(record.last_retry_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Deletes the record for `url`. Returns whether a row existed.
    pub async fn delete(&self, url: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM tag_failures WHERE url = $1")
            .bind(url)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Deletes every record. Returns the number removed.
    pub async fn delete_all(&self) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM tag_failures")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

/// Helper struct for deserializing failure rows
#[derive(sqlx::FromRow)]
struct FailureRow {
    url: String,
    resource_id: String,
    reason: String,
    first_failure_at: DateTime<Utc>,
    retry_count: i32,
    last_retry_at: Option<DateTime<Utc>>,
}

impl From<FailureRow> for FailureRecord {
    fn from(row: FailureRow) -> Self {
        FailureRecord {
            url: row.url,
            resource_id: row.resource_id,
            reason: row.reason,
            first_failure_at: row.first_failure_at,
            retry_count: u32::try_from(row.retry_count).unwrap_or(0),
            last_retry_at: row.last_retry_at,
        }
    }
}

// =============================================================================
// Trait Implementation: FailureStore
// =============================================================================

impl retag_core::traits::FailureStore for FailureRepository {
    async fn get(&self, url: &str) -> Result<Option<FailureRecord>, AppError> {
        FailureRepository::get(self, url).await
    }

    async fn get_all(&self) -> Result<Vec<FailureRecord>, AppError> {
        FailureRepository::get_all(self).await
    }

    async fn put(&self, record: &FailureRecord) -> Result<(), AppError> {
        FailureRepository::put(self, record).await
    }

    async fn delete(&self, url: &str) -> Result<(), AppError> {
        FailureRepository::delete(self, url).await?;
        Ok(())
    }
}
