//! Database schema for resources, tags and failure records.

use retag_core::AppError;
use sqlx::PgPool;

/// DDL statements, executed one at a time.
pub const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS resources (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL DEFAULT '',
        url TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_resources_url ON resources(url)",
    r#"CREATE TABLE IF NOT EXISTS resource_tags (
        url TEXT PRIMARY KEY,
        tags TEXT[] NOT NULL DEFAULT '{}',
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS tag_failures (
        url TEXT PRIMARY KEY,
        resource_id TEXT NOT NULL,
        reason TEXT NOT NULL,
        first_failure_at TIMESTAMPTZ NOT NULL,
        retry_count INTEGER NOT NULL DEFAULT 1 CHECK (retry_count >= 0),
        last_retry_at TIMESTAMPTZ
    )"#,
];

/// Creates any missing tables. Safe to run on every start.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), AppError> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    tracing::debug!(statements = SCHEMA.len(), "Schema ensured");
    Ok(())
}
