use retag_core::{AppError, TagAssignment, WorkItem};
use sqlx::{PgPool, Pool, Postgres};

/// Repository for taggable resources and their current tags.
///
/// Backs both [`retag_core::traits::ResourceEnumerator`] and
/// [`retag_core::traits::TagStore`]. Tags are keyed by resource url, so two
/// resources sharing a url share one tag list.
///
/// # Examples
///
/// ```no_run
/// use sqlx::postgres::PgPoolOptions;
/// use retag_db::TagRepository;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = PgPoolOptions::new()
///     .max_connections(5)
///     .connect("postgresql://localhost/retag")
///     .await?;
///
/// let repo = TagRepository::new(pool);
/// let vocabulary = repo.vocabulary().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct TagRepository {
    pool: Pool<Postgres>,
}

impl TagRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts or updates a resource by id.
    pub async fn upsert_resource(&self, item: &WorkItem) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO resources (id, title, url)
            VALUES ($1, $2, $3)
            ON CONFLICT (id)
            DO UPDATE SET title = EXCLUDED.title, url = EXCLUDED.url
            "#,
        )
        .bind(&item.id)
        .bind(&item.title)
        .bind(&item.url)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Lists all resources in insertion order.
    pub async fn list_resources(&self) -> Result<Vec<WorkItem>, AppError> {
        let rows: Vec<ResourceRow> =
            sqlx::query_as("SELECT id, title, url FROM resources ORDER BY created_at, id")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(WorkItem::from).collect())
    }

    /// Replaces the tag list for every assignment in one transaction.
    pub async fn batch_put(&self, assignments: &[TagAssignment]) -> Result<(), AppError> {
        if assignments.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for assignment in assignments {
            sqlx::query(
                r#"
                INSERT INTO resource_tags (url, tags, updated_at)
                VALUES ($1, $2, NOW())
                ON CONFLICT (url)
                DO UPDATE SET tags = EXCLUDED.tags, updated_at = NOW()
                "#,
            )
            .bind(&assignment.url)
            .bind(&assignment.tags)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Returns the tags currently stored for `url`.
    pub async fn tags_for(&self, url: &str) -> Result<Option<Vec<String>>, AppError> {
        let row: Option<(Vec<String>,)> =
            sqlx::query_as("SELECT tags FROM resource_tags WHERE url = $1")
                .bind(url)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(tags,)| tags))
    }

    /// Distinct tags across all resources, sorted.
    pub async fn vocabulary(&self) -> Result<Vec<String>, AppError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT DISTINCT tag
            FROM resource_tags, unnest(tags) AS tag
            WHERE tag <> ''
            ORDER BY tag
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(tag,)| tag).collect())
    }
}

/// Helper struct for deserializing resource rows
#[derive(sqlx::FromRow)]
struct ResourceRow {
    id: String,
    title: String,
    url: String,
}

impl From<ResourceRow> for WorkItem {
    fn from(row: ResourceRow) -> Self {
        WorkItem {
            id: row.id,
            title: row.title,
            url: row.url,
        }
    }
}

// =============================================================================
// Trait Implementations: ResourceEnumerator, TagStore
// =============================================================================

impl retag_core::traits::ResourceEnumerator for TagRepository {
    async fn list_resources(&self) -> Result<Vec<WorkItem>, AppError> {
        TagRepository::list_resources(self).await
    }
}

impl retag_core::traits::TagStore for TagRepository {
    async fn batch_put(&self, assignments: &[TagAssignment]) -> Result<(), AppError> {
        TagRepository::batch_put(self, assignments).await
    }

    async fn vocabulary(&self) -> Result<Vec<String>, AppError> {
        TagRepository::vocabulary(self).await
    }
}
