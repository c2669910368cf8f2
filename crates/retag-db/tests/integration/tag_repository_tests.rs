//! Integration tests for TagRepository and a full engine run over PostgreSQL.

use futures::stream;
use retag_core::traits::RemoteGenerator;
use retag_core::{
    ChatMessage, GenerationConfig, GenerationError, RegenerationEngine, SilentReporter,
    TagAssignment, TokenStream, WorkItem,
};
use retag_db::{FailureRepository, TagRepository};

use crate::integration::common::{sample_item, setup_test_db};

#[tokio::test]
async fn test_upsert_and_list_resources() {
    let (pool, _container) = setup_test_db().await;
    let repo = TagRepository::new(pool);

    repo.upsert_resource(&sample_item("1")).await.unwrap();
    repo.upsert_resource(&sample_item("2")).await.unwrap();
    // Re-upsert renames instead of duplicating
    repo.upsert_resource(&WorkItem::new("1", "Renamed", "https://example.com/1"))
        .await
        .unwrap();

    let items = repo.list_resources().await.unwrap();

    assert_eq!(items.len(), 2);
    let first = items.iter().find(|i| i.id == "1").unwrap();
    assert_eq!(first.title, "Renamed");
}

#[tokio::test]
async fn test_batch_put_replaces_tags() {
    let (pool, _container) = setup_test_db().await;
    let repo = TagRepository::new(pool);
    let url = "https://example.com/1";

    repo.batch_put(&[TagAssignment {
        url: url.to_string(),
        tags: vec!["old".to_string(), "stale".to_string()],
    }])
    .await
    .unwrap();
    repo.batch_put(&[TagAssignment {
        url: url.to_string(),
        tags: vec!["rust".to_string()],
    }])
    .await
    .unwrap();

    assert_eq!(
        repo.tags_for(url).await.unwrap(),
        Some(vec!["rust".to_string()])
    );
    assert_eq!(repo.tags_for("https://missing.example").await.unwrap(), None);
}

#[tokio::test]
async fn test_batch_put_empty_is_noop() {
    let (pool, _container) = setup_test_db().await;
    let repo = TagRepository::new(pool);

    repo.batch_put(&[]).await.unwrap();

    assert!(repo.vocabulary().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_vocabulary_is_distinct_and_sorted() {
    let (pool, _container) = setup_test_db().await;
    let repo = TagRepository::new(pool);

    repo.batch_put(&[
        TagAssignment {
            url: "https://a.example".to_string(),
            tags: vec!["web".to_string(), "rust".to_string()],
        },
        TagAssignment {
            url: "https://b.example".to_string(),
            tags: vec!["rust".to_string(), "databases".to_string()],
        },
    ])
    .await
    .unwrap();

    assert_eq!(
        repo.vocabulary().await.unwrap(),
        vec!["databases".to_string(), "rust".to_string(), "web".to_string()]
    );
}

/// Generator that fails for one url and tags everything else.
#[derive(Clone)]
struct FailOneGenerator {
    failing_url: String,
}

impl RemoteGenerator for FailOneGenerator {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<TokenStream, GenerationError> {
        let prompt = messages.last().map(|m| m.content.as_str()).unwrap_or("");
        if prompt.contains(&self.failing_url) {
            return Err(GenerationError::Remote {
                status: 500,
                message: "boom".to_string(),
            });
        }
        let stream: TokenStream = Box::pin(stream::iter(vec![Ok("postgres, sql".to_string())]));
        Ok(stream)
    }
}

#[tokio::test]
async fn test_engine_run_against_postgres() {
    let (pool, _container) = setup_test_db().await;
    let tags = TagRepository::new(pool.clone());
    let failures = FailureRepository::new(pool);
    for id in ["1", "2", "3"] {
        tags.upsert_resource(&sample_item(id)).await.unwrap();
    }
    let engine = RegenerationEngine::new(
        tags.clone(),
        FailOneGenerator {
            failing_url: "https://example.com/2".to_string(),
        },
        tags.clone(),
        failures.clone(),
        GenerationConfig::default()
            .with_batch_size(2)
            .with_delay_between_batches(std::time::Duration::ZERO),
    )
    .unwrap();

    let result = engine.regenerate_all(&SilentReporter).await.unwrap();

    assert_eq!(result.total, 3);
    assert_eq!(result.successful, 2);
    assert_eq!(result.failed, 1);
    assert_eq!(
        tags.tags_for("https://example.com/1").await.unwrap(),
        Some(vec!["postgres".to_string(), "sql".to_string()])
    );
    assert_eq!(tags.tags_for("https://example.com/2").await.unwrap(), None);
    let record = failures
        .get("https://example.com/2")
        .await
        .unwrap()
        .expect("failure recorded");
    assert_eq!(record.retry_count, 1);
    assert_eq!(record.resource_id, "2");
}
