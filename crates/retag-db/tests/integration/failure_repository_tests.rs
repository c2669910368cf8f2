//! Integration tests for FailureRepository.

use retag_db::FailureRepository;

use crate::integration::common::{sample_failure, setup_test_db, timestamp};

#[tokio::test]
async fn test_put_and_get_roundtrip() {
    let (pool, _container) = setup_test_db().await;
    let repo = FailureRepository::new(pool);
    let record = sample_failure("1", 1, timestamp(0));

    repo.put(&record).await.unwrap();
    let stored = repo.get(&record.url).await.unwrap();

    assert_eq!(stored, Some(record));
}

#[tokio::test]
async fn test_get_missing_returns_none() {
    let (pool, _container) = setup_test_db().await;
    let repo = FailureRepository::new(pool);

    assert_eq!(repo.get("https://nowhere.example").await.unwrap(), None);
}

#[tokio::test]
async fn test_put_replaces_existing_record() {
    let (pool, _container) = setup_test_db().await;
    let repo = FailureRepository::new(pool);
    let first = sample_failure("1", 1, timestamp(0));
    repo.put(&first).await.unwrap();

    let mut second = first.clone();
    second.retry_count = 2;
    second.reason = "Generated tag list is empty".to_string();
    second.last_retry_at = Some(timestamp(60));
    repo.put(&second).await.unwrap();

    let all = repo.get_all().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0], second);
    assert_eq!(all[0].first_failure_at, timestamp(0));
}

#[tokio::test]
async fn test_get_all_orders_by_first_failure() {
    let (pool, _container) = setup_test_db().await;
    let repo = FailureRepository::new(pool);
    repo.put(&sample_failure("late", 1, timestamp(100))).await.unwrap();
    repo.put(&sample_failure("early", 2, timestamp(0))).await.unwrap();

    let all = repo.get_all().await.unwrap();

    let ids: Vec<&str> = all.iter().map(|r| r.resource_id.as_str()).collect();
    assert_eq!(ids, vec!["early", "late"]);
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    let (pool, _container) = setup_test_db().await;
    let repo = FailureRepository::new(pool);
    let record = sample_failure("1", 1, timestamp(0));
    repo.put(&record).await.unwrap();

    assert!(repo.delete(&record.url).await.unwrap());
    assert!(!repo.delete(&record.url).await.unwrap());
    assert_eq!(repo.get(&record.url).await.unwrap(), None);
}

#[tokio::test]
async fn test_delete_all() {
    let (pool, _container) = setup_test_db().await;
    let repo = FailureRepository::new(pool);
    for id in ["a", "b", "c"] {
        repo.put(&sample_failure(id, 1, timestamp(0))).await.unwrap();
    }

    assert_eq!(repo.delete_all().await.unwrap(), 3);
    assert!(repo.get_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_ensure_schema_is_idempotent() {
    let (pool, _container) = setup_test_db().await;

    retag_db::ensure_schema(&pool).await.unwrap();
    retag_db::ensure_schema(&pool).await.unwrap();
}
