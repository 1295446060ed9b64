//! Integration tests for [`fsm_redis::RedisStorage`].
//!
//! Require a running Redis; set `FSM_TEST_REDIS_URL` (default `redis://127.0.0.1:6379`) and run
//! with `cargo test -p fsm-redis -- --ignored`. Each test uses its own key prefix.

use std::time::Duration;

use futures::TryStreamExt;
use serde_json::json;

use fsm_core::{into_data_map, DataMap, FsmStorage, StateFilter, StorageOptions};
use fsm_redis::{RedisStorage, RedisStorageConfig};

fn data(value: serde_json::Value) -> DataMap {
    into_data_map(value).unwrap()
}

async fn storage(prefix: &str, options: StorageOptions) -> RedisStorage {
    let url = std::env::var("FSM_TEST_REDIS_URL")
        .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
    let prefix = format!("fsm-test-{}-{}", prefix, chrono::Utc::now().timestamp_micros());
    RedisStorage::from_url(
        &url,
        RedisStorageConfig {
            key_prefix: prefix,
            options,
        },
    )
    .await
    .expect("redis must be reachable for ignored tests")
}

/// **Test: Conversation walk-through on key "1-2-3".**
///
/// **Setup:** Fresh prefix.
/// **Action:** get_or_create, set_state, set_data, finish_state.
/// **Expected:** reads reflect each write; nothing remains after finish.
#[tokio::test]
#[ignore = "requires a running Redis"]
async fn test_conversation_scenario() {
    let storage = storage("scenario", StorageOptions::default()).await;
    assert_eq!(storage.get_or_create_state("1-2-3", None, None).await.unwrap(), None);

    storage.set_state("waiting_weight", "1-2-3", None).await.unwrap();
    let record = storage.get_state_data("1-2-3").await.unwrap();
    assert_eq!(record.state.as_deref(), Some("waiting_weight"));
    assert!(record.data.is_empty());

    storage
        .set_data(data(json!({"weight": "70"})), "1-2-3", None)
        .await
        .unwrap();
    assert_eq!(
        storage.get_data("1-2-3").await.unwrap(),
        data(json!({"weight": "70"}))
    );

    storage.finish_state("1-2-3").await.unwrap();
    storage.finish_state("1-2-3").await.unwrap();
    assert!(storage.get_data("1-2-3").await.unwrap().is_empty());
    assert!(storage.get_state_data("1-2-3").await.unwrap_err().is_not_found());
}

/// **Test: Native TTL drops both metadata and data.**
#[tokio::test]
#[ignore = "requires a running Redis"]
async fn test_ttl_expiry() {
    let storage = storage("ttl", StorageOptions::default()).await;
    storage
        .set_state_data("k", "x", data(json!({"a": 1})), Some(Duration::from_millis(150)))
        .await
        .unwrap();
    let record = storage.get_state_data("k").await.unwrap();
    assert!(record.expires_at.is_some());

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(storage.get_state_data("k").await.unwrap_err().is_not_found());
    assert!(storage.get_data("k").await.unwrap().is_empty());
    assert_eq!(storage.cleanup_expired().await.unwrap(), 0);
}

/// **Test: get_or_create keeps the existing state; set_state keeps data and created_at.**
#[tokio::test]
#[ignore = "requires a running Redis"]
async fn test_existing_record_preserved() {
    let storage = storage("existing", StorageOptions::default()).await;
    storage
        .set_state_data("k", "first", data(json!({"a": 1})), None)
        .await
        .unwrap();
    let before = storage.get_state_data("k").await.unwrap();

    assert_eq!(
        storage.get_or_create_state("k", Some("other"), None).await.unwrap().as_deref(),
        Some("first")
    );
    storage.set_state("second", "k", None).await.unwrap();
    let after = storage.get_state_data("k").await.unwrap();
    assert_eq!(after.state.as_deref(), Some("second"));
    assert_eq!(after.data, data(json!({"a": 1})));
    assert_eq!(after.created_at, before.created_at);
}

/// **Test: set_data on a missing key follows the configured policy; size cap applies.**
#[tokio::test]
#[ignore = "requires a running Redis"]
async fn test_set_data_policy_and_validation() {
    let strict = storage("strict", StorageOptions::default().with_max_data_size(32)).await;
    assert!(strict
        .set_data(data(json!({"a": 1})), "k", None)
        .await
        .unwrap_err()
        .is_not_found());
    strict.set_state("s", "k", None).await.unwrap();
    assert!(strict
        .set_data(data(json!({"long": "0123456789abcdef0123456789"})), "k", None)
        .await
        .unwrap_err()
        .is_validation());
    assert!(strict.set_state("  ", "k", None).await.unwrap_err().is_validation());

    let lenient = storage("lenient", StorageOptions::default().with_create_if_missing(true)).await;
    lenient.set_data(data(json!({"a": 1})), "k", None).await.unwrap();
    assert_eq!(lenient.get_state_data("k").await.unwrap().state, None);
}

/// **Test: Default TTL applies only when a write creates the record.**
#[tokio::test]
#[ignore = "requires a running Redis"]
async fn test_default_ttl_on_create() {
    let storage = storage(
        "default-ttl",
        StorageOptions::default().with_default_ttl(Some(Duration::from_secs(60))),
    )
    .await;
    storage.set_state("a", "k", None).await.unwrap();
    let created = storage.get_state_data("k").await.unwrap();
    assert!(created.expires_at.is_some());

    storage.set_state("b", "k", None).await.unwrap();
    let updated = storage.get_state_data("k").await.unwrap();
    assert_eq!(updated.expires_at, created.expires_at);
}

/// **Test: SCAN-based listing filters by state within the prefix.**
#[tokio::test]
#[ignore = "requires a running Redis"]
async fn test_list_states() {
    let storage = storage("list", StorageOptions::default()).await;
    for i in 0..5 {
        let state = if i % 2 == 0 { "even" } else { "odd" };
        storage.set_state(state, &format!("1-{}-1", i), None).await.unwrap();
    }
    let mut even: Vec<String> = storage
        .list_states(StateFilter::in_state("even"))
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap();
    even.sort();
    assert_eq!(even, vec!["1-0-1", "1-2-1", "1-4-1"]);

    let all: Vec<String> = storage
        .list_states(StateFilter::all())
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap();
    assert_eq!(all.len(), 5);
}
