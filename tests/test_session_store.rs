//! Integration test: two-tier session storage

use ml_builder::preprocessing::PreprocessingPlanner;
use ml_builder::session::{Durability, DurableTier, InMemoryTier, Session, SessionStore};
use polars::prelude::*;
use std::sync::Arc;

fn dataset() -> DataFrame {
    df!(
        "height" => &[1.2, 1.5, 1.1, 1.9, 1.7, 1.3],
        "kind" => &["a", "b", "a", "b", "b", "a"],
        "label" => &["x", "y", "x", "y", "y", "x"],
    )
    .unwrap()
}

#[tokio::test]
async fn test_local_only_store() {
    let store = SessionStore::local_only();
    assert!(!store.has_durable_tier());

    let (id, durability) = store.create(dataset()).await;
    assert_eq!(durability, Durability::LocalOnly);
    assert!(durability.warning().is_none());

    let summaries = store.list().await;
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].session_id, id);
    assert_eq!(summaries[0].rows, 6);
}

#[tokio::test]
async fn test_put_replaces_whole_session() {
    let store = SessionStore::local_only();
    let (id, _) = store.create(dataset()).await;

    let mut session = store.get(&id).await.unwrap();
    let prepared = PreprocessingPlanner::prepare(session.dataset(), "label", "onehot").unwrap();
    session.apply_preprocessing(prepared);
    store.put(session).await;

    let reloaded = store.get(&id).await.unwrap();
    assert!(reloaded.prepared().is_some());
    assert!(reloaded.summary().has_preprocessor);
}

#[tokio::test]
async fn test_write_through_and_read_through() {
    let tier = Arc::new(InMemoryTier::new());
    let writer = SessionStore::with_durable(tier.clone());
    let (id, durability) = writer.create(dataset()).await;
    assert_eq!(durability, Durability::Persisted);

    let mut session = writer.get(&id).await.unwrap();
    let prepared = PreprocessingPlanner::prepare(session.dataset(), "label", "normalization").unwrap();
    session.apply_preprocessing(prepared);
    assert_eq!(writer.put(session).await, Durability::Persisted);

    // new store, same durable tier, cold local cache
    let reader = SessionStore::with_durable(tier.clone());
    let restored = reader.get(&id).await.unwrap();
    let prepared = restored.prepared().unwrap();
    assert_eq!(prepared.features.height(), 6);
    assert_eq!(prepared.config.numeric_columns, vec!["height"]);
    assert!(!prepared.preprocessor.is_fitted());

    // the durable copy is not consulted again once cached
    tier.set(&format!("session:{}", id), b"corrupted").await.unwrap();
    assert!(reader.get(&id).await.is_ok());
}

#[tokio::test]
async fn test_unreadable_durable_entry_is_missing() {
    let tier = Arc::new(InMemoryTier::new());
    tier.set("session:stale", b"\x00\x01\x02").await.unwrap();
    let store = SessionStore::with_durable(tier);
    assert!(store.get("stale").await.is_err());
}

#[tokio::test]
async fn test_list_reads_durable_tier() {
    let tier = Arc::new(InMemoryTier::new());
    let a = SessionStore::with_durable(tier.clone());
    let b = SessionStore::with_durable(tier.clone());
    let (first, _) = a.create(dataset()).await;
    let (second, _) = b.create(dataset().head(Some(2))).await;

    let listed = SessionStore::with_durable(tier).list().await;
    let mut ids: Vec<&str> = listed.iter().map(|s| s.session_id.as_str()).collect();
    ids.sort();
    let mut expected = vec![first.as_str(), second.as_str()];
    expected.sort();
    assert_eq!(ids, expected);

    let short = listed.iter().find(|s| s.session_id == second).unwrap();
    assert_eq!(short.rows, 2);
    assert_eq!(short.num_models, 0);
}

#[test]
fn test_snapshot_keeps_identity() {
    let session = Session::new("fixed-id", dataset());
    let bytes = session.to_bytes().unwrap();
    let restored = Session::from_bytes(&bytes).unwrap();
    assert_eq!(restored.id(), "fixed-id");
    assert_eq!(restored.created_at(), session.created_at());
    assert!(restored.dataset().equals(session.dataset()));
}
