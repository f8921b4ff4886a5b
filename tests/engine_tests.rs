//! Engine-level behaviour: async execution, cancellation, snapshots.

mod common;

use std::sync::Arc;

use common::fixtures::{demo_engine, line_engine, line_entity, stored_vectors, DEMO, DEMO_DIM};
use quiver::config::Config;
use quiver::index::{Catalog, SegmentBuilder};
use quiver::query::{BooleanQuery, LeafQuery, VectorQuery};
use quiver::schema::{CollectionSchema, FieldSchema};
use quiver::testing::{construct_vectors, demo_query};
use quiver::types::{DistanceMetric, FieldType, VectorData};
use quiver::{QueryEngine, QuiverError};
use tokio::sync::watch;

fn near(x: f32, topk: i64) -> BooleanQuery {
    BooleanQuery::new().must(LeafQuery::vector(VectorQuery::new(
        "v",
        vec![VectorData::Float(vec![x, 0.0])],
        topk,
    )))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_async_queries() {
    let engine = demo_engine();
    let mut handles = Vec::new();
    for i in 0..8i64 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            let query = demo_query(stored_vectors(i + 1..i + 2), 16);
            let result = engine.search_async(DEMO, query, None).await.unwrap();
            result.results[0].ids()[0]
        }));
    }
    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.await.unwrap(), i as i64 + 1);
    }
}

#[tokio::test]
async fn test_async_matches_sync() {
    let engine = demo_engine();
    let query = demo_query(construct_vectors(3, DEMO_DIM), 16);
    let sync = engine.search(DEMO, &query).unwrap();
    let pooled = engine.search_async(DEMO, query, None).await.unwrap();
    assert_eq!(sync, pooled);
}

#[test]
fn test_cancelled_query() {
    let engine = line_engine(50);
    let (tx, rx) = watch::channel(false);
    tx.send(true).unwrap();
    let err = engine
        .search_with_cancel("line", &near(3.0, 5), &rx)
        .unwrap_err();
    assert!(matches!(err, QuiverError::Cancelled));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_cancelled_async_query() {
    let engine = line_engine(50);
    let (tx, rx) = watch::channel(false);
    tx.send(true).unwrap();
    let err = engine
        .search_async("line", near(3.0, 5), Some(rx))
        .await
        .unwrap_err();
    assert!(matches!(err, QuiverError::Cancelled));
}

#[test]
fn test_uncancelled_flag_runs() {
    let engine = line_engine(50);
    let (_tx, rx) = watch::channel(false);
    let result = engine.search_with_cancel("line", &near(3.0, 3), &rx).unwrap();
    assert_eq!(result.results[0].ids(), vec![3, 2, 4]);
}

#[test]
fn test_publish_replaces_snapshot() {
    let catalog = Arc::new(Catalog::new());
    let engine = QueryEngine::new(catalog.clone(), &Config::default());
    let schema = CollectionSchema::new("line")
        .with_field(FieldSchema::scalar("bucket", FieldType::Int64))
        .with_field(FieldSchema::scalar("price", FieldType::Double))
        .with_field(FieldSchema::float_vector("v", 2, DistanceMetric::L2));

    let mut first = SegmentBuilder::new(schema.clone(), &Config::default().indexing).unwrap();
    first.insert_batch((0..10).map(line_entity)).unwrap();
    catalog.publish(first.build().unwrap());
    let held = catalog.snapshot("line").unwrap();

    let mut second = SegmentBuilder::new(schema, &Config::default().indexing).unwrap();
    second.insert_batch((100..110).map(line_entity)).unwrap();
    let previous = catalog.publish(second.build().unwrap());
    assert!(previous.is_some());

    // New queries see the new data; the held snapshot is untouched.
    let result = engine.search("line", &near(0.0, 1)).unwrap();
    assert_eq!(result.results[0].ids(), vec![100]);
    assert_eq!(held.len(), 10);
    assert_eq!(held.id_at(0), 0);
}

#[test]
fn test_dropped_collection_not_found() {
    let engine = line_engine(5);
    engine.catalog().drop_collection("line").unwrap();
    let err = engine.search("line", &near(0.0, 1)).unwrap_err();
    assert!(matches!(err, QuiverError::CollectionNotFound { .. }));
}
