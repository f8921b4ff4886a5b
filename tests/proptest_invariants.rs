//! Property-based tests for result invariants that must hold for every
//! valid query tree: bounded length, monotonic ordering, must_not
//! exclusion, and idempotence.

use std::sync::Arc;

use proptest::prelude::*;
use quiver::config::Config;
use quiver::index::{Catalog, SegmentBuilder};
use quiver::query::{BooleanQuery, LeafQuery, VectorQuery};
use quiver::schema::{CollectionSchema, FieldSchema};
use quiver::types::{DistanceMetric, Entity, FieldType, FieldValue, Ranking, VectorData};
use quiver::QueryEngine;

struct Fixture {
    engine: QueryEngine,
    buckets: Vec<i64>,
}

fn fixture(points: &[(i64, [f32; 2])], metric: DistanceMetric) -> Fixture {
    let schema = CollectionSchema::new("prop")
        .with_field(FieldSchema::scalar("bucket", FieldType::Int64))
        .with_field(FieldSchema::float_vector("v", 2, metric));
    let mut builder = SegmentBuilder::new(schema, &Config::default().indexing).unwrap();
    for (id, (bucket, v)) in points.iter().enumerate() {
        builder
            .insert(
                Entity::new(id as i64)
                    .with("bucket", FieldValue::Integer(*bucket))
                    .with("v", FieldValue::Vector(VectorData::Float(v.to_vec()))),
            )
            .unwrap();
    }
    let catalog = Arc::new(Catalog::new());
    catalog.publish(builder.build().unwrap());
    Fixture {
        engine: QueryEngine::new(catalog, &Config::default()),
        buckets: points.iter().map(|(b, _)| *b).collect(),
    }
}

fn points() -> impl Strategy<Value = Vec<(i64, [f32; 2])>> {
    prop::collection::vec(
        (0i64..5, prop::array::uniform2(-50.0f32..50.0)),
        1..60,
    )
}

fn vector_leaf(q: [f32; 2], topk: i64) -> LeafQuery {
    LeafQuery::vector(VectorQuery::new("v", vec![VectorData::Float(q.to_vec())], topk))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_distance_mode_bounded_and_ascending(
        pts in points(),
        q in prop::array::uniform2(-60.0f32..60.0),
        topk in 1i64..20,
        excluded in prop::collection::vec(0i64..5, 0..3),
    ) {
        let fx = fixture(&pts, DistanceMetric::L2);
        let mut query = BooleanQuery::new().must(vector_leaf(q, topk));
        if !excluded.is_empty() {
            query = query.must_not(LeafQuery::term("bucket", excluded.clone()));
        }
        let result = fx.engine.search("prop", &query).unwrap();
        prop_assert_eq!(result.ranking, Ranking::Distance { metric: DistanceMetric::L2 });

        let hits = &result.results[0].hits;
        prop_assert!(hits.len() <= topk as usize);
        for pair in hits.windows(2) {
            prop_assert!(pair[0].distance.unwrap() <= pair[1].distance.unwrap());
        }
        for hit in hits {
            prop_assert!(!excluded.contains(&fx.buckets[hit.id as usize]));
        }

        let eligible = fx.buckets.iter().filter(|b| !excluded.contains(b)).count();
        prop_assert_eq!(hits.len(), eligible.min(topk as usize));
    }

    #[test]
    fn prop_inner_product_descending(
        pts in points(),
        q in prop::array::uniform2(-60.0f32..60.0),
        topk in 1i64..20,
    ) {
        let fx = fixture(&pts, DistanceMetric::Ip);
        let query = BooleanQuery::new().must(vector_leaf(q, topk));
        let result = fx.engine.search("prop", &query).unwrap();
        for pair in result.results[0].hits.windows(2) {
            prop_assert!(pair[0].distance.unwrap() >= pair[1].distance.unwrap());
        }
    }

    #[test]
    fn prop_score_mode_descending_and_idempotent(
        pts in points(),
        q in prop::array::uniform2(-60.0f32..60.0),
        topk in 1i64..20,
        boosted in 0i64..5,
        boost in 0.0f32..10.0,
        excluded in 0i64..5,
    ) {
        let fx = fixture(&pts, DistanceMetric::L2);
        let query = BooleanQuery::new()
            .must(vector_leaf(q, topk))
            .should(LeafQuery::term("bucket", vec![boosted]).with_boost(boost))
            .must_not(LeafQuery::term("bucket", vec![excluded]));

        let first = fx.engine.search("prop", &query).unwrap();
        let second = fx.engine.search("prop", &query).unwrap();
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first.ranking, Ranking::Score);

        let hits = &first.results[0].hits;
        prop_assert!(hits.len() <= topk as usize);
        for pair in hits.windows(2) {
            prop_assert!(pair[0].score >= pair[1].score);
        }
        for hit in hits {
            prop_assert!(fx.buckets[hit.id as usize] != excluded);
        }
    }
}
