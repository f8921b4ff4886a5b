//! Shared collections for integration tests.
//!
//! Every fixture is deterministic: vectors come from the synthetic
//! generators in `quiver::testing`, so ids and distances are stable
//! across runs.

use std::sync::Arc;

use quiver::config::Config;
use quiver::index::{Catalog, SegmentBuilder};
use quiver::schema::{CollectionSchema, FieldSchema};
use quiver::testing::{build_entities, demo_entities, demo_schema};
use quiver::types::{DistanceMetric, Entity, EntityId, FieldType, FieldValue, VectorData};
use quiver::QueryEngine;

pub const DEMO: &str = "demo";
pub const DEMO_DIM: usize = 128;
pub const DEMO_ENTITIES: EntityId = 2_000;

/// Engine over an empty catalog with default config.
pub fn empty_engine() -> QueryEngine {
    QueryEngine::new(Arc::new(Catalog::new()), &Config::default())
}

/// Engine holding the demo collection (`field_1`, `field_2`, `field_3`)
/// with ids `0..DEMO_ENTITIES`.
pub fn demo_engine() -> QueryEngine {
    let engine = empty_engine();
    publish_demo(&engine, DEMO, demo_schema(DEMO, DEMO_DIM));
    engine
}

/// Same data as `demo_engine`, `field_3` indexed with IVF-Flat.
pub fn demo_ivf_engine(nlist: usize) -> QueryEngine {
    let engine = empty_engine();
    let schema = CollectionSchema::new(DEMO)
        .with_field(FieldSchema::scalar("field_1", FieldType::Int64))
        .with_field(FieldSchema::scalar("field_2", FieldType::Int64))
        .with_field(
            FieldSchema::float_vector("field_3", DEMO_DIM, DistanceMetric::L2).with_ivf_flat(nlist),
        );
    publish_demo(&engine, DEMO, schema);
    engine
}

fn publish_demo(engine: &QueryEngine, collection: &str, schema: CollectionSchema) {
    let config = Config::default();
    let mut builder = SegmentBuilder::new(schema, &config.indexing).unwrap();
    builder
        .insert_batch(demo_entities(0, DEMO_ENTITIES, DEMO_DIM))
        .unwrap();
    let segment = builder.build().unwrap();
    assert_eq!(segment.collection(), collection);
    engine.catalog().publish(segment);
}

/// Stored vectors of `ids`, usable as query vectors that should hit
/// themselves.
pub fn stored_vectors(ids: std::ops::Range<EntityId>) -> Vec<VectorData> {
    build_entities(ids.start, ids.end, DEMO_DIM)
        .into_iter()
        .map(|(_, v)| VectorData::Float(v))
        .collect()
}

/// Line collection: entity `i` at `[i, 0]`, `bucket = i % 4`,
/// `price = i as f64 / 2`.
pub fn line_engine(n: EntityId) -> QueryEngine {
    let engine = empty_engine();
    let schema = CollectionSchema::new("line")
        .with_field(FieldSchema::scalar("bucket", FieldType::Int64))
        .with_field(FieldSchema::scalar("price", FieldType::Double))
        .with_field(FieldSchema::float_vector("v", 2, DistanceMetric::L2));
    let mut builder = SegmentBuilder::new(schema, &Config::default().indexing).unwrap();
    for id in 0..n {
        builder.insert(line_entity(id)).unwrap();
    }
    engine.catalog().publish(builder.build().unwrap());
    engine
}

pub fn line_entity(id: EntityId) -> Entity {
    Entity::new(id)
        .with("bucket", FieldValue::Integer(id % 4))
        .with("price", FieldValue::Float(id as f64 / 2.0))
        .with(
            "v",
            FieldValue::Vector(VectorData::Float(vec![id as f32, 0.0])),
        )
}

/// Binary collection with 16-bit fingerprints under `metric`.
pub fn binary_engine(metric: DistanceMetric, fingerprints: &[[u8; 2]]) -> QueryEngine {
    let engine = empty_engine();
    let schema = CollectionSchema::new("bits")
        .with_field(FieldSchema::binary_vector("fp", 16, metric));
    let mut builder = SegmentBuilder::new(schema, &Config::default().indexing).unwrap();
    for (id, fp) in fingerprints.iter().enumerate() {
        builder
            .insert(
                Entity::new(id as EntityId)
                    .with("fp", FieldValue::Vector(VectorData::Binary(fp.to_vec()))),
            )
            .unwrap();
    }
    engine.catalog().publish(builder.build().unwrap());
    engine
}
