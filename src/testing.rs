//! Deterministic synthetic data for tests, benches, and demos.
//!
//! Vectors are pure functions of their index, so two runs over the same
//! range produce identical collections.

use crate::query::{BooleanQuery, CompareExpr, CompareOperator, LeafQuery, VectorQuery};
use crate::schema::{CollectionSchema, FieldSchema};
use crate::types::{DistanceMetric, Entity, EntityId, FieldType, FieldValue, VectorData};

/// Entity vectors for ids `from..to`: component `i` of entity `k` is
/// `(k + 100) % (i + 1)`. Empty when `to <= from`.
pub fn build_entities(from: EntityId, to: EntityId, dimension: usize) -> Vec<(EntityId, Vec<f32>)> {
    (from..to.max(from))
        .map(|k| {
            let v = (0..dimension as i64)
                .map(|i| ((k + 100).rem_euclid(i + 1)) as f32)
                .collect();
            (k, v)
        })
        .collect()
}

/// `nq` query vectors: component `j` of vector `i` is `(j + 100) % (i + 1)`.
pub fn construct_vectors(nq: usize, dimension: usize) -> Vec<VectorData> {
    (0..nq)
        .map(|i| {
            VectorData::Float(
                (0..dimension)
                    .map(|j| ((j + 100) % (i + 1)) as f32)
                    .collect(),
            )
        })
        .collect()
}

/// `field_1` and `field_2` integers, `field_3` float vectors under L2.
pub fn demo_schema(collection: &str, dimension: usize) -> CollectionSchema {
    CollectionSchema::new(collection)
        .with_field(FieldSchema::scalar("field_1", FieldType::Int64))
        .with_field(FieldSchema::scalar("field_2", FieldType::Int64))
        .with_field(FieldSchema::float_vector("field_3", dimension, DistanceMetric::L2))
}

/// Entities for `demo_schema`: both scalars equal the id.
pub fn demo_entities(from: EntityId, to: EntityId, dimension: usize) -> Vec<Entity> {
    build_entities(from, to, dimension)
        .into_iter()
        .map(|(id, v)| {
            Entity::new(id)
                .with("field_1", FieldValue::Integer(id))
                .with("field_2", FieldValue::Integer(id))
                .with("field_3", FieldValue::Vector(VectorData::Float(v)))
        })
        .collect()
}

/// Three must leaves over `demo_schema`:
/// term `field_1 in 0..10000` (boost 1), range `1 <= field_2 <= 100000`
/// (boost 2), and a top-10 vector leaf on `field_3` (boost 3).
pub fn demo_query(query_vectors: Vec<VectorData>, nprobe: u64) -> BooleanQuery {
    BooleanQuery::new()
        .must(LeafQuery::term("field_1", (0..10_000).collect()).with_boost(1.0))
        .must(
            LeafQuery::range(
                "field_2",
                vec![
                    CompareExpr::new(CompareOperator::Lte, "100000"),
                    CompareExpr::new(CompareOperator::Gte, "1"),
                ],
            )
            .with_boost(2.0),
        )
        .must(
            LeafQuery::vector(VectorQuery::new("field_3", query_vectors, 10).with_nprobe(nprobe))
                .with_boost(3.0),
        )
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_entities_formula() {
        let entities = build_entities(5, 8, 4);
        assert_eq!(entities.len(), 3);
        assert_eq!(entities[0].0, 5);
        // k = 5: 105 % 1, 105 % 2, 105 % 3, 105 % 4
        assert_eq!(entities[0].1, vec![0.0, 1.0, 0.0, 1.0]);
        assert!(build_entities(8, 5, 4).is_empty());
    }

    #[test]
    fn test_construct_vectors_formula() {
        let vectors = construct_vectors(3, 4);
        assert_eq!(vectors.len(), 3);
        assert_eq!(vectors[0], VectorData::Float(vec![0.0; 4]));
        // i = 2: (j + 100) % 3 for j = 0..4
        assert_eq!(vectors[2], VectorData::Float(vec![1.0, 2.0, 0.0, 1.0]));
    }

    #[test]
    fn test_demo_query_shape() {
        let q = demo_query(construct_vectors(2, 8), 32);
        assert_eq!(q.must.len(), 3);
        let boosts: Vec<f32> = q.leaves().iter().map(|l| l.boost).collect();
        assert_eq!(boosts, vec![1.0, 2.0, 3.0]);
    }
}
