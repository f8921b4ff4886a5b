use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

/// A unique identifier for an entity within a collection.
pub type EntityId = i64;

/// Distance metric for vector comparison.
///
/// Float metrics (`L2`, `Ip`) apply to `FloatVector` fields; every other
/// metric applies to `BinaryVector` fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Squared Euclidean distance.
    L2,
    /// Inner product similarity.
    Ip,
    /// Number of differing bits.
    Hamming,
    /// `1 - |a & b| / |a | b|`.
    Jaccard,
    /// `-log2(|a & b| / |a | b|)`.
    Tanimoto,
    /// Jaccard distance, restricted to targets that contain the query.
    Substructure,
    /// Jaccard distance, restricted to targets contained in the query.
    Superstructure,
}

impl DistanceMetric {
    /// Whether this metric operates on packed binary vectors.
    pub fn is_binary(&self) -> bool {
        !matches!(self, DistanceMetric::L2 | DistanceMetric::Ip)
    }

    /// `true` when a smaller value means a closer vector.
    ///
    /// Only inner product ranks larger-is-closer.
    pub fn smaller_is_closer(&self) -> bool {
        !matches!(self, DistanceMetric::Ip)
    }

    /// Order two raw metric values so that the closer one comes first.
    ///
    /// Total over all floats: NaN sorts after every number in both
    /// directions.
    pub fn compare(&self, a: f32, b: f32) -> Ordering {
        match (a.is_nan(), b.is_nan()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) if self.smaller_is_closer() => a.total_cmp(&b),
            (false, false) => b.total_cmp(&a),
        }
    }

    /// Convert a raw metric value into a leaf score (higher is better).
    pub fn leaf_score(&self, value: f32) -> f32 {
        if self.smaller_is_closer() {
            1.0 / (1.0 + value)
        } else {
            value
        }
    }

    /// Human-readable metric name.
    pub fn display_name(&self) -> &'static str {
        match self {
            DistanceMetric::L2 => "L2 distance",
            DistanceMetric::Ip => "Inner product",
            DistanceMetric::Hamming => "Hamming distance",
            DistanceMetric::Jaccard => "Jaccard distance",
            DistanceMetric::Tanimoto => "Tanimoto distance",
            DistanceMetric::Substructure => "Substructure distance",
            DistanceMetric::Superstructure => "Superstructure distance",
        }
    }
}

impl std::fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DistanceMetric::L2 => write!(f, "l2"),
            DistanceMetric::Ip => write!(f, "ip"),
            DistanceMetric::Hamming => write!(f, "hamming"),
            DistanceMetric::Jaccard => write!(f, "jaccard"),
            DistanceMetric::Tanimoto => write!(f, "tanimoto"),
            DistanceMetric::Substructure => write!(f, "substructure"),
            DistanceMetric::Superstructure => write!(f, "superstructure"),
        }
    }
}

/// Index type for a vector field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexType {
    /// Exhaustive scan over every vector.
    #[default]
    Flat,
    /// Inverted File with flat (uncompressed) vectors.
    IvfFlat,
}

impl IndexType {
    pub fn display_name(&self) -> &'static str {
        match self {
            IndexType::Flat => "FLAT",
            IndexType::IvfFlat => "IVFFLAT",
        }
    }
}

/// Declared type of a collection field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Int32,
    Int64,
    Float,
    Double,
    FloatVector,
    BinaryVector,
}

impl FieldType {
    pub fn is_vector(&self) -> bool {
        matches!(self, FieldType::FloatVector | FieldType::BinaryVector)
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, FieldType::Int32 | FieldType::Int64)
    }
}

/// One vector, either float components or bit-packed binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorData {
    Float(Vec<f32>),
    /// Packed bits, most significant bit first. Dimension is `8 * len`.
    Binary(Vec<u8>),
}

impl VectorData {
    /// Dimension in components (float) or bits (binary).
    pub fn dimension(&self) -> usize {
        match self {
            VectorData::Float(v) => v.len(),
            VectorData::Binary(v) => v.len() * 8,
        }
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, VectorData::Binary(_))
    }
}

/// A field value attached to an entity at ingestion time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Float(f64),
    Vector(VectorData),
}

/// An entity with its id and per-field values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    #[serde(default)]
    pub fields: HashMap<String, FieldValue>,
}

impl Entity {
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            fields: HashMap::new(),
        }
    }

    /// Builder-style field setter.
    pub fn with(mut self, field: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(field.into(), value);
        self
    }
}

/// A single ranked hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Identifier of the matched entity.
    pub id: EntityId,
    /// Raw metric value from the ranking vector leaf, when that leaf matched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f32>,
    /// Combined boosted score over all satisfied must/should leaves.
    pub score: f32,
}

/// Ranked hits for one query vector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub hits: Vec<SearchHit>,
}

impl QueryResult {
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn ids(&self) -> Vec<EntityId> {
        self.hits.iter().map(|h| h.id).collect()
    }

    /// Position of `id` in the ranked list, if present.
    pub fn rank_of(&self, id: EntityId) -> Option<usize> {
        self.hits.iter().position(|h| h.id == id)
    }
}

/// How the hits of a result were ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Ranking {
    /// By raw metric value of the single vector leaf, closest first.
    Distance { metric: DistanceMetric },
    /// By combined boosted score, highest first.
    Score,
}

/// One ranked result list per query vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopKQueryResult {
    pub results: Vec<QueryResult>,
    pub ranking: Ranking,
}

impl TopKQueryResult {
    /// Number of query vectors answered.
    pub fn nq(&self) -> usize {
        self.results.len()
    }

    /// Rank of the expected entity for each query vector, `None` where the
    /// entity was not returned.
    pub fn self_hit_ranks(&self, expected: &[EntityId]) -> Vec<Option<usize>> {
        self.results
            .iter()
            .zip(expected)
            .map(|(r, id)| r.rank_of(*id))
            .collect()
    }
}
