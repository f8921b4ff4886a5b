//! Index layer for Quiver.
//!
//! Provides the `VectorIndex` trait, distance functions, the scalar
//! index, concrete vector index implementations, and the segment/catalog
//! pair that holds immutable snapshots.

pub mod catalog;
pub mod distance;
pub mod flat;
pub mod ivf_flat;
pub mod scalar;
pub mod segment;

use roaring::RoaringBitmap;

use crate::error::Result;
use crate::types::{DistanceMetric, IndexType, VectorData};

pub use catalog::Catalog;
pub use flat::FlatIndex;
pub use ivf_flat::IvfFlatIndex;
pub use scalar::{Interval, ScalarIndex};
pub use segment::{FieldIndex, Segment, SegmentBuilder};

/// A single approximate K-NN probe against one vector field.
#[derive(Debug, Clone, Copy)]
pub struct VectorProbe<'a> {
    pub query: &'a VectorData,
    pub top_k: usize,
    /// Partitions to scan. Ignored by exhaustive indexes.
    pub nprobe: usize,
    /// Positions eligible for the result. `None` means all.
    pub allowed: Option<&'a RoaringBitmap>,
}

/// A vector hit inside a segment, before id resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub pos: u32,
    pub distance: f32,
}

/// Read-only vector index over one field of a segment.
pub trait VectorIndex: Send + Sync + std::fmt::Debug {
    /// Return up to `probe.top_k` neighbors, closest first per the metric,
    /// ties broken by position.
    fn search(&self, probe: &VectorProbe<'_>) -> Result<Vec<Neighbor>>;

    fn metric(&self) -> DistanceMetric;

    fn index_type(&self) -> IndexType;

    /// Dimension in components (float) or bits (binary).
    fn dimension(&self) -> usize;

    fn vector_count(&self) -> usize;
}

/// Row-major vector storage shared by the index implementations.
/// Row `i` belongs to segment position `i`.
#[derive(Debug, Clone)]
pub enum VectorColumn {
    Float { dim: usize, data: Vec<f32> },
    Binary { bytes_per_row: usize, data: Vec<u8> },
}

impl VectorColumn {
    pub fn len(&self) -> usize {
        match self {
            VectorColumn::Float { dim, data } => data.len() / (*dim).max(1),
            VectorColumn::Binary {
                bytes_per_row,
                data,
            } => data.len() / (*bytes_per_row).max(1),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dimension(&self) -> usize {
        match self {
            VectorColumn::Float { dim, .. } => *dim,
            VectorColumn::Binary { bytes_per_row, .. } => bytes_per_row * 8,
        }
    }

    /// Float row `pos`. Panics on binary columns; callers dispatch first.
    pub(crate) fn float_row(&self, pos: usize) -> &[f32] {
        match self {
            VectorColumn::Float { dim, data } => &data[pos * dim..(pos + 1) * dim],
            VectorColumn::Binary { .. } => unreachable!("float row requested from binary column"),
        }
    }

    /// Distance from `query` to row `pos`, `None` when the row is not
    /// eligible under the metric.
    #[inline]
    pub(crate) fn distance_to(
        &self,
        query: &VectorData,
        pos: usize,
        metric: DistanceMetric,
    ) -> Option<f32> {
        match (self, query) {
            (VectorColumn::Float { dim, data }, VectorData::Float(q)) => Some(
                distance::float_distance(q, &data[pos * dim..(pos + 1) * dim], metric),
            ),
            (
                VectorColumn::Binary {
                    bytes_per_row,
                    data,
                },
                VectorData::Binary(q),
            ) => distance::binary_distance(
                q,
                &data[pos * bytes_per_row..(pos + 1) * bytes_per_row],
                metric,
            ),
            _ => None,
        }
    }
}

/// Sort neighbors closest-first under `metric`, ties by position, and
/// keep the first `top_k`.
pub(crate) fn rank_neighbors(
    mut neighbors: Vec<Neighbor>,
    metric: DistanceMetric,
    top_k: usize,
) -> Vec<Neighbor> {
    neighbors.sort_by(|a, b| {
        metric
            .compare(a.distance, b.distance)
            .then(a.pos.cmp(&b.pos))
    });
    neighbors.truncate(top_k);
    neighbors
}
