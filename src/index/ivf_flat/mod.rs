//! IVF-Flat index implementation.
//!
//! An Inverted File index with flat (uncompressed) vector storage.
//! Rows are partitioned into lists via k-means, and at search time
//! only the `nprobe` closest lists are scanned.

pub mod build;
pub mod kmeans;
pub mod search;

use crate::error::Result;
use crate::types::{DistanceMetric, IndexType};

use super::{Neighbor, VectorColumn, VectorIndex, VectorProbe};

/// Built IVF-Flat index over one float vector field of a segment.
#[derive(Debug, Clone)]
pub struct IvfFlatIndex {
    /// Centroid vectors, one per list.  `centroids[i].len() == dim`.
    pub(crate) centroids: Vec<Vec<f32>>,
    /// Segment positions assigned to each list, ascending.
    pub(crate) lists: Vec<Vec<u32>>,
    /// Full-precision rows, indexed by position.
    pub(crate) column: VectorColumn,
    pub(crate) metric: DistanceMetric,
}

impl IvfFlatIndex {
    /// Number of inverted lists (centroids) in this index.
    pub fn num_lists(&self) -> usize {
        self.lists.len()
    }
}

impl VectorIndex for IvfFlatIndex {
    fn search(&self, probe: &VectorProbe<'_>) -> Result<Vec<Neighbor>> {
        search::search_ivf_flat(self, probe)
    }

    fn metric(&self) -> DistanceMetric {
        self.metric
    }

    fn index_type(&self) -> IndexType {
        IndexType::IvfFlat
    }

    fn dimension(&self) -> usize {
        self.column.dimension()
    }

    fn vector_count(&self) -> usize {
        self.column.len()
    }
}
