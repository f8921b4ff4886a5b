//! Exhaustive (FLAT) vector index: every eligible row is compared.

use crate::error::{QuiverError, Result};
use crate::types::{DistanceMetric, IndexType};

use super::{rank_neighbors, Neighbor, VectorColumn, VectorIndex, VectorProbe};

#[derive(Debug, Clone)]
pub struct FlatIndex {
    column: VectorColumn,
    metric: DistanceMetric,
}

impl FlatIndex {
    pub fn new(column: VectorColumn, metric: DistanceMetric) -> Self {
        Self { column, metric }
    }
}

impl VectorIndex for FlatIndex {
    fn search(&self, probe: &VectorProbe<'_>) -> Result<Vec<Neighbor>> {
        if probe.query.dimension() != self.column.dimension() {
            return Err(QuiverError::invalid(format!(
                "dimension mismatch: expected {}, got {}",
                self.column.dimension(),
                probe.query.dimension()
            )));
        }
        if probe.top_k == 0 {
            return Ok(Vec::new());
        }

        let score = |pos: u32| {
            self.column
                .distance_to(probe.query, pos as usize, self.metric)
                .map(|distance| Neighbor { pos, distance })
        };

        let total = self.column.len() as u32;
        let candidates: Vec<Neighbor> = match probe.allowed {
            Some(allowed) => allowed
                .iter()
                .take_while(|p| *p < total)
                .filter_map(score)
                .collect(),
            None => (0..total).filter_map(score).collect(),
        };

        let scanned = probe
            .allowed
            .map(|a| a.len().min(total as u64))
            .unwrap_or(total as u64);
        crate::metrics::VECTORS_SCANNED_TOTAL
            .with_label_values(&["flat"])
            .inc_by(scanned);
        crate::metrics::PREFILTER_SKIPPED_TOTAL
            .with_label_values(&["flat"])
            .inc_by(total as u64 - scanned);

        Ok(rank_neighbors(candidates, self.metric, probe.top_k))
    }

    fn metric(&self) -> DistanceMetric {
        self.metric
    }

    fn index_type(&self) -> IndexType {
        IndexType::Flat
    }

    fn dimension(&self) -> usize {
        self.column.dimension()
    }

    fn vector_count(&self) -> usize {
        self.column.len()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VectorData;
    use roaring::RoaringBitmap;

    fn line_index(metric: DistanceMetric) -> FlatIndex {
        // Row i = [i, 0]
        let data: Vec<f32> = (0..10).flat_map(|i| [i as f32, 0.0]).collect();
        FlatIndex::new(VectorColumn::Float { dim: 2, data }, metric)
    }

    #[test]
    fn test_l2_nearest_first() {
        let idx = line_index(DistanceMetric::L2);
        let q = VectorData::Float(vec![3.2, 0.0]);
        let hits = idx
            .search(&VectorProbe {
                query: &q,
                top_k: 3,
                nprobe: 1,
                allowed: None,
            })
            .unwrap();
        let pos: Vec<u32> = hits.iter().map(|h| h.pos).collect();
        assert_eq!(pos, vec![3, 4, 2]);
        assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    #[test]
    fn test_ip_largest_first() {
        let idx = line_index(DistanceMetric::Ip);
        let q = VectorData::Float(vec![1.0, 0.0]);
        let hits = idx
            .search(&VectorProbe {
                query: &q,
                top_k: 2,
                nprobe: 1,
                allowed: None,
            })
            .unwrap();
        assert_eq!(hits[0].pos, 9);
        assert_eq!(hits[1].pos, 8);
    }

    #[test]
    fn test_allowed_prefilter() {
        let idx = line_index(DistanceMetric::L2);
        let q = VectorData::Float(vec![0.0, 0.0]);
        let allowed: RoaringBitmap = [5u32, 7, 9].into_iter().collect();
        let hits = idx
            .search(&VectorProbe {
                query: &q,
                top_k: 10,
                nprobe: 1,
                allowed: Some(&allowed),
            })
            .unwrap();
        let pos: Vec<u32> = hits.iter().map(|h| h.pos).collect();
        assert_eq!(pos, vec![5, 7, 9]);
    }

    #[test]
    fn test_ties_broken_by_position() {
        let data = vec![1.0, 1.0, 1.0, 1.0];
        let idx = FlatIndex::new(VectorColumn::Float { dim: 1, data }, DistanceMetric::L2);
        let q = VectorData::Float(vec![0.0]);
        let hits = idx
            .search(&VectorProbe {
                query: &q,
                top_k: 4,
                nprobe: 1,
                allowed: None,
            })
            .unwrap();
        let pos: Vec<u32> = hits.iter().map(|h| h.pos).collect();
        assert_eq!(pos, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_binary_substructure_filters_rows() {
        let data = vec![0b1100_0000, 0b0100_0000, 0b1110_0000];
        let idx = FlatIndex::new(
            VectorColumn::Binary {
                bytes_per_row: 1,
                data,
            },
            DistanceMetric::Substructure,
        );
        let q = VectorData::Binary(vec![0b1100_0000]);
        let hits = idx
            .search(&VectorProbe {
                query: &q,
                top_k: 10,
                nprobe: 1,
                allowed: None,
            })
            .unwrap();
        // Row 1 does not contain the query.
        let pos: Vec<u32> = hits.iter().map(|h| h.pos).collect();
        assert_eq!(pos, vec![0, 2]);
    }

    #[test]
    fn test_dimension_mismatch() {
        let idx = line_index(DistanceMetric::L2);
        let q = VectorData::Float(vec![0.0; 3]);
        let err = idx
            .search(&VectorProbe {
                query: &q,
                top_k: 1,
                nprobe: 1,
                allowed: None,
            })
            .unwrap_err();
        assert!(matches!(err, QuiverError::InvalidQuery(_)));
    }
}
