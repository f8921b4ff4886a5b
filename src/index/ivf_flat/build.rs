//! Build phase for IVF-Flat index.
//!
//! 1. Train `nlist` centroids on the float column with k-means.
//! 2. Assign every row to its closest centroid under the field metric.
//! 3. Keep per-list position vectors, sorted ascending.

use std::time::Instant;
use tracing::{debug, info};

use crate::config::IndexingConfig;
use crate::error::{QuiverError, Result};
use crate::index::distance::float_distance;
use crate::index::VectorColumn;
use crate::types::DistanceMetric;

use super::kmeans::{train_kmeans, KMeansParams};
use super::IvfFlatIndex;

/// Build an IVF-Flat index over `column`.
///
/// An empty column yields an index with no lists; every search on it
/// returns nothing.
pub fn build_ivf_flat(
    column: VectorColumn,
    metric: DistanceMetric,
    nlist: usize,
    config: &IndexingConfig,
) -> Result<IvfFlatIndex> {
    let dim = match &column {
        VectorColumn::Float { dim, .. } => *dim,
        VectorColumn::Binary { .. } => {
            return Err(QuiverError::Index(
                "IVF-Flat requires a float vector column".into(),
            ))
        }
    };
    if dim == 0 {
        return Err(QuiverError::Index("vector dimension must be > 0".into()));
    }
    if nlist == 0 {
        return Err(QuiverError::Index("nlist must be > 0".into()));
    }

    let n = column.len();
    if n == 0 {
        debug!(dim = dim, "building empty IVF-Flat index");
        return Ok(IvfFlatIndex {
            centroids: Vec::new(),
            lists: Vec::new(),
            column,
            metric,
        });
    }

    let start = Instant::now();
    let k = nlist.min(n);
    info!(n = n, dim = dim, k = k, metric = %metric, "building IVF-Flat index");

    let rows: Vec<&[f32]> = (0..n).map(|pos| column.float_row(pos)).collect();
    let centroids = train_kmeans(
        &rows,
        dim,
        k,
        KMeansParams {
            max_iters: config.kmeans_max_iterations,
            epsilon: config.kmeans_convergence_epsilon,
            seed: config.kmeans_seed,
        },
    )?;

    let mut lists: Vec<Vec<u32>> = vec![Vec::new(); centroids.len()];
    for (pos, row) in rows.iter().enumerate() {
        let best = closest_centroid(row, &centroids, metric);
        lists[best].push(pos as u32);
    }

    for (i, list) in lists.iter().enumerate() {
        debug!(list = i, count = list.len(), "list assignment");
    }
    info!(
        num_lists = lists.len(),
        build_ms = start.elapsed().as_millis() as u64,
        "IVF-Flat build complete"
    );

    Ok(IvfFlatIndex {
        centroids,
        lists,
        column,
        metric,
    })
}

/// Index of the centroid closest to `row` under `metric`; ties go to the
/// lower index.
pub(crate) fn closest_centroid(row: &[f32], centroids: &[Vec<f32>], metric: DistanceMetric) -> usize {
    let mut best = 0usize;
    let mut best_dist = float_distance(row, &centroids[0], metric);
    for (c, centroid) in centroids.iter().enumerate().skip(1) {
        let d = float_distance(row, centroid, metric);
        if metric.compare(d, best_dist).is_lt() {
            best = c;
            best_dist = d;
        }
    }
    best
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_config() -> IndexingConfig {
        IndexingConfig {
            kmeans_seed: Some(42),
            ..IndexingConfig::default()
        }
    }

    #[test]
    fn test_every_row_assigned_once() {
        let data: Vec<f32> = (0..100).flat_map(|i| [i as f32, (i % 3) as f32]).collect();
        let column = VectorColumn::Float { dim: 2, data };
        let idx = build_ivf_flat(column, DistanceMetric::L2, 8, &seeded_config()).unwrap();

        assert_eq!(idx.num_lists(), 8);
        let mut all: Vec<u32> = idx.lists.iter().flatten().copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..100).collect::<Vec<u32>>());
    }

    #[test]
    fn test_nlist_capped_by_rows() {
        let column = VectorColumn::Float {
            dim: 1,
            data: vec![0.0, 5.0, 10.0],
        };
        let idx = build_ivf_flat(column, DistanceMetric::L2, 64, &seeded_config()).unwrap();
        assert_eq!(idx.num_lists(), 3);
    }

    #[test]
    fn test_empty_column() {
        let column = VectorColumn::Float {
            dim: 4,
            data: Vec::new(),
        };
        let idx = build_ivf_flat(column, DistanceMetric::L2, 16, &seeded_config()).unwrap();
        assert_eq!(idx.num_lists(), 0);
    }

    #[test]
    fn test_binary_column_rejected() {
        let column = VectorColumn::Binary {
            bytes_per_row: 1,
            data: vec![0xff],
        };
        let err = build_ivf_flat(column, DistanceMetric::Hamming, 4, &seeded_config()).unwrap_err();
        assert!(matches!(err, QuiverError::Index(_)));
    }

    #[test]
    fn test_closest_centroid_ip() {
        let centroids = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        assert_eq!(closest_centroid(&[0.2, 0.9], &centroids, DistanceMetric::Ip), 1);
        assert_eq!(closest_centroid(&[0.9, 0.2], &centroids, DistanceMetric::L2), 0);
    }
}
