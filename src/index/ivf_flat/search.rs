//! Search phase for IVF-Flat index.
//!
//! 1. Compute the metric from the query to all centroids.
//! 2. Select the `nprobe` closest lists.
//! 3. Scan each selected list, skipping positions outside the pre-filter.
//! 4. Return sorted top-k results.

use tracing::debug;

use crate::error::{QuiverError, Result};
use crate::index::distance::float_distance;
use crate::index::{rank_neighbors, Neighbor, VectorProbe};
use crate::types::VectorData;

use super::IvfFlatIndex;

/// Execute an IVF-Flat search against the in-memory lists.
pub fn search_ivf_flat(index: &IvfFlatIndex, probe: &VectorProbe<'_>) -> Result<Vec<Neighbor>> {
    let dim = index.column.dimension();
    let query = match probe.query {
        VectorData::Float(q) if q.len() == dim => q.as_slice(),
        other => {
            return Err(QuiverError::invalid(format!(
                "dimension mismatch: expected {} float components, got {}",
                dim,
                other.dimension()
            )))
        }
    };

    if probe.top_k == 0 || index.lists.is_empty() {
        return Ok(Vec::new());
    }

    let metric = index.metric;
    let num_lists = index.lists.len();
    let effective_nprobe = probe.nprobe.clamp(1, num_lists);

    // Rank centroids closest first; ties go to the lower list index.
    let mut centroid_dists: Vec<(usize, f32)> = index
        .centroids
        .iter()
        .enumerate()
        .map(|(i, c)| (i, float_distance(query, c, metric)))
        .collect();
    centroid_dists.sort_by(|a, b| metric.compare(a.1, b.1).then(a.0.cmp(&b.0)));

    let probe_lists: Vec<usize> = centroid_dists
        .iter()
        .take(effective_nprobe)
        .map(|(idx, _)| *idx)
        .collect();

    debug!(
        nprobe = effective_nprobe,
        lists = ?probe_lists,
        "probing lists"
    );

    let mut candidates = Vec::new();
    let mut scanned = 0u64;
    let mut skipped = 0u64;
    for &list_idx in &probe_lists {
        for &pos in &index.lists[list_idx] {
            if let Some(allowed) = probe.allowed {
                if !allowed.contains(pos) {
                    skipped += 1;
                    continue;
                }
            }
            scanned += 1;
            let distance = float_distance(query, index.column.float_row(pos as usize), metric);
            candidates.push(Neighbor { pos, distance });
        }
    }

    crate::metrics::VECTORS_SCANNED_TOTAL
        .with_label_values(&["ivf_flat"])
        .inc_by(scanned);
    crate::metrics::PREFILTER_SKIPPED_TOTAL
        .with_label_values(&["ivf_flat"])
        .inc_by(skipped);

    let results = rank_neighbors(candidates, metric, probe.top_k);
    debug!(
        scanned = scanned,
        skipped = skipped,
        returned = results.len(),
        top_k = probe.top_k,
        "search complete"
    );

    Ok(results)
}
