//! k-means++ initialization and Lloyd's iteration for IVF centroid training.
//!
//! Centroid storage is pre-allocated and reused across iterations.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::error::{QuiverError, Result};
use crate::index::distance::euclidean_distance as squared_l2;

/// Training parameters, taken from `IndexingConfig`.
#[derive(Debug, Clone, Copy)]
pub struct KMeansParams {
    pub max_iters: usize,
    pub epsilon: f64,
    /// Fixed seed for reproducible centroids. `None` seeds from entropy.
    pub seed: Option<u64>,
}

/// Train `k` centroids from the given data points using k-means++
/// initialization followed by Lloyd's iterations.
///
/// Returns `min(k, vectors.len())` centroids, each of length `dim`.
pub fn train_kmeans(
    vectors: &[&[f32]],
    dim: usize,
    k: usize,
    params: KMeansParams,
) -> Result<Vec<Vec<f32>>> {
    let n = vectors.len();
    let KMeansParams {
        max_iters,
        epsilon,
        seed,
    } = params;

    if n == 0 {
        return Err(QuiverError::Index(
            "cannot train k-means on empty dataset".into(),
        ));
    }
    if k == 0 {
        return Err(QuiverError::Index("k must be > 0".into()));
    }

    // If we have fewer points than centroids, just use the points as centroids.
    let effective_k = k.min(n);
    if effective_k < k {
        warn!(
            requested_k = k,
            actual_k = effective_k,
            n = n,
            "fewer vectors than centroids, reducing k"
        );
    }

    info!(n = n, k = effective_k, dim = dim, "starting k-means++ initialization");

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut centroids = kmeans_pp_init(vectors, dim, effective_k, &mut rng);

    let mut assignments = vec![0usize; n];
    let mut counts = vec![0usize; effective_k];
    // Scratch buffer for accumulating new centroids.
    let mut new_centroids = vec![vec![0.0f32; dim]; effective_k];

    for iter in 0..max_iters {
        // Assignment step: assign each vector to the nearest centroid.
        for (i, vec) in vectors.iter().enumerate() {
            let mut best_dist = f32::MAX;
            let mut best_idx = 0usize;
            for (c, centroid) in centroids.iter().enumerate() {
                let d = squared_l2(vec, centroid);
                if d < best_dist {
                    best_dist = d;
                    best_idx = c;
                }
            }
            assignments[i] = best_idx;
        }

        // Zero the accumulators.
        for (c, new_centroid) in new_centroids.iter_mut().enumerate().take(effective_k) {
            counts[c] = 0;
            for val in new_centroid.iter_mut() {
                *val = 0.0;
            }
        }

        // Accumulate sums.
        for (i, vec) in vectors.iter().enumerate() {
            let c = assignments[i];
            counts[c] += 1;
            for d in 0..dim {
                new_centroids[c][d] += vec[d];
            }
        }

        // Compute means and track maximum centroid shift.
        let mut max_shift: f64 = 0.0;
        for (c, new_centroid) in new_centroids.iter_mut().enumerate().take(effective_k) {
            if counts[c] == 0 {
                // Empty cluster: keep old centroid (degenerate but safe).
                new_centroid.copy_from_slice(&centroids[c]);
                continue;
            }
            let inv = 1.0 / counts[c] as f32;
            for val in new_centroid.iter_mut() {
                *val *= inv;
            }
            let shift = squared_l2(&centroids[c], new_centroid) as f64;
            if shift > max_shift {
                max_shift = shift;
            }
        }

        // Swap buffers.
        std::mem::swap(&mut centroids, &mut new_centroids);

        debug!(
            iter = iter + 1,
            max_shift = max_shift,
            epsilon = epsilon,
            "k-means iteration complete"
        );

        if max_shift < epsilon {
            info!(
                iterations = iter + 1,
                max_shift = max_shift,
                "k-means converged"
            );
            return Ok(centroids);
        }
    }

    warn!(
        max_iters = max_iters,
        "k-means did not converge within iteration limit, using current centroids"
    );
    Ok(centroids)
}

/// k-means++ seeding: pick initial centroids with probability proportional
/// to squared distance from the nearest already-chosen centroid.
fn kmeans_pp_init(vectors: &[&[f32]], dim: usize, k: usize, rng: &mut StdRng) -> Vec<Vec<f32>> {
    let n = vectors.len();

    let mut centroids: Vec<Vec<f32>> = Vec::with_capacity(k);

    // Pick the first centroid uniformly at random.
    let first_idx = rng.gen_range(0..n);
    centroids.push(vectors[first_idx].to_vec());

    // Distance from each point to the nearest centroid chosen so far.
    let mut min_dists = vec![f32::MAX; n];

    for c in 1..k {
        // Update min distances with the last-added centroid.
        let last = &centroids[c - 1];
        let mut total_dist: f64 = 0.0;
        for (i, vec) in vectors.iter().enumerate() {
            let d = squared_l2(vec, last);
            if d < min_dists[i] {
                min_dists[i] = d;
            }
            total_dist += min_dists[i] as f64;
        }

        if total_dist <= 0.0 {
            // All remaining points coincide with existing centroids.
            // Fill remaining centroids with the last known centroid.
            warn!(
                chosen = c,
                k = k,
                "all remaining distances are zero, duplicating last centroid"
            );
            let last = centroids[c - 1].clone();
            centroids.resize(k, last);
            return centroids;
        }

        // Weighted random selection.
        let threshold = rng.gen::<f64>() * total_dist;
        let mut cumulative: f64 = 0.0;
        let mut chosen = n - 1; // fallback
        for (i, &d) in min_dists.iter().enumerate() {
            cumulative += d as f64;
            if cumulative >= threshold {
                chosen = i;
                break;
            }
        }

        centroids.push(vectors[chosen].to_vec());
        debug!(centroid = c, chosen_idx = chosen, "k-means++ selected centroid");
    }

    debug_assert_eq!(centroids.len(), k);
    debug_assert!(centroids.iter().all(|c| c.len() == dim));

    centroids
}
