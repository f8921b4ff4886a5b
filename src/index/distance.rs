//! Distance functions for vector comparison.
//!
//! Float metrics (L2, inner product) use scalar kernels written to encourage
//! auto-vectorization. Binary metrics work on packed bytes with popcount.
//!
//! Every function returns the *raw* metric value; ranking direction lives on
//! `DistanceMetric::compare`.

use crate::types::DistanceMetric;

/// Dispatch a float metric.
#[inline]
pub fn float_distance(a: &[f32], b: &[f32], metric: DistanceMetric) -> f32 {
    debug_assert!(!metric.is_binary(), "binary metric on float vectors");
    match metric {
        DistanceMetric::Ip => inner_product(a, b),
        _ => euclidean_distance(a, b),
    }
}

/// Dispatch a binary metric.
///
/// Returns `None` when the target is not eligible under the metric
/// (substructure / superstructure relation does not hold).
#[inline]
pub fn binary_distance(a: &[u8], b: &[u8], metric: DistanceMetric) -> Option<f32> {
    debug_assert!(metric.is_binary(), "float metric on binary vectors");
    match metric {
        DistanceMetric::Hamming => Some(hamming_distance(a, b)),
        DistanceMetric::Jaccard => Some(jaccard_distance(a, b)),
        DistanceMetric::Tanimoto => Some(tanimoto_distance(a, b)),
        DistanceMetric::Substructure => is_subset(a, b).then(|| jaccard_distance(a, b)),
        DistanceMetric::Superstructure => is_subset(b, a).then(|| jaccard_distance(a, b)),
        _ => Some(hamming_distance(a, b)),
    }
}

/// Squared Euclidean distance: `sum((a_i - b_i)^2)`.
///
/// Squared to avoid the sqrt cost. This preserves ordering for top-k
/// selection.
#[inline]
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "vector dimensions must match");
    let mut sum: f32 = 0.0;
    let chunks = a.len() / 8;
    let remainder = a.len() % 8;

    for i in 0..chunks {
        let base = i * 8;
        let mut tmp = [0.0f32; 8];
        for j in 0..8 {
            let d = a[base + j] - b[base + j];
            tmp[j] = d * d;
        }
        for val in tmp {
            sum += val;
        }
    }

    let base = chunks * 8;
    for i in 0..remainder {
        let d = a[base + i] - b[base + i];
        sum += d * d;
    }

    sum
}

/// Inner product. Larger means closer.
#[inline]
pub fn inner_product(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "vector dimensions must match");
    let mut sum: f32 = 0.0;
    let chunks = a.len() / 8;
    let remainder = a.len() % 8;

    for i in 0..chunks {
        let base = i * 8;
        let mut tmp = [0.0f32; 8];
        for j in 0..8 {
            tmp[j] = a[base + j] * b[base + j];
        }
        for val in tmp {
            sum += val;
        }
    }

    let base = chunks * 8;
    for i in 0..remainder {
        sum += a[base + i] * b[base + i];
    }

    sum
}

/// Number of differing bits.
#[inline]
pub fn hamming_distance(a: &[u8], b: &[u8]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "vector dimensions must match");
    a.iter()
        .zip(b)
        .map(|(x, y)| (x ^ y).count_ones())
        .sum::<u32>() as f32
}

/// `(|a & b|, |a | b|)` in one pass.
#[inline]
fn intersection_union(a: &[u8], b: &[u8]) -> (u32, u32) {
    debug_assert_eq!(a.len(), b.len(), "vector dimensions must match");
    let mut inter = 0u32;
    let mut union = 0u32;
    for (x, y) in a.iter().zip(b) {
        inter += (x & y).count_ones();
        union += (x | y).count_ones();
    }
    (inter, union)
}

/// Jaccard distance `1 - |a & b| / |a | b|`, in `[0, 1]`.
///
/// Two all-zero vectors are identical (distance 0).
#[inline]
pub fn jaccard_distance(a: &[u8], b: &[u8]) -> f32 {
    let (inter, union) = intersection_union(a, b);
    if union == 0 {
        return 0.0;
    }
    1.0 - inter as f32 / union as f32
}

/// Tanimoto distance `-log2(|a & b| / |a | b|)`.
///
/// Disjoint non-empty vectors get `f32::MAX` so the value stays finite
/// and non-negative.
#[inline]
pub fn tanimoto_distance(a: &[u8], b: &[u8]) -> f32 {
    let (inter, union) = intersection_union(a, b);
    if union == 0 {
        return 0.0;
    }
    if inter == 0 {
        return f32::MAX;
    }
    let similarity = inter as f32 / union as f32;
    // similarity is in (0, 1], so the log is <= 0; clamp -0.0.
    (-similarity.log2()).max(0.0)
}

/// Whether every bit set in `sub` is also set in `sup`.
#[inline]
pub fn is_subset(sub: &[u8], sup: &[u8]) -> bool {
    debug_assert_eq!(sub.len(), sup.len(), "vector dimensions must match");
    sub.iter().zip(sup).all(|(s, p)| s & p == *s)
}
