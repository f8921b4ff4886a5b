//! Result merger.
//!
//! Per-leaf partial results are `CandidateSet`s keyed by segment position.
//! Boolean semantics map onto set operations, scores add up, and `rank`
//! produces the final top-K list. Everything here is a pure function of
//! its inputs.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use roaring::RoaringBitmap;

use crate::index::Neighbor;
use crate::types::{DistanceMetric, EntityId, Ranking, SearchHit};

/// Accumulated contribution of the leaves a candidate satisfied so far.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Partial {
    /// Sum of `leaf_score * boost`.
    pub score: f32,
    /// Raw metric value from the ranking vector leaf.
    pub distance: Option<f32>,
}

impl Partial {
    fn combine(self, other: Partial) -> Partial {
        Partial {
            score: self.score + other.score,
            distance: self.distance.or(other.distance),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateSet {
    entries: BTreeMap<u32, Partial>,
}

impl CandidateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every position in `positions` with the same `score`.
    pub fn from_bitmap(positions: &RoaringBitmap, score: f32) -> Self {
        let entries = positions
            .iter()
            .map(|pos| {
                (
                    pos,
                    Partial {
                        score,
                        distance: None,
                    },
                )
            })
            .collect();
        Self { entries }
    }

    /// Vector leaf hits. `keep_distance` marks the ranking leaf, whose raw
    /// distances survive into the result.
    pub fn from_neighbors(
        neighbors: &[Neighbor],
        metric: DistanceMetric,
        boost: f32,
        keep_distance: bool,
    ) -> Self {
        let entries = neighbors
            .iter()
            .map(|n| {
                (
                    n.pos,
                    Partial {
                        score: metric.leaf_score(n.distance) * boost,
                        distance: keep_distance.then_some(n.distance),
                    },
                )
            })
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, pos: u32) -> Option<&Partial> {
        self.entries.get(&pos)
    }

    pub fn positions(&self) -> RoaringBitmap {
        // BTreeMap keys iterate in ascending order.
        RoaringBitmap::from_sorted_iter(self.entries.keys().copied()).unwrap_or_default()
    }

    /// Candidates present in both sets, contributions combined.
    pub fn intersect(mut self, other: &CandidateSet) -> CandidateSet {
        self.entries.retain(|pos, _| other.entries.contains_key(pos));
        for (pos, partial) in self.entries.iter_mut() {
            if let Some(o) = other.entries.get(pos) {
                *partial = partial.combine(*o);
            }
        }
        self
    }

    /// Candidates present in either set, contributions combined.
    pub fn union(mut self, other: CandidateSet) -> CandidateSet {
        for (pos, o) in other.entries {
            self.entries
                .entry(pos)
                .and_modify(|p| *p = p.combine(o))
                .or_insert(o);
        }
        self
    }

    /// Add `other`'s contribution to candidates already here, without
    /// adding or removing any.
    pub fn boost_from(&mut self, other: &CandidateSet) {
        for (pos, partial) in self.entries.iter_mut() {
            if let Some(o) = other.entries.get(pos) {
                *partial = partial.combine(*o);
            }
        }
    }

    /// Add `score` to every candidate.
    pub fn add_score(&mut self, score: f32) {
        if score == 0.0 {
            return;
        }
        for partial in self.entries.values_mut() {
            partial.score += score;
        }
    }

    /// Drop candidates in `excluded`.
    pub fn exclude(&mut self, excluded: &RoaringBitmap) {
        self.entries.retain(|pos, _| !excluded.contains(*pos));
    }

    /// Final ordering and truncation to `top_k`.
    ///
    /// `Distance` ranking sorts by the ranking leaf's distance in the
    /// metric's direction; `Score` ranking sorts by combined score,
    /// descending. Ties go to the smaller entity id.
    pub fn rank(
        self,
        ranking: &Ranking,
        top_k: usize,
        id_of: impl Fn(u32) -> EntityId,
    ) -> Vec<SearchHit> {
        let mut hits: Vec<SearchHit> = self
            .entries
            .into_iter()
            .map(|(pos, p)| SearchHit {
                id: id_of(pos),
                distance: p.distance,
                score: p.score,
            })
            .collect();

        match ranking {
            Ranking::Distance { metric } => hits.sort_by(|a, b| {
                compare_distance(*metric, a.distance, b.distance).then(a.id.cmp(&b.id))
            }),
            Ranking::Score => {
                hits.sort_by(|a, b| compare_score(a.score, b.score).then(a.id.cmp(&b.id)))
            }
        }
        hits.truncate(top_k);
        hits
    }
}

/// Higher score first; NaN scores go last.
fn compare_score(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.total_cmp(&a),
    }
}

/// Closer first; candidates without a distance go last.
fn compare_distance(metric: DistanceMetric, a: Option<f32>, b: Option<f32>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => metric.compare(a, b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn bitmap(positions: &[u32]) -> RoaringBitmap {
        positions.iter().copied().collect()
    }

    fn neighbors(pairs: &[(u32, f32)]) -> Vec<Neighbor> {
        pairs
            .iter()
            .map(|&(pos, distance)| Neighbor { pos, distance })
            .collect()
    }

    fn ids(hits: &[SearchHit]) -> Vec<EntityId> {
        hits.iter().map(|h| h.id).collect()
    }

    #[test]
    fn test_boosted_sum() {
        // One entity matched by a term leaf (boost 1.0) and a vector leaf
        // (boost 2.0, L2 distance 3.0).
        let term = CandidateSet::from_bitmap(&bitmap(&[7]), 1.0);
        let vector = CandidateSet::from_neighbors(&neighbors(&[(7, 3.0)]), DistanceMetric::L2, 2.0, true);
        let merged = term.intersect(&vector);
        let p = merged.get(7).unwrap();
        let expected = 1.0 * 1.0 + 2.0 * (1.0 / (1.0 + 3.0));
        assert!((p.score - expected).abs() < 1e-6);
        assert_eq!(p.distance, Some(3.0));
    }

    #[test]
    fn test_intersect_and_union() {
        let a = CandidateSet::from_bitmap(&bitmap(&[1, 2, 3]), 1.0);
        let b = CandidateSet::from_bitmap(&bitmap(&[2, 3, 4]), 0.5);
        let both = a.clone().intersect(&b);
        assert_eq!(both.positions(), bitmap(&[2, 3]));
        assert_eq!(both.get(2).unwrap().score, 1.5);

        let either = a.union(b);
        assert_eq!(either.positions(), bitmap(&[1, 2, 3, 4]));
        assert_eq!(either.get(1).unwrap().score, 1.0);
        assert_eq!(either.get(3).unwrap().score, 1.5);
        assert_eq!(either.get(4).unwrap().score, 0.5);
    }

    #[test]
    fn test_boost_from_does_not_filter() {
        let mut base = CandidateSet::from_bitmap(&bitmap(&[1, 2]), 1.0);
        let should = CandidateSet::from_bitmap(&bitmap(&[2, 9]), 3.0);
        base.boost_from(&should);
        assert_eq!(base.positions(), bitmap(&[1, 2]));
        assert_eq!(base.get(2).unwrap().score, 4.0);
    }

    #[test]
    fn test_exclude() {
        let mut set = CandidateSet::from_bitmap(&bitmap(&[1, 2, 3]), 0.0);
        set.exclude(&bitmap(&[2]));
        assert_eq!(set.positions(), bitmap(&[1, 3]));
    }

    #[test]
    fn test_rank_by_distance() {
        let set = CandidateSet::from_neighbors(
            &neighbors(&[(0, 4.0), (1, 1.0), (2, 1.0), (3, 0.5)]),
            DistanceMetric::L2,
            1.0,
            true,
        );
        let ranking = Ranking::Distance {
            metric: DistanceMetric::L2,
        };
        let hits = set.rank(&ranking, 3, |pos| pos as EntityId * 10);
        assert_eq!(ids(&hits), vec![30, 10, 20]);
    }

    #[test]
    fn test_rank_by_inner_product() {
        let set = CandidateSet::from_neighbors(
            &neighbors(&[(0, 0.2), (1, 0.9), (2, 0.5)]),
            DistanceMetric::Ip,
            1.0,
            true,
        );
        let ranking = Ranking::Distance {
            metric: DistanceMetric::Ip,
        };
        let hits = set.rank(&ranking, 10, |pos| pos as EntityId);
        assert_eq!(ids(&hits), vec![1, 2, 0]);
    }

    #[test]
    fn test_rank_by_score_ties_by_id() {
        let mut set = CandidateSet::from_bitmap(&bitmap(&[5, 1, 3]), 1.0);
        set.boost_from(&CandidateSet::from_bitmap(&bitmap(&[3]), 1.0));
        let hits = set.rank(&Ranking::Score, 10, |pos| pos as EntityId);
        assert_eq!(ids(&hits), vec![3, 1, 5]);
    }

    #[test]
    fn test_rank_with_nan_values_sorts_them_last() {
        let pairs: Vec<(u32, f32)> = (0..40)
            .map(|i| (i, if i % 3 == 0 { f32::NAN } else { i as f32 }))
            .collect();
        let set = CandidateSet::from_neighbors(&neighbors(&pairs), DistanceMetric::Ip, 1.0, true);

        let by_distance = set.clone().rank(
            &Ranking::Distance {
                metric: DistanceMetric::Ip,
            },
            40,
            |pos| pos as EntityId,
        );
        assert_eq!(&ids(&by_distance)[..3], &[38, 37, 35]);
        assert!(by_distance[26..].iter().all(|h| h.distance.unwrap().is_nan()));

        let by_score = set.rank(&Ranking::Score, 40, |pos| pos as EntityId);
        assert_eq!(&ids(&by_score)[..3], &[38, 37, 35]);
        assert!(by_score[26..].iter().all(|h| h.score.is_nan()));
    }

    #[test]
    fn test_rank_empty() {
        let hits = CandidateSet::new().rank(&Ranking::Score, 10, |pos| pos as EntityId);
        assert!(hits.is_empty());
    }
}
