//! Scalar field index.
//!
//! Serves both leaf kinds a scalar field can answer:
//! - exact membership lookup (term queries) through a value -> bitmap map,
//!   integer fields only
//! - interval scans (range queries) through a value-sorted position list
//!
//! All results are roaring bitmaps over segment positions so they can be
//! intersected cheaply and pushed down as vector pre-filters.

use roaring::RoaringBitmap;
use std::collections::HashMap;

/// One side of an interval: the bound value and whether it is inclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bound {
    pub value: f64,
    pub inclusive: bool,
}

/// A numeric interval. `None` sides are unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Interval {
    pub lower: Option<Bound>,
    pub upper: Option<Bound>,
}

impl Interval {
    /// Tighten the lower side, keeping the more restrictive bound.
    pub fn with_lower(mut self, value: f64, inclusive: bool) -> Self {
        let tighter = match self.lower {
            None => true,
            Some(b) => value > b.value || (value == b.value && !inclusive),
        };
        if tighter {
            self.lower = Some(Bound { value, inclusive });
        }
        self
    }

    /// Tighten the upper side, keeping the more restrictive bound.
    pub fn with_upper(mut self, value: f64, inclusive: bool) -> Self {
        let tighter = match self.upper {
            None => true,
            Some(b) => value < b.value || (value == b.value && !inclusive),
        };
        if tighter {
            self.upper = Some(Bound { value, inclusive });
        }
        self
    }

    pub fn contains(&self, v: f64) -> bool {
        if let Some(b) = self.lower {
            if v < b.value || (v == b.value && !b.inclusive) {
                return false;
            }
        }
        if let Some(b) = self.upper {
            if v > b.value || (v == b.value && !b.inclusive) {
                return false;
            }
        }
        true
    }
}

/// Exact-match and interval index over one scalar field of a segment.
#[derive(Debug, Clone, Default)]
pub struct ScalarIndex {
    /// Integer value -> positions. Empty for float fields.
    terms: HashMap<i64, RoaringBitmap>,
    /// `(value, position)` sorted by value, then position.
    sorted: Vec<(f64, u32)>,
    /// Positions with a non-null value.
    present: RoaringBitmap,
    supports_terms: bool,
}

impl ScalarIndex {
    /// Build from per-position values. `None` entries are nulls.
    pub fn build_integer(values: &[Option<i64>]) -> Self {
        let mut terms: HashMap<i64, RoaringBitmap> = HashMap::new();
        let mut sorted = Vec::with_capacity(values.len());
        let mut present = RoaringBitmap::new();
        for (pos, v) in values.iter().enumerate() {
            let Some(v) = v else { continue };
            let pos = pos as u32;
            terms.entry(*v).or_default().insert(pos);
            sorted.push((*v as f64, pos));
            present.insert(pos);
        }
        sort_by_value(&mut sorted);
        tracing::debug!(
            distinct = terms.len(),
            present = present.len(),
            "built integer scalar index"
        );
        Self {
            terms,
            sorted,
            present,
            supports_terms: true,
        }
    }

    /// Build a range-only index over float values. NaN values are treated
    /// as null.
    pub fn build_float(values: &[Option<f64>]) -> Self {
        let mut sorted = Vec::with_capacity(values.len());
        let mut present = RoaringBitmap::new();
        for (pos, v) in values.iter().enumerate() {
            let Some(v) = v.filter(|v| !v.is_nan()) else {
                continue;
            };
            sorted.push((v, pos as u32));
            present.insert(pos as u32);
        }
        sort_by_value(&mut sorted);
        Self {
            terms: HashMap::new(),
            sorted,
            present,
            supports_terms: false,
        }
    }

    /// Whether exact lookups are available (integer fields).
    pub fn supports_terms(&self) -> bool {
        self.supports_terms
    }

    /// Positions holding any of `values`.
    pub fn lookup(&self, values: &[i64]) -> RoaringBitmap {
        let mut result = RoaringBitmap::new();
        for v in values {
            if let Some(bm) = self.terms.get(v) {
                result |= bm;
            }
        }
        result
    }

    /// Positions whose value falls inside `interval`.
    pub fn scan(&self, interval: &Interval) -> RoaringBitmap {
        let (start, end) = self.bounds(interval);
        if start >= end {
            return RoaringBitmap::new();
        }
        let mut positions: Vec<u32> = self.sorted[start..end].iter().map(|(_, p)| *p).collect();
        positions.sort_unstable();
        // from_sorted_iter only fails on unsorted input.
        RoaringBitmap::from_sorted_iter(positions).unwrap_or_default()
    }

    /// Upper bound on the number of positions `lookup(values)` returns.
    pub fn estimate_lookup(&self, values: &[i64]) -> u64 {
        values
            .iter()
            .filter_map(|v| self.terms.get(v))
            .map(|bm| bm.len())
            .sum::<u64>()
            .min(self.present.len())
    }

    /// Exact number of positions `scan(interval)` returns.
    pub fn estimate_scan(&self, interval: &Interval) -> u64 {
        let (start, end) = self.bounds(interval);
        end.saturating_sub(start) as u64
    }

    /// Number of positions with a value.
    pub fn len(&self) -> u64 {
        self.present.len()
    }

    pub fn is_empty(&self) -> bool {
        self.present.is_empty()
    }

    /// Half-open index range of `sorted` covered by `interval`.
    fn bounds(&self, interval: &Interval) -> (usize, usize) {
        let start = match interval.lower {
            None => 0,
            Some(Bound {
                value,
                inclusive: true,
            }) => self.sorted.partition_point(|(v, _)| *v < value),
            Some(Bound {
                value,
                inclusive: false,
            }) => self.sorted.partition_point(|(v, _)| *v <= value),
        };
        let end = match interval.upper {
            None => self.sorted.len(),
            Some(Bound {
                value,
                inclusive: true,
            }) => self.sorted.partition_point(|(v, _)| *v <= value),
            Some(Bound {
                value,
                inclusive: false,
            }) => self.sorted.partition_point(|(v, _)| *v < value),
        };
        (start, end)
    }
}

fn sort_by_value(sorted: &mut [(f64, u32)]) {
    sorted.sort_by(|a, b| {
        a.0.partial_cmp(&b.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.1.cmp(&b.1))
    });
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn int_index() -> ScalarIndex {
        // pos: 0    1       2    3     4     5
        ScalarIndex::build_integer(&[Some(5), Some(1), None, Some(5), Some(9), Some(-3)])
    }

    fn positions(bm: &RoaringBitmap) -> Vec<u32> {
        bm.iter().collect()
    }

    #[test]
    fn test_lookup() {
        let idx = int_index();
        assert_eq!(positions(&idx.lookup(&[5])), vec![0, 3]);
        assert_eq!(positions(&idx.lookup(&[1, 9, 42])), vec![1, 4]);
        assert!(idx.lookup(&[42]).is_empty());
        assert_eq!(idx.estimate_lookup(&[5, 9]), 3);
    }

    #[test]
    fn test_scan_inclusive() {
        let idx = int_index();
        let iv = Interval::default().with_lower(1.0, true).with_upper(5.0, true);
        assert_eq!(positions(&idx.scan(&iv)), vec![0, 1, 3]);
        assert_eq!(idx.estimate_scan(&iv), 3);
    }

    #[test]
    fn test_scan_exclusive() {
        let idx = int_index();
        let iv = Interval::default().with_lower(1.0, false).with_upper(9.0, false);
        assert_eq!(positions(&idx.scan(&iv)), vec![0, 3]);
    }

    #[test]
    fn test_scan_unbounded_excludes_nulls() {
        let idx = int_index();
        assert_eq!(positions(&idx.scan(&Interval::default())), vec![0, 1, 3, 4, 5]);
        assert_eq!(idx.len(), 5);
    }

    #[test]
    fn test_scan_empty_interval() {
        let idx = int_index();
        let iv = Interval::default().with_lower(6.0, true).with_upper(2.0, true);
        assert!(idx.scan(&iv).is_empty());
        assert_eq!(idx.estimate_scan(&iv), 0);
    }

    #[test]
    fn test_interval_tightening() {
        let iv = Interval::default()
            .with_lower(0.0, true)
            .with_lower(1.0, true)
            .with_lower(1.0, false)
            .with_lower(0.5, true);
        assert_eq!(
            iv.lower,
            Some(Bound {
                value: 1.0,
                inclusive: false
            })
        );
        assert!(!iv.contains(1.0));
        assert!(iv.contains(1.5));
    }

    #[test]
    fn test_float_index_has_no_terms() {
        let idx = ScalarIndex::build_float(&[Some(0.5), Some(f64::NAN), Some(2.5)]);
        assert!(!idx.supports_terms());
        assert_eq!(idx.len(), 2);
        let iv = Interval::default().with_upper(1.0, true);
        assert_eq!(positions(&idx.scan(&iv)), vec![0]);
    }
}
