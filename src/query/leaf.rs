//! Leaf queries: term, range, and vector clauses with a boost.

use serde::{Deserialize, Serialize};

use crate::error::{QuiverError, Result};
use crate::index::Interval;
use crate::types::VectorData;

fn default_boost() -> f32 {
    1.0
}

/// Membership test on an integer field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermQuery {
    pub field_name: String,
    pub values: Vec<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CompareOperator {
    Lt,
    Lte,
    Gt,
    Gte,
}

/// One comparison, e.g. `GTE "0"`. The operand is a string-encoded number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompareExpr {
    pub operator: CompareOperator,
    pub operand: String,
}

impl CompareExpr {
    pub fn new(operator: CompareOperator, operand: impl ToString) -> Self {
        Self {
            operator,
            operand: operand.to_string(),
        }
    }
}

/// Interval test on a numeric field. All expressions must hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeQuery {
    pub field_name: String,
    pub compare_expr: Vec<CompareExpr>,
}

impl RangeQuery {
    /// The tightest interval satisfying every expression.
    pub fn interval(&self) -> Result<Interval> {
        if self.compare_expr.is_empty() {
            return Err(QuiverError::invalid(format!(
                "range query on {} has no comparison expressions",
                self.field_name
            )));
        }
        let mut interval = Interval::default();
        for expr in &self.compare_expr {
            let value: f64 = expr
                .operand
                .trim()
                .parse()
                .ok()
                .filter(|v: &f64| v.is_finite())
                .ok_or_else(|| {
                    QuiverError::invalid(format!(
                        "range operand {:?} on {} is not a finite number",
                        expr.operand, self.field_name
                    ))
                })?;
            interval = match expr.operator {
                CompareOperator::Lt => interval.with_upper(value, false),
                CompareOperator::Lte => interval.with_upper(value, true),
                CompareOperator::Gt => interval.with_lower(value, false),
                CompareOperator::Gte => interval.with_lower(value, true),
            };
        }
        Ok(interval)
    }
}

/// Approximate K-NN search on a vector field, one result list per query
/// vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorQuery {
    pub field_name: String,
    pub query_vectors: Vec<VectorData>,
    /// Requested result count. Signed so that non-positive values can be
    /// represented and rejected.
    pub topk: i64,
    /// Engine-specific search parameters. Only `nprobe` is interpreted.
    #[serde(default)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

impl VectorQuery {
    pub fn new(field_name: impl Into<String>, query_vectors: Vec<VectorData>, topk: i64) -> Self {
        Self {
            field_name: field_name.into(),
            query_vectors,
            topk,
            params: serde_json::Map::new(),
        }
    }

    pub fn with_nprobe(mut self, nprobe: u64) -> Self {
        self.params.insert("nprobe".into(), serde_json::Value::from(nprobe));
        self
    }

    /// The `nprobe` param, if given. Must be a positive integer.
    pub fn nprobe(&self) -> Result<Option<usize>> {
        match self.params.get("nprobe") {
            None => Ok(None),
            Some(v) => v
                .as_u64()
                .filter(|n| *n > 0)
                .map(|n| Some(n as usize))
                .ok_or_else(|| {
                    QuiverError::invalid(format!(
                        "nprobe on {} must be a positive integer, got {v}",
                        self.field_name
                    ))
                }),
        }
    }
}

/// Which index probe a leaf asks for.
#[derive(Debug, Clone, PartialEq)]
pub enum LeafKind {
    Term(TermQuery),
    Range(RangeQuery),
    Vector(VectorQuery),
}

/// An atomic clause with its boost. Exactly one kind by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawLeafQuery", into = "RawLeafQuery")]
pub struct LeafQuery {
    pub kind: LeafKind,
    pub boost: f32,
}

impl LeafQuery {
    pub fn term(field_name: impl Into<String>, values: Vec<i64>) -> Self {
        LeafKind::Term(TermQuery {
            field_name: field_name.into(),
            values,
        })
        .into()
    }

    pub fn range(field_name: impl Into<String>, compare_expr: Vec<CompareExpr>) -> Self {
        LeafKind::Range(RangeQuery {
            field_name: field_name.into(),
            compare_expr,
        })
        .into()
    }

    pub fn vector(query: VectorQuery) -> Self {
        LeafKind::Vector(query).into()
    }

    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }

    pub fn field_name(&self) -> &str {
        match &self.kind {
            LeafKind::Term(t) => &t.field_name,
            LeafKind::Range(r) => &r.field_name,
            LeafKind::Vector(v) => &v.field_name,
        }
    }

    pub fn as_vector(&self) -> Option<&VectorQuery> {
        match &self.kind {
            LeafKind::Vector(v) => Some(v),
            _ => None,
        }
    }
}

impl From<LeafKind> for LeafQuery {
    fn from(kind: LeafKind) -> Self {
        Self {
            kind,
            boost: default_boost(),
        }
    }
}

/// Deserialized leaf with every kind optional, as a DSL payload carries
/// it: `{"term": {...}, "boost": 2.0}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawLeafQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term: Option<TermQuery>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<RangeQuery>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector: Option<VectorQuery>,
    #[serde(default = "default_boost")]
    pub boost: f32,
}

impl TryFrom<RawLeafQuery> for LeafQuery {
    type Error = QuiverError;

    fn try_from(raw: RawLeafQuery) -> Result<Self> {
        let kind = match (raw.term, raw.range, raw.vector) {
            (Some(t), None, None) => LeafKind::Term(t),
            (None, Some(r), None) => LeafKind::Range(r),
            (None, None, Some(v)) => LeafKind::Vector(v),
            (None, None, None) => {
                return Err(QuiverError::invalid(
                    "leaf query has no term, range, or vector clause",
                ))
            }
            _ => {
                return Err(QuiverError::invalid(
                    "leaf query sets more than one of term, range, vector",
                ))
            }
        };
        Ok(LeafQuery {
            kind,
            boost: raw.boost,
        })
    }
}

impl From<LeafQuery> for RawLeafQuery {
    fn from(leaf: LeafQuery) -> Self {
        let mut raw = RawLeafQuery {
            boost: leaf.boost,
            ..RawLeafQuery::default()
        };
        match leaf.kind {
            LeafKind::Term(t) => raw.term = Some(t),
            LeafKind::Range(r) => raw.range = Some(r),
            LeafKind::Vector(v) => raw.vector = Some(v),
        }
        raw
    }
}
