//! Query planner.
//!
//! Validates a `BooleanQuery` against a segment's schema, binds every leaf
//! to its field index, and lays out the evaluation order:
//!
//! - scalar leaves become `ScalarStep`s, evaluated once per query and
//!   shared by all query vectors; must steps in a node run cheapest first
//! - vector leaves become `VectorStep`s carrying the probe parameters
//! - the ranking mode is fixed up front

use tracing::debug;

use crate::config::IndexingConfig;
use crate::error::{QuiverError, Result};
use crate::index::{Interval, ScalarIndex, Segment, VectorIndex};
use crate::query::validate::{validate, QueryLimits};
use crate::query::{BooleanQuery, LeafKind, LeafQuery, QueryNode, VectorQuery};
use crate::types::{DistanceMetric, Ranking, VectorData};

/// Index probe for a scalar leaf.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarProbe {
    /// Exact membership (term leaf).
    Lookup(Vec<i64>),
    /// Interval scan (range leaf).
    Scan(Interval),
}

#[derive(Debug)]
pub struct ScalarStep<'a> {
    pub field: &'a str,
    pub index: &'a ScalarIndex,
    pub probe: ScalarProbe,
    pub boost: f32,
    /// Upper bound on matching positions.
    pub estimate: u64,
}

impl ScalarStep<'_> {
    pub fn run(&self) -> roaring::RoaringBitmap {
        match &self.probe {
            ScalarProbe::Lookup(values) => self.index.lookup(values),
            ScalarProbe::Scan(interval) => self.index.scan(interval),
        }
    }
}

#[derive(Debug)]
pub struct VectorStep<'a> {
    pub field: &'a str,
    pub index: &'a dyn VectorIndex,
    pub queries: &'a [VectorData],
    pub top_k: usize,
    pub nprobe: usize,
    pub boost: f32,
    pub metric: DistanceMetric,
    /// The ranking leaf in `Distance` mode; its distances are reported.
    pub primary: bool,
}

/// A should or must_not child.
#[derive(Debug)]
pub enum PlanNode<'a> {
    /// Slot into `QueryPlan::scalar_steps`.
    Scalar(usize),
    Vector(VectorStep<'a>),
    Bool(BoolPlan<'a>),
}

/// Evaluation layout of one boolean node.
#[derive(Debug, Default)]
pub struct BoolPlan<'a> {
    /// Scalar must slots, cheapest first.
    pub must_scalar: Vec<usize>,
    pub must_not_scalar: Vec<usize>,
    pub must_bool: Vec<BoolPlan<'a>>,
    pub must_vector: Vec<VectorStep<'a>>,
    /// Vector and nested must_not children.
    pub must_not: Vec<PlanNode<'a>>,
    pub should: Vec<PlanNode<'a>>,
}

impl BoolPlan<'_> {
    pub fn has_must(&self) -> bool {
        !self.must_scalar.is_empty() || !self.must_bool.is_empty() || !self.must_vector.is_empty()
    }
}

#[derive(Debug)]
pub struct QueryPlan<'a> {
    pub root: BoolPlan<'a>,
    pub scalar_steps: Vec<ScalarStep<'a>>,
    /// Query vectors per vector leaf.
    pub nq: usize,
    /// Result length limit: the largest K of any vector leaf.
    pub top_k: usize,
    pub ranking: Ranking,
}

pub struct Planner<'a> {
    segment: &'a Segment,
    indexing: &'a IndexingConfig,
    limits: QueryLimits,
}

/// Tree-wide facts the ranking mode depends on.
struct Shape {
    vector_leaves: usize,
    any_should: bool,
}

impl<'a> Planner<'a> {
    pub fn new(segment: &'a Segment, indexing: &'a IndexingConfig, limits: QueryLimits) -> Self {
        Self {
            segment,
            indexing,
            limits,
        }
    }

    pub fn plan(&self, query: &'a BooleanQuery) -> Result<QueryPlan<'a>> {
        let nq = validate(query, self.segment.schema(), &self.limits)?;

        let mut shape = Shape {
            vector_leaves: 0,
            any_should: false,
        };
        survey(query, &mut shape);
        let single_ranking_leaf = shape.vector_leaves == 1 && !shape.any_should;

        let mut builder = PlanBuilder {
            planner: self,
            scalar_steps: Vec::new(),
            single_ranking_leaf,
            primary_metric: None,
            top_k: 0,
        };
        let root = builder.bool_plan(query, true)?;

        let ranking = match builder.primary_metric {
            Some(metric) => Ranking::Distance { metric },
            None => Ranking::Score,
        };

        debug!(
            nq = nq,
            top_k = builder.top_k,
            scalar_steps = builder.scalar_steps.len(),
            vector_leaves = shape.vector_leaves,
            ranking = ?ranking,
            "query plan built"
        );

        Ok(QueryPlan {
            root,
            scalar_steps: builder.scalar_steps,
            nq,
            top_k: builder.top_k,
            ranking,
        })
    }
}

fn survey(query: &BooleanQuery, shape: &mut Shape) {
    if !query.should.is_empty() {
        shape.any_should = true;
    }
    for node in query.must.iter().chain(&query.should).chain(&query.must_not) {
        match node {
            QueryNode::Leaf(leaf) => {
                if leaf.as_vector().is_some() {
                    shape.vector_leaves += 1;
                }
            }
            QueryNode::Bool(child) => survey(child, shape),
        }
    }
}

fn has_vector_leaf(query: &BooleanQuery) -> bool {
    query.leaves().iter().any(|leaf| leaf.as_vector().is_some())
}

struct PlanBuilder<'p, 'a> {
    planner: &'p Planner<'a>,
    scalar_steps: Vec<ScalarStep<'a>>,
    single_ranking_leaf: bool,
    primary_metric: Option<DistanceMetric>,
    top_k: usize,
}

impl<'a> PlanBuilder<'_, 'a> {
    /// `must_path` is true when every edge from the root to `query` is a
    /// must edge.
    fn bool_plan(&mut self, query: &'a BooleanQuery, must_path: bool) -> Result<BoolPlan<'a>> {
        let mut plan = BoolPlan::default();
        let mut nested = Vec::new();

        for node in &query.must {
            match node {
                QueryNode::Leaf(leaf) => match &leaf.kind {
                    LeafKind::Vector(v) => {
                        let step = self.vector_step(leaf, v, must_path)?;
                        plan.must_vector.push(step);
                    }
                    LeafKind::Term(_) | LeafKind::Range(_) => {
                        let slot = self.scalar_step(leaf)?;
                        plan.must_scalar.push(slot);
                    }
                },
                QueryNode::Bool(child) => {
                    let child_plan = self.bool_plan(child, must_path)?;
                    nested.push((has_vector_leaf(child), child_plan));
                }
            }
        }
        // Scalar-only groups narrow the eligible set before any group that
        // runs a top-K vector search. The sort is stable.
        nested.sort_by_key(|(searches_vectors, _)| *searches_vectors);
        plan.must_bool = nested.into_iter().map(|(_, child)| child).collect();

        for node in &query.must_not {
            match node {
                QueryNode::Leaf(leaf) if leaf.as_vector().is_none() => {
                    let slot = self.scalar_step(leaf)?;
                    plan.must_not_scalar.push(slot);
                }
                _ => {
                    let child = self.plan_node(node)?;
                    plan.must_not.push(child);
                }
            }
        }
        for node in &query.should {
            let child = self.plan_node(node)?;
            plan.should.push(child);
        }

        let steps = &self.scalar_steps;
        plan.must_scalar
            .sort_by_key(|slot| (steps[*slot].estimate, *slot));
        Ok(plan)
    }

    /// Plan a child reached through a should or must_not edge.
    fn plan_node(&mut self, node: &'a QueryNode) -> Result<PlanNode<'a>> {
        Ok(match node {
            QueryNode::Leaf(leaf) => match &leaf.kind {
                LeafKind::Vector(v) => PlanNode::Vector(self.vector_step(leaf, v, false)?),
                LeafKind::Term(_) | LeafKind::Range(_) => PlanNode::Scalar(self.scalar_step(leaf)?),
            },
            QueryNode::Bool(child) => PlanNode::Bool(self.bool_plan(child, false)?),
        })
    }

    fn scalar_step(&mut self, leaf: &'a LeafQuery) -> Result<usize> {
        let field = leaf.field_name();
        let probe = match &leaf.kind {
            LeafKind::Term(t) => ScalarProbe::Lookup(t.values.clone()),
            LeafKind::Range(r) => ScalarProbe::Scan(r.interval()?),
            LeafKind::Vector(_) => {
                return Err(QuiverError::invalid(format!(
                    "vector leaf on {field} cannot be planned as a scalar step"
                )))
            }
        };
        let index = self.planner.segment.scalar_index(field)?;
        let estimate = match &probe {
            ScalarProbe::Lookup(values) => index.estimate_lookup(values),
            ScalarProbe::Scan(interval) => index.estimate_scan(interval),
        };
        self.scalar_steps.push(ScalarStep {
            field,
            index,
            probe,
            boost: leaf.boost,
            estimate,
        });
        Ok(self.scalar_steps.len() - 1)
    }

    fn vector_step(
        &mut self,
        leaf: &'a LeafQuery,
        v: &'a VectorQuery,
        must_path: bool,
    ) -> Result<VectorStep<'a>> {
        let index = self.planner.segment.vector_index(&v.field_name)?;
        let indexing = self.planner.indexing;
        let nprobe = v
            .nprobe()?
            .unwrap_or(indexing.default_nprobe)
            .clamp(1, indexing.max_nprobe.max(1));
        // Validation bounds topk to 1..=max_top_k.
        let top_k = v.topk as usize;
        self.top_k = self.top_k.max(top_k);

        let primary = self.single_ranking_leaf && must_path;
        if primary {
            self.primary_metric = Some(index.metric());
        }

        Ok(VectorStep {
            field: &v.field_name,
            index,
            queries: &v.query_vectors,
            top_k,
            nprobe,
            boost: leaf.boost,
            metric: index.metric(),
            primary,
        })
    }
}
