//! Plan execution.
//!
//! Scalar steps run once per query. The boolean tree is then evaluated
//! post-order for each query vector: scalar must sets narrow the eligible
//! positions, which are pushed into vector searches and nested nodes as a
//! pre-filter; must_not children are subtracted before any must vector
//! search runs.

use std::time::Instant;

use roaring::RoaringBitmap;
use tokio::sync::watch;
use tracing::debug;

use crate::error::{QuiverError, Result};
use crate::index::{Segment, VectorProbe};
use crate::merge::CandidateSet;
use crate::planner::{BoolPlan, PlanNode, QueryPlan, VectorStep};
use crate::types::{QueryResult, TopKQueryResult};

/// Run `plan` against `segment`. `cancel` is polled at every leaf boundary.
pub fn execute(
    plan: &QueryPlan<'_>,
    segment: &Segment,
    cancel: Option<&watch::Receiver<bool>>,
) -> Result<TopKQueryResult> {
    let ctx = Context {
        segment,
        cancel,
        scalar_sets: Vec::new(),
    };
    ctx.run(plan)
}

struct Context<'e> {
    segment: &'e Segment,
    cancel: Option<&'e watch::Receiver<bool>>,
    /// Result of `plan.scalar_steps[i]`.
    scalar_sets: Vec<RoaringBitmap>,
}

impl Context<'_> {
    fn run(mut self, plan: &QueryPlan<'_>) -> Result<TopKQueryResult> {
        let scalar_start = Instant::now();
        self.scalar_sets.reserve(plan.scalar_steps.len());
        for step in &plan.scalar_steps {
            self.check_cancelled()?;
            let set = step.run();
            debug!(
                field = step.field,
                estimate = step.estimate,
                matched = set.len(),
                "scalar step"
            );
            self.scalar_sets.push(set);
        }
        debug!(
            scalar_ms = scalar_start.elapsed().as_millis() as u64,
            steps = plan.scalar_steps.len(),
            "query phase: scalar pre-filter"
        );

        let tree_start = Instant::now();
        let mut results = Vec::with_capacity(plan.nq);
        for q in 0..plan.nq {
            self.check_cancelled()?;
            let candidates = self.eval_bool(plan, &plan.root, q, self.segment.universe())?;
            let hits = candidates.rank(&plan.ranking, plan.top_k, |pos| self.segment.id_at(pos));
            results.push(QueryResult { hits });
        }
        debug!(
            tree_ms = tree_start.elapsed().as_millis() as u64,
            nq = plan.nq,
            "query phase: tree evaluation"
        );

        Ok(TopKQueryResult {
            results,
            ranking: plan.ranking,
        })
    }

    fn check_cancelled(&self) -> Result<()> {
        match self.cancel {
            Some(rx) if *rx.borrow() => Err(QuiverError::Cancelled),
            _ => Ok(()),
        }
    }

    fn eval_bool(
        &self,
        plan: &QueryPlan<'_>,
        node: &BoolPlan<'_>,
        q: usize,
        allowed: &RoaringBitmap,
    ) -> Result<CandidateSet> {
        let mut eligible = allowed.clone();
        let mut scalar_score = 0.0f32;
        for &slot in &node.must_scalar {
            eligible &= &self.scalar_sets[slot];
            scalar_score += plan.scalar_steps[slot].boost;
        }
        for &slot in &node.must_not_scalar {
            eligible -= &self.scalar_sets[slot];
        }
        for child in &node.must_not {
            let excluded = self.eval_node(plan, child, q, &eligible)?;
            eligible -= excluded.positions();
        }

        if !node.has_must() {
            if node.should.is_empty() {
                return Ok(CandidateSet::from_bitmap(&eligible, 0.0));
            }
            let mut result = CandidateSet::new();
            for child in &node.should {
                result = result.union(self.eval_node(plan, child, q, &eligible)?);
            }
            return Ok(result);
        }

        let mut result: Option<CandidateSet> = None;
        for child in &node.must_bool {
            let set = self.eval_bool(plan, child, q, &eligible)?;
            eligible = set.positions();
            result = Some(match result {
                Some(r) => r.intersect(&set),
                None => set,
            });
        }
        for step in &node.must_vector {
            let set = self.eval_vector(step, q, &eligible)?;
            eligible = set.positions();
            result = Some(match result {
                Some(r) => r.intersect(&set),
                None => set,
            });
        }

        let mut result = result.unwrap_or_else(|| CandidateSet::from_bitmap(&eligible, 0.0));
        result.add_score(scalar_score);

        if !node.should.is_empty() {
            let matched = result.positions();
            for child in &node.should {
                let extra = self.eval_node(plan, child, q, &matched)?;
                result.boost_from(&extra);
            }
        }
        Ok(result)
    }

    fn eval_node(
        &self,
        plan: &QueryPlan<'_>,
        node: &PlanNode<'_>,
        q: usize,
        allowed: &RoaringBitmap,
    ) -> Result<CandidateSet> {
        match node {
            PlanNode::Scalar(slot) => {
                let matched = &self.scalar_sets[*slot] & allowed;
                Ok(CandidateSet::from_bitmap(
                    &matched,
                    plan.scalar_steps[*slot].boost,
                ))
            }
            PlanNode::Vector(step) => self.eval_vector(step, q, allowed),
            PlanNode::Bool(child) => self.eval_bool(plan, child, q, allowed),
        }
    }

    fn eval_vector(
        &self,
        step: &VectorStep<'_>,
        q: usize,
        allowed: &RoaringBitmap,
    ) -> Result<CandidateSet> {
        self.check_cancelled()?;
        if allowed.is_empty() {
            return Ok(CandidateSet::new());
        }
        let start = Instant::now();
        let unfiltered = allowed.len() == self.segment.len() as u64;
        let neighbors = step.index.search(&VectorProbe {
            query: &step.queries[q],
            top_k: step.top_k,
            nprobe: step.nprobe,
            allowed: if unfiltered { None } else { Some(allowed) },
        })?;
        debug!(
            field = step.field,
            q = q,
            eligible = allowed.len(),
            returned = neighbors.len(),
            search_us = start.elapsed().as_micros() as u64,
            "vector step"
        );
        Ok(CandidateSet::from_neighbors(
            &neighbors,
            step.metric,
            step.boost,
            step.primary,
        ))
    }
}
