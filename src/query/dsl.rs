//! Wire DSL: the `{"bool": {...}}` document clients send, with vector
//! leaves naming a placeholder instead of carrying their vectors.
//!
//! Vector parameters travel in a side document keyed by placeholder:
//!
//! ```json
//! { "placeholder_1": { "field_name": "field_3", "topk": 10, "params": { "nprobe": 64 } } }
//! ```
//!
//! Query vectors are bound to a placeholder with [`VectorBindings::bind`]
//! (or given inline as `query_vectors`) before the document is converted
//! into a [`BooleanQuery`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::boolean::{BooleanQuery, QueryNode};
use super::leaf::{
    CompareExpr, CompareOperator, LeafKind, LeafQuery, RangeQuery, TermQuery, VectorQuery,
};
use crate::error::{QuiverError, Result};
use crate::types::VectorData;

fn default_boost() -> f32 {
    1.0
}

/// Root document: exactly one `bool` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DslQuery {
    #[serde(rename = "bool")]
    pub root: DslBool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DslBool {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub must: Vec<DslNode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub should: Vec<DslNode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub must_not: Vec<DslNode>,
}

/// A clause list entry: `{"bool": {...}}`, a bare group, or a leaf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DslNode {
    Wrapped(DslQuery),
    Group(DslBool),
    Leaf(DslLeaf),
}

/// Leaf as written in the DSL; exactly one clause must be set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DslLeaf {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term: Option<TermQuery>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<DslRange>,
    /// Placeholder name resolved through [`VectorBindings`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector: Option<String>,
    #[serde(default = "default_boost")]
    pub boost: f32,
}

/// Range leaf with its comparisons keyed by operator:
/// `{"field_name": "f", "values": {"gte": "0", "lte": "100000"}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DslRange {
    pub field_name: String,
    pub values: BTreeMap<String, serde_json::Value>,
}

/// Parameters of one vector placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VectorParam {
    pub field_name: String,
    pub topk: i64,
    #[serde(default)]
    pub params: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub query_vectors: Vec<VectorData>,
}

/// Placeholder name to vector parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VectorBindings(BTreeMap<String, VectorParam>);

impl VectorBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the side document of placeholder parameters.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| QuiverError::invalid(format!("malformed vector parameters: {e}")))
    }

    pub fn insert(&mut self, placeholder: impl Into<String>, param: VectorParam) {
        self.0.insert(placeholder.into(), param);
    }

    /// Attach query vectors to a placeholder declared in the side document.
    pub fn bind(&mut self, placeholder: &str, vectors: Vec<VectorData>) -> Result<()> {
        let param = self.0.get_mut(placeholder).ok_or_else(|| {
            QuiverError::invalid(format!("no vector parameters for placeholder {placeholder:?}"))
        })?;
        param.query_vectors = vectors;
        Ok(())
    }

    pub fn get(&self, placeholder: &str) -> Option<&VectorParam> {
        self.0.get(placeholder)
    }
}

impl DslQuery {
    /// Parse a DSL document, reporting malformed input as `InvalidQuery`.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| QuiverError::invalid(format!("malformed query document: {e}")))
    }

    /// Resolve placeholders and operator maps into a `BooleanQuery`.
    pub fn into_query(self, bindings: &VectorBindings) -> Result<BooleanQuery> {
        let query = convert_bool(self.root, bindings)?;
        debug!(leaves = query.leaves().len(), "dsl document converted");
        Ok(query)
    }
}

fn convert_bool(group: DslBool, bindings: &VectorBindings) -> Result<BooleanQuery> {
    let convert_all = |nodes: Vec<DslNode>| -> Result<Vec<QueryNode>> {
        nodes
            .into_iter()
            .map(|node| convert_node(node, bindings))
            .collect()
    };
    Ok(BooleanQuery {
        must: convert_all(group.must)?,
        should: convert_all(group.should)?,
        must_not: convert_all(group.must_not)?,
    })
}

fn convert_node(node: DslNode, bindings: &VectorBindings) -> Result<QueryNode> {
    match node {
        DslNode::Wrapped(query) => Ok(QueryNode::Bool(convert_bool(query.root, bindings)?)),
        DslNode::Group(group) => Ok(QueryNode::Bool(convert_bool(group, bindings)?)),
        DslNode::Leaf(leaf) => Ok(QueryNode::Leaf(convert_leaf(leaf, bindings)?)),
    }
}

fn convert_leaf(leaf: DslLeaf, bindings: &VectorBindings) -> Result<LeafQuery> {
    let kind = match (leaf.term, leaf.range, leaf.vector) {
        (Some(term), None, None) => LeafKind::Term(term),
        (None, Some(range), None) => LeafKind::Range(convert_range(range)?),
        (None, None, Some(placeholder)) => LeafKind::Vector(resolve_vector(&placeholder, bindings)?),
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
    Ok(LeafQuery::from(kind).with_boost(leaf.boost))
}

fn convert_range(range: DslRange) -> Result<RangeQuery> {
    let mut compare_expr = Vec::with_capacity(range.values.len());
    for (key, operand) in &range.values {
        let operator = match key.to_ascii_lowercase().as_str() {
            "lt" => CompareOperator::Lt,
            "lte" => CompareOperator::Lte,
            "gt" => CompareOperator::Gt,
            "gte" => CompareOperator::Gte,
            _ => {
                return Err(QuiverError::invalid(format!(
                    "unknown range operator {key:?} on {}",
                    range.field_name
                )))
            }
        };
        let operand = match operand {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Number(n) => n.to_string(),
            other => {
                return Err(QuiverError::invalid(format!(
                    "range operand {other} on {} must be a string or number",
                    range.field_name
                )))
            }
        };
        compare_expr.push(CompareExpr::new(operator, operand));
    }
    Ok(RangeQuery {
        field_name: range.field_name,
        compare_expr,
    })
}

fn resolve_vector(placeholder: &str, bindings: &VectorBindings) -> Result<VectorQuery> {
    let param = bindings.get(placeholder).ok_or_else(|| {
        QuiverError::invalid(format!("vector placeholder {placeholder:?} is not bound"))
    })?;
    if param.query_vectors.is_empty() {
        return Err(QuiverError::invalid(format!(
            "vector placeholder {placeholder:?} has no query vectors"
        )));
    }
    let mut query = VectorQuery::new(
        param.field_name.clone(),
        param.query_vectors.clone(),
        param.topk,
    );
    query.params = param.params.clone();
    Ok(query)
}
