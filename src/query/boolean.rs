use serde::{Deserialize, Serialize};

use super::leaf::LeafQuery;

/// A node of the query tree.
///
/// Untagged on the wire: an object carrying `term`, `range`, or `vector`
/// is a leaf, an object carrying only clause lists is a nested group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryNode {
    Leaf(LeafQuery),
    Bool(BooleanQuery),
}

impl From<LeafQuery> for QueryNode {
    fn from(leaf: LeafQuery) -> Self {
        QueryNode::Leaf(leaf)
    }
}

impl From<BooleanQuery> for QueryNode {
    fn from(query: BooleanQuery) -> Self {
        QueryNode::Bool(query)
    }
}

/// Boolean combination of clauses.
///
/// - `must`: every node must match; scores add up.
/// - `should`: adds score to matches, filters only when `must` is empty.
/// - `must_not`: matches are excluded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BooleanQuery {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub must: Vec<QueryNode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub should: Vec<QueryNode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub must_not: Vec<QueryNode>,
}

impl BooleanQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn must(mut self, node: impl Into<QueryNode>) -> Self {
        self.must.push(node.into());
        self
    }

    pub fn should(mut self, node: impl Into<QueryNode>) -> Self {
        self.should.push(node.into());
        self
    }

    pub fn must_not(mut self, node: impl Into<QueryNode>) -> Self {
        self.must_not.push(node.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.must.is_empty() && self.should.is_empty() && self.must_not.is_empty()
    }

    /// Every leaf in the tree, depth first, must before should before
    /// must_not.
    pub fn leaves(&self) -> Vec<&LeafQuery> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a LeafQuery>) {
        for node in self.must.iter().chain(&self.should).chain(&self.must_not) {
            match node {
                QueryNode::Leaf(leaf) => out.push(leaf),
                QueryNode::Bool(child) => child.collect_leaves(out),
            }
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::leaf::{CompareExpr, CompareOperator, VectorQuery};
    use crate::types::VectorData;

    #[test]
    fn test_leaves_visits_nested_groups() {
        let q = BooleanQuery::new()
            .must(LeafQuery::term("a", vec![1]))
            .should(
                BooleanQuery::new()
                    .must(LeafQuery::range("b", vec![CompareExpr::new(CompareOperator::Gt, 0)])),
            )
            .must_not(LeafQuery::term("c", vec![2]));
        let names: Vec<&str> = q.leaves().iter().map(|l| l.field_name()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_deserialize_nested_tree() {
        let q: BooleanQuery = serde_json::from_value(serde_json::json!({
            "must": [
                {"term": {"field_name": "field_1", "values": [1, 2]}},
                {"must_not": [
                    {"range": {"field_name": "field_1",
                               "compare_expr": [{"operator": "LT", "operand": "2"}]}}
                ]},
                {"vector": {"field_name": "field_3", "query_vectors": [{"float": [0.0, 1.0]}],
                            "topk": 5, "params": {"nprobe": 8}},
                 "boost": 0.5}
            ]
        }))
        .unwrap();

        assert_eq!(q.must.len(), 3);
        assert!(matches!(q.must[1], QueryNode::Bool(_)));
        let leaves = q.leaves();
        assert_eq!(leaves.len(), 3);
        let v = leaves[2].as_vector().unwrap();
        assert_eq!(v.nprobe().unwrap(), Some(8));
        assert_eq!(leaves[2].boost, 0.5);
    }

    #[test]
    fn test_unknown_clause_rejected() {
        let res = serde_json::from_value::<BooleanQuery>(serde_json::json!({"filter": []}));
        assert!(res.is_err());
    }

    #[test]
    fn test_serialize_skips_empty_clauses() {
        let q = BooleanQuery::new().must(LeafQuery::vector(VectorQuery::new(
            "v",
            vec![VectorData::Float(vec![1.0])],
            1,
        )));
        let json = serde_json::to_value(&q).unwrap();
        assert!(json.get("must").is_some());
        assert!(json.get("should").is_none());
    }
}
