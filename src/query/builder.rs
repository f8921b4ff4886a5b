use crate::error::Result;
use crate::schema::CollectionSchema;

use super::boolean::{BooleanQuery, QueryNode};
use super::validate::{check_structure, validate, QueryLimits};

/// Builds a validated `BooleanQuery`.
///
/// ```
/// use quiver::query::{LeafQuery, QueryBuilder, VectorQuery};
/// use quiver::types::VectorData;
///
/// let query = QueryBuilder::new()
///     .must(LeafQuery::term("field_1", vec![1, 2, 3]))
///     .must(LeafQuery::vector(VectorQuery::new(
///         "field_3",
///         vec![VectorData::Float(vec![0.0; 4])],
///         10,
///     )))
///     .build()
///     .unwrap();
/// assert_eq!(query.must.len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    root: BooleanQuery,
    limits: QueryLimits,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(mut self, limits: QueryLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn must(mut self, node: impl Into<QueryNode>) -> Self {
        self.root.must.push(node.into());
        self
    }

    pub fn should(mut self, node: impl Into<QueryNode>) -> Self {
        self.root.should.push(node.into());
        self
    }

    pub fn must_not(mut self, node: impl Into<QueryNode>) -> Self {
        self.root.must_not.push(node.into());
        self
    }

    /// Finish with the schema-independent checks.
    pub fn build(self) -> Result<BooleanQuery> {
        check_structure(&self.root, &self.limits)?;
        Ok(self.root)
    }

    /// Finish with the full checks against `schema`, including vector
    /// dimensions.
    pub fn build_for(self, schema: &CollectionSchema) -> Result<BooleanQuery> {
        validate(&self.root, schema, &self.limits)?;
        Ok(self.root)
    }
}
