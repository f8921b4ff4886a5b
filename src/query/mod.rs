//! Query model: typed leaves composed into boolean trees.

pub mod boolean;
pub mod builder;
pub mod dsl;
pub mod leaf;
pub mod validate;

pub use boolean::{BooleanQuery, QueryNode};
pub use builder::QueryBuilder;
pub use dsl::{DslQuery, VectorBindings, VectorParam};
pub use leaf::{
    CompareExpr, CompareOperator, LeafKind, LeafQuery, RangeQuery, RawLeafQuery, TermQuery,
    VectorQuery,
};
pub use validate::QueryLimits;
