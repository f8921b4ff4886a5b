//! Query validation.
//!
//! Structural checks need no schema and run when a query is built.
//! Schema checks resolve every leaf's field and run again at planning
//! time, since a tree may also arrive through deserialization.

use crate::config::EngineConfig;
use crate::error::{QuiverError, Result};
use crate::schema::{CollectionSchema, FieldSchema};
use crate::types::{FieldType, VectorData};

use super::boolean::BooleanQuery;
use super::leaf::{LeafKind, LeafQuery, VectorQuery};

/// Per-request size limits, taken from `engine` config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryLimits {
    pub max_top_k: usize,
    pub max_nq: usize,
}

impl From<&EngineConfig> for QueryLimits {
    fn from(config: &EngineConfig) -> Self {
        Self {
            max_top_k: config.max_top_k,
            max_nq: config.max_nq,
        }
    }
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

/// Check everything that does not depend on a schema. Returns the number
/// of query vectors shared by all vector leaves.
pub fn check_structure(query: &BooleanQuery, limits: &QueryLimits) -> Result<usize> {
    let mut nq: Option<usize> = None;
    for leaf in query.leaves() {
        check_boost(leaf)?;
        match &leaf.kind {
            LeafKind::Term(t) => {
                if t.values.is_empty() {
                    return Err(QuiverError::invalid(format!(
                        "term query on {} has no values",
                        t.field_name
                    )));
                }
            }
            LeafKind::Range(r) => {
                r.interval()?;
            }
            LeafKind::Vector(v) => {
                let batch = check_vector(v, limits)?;
                match nq {
                    None => nq = Some(batch),
                    Some(n) if n != batch => {
                        return Err(QuiverError::invalid(format!(
                            "vector leaves disagree on batch size: {n} vs {batch}"
                        )))
                    }
                    Some(_) => {}
                }
            }
        }
    }
    nq.ok_or_else(|| QuiverError::invalid("query has no vector leaf"))
}

/// Check every leaf against the collection schema.
pub fn check_schema(query: &BooleanQuery, schema: &CollectionSchema) -> Result<()> {
    for leaf in query.leaves() {
        let field = schema.require_field(leaf.field_name())?;
        match &leaf.kind {
            LeafKind::Term(_) if !field.field_type.is_integer() => {
                return Err(QuiverError::invalid(format!(
                    "term query needs an integer field, {} is {:?}",
                    field.name, field.field_type
                )));
            }
            LeafKind::Range(_) if field.field_type.is_vector() => {
                return Err(QuiverError::invalid(format!(
                    "range query needs a scalar field, {} is a vector field",
                    field.name
                )));
            }
            LeafKind::Vector(v) => check_vector_field(v, field)?,
            _ => {}
        }
    }
    Ok(())
}

/// Full validation. Returns the query batch size.
pub fn validate(
    query: &BooleanQuery,
    schema: &CollectionSchema,
    limits: &QueryLimits,
) -> Result<usize> {
    let nq = check_structure(query, limits)?;
    check_schema(query, schema)?;
    Ok(nq)
}

fn check_boost(leaf: &LeafQuery) -> Result<()> {
    if !leaf.boost.is_finite() || leaf.boost < 0.0 {
        return Err(QuiverError::invalid(format!(
            "boost on {} must be a finite non-negative number, got {}",
            leaf.field_name(),
            leaf.boost
        )));
    }
    Ok(())
}

fn check_vector(v: &VectorQuery, limits: &QueryLimits) -> Result<usize> {
    if v.topk <= 0 {
        return Err(QuiverError::invalid(format!(
            "topk on {} must be > 0, got {}",
            v.field_name, v.topk
        )));
    }
    if v.topk as u64 > limits.max_top_k as u64 {
        return Err(QuiverError::invalid(format!(
            "topk on {} exceeds the limit of {}",
            v.field_name, limits.max_top_k
        )));
    }
    let Some(first) = v.query_vectors.first() else {
        return Err(QuiverError::invalid(format!(
            "vector query on {} has no query vectors",
            v.field_name
        )));
    };
    if v.query_vectors.len() > limits.max_nq {
        return Err(QuiverError::invalid(format!(
            "vector query on {} has {} query vectors, limit is {}",
            v.field_name,
            v.query_vectors.len(),
            limits.max_nq
        )));
    }
    if v.query_vectors
        .iter()
        .any(|q| q.is_binary() != first.is_binary() || q.dimension() != first.dimension())
    {
        return Err(QuiverError::invalid(format!(
            "query vectors on {} differ in kind or dimension",
            v.field_name
        )));
    }
    if let VectorData::Float(values) = first {
        if v.query_vectors.iter().any(|q| match q {
            VectorData::Float(values) => values.iter().any(|x| !x.is_finite()),
            VectorData::Binary(_) => false,
        }) || values.is_empty()
        {
            return Err(QuiverError::invalid(format!(
                "query vectors on {} must be non-empty and finite",
                v.field_name
            )));
        }
    }
    v.nprobe()?;
    Ok(v.query_vectors.len())
}

fn check_vector_field(v: &VectorQuery, field: &FieldSchema) -> Result<()> {
    let binary = match field.field_type {
        FieldType::FloatVector => false,
        FieldType::BinaryVector => true,
        other => {
            return Err(QuiverError::invalid(format!(
                "vector query needs a vector field, {} is {other:?}",
                field.name
            )))
        }
    };
    let expected = field.dimension.unwrap_or(0);
    for q in &v.query_vectors {
        if q.is_binary() != binary {
            return Err(QuiverError::invalid(format!(
                "field {} holds {} vectors",
                field.name,
                if binary { "binary" } else { "float" }
            )));
        }
        if q.dimension() != expected {
            return Err(QuiverError::invalid(format!(
                "dimension mismatch on {}: expected {expected}, got {}",
                field.name,
                q.dimension()
            )));
        }
    }
    Ok(())
}
