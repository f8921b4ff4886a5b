//! Collection schema: the per-field configuration the planner validates
//! queries against and the segment builder indexes by.

use serde::{Deserialize, Serialize};

use crate::error::{QuiverError, Result};
use crate::types::{DistanceMetric, FieldType, IndexType};

/// Configuration of a single field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    pub field_type: FieldType,
    /// Vector dimension (components for float, bits for binary).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric: Option<DistanceMetric>,
    #[serde(default)]
    pub index_type: IndexType,
    /// IVF list count; falls back to `indexing.default_nlist`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nlist: Option<usize>,
}

impl FieldSchema {
    pub fn scalar(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            dimension: None,
            metric: None,
            index_type: IndexType::Flat,
            nlist: None,
        }
    }

    pub fn float_vector(name: impl Into<String>, dimension: usize, metric: DistanceMetric) -> Self {
        Self {
            name: name.into(),
            field_type: FieldType::FloatVector,
            dimension: Some(dimension),
            metric: Some(metric),
            index_type: IndexType::Flat,
            nlist: None,
        }
    }

    pub fn binary_vector(
        name: impl Into<String>,
        dimension: usize,
        metric: DistanceMetric,
    ) -> Self {
        Self {
            name: name.into(),
            field_type: FieldType::BinaryVector,
            dimension: Some(dimension),
            metric: Some(metric),
            index_type: IndexType::Flat,
            nlist: None,
        }
    }

    /// Switch a float vector field to IVF-Flat with `nlist` lists.
    pub fn with_ivf_flat(mut self, nlist: usize) -> Self {
        self.index_type = IndexType::IvfFlat;
        self.nlist = Some(nlist);
        self
    }

    fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(QuiverError::Index("field name must not be empty".into()));
        }
        if !self.field_type.is_vector() {
            return Ok(());
        }

        let dim = self.dimension.unwrap_or(0);
        if dim == 0 {
            return Err(QuiverError::Index(format!(
                "vector field {} needs a positive dimension",
                self.name
            )));
        }
        let metric = self.metric.ok_or_else(|| {
            QuiverError::Index(format!("vector field {} has no metric", self.name))
        })?;

        match self.field_type {
            FieldType::BinaryVector => {
                if !metric.is_binary() {
                    return Err(QuiverError::Index(format!(
                        "metric {metric} is not valid for binary field {}",
                        self.name
                    )));
                }
                if dim % 8 != 0 {
                    return Err(QuiverError::Index(format!(
                        "binary field {} dimension {dim} is not a multiple of 8",
                        self.name
                    )));
                }
                if self.index_type != IndexType::Flat {
                    return Err(QuiverError::Index(format!(
                        "binary field {} only supports {} indexes",
                        self.name,
                        IndexType::Flat.display_name()
                    )));
                }
            }
            _ => {
                if metric.is_binary() {
                    return Err(QuiverError::Index(format!(
                        "metric {metric} is not valid for float field {}",
                        self.name
                    )));
                }
            }
        }

        if self.nlist == Some(0) {
            return Err(QuiverError::Index(format!(
                "field {} nlist must be > 0",
                self.name
            )));
        }
        Ok(())
    }
}

/// Schema of one collection. The collection name is always supplied by
/// the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSchema {
    pub name: String,
    pub fields: Vec<FieldSchema>,
}

impl CollectionSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: FieldSchema) -> Self {
        self.fields.push(field);
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Look up a field or fail with `UnknownField`.
    pub fn require_field(&self, name: &str) -> Result<&FieldSchema> {
        self.field(name).ok_or_else(|| QuiverError::UnknownField {
            collection: self.name.clone(),
            field: name.to_string(),
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(QuiverError::Index("collection name must not be empty".into()));
        }
        let mut seen = std::collections::HashSet::new();
        for field in &self.fields {
            if !seen.insert(field.name.as_str()) {
                return Err(QuiverError::Index(format!(
                    "duplicate field {} in collection {}",
                    field.name, self.name
                )));
            }
            field.validate()?;
        }
        Ok(())
    }
}
