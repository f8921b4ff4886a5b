//! Immutable collection snapshot.
//!
//! A `Segment` holds every entity of a collection at one point in time,
//! with one index per schema field. Positions are assigned in ascending
//! entity-id order, so ordering by position is ordering by id.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use roaring::RoaringBitmap;
use tracing::{debug, info};

use crate::config::IndexingConfig;
use crate::error::{QuiverError, Result};
use crate::schema::{CollectionSchema, FieldSchema};
use crate::types::{DistanceMetric, Entity, EntityId, FieldType, FieldValue, IndexType, VectorData};

use super::ivf_flat::build::build_ivf_flat;
use super::{FlatIndex, ScalarIndex, VectorColumn, VectorIndex};

/// Index state of one field.
#[derive(Debug)]
pub enum FieldIndex {
    Scalar(ScalarIndex),
    Vector(Box<dyn VectorIndex>),
    /// Index build still in progress; queries touching the field fail
    /// with `IndexUnavailable`.
    Building,
}

#[derive(Debug)]
pub struct Segment {
    schema: CollectionSchema,
    /// Entity id per position, ascending.
    ids: Vec<EntityId>,
    fields: HashMap<String, FieldIndex>,
    /// Every position in the segment.
    universe: RoaringBitmap,
}

impl Segment {
    pub fn schema(&self) -> &CollectionSchema {
        &self.schema
    }

    pub fn collection(&self) -> &str {
        &self.schema.name
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn universe(&self) -> &RoaringBitmap {
        &self.universe
    }

    pub fn id_at(&self, pos: u32) -> EntityId {
        self.ids[pos as usize]
    }

    /// Index registered for `field`.
    pub fn field_index(&self, field: &str) -> Result<&FieldIndex> {
        match self.fields.get(field) {
            Some(FieldIndex::Building) => Err(QuiverError::IndexUnavailable {
                field: field.to_string(),
            }),
            Some(index) => Ok(index),
            None => Err(QuiverError::UnknownField {
                collection: self.schema.name.clone(),
                field: field.to_string(),
            }),
        }
    }

    pub fn scalar_index(&self, field: &str) -> Result<&ScalarIndex> {
        match self.field_index(field)? {
            FieldIndex::Scalar(index) => Ok(index),
            _ => Err(QuiverError::invalid(format!(
                "field {field} is a vector field and cannot serve a scalar leaf"
            ))),
        }
    }

    pub fn vector_index(&self, field: &str) -> Result<&dyn VectorIndex> {
        match self.field_index(field)? {
            FieldIndex::Vector(index) => Ok(index.as_ref()),
            _ => Err(QuiverError::invalid(format!(
                "field {field} is a scalar field and cannot serve a vector leaf"
            ))),
        }
    }
}

/// Accumulates entities and builds a `Segment` with all field indexes.
#[derive(Debug)]
pub struct SegmentBuilder {
    schema: CollectionSchema,
    config: IndexingConfig,
    entities: Vec<Entity>,
    seen: HashSet<EntityId>,
    building: HashSet<String>,
}

impl SegmentBuilder {
    pub fn new(schema: CollectionSchema, config: &IndexingConfig) -> Result<Self> {
        schema.validate()?;
        Ok(Self {
            schema,
            config: config.clone(),
            entities: Vec::new(),
            seen: HashSet::new(),
            building: HashSet::new(),
        })
    }

    /// Add one entity. Vector fields are required; scalar fields may be
    /// absent (null).
    pub fn insert(&mut self, entity: Entity) -> Result<()> {
        if self.seen.contains(&entity.id) {
            return Err(QuiverError::Index(format!(
                "duplicate entity id {}",
                entity.id
            )));
        }
        for name in entity.fields.keys() {
            self.schema.require_field(name)?;
        }
        for field in &self.schema.fields {
            check_value(field, entity.id, entity.fields.get(&field.name))?;
        }
        self.seen.insert(entity.id);
        self.entities.push(entity);
        Ok(())
    }

    pub fn insert_batch(&mut self, entities: impl IntoIterator<Item = Entity>) -> Result<()> {
        for entity in entities {
            self.insert(entity)?;
        }
        Ok(())
    }

    /// Leave `field` without an index, as if its build had not finished.
    pub fn mark_building(&mut self, field: &str) -> Result<()> {
        self.schema.require_field(field)?;
        self.building.insert(field.to_string());
        Ok(())
    }

    pub fn build(mut self) -> Result<Segment> {
        let start = Instant::now();
        self.entities.sort_by_key(|e| e.id);
        let ids: Vec<EntityId> = self.entities.iter().map(|e| e.id).collect();
        let universe: RoaringBitmap = (0..ids.len() as u32).collect();

        let mut fields = HashMap::with_capacity(self.schema.fields.len());
        for field in &self.schema.fields {
            let index = if self.building.contains(&field.name) {
                debug!(field = %field.name, "index marked as building");
                FieldIndex::Building
            } else if field.field_type.is_vector() {
                FieldIndex::Vector(self.build_vector(field)?)
            } else {
                FieldIndex::Scalar(self.build_scalar(field))
            };
            fields.insert(field.name.clone(), index);
        }

        info!(
            collection = %self.schema.name,
            entities = ids.len(),
            fields = fields.len(),
            build_ms = start.elapsed().as_millis() as u64,
            "segment built"
        );

        Ok(Segment {
            schema: self.schema,
            ids,
            fields,
            universe,
        })
    }

    fn build_scalar(&self, field: &FieldSchema) -> ScalarIndex {
        if field.field_type.is_integer() {
            let values: Vec<Option<i64>> = self
                .entities
                .iter()
                .map(|e| match e.fields.get(&field.name) {
                    Some(FieldValue::Integer(v)) => Some(*v),
                    _ => None,
                })
                .collect();
            ScalarIndex::build_integer(&values)
        } else {
            let values: Vec<Option<f64>> = self
                .entities
                .iter()
                .map(|e| match e.fields.get(&field.name) {
                    Some(FieldValue::Float(v)) => Some(*v),
                    Some(FieldValue::Integer(v)) => Some(*v as f64),
                    _ => None,
                })
                .collect();
            ScalarIndex::build_float(&values)
        }
    }

    fn build_vector(&self, field: &FieldSchema) -> Result<Box<dyn VectorIndex>> {
        let start = Instant::now();
        let dim = field.dimension.unwrap_or(0);
        let metric = field.metric.unwrap_or(DistanceMetric::L2);

        let column = match field.field_type {
            FieldType::BinaryVector => {
                let bytes_per_row = dim / 8;
                let mut data = Vec::with_capacity(self.entities.len() * bytes_per_row);
                for e in &self.entities {
                    if let Some(FieldValue::Vector(VectorData::Binary(v))) = e.fields.get(&field.name) {
                        data.extend_from_slice(v);
                    }
                }
                VectorColumn::Binary {
                    bytes_per_row,
                    data,
                }
            }
            _ => {
                let mut data = Vec::with_capacity(self.entities.len() * dim);
                for e in &self.entities {
                    if let Some(FieldValue::Vector(VectorData::Float(v))) = e.fields.get(&field.name) {
                        data.extend_from_slice(v);
                    }
                }
                VectorColumn::Float { dim, data }
            }
        };

        let index: Box<dyn VectorIndex> = match field.index_type {
            IndexType::Flat => Box::new(FlatIndex::new(column, metric)),
            IndexType::IvfFlat => {
                let nlist = field.nlist.unwrap_or(self.config.default_nlist);
                Box::new(build_ivf_flat(column, metric, nlist, &self.config)?)
            }
        };

        crate::metrics::INDEX_BUILD_DURATION
            .with_label_values(&[&self.schema.name, index_label(field.index_type)])
            .observe(start.elapsed().as_secs_f64());
        debug!(
            field = %field.name,
            index_type = field.index_type.display_name(),
            vectors = index.vector_count(),
            "vector index built"
        );
        Ok(index)
    }
}

fn index_label(index_type: IndexType) -> &'static str {
    match index_type {
        IndexType::Flat => "flat",
        IndexType::IvfFlat => "ivf_flat",
    }
}

/// Check that `value` fits `field`.
fn check_value(field: &FieldSchema, id: EntityId, value: Option<&FieldValue>) -> Result<()> {
    let reject = |what: &str| {
        Err(QuiverError::Index(format!(
            "entity {id}: field {} {what}",
            field.name
        )))
    };
    match (field.field_type, value) {
        (FieldType::FloatVector | FieldType::BinaryVector, None) => reject("is missing"),
        (_, None) => Ok(()),
        (FieldType::Int32, Some(FieldValue::Integer(v))) => {
            if i32::try_from(*v).is_err() {
                return reject("is out of range for int32");
            }
            Ok(())
        }
        (FieldType::Int64, Some(FieldValue::Integer(_))) => Ok(()),
        (FieldType::Float | FieldType::Double, Some(FieldValue::Integer(_) | FieldValue::Float(_))) => {
            Ok(())
        }
        (FieldType::FloatVector, Some(FieldValue::Vector(VectorData::Float(v)))) => {
            if Some(v.len()) != field.dimension {
                return reject("has the wrong dimension");
            }
            if v.iter().any(|x| !x.is_finite()) {
                return reject("has a non-finite component");
            }
            Ok(())
        }
        (FieldType::BinaryVector, Some(FieldValue::Vector(VectorData::Binary(v)))) => {
            if Some(v.len() * 8) != field.dimension {
                return reject("has the wrong dimension");
            }
            Ok(())
        }
        _ => reject("has a value of the wrong type"),
    }
}
