//! Tuple schemas.

use std::fmt;
use std::sync::Arc;

use super::field::FieldType;

/// One column of a schema: a type and an optional name.
#[derive(Debug, Clone)]
struct Column {
    field_type: FieldType,
    name: Option<String>,
}

/// Ordered schema describing the fields of a tuple.
///
/// A descriptor is immutable once built and cheap to clone (the column
/// list is shared). Two descriptors compare equal when their field types
/// match position for position; names do not participate in equality.
#[derive(Debug, Clone)]
pub struct TupleDesc {
    columns: Arc<Vec<Column>>,
}

impl TupleDesc {
    /// Creates a descriptor from `(type, name)` pairs.
    pub fn new(fields: Vec<(FieldType, Option<String>)>) -> TupleDesc {
        let columns = fields
            .into_iter()
            .map(|(field_type, name)| Column { field_type, name })
            .collect();
        TupleDesc {
            columns: Arc::new(columns),
        }
    }

    /// Creates an unnamed descriptor from field types alone.
    pub fn from_types(types: impl IntoIterator<Item = FieldType>) -> TupleDesc {
        TupleDesc::new(types.into_iter().map(|t| (t, None)).collect())
    }

    /// Returns the number of fields.
    pub fn num_fields(&self) -> usize {
        self.columns.len()
    }

    /// Returns the type of field `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i` is out of range.
    pub fn field_type(&self, i: usize) -> FieldType {
        self.columns[i].field_type
    }

    /// Returns the name of field `i`, if it has one.
    ///
    /// # Panics
    ///
    /// Panics if `i` is out of range.
    pub fn field_name(&self, i: usize) -> Option<&str> {
        self.columns[i].name.as_deref()
    }

    /// Returns the index of the field with the given name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.as_deref() == Some(name))
    }

    /// Returns the serialized size in bytes of a tuple with this schema.
    pub fn tuple_size(&self) -> usize {
        self.columns.iter().map(|c| c.field_type.size()).sum()
    }

    /// Concatenates two descriptors, left fields first.
    pub fn merge(left: &TupleDesc, right: &TupleDesc) -> TupleDesc {
        let mut columns = Vec::with_capacity(left.num_fields() + right.num_fields());
        columns.extend(left.columns.iter().cloned());
        columns.extend(right.columns.iter().cloned());
        TupleDesc {
            columns: Arc::new(columns),
        }
    }
}

impl PartialEq for TupleDesc {
    fn eq(&self, other: &Self) -> bool {
        self.columns.len() == other.columns.len()
            && self
                .columns
                .iter()
                .zip(other.columns.iter())
                .all(|(a, b)| a.field_type == b.field_type)
    }
}

impl Eq for TupleDesc {}

impl fmt::Display for TupleDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, c) in self.columns.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match &c.name {
                Some(name) => write!(f, "{}({})", c.field_type, name)?,
                None => write!(f, "{}", c.field_type)?,
            }
        }
        Ok(())
    }
}
