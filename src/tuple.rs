//! Tuples, schemas, and typed fields.
//!
//! - [`FieldType`] / [`Field`]: the two supported column types (INT and
//!   fixed-width STRING) and their values, with a big-endian wire codec
//! - [`TupleDesc`]: an immutable ordered schema
//! - [`Tuple`]: a row of field values, optionally carrying the
//!   [`RecordId`] of the heap slot it was read from

mod desc;
mod field;

pub use desc::TupleDesc;
pub use field::{CodecError, Field, FieldType, STRING_LEN};

use std::fmt;

use bytes::{Buf, BufMut};

use crate::storage::PageId;

/// `(page, slot)` pair naming the heap slot a tuple is stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    /// Page containing the tuple.
    pub page: PageId,
    /// Slot within the page.
    pub slot: u16,
}

impl RecordId {
    /// Creates a new record id.
    pub fn new(page: PageId, slot: u16) -> Self {
        Self { page, slot }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.page, self.slot)
    }
}

/// A row: a schema plus one value per field.
///
/// Tuples pulled from a heap page carry the record id of their slot;
/// tuples produced by operators (joins, aggregates) do not.
#[derive(Debug, Clone, PartialEq)]
pub struct Tuple {
    desc: TupleDesc,
    fields: Vec<Field>,
    record_id: Option<RecordId>,
}

impl Tuple {
    /// Creates a tuple from a schema and matching values.
    ///
    /// # Panics
    ///
    /// Panics if the number of values differs from the schema's field count.
    /// Type agreement per field is the caller's responsibility and is
    /// enforced where tuples enter storage.
    pub fn new(desc: TupleDesc, fields: Vec<Field>) -> Tuple {
        assert_eq!(
            desc.num_fields(),
            fields.len(),
            "tuple arity does not match schema"
        );
        Tuple {
            desc,
            fields,
            record_id: None,
        }
    }

    /// Returns the schema of this tuple.
    pub fn desc(&self) -> &TupleDesc {
        &self.desc
    }

    /// Returns the value of field `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i` is out of range.
    pub fn field(&self, i: usize) -> &Field {
        &self.fields[i]
    }

    /// Replaces the value of field `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i` is out of range.
    pub fn set_field(&mut self, i: usize, value: Field) {
        self.fields[i] = value;
    }

    /// Returns all field values in schema order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Returns the heap slot this tuple was read from, if any.
    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    /// Attaches or clears the heap slot of this tuple.
    pub fn set_record_id(&mut self, rid: Option<RecordId>) {
        self.record_id = rid;
    }

    /// Concatenates two tuples under a pre-merged schema, left fields first.
    pub fn concat(desc: TupleDesc, left: &Tuple, right: &Tuple) -> Tuple {
        let mut fields = Vec::with_capacity(desc.num_fields());
        fields.extend(left.fields.iter().cloned());
        fields.extend(right.fields.iter().cloned());
        Tuple::new(desc, fields)
    }

    /// Writes the tuple's fields in wire format, in schema order.
    pub fn write_to(&self, buf: &mut impl BufMut) {
        for field in &self.fields {
            field.write_to(buf);
        }
    }

    /// Reads a tuple of the given schema from wire format.
    ///
    /// # Errors
    ///
    /// Returns `CodecError` if any field fails to decode.
    pub fn read_from(buf: &mut impl Buf, desc: &TupleDesc) -> Result<Tuple, CodecError> {
        let mut fields = Vec::with_capacity(desc.num_fields());
        for i in 0..desc.num_fields() {
            fields.push(Field::read_from(buf, desc.field_type(i))?);
        }
        Ok(Tuple::new(desc.clone(), fields))
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, "\t")?;
            }
            write!(f, "{}", field)?;
        }
        Ok(())
    }
}
