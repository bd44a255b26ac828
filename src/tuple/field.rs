//! Typed field values and their fixed-width wire codec.

use std::fmt;

use bytes::{Buf, BufMut};

/// Fixed maximum byte length of a STRING field on the wire.
pub const STRING_LEN: usize = 128;

/// Errors from field encoding and decoding.
#[derive(Debug)]
pub enum CodecError {
    /// Fewer bytes remained than the field type requires.
    Truncated {
        /// Bytes required.
        required: usize,
        /// Bytes available.
        available: usize,
    },
    /// A string length prefix exceeded `STRING_LEN`.
    InvalidStringLength(u32),
    /// String payload was not valid UTF-8.
    InvalidUtf8,
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::Truncated {
                required,
                available,
            } => write!(f, "truncated field: need {} bytes, have {}", required, available),
            CodecError::InvalidStringLength(n) => {
                write!(f, "string length {} exceeds maximum {}", n, STRING_LEN)
            }
            CodecError::InvalidUtf8 => write!(f, "string payload is not valid utf-8"),
        }
    }
}

impl std::error::Error for CodecError {}

/// Data type of a tuple field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// 4-byte signed integer.
    Int,
    /// Fixed-width string of at most [`STRING_LEN`] bytes.
    String,
}

impl FieldType {
    /// Serialized size in bytes of a value of this type.
    ///
    /// Strings occupy a 4-byte length prefix plus the full `STRING_LEN`
    /// payload regardless of the actual string length.
    pub const fn size(&self) -> usize {
        match self {
            FieldType::Int => 4,
            FieldType::String => 4 + STRING_LEN,
        }
    }

    /// Parses a type name as it appears in schema files.
    pub fn parse(name: &str) -> Option<FieldType> {
        match name {
            "int" => Some(FieldType::Int),
            "string" => Some(FieldType::String),
            _ => None,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Int => write!(f, "int"),
            FieldType::String => write!(f, "string"),
        }
    }
}

/// A single typed field value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Field {
    /// Integer value.
    Int(i32),
    /// String value of at most [`STRING_LEN`] bytes.
    String(String),
}

impl Field {
    /// Creates a string field, truncating the input to [`STRING_LEN`] bytes.
    pub fn string(s: impl Into<String>) -> Field {
        let mut s = s.into();
        if s.len() > STRING_LEN {
            // Back off to a char boundary so truncation cannot split a
            // multi-byte sequence.
            let mut end = STRING_LEN;
            while !s.is_char_boundary(end) {
                end -= 1;
            }
            s.truncate(end);
        }
        Field::String(s)
    }

    /// Returns this value's type tag.
    pub fn field_type(&self) -> FieldType {
        match self {
            Field::Int(_) => FieldType::Int,
            Field::String(_) => FieldType::String,
        }
    }

    /// Writes this value in wire format.
    ///
    /// INT is 4 bytes big-endian; STRING is a 4-byte big-endian length
    /// followed by the payload zero-padded to `STRING_LEN` bytes.
    pub fn write_to(&self, buf: &mut impl BufMut) {
        match self {
            Field::Int(v) => buf.put_i32(*v),
            Field::String(s) => {
                buf.put_u32(s.len() as u32);
                buf.put_slice(s.as_bytes());
                buf.put_bytes(0, STRING_LEN - s.len());
            }
        }
    }

    /// Reads a value of the given type from wire format.
    ///
    /// # Errors
    ///
    /// Returns `CodecError` if the buffer is shorter than the type's fixed
    /// size, the length prefix is out of range, or the payload is not UTF-8.
    pub fn read_from(buf: &mut impl Buf, ty: FieldType) -> Result<Field, CodecError> {
        if buf.remaining() < ty.size() {
            return Err(CodecError::Truncated {
                required: ty.size(),
                available: buf.remaining(),
            });
        }
        match ty {
            FieldType::Int => Ok(Field::Int(buf.get_i32())),
            FieldType::String => {
                let len = buf.get_u32();
                if len as usize > STRING_LEN {
                    return Err(CodecError::InvalidStringLength(len));
                }
                let mut payload = vec![0u8; len as usize];
                buf.copy_to_slice(&mut payload);
                buf.advance(STRING_LEN - len as usize);
                let s = String::from_utf8(payload).map_err(|_| CodecError::InvalidUtf8)?;
                Ok(Field::String(s))
            }
        }
    }
}

impl PartialOrd for Field {
    /// Orders values of the same type; values of different types are
    /// incomparable.
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        match (self, other) {
            (Field::Int(a), Field::Int(b)) => Some(a.cmp(b)),
            (Field::String(a), Field::String(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Int(v) => write!(f, "{}", v),
            Field::String(s) => write!(f, "{}", s),
        }
    }
}
