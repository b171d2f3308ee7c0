//! Named Binary Tag codec for the 1.2-era chunk format.
//!
//! The tree is strictly hierarchical (no cyclic references), so values are
//! owned recursively. A [`Compound`] keeps its items in insertion order in a
//! `Vec` and maintains an [`IndexMap`] from name to index for lookup; both
//! share the compound's lifetime.

mod error;

#[cfg(test)]
mod tests;

use std::io::{Cursor, Read};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
pub use error::NbtError;
use indexmap::IndexMap;

pub type Result<T> = std::result::Result<T, NbtError>;

const TAG_END: u8 = 0;
const TAG_BYTE: u8 = 1;
const TAG_SHORT: u8 = 2;
const TAG_INT: u8 = 3;
const TAG_LONG: u8 = 4;
const TAG_FLOAT: u8 = 5;
const TAG_DOUBLE: u8 = 6;
const TAG_BYTE_ARRAY: u8 = 7;
const TAG_STRING: u8 = 8;
const TAG_LIST: u8 = 9;
const TAG_COMPOUND: u8 = 10;

/// A single NBT value, tagged by its own shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    ByteArray(Vec<u8>),
    String(String),
    List(List),
    Compound(Compound),
}

impl Value {
    #[must_use]
    pub const fn tag(&self) -> u8 {
        match self {
            Self::Byte(_) => TAG_BYTE,
            Self::Short(_) => TAG_SHORT,
            Self::Int(_) => TAG_INT,
            Self::Long(_) => TAG_LONG,
            Self::Float(_) => TAG_FLOAT,
            Self::Double(_) => TAG_DOUBLE,
            Self::ByteArray(_) => TAG_BYTE_ARRAY,
            Self::String(_) => TAG_STRING,
            Self::List(_) => TAG_LIST,
            Self::Compound(_) => TAG_COMPOUND,
        }
    }

    #[must_use]
    pub const fn as_byte_array(&self) -> Option<&[u8]> {
        match self {
            Self::ByteArray(bytes) => Some(bytes.as_slice()),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_compound(&self) -> Option<&Compound> {
        match self {
            Self::Compound(compound) => Some(compound),
            _ => None,
        }
    }
}

/// A homogeneous NBT list: every element shares `element_tag`, carried with no
/// per-element tag byte on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct List {
    pub element_tag: u8,
    pub items: Vec<Value>,
}

/// An ordered `(name, value)` sequence, terminated on the wire by a tag-0 byte.
///
/// Insertion order is preserved in `items`; `index` is an auxiliary lookup
/// table sharing the compound's lifetime, not a copy of the data.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Compound {
    items: Vec<(String, Value)>,
    index: IndexMap<String, usize>,
}

impl Compound {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `value` under `name`, appending it if the name is new or
    /// replacing the existing entry in place (preserving its position) if
    /// not.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        if let Some(&idx) = self.index.get(&name) {
            self.items[idx].1 = value;
            return;
        }
        let idx = self.items.len();
        self.items.push((name.clone(), value));
        self.index.insert(name, idx);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.index.get(name).map(|&idx| &self.items[idx].1)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        let idx = *self.index.get(name)?;
        Some(&mut self.items[idx].1)
    }

    #[must_use]
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.items.iter().map(|(name, value)| (name.as_str(), value))
    }
}

/// Parses a root NBT compound: a single unnamed `TAG_Compound` whose only
/// child is itself a named `TAG_Compound`.
pub fn parse(bytes: &[u8]) -> Result<Value> {
    let mut reader = Reader::new(bytes);
    let tag = reader.read_u8()?;
    if tag != TAG_COMPOUND {
        return Err(NbtError::UnknownTag(tag));
    }
    let name = reader.read_name()?;
    let compound = reader.read_compound()?;
    let mut root = Compound::new();
    root.insert(name, Value::Compound(compound));
    if reader.has_remaining() {
        return Err(NbtError::TrailingData);
    }
    Ok(Value::Compound(root))
}

/// Serializes a root value produced by [`parse`] back to its wire bytes.
#[must_use]
pub fn serialize(value: &Value) -> Vec<u8> {
    let Value::Compound(root) = value else {
        panic!("root NBT value must be a compound");
    };
    let mut out = Vec::new();
    for (name, inner) in root.iter() {
        out.push(inner.tag());
        write_name(&mut out, name);
        write_payload(&mut out, inner);
    }
    out
}

struct Reader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(bytes),
        }
    }

    fn has_remaining(&self) -> bool {
        (self.cursor.position() as usize) < self.cursor.get_ref().len()
    }

    fn read_u8(&mut self) -> Result<u8> {
        self.cursor.read_u8().map_err(|_| NbtError::Eof)
    }

    fn read_i8(&mut self) -> Result<i8> {
        self.cursor.read_i8().map_err(|_| NbtError::Eof)
    }

    fn read_i16(&mut self) -> Result<i16> {
        self.cursor.read_i16::<BigEndian>().map_err(|_| NbtError::Eof)
    }

    fn read_i32(&mut self) -> Result<i32> {
        self.cursor.read_i32::<BigEndian>().map_err(|_| NbtError::Eof)
    }

    fn read_i64(&mut self) -> Result<i64> {
        self.cursor.read_i64::<BigEndian>().map_err(|_| NbtError::Eof)
    }

    fn read_f32(&mut self) -> Result<f32> {
        self.cursor.read_f32::<BigEndian>().map_err(|_| NbtError::Eof)
    }

    fn read_f64(&mut self) -> Result<f64> {
        self.cursor.read_f64::<BigEndian>().map_err(|_| NbtError::Eof)
    }

    fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0_u8; len];
        self.cursor.read_exact(&mut buf).map_err(|_| NbtError::Eof)?;
        Ok(buf)
    }

    fn read_name(&mut self) -> Result<String> {
        let len = self.read_i16()?;
        if len < 0 {
            return Err(NbtError::NegativeLength(i32::from(len)));
        }
        let bytes = self.read_bytes(len as usize)?;
        String::from_utf8(bytes).map_err(|_| NbtError::InvalidUtf8)
    }

    fn read_compound(&mut self) -> Result<Compound> {
        let mut compound = Compound::new();
        loop {
            let tag = self.read_u8()?;
            if tag == TAG_END {
                break;
            }
            let name = self.read_name()?;
            let value = self.read_value(tag)?;
            compound.insert(name, value);
        }
        Ok(compound)
    }

    fn read_list(&mut self) -> Result<List> {
        let element_tag = self.read_u8()?;
        let count = self.read_i32()?;
        if count < 0 {
            return Err(NbtError::NegativeLength(count));
        }
        let mut items = Vec::with_capacity(count as usize);
        for _ in 0..count {
            items.push(self.read_value(element_tag)?);
        }
        Ok(List { element_tag, items })
    }

    fn read_value(&mut self, tag: u8) -> Result<Value> {
        match tag {
            TAG_BYTE => Ok(Value::Byte(self.read_i8()?)),
            TAG_SHORT => Ok(Value::Short(self.read_i16()?)),
            TAG_INT => Ok(Value::Int(self.read_i32()?)),
            TAG_LONG => Ok(Value::Long(self.read_i64()?)),
            TAG_FLOAT => Ok(Value::Float(self.read_f32()?)),
            TAG_DOUBLE => Ok(Value::Double(self.read_f64()?)),
            TAG_BYTE_ARRAY => {
                let len = self.read_i32()?;
                if len < 0 {
                    return Err(NbtError::NegativeLength(len));
                }
                Ok(Value::ByteArray(self.read_bytes(len as usize)?))
            }
            TAG_STRING => {
                let len = self.read_i16()?;
                if len < 0 {
                    return Err(NbtError::NegativeLength(i32::from(len)));
                }
                let bytes = self.read_bytes(len as usize)?;
                Ok(Value::String(
                    String::from_utf8(bytes).map_err(|_| NbtError::InvalidUtf8)?,
                ))
            }
            TAG_LIST => Ok(Value::List(self.read_list()?)),
            TAG_COMPOUND => Ok(Value::Compound(self.read_compound()?)),
            other => Err(NbtError::UnknownTag(other)),
        }
    }
}

fn write_name(out: &mut Vec<u8>, name: &str) {
    let bytes = name.as_bytes();
    out.write_i16::<BigEndian>(bytes.len() as i16).unwrap();
    out.extend_from_slice(bytes);
}

fn write_payload(out: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Byte(v) => out.write_i8(*v).unwrap(),
        Value::Short(v) => out.write_i16::<BigEndian>(*v).unwrap(),
        Value::Int(v) => out.write_i32::<BigEndian>(*v).unwrap(),
        Value::Long(v) => out.write_i64::<BigEndian>(*v).unwrap(),
        Value::Float(v) => out.write_f32::<BigEndian>(*v).unwrap(),
        Value::Double(v) => out.write_f64::<BigEndian>(*v).unwrap(),
        Value::ByteArray(bytes) => {
            out.write_i32::<BigEndian>(bytes.len() as i32).unwrap();
            out.extend_from_slice(bytes);
        }
        Value::String(s) => {
            let bytes = s.as_bytes();
            out.write_i16::<BigEndian>(bytes.len() as i16).unwrap();
            out.extend_from_slice(bytes);
        }
        Value::List(list) => {
            out.push(list.element_tag);
            out.write_i32::<BigEndian>(list.items.len() as i32).unwrap();
            for item in &list.items {
                write_payload(out, item);
            }
        }
        Value::Compound(compound) => {
            for (name, inner) in compound.iter() {
                out.push(inner.tag());
                write_name(out, name);
                write_payload(out, inner);
            }
            out.push(TAG_END);
        }
    }
}
