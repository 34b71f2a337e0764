//! Property tags, property values and property rows.
//!
//! A property row is only meaningful against a column set: its values are
//! laid out in column order with no per-value tag, so encoding and decoding
//! go through [`EncodeWith`]/[`DecodeWith`] with `[PropertyTag]` context.

use crate::error::CodecError;
use crate::wire::{
    narrow_size, u16_len, wide_size, Decode, DecodeWith, Encode, EncodeWith, WireReader,
    WireWriter,
};
use serde::{Deserialize, Serialize};

/// Property value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    Unspecified,
    Integer16,
    Integer32,
    Floating64,
    ErrorCode,
    Boolean,
    Integer64,
    String8,
    Unicode,
    Time,
    Guid,
    ServerId,
    Binary,
    /// A type code this codec cannot interpret.
    Unknown(u16),
}

impl PropertyType {
    pub fn from_u16(code: u16) -> Self {
        match code {
            0x0000 => PropertyType::Unspecified,
            0x0002 => PropertyType::Integer16,
            0x0003 => PropertyType::Integer32,
            0x0005 => PropertyType::Floating64,
            0x000A => PropertyType::ErrorCode,
            0x000B => PropertyType::Boolean,
            0x0014 => PropertyType::Integer64,
            0x001E => PropertyType::String8,
            0x001F => PropertyType::Unicode,
            0x0040 => PropertyType::Time,
            0x0048 => PropertyType::Guid,
            0x00FB => PropertyType::ServerId,
            0x0102 => PropertyType::Binary,
            other => PropertyType::Unknown(other),
        }
    }

    pub fn as_u16(self) -> u16 {
        match self {
            PropertyType::Unspecified => 0x0000,
            PropertyType::Integer16 => 0x0002,
            PropertyType::Integer32 => 0x0003,
            PropertyType::Floating64 => 0x0005,
            PropertyType::ErrorCode => 0x000A,
            PropertyType::Boolean => 0x000B,
            PropertyType::Integer64 => 0x0014,
            PropertyType::String8 => 0x001E,
            PropertyType::Unicode => 0x001F,
            PropertyType::Time => 0x0040,
            PropertyType::Guid => 0x0048,
            PropertyType::ServerId => 0x00FB,
            PropertyType::Binary => 0x0102,
            PropertyType::Unknown(code) => code,
        }
    }

    pub fn is_string(self) -> bool {
        matches!(self, PropertyType::String8 | PropertyType::Unicode)
    }
}

/// A property identifier paired with its type. Wire form is the type
/// followed by the id, each 16 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PropertyTag {
    pub id: u16,
    #[serde(rename = "type")]
    pub prop_type: PropertyType,
}

impl PropertyTag {
    pub const fn new(id: u16, prop_type: PropertyType) -> Self {
        Self { id, prop_type }
    }

    pub fn from_u32(raw: u32) -> Self {
        Self {
            id: (raw >> 16) as u16,
            prop_type: PropertyType::from_u16(raw as u16),
        }
    }

    pub fn as_u32(self) -> u32 {
        ((self.id as u32) << 16) | self.prop_type.as_u16() as u32
    }

    /// Same property id, ignoring type.
    pub fn same_property(self, other: PropertyTag) -> bool {
        self.id == other.id
    }
}

/// Well-known tags used by tables.
pub mod tags {
    use super::{PropertyTag, PropertyType};

    pub const DISPLAY_NAME: PropertyTag = PropertyTag::new(0x3001, PropertyType::Unicode);
    pub const SUBJECT: PropertyTag = PropertyTag::new(0x0037, PropertyType::Unicode);
    pub const MESSAGE_SIZE: PropertyTag = PropertyTag::new(0x0E08, PropertyType::Integer32);
    pub const IMPORTANCE: PropertyTag = PropertyTag::new(0x0017, PropertyType::Integer32);
    pub const ROW_TYPE: PropertyTag = PropertyTag::new(0x0FF5, PropertyType::Integer32);
    pub const DEPTH: PropertyTag = PropertyTag::new(0x3005, PropertyType::Integer32);
    pub const CONTENT_COUNT: PropertyTag = PropertyTag::new(0x3602, PropertyType::Integer32);
    pub const INST_ID: PropertyTag = PropertyTag::new(0x674D, PropertyType::Integer64);
    pub const INSTANCE_NUM: PropertyTag = PropertyTag::new(0x674E, PropertyType::Integer32);
}

impl Encode for PropertyTag {
    fn size(&self) -> usize {
        4
    }

    fn encode(&self, w: &mut WireWriter) -> Result<(), CodecError> {
        w.put_u16(self.prop_type.as_u16());
        w.put_u16(self.id);
        Ok(())
    }
}

impl Decode for PropertyTag {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
        let prop_type = PropertyType::from_u16(r.read_u16()?);
        let id = r.read_u16()?;
        Ok(Self { id, prop_type })
    }
}

/// A `u16` count followed by that many tags.
pub fn tag_list_size(tags: &[PropertyTag]) -> usize {
    2 + tags.len() * 4
}

pub fn encode_tag_list(
    w: &mut WireWriter,
    field: &'static str,
    tags: &[PropertyTag],
) -> Result<(), CodecError> {
    w.put_u16(u16_len(field, tags.len())?);
    for tag in tags {
        tag.encode(w)?;
    }
    Ok(())
}

pub fn decode_tag_list(r: &mut WireReader<'_>) -> Result<Vec<PropertyTag>, CodecError> {
    let count = r.read_u16()? as usize;
    (0..count).map(|_| PropertyTag::decode(r)).collect()
}

/// A single property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyValue {
    Integer16(i16),
    Integer32(i32),
    Floating64(f64),
    ErrorCode(u32),
    Boolean(bool),
    Integer64(i64),
    String8(String),
    Unicode(String),
    /// FILETIME ticks.
    Time(u64),
    Guid([u8; 16]),
    ServerId(Vec<u8>),
    Binary(Vec<u8>),
}

impl PropertyValue {
    pub fn prop_type(&self) -> PropertyType {
        match self {
            PropertyValue::Integer16(_) => PropertyType::Integer16,
            PropertyValue::Integer32(_) => PropertyType::Integer32,
            PropertyValue::Floating64(_) => PropertyType::Floating64,
            PropertyValue::ErrorCode(_) => PropertyType::ErrorCode,
            PropertyValue::Boolean(_) => PropertyType::Boolean,
            PropertyValue::Integer64(_) => PropertyType::Integer64,
            PropertyValue::String8(_) => PropertyType::String8,
            PropertyValue::Unicode(_) => PropertyType::Unicode,
            PropertyValue::Time(_) => PropertyType::Time,
            PropertyValue::Guid(_) => PropertyType::Guid,
            PropertyValue::ServerId(_) => PropertyType::ServerId,
            PropertyValue::Binary(_) => PropertyType::Binary,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String8(s) | PropertyValue::Unicode(s) => Some(s),
            _ => None,
        }
    }

    /// Size of the value bytes alone, without any type prefix.
    pub fn value_size(&self) -> usize {
        match self {
            PropertyValue::Boolean(_) => 1,
            PropertyValue::Integer16(_) => 2,
            PropertyValue::Integer32(_) | PropertyValue::ErrorCode(_) => 4,
            PropertyValue::Floating64(_) | PropertyValue::Integer64(_) | PropertyValue::Time(_) => 8,
            PropertyValue::Guid(_) => 16,
            PropertyValue::String8(s) => narrow_size(s),
            PropertyValue::Unicode(s) => wide_size(s),
            PropertyValue::ServerId(b) | PropertyValue::Binary(b) => 2 + b.len(),
        }
    }

    pub fn encode_value(&self, w: &mut WireWriter) -> Result<(), CodecError> {
        match self {
            PropertyValue::Integer16(v) => w.put_slice(&v.to_le_bytes()),
            PropertyValue::Integer32(v) => w.put_i32(*v),
            PropertyValue::Floating64(v) => w.put_f64(*v),
            PropertyValue::ErrorCode(v) => w.put_u32(*v),
            PropertyValue::Boolean(v) => w.put_bool(*v),
            PropertyValue::Integer64(v) => w.put_i64(*v),
            PropertyValue::String8(s) => w.put_narrow_string(s)?,
            PropertyValue::Unicode(s) => w.put_wide_string(s)?,
            PropertyValue::Time(v) => w.put_u64(*v),
            PropertyValue::Guid(g) => w.put_slice(g),
            PropertyValue::ServerId(b) => w.put_sized_bytes("ServerId", b)?,
            PropertyValue::Binary(b) => w.put_sized_bytes("Binary", b)?,
        }
        Ok(())
    }

    /// Decodes a value of a known type.
    pub fn decode_as(prop_type: PropertyType, r: &mut WireReader<'_>) -> Result<Self, CodecError> {
        Ok(match prop_type {
            PropertyType::Integer16 => PropertyValue::Integer16(r.read_u16()? as i16),
            PropertyType::Integer32 => PropertyValue::Integer32(r.read_i32()?),
            PropertyType::Floating64 => PropertyValue::Floating64(r.read_f64()?),
            PropertyType::ErrorCode => PropertyValue::ErrorCode(r.read_u32()?),
            PropertyType::Boolean => PropertyValue::Boolean(r.read_bool("Boolean value")?),
            PropertyType::Integer64 => PropertyValue::Integer64(r.read_i64()?),
            PropertyType::String8 => PropertyValue::String8(r.read_narrow_string()?),
            PropertyType::Unicode => PropertyValue::Unicode(r.read_wide_string()?),
            PropertyType::Time => PropertyValue::Time(r.read_u64()?),
            PropertyType::Guid => PropertyValue::Guid(r.read_guid()?),
            PropertyType::ServerId => PropertyValue::ServerId(r.read_sized_bytes()?),
            PropertyType::Binary => PropertyValue::Binary(r.read_sized_bytes()?),
            PropertyType::Unspecified | PropertyType::Unknown(_) => {
                return Err(CodecError::UnknownPropertyType(prop_type.as_u16()))
            }
        })
    }

    fn check_column(&self, column: PropertyTag) -> Result<(), CodecError> {
        if column.prop_type == PropertyType::Unspecified || column.prop_type == self.prop_type() {
            Ok(())
        } else {
            Err(CodecError::InvalidEnum {
                field: "value type for column",
                value: self.prop_type().as_u16() as u32,
            })
        }
    }
}

/// A tag followed by a value of the tag's type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggedPropertyValue {
    pub tag: PropertyTag,
    pub value: PropertyValue,
}

impl TaggedPropertyValue {
    pub fn new(tag: PropertyTag, value: PropertyValue) -> Self {
        Self { tag, value }
    }
}

impl Encode for TaggedPropertyValue {
    fn size(&self) -> usize {
        4 + self.value.value_size()
    }

    fn encode(&self, w: &mut WireWriter) -> Result<(), CodecError> {
        self.value.check_column(self.tag)?;
        if self.tag.prop_type == PropertyType::Unspecified {
            return Err(CodecError::UnknownPropertyType(0));
        }
        self.tag.encode(w)?;
        self.value.encode_value(w)
    }
}

impl Decode for TaggedPropertyValue {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
        let tag = PropertyTag::decode(r)?;
        let value = PropertyValue::decode_as(tag.prop_type, r)?;
        Ok(Self { tag, value })
    }
}

/// One value slot of a flagged property row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlaggedValue {
    Present(PropertyValue),
    Absent,
    /// The server could not produce the value.
    Error(u32),
}

impl FlaggedValue {
    pub const PRESENT: u8 = 0x00;
    pub const ABSENT: u8 = 0x01;
    pub const ERROR: u8 = 0x0A;

    pub fn value(&self) -> Option<&PropertyValue> {
        match self {
            FlaggedValue::Present(v) => Some(v),
            _ => None,
        }
    }
}

/// A row of values laid out against a column set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyRow {
    /// Flag 0x00: every column has a value.
    Standard(Vec<PropertyValue>),
    /// Flag 0x01: each value is preceded by a presence flag.
    Flagged(Vec<FlaggedValue>),
}

impl PropertyRow {
    pub const STANDARD: u8 = 0x00;
    pub const FLAGGED: u8 = 0x01;

    /// Builds the most compact row for the given slots: standard when every
    /// slot is present, flagged otherwise.
    pub fn from_slots(slots: Vec<FlaggedValue>) -> Self {
        if slots.iter().all(|s| matches!(s, FlaggedValue::Present(_))) {
            PropertyRow::Standard(
                slots
                    .into_iter()
                    .filter_map(|s| match s {
                        FlaggedValue::Present(v) => Some(v),
                        _ => None,
                    })
                    .collect(),
            )
        } else {
            PropertyRow::Flagged(slots)
        }
    }

    pub fn len(&self) -> usize {
        match self {
            PropertyRow::Standard(values) => values.len(),
            PropertyRow::Flagged(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The value in slot `index`, if present.
    pub fn get(&self, index: usize) -> Option<&PropertyValue> {
        match self {
            PropertyRow::Standard(values) => values.get(index),
            PropertyRow::Flagged(values) => values.get(index).and_then(FlaggedValue::value),
        }
    }

    fn check_len(&self, columns: &[PropertyTag]) -> Result<(), CodecError> {
        if self.len() != columns.len() {
            return Err(CodecError::ColumnCountMismatch {
                columns: columns.len(),
                values: self.len(),
            });
        }
        Ok(())
    }
}

impl EncodeWith<[PropertyTag]> for PropertyRow {
    fn size_with(&self, columns: &[PropertyTag]) -> usize {
        let body: usize = match self {
            PropertyRow::Standard(values) => values
                .iter()
                .zip(columns)
                .map(|(v, c)| type_prefix(*c) + v.value_size())
                .sum(),
            PropertyRow::Flagged(values) => values
                .iter()
                .zip(columns)
                .map(|(v, c)| {
                    type_prefix(*c)
                        + 1
                        + match v {
                            FlaggedValue::Present(value) => value.value_size(),
                            FlaggedValue::Absent => 0,
                            FlaggedValue::Error(_) => 4,
                        }
                })
                .sum(),
        };
        1 + body
    }

    fn encode_with(&self, w: &mut WireWriter, columns: &[PropertyTag]) -> Result<(), CodecError> {
        self.check_len(columns)?;
        match self {
            PropertyRow::Standard(values) => {
                w.put_u8(Self::STANDARD);
                for (value, column) in values.iter().zip(columns) {
                    value.check_column(*column)?;
                    if column.prop_type == PropertyType::Unspecified {
                        w.put_u16(value.prop_type().as_u16());
                    }
                    value.encode_value(w)?;
                }
            }
            PropertyRow::Flagged(values) => {
                w.put_u8(Self::FLAGGED);
                for (slot, column) in values.iter().zip(columns) {
                    let unspecified = column.prop_type == PropertyType::Unspecified;
                    match slot {
                        FlaggedValue::Present(value) => {
                            value.check_column(*column)?;
                            if unspecified {
                                w.put_u16(value.prop_type().as_u16());
                            }
                            w.put_u8(FlaggedValue::PRESENT);
                            value.encode_value(w)?;
                        }
                        FlaggedValue::Absent => {
                            if unspecified {
                                w.put_u16(PropertyType::Unspecified.as_u16());
                            }
                            w.put_u8(FlaggedValue::ABSENT);
                        }
                        FlaggedValue::Error(code) => {
                            if unspecified {
                                w.put_u16(PropertyType::ErrorCode.as_u16());
                            }
                            w.put_u8(FlaggedValue::ERROR);
                            w.put_u32(*code);
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

impl DecodeWith<[PropertyTag]> for PropertyRow {
    fn decode_with(r: &mut WireReader<'_>, columns: &[PropertyTag]) -> Result<Self, CodecError> {
        match r.read_u8()? {
            Self::STANDARD => {
                let mut values = Vec::with_capacity(columns.len());
                for column in columns {
                    let ty = resolve_type(*column, r)?;
                    values.push(PropertyValue::decode_as(ty, r)?);
                }
                Ok(PropertyRow::Standard(values))
            }
            Self::FLAGGED => {
                let mut values = Vec::with_capacity(columns.len());
                for column in columns {
                    let ty = resolve_type(*column, r)?;
                    let slot = match r.read_u8()? {
                        FlaggedValue::PRESENT => {
                            FlaggedValue::Present(PropertyValue::decode_as(ty, r)?)
                        }
                        FlaggedValue::ABSENT => FlaggedValue::Absent,
                        FlaggedValue::ERROR => FlaggedValue::Error(r.read_u32()?),
                        other => {
                            return Err(CodecError::InvalidEnum {
                                field: "flagged value flag",
                                value: other as u32,
                            })
                        }
                    };
                    values.push(slot);
                }
                Ok(PropertyRow::Flagged(values))
            }
            other => Err(CodecError::InvalidEnum {
                field: "property row flag",
                value: other as u32,
            }),
        }
    }
}

fn type_prefix(column: PropertyTag) -> usize {
    if column.prop_type == PropertyType::Unspecified {
        2
    } else {
        0
    }
}

/// Unspecified columns carry their own type ahead of each value.
fn resolve_type(column: PropertyTag, r: &mut WireReader<'_>) -> Result<PropertyType, CodecError> {
    if column.prop_type == PropertyType::Unspecified {
        Ok(PropertyType::from_u16(r.read_u16()?))
    } else {
        Ok(column.prop_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> Vec<PropertyTag> {
        vec![
            tags::DISPLAY_NAME,
            tags::MESSAGE_SIZE,
            PropertyTag::new(0x0E1B, PropertyType::Boolean),
            PropertyTag::new(0x0FFF, PropertyType::Binary),
        ]
    }

    #[test]
    fn test_tag_wire_order() {
        let tag = tags::INST_ID;
        assert_eq!(tag.as_u32(), 0x674D0014);
        assert_eq!(tag.to_bytes().unwrap().as_ref(), &[0x14, 0x00, 0x4D, 0x67]);
        assert_eq!(PropertyTag::from_u32(0x674D0014), tag);
    }

    #[test]
    fn test_unknown_type_preserved_in_tag() {
        let tag = PropertyTag::from_u32(0x1234_0099);
        assert_eq!(tag.prop_type, PropertyType::Unknown(0x0099));
        assert_eq!(tag.as_u32(), 0x1234_0099);
    }

    #[test]
    fn test_standard_row_layout() {
        let cols = columns();
        let row = PropertyRow::Standard(vec![
            PropertyValue::Unicode("A".into()),
            PropertyValue::Integer32(7),
            PropertyValue::Boolean(true),
            PropertyValue::Binary(vec![0xAB]),
        ]);
        let bytes = row.to_bytes_with(cols.as_slice()).unwrap();
        assert_eq!(
            bytes.as_ref(),
            &[0x00, b'A', 0, 0, 0, 7, 0, 0, 0, 1, 1, 0, 0xAB]
        );
        assert_eq!(bytes.len(), row.size_with(cols.as_slice()));

        let (decoded, consumed) = PropertyRow::decode_at_with(&bytes, 0, cols.as_slice()).unwrap();
        assert_eq!(decoded, row);
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn test_flagged_row_layout() {
        let cols = vec![tags::DISPLAY_NAME, tags::MESSAGE_SIZE, tags::IMPORTANCE];
        let row = PropertyRow::Flagged(vec![
            FlaggedValue::Absent,
            FlaggedValue::Error(0x8004010F),
            FlaggedValue::Present(PropertyValue::Integer32(1)),
        ]);
        let bytes = row.to_bytes_with(cols.as_slice()).unwrap();
        assert_eq!(
            bytes.as_ref(),
            &[0x01, 0x01, 0x0A, 0x0F, 0x01, 0x04, 0x80, 0x00, 1, 0, 0, 0]
        );
        let (decoded, consumed) = PropertyRow::decode_at_with(&bytes, 0, cols.as_slice()).unwrap();
        assert_eq!(decoded, row);
        assert_eq!(consumed, row.size_with(cols.as_slice()));
    }

    #[test]
    fn test_unspecified_column_carries_type() {
        let cols = vec![PropertyTag::new(0x6000, PropertyType::Unspecified)];
        let row = PropertyRow::Standard(vec![PropertyValue::Integer16(-2)]);
        let bytes = row.to_bytes_with(cols.as_slice()).unwrap();
        assert_eq!(bytes.as_ref(), &[0x00, 0x02, 0x00, 0xFE, 0xFF]);
        let (decoded, _) = PropertyRow::decode_at_with(&bytes, 0, cols.as_slice()).unwrap();
        assert_eq!(decoded, row);
    }

    #[test]
    fn test_value_type_must_match_column() {
        let cols = vec![tags::MESSAGE_SIZE];
        let row = PropertyRow::Standard(vec![PropertyValue::Unicode("x".into())]);
        assert!(row.to_bytes_with(cols.as_slice()).is_err());
    }

    #[test]
    fn test_column_count_mismatch() {
        let cols = vec![tags::MESSAGE_SIZE, tags::IMPORTANCE];
        let row = PropertyRow::Standard(vec![PropertyValue::Integer32(1)]);
        assert_eq!(
            row.to_bytes_with(cols.as_slice()).unwrap_err(),
            CodecError::ColumnCountMismatch {
                columns: 2,
                values: 1
            }
        );
    }

    #[test]
    fn test_row_underrun_is_error() {
        let cols = vec![tags::MESSAGE_SIZE];
        let result = PropertyRow::decode_at_with(&[0x00, 0x01, 0x02], 0, cols.as_slice());
        assert!(matches!(result, Err(CodecError::Underrun { .. })));
    }

    #[test]
    fn test_binary_length_beyond_buffer() {
        let cols = vec![PropertyTag::new(0x0FFF, PropertyType::Binary)];
        let result = PropertyRow::decode_at_with(&[0x00, 0x10, 0x00, 0xAA], 0, cols.as_slice());
        assert!(matches!(result, Err(CodecError::Underrun { needed: 16, .. })));
    }

    #[test]
    fn test_from_slots_picks_layout() {
        let row = PropertyRow::from_slots(vec![FlaggedValue::Present(PropertyValue::Integer32(1))]);
        assert!(matches!(row, PropertyRow::Standard(_)));
        let row = PropertyRow::from_slots(vec![FlaggedValue::Error(1)]);
        assert!(matches!(row, PropertyRow::Flagged(_)));
    }

    #[test]
    fn test_tagged_value_roundtrip() {
        let tv = TaggedPropertyValue::new(tags::SUBJECT, PropertyValue::Unicode("hello".into()));
        let bytes = tv.to_bytes().unwrap();
        assert_eq!(bytes.len(), tv.size());
        let (decoded, consumed) = TaggedPropertyValue::decode_at(&bytes, 0).unwrap();
        assert_eq!(decoded, tv);
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn test_tag_list() {
        let cols = columns();
        let mut w = WireWriter::new();
        encode_tag_list(&mut w, "columns", &cols).unwrap();
        assert_eq!(w.len(), tag_list_size(&cols));
        let bytes = w.into_bytes();
        let mut r = WireReader::new(&bytes);
        assert_eq!(decode_tag_list(&mut r).unwrap(), cols);
    }
}
