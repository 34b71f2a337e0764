//! Typed strings: a one-byte string type followed by an optional string.

use crate::error::CodecError;
use crate::wire::{narrow_size, wide_size, Decode, Encode, WireReader, WireWriter};
use serde::{Deserialize, Serialize};

/// A string prefixed by its encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum TypedString {
    /// 0x00: no string is present.
    None,
    /// 0x01: the string is empty; no bytes follow.
    Empty,
    /// 0x02: null-terminated 8-bit string.
    Char8(String),
    /// 0x03: reduced Unicode, sent as an 8-bit null-terminated string.
    ReducedUnicode(String),
    /// 0x04: null-terminated UTF-16LE string.
    Unicode(String),
}

impl TypedString {
    pub const NONE: u8 = 0x00;
    pub const EMPTY: u8 = 0x01;
    pub const CHAR8: u8 = 0x02;
    pub const REDUCED_UNICODE: u8 = 0x03;
    pub const UNICODE: u8 = 0x04;

    pub fn string_type(&self) -> u8 {
        match self {
            TypedString::None => Self::NONE,
            TypedString::Empty => Self::EMPTY,
            TypedString::Char8(_) => Self::CHAR8,
            TypedString::ReducedUnicode(_) => Self::REDUCED_UNICODE,
            TypedString::Unicode(_) => Self::UNICODE,
        }
    }

    /// Returns the carried text, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            TypedString::None => None,
            TypedString::Empty => Some(""),
            TypedString::Char8(s) | TypedString::ReducedUnicode(s) | TypedString::Unicode(s) => {
                Some(s)
            }
        }
    }
}

impl Encode for TypedString {
    fn size(&self) -> usize {
        1 + match self {
            TypedString::None | TypedString::Empty => 0,
            TypedString::Char8(s) | TypedString::ReducedUnicode(s) => narrow_size(s),
            TypedString::Unicode(s) => wide_size(s),
        }
    }

    fn encode(&self, w: &mut WireWriter) -> Result<(), CodecError> {
        w.put_u8(self.string_type());
        match self {
            TypedString::None | TypedString::Empty => Ok(()),
            TypedString::Char8(s) | TypedString::ReducedUnicode(s) => w.put_narrow_string(s),
            TypedString::Unicode(s) => w.put_wide_string(s),
        }
    }
}

impl Decode for TypedString {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
        match r.read_u8()? {
            Self::NONE => Ok(TypedString::None),
            Self::EMPTY => Ok(TypedString::Empty),
            Self::CHAR8 => Ok(TypedString::Char8(r.read_narrow_string()?)),
            Self::REDUCED_UNICODE => Ok(TypedString::ReducedUnicode(r.read_narrow_string()?)),
            Self::UNICODE => Ok(TypedString::Unicode(r.read_wide_string()?)),
            other => Err(CodecError::InvalidStringType(other)),
        }
    }
}
