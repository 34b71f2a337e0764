//! Codec error types and ROP result codes.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Framing and parse errors raised while encoding or decoding ROP structures.
///
/// Every variant is fatal to the current call. The codec never retries or
/// resynchronizes after one of these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("buffer underrun at offset {offset}: need {needed} bytes, {remaining} remaining")]
    Underrun {
        offset: usize,
        needed: usize,
        remaining: usize,
    },

    #[error("unterminated string starting at offset {offset} (wide: {wide})")]
    UnterminatedString { offset: usize, wide: bool },

    #[error("string cannot be encoded: {reason}")]
    UnencodableString { reason: &'static str },

    #[error("invalid UTF-16 in wide string at offset {offset}")]
    InvalidUtf16 { offset: usize },

    #[error("unexpected ROP id: expected {expected:#04x}, got {actual:#04x}")]
    UnexpectedRopId { expected: u8, actual: u8 },

    #[error("unknown ROP id: {0:#04x}")]
    UnknownRopId(u8),

    #[error("property type {0:#06x} has no wire representation")]
    UnknownPropertyType(u16),

    #[error("invalid string type: {0:#04x}")]
    InvalidStringType(u8),

    #[error("invalid value {value:#x} for {field}")]
    InvalidEnum { field: &'static str, value: u32 },

    #[error("invalid {field} flags: {bits:#x}")]
    InvalidFlags { field: &'static str, bits: u32 },

    #[error("{field} declares {declared} bytes but contents occupy {actual}")]
    LengthMismatch {
        field: &'static str,
        declared: usize,
        actual: usize,
    },

    #[error("too many elements in {field}: {count} (max {max})")]
    TooManyElements {
        field: &'static str,
        count: usize,
        max: usize,
    },

    #[error("{field} nesting exceeds {max} levels")]
    NestingTooDeep { field: &'static str, max: usize },

    #[error("row has {values} values for {columns} columns")]
    ColumnCountMismatch { columns: usize, values: usize },

    #[error("{0} trailing bytes after structure")]
    TrailingBytes(usize),
}

/// Result codes returned in the ReturnValue field of every ROP response.
///
/// This is a closed set. Wire values are stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultCode {
    Success,
    NotSupported,
    InvalidParameter,
    NullObject,
    NotFound,
    NotCollapsed,
    NotExpanded,
    InvalidBookmark,
    UnableToAbort,
    NotImplemented,
    Unexpected,
}

impl ResultCode {
    pub const ALL: [ResultCode; 11] = [
        ResultCode::Success,
        ResultCode::NotSupported,
        ResultCode::InvalidParameter,
        ResultCode::NullObject,
        ResultCode::NotFound,
        ResultCode::NotCollapsed,
        ResultCode::NotExpanded,
        ResultCode::InvalidBookmark,
        ResultCode::UnableToAbort,
        ResultCode::NotImplemented,
        ResultCode::Unexpected,
    ];

    /// Returns the 32-bit wire value.
    pub fn as_u32(self) -> u32 {
        match self {
            ResultCode::Success => 0x0000_0000,
            ResultCode::NotSupported => 0x8004_0102,
            ResultCode::InvalidParameter => 0x8007_0057,
            ResultCode::NullObject => 0x0000_04B9,
            ResultCode::NotFound => 0x8004_010F,
            ResultCode::NotCollapsed => 0x0000_04F8,
            ResultCode::NotExpanded => 0x0000_04F7,
            ResultCode::InvalidBookmark => 0x8004_0405,
            ResultCode::UnableToAbort => 0x8004_0114,
            ResultCode::NotImplemented => 0x8004_0FFF,
            ResultCode::Unexpected => 0xFFFF_FFFF,
        }
    }

    /// Maps a wire value back to a known code.
    pub fn from_u32(value: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|code| code.as_u32() == value)
    }

    pub fn is_success(self) -> bool {
        self == ResultCode::Success
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultCode::Success => write!(f, "SUCCESS"),
            ResultCode::NotSupported => write!(f, "NOT_SUPPORTED"),
            ResultCode::InvalidParameter => write!(f, "INVALID_PARAMETER"),
            ResultCode::NullObject => write!(f, "NULL_OBJECT"),
            ResultCode::NotFound => write!(f, "NOT_FOUND"),
            ResultCode::NotCollapsed => write!(f, "NOT_COLLAPSED"),
            ResultCode::NotExpanded => write!(f, "NOT_EXPANDED"),
            ResultCode::InvalidBookmark => write!(f, "INVALID_BOOKMARK"),
            ResultCode::UnableToAbort => write!(f, "UNABLE_TO_ABORT"),
            ResultCode::NotImplemented => write!(f, "NOT_IMPLEMENTED"),
            ResultCode::Unexpected => write!(f, "UNEXPECTED"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_code_wire_values() {
        assert_eq!(ResultCode::Success.as_u32(), 0);
        assert_eq!(ResultCode::NotSupported.as_u32(), 0x80040102);
        assert_eq!(ResultCode::InvalidParameter.as_u32(), 0x80070057);
        assert_eq!(ResultCode::NullObject.as_u32(), 0x4B9);
        assert_eq!(ResultCode::InvalidBookmark.as_u32(), 0x80040405);
        assert_eq!(ResultCode::Unexpected.as_u32(), 0xFFFFFFFF);
    }

    #[test]
    fn test_result_code_from_u32() {
        for code in ResultCode::ALL {
            assert_eq!(ResultCode::from_u32(code.as_u32()), Some(code));
        }
        assert_eq!(ResultCode::from_u32(0x1234), None);
    }

    #[test]
    fn test_result_code_serialization() {
        let json = serde_json::to_string(&ResultCode::NullObject).unwrap();
        assert_eq!(json, "\"NULL_OBJECT\"");

        let parsed: ResultCode = serde_json::from_str("\"UNABLE_TO_ABORT\"").unwrap();
        assert_eq!(parsed, ResultCode::UnableToAbort);
    }

    #[test]
    fn test_display_matches_serde_name() {
        for code in ResultCode::ALL {
            let json = serde_json::to_string(&code).unwrap();
            assert_eq!(json.trim_matches('"'), code.to_string());
        }
    }

    #[test]
    fn test_codec_error_display() {
        let err = CodecError::Underrun {
            offset: 4,
            needed: 8,
            remaining: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains("offset 4"));
        assert!(msg.contains("8 bytes"));

        let err = CodecError::UnterminatedString {
            offset: 10,
            wide: true,
        };
        assert!(err.to_string().contains("wide"));

        let err = CodecError::UnexpectedRopId {
            expected: 0x15,
            actual: 0x12,
        };
        assert!(err.to_string().contains("0x15"));
    }
}
