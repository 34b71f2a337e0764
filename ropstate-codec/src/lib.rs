//! # ropstate-codec
//!
//! Binary codec for remote operation (ROP) structures.
//!
//! This crate provides:
//! - Little-endian wire primitives with bounds-checked reads
//! - Typed strings, property tags, values and rows
//! - Recipient rows and their size-prefixed wrappers
//! - Restriction trees
//! - Message, attachment and table ROP requests and responses
//! - ROP buffer framing and result codes

pub mod attachment;
pub mod buffer;
pub mod error;
pub mod message;
pub mod property;
pub mod recipient;
pub mod restriction;
pub mod rop;
pub mod string;
pub mod table;
pub mod wire;

pub use buffer::{RopBuffer, INVALID_HANDLE};
pub use error::{CodecError, ResultCode};
pub use property::{
    FlaggedValue, PropertyRow, PropertyTag, PropertyType, PropertyValue, TaggedPropertyValue,
};
pub use recipient::{RecipientAddress, RecipientFlags, RecipientRow};
pub use restriction::{BitmaskOp, FuzzyLevel, RelOp, Restriction, MAX_RESTRICTION_DEPTH};
pub use rop::{RopHeader, RopId, RopOutcome, RopResponse};
pub use string::TypedString;
pub use table::{
    BookmarkOrigin, QueryRowsFlags, SortDirection, SortOrder, TableFlags, TableRequest,
    TableResponse, TableStatus,
};
pub use wire::{Decode, DecodeWith, Encode, EncodeWith, WireReader, WireWriter};
