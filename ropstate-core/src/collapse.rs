//! Collapse-state snapshots.
//!
//! GetCollapseState produces an opaque blob that SetCollapseState restores.
//! Layout, all little-endian:
//!
//! ```text
//! +---------+---------+---------------------------+---------+----------+--------+
//! | version | count   | count x (category, state) | row_id  | instance | crc32c |
//! | 1 byte  | 2 bytes | 8 + 1 bytes each          | 8 bytes | 4 bytes  | 4 bytes|
//! +---------+---------+---------------------------+---------+----------+--------+
//! ```
//!
//! The checksum covers every byte before it.

use crate::error::TableError;
use ropstate_codec::wire::u16_len;
use ropstate_codec::{CodecError, WireReader, WireWriter};

pub const COLLAPSE_STATE_VERSION: u8 = 1;

const ENTRY_SIZE: usize = 9;
const TRAILER_SIZE: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryState {
    pub category_id: u64,
    pub expanded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollapseState {
    pub categories: Vec<CategoryState>,
    /// Row the cursor should land on after a restore.
    pub anchor_row_id: u64,
    pub anchor_instance: u32,
}

impl CollapseState {
    pub fn encoded_size(&self) -> usize {
        1 + 2 + self.categories.len() * ENTRY_SIZE + 8 + 4 + TRAILER_SIZE
    }

    pub fn encode(&self) -> Result<Vec<u8>, TableError> {
        let count = u16_len("CollapseState", self.categories.len())
            .map_err(|e| TableError::invalid_parameter(e.to_string()))?;

        let mut w = WireWriter::with_capacity(self.encoded_size());
        w.put_u8(COLLAPSE_STATE_VERSION);
        w.put_u16(count);
        for entry in &self.categories {
            w.put_u64(entry.category_id);
            w.put_bool(entry.expanded);
        }
        w.put_u64(self.anchor_row_id);
        w.put_u32(self.anchor_instance);
        let crc = crc32c::crc32c(w.as_slice());
        w.put_u32(crc);
        Ok(w.into_bytes().to_vec())
    }

    pub fn decode(blob: &[u8]) -> Result<Self, TableError> {
        if blob.len() < TRAILER_SIZE {
            return Err(TableError::invalid_parameter("collapse state is truncated"));
        }
        let (body, trailer) = blob.split_at(blob.len() - TRAILER_SIZE);
        let mut raw = [0u8; TRAILER_SIZE];
        raw.copy_from_slice(trailer);
        let expected = u32::from_le_bytes(raw);
        let actual = crc32c::crc32c(body);
        if expected != actual {
            return Err(TableError::invalid_parameter(format!(
                "collapse state checksum mismatch: expected {:08x}, got {:08x}",
                expected, actual
            )));
        }

        Self::decode_body(body).map_err(|e| TableError::invalid_parameter(e.to_string()))
    }

    fn decode_body(body: &[u8]) -> Result<Self, CodecError> {
        let mut r = WireReader::new(body);
        let version = r.read_u8()?;
        if version != COLLAPSE_STATE_VERSION {
            return Err(CodecError::InvalidEnum {
                field: "CollapseStateVersion",
                value: version as u32,
            });
        }
        let count = r.read_u16()? as usize;
        let mut categories = Vec::with_capacity(count.min(r.remaining() / ENTRY_SIZE));
        for _ in 0..count {
            let category_id = r.read_u64()?;
            let expanded = r.read_bool("CategoryState")?;
            categories.push(CategoryState {
                category_id,
                expanded,
            });
        }
        let anchor_row_id = r.read_u64()?;
        let anchor_instance = r.read_u32()?;
        r.finish()?;
        Ok(Self {
            categories,
            anchor_row_id,
            anchor_instance,
        })
    }
}
