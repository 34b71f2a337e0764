//! Table ROP requests and responses.
//!
//! [`TableRequest`] and [`TableResponse`] dispatch on RopId. Responses that
//! carry property rows (QueryRows, FindRow, ExpandRow) need the table's
//! current column set to be encoded or decoded.

use crate::error::CodecError;
use crate::property::{decode_tag_list, encode_tag_list, tag_list_size, PropertyRow, PropertyTag};
use crate::restriction::{decode_sized_restriction, encode_sized_restriction, sized_restriction_size, Restriction};
use crate::rop::{
    empty_payload, header_only_request, RopHeader, RopId, RopPayload, RopRequest, RopResponse,
};
use crate::wire::{u16_len, Decode, DecodeWith, Encode, EncodeWith, WireReader, WireWriter};
use serde::{Deserialize, Serialize};

/// Table status reported by SetColumns, SortTable, Restrict, GetStatus and Abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableStatus {
    Complete = 0x00,
    QueryChanged = 0x07,
    Sorting = 0x09,
    SortError = 0x0A,
    SettingColumns = 0x0B,
    SetColumnsError = 0x0D,
    Restricting = 0x0E,
    RestrictError = 0x0F,
}

impl TableStatus {
    pub fn from_u8(v: u8) -> Result<Self, CodecError> {
        Ok(match v {
            0x00 => TableStatus::Complete,
            0x07 => TableStatus::QueryChanged,
            0x09 => TableStatus::Sorting,
            0x0A => TableStatus::SortError,
            0x0B => TableStatus::SettingColumns,
            0x0D => TableStatus::SetColumnsError,
            0x0E => TableStatus::Restricting,
            0x0F => TableStatus::RestrictError,
            other => {
                return Err(CodecError::InvalidEnum {
                    field: "TableStatus",
                    value: other as u32,
                })
            }
        })
    }

    /// An asynchronous operation is still running.
    pub fn is_in_progress(self) -> bool {
        matches!(
            self,
            TableStatus::Sorting | TableStatus::SettingColumns | TableStatus::Restricting
        )
    }
}

/// Predefined bookmark: the origin of seeks, finds and query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookmarkOrigin {
    Beginning = 0x00,
    Current = 0x01,
    End = 0x02,
    /// FindRow only: start at the bookmark carried in the request.
    Custom = 0x03,
}

impl BookmarkOrigin {
    pub fn from_u8(v: u8) -> Result<Self, CodecError> {
        Ok(match v {
            0x00 => BookmarkOrigin::Beginning,
            0x01 => BookmarkOrigin::Current,
            0x02 => BookmarkOrigin::End,
            0x03 => BookmarkOrigin::Custom,
            other => {
                return Err(CodecError::InvalidEnum {
                    field: "Origin",
                    value: other as u32,
                })
            }
        })
    }
}

/// Flags shared by SetColumns, SortTable and Restrict.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableFlags(u8);

impl TableFlags {
    /// Return before the operation completes.
    pub const ASYNC: u8 = 0x01;
    /// Defer the operation until rows are next read.
    pub const BATCH: u8 = 0x02;

    const VALID_MASK: u8 = 0x03;

    pub fn new() -> Self {
        Self(0)
    }

    pub fn with_async(mut self) -> Self {
        self.0 |= Self::ASYNC;
        self
    }

    pub fn is_async(&self) -> bool {
        self.0 & Self::ASYNC != 0
    }

    pub fn is_batch(&self) -> bool {
        self.0 & Self::BATCH != 0
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn from_bits(bits: u8) -> Result<Self, CodecError> {
        if bits & !Self::VALID_MASK != 0 {
            return Err(CodecError::InvalidFlags {
                field: "table",
                bits: bits as u32,
            });
        }
        Ok(Self(bits))
    }
}

/// QueryRowsFlags bitfield.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryRowsFlags(u8);

impl QueryRowsFlags {
    /// Leave the cursor where it was.
    pub const NO_ADVANCE: u8 = 0x01;
    pub const ENABLE_PACKED_BUFFERS: u8 = 0x02;

    const VALID_MASK: u8 = 0x03;

    pub fn new() -> Self {
        Self(0)
    }

    pub fn with_no_advance(mut self) -> Self {
        self.0 |= Self::NO_ADVANCE;
        self
    }

    pub fn no_advance(&self) -> bool {
        self.0 & Self::NO_ADVANCE != 0
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn from_bits(bits: u8) -> Result<Self, CodecError> {
        if bits & !Self::VALID_MASK != 0 {
            return Err(CodecError::InvalidFlags {
                field: "QueryRows",
                bits: bits as u32,
            });
        }
        Ok(Self(bits))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Ascending = 0x00,
    Descending = 0x01,
    /// Orders categories by the maximum value of this column.
    MaximumCategory = 0x04,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortOrder {
    pub tag: PropertyTag,
    pub direction: SortDirection,
}

impl SortOrder {
    pub fn new(tag: PropertyTag, direction: SortDirection) -> Self {
        Self { tag, direction }
    }
}

impl Encode for SortOrder {
    fn size(&self) -> usize {
        5
    }

    fn encode(&self, w: &mut WireWriter) -> Result<(), CodecError> {
        self.tag.encode(w)?;
        w.put_u8(self.direction as u8);
        Ok(())
    }
}

impl Decode for SortOrder {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
        let tag = PropertyTag::decode(r)?;
        let direction = match r.read_u8()? {
            0x00 => SortDirection::Ascending,
            0x01 => SortDirection::Descending,
            0x04 => SortDirection::MaximumCategory,
            other => {
                return Err(CodecError::InvalidEnum {
                    field: "SortOrder",
                    value: other as u32,
                })
            }
        };
        Ok(Self { tag, direction })
    }
}

fn bookmark_size(bookmark: &[u8]) -> usize {
    2 + bookmark.len()
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

header_only_request!(ReleaseRequest, Release);
header_only_request!(GetStatusRequest, GetStatus);
header_only_request!(QueryPositionRequest, QueryPosition);
header_only_request!(CreateBookmarkRequest, CreateBookmark);
header_only_request!(AbortRequest, Abort);
header_only_request!(QueryColumnsAllRequest, QueryColumnsAll);
header_only_request!(ResetTableRequest, ResetTable);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetColumnsRequest {
    pub header: RopHeader,
    pub flags: TableFlags,
    pub columns: Vec<PropertyTag>,
}

impl RopRequest for SetColumnsRequest {
    const ROP_ID: RopId = RopId::SetColumns;
}

impl Encode for SetColumnsRequest {
    fn size(&self) -> usize {
        RopHeader::SIZE + 1 + tag_list_size(&self.columns)
    }

    fn encode(&self, w: &mut WireWriter) -> Result<(), CodecError> {
        self.header.encode(Self::ROP_ID, w);
        w.put_u8(self.flags.bits());
        encode_tag_list(w, "PropertyTagCount", &self.columns)
    }
}

impl Decode for SetColumnsRequest {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            header: RopHeader::decode(Self::ROP_ID, r)?,
            flags: TableFlags::from_bits(r.read_u8()?)?,
            columns: decode_tag_list(r)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortTableRequest {
    pub header: RopHeader,
    pub flags: TableFlags,
    pub categorized_count: u16,
    pub expanded_count: u16,
    pub sort_orders: Vec<SortOrder>,
}

impl RopRequest for SortTableRequest {
    const ROP_ID: RopId = RopId::SortTable;
}

impl Encode for SortTableRequest {
    fn size(&self) -> usize {
        RopHeader::SIZE + 1 + 6 + self.sort_orders.len() * 5
    }

    fn encode(&self, w: &mut WireWriter) -> Result<(), CodecError> {
        self.header.encode(Self::ROP_ID, w);
        w.put_u8(self.flags.bits());
        w.put_u16(u16_len("SortOrderCount", self.sort_orders.len())?);
        w.put_u16(self.categorized_count);
        w.put_u16(self.expanded_count);
        for order in &self.sort_orders {
            order.encode(w)?;
        }
        Ok(())
    }
}

impl Decode for SortTableRequest {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
        let header = RopHeader::decode(Self::ROP_ID, r)?;
        let flags = TableFlags::from_bits(r.read_u8()?)?;
        let count = r.read_u16()? as usize;
        let categorized_count = r.read_u16()?;
        let expanded_count = r.read_u16()?;
        let sort_orders = (0..count)
            .map(|_| SortOrder::decode(r))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            header,
            flags,
            categorized_count,
            expanded_count,
            sort_orders,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestrictRequest {
    pub header: RopHeader,
    pub flags: TableFlags,
    /// `None` removes the current restriction.
    pub restriction: Option<Restriction>,
}

impl RopRequest for RestrictRequest {
    const ROP_ID: RopId = RopId::Restrict;
}

impl Encode for RestrictRequest {
    fn size(&self) -> usize {
        RopHeader::SIZE + 1 + sized_restriction_size(self.restriction.as_ref())
    }

    fn encode(&self, w: &mut WireWriter) -> Result<(), CodecError> {
        self.header.encode(Self::ROP_ID, w);
        w.put_u8(self.flags.bits());
        encode_sized_restriction(w, self.restriction.as_ref())
    }
}

impl Decode for RestrictRequest {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            header: RopHeader::decode(Self::ROP_ID, r)?,
            flags: TableFlags::from_bits(r.read_u8()?)?,
            restriction: decode_sized_restriction(r)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRowsRequest {
    pub header: RopHeader,
    pub flags: QueryRowsFlags,
    pub forward_read: bool,
    pub row_count: u16,
}

impl RopRequest for QueryRowsRequest {
    const ROP_ID: RopId = RopId::QueryRows;
}

impl Encode for QueryRowsRequest {
    fn size(&self) -> usize {
        RopHeader::SIZE + 4
    }

    fn encode(&self, w: &mut WireWriter) -> Result<(), CodecError> {
        self.header.encode(Self::ROP_ID, w);
        w.put_u8(self.flags.bits());
        w.put_bool(self.forward_read);
        w.put_u16(self.row_count);
        Ok(())
    }
}

impl Decode for QueryRowsRequest {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            header: RopHeader::decode(Self::ROP_ID, r)?,
            flags: QueryRowsFlags::from_bits(r.read_u8()?)?,
            forward_read: r.read_bool("ForwardRead")?,
            row_count: r.read_u16()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeekRowRequest {
    pub header: RopHeader,
    pub origin: BookmarkOrigin,
    pub row_count: i32,
    pub want_row_moved_count: bool,
}

impl RopRequest for SeekRowRequest {
    const ROP_ID: RopId = RopId::SeekRow;
}

impl Encode for SeekRowRequest {
    fn size(&self) -> usize {
        RopHeader::SIZE + 6
    }

    fn encode(&self, w: &mut WireWriter) -> Result<(), CodecError> {
        self.header.encode(Self::ROP_ID, w);
        w.put_u8(self.origin as u8);
        w.put_i32(self.row_count);
        w.put_bool(self.want_row_moved_count);
        Ok(())
    }
}

impl Decode for SeekRowRequest {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
        let header = RopHeader::decode(Self::ROP_ID, r)?;
        let origin = BookmarkOrigin::from_u8(r.read_u8()?)?;
        if origin == BookmarkOrigin::Custom {
            return Err(CodecError::InvalidEnum {
                field: "SeekRow Origin",
                value: origin as u32,
            });
        }
        Ok(Self {
            header,
            origin,
            row_count: r.read_i32()?,
            want_row_moved_count: r.read_bool("WantRowMovedCount")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeekRowBookmarkRequest {
    pub header: RopHeader,
    pub bookmark: Vec<u8>,
    pub row_count: i32,
    pub want_row_moved_count: bool,
}

impl RopRequest for SeekRowBookmarkRequest {
    const ROP_ID: RopId = RopId::SeekRowBookmark;
}

impl Encode for SeekRowBookmarkRequest {
    fn size(&self) -> usize {
        RopHeader::SIZE + bookmark_size(&self.bookmark) + 5
    }

    fn encode(&self, w: &mut WireWriter) -> Result<(), CodecError> {
        self.header.encode(Self::ROP_ID, w);
        w.put_sized_bytes("BookmarkSize", &self.bookmark)?;
        w.put_i32(self.row_count);
        w.put_bool(self.want_row_moved_count);
        Ok(())
    }
}

impl Decode for SeekRowBookmarkRequest {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            header: RopHeader::decode(Self::ROP_ID, r)?,
            bookmark: r.read_sized_bytes()?,
            row_count: r.read_i32()?,
            want_row_moved_count: r.read_bool("WantRowMovedCount")?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeekRowFractionalRequest {
    pub header: RopHeader,
    pub numerator: u32,
    pub denominator: u32,
}

impl RopRequest for SeekRowFractionalRequest {
    const ROP_ID: RopId = RopId::SeekRowFractional;
}

impl Encode for SeekRowFractionalRequest {
    fn size(&self) -> usize {
        RopHeader::SIZE + 8
    }

    fn encode(&self, w: &mut WireWriter) -> Result<(), CodecError> {
        self.header.encode(Self::ROP_ID, w);
        w.put_u32(self.numerator);
        w.put_u32(self.denominator);
        Ok(())
    }
}

impl Decode for SeekRowFractionalRequest {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            header: RopHeader::decode(Self::ROP_ID, r)?,
            numerator: r.read_u32()?,
            denominator: r.read_u32()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindRowRequest {
    pub header: RopHeader,
    /// FindRowFlags bit 0: search toward the beginning.
    pub backward: bool,
    pub restriction: Option<Restriction>,
    pub origin: BookmarkOrigin,
    /// Meaningful only with a custom origin.
    pub bookmark: Vec<u8>,
}

impl RopRequest for FindRowRequest {
    const ROP_ID: RopId = RopId::FindRow;
}

impl Encode for FindRowRequest {
    fn size(&self) -> usize {
        RopHeader::SIZE
            + 1
            + sized_restriction_size(self.restriction.as_ref())
            + 1
            + bookmark_size(&self.bookmark)
    }

    fn encode(&self, w: &mut WireWriter) -> Result<(), CodecError> {
        self.header.encode(Self::ROP_ID, w);
        w.put_bool(self.backward);
        encode_sized_restriction(w, self.restriction.as_ref())?;
        w.put_u8(self.origin as u8);
        w.put_sized_bytes("BookmarkSize", &self.bookmark)
    }
}

impl Decode for FindRowRequest {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            header: RopHeader::decode(Self::ROP_ID, r)?,
            backward: r.read_bool("FindRowFlags")?,
            restriction: decode_sized_restriction(r)?,
            origin: BookmarkOrigin::from_u8(r.read_u8()?)?,
            bookmark: r.read_sized_bytes()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreeBookmarkRequest {
    pub header: RopHeader,
    pub bookmark: Vec<u8>,
}

impl RopRequest for FreeBookmarkRequest {
    const ROP_ID: RopId = RopId::FreeBookmark;
}

impl Encode for FreeBookmarkRequest {
    fn size(&self) -> usize {
        RopHeader::SIZE + bookmark_size(&self.bookmark)
    }

    fn encode(&self, w: &mut WireWriter) -> Result<(), CodecError> {
        self.header.encode(Self::ROP_ID, w);
        w.put_sized_bytes("BookmarkSize", &self.bookmark)
    }
}

impl Decode for FreeBookmarkRequest {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            header: RopHeader::decode(Self::ROP_ID, r)?,
            bookmark: r.read_sized_bytes()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpandRowRequest {
    pub header: RopHeader,
    pub max_row_count: u16,
    pub category_id: u64,
}

impl RopRequest for ExpandRowRequest {
    const ROP_ID: RopId = RopId::ExpandRow;
}

impl Encode for ExpandRowRequest {
    fn size(&self) -> usize {
        RopHeader::SIZE + 10
    }

    fn encode(&self, w: &mut WireWriter) -> Result<(), CodecError> {
        self.header.encode(Self::ROP_ID, w);
        w.put_u16(self.max_row_count);
        w.put_u64(self.category_id);
        Ok(())
    }
}

impl Decode for ExpandRowRequest {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            header: RopHeader::decode(Self::ROP_ID, r)?,
            max_row_count: r.read_u16()?,
            category_id: r.read_u64()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollapseRowRequest {
    pub header: RopHeader,
    pub category_id: u64,
}

impl RopRequest for CollapseRowRequest {
    const ROP_ID: RopId = RopId::CollapseRow;
}

impl Encode for CollapseRowRequest {
    fn size(&self) -> usize {
        RopHeader::SIZE + 8
    }

    fn encode(&self, w: &mut WireWriter) -> Result<(), CodecError> {
        self.header.encode(Self::ROP_ID, w);
        w.put_u64(self.category_id);
        Ok(())
    }
}

impl Decode for CollapseRowRequest {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            header: RopHeader::decode(Self::ROP_ID, r)?,
            category_id: r.read_u64()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetCollapseStateRequest {
    pub header: RopHeader,
    pub row_id: u64,
    pub row_instance_number: u32,
}

impl RopRequest for GetCollapseStateRequest {
    const ROP_ID: RopId = RopId::GetCollapseState;
}

impl Encode for GetCollapseStateRequest {
    fn size(&self) -> usize {
        RopHeader::SIZE + 12
    }

    fn encode(&self, w: &mut WireWriter) -> Result<(), CodecError> {
        self.header.encode(Self::ROP_ID, w);
        w.put_u64(self.row_id);
        w.put_u32(self.row_instance_number);
        Ok(())
    }
}

impl Decode for GetCollapseStateRequest {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            header: RopHeader::decode(Self::ROP_ID, r)?,
            row_id: r.read_u64()?,
            row_instance_number: r.read_u32()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetCollapseStateRequest {
    pub header: RopHeader,
    pub collapse_state: Vec<u8>,
}

impl RopRequest for SetCollapseStateRequest {
    const ROP_ID: RopId = RopId::SetCollapseState;
}

impl Encode for SetCollapseStateRequest {
    fn size(&self) -> usize {
        RopHeader::SIZE + 2 + self.collapse_state.len()
    }

    fn encode(&self, w: &mut WireWriter) -> Result<(), CodecError> {
        self.header.encode(Self::ROP_ID, w);
        w.put_sized_bytes("CollapseStateSize", &self.collapse_state)
    }
}

impl Decode for SetCollapseStateRequest {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            header: RopHeader::decode(Self::ROP_ID, r)?,
            collapse_state: r.read_sized_bytes()?,
        })
    }
}

// ---------------------------------------------------------------------------
// Response payloads
// ---------------------------------------------------------------------------

/// Declares a payload holding a single TableStatus byte.
macro_rules! status_payload {
    ($name:ident, $rop:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub struct $name {
            pub table_status: TableStatus,
        }

        impl RopPayload for $name {
            const ROP_ID: RopId = RopId::$rop;
        }

        impl Encode for $name {
            fn size(&self) -> usize {
                1
            }

            fn encode(&self, w: &mut WireWriter) -> Result<(), CodecError> {
                w.put_u8(self.table_status as u8);
                Ok(())
            }
        }

        impl Decode for $name {
            fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
                Ok(Self {
                    table_status: TableStatus::from_u8(r.read_u8()?)?,
                })
            }
        }
    };
}

status_payload!(SetColumnsResponse, SetColumns);
status_payload!(SortTableResponse, SortTable);
status_payload!(RestrictResponse, Restrict);
status_payload!(GetStatusResponse, GetStatus);
status_payload!(AbortResponse, Abort);

empty_payload!(SeekRowFractionalResponse, SeekRowFractional);
empty_payload!(ResetTableResponse, ResetTable);
empty_payload!(FreeBookmarkResponse, FreeBookmark);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRowsResponse {
    pub origin: BookmarkOrigin,
    pub rows: Vec<PropertyRow>,
}

impl RopPayload for QueryRowsResponse {
    const ROP_ID: RopId = RopId::QueryRows;
}

impl EncodeWith<[PropertyTag]> for QueryRowsResponse {
    fn size_with(&self, columns: &[PropertyTag]) -> usize {
        3 + self.rows.iter().map(|r| r.size_with(columns)).sum::<usize>()
    }

    fn encode_with(&self, w: &mut WireWriter, columns: &[PropertyTag]) -> Result<(), CodecError> {
        w.put_u8(self.origin as u8);
        w.put_u16(u16_len("RowCount", self.rows.len())?);
        for row in &self.rows {
            row.encode_with(w, columns)?;
        }
        Ok(())
    }
}

impl DecodeWith<[PropertyTag]> for QueryRowsResponse {
    fn decode_with(r: &mut WireReader<'_>, columns: &[PropertyTag]) -> Result<Self, CodecError> {
        let origin = BookmarkOrigin::from_u8(r.read_u8()?)?;
        let count = r.read_u16()? as usize;
        let rows = (0..count)
            .map(|_| PropertyRow::decode_with(r, columns))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { origin, rows })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryPositionResponse {
    pub numerator: u32,
    pub denominator: u32,
}

impl RopPayload for QueryPositionResponse {
    const ROP_ID: RopId = RopId::QueryPosition;
}

impl Encode for QueryPositionResponse {
    fn size(&self) -> usize {
        8
    }

    fn encode(&self, w: &mut WireWriter) -> Result<(), CodecError> {
        w.put_u32(self.numerator);
        w.put_u32(self.denominator);
        Ok(())
    }
}

impl Decode for QueryPositionResponse {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            numerator: r.read_u32()?,
            denominator: r.read_u32()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeekRowResponse {
    pub has_sought_less: bool,
    pub rows_sought: i32,
}

impl RopPayload for SeekRowResponse {
    const ROP_ID: RopId = RopId::SeekRow;
}

impl Encode for SeekRowResponse {
    fn size(&self) -> usize {
        5
    }

    fn encode(&self, w: &mut WireWriter) -> Result<(), CodecError> {
        w.put_bool(self.has_sought_less);
        w.put_i32(self.rows_sought);
        Ok(())
    }
}

impl Decode for SeekRowResponse {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            has_sought_less: r.read_bool("HasSoughtLess")?,
            rows_sought: r.read_i32()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeekRowBookmarkResponse {
    pub row_no_longer_visible: bool,
    pub has_sought_less: bool,
    pub rows_sought: i32,
}

impl RopPayload for SeekRowBookmarkResponse {
    const ROP_ID: RopId = RopId::SeekRowBookmark;
}

impl Encode for SeekRowBookmarkResponse {
    fn size(&self) -> usize {
        6
    }

    fn encode(&self, w: &mut WireWriter) -> Result<(), CodecError> {
        w.put_bool(self.row_no_longer_visible);
        w.put_bool(self.has_sought_less);
        w.put_i32(self.rows_sought);
        Ok(())
    }
}

impl Decode for SeekRowBookmarkResponse {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            row_no_longer_visible: r.read_bool("RowNoLongerVisible")?,
            has_sought_less: r.read_bool("HasSoughtLess")?,
            rows_sought: r.read_i32()?,
        })
    }
}

/// Declares a payload holding one `u16`-prefixed byte array.
macro_rules! blob_payload {
    ($name:ident, $rop:ident, $field:ident, $size_field:literal) => {
        #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
        pub struct $name {
            pub $field: Vec<u8>,
        }

        impl RopPayload for $name {
            const ROP_ID: RopId = RopId::$rop;
        }

        impl Encode for $name {
            fn size(&self) -> usize {
                2 + self.$field.len()
            }

            fn encode(&self, w: &mut WireWriter) -> Result<(), CodecError> {
                w.put_sized_bytes($size_field, &self.$field)
            }
        }

        impl Decode for $name {
            fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
                Ok(Self {
                    $field: r.read_sized_bytes()?,
                })
            }
        }
    };
}

blob_payload!(CreateBookmarkResponse, CreateBookmark, bookmark, "BookmarkSize");
blob_payload!(GetCollapseStateResponse, GetCollapseState, collapse_state, "CollapseStateSize");
blob_payload!(SetCollapseStateResponse, SetCollapseState, bookmark, "BookmarkSize");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryColumnsAllResponse {
    pub columns: Vec<PropertyTag>,
}

impl RopPayload for QueryColumnsAllResponse {
    const ROP_ID: RopId = RopId::QueryColumnsAll;
}

impl Encode for QueryColumnsAllResponse {
    fn size(&self) -> usize {
        tag_list_size(&self.columns)
    }

    fn encode(&self, w: &mut WireWriter) -> Result<(), CodecError> {
        encode_tag_list(w, "PropertyTagCount", &self.columns)
    }
}

impl Decode for QueryColumnsAllResponse {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            columns: decode_tag_list(r)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindRowResponse {
    pub row_no_longer_visible: bool,
    /// Present iff HasRowData is non-zero.
    pub row: Option<PropertyRow>,
}

impl RopPayload for FindRowResponse {
    const ROP_ID: RopId = RopId::FindRow;
}

impl EncodeWith<[PropertyTag]> for FindRowResponse {
    fn size_with(&self, columns: &[PropertyTag]) -> usize {
        2 + self.row.as_ref().map(|r| r.size_with(columns)).unwrap_or(0)
    }

    fn encode_with(&self, w: &mut WireWriter, columns: &[PropertyTag]) -> Result<(), CodecError> {
        w.put_bool(self.row_no_longer_visible);
        w.put_bool(self.row.is_some());
        if let Some(row) = &self.row {
            row.encode_with(w, columns)?;
        }
        Ok(())
    }
}

impl DecodeWith<[PropertyTag]> for FindRowResponse {
    fn decode_with(r: &mut WireReader<'_>, columns: &[PropertyTag]) -> Result<Self, CodecError> {
        let row_no_longer_visible = r.read_bool("RowNoLongerVisible")?;
        let has_row_data = r.read_u8()? != 0;
        let row = if has_row_data {
            Some(PropertyRow::decode_with(r, columns)?)
        } else {
            None
        };
        Ok(Self {
            row_no_longer_visible,
            row,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpandRowResponse {
    /// Rows that became visible under the category.
    pub expanded_row_count: u32,
    /// The first MaxRowCount of those rows.
    pub rows: Vec<PropertyRow>,
}

impl RopPayload for ExpandRowResponse {
    const ROP_ID: RopId = RopId::ExpandRow;
}

impl EncodeWith<[PropertyTag]> for ExpandRowResponse {
    fn size_with(&self, columns: &[PropertyTag]) -> usize {
        6 + self.rows.iter().map(|r| r.size_with(columns)).sum::<usize>()
    }

    fn encode_with(&self, w: &mut WireWriter, columns: &[PropertyTag]) -> Result<(), CodecError> {
        w.put_u32(self.expanded_row_count);
        w.put_u16(u16_len("RowCount", self.rows.len())?);
        for row in &self.rows {
            row.encode_with(w, columns)?;
        }
        Ok(())
    }
}

impl DecodeWith<[PropertyTag]> for ExpandRowResponse {
    fn decode_with(r: &mut WireReader<'_>, columns: &[PropertyTag]) -> Result<Self, CodecError> {
        let expanded_row_count = r.read_u32()?;
        let count = r.read_u16()? as usize;
        let rows = (0..count)
            .map(|_| PropertyRow::decode_with(r, columns))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            expanded_row_count,
            rows,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollapseRowResponse {
    pub collapsed_row_count: u32,
}

impl RopPayload for CollapseRowResponse {
    const ROP_ID: RopId = RopId::CollapseRow;
}

impl Encode for CollapseRowResponse {
    fn size(&self) -> usize {
        4
    }

    fn encode(&self, w: &mut WireWriter) -> Result<(), CodecError> {
        w.put_u32(self.collapsed_row_count);
        Ok(())
    }
}

impl Decode for CollapseRowResponse {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            collapsed_row_count: r.read_u32()?,
        })
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Any table ROP request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "rop")]
pub enum TableRequest {
    Release(ReleaseRequest),
    SetColumns(SetColumnsRequest),
    SortTable(SortTableRequest),
    Restrict(RestrictRequest),
    QueryRows(QueryRowsRequest),
    GetStatus(GetStatusRequest),
    QueryPosition(QueryPositionRequest),
    SeekRow(SeekRowRequest),
    SeekRowBookmark(SeekRowBookmarkRequest),
    SeekRowFractional(SeekRowFractionalRequest),
    CreateBookmark(CreateBookmarkRequest),
    Abort(AbortRequest),
    QueryColumnsAll(QueryColumnsAllRequest),
    FindRow(FindRowRequest),
    ExpandRow(ExpandRowRequest),
    CollapseRow(CollapseRowRequest),
    GetCollapseState(GetCollapseStateRequest),
    SetCollapseState(SetCollapseStateRequest),
    ResetTable(ResetTableRequest),
    FreeBookmark(FreeBookmarkRequest),
}

impl TableRequest {
    pub fn rop_id(&self) -> RopId {
        match self {
            TableRequest::Release(_) => RopId::Release,
            TableRequest::SetColumns(_) => RopId::SetColumns,
            TableRequest::SortTable(_) => RopId::SortTable,
            TableRequest::Restrict(_) => RopId::Restrict,
            TableRequest::QueryRows(_) => RopId::QueryRows,
            TableRequest::GetStatus(_) => RopId::GetStatus,
            TableRequest::QueryPosition(_) => RopId::QueryPosition,
            TableRequest::SeekRow(_) => RopId::SeekRow,
            TableRequest::SeekRowBookmark(_) => RopId::SeekRowBookmark,
            TableRequest::SeekRowFractional(_) => RopId::SeekRowFractional,
            TableRequest::CreateBookmark(_) => RopId::CreateBookmark,
            TableRequest::Abort(_) => RopId::Abort,
            TableRequest::QueryColumnsAll(_) => RopId::QueryColumnsAll,
            TableRequest::FindRow(_) => RopId::FindRow,
            TableRequest::ExpandRow(_) => RopId::ExpandRow,
            TableRequest::CollapseRow(_) => RopId::CollapseRow,
            TableRequest::GetCollapseState(_) => RopId::GetCollapseState,
            TableRequest::SetCollapseState(_) => RopId::SetCollapseState,
            TableRequest::ResetTable(_) => RopId::ResetTable,
            TableRequest::FreeBookmark(_) => RopId::FreeBookmark,
        }
    }

    pub fn header(&self) -> RopHeader {
        match self {
            TableRequest::Release(r) => r.header,
            TableRequest::SetColumns(r) => r.header,
            TableRequest::SortTable(r) => r.header,
            TableRequest::Restrict(r) => r.header,
            TableRequest::QueryRows(r) => r.header,
            TableRequest::GetStatus(r) => r.header,
            TableRequest::QueryPosition(r) => r.header,
            TableRequest::SeekRow(r) => r.header,
            TableRequest::SeekRowBookmark(r) => r.header,
            TableRequest::SeekRowFractional(r) => r.header,
            TableRequest::CreateBookmark(r) => r.header,
            TableRequest::Abort(r) => r.header,
            TableRequest::QueryColumnsAll(r) => r.header,
            TableRequest::FindRow(r) => r.header,
            TableRequest::ExpandRow(r) => r.header,
            TableRequest::CollapseRow(r) => r.header,
            TableRequest::GetCollapseState(r) => r.header,
            TableRequest::SetCollapseState(r) => r.header,
            TableRequest::ResetTable(r) => r.header,
            TableRequest::FreeBookmark(r) => r.header,
        }
    }

    fn inner(&self) -> &dyn Encode {
        match self {
            TableRequest::Release(r) => r,
            TableRequest::SetColumns(r) => r,
            TableRequest::SortTable(r) => r,
            TableRequest::Restrict(r) => r,
            TableRequest::QueryRows(r) => r,
            TableRequest::GetStatus(r) => r,
            TableRequest::QueryPosition(r) => r,
            TableRequest::SeekRow(r) => r,
            TableRequest::SeekRowBookmark(r) => r,
            TableRequest::SeekRowFractional(r) => r,
            TableRequest::CreateBookmark(r) => r,
            TableRequest::Abort(r) => r,
            TableRequest::QueryColumnsAll(r) => r,
            TableRequest::FindRow(r) => r,
            TableRequest::ExpandRow(r) => r,
            TableRequest::CollapseRow(r) => r,
            TableRequest::GetCollapseState(r) => r,
            TableRequest::SetCollapseState(r) => r,
            TableRequest::ResetTable(r) => r,
            TableRequest::FreeBookmark(r) => r,
        }
    }
}

impl Encode for TableRequest {
    fn size(&self) -> usize {
        self.inner().size()
    }

    fn encode(&self, w: &mut WireWriter) -> Result<(), CodecError> {
        self.inner().encode(w)
    }
}

impl Decode for TableRequest {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
        Ok(match RopId::from_u8(r.peek_u8()?)? {
            RopId::Release => TableRequest::Release(Decode::decode(r)?),
            RopId::SetColumns => TableRequest::SetColumns(Decode::decode(r)?),
            RopId::SortTable => TableRequest::SortTable(Decode::decode(r)?),
            RopId::Restrict => TableRequest::Restrict(Decode::decode(r)?),
            RopId::QueryRows => TableRequest::QueryRows(Decode::decode(r)?),
            RopId::GetStatus => TableRequest::GetStatus(Decode::decode(r)?),
            RopId::QueryPosition => TableRequest::QueryPosition(Decode::decode(r)?),
            RopId::SeekRow => TableRequest::SeekRow(Decode::decode(r)?),
            RopId::SeekRowBookmark => TableRequest::SeekRowBookmark(Decode::decode(r)?),
            RopId::SeekRowFractional => TableRequest::SeekRowFractional(Decode::decode(r)?),
            RopId::CreateBookmark => TableRequest::CreateBookmark(Decode::decode(r)?),
            RopId::Abort => TableRequest::Abort(Decode::decode(r)?),
            RopId::QueryColumnsAll => TableRequest::QueryColumnsAll(Decode::decode(r)?),
            RopId::FindRow => TableRequest::FindRow(Decode::decode(r)?),
            RopId::ExpandRow => TableRequest::ExpandRow(Decode::decode(r)?),
            RopId::CollapseRow => TableRequest::CollapseRow(Decode::decode(r)?),
            RopId::GetCollapseState => TableRequest::GetCollapseState(Decode::decode(r)?),
            RopId::SetCollapseState => TableRequest::SetCollapseState(Decode::decode(r)?),
            RopId::ResetTable => TableRequest::ResetTable(Decode::decode(r)?),
            RopId::FreeBookmark => TableRequest::FreeBookmark(Decode::decode(r)?),
            other => return Err(CodecError::UnknownRopId(other as u8)),
        })
    }
}

/// Any table ROP response. Release has none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "rop", content = "response")]
pub enum TableResponse {
    SetColumns(RopResponse<SetColumnsResponse>),
    SortTable(RopResponse<SortTableResponse>),
    Restrict(RopResponse<RestrictResponse>),
    QueryRows(RopResponse<QueryRowsResponse>),
    GetStatus(RopResponse<GetStatusResponse>),
    QueryPosition(RopResponse<QueryPositionResponse>),
    SeekRow(RopResponse<SeekRowResponse>),
    SeekRowBookmark(RopResponse<SeekRowBookmarkResponse>),
    SeekRowFractional(RopResponse<SeekRowFractionalResponse>),
    CreateBookmark(RopResponse<CreateBookmarkResponse>),
    Abort(RopResponse<AbortResponse>),
    QueryColumnsAll(RopResponse<QueryColumnsAllResponse>),
    FindRow(RopResponse<FindRowResponse>),
    ExpandRow(RopResponse<ExpandRowResponse>),
    CollapseRow(RopResponse<CollapseRowResponse>),
    GetCollapseState(RopResponse<GetCollapseStateResponse>),
    SetCollapseState(RopResponse<SetCollapseStateResponse>),
    ResetTable(RopResponse<ResetTableResponse>),
    FreeBookmark(RopResponse<FreeBookmarkResponse>),
}

impl TableResponse {
    pub fn rop_id(&self) -> RopId {
        match self {
            TableResponse::SetColumns(_) => RopId::SetColumns,
            TableResponse::SortTable(_) => RopId::SortTable,
            TableResponse::Restrict(_) => RopId::Restrict,
            TableResponse::QueryRows(_) => RopId::QueryRows,
            TableResponse::GetStatus(_) => RopId::GetStatus,
            TableResponse::QueryPosition(_) => RopId::QueryPosition,
            TableResponse::SeekRow(_) => RopId::SeekRow,
            TableResponse::SeekRowBookmark(_) => RopId::SeekRowBookmark,
            TableResponse::SeekRowFractional(_) => RopId::SeekRowFractional,
            TableResponse::CreateBookmark(_) => RopId::CreateBookmark,
            TableResponse::Abort(_) => RopId::Abort,
            TableResponse::QueryColumnsAll(_) => RopId::QueryColumnsAll,
            TableResponse::FindRow(_) => RopId::FindRow,
            TableResponse::ExpandRow(_) => RopId::ExpandRow,
            TableResponse::CollapseRow(_) => RopId::CollapseRow,
            TableResponse::GetCollapseState(_) => RopId::GetCollapseState,
            TableResponse::SetCollapseState(_) => RopId::SetCollapseState,
            TableResponse::ResetTable(_) => RopId::ResetTable,
            TableResponse::FreeBookmark(_) => RopId::FreeBookmark,
        }
    }

    pub fn return_value(&self) -> u32 {
        match self {
            TableResponse::SetColumns(r) => r.return_value(),
            TableResponse::SortTable(r) => r.return_value(),
            TableResponse::Restrict(r) => r.return_value(),
            TableResponse::QueryRows(r) => r.return_value(),
            TableResponse::GetStatus(r) => r.return_value(),
            TableResponse::QueryPosition(r) => r.return_value(),
            TableResponse::SeekRow(r) => r.return_value(),
            TableResponse::SeekRowBookmark(r) => r.return_value(),
            TableResponse::SeekRowFractional(r) => r.return_value(),
            TableResponse::CreateBookmark(r) => r.return_value(),
            TableResponse::Abort(r) => r.return_value(),
            TableResponse::QueryColumnsAll(r) => r.return_value(),
            TableResponse::FindRow(r) => r.return_value(),
            TableResponse::ExpandRow(r) => r.return_value(),
            TableResponse::CollapseRow(r) => r.return_value(),
            TableResponse::GetCollapseState(r) => r.return_value(),
            TableResponse::SetCollapseState(r) => r.return_value(),
            TableResponse::ResetTable(r) => r.return_value(),
            TableResponse::FreeBookmark(r) => r.return_value(),
        }
    }
}

impl EncodeWith<[PropertyTag]> for TableResponse {
    fn size_with(&self, columns: &[PropertyTag]) -> usize {
        match self {
            TableResponse::SetColumns(r) => r.size(),
            TableResponse::SortTable(r) => r.size(),
            TableResponse::Restrict(r) => r.size(),
            TableResponse::QueryRows(r) => r.size_with(columns),
            TableResponse::GetStatus(r) => r.size(),
            TableResponse::QueryPosition(r) => r.size(),
            TableResponse::SeekRow(r) => r.size(),
            TableResponse::SeekRowBookmark(r) => r.size(),
            TableResponse::SeekRowFractional(r) => r.size(),
            TableResponse::CreateBookmark(r) => r.size(),
            TableResponse::Abort(r) => r.size(),
            TableResponse::QueryColumnsAll(r) => r.size(),
            TableResponse::FindRow(r) => r.size_with(columns),
            TableResponse::ExpandRow(r) => r.size_with(columns),
            TableResponse::CollapseRow(r) => r.size(),
            TableResponse::GetCollapseState(r) => r.size(),
            TableResponse::SetCollapseState(r) => r.size(),
            TableResponse::ResetTable(r) => r.size(),
            TableResponse::FreeBookmark(r) => r.size(),
        }
    }

    fn encode_with(&self, w: &mut WireWriter, columns: &[PropertyTag]) -> Result<(), CodecError> {
        match self {
            TableResponse::SetColumns(r) => r.encode(w),
            TableResponse::SortTable(r) => r.encode(w),
            TableResponse::Restrict(r) => r.encode(w),
            TableResponse::QueryRows(r) => r.encode_with(w, columns),
            TableResponse::GetStatus(r) => r.encode(w),
            TableResponse::QueryPosition(r) => r.encode(w),
            TableResponse::SeekRow(r) => r.encode(w),
            TableResponse::SeekRowBookmark(r) => r.encode(w),
            TableResponse::SeekRowFractional(r) => r.encode(w),
            TableResponse::CreateBookmark(r) => r.encode(w),
            TableResponse::Abort(r) => r.encode(w),
            TableResponse::QueryColumnsAll(r) => r.encode(w),
            TableResponse::FindRow(r) => r.encode_with(w, columns),
            TableResponse::ExpandRow(r) => r.encode_with(w, columns),
            TableResponse::CollapseRow(r) => r.encode(w),
            TableResponse::GetCollapseState(r) => r.encode(w),
            TableResponse::SetCollapseState(r) => r.encode(w),
            TableResponse::ResetTable(r) => r.encode(w),
            TableResponse::FreeBookmark(r) => r.encode(w),
        }
    }
}

impl DecodeWith<[PropertyTag]> for TableResponse {
    fn decode_with(r: &mut WireReader<'_>, columns: &[PropertyTag]) -> Result<Self, CodecError> {
        Ok(match RopId::from_u8(r.peek_u8()?)? {
            RopId::SetColumns => TableResponse::SetColumns(Decode::decode(r)?),
            RopId::SortTable => TableResponse::SortTable(Decode::decode(r)?),
            RopId::Restrict => TableResponse::Restrict(Decode::decode(r)?),
            RopId::QueryRows => TableResponse::QueryRows(DecodeWith::decode_with(r, columns)?),
            RopId::GetStatus => TableResponse::GetStatus(Decode::decode(r)?),
            RopId::QueryPosition => TableResponse::QueryPosition(Decode::decode(r)?),
            RopId::SeekRow => TableResponse::SeekRow(Decode::decode(r)?),
            RopId::SeekRowBookmark => TableResponse::SeekRowBookmark(Decode::decode(r)?),
            RopId::SeekRowFractional => TableResponse::SeekRowFractional(Decode::decode(r)?),
            RopId::CreateBookmark => TableResponse::CreateBookmark(Decode::decode(r)?),
            RopId::Abort => TableResponse::Abort(Decode::decode(r)?),
            RopId::QueryColumnsAll => TableResponse::QueryColumnsAll(Decode::decode(r)?),
            RopId::FindRow => TableResponse::FindRow(DecodeWith::decode_with(r, columns)?),
            RopId::ExpandRow => TableResponse::ExpandRow(DecodeWith::decode_with(r, columns)?),
            RopId::CollapseRow => TableResponse::CollapseRow(Decode::decode(r)?),
            RopId::GetCollapseState => TableResponse::GetCollapseState(Decode::decode(r)?),
            RopId::SetCollapseState => TableResponse::SetCollapseState(Decode::decode(r)?),
            RopId::ResetTable => TableResponse::ResetTable(Decode::decode(r)?),
            RopId::FreeBookmark => TableResponse::FreeBookmark(Decode::decode(r)?),
            other => return Err(CodecError::UnknownRopId(other as u8)),
        })
    }
}
