//! ROP identifiers and the response envelope.
//!
//! Every response begins with RopId, a handle index and a 32-bit
//! ReturnValue. The payload that follows exists only when ReturnValue is
//! zero, which [`RopOutcome`] makes explicit:
//!
//! ```text
//! +-------+--------------+-------------+---------------------------+
//! | RopId | handle index | ReturnValue | payload (iff ReturnValue  |
//! | 1     | 1            | 4           | == 0)                     |
//! +-------+--------------+-------------+---------------------------+
//! ```

use crate::error::{CodecError, ResultCode};
use crate::wire::{Decode, DecodeWith, Encode, EncodeWith, WireReader, WireWriter};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Operation codes for the ROPs this crate understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum RopId {
    Release = 0x01,
    OpenMessage = 0x03,
    CreateMessage = 0x06,
    SaveChangesMessage = 0x0C,
    RemoveAllRecipients = 0x0D,
    ModifyRecipients = 0x0E,
    ReadRecipients = 0x0F,
    SetColumns = 0x12,
    SortTable = 0x13,
    Restrict = 0x14,
    QueryRows = 0x15,
    GetStatus = 0x16,
    QueryPosition = 0x17,
    SeekRow = 0x18,
    SeekRowBookmark = 0x19,
    SeekRowFractional = 0x1A,
    CreateBookmark = 0x1B,
    GetMessageStatus = 0x1F,
    SetMessageStatus = 0x20,
    GetAttachmentTable = 0x21,
    OpenAttachment = 0x22,
    CreateAttachment = 0x23,
    DeleteAttachment = 0x24,
    SaveChangesAttachment = 0x25,
    Abort = 0x34,
    QueryColumnsAll = 0x37,
    FindRow = 0x4F,
    ExpandRow = 0x59,
    CollapseRow = 0x5A,
    GetCollapseState = 0x6B,
    SetCollapseState = 0x6C,
    ResetTable = 0x81,
    FreeBookmark = 0x89,
}

impl RopId {
    pub const ALL: [RopId; 33] = [
        RopId::Release,
        RopId::OpenMessage,
        RopId::CreateMessage,
        RopId::SaveChangesMessage,
        RopId::RemoveAllRecipients,
        RopId::ModifyRecipients,
        RopId::ReadRecipients,
        RopId::SetColumns,
        RopId::SortTable,
        RopId::Restrict,
        RopId::QueryRows,
        RopId::GetStatus,
        RopId::QueryPosition,
        RopId::SeekRow,
        RopId::SeekRowBookmark,
        RopId::SeekRowFractional,
        RopId::CreateBookmark,
        RopId::GetMessageStatus,
        RopId::SetMessageStatus,
        RopId::GetAttachmentTable,
        RopId::OpenAttachment,
        RopId::CreateAttachment,
        RopId::DeleteAttachment,
        RopId::SaveChangesAttachment,
        RopId::Abort,
        RopId::QueryColumnsAll,
        RopId::FindRow,
        RopId::ExpandRow,
        RopId::CollapseRow,
        RopId::GetCollapseState,
        RopId::SetCollapseState,
        RopId::ResetTable,
        RopId::FreeBookmark,
    ];

    pub fn from_u8(v: u8) -> Result<Self, CodecError> {
        Self::ALL
            .into_iter()
            .find(|id| *id as u8 == v)
            .ok_or(CodecError::UnknownRopId(v))
    }

    /// Consumes the RopId byte and checks it.
    pub fn expect(self, r: &mut WireReader<'_>) -> Result<(), CodecError> {
        let actual = r.read_u8()?;
        if actual != self as u8 {
            return Err(CodecError::UnexpectedRopId {
                expected: self as u8,
                actual,
            });
        }
        Ok(())
    }

    /// Parses a ROP name such as `query_rows` or `QueryRows`.
    pub fn parse_name(name: &str) -> Option<Self> {
        let wanted: String = name
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();
        Self::ALL.into_iter().find(|id| {
            let have: String = format!("{:?}", id).to_lowercase();
            have == wanted
        })
    }
}

impl fmt::Display for RopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rop{:?}", self)
    }
}

/// RopId, LogonId and InputHandleIndex: the common request prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RopHeader {
    pub logon_id: u8,
    pub input_handle_index: u8,
}

impl RopHeader {
    /// Encoded size including the RopId byte.
    pub const SIZE: usize = 3;

    pub fn new(logon_id: u8, input_handle_index: u8) -> Self {
        Self {
            logon_id,
            input_handle_index,
        }
    }

    pub fn encode(&self, rop_id: RopId, w: &mut WireWriter) {
        w.put_u8(rop_id as u8);
        w.put_u8(self.logon_id);
        w.put_u8(self.input_handle_index);
    }

    pub fn decode(rop_id: RopId, r: &mut WireReader<'_>) -> Result<Self, CodecError> {
        rop_id.expect(r)?;
        Ok(Self {
            logon_id: r.read_u8()?,
            input_handle_index: r.read_u8()?,
        })
    }
}

/// A request bound to one ROP.
pub trait RopRequest {
    const ROP_ID: RopId;
}

/// A response payload bound to one ROP.
pub trait RopPayload {
    const ROP_ID: RopId;
}

/// Success payload or failure return value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RopOutcome<T> {
    Success(T),
    /// `return_value` is never zero.
    Failure { return_value: u32 },
}

/// A decoded or to-be-encoded ROP response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RopResponse<T> {
    pub handle_index: u8,
    pub outcome: RopOutcome<T>,
}

impl<T> RopResponse<T> {
    pub fn success(handle_index: u8, payload: T) -> Self {
        Self {
            handle_index,
            outcome: RopOutcome::Success(payload),
        }
    }

    pub fn failure(handle_index: u8, code: ResultCode) -> Self {
        Self {
            handle_index,
            outcome: RopOutcome::Failure {
                return_value: code.as_u32(),
            },
        }
    }

    pub fn return_value(&self) -> u32 {
        match &self.outcome {
            RopOutcome::Success(_) => 0,
            RopOutcome::Failure { return_value } => *return_value,
        }
    }

    pub fn result_code(&self) -> Option<ResultCode> {
        ResultCode::from_u32(self.return_value())
    }

    pub fn payload(&self) -> Option<&T> {
        match &self.outcome {
            RopOutcome::Success(payload) => Some(payload),
            RopOutcome::Failure { .. } => None,
        }
    }

    fn encode_header(&self, rop_id: RopId, w: &mut WireWriter) -> Result<(), CodecError> {
        let return_value = self.return_value();
        if matches!(self.outcome, RopOutcome::Failure { .. }) && return_value == 0 {
            return Err(CodecError::InvalidEnum {
                field: "failure ReturnValue",
                value: 0,
            });
        }
        w.put_u8(rop_id as u8);
        w.put_u8(self.handle_index);
        w.put_u32(return_value);
        Ok(())
    }
}

/// Reads the response header; returns the handle index and return value.
fn decode_header(rop_id: RopId, r: &mut WireReader<'_>) -> Result<(u8, u32), CodecError> {
    rop_id.expect(r)?;
    let handle_index = r.read_u8()?;
    let return_value = r.read_u32()?;
    Ok((handle_index, return_value))
}

impl<T: RopPayload + Encode> Encode for RopResponse<T> {
    fn size(&self) -> usize {
        6 + self.payload().map(Encode::size).unwrap_or(0)
    }

    fn encode(&self, w: &mut WireWriter) -> Result<(), CodecError> {
        self.encode_header(T::ROP_ID, w)?;
        match &self.outcome {
            RopOutcome::Success(payload) => payload.encode(w),
            RopOutcome::Failure { .. } => Ok(()),
        }
    }
}

impl<T: RopPayload + Decode> Decode for RopResponse<T> {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
        let (handle_index, return_value) = decode_header(T::ROP_ID, r)?;
        let outcome = if return_value == 0 {
            RopOutcome::Success(T::decode(r)?)
        } else {
            RopOutcome::Failure { return_value }
        };
        Ok(Self {
            handle_index,
            outcome,
        })
    }
}

impl<C: ?Sized, T: RopPayload + EncodeWith<C>> EncodeWith<C> for RopResponse<T> {
    fn size_with(&self, ctx: &C) -> usize {
        6 + self.payload().map(|p| p.size_with(ctx)).unwrap_or(0)
    }

    fn encode_with(&self, w: &mut WireWriter, ctx: &C) -> Result<(), CodecError> {
        self.encode_header(T::ROP_ID, w)?;
        match &self.outcome {
            RopOutcome::Success(payload) => payload.encode_with(w, ctx),
            RopOutcome::Failure { .. } => Ok(()),
        }
    }
}

impl<C: ?Sized, T: RopPayload + DecodeWith<C>> DecodeWith<C> for RopResponse<T> {
    fn decode_with(r: &mut WireReader<'_>, ctx: &C) -> Result<Self, CodecError> {
        let (handle_index, return_value) = decode_header(T::ROP_ID, r)?;
        let outcome = if return_value == 0 {
            RopOutcome::Success(T::decode_with(r, ctx)?)
        } else {
            RopOutcome::Failure { return_value }
        };
        Ok(Self {
            handle_index,
            outcome,
        })
    }
}

/// Declares a response payload with no fields.
macro_rules! empty_payload {
    ($(#[$meta:meta])* $name:ident, $rop:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ::serde::Serialize, ::serde::Deserialize)]
        pub struct $name;

        impl $crate::rop::RopPayload for $name {
            const ROP_ID: $crate::rop::RopId = $crate::rop::RopId::$rop;
        }

        impl $crate::wire::Encode for $name {
            fn size(&self) -> usize {
                0
            }

            fn encode(
                &self,
                _w: &mut $crate::wire::WireWriter,
            ) -> Result<(), $crate::error::CodecError> {
                Ok(())
            }
        }

        impl $crate::wire::Decode for $name {
            fn decode(
                _r: &mut $crate::wire::WireReader<'_>,
            ) -> Result<Self, $crate::error::CodecError> {
                Ok($name)
            }
        }
    };
}

pub(crate) use empty_payload;

/// Declares a request made of the common header alone.
macro_rules! header_only_request {
    ($(#[$meta:meta])* $name:ident, $rop:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ::serde::Serialize, ::serde::Deserialize)]
        pub struct $name {
            pub header: $crate::rop::RopHeader,
        }

        impl $crate::rop::RopRequest for $name {
            const ROP_ID: $crate::rop::RopId = $crate::rop::RopId::$rop;
        }

        impl $crate::wire::Encode for $name {
            fn size(&self) -> usize {
                $crate::rop::RopHeader::SIZE
            }

            fn encode(
                &self,
                w: &mut $crate::wire::WireWriter,
            ) -> Result<(), $crate::error::CodecError> {
                self.header.encode($crate::rop::RopId::$rop, w);
                Ok(())
            }
        }

        impl $crate::wire::Decode for $name {
            fn decode(
                r: &mut $crate::wire::WireReader<'_>,
            ) -> Result<Self, $crate::error::CodecError> {
                Ok(Self {
                    header: $crate::rop::RopHeader::decode($crate::rop::RopId::$rop, r)?,
                })
            }
        }
    };
}

pub(crate) use header_only_request;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Status(u8);

    impl RopPayload for Status {
        const ROP_ID: RopId = RopId::GetStatus;
    }

    impl Encode for Status {
        fn size(&self) -> usize {
            1
        }

        fn encode(&self, w: &mut WireWriter) -> Result<(), CodecError> {
            w.put_u8(self.0);
            Ok(())
        }
    }

    impl Decode for Status {
        fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
            Ok(Status(r.read_u8()?))
        }
    }

    #[test]
    fn test_success_carries_payload() {
        let resp = RopResponse::success(2, Status(9));
        let bytes = resp.to_bytes().unwrap();
        assert_eq!(bytes.as_ref(), &[0x16, 2, 0, 0, 0, 0, 9]);
        let (decoded, consumed) = RopResponse::<Status>::decode_at(&bytes, 0).unwrap();
        assert_eq!(decoded, resp);
        assert_eq!(consumed, 7);
    }

    #[test]
    fn test_failure_has_no_payload() {
        let resp: RopResponse<Status> = RopResponse::failure(0, ResultCode::NullObject);
        let bytes = resp.to_bytes().unwrap();
        assert_eq!(bytes.as_ref(), &[0x16, 0, 0xB9, 0x04, 0, 0]);
        // Trailing bytes after a failure are not part of the response.
        let mut buf = bytes.to_vec();
        buf.push(0x77);
        let (decoded, consumed) = RopResponse::<Status>::decode_at(&buf, 0).unwrap();
        assert_eq!(decoded.result_code(), Some(ResultCode::NullObject));
        assert!(decoded.payload().is_none());
        assert_eq!(consumed, 6);
    }

    #[test]
    fn test_failure_with_zero_rejected() {
        let resp: RopResponse<Status> = RopResponse {
            handle_index: 0,
            outcome: RopOutcome::Failure { return_value: 0 },
        };
        assert!(resp.to_bytes().is_err());
    }

    #[test]
    fn test_wrong_rop_id() {
        let bytes = [0x15, 0, 0, 0, 0, 0, 1];
        assert_eq!(
            RopResponse::<Status>::decode_at(&bytes, 0).unwrap_err(),
            CodecError::UnexpectedRopId {
                expected: 0x16,
                actual: 0x15
            }
        );
    }

    #[test]
    fn test_rop_id_lookup() {
        for id in RopId::ALL {
            assert_eq!(RopId::from_u8(id as u8).unwrap(), id);
        }
        assert_eq!(RopId::from_u8(0xFE), Err(CodecError::UnknownRopId(0xFE)));
        assert_eq!(RopId::parse_name("query_rows"), Some(RopId::QueryRows));
        assert_eq!(RopId::parse_name("SeekRowBookmark"), Some(RopId::SeekRowBookmark));
        assert_eq!(RopId::parse_name("nope"), None);
    }
}
