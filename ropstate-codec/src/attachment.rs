//! Attachment ROPs.

use crate::error::CodecError;
use crate::message::SaveHeader;
use crate::rop::{empty_payload, RopHeader, RopId, RopPayload, RopRequest};
use crate::wire::{Decode, Encode, WireReader, WireWriter};
use serde::{Deserialize, Serialize};

/// OpenModeFlags for OpenAttachment.
pub mod attach_open_mode {
    pub const READ_ONLY: u8 = 0x00;
    pub const READ_WRITE: u8 = 0x01;
    pub const BEST_ACCESS: u8 = 0x03;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetAttachmentTableRequest {
    pub header: RopHeader,
    pub output_handle_index: u8,
    pub table_flags: u8,
}

impl GetAttachmentTableRequest {
    /// Only the Unicode bit (0x40) is meaningful for attachment tables.
    pub const UNICODE: u8 = 0x40;
}

impl RopRequest for GetAttachmentTableRequest {
    const ROP_ID: RopId = RopId::GetAttachmentTable;
}

impl Encode for GetAttachmentTableRequest {
    fn size(&self) -> usize {
        RopHeader::SIZE + 2
    }

    fn encode(&self, w: &mut WireWriter) -> Result<(), CodecError> {
        self.header.encode(Self::ROP_ID, w);
        w.put_u8(self.output_handle_index);
        w.put_u8(self.table_flags);
        Ok(())
    }
}

impl Decode for GetAttachmentTableRequest {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            header: RopHeader::decode(Self::ROP_ID, r)?,
            output_handle_index: r.read_u8()?,
            table_flags: r.read_u8()?,
        })
    }
}

empty_payload!(GetAttachmentTableResponse, GetAttachmentTable);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenAttachmentRequest {
    pub header: RopHeader,
    pub output_handle_index: u8,
    pub open_mode_flags: u8,
    pub attachment_id: u32,
}

impl RopRequest for OpenAttachmentRequest {
    const ROP_ID: RopId = RopId::OpenAttachment;
}

impl Encode for OpenAttachmentRequest {
    fn size(&self) -> usize {
        RopHeader::SIZE + 6
    }

    fn encode(&self, w: &mut WireWriter) -> Result<(), CodecError> {
        self.header.encode(Self::ROP_ID, w);
        w.put_u8(self.output_handle_index);
        w.put_u8(self.open_mode_flags);
        w.put_u32(self.attachment_id);
        Ok(())
    }
}

impl Decode for OpenAttachmentRequest {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            header: RopHeader::decode(Self::ROP_ID, r)?,
            output_handle_index: r.read_u8()?,
            open_mode_flags: r.read_u8()?,
            attachment_id: r.read_u32()?,
        })
    }
}

empty_payload!(OpenAttachmentResponse, OpenAttachment);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateAttachmentRequest {
    pub header: RopHeader,
    pub output_handle_index: u8,
}

impl RopRequest for CreateAttachmentRequest {
    const ROP_ID: RopId = RopId::CreateAttachment;
}

impl Encode for CreateAttachmentRequest {
    fn size(&self) -> usize {
        RopHeader::SIZE + 1
    }

    fn encode(&self, w: &mut WireWriter) -> Result<(), CodecError> {
        self.header.encode(Self::ROP_ID, w);
        w.put_u8(self.output_handle_index);
        Ok(())
    }
}

impl Decode for CreateAttachmentRequest {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            header: RopHeader::decode(Self::ROP_ID, r)?,
            output_handle_index: r.read_u8()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateAttachmentResponse {
    pub attachment_id: u32,
}

impl RopPayload for CreateAttachmentResponse {
    const ROP_ID: RopId = RopId::CreateAttachment;
}

impl Encode for CreateAttachmentResponse {
    fn size(&self) -> usize {
        4
    }

    fn encode(&self, w: &mut WireWriter) -> Result<(), CodecError> {
        w.put_u32(self.attachment_id);
        Ok(())
    }
}

impl Decode for CreateAttachmentResponse {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            attachment_id: r.read_u32()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteAttachmentRequest {
    pub header: RopHeader,
    pub attachment_id: u32,
}

impl RopRequest for DeleteAttachmentRequest {
    const ROP_ID: RopId = RopId::DeleteAttachment;
}

impl Encode for DeleteAttachmentRequest {
    fn size(&self) -> usize {
        RopHeader::SIZE + 4
    }

    fn encode(&self, w: &mut WireWriter) -> Result<(), CodecError> {
        self.header.encode(Self::ROP_ID, w);
        w.put_u32(self.attachment_id);
        Ok(())
    }
}

impl Decode for DeleteAttachmentRequest {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            header: RopHeader::decode(Self::ROP_ID, r)?,
            attachment_id: r.read_u32()?,
        })
    }
}

empty_payload!(DeleteAttachmentResponse, DeleteAttachment);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveChangesAttachmentRequest {
    pub header: SaveHeader,
    pub save_flags: u8,
}

impl RopRequest for SaveChangesAttachmentRequest {
    const ROP_ID: RopId = RopId::SaveChangesAttachment;
}

impl Encode for SaveChangesAttachmentRequest {
    fn size(&self) -> usize {
        SaveHeader::SIZE + 1
    }

    fn encode(&self, w: &mut WireWriter) -> Result<(), CodecError> {
        self.header.encode(Self::ROP_ID, w);
        w.put_u8(self.save_flags);
        Ok(())
    }
}

impl Decode for SaveChangesAttachmentRequest {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            header: SaveHeader::decode(Self::ROP_ID, r)?,
            save_flags: r.read_u8()?,
        })
    }
}

empty_payload!(SaveChangesAttachmentResponse, SaveChangesAttachment);

/// Async and batch bits do not apply to attachment tables; only Unicode does.
pub fn attachment_table_flags_valid(flags: u8) -> bool {
    flags & !GetAttachmentTableRequest::UNICODE == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResultCode;
    use crate::rop::RopResponse;

    #[test]
    fn test_open_attachment_layout() {
        let req = OpenAttachmentRequest {
            header: RopHeader::new(0, 1),
            output_handle_index: 2,
            open_mode_flags: attach_open_mode::READ_WRITE,
            attachment_id: 7,
        };
        let bytes = req.to_bytes().unwrap();
        assert_eq!(bytes.as_ref(), &[0x22, 0, 1, 2, 1, 7, 0, 0, 0]);
        assert_eq!(OpenAttachmentRequest::decode_at(&bytes, 0).unwrap().0, req);
    }

    #[test]
    fn test_create_attachment_response() {
        let resp = RopResponse::success(2, CreateAttachmentResponse { attachment_id: 3 });
        let bytes = resp.to_bytes().unwrap();
        assert_eq!(bytes.as_ref(), &[0x23, 2, 0, 0, 0, 0, 3, 0, 0, 0]);

        let failed: RopResponse<CreateAttachmentResponse> =
            RopResponse::failure(2, ResultCode::NotSupported);
        assert_eq!(failed.to_bytes().unwrap().len(), 6);
    }

    #[test]
    fn test_save_changes_attachment_layout() {
        let req = SaveChangesAttachmentRequest {
            header: SaveHeader {
                logon_id: 0,
                response_handle_index: 0,
                input_handle_index: 3,
            },
            save_flags: 0x0C,
        };
        let bytes = req.to_bytes().unwrap();
        assert_eq!(bytes.as_ref(), &[0x25, 0, 0, 3, 0x0C]);
        assert_eq!(SaveChangesAttachmentRequest::decode_at(&bytes, 0).unwrap().0, req);
    }

    #[test]
    fn test_attachment_table_flags() {
        assert!(attachment_table_flags_valid(0x00));
        assert!(attachment_table_flags_valid(GetAttachmentTableRequest::UNICODE));
        assert!(!attachment_table_flags_valid(0x01));
    }
}
