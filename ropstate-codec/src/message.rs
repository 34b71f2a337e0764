//! Message ROPs: open, create, save, recipients and status.

use crate::error::CodecError;
use crate::property::{decode_tag_list, encode_tag_list, tag_list_size, PropertyTag};
use crate::recipient::{ModifyRecipientRow, OpenRecipientRow, ReadRecipientRow};
use crate::rop::{empty_payload, RopHeader, RopId, RopPayload, RopRequest};
use crate::string::TypedString;
use crate::wire::{u16_len, u8_len, Decode, DecodeWith, Encode, EncodeWith, WireReader, WireWriter};
use serde::{Deserialize, Serialize};

/// OpenModeFlags for OpenMessage.
pub mod open_mode {
    pub const READ_ONLY: u8 = 0x00;
    pub const READ_WRITE: u8 = 0x01;
    pub const BEST_ACCESS: u8 = 0x03;
    pub const OPEN_SOFT_DELETED: u8 = 0x04;
}

/// SaveFlags shared by SaveChangesMessage and SaveChangesAttachment.
pub mod save_flags {
    pub const KEEP_OPEN_READ_ONLY: u8 = 0x01;
    pub const KEEP_OPEN_READ_WRITE: u8 = 0x02;
    pub const FORCE_SAVE: u8 = 0x04;
}

/// Request prefix for the save ROPs, which name a response handle ahead of
/// the input handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SaveHeader {
    pub logon_id: u8,
    pub response_handle_index: u8,
    pub input_handle_index: u8,
}

impl SaveHeader {
    pub const SIZE: usize = 4;

    pub(crate) fn encode(&self, rop_id: RopId, w: &mut WireWriter) {
        w.put_u8(rop_id as u8);
        w.put_u8(self.logon_id);
        w.put_u8(self.response_handle_index);
        w.put_u8(self.input_handle_index);
    }

    pub(crate) fn decode(rop_id: RopId, r: &mut WireReader<'_>) -> Result<Self, CodecError> {
        rop_id.expect(r)?;
        Ok(Self {
            logon_id: r.read_u8()?,
            response_handle_index: r.read_u8()?,
            input_handle_index: r.read_u8()?,
        })
    }
}

// ---------------------------------------------------------------------------
// OpenMessage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenMessageRequest {
    pub header: RopHeader,
    pub output_handle_index: u8,
    pub code_page_id: u16,
    pub folder_id: u64,
    pub open_mode_flags: u8,
    pub message_id: u64,
}

impl RopRequest for OpenMessageRequest {
    const ROP_ID: RopId = RopId::OpenMessage;
}

impl Encode for OpenMessageRequest {
    fn size(&self) -> usize {
        RopHeader::SIZE + 1 + 2 + 8 + 1 + 8
    }

    fn encode(&self, w: &mut WireWriter) -> Result<(), CodecError> {
        self.header.encode(Self::ROP_ID, w);
        w.put_u8(self.output_handle_index);
        w.put_u16(self.code_page_id);
        w.put_u64(self.folder_id);
        w.put_u8(self.open_mode_flags);
        w.put_u64(self.message_id);
        Ok(())
    }
}

impl Decode for OpenMessageRequest {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            header: RopHeader::decode(Self::ROP_ID, r)?,
            output_handle_index: r.read_u8()?,
            code_page_id: r.read_u16()?,
            folder_id: r.read_u64()?,
            open_mode_flags: r.read_u8()?,
            message_id: r.read_u64()?,
        })
    }
}

/// OpenMessage success payload.
///
/// `recipient_count` is the message's total recipient count; `rows` holds
/// only those that fit in the response. Rows are laid out against
/// `recipient_columns`, so no outside context is needed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenMessageResponse {
    pub has_named_properties: bool,
    pub subject_prefix: TypedString,
    pub normalized_subject: TypedString,
    pub recipient_count: u16,
    pub recipient_columns: Vec<PropertyTag>,
    pub rows: Vec<OpenRecipientRow>,
}

impl RopPayload for OpenMessageResponse {
    const ROP_ID: RopId = RopId::OpenMessage;
}

impl Encode for OpenMessageResponse {
    fn size(&self) -> usize {
        1 + self.subject_prefix.size()
            + self.normalized_subject.size()
            + 2
            + tag_list_size(&self.recipient_columns)
            + 1
            + self
                .rows
                .iter()
                .map(|row| row.size_with(self.recipient_columns.as_slice()))
                .sum::<usize>()
    }

    fn encode(&self, w: &mut WireWriter) -> Result<(), CodecError> {
        w.put_bool(self.has_named_properties);
        self.subject_prefix.encode(w)?;
        self.normalized_subject.encode(w)?;
        w.put_u16(self.recipient_count);
        encode_tag_list(w, "ColumnCount", &self.recipient_columns)?;
        w.put_u8(u8_len("RowCount", self.rows.len())?);
        for row in &self.rows {
            row.encode_with(w, self.recipient_columns.as_slice())?;
        }
        Ok(())
    }
}

impl Decode for OpenMessageResponse {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
        let has_named_properties = r.read_bool("HasNamedProperties")?;
        let subject_prefix = TypedString::decode(r)?;
        let normalized_subject = TypedString::decode(r)?;
        let recipient_count = r.read_u16()?;
        let recipient_columns = decode_tag_list(r)?;
        let row_count = r.read_u8()? as usize;
        let rows = (0..row_count)
            .map(|_| OpenRecipientRow::decode_with(r, recipient_columns.as_slice()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            has_named_properties,
            subject_prefix,
            normalized_subject,
            recipient_count,
            recipient_columns,
            rows,
        })
    }
}

// ---------------------------------------------------------------------------
// CreateMessage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateMessageRequest {
    pub header: RopHeader,
    pub output_handle_index: u8,
    pub code_page_id: u16,
    pub folder_id: u64,
    /// Create a folder-associated information message.
    pub associated: bool,
}

impl RopRequest for CreateMessageRequest {
    const ROP_ID: RopId = RopId::CreateMessage;
}

impl Encode for CreateMessageRequest {
    fn size(&self) -> usize {
        RopHeader::SIZE + 1 + 2 + 8 + 1
    }

    fn encode(&self, w: &mut WireWriter) -> Result<(), CodecError> {
        self.header.encode(Self::ROP_ID, w);
        w.put_u8(self.output_handle_index);
        w.put_u16(self.code_page_id);
        w.put_u64(self.folder_id);
        w.put_bool(self.associated);
        Ok(())
    }
}

impl Decode for CreateMessageRequest {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            header: RopHeader::decode(Self::ROP_ID, r)?,
            output_handle_index: r.read_u8()?,
            code_page_id: r.read_u16()?,
            folder_id: r.read_u64()?,
            associated: r.read_bool("AssociatedFlag")?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateMessageResponse {
    /// Present iff HasMessageId is non-zero.
    pub message_id: Option<u64>,
}

impl RopPayload for CreateMessageResponse {
    const ROP_ID: RopId = RopId::CreateMessage;
}

impl Encode for CreateMessageResponse {
    fn size(&self) -> usize {
        1 + if self.message_id.is_some() { 8 } else { 0 }
    }

    fn encode(&self, w: &mut WireWriter) -> Result<(), CodecError> {
        w.put_bool(self.message_id.is_some());
        if let Some(id) = self.message_id {
            w.put_u64(id);
        }
        Ok(())
    }
}

impl Decode for CreateMessageResponse {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
        let has_message_id = r.read_u8()? != 0;
        let message_id = if has_message_id {
            Some(r.read_u64()?)
        } else {
            None
        };
        Ok(Self { message_id })
    }
}

// ---------------------------------------------------------------------------
// SaveChangesMessage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveChangesMessageRequest {
    pub header: SaveHeader,
    pub save_flags: u8,
}

impl RopRequest for SaveChangesMessageRequest {
    const ROP_ID: RopId = RopId::SaveChangesMessage;
}

impl Encode for SaveChangesMessageRequest {
    fn size(&self) -> usize {
        SaveHeader::SIZE + 1
    }

    fn encode(&self, w: &mut WireWriter) -> Result<(), CodecError> {
        self.header.encode(Self::ROP_ID, w);
        w.put_u8(self.save_flags);
        Ok(())
    }
}

impl Decode for SaveChangesMessageRequest {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            header: SaveHeader::decode(Self::ROP_ID, r)?,
            save_flags: r.read_u8()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveChangesMessageResponse {
    pub input_handle_index: u8,
    pub message_id: u64,
}

impl RopPayload for SaveChangesMessageResponse {
    const ROP_ID: RopId = RopId::SaveChangesMessage;
}

impl Encode for SaveChangesMessageResponse {
    fn size(&self) -> usize {
        9
    }

    fn encode(&self, w: &mut WireWriter) -> Result<(), CodecError> {
        w.put_u8(self.input_handle_index);
        w.put_u64(self.message_id);
        Ok(())
    }
}

impl Decode for SaveChangesMessageResponse {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            input_handle_index: r.read_u8()?,
            message_id: r.read_u64()?,
        })
    }
}

// ---------------------------------------------------------------------------
// Recipients
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveAllRecipientsRequest {
    pub header: RopHeader,
    pub reserved: u32,
}

impl RopRequest for RemoveAllRecipientsRequest {
    const ROP_ID: RopId = RopId::RemoveAllRecipients;
}

impl Encode for RemoveAllRecipientsRequest {
    fn size(&self) -> usize {
        RopHeader::SIZE + 4
    }

    fn encode(&self, w: &mut WireWriter) -> Result<(), CodecError> {
        self.header.encode(Self::ROP_ID, w);
        w.put_u32(self.reserved);
        Ok(())
    }
}

impl Decode for RemoveAllRecipientsRequest {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            header: RopHeader::decode(Self::ROP_ID, r)?,
            reserved: r.read_u32()?,
        })
    }
}

empty_payload!(RemoveAllRecipientsResponse, RemoveAllRecipients);

/// ModifyRecipients. Each row's properties are laid out against `columns`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifyRecipientsRequest {
    pub header: RopHeader,
    pub columns: Vec<PropertyTag>,
    pub rows: Vec<ModifyRecipientRow>,
}

impl RopRequest for ModifyRecipientsRequest {
    const ROP_ID: RopId = RopId::ModifyRecipients;
}

impl Encode for ModifyRecipientsRequest {
    fn size(&self) -> usize {
        RopHeader::SIZE
            + tag_list_size(&self.columns)
            + 2
            + self
                .rows
                .iter()
                .map(|row| row.size_with(self.columns.as_slice()))
                .sum::<usize>()
    }

    fn encode(&self, w: &mut WireWriter) -> Result<(), CodecError> {
        self.header.encode(Self::ROP_ID, w);
        encode_tag_list(w, "ColumnCount", &self.columns)?;
        w.put_u16(u16_len("RowCount", self.rows.len())?);
        for row in &self.rows {
            row.encode_with(w, self.columns.as_slice())?;
        }
        Ok(())
    }
}

impl Decode for ModifyRecipientsRequest {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
        let header = RopHeader::decode(Self::ROP_ID, r)?;
        let columns = decode_tag_list(r)?;
        let row_count = r.read_u16()? as usize;
        let rows = (0..row_count)
            .map(|_| ModifyRecipientRow::decode_with(r, columns.as_slice()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            header,
            columns,
            rows,
        })
    }
}

empty_payload!(ModifyRecipientsResponse, ModifyRecipients);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadRecipientsRequest {
    pub header: RopHeader,
    /// First recipient row to return.
    pub row_id: u32,
    pub reserved: u16,
}

impl RopRequest for ReadRecipientsRequest {
    const ROP_ID: RopId = RopId::ReadRecipients;
}

impl Encode for ReadRecipientsRequest {
    fn size(&self) -> usize {
        RopHeader::SIZE + 6
    }

    fn encode(&self, w: &mut WireWriter) -> Result<(), CodecError> {
        self.header.encode(Self::ROP_ID, w);
        w.put_u32(self.row_id);
        w.put_u16(self.reserved);
        Ok(())
    }
}

impl Decode for ReadRecipientsRequest {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            header: RopHeader::decode(Self::ROP_ID, r)?,
            row_id: r.read_u32()?,
            reserved: r.read_u16()?,
        })
    }
}

/// ReadRecipients success payload. The response carries no column list,
/// so encoding and decoding need the recipient columns of the message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadRecipientsResponse {
    pub rows: Vec<ReadRecipientRow>,
}

impl RopPayload for ReadRecipientsResponse {
    const ROP_ID: RopId = RopId::ReadRecipients;
}

impl EncodeWith<[PropertyTag]> for ReadRecipientsResponse {
    fn size_with(&self, columns: &[PropertyTag]) -> usize {
        1 + self.rows.iter().map(|row| row.size_with(columns)).sum::<usize>()
    }

    fn encode_with(&self, w: &mut WireWriter, columns: &[PropertyTag]) -> Result<(), CodecError> {
        w.put_u8(u8_len("RowCount", self.rows.len())?);
        for row in &self.rows {
            row.encode_with(w, columns)?;
        }
        Ok(())
    }
}

impl DecodeWith<[PropertyTag]> for ReadRecipientsResponse {
    fn decode_with(r: &mut WireReader<'_>, columns: &[PropertyTag]) -> Result<Self, CodecError> {
        let row_count = r.read_u8()? as usize;
        let rows = (0..row_count)
            .map(|_| ReadRecipientRow::decode_with(r, columns))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rows })
    }
}

// ---------------------------------------------------------------------------
// Message status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetMessageStatusRequest {
    pub header: RopHeader,
    pub message_id: u64,
}

impl RopRequest for GetMessageStatusRequest {
    const ROP_ID: RopId = RopId::GetMessageStatus;
}

impl Encode for GetMessageStatusRequest {
    fn size(&self) -> usize {
        RopHeader::SIZE + 8
    }

    fn encode(&self, w: &mut WireWriter) -> Result<(), CodecError> {
        self.header.encode(Self::ROP_ID, w);
        w.put_u64(self.message_id);
        Ok(())
    }
}

impl Decode for GetMessageStatusRequest {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            header: RopHeader::decode(Self::ROP_ID, r)?,
            message_id: r.read_u64()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetMessageStatusRequest {
    pub header: RopHeader,
    pub message_id: u64,
    pub message_status_flags: u32,
    pub message_status_mask: u32,
}

impl RopRequest for SetMessageStatusRequest {
    const ROP_ID: RopId = RopId::SetMessageStatus;
}

impl Encode for SetMessageStatusRequest {
    fn size(&self) -> usize {
        RopHeader::SIZE + 16
    }

    fn encode(&self, w: &mut WireWriter) -> Result<(), CodecError> {
        self.header.encode(Self::ROP_ID, w);
        w.put_u64(self.message_id);
        w.put_u32(self.message_status_flags);
        w.put_u32(self.message_status_mask);
        Ok(())
    }
}

impl Decode for SetMessageStatusRequest {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            header: RopHeader::decode(Self::ROP_ID, r)?,
            message_id: r.read_u64()?,
            message_status_flags: r.read_u32()?,
            message_status_mask: r.read_u32()?,
        })
    }
}

/// Shared by GetMessageStatus and SetMessageStatus (the latter reports the
/// flags as they were before the change).
macro_rules! status_flags_payload {
    ($name:ident, $rop:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub struct $name {
            pub message_status_flags: u32,
        }

        impl RopPayload for $name {
            const ROP_ID: RopId = RopId::$rop;
        }

        impl Encode for $name {
            fn size(&self) -> usize {
                4
            }

            fn encode(&self, w: &mut WireWriter) -> Result<(), CodecError> {
                w.put_u32(self.message_status_flags);
                Ok(())
            }
        }

        impl Decode for $name {
            fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
                Ok(Self {
                    message_status_flags: r.read_u32()?,
                })
            }
        }
    };
}

status_flags_payload!(GetMessageStatusResponse, GetMessageStatus);
status_flags_payload!(SetMessageStatusResponse, SetMessageStatus);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::{tags, PropertyRow, PropertyValue};
    use crate::recipient::{recipient_type, RecipientAddress, RecipientRow};
    use crate::rop::RopResponse;

    fn smtp_row(name: &str) -> RecipientRow {
        RecipientRow {
            address: RecipientAddress::Smtp,
            options: Default::default(),
            unicode: true,
            email_address: Some(format!("{}@example.com", name)),
            display_name: Some(name.to_string()),
            simple_display_name: None,
            transmittable_display_name: None,
            properties: PropertyRow::Standard(vec![PropertyValue::Integer32(1)]),
        }
    }

    #[test]
    fn test_open_message_request_layout() {
        let req = OpenMessageRequest {
            header: RopHeader::new(0, 0),
            output_handle_index: 1,
            code_page_id: 0x0FFF,
            folder_id: 0x0102_0304_0506_0708,
            open_mode_flags: open_mode::READ_WRITE,
            message_id: 9,
        };
        let bytes = req.to_bytes().unwrap();
        assert_eq!(bytes.len(), 24);
        assert_eq!(&bytes[..6], &[0x03, 0, 0, 1, 0xFF, 0x0F]);
        assert_eq!(bytes[14], open_mode::READ_WRITE);
        let (decoded, consumed) = OpenMessageRequest::decode_at(&bytes, 0).unwrap();
        assert_eq!(decoded, req);
        assert_eq!(consumed, 24);
    }

    #[test]
    fn test_open_message_response_with_recipients() {
        let payload = OpenMessageResponse {
            has_named_properties: true,
            subject_prefix: TypedString::Empty,
            normalized_subject: TypedString::Unicode("hello".into()),
            recipient_count: 1,
            recipient_columns: vec![tags::MESSAGE_SIZE],
            rows: vec![OpenRecipientRow {
                recipient_type: recipient_type::TO,
                code_page_id: 0x0FFF,
                reserved: 0,
                recipient_row: smtp_row("ann"),
            }],
        };
        let resp = RopResponse::success(1, payload);
        let bytes = resp.to_bytes().unwrap();
        assert_eq!(bytes.len(), resp.size());
        let (decoded, consumed) = RopResponse::<OpenMessageResponse>::decode_at(&bytes, 0).unwrap();
        assert_eq!(decoded, resp);
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn test_create_message_has_message_id_gate() {
        let without = CreateMessageResponse { message_id: None };
        assert_eq!(without.to_bytes().unwrap().as_ref(), &[0]);

        let with = CreateMessageResponse {
            message_id: Some(0x11),
        };
        let bytes = with.to_bytes().unwrap();
        assert_eq!(bytes.as_ref(), &[1, 0x11, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(CreateMessageResponse::decode_at(&bytes, 0).unwrap().0, with);
    }

    #[test]
    fn test_save_changes_header_order() {
        let req = SaveChangesMessageRequest {
            header: SaveHeader {
                logon_id: 0,
                response_handle_index: 2,
                input_handle_index: 1,
            },
            save_flags: save_flags::KEEP_OPEN_READ_WRITE,
        };
        assert_eq!(req.to_bytes().unwrap().as_ref(), &[0x0C, 0, 2, 1, 0x02]);
    }

    #[test]
    fn test_modify_recipients_roundtrip_with_deletion() {
        let req = ModifyRecipientsRequest {
            header: RopHeader::new(0, 1),
            columns: vec![tags::MESSAGE_SIZE],
            rows: vec![
                ModifyRecipientRow {
                    row_id: 0,
                    recipient_type: recipient_type::CC,
                    recipient_row: Some(smtp_row("bob")),
                },
                ModifyRecipientRow {
                    row_id: 1,
                    recipient_type: recipient_type::TO,
                    recipient_row: None,
                },
            ],
        };
        let bytes = req.to_bytes().unwrap();
        assert_eq!(bytes.len(), req.size());
        let (decoded, consumed) = ModifyRecipientsRequest::decode_at(&bytes, 0).unwrap();
        assert_eq!(decoded, req);
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn test_read_recipients_response_needs_columns() {
        let columns = vec![tags::MESSAGE_SIZE];
        let resp = RopResponse::success(
            1,
            ReadRecipientsResponse {
                rows: vec![ReadRecipientRow {
                    row_id: 0,
                    recipient_type: recipient_type::BCC,
                    code_page_id: 0x0FFF,
                    reserved: 0,
                    recipient_row: smtp_row("cy"),
                }],
            },
        );
        let bytes = resp.to_bytes_with(columns.as_slice()).unwrap();
        assert_eq!(bytes[6], 1);
        let (decoded, _) =
            RopResponse::<ReadRecipientsResponse>::decode_at_with(&bytes, 0, columns.as_slice())
                .unwrap();
        assert_eq!(decoded, resp);
    }

    #[test]
    fn test_message_status_layouts() {
        let req = SetMessageStatusRequest {
            header: RopHeader::new(0, 1),
            message_id: 2,
            message_status_flags: 0x1000,
            message_status_mask: 0x1000,
        };
        let bytes = req.to_bytes().unwrap();
        assert_eq!(bytes.len(), req.size());
        assert_eq!(SetMessageStatusRequest::decode_at(&bytes, 0).unwrap().0, req);

        let resp = RopResponse::success(
            1,
            GetMessageStatusResponse {
                message_status_flags: 0x1000,
            },
        );
        assert_eq!(
            resp.to_bytes().unwrap().as_ref(),
            &[0x1F, 1, 0, 0, 0, 0, 0x00, 0x10, 0, 0]
        );
    }
}
