//! Recipient rows and the size-prefixed wrappers used by message ROPs.
//!
//! A recipient row starts with a 16-bit flags word that decides which
//! optional fields follow:
//!
//! ```text
//! +-------+------------------------+---------+---------+------+-------+-------+-----------+
//! | flags | address-type fields    | email   | display | simp | trans | count | property  |
//! | 2     | X500DN / PDL / O type  | E flag  | D flag  | I    | T     | 2     | row       |
//! +-------+------------------------+---------+---------+------+-------+-------+-----------+
//! ```
//!
//! The typed [`RecipientRow`] derives the flags from its fields, so an
//! inconsistent flags word cannot be built.

use crate::error::CodecError;
use crate::property::{PropertyRow, PropertyTag};
use crate::wire::{
    narrow_size, u16_len, wide_size, DecodeWith, EncodeWith, WireReader, WireWriter,
};
use serde::{Deserialize, Serialize};

/// RecipientFlags bitfield.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecipientFlags(u16);

impl RecipientFlags {
    pub const R: u16 = 0x0080;
    /// Recipient accepts rich content.
    pub const S: u16 = 0x0040;
    /// TransmittableDisplayName is present.
    pub const T: u16 = 0x0020;
    /// DisplayName is present.
    pub const D: u16 = 0x0010;
    /// EmailAddress is present.
    pub const E: u16 = 0x0008;
    pub const TYPE_MASK: u16 = 0x0007;
    /// AddressType string is present (NoType only).
    pub const O: u16 = 0x8000;
    pub const RESERVED: u16 = 0x7800;
    /// SimpleDisplayName is present.
    pub const I: u16 = 0x0400;
    /// Strings are UTF-16LE.
    pub const U: u16 = 0x0200;
    pub const N: u16 = 0x0100;

    /// Bits that carry meaning but gate no fields.
    pub const OPTION_MASK: u16 = Self::R | Self::S | Self::N;

    pub fn new() -> Self {
        Self(0)
    }

    pub fn bits(&self) -> u16 {
        self.0
    }

    pub fn from_bits(bits: u16) -> Result<Self, CodecError> {
        if bits & Self::RESERVED != 0 {
            return Err(CodecError::InvalidFlags {
                field: "RecipientFlags",
                bits: bits as u32,
            });
        }
        Ok(Self(bits))
    }

    /// Keeps only the option bits of `bits`.
    pub fn options(bits: u16) -> Self {
        Self(bits & Self::OPTION_MASK)
    }

    pub fn with(mut self, bit: u16) -> Self {
        self.0 |= bit;
        self
    }

    pub fn has(&self, bit: u16) -> bool {
        self.0 & bit != 0
    }

    pub fn address_type_code(&self) -> u8 {
        (self.0 & Self::TYPE_MASK) as u8
    }
}

/// Address type carried in the low three flag bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressType {
    NoType = 0,
    X500Dn = 1,
    MsMail = 2,
    Smtp = 3,
    Fax = 4,
    ProfessionalOfficeSystem = 5,
    PersonalDistributionList1 = 6,
    PersonalDistributionList2 = 7,
}

impl AddressType {
    pub fn from_code(code: u8) -> Self {
        match code & 0x07 {
            0 => AddressType::NoType,
            1 => AddressType::X500Dn,
            2 => AddressType::MsMail,
            3 => AddressType::Smtp,
            4 => AddressType::Fax,
            5 => AddressType::ProfessionalOfficeSystem,
            6 => AddressType::PersonalDistributionList1,
            _ => AddressType::PersonalDistributionList2,
        }
    }
}

/// Address-type dependent fields of a recipient row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipientAddress {
    NoType {
        /// Present iff the O flag is set.
        address_type: Option<String>,
    },
    X500Dn {
        address_prefix_used: u8,
        display_type: u8,
        x500_dn: String,
    },
    MsMail,
    Smtp,
    Fax,
    ProfessionalOfficeSystem,
    PersonalDistributionList1 {
        entry_id: Vec<u8>,
        search_key: Vec<u8>,
    },
    PersonalDistributionList2 {
        entry_id: Vec<u8>,
        search_key: Vec<u8>,
    },
}

impl RecipientAddress {
    pub fn address_type(&self) -> AddressType {
        match self {
            RecipientAddress::NoType { .. } => AddressType::NoType,
            RecipientAddress::X500Dn { .. } => AddressType::X500Dn,
            RecipientAddress::MsMail => AddressType::MsMail,
            RecipientAddress::Smtp => AddressType::Smtp,
            RecipientAddress::Fax => AddressType::Fax,
            RecipientAddress::ProfessionalOfficeSystem => AddressType::ProfessionalOfficeSystem,
            RecipientAddress::PersonalDistributionList1 { .. } => {
                AddressType::PersonalDistributionList1
            }
            RecipientAddress::PersonalDistributionList2 { .. } => {
                AddressType::PersonalDistributionList2
            }
        }
    }

    fn size(&self) -> usize {
        match self {
            RecipientAddress::NoType { address_type } => {
                address_type.as_deref().map(narrow_size).unwrap_or(0)
            }
            RecipientAddress::X500Dn { x500_dn, .. } => 2 + narrow_size(x500_dn),
            RecipientAddress::PersonalDistributionList1 {
                entry_id,
                search_key,
            }
            | RecipientAddress::PersonalDistributionList2 {
                entry_id,
                search_key,
            } => 4 + entry_id.len() + search_key.len(),
            _ => 0,
        }
    }

    fn encode(&self, w: &mut WireWriter) -> Result<(), CodecError> {
        match self {
            RecipientAddress::NoType {
                address_type: Some(s),
            } => w.put_narrow_string(s)?,
            RecipientAddress::X500Dn {
                address_prefix_used,
                display_type,
                x500_dn,
            } => {
                w.put_u8(*address_prefix_used);
                w.put_u8(*display_type);
                w.put_narrow_string(x500_dn)?;
            }
            RecipientAddress::PersonalDistributionList1 {
                entry_id,
                search_key,
            }
            | RecipientAddress::PersonalDistributionList2 {
                entry_id,
                search_key,
            } => {
                w.put_sized_bytes("EntryId", entry_id)?;
                w.put_sized_bytes("SearchKey", search_key)?;
            }
            _ => {}
        }
        Ok(())
    }

    fn decode(flags: RecipientFlags, r: &mut WireReader<'_>) -> Result<Self, CodecError> {
        let address_type = AddressType::from_code(flags.address_type_code());
        if flags.has(RecipientFlags::O) && address_type != AddressType::NoType {
            return Err(CodecError::InvalidFlags {
                field: "RecipientFlags",
                bits: flags.bits() as u32,
            });
        }
        Ok(match address_type {
            AddressType::NoType => RecipientAddress::NoType {
                address_type: if flags.has(RecipientFlags::O) {
                    Some(r.read_narrow_string()?)
                } else {
                    None
                },
            },
            AddressType::X500Dn => RecipientAddress::X500Dn {
                address_prefix_used: r.read_u8()?,
                display_type: r.read_u8()?,
                x500_dn: r.read_narrow_string()?,
            },
            AddressType::MsMail => RecipientAddress::MsMail,
            AddressType::Smtp => RecipientAddress::Smtp,
            AddressType::Fax => RecipientAddress::Fax,
            AddressType::ProfessionalOfficeSystem => RecipientAddress::ProfessionalOfficeSystem,
            AddressType::PersonalDistributionList1 => {
                RecipientAddress::PersonalDistributionList1 {
                    entry_id: r.read_sized_bytes()?,
                    search_key: r.read_sized_bytes()?,
                }
            }
            AddressType::PersonalDistributionList2 => {
                RecipientAddress::PersonalDistributionList2 {
                    entry_id: r.read_sized_bytes()?,
                    search_key: r.read_sized_bytes()?,
                }
            }
        })
    }
}

/// A recipient row. Properties are laid out against the first
/// `properties.len()` recipient columns of the enclosing ROP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipientRow {
    pub address: RecipientAddress,
    /// R, S and N bits. Layout bits are derived from the other fields.
    pub options: RecipientFlags,
    /// Strings below are UTF-16LE when set, 8-bit otherwise.
    pub unicode: bool,
    pub email_address: Option<String>,
    pub display_name: Option<String>,
    pub simple_display_name: Option<String>,
    pub transmittable_display_name: Option<String>,
    pub properties: PropertyRow,
}

impl RecipientRow {
    /// Computes the flags word this row encodes with.
    pub fn flags(&self) -> RecipientFlags {
        let mut flags = RecipientFlags::options(self.options.bits())
            .with(self.address.address_type() as u16);
        if matches!(
            self.address,
            RecipientAddress::NoType {
                address_type: Some(_)
            }
        ) {
            flags = flags.with(RecipientFlags::O);
        }
        if self.unicode {
            flags = flags.with(RecipientFlags::U);
        }
        if self.email_address.is_some() {
            flags = flags.with(RecipientFlags::E);
        }
        if self.display_name.is_some() {
            flags = flags.with(RecipientFlags::D);
        }
        if self.simple_display_name.is_some() {
            flags = flags.with(RecipientFlags::I);
        }
        if self.transmittable_display_name.is_some() {
            flags = flags.with(RecipientFlags::T);
        }
        flags
    }

    fn strings(&self) -> [&Option<String>; 4] {
        [
            &self.email_address,
            &self.display_name,
            &self.simple_display_name,
            &self.transmittable_display_name,
        ]
    }

    fn columns<'c>(&self, columns: &'c [PropertyTag]) -> Result<&'c [PropertyTag], CodecError> {
        columns
            .get(..self.properties.len())
            .ok_or(CodecError::ColumnCountMismatch {
                columns: columns.len(),
                values: self.properties.len(),
            })
    }
}

impl EncodeWith<[PropertyTag]> for RecipientRow {
    fn size_with(&self, columns: &[PropertyTag]) -> usize {
        let string_size = |s: &str| {
            if self.unicode {
                wide_size(s)
            } else {
                narrow_size(s)
            }
        };
        let strings: usize = self
            .strings()
            .iter()
            .filter_map(|s| s.as_deref())
            .map(string_size)
            .sum();
        let used = &columns[..self.properties.len().min(columns.len())];
        2 + self.address.size() + strings + 2 + self.properties.size_with(used)
    }

    fn encode_with(&self, w: &mut WireWriter, columns: &[PropertyTag]) -> Result<(), CodecError> {
        let used = self.columns(columns)?;
        w.put_u16(self.flags().bits());
        self.address.encode(w)?;
        for s in self.strings().iter().filter_map(|s| s.as_deref()) {
            if self.unicode {
                w.put_wide_string(s)?;
            } else {
                w.put_narrow_string(s)?;
            }
        }
        w.put_u16(u16_len("RecipientColumnCount", used.len())?);
        self.properties.encode_with(w, used)
    }
}

impl DecodeWith<[PropertyTag]> for RecipientRow {
    fn decode_with(r: &mut WireReader<'_>, columns: &[PropertyTag]) -> Result<Self, CodecError> {
        let flags = RecipientFlags::from_bits(r.read_u16()?)?;
        let address = RecipientAddress::decode(flags, r)?;
        let unicode = flags.has(RecipientFlags::U);
        let mut read_if = |bit: u16| -> Result<Option<String>, CodecError> {
            if !flags.has(bit) {
                return Ok(None);
            }
            if unicode {
                r.read_wide_string().map(Some)
            } else {
                r.read_narrow_string().map(Some)
            }
        };
        let email_address = read_if(RecipientFlags::E)?;
        let display_name = read_if(RecipientFlags::D)?;
        let simple_display_name = read_if(RecipientFlags::I)?;
        let transmittable_display_name = read_if(RecipientFlags::T)?;

        let count = r.read_u16()? as usize;
        let used = columns
            .get(..count)
            .ok_or(CodecError::ColumnCountMismatch {
                columns: columns.len(),
                values: count,
            })?;
        let properties = PropertyRow::decode_with(r, used)?;

        Ok(Self {
            address,
            options: RecipientFlags::options(flags.bits()),
            unicode,
            email_address,
            display_name,
            simple_display_name,
            transmittable_display_name,
            properties,
        })
    }
}

/// Recipient type byte: To, Cc or Bcc in the low bits, plus flag bits.
pub mod recipient_type {
    pub const TO: u8 = 0x01;
    pub const CC: u8 = 0x02;
    pub const BCC: u8 = 0x03;
}

fn sized_row_size(row: &RecipientRow, columns: &[PropertyTag]) -> usize {
    2 + row.size_with(columns)
}

fn encode_sized_row(
    w: &mut WireWriter,
    row: &RecipientRow,
    columns: &[PropertyTag],
) -> Result<(), CodecError> {
    let size = u16_len("RecipientRowSize", row.size_with(columns))?;
    w.put_u16(size);
    let start = w.len();
    row.encode_with(w, columns)?;
    let actual = w.len() - start;
    if actual != size as usize {
        return Err(CodecError::LengthMismatch {
            field: "RecipientRowSize",
            declared: size as usize,
            actual,
        });
    }
    Ok(())
}

/// Decodes a row of exactly `size` bytes.
fn decode_row_of_size(
    r: &mut WireReader<'_>,
    size: usize,
    columns: &[PropertyTag],
) -> Result<RecipientRow, CodecError> {
    let bytes = r.take(size)?;
    let mut inner = WireReader::new(bytes);
    let row = RecipientRow::decode_with(&mut inner, columns)?;
    if !inner.is_empty() {
        return Err(CodecError::LengthMismatch {
            field: "RecipientRowSize",
            declared: size,
            actual: inner.position(),
        });
    }
    Ok(row)
}

/// One entry of a ModifyRecipients request. A missing row deletes the
/// recipient identified by `row_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifyRecipientRow {
    pub row_id: u32,
    pub recipient_type: u8,
    pub recipient_row: Option<RecipientRow>,
}

impl EncodeWith<[PropertyTag]> for ModifyRecipientRow {
    fn size_with(&self, columns: &[PropertyTag]) -> usize {
        5 + self
            .recipient_row
            .as_ref()
            .map(|row| sized_row_size(row, columns))
            .unwrap_or(2)
    }

    fn encode_with(&self, w: &mut WireWriter, columns: &[PropertyTag]) -> Result<(), CodecError> {
        w.put_u32(self.row_id);
        w.put_u8(self.recipient_type);
        match &self.recipient_row {
            Some(row) => encode_sized_row(w, row, columns),
            None => {
                w.put_u16(0);
                Ok(())
            }
        }
    }
}

impl DecodeWith<[PropertyTag]> for ModifyRecipientRow {
    fn decode_with(r: &mut WireReader<'_>, columns: &[PropertyTag]) -> Result<Self, CodecError> {
        let row_id = r.read_u32()?;
        let recipient_type = r.read_u8()?;
        let size = r.read_u16()? as usize;
        let recipient_row = if size == 0 {
            None
        } else {
            Some(decode_row_of_size(r, size, columns)?)
        };
        Ok(Self {
            row_id,
            recipient_type,
            recipient_row,
        })
    }
}

/// One entry of a ReadRecipients response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadRecipientRow {
    pub row_id: u32,
    pub recipient_type: u8,
    pub code_page_id: u16,
    pub reserved: u16,
    pub recipient_row: RecipientRow,
}

impl EncodeWith<[PropertyTag]> for ReadRecipientRow {
    fn size_with(&self, columns: &[PropertyTag]) -> usize {
        9 + sized_row_size(&self.recipient_row, columns)
    }

    fn encode_with(&self, w: &mut WireWriter, columns: &[PropertyTag]) -> Result<(), CodecError> {
        w.put_u32(self.row_id);
        w.put_u8(self.recipient_type);
        w.put_u16(self.code_page_id);
        w.put_u16(self.reserved);
        encode_sized_row(w, &self.recipient_row, columns)
    }
}

impl DecodeWith<[PropertyTag]> for ReadRecipientRow {
    fn decode_with(r: &mut WireReader<'_>, columns: &[PropertyTag]) -> Result<Self, CodecError> {
        let row_id = r.read_u32()?;
        let recipient_type = r.read_u8()?;
        let code_page_id = r.read_u16()?;
        let reserved = r.read_u16()?;
        let size = r.read_u16()? as usize;
        let recipient_row = decode_row_of_size(r, size, columns)?;
        Ok(Self {
            row_id,
            recipient_type,
            code_page_id,
            reserved,
            recipient_row,
        })
    }
}

/// One entry of an OpenMessage response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenRecipientRow {
    pub recipient_type: u8,
    pub code_page_id: u16,
    pub reserved: u16,
    pub recipient_row: RecipientRow,
}

impl EncodeWith<[PropertyTag]> for OpenRecipientRow {
    fn size_with(&self, columns: &[PropertyTag]) -> usize {
        5 + sized_row_size(&self.recipient_row, columns)
    }

    fn encode_with(&self, w: &mut WireWriter, columns: &[PropertyTag]) -> Result<(), CodecError> {
        w.put_u8(self.recipient_type);
        w.put_u16(self.code_page_id);
        w.put_u16(self.reserved);
        encode_sized_row(w, &self.recipient_row, columns)
    }
}

impl DecodeWith<[PropertyTag]> for OpenRecipientRow {
    fn decode_with(r: &mut WireReader<'_>, columns: &[PropertyTag]) -> Result<Self, CodecError> {
        let recipient_type = r.read_u8()?;
        let code_page_id = r.read_u16()?;
        let reserved = r.read_u16()?;
        let size = r.read_u16()? as usize;
        let recipient_row = decode_row_of_size(r, size, columns)?;
        Ok(Self {
            recipient_type,
            code_page_id,
            reserved,
            recipient_row,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::{tags, PropertyType, PropertyValue};
    use proptest::prelude::*;

    fn recipient_columns() -> Vec<PropertyTag> {
        vec![
            tags::DISPLAY_NAME,
            PropertyTag::new(0x0C15, PropertyType::Integer32),
        ]
    }

    fn smtp_row() -> RecipientRow {
        RecipientRow {
            address: RecipientAddress::Smtp,
            options: RecipientFlags::new().with(RecipientFlags::S),
            unicode: true,
            email_address: Some("a@example.com".into()),
            display_name: Some("Alice".into()),
            simple_display_name: Some("Alice".into()),
            transmittable_display_name: None,
            properties: PropertyRow::Standard(vec![PropertyValue::Unicode("Alice".into())]),
        }
    }

    #[test]
    fn test_flags_derived_from_fields() {
        let row = smtp_row();
        let flags = row.flags();
        assert_eq!(flags.address_type_code(), AddressType::Smtp as u8);
        assert!(flags.has(RecipientFlags::E));
        assert!(flags.has(RecipientFlags::D));
        assert!(flags.has(RecipientFlags::I));
        assert!(flags.has(RecipientFlags::U));
        assert!(flags.has(RecipientFlags::S));
        assert!(!flags.has(RecipientFlags::T));
        assert!(!flags.has(RecipientFlags::O));
        assert_eq!(flags.bits(), 0x065B);
    }

    #[test]
    fn test_x500_row_reads_only_x500_fields() {
        // X500DN type, no display name, no email, 8-bit strings.
        let mut buf = vec![0x01, 0x00, 0x03, 0x00];
        buf.extend_from_slice(b"/o=org/cn=bob\0");
        buf.extend_from_slice(&[0x00, 0x00]); // RecipientColumnCount
        buf.push(0x00); // empty standard row
        let cols = recipient_columns();

        let (row, consumed) = RecipientRow::decode_at_with(&buf, 0, cols.as_slice()).unwrap();
        assert_eq!(consumed, buf.len());
        assert_eq!(
            row.address,
            RecipientAddress::X500Dn {
                address_prefix_used: 3,
                display_type: 0,
                x500_dn: "/o=org/cn=bob".into(),
            }
        );
        assert!(!row.unicode);
        assert_eq!(row.email_address, None);
        assert_eq!(row.display_name, None);
        assert_eq!(row.simple_display_name, None);
        assert_eq!(row.transmittable_display_name, None);
        assert!(row.properties.is_empty());
    }

    #[test]
    fn test_no_type_with_address_type() {
        let row = RecipientRow {
            address: RecipientAddress::NoType {
                address_type: Some("EX".into()),
            },
            options: RecipientFlags::new(),
            unicode: false,
            email_address: None,
            display_name: Some("Bob".into()),
            simple_display_name: None,
            transmittable_display_name: None,
            properties: PropertyRow::Standard(vec![]),
        };
        let cols = recipient_columns();
        let bytes = row.to_bytes_with(cols.as_slice()).unwrap();
        assert_eq!(&bytes[..2], &[0x10, 0x80]);
        assert_eq!(&bytes[2..5], b"EX\0");
        let (decoded, _) = RecipientRow::decode_at_with(&bytes, 0, cols.as_slice()).unwrap();
        assert_eq!(decoded, row);
    }

    #[test]
    fn test_o_flag_with_typed_address_rejected() {
        let buf = [0x03, 0x80, 0x00, 0x00, 0x00];
        let cols = recipient_columns();
        assert!(matches!(
            RecipientRow::decode_at_with(&buf, 0, cols.as_slice()),
            Err(CodecError::InvalidFlags { .. })
        ));
    }

    #[test]
    fn test_reserved_bits_rejected() {
        let buf = [0x00, 0x08, 0x00, 0x00, 0x00];
        let cols = recipient_columns();
        assert!(matches!(
            RecipientRow::decode_at_with(&buf, 0, cols.as_slice()),
            Err(CodecError::InvalidFlags { .. })
        ));
    }

    #[test]
    fn test_pdl_entry_id_underrun() {
        // PDL1 with EntryIdSize 8 but only 2 bytes available.
        let buf = [0x06, 0x00, 0x08, 0x00, 0xAA, 0xBB];
        let cols = recipient_columns();
        assert!(matches!(
            RecipientRow::decode_at_with(&buf, 0, cols.as_slice()),
            Err(CodecError::Underrun { .. })
        ));
    }

    #[test]
    fn test_column_count_beyond_columns() {
        let buf = [0x02, 0x00, 0x05, 0x00, 0x00];
        let cols = recipient_columns();
        assert!(matches!(
            RecipientRow::decode_at_with(&buf, 0, cols.as_slice()),
            Err(CodecError::ColumnCountMismatch { values: 5, .. })
        ));
    }

    #[test]
    fn test_modify_row_deletion_has_no_row() {
        let entry = ModifyRecipientRow {
            row_id: 4,
            recipient_type: recipient_type::CC,
            recipient_row: None,
        };
        let cols = recipient_columns();
        let bytes = entry.to_bytes_with(cols.as_slice()).unwrap();
        assert_eq!(bytes.as_ref(), &[4, 0, 0, 0, 2, 0, 0]);
        assert_eq!(bytes.len(), entry.size_with(cols.as_slice()));
        let (decoded, _) = ModifyRecipientRow::decode_at_with(&bytes, 0, cols.as_slice()).unwrap();
        assert_eq!(decoded, entry);
    }

    #[test]
    fn test_read_row_size_mismatch_is_framing_error() {
        let cols = recipient_columns();
        let entry = ReadRecipientRow {
            row_id: 1,
            recipient_type: recipient_type::TO,
            code_page_id: 0x04E4,
            reserved: 0,
            recipient_row: smtp_row(),
        };
        let mut bytes = entry.to_bytes_with(cols.as_slice()).unwrap().to_vec();
        // Inflate RecipientRowSize by one and append a stray byte.
        let size = u16::from_le_bytes([bytes[9], bytes[10]]) + 1;
        bytes[9..11].copy_from_slice(&size.to_le_bytes());
        bytes.push(0xEE);
        assert!(matches!(
            ReadRecipientRow::decode_at_with(&bytes, 0, cols.as_slice()),
            Err(CodecError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_open_recipient_row_roundtrip() {
        let cols = recipient_columns();
        let entry = OpenRecipientRow {
            recipient_type: recipient_type::BCC,
            code_page_id: 0x04B0,
            reserved: 0,
            recipient_row: smtp_row(),
        };
        let bytes = entry.to_bytes_with(cols.as_slice()).unwrap();
        assert_eq!(bytes.len(), entry.size_with(cols.as_slice()));
        let (decoded, consumed) =
            OpenRecipientRow::decode_at_with(&bytes, 0, cols.as_slice()).unwrap();
        assert_eq!(decoded, entry);
        assert_eq!(consumed, bytes.len());
    }

    fn opt_name() -> impl Strategy<Value = Option<String>> {
        proptest::option::of("[a-zA-Z ]{0,8}")
    }

    proptest! {
        // Every combination of optional fields reads exactly what the flags say.
        #[test]
        fn test_flag_gated_fields(
            unicode in any::<bool>(),
            email in opt_name(),
            display in opt_name(),
            simple in opt_name(),
            transmittable in opt_name(),
            address_kind in 0u8..4,
            options in prop_oneof![Just(0u16), Just(RecipientFlags::R), Just(RecipientFlags::S | RecipientFlags::N)],
        ) {
            let address = match address_kind {
                0 => RecipientAddress::NoType { address_type: None },
                1 => RecipientAddress::NoType { address_type: Some("SMTP".into()) },
                2 => RecipientAddress::X500Dn { address_prefix_used: 1, display_type: 0, x500_dn: "/o=x".into() },
                _ => RecipientAddress::PersonalDistributionList2 { entry_id: vec![1, 2], search_key: vec![3] },
            };
            let row = RecipientRow {
                address,
                options: RecipientFlags::options(options),
                unicode,
                email_address: email,
                display_name: display,
                simple_display_name: simple,
                transmittable_display_name: transmittable,
                properties: PropertyRow::Standard(vec![]),
            };
            let cols = recipient_columns();
            let mut bytes = row.to_bytes_with(cols.as_slice()).unwrap().to_vec();
            prop_assert_eq!(bytes.len(), row.size_with(cols.as_slice()));
            bytes.push(0xCC);
            let (decoded, consumed) = RecipientRow::decode_at_with(&bytes, 0, cols.as_slice()).unwrap();
            prop_assert_eq!(consumed, bytes.len() - 1);
            prop_assert_eq!(decoded, row);
        }
    }
}
