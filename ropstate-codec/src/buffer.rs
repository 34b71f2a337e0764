//! ROP buffer framing.
//!
//! A ROP buffer carries a list of ROPs followed by the server object handle
//! table they index into:
//!
//! ```text
//! +---------+-----------------------------+--------------------------------+
//! | RopSize | ROP list                    | server object handle table     |
//! | 2 bytes | RopSize - 2 bytes           | 4 bytes per handle, remainder  |
//! +---------+-----------------------------+--------------------------------+
//! ```
//!
//! RopSize counts itself. Handle indexes inside each ROP (InputHandleIndex,
//! OutputHandleIndex) are positions in the trailing table.

use crate::error::CodecError;
use crate::wire::{u16_len, Decode, Encode, WireReader, WireWriter};
use serde::{Deserialize, Serialize};

/// Size of the RopSize field.
pub const ROP_SIZE_LEN: usize = 2;

/// Handle value marking an unused slot in the handle table.
pub const INVALID_HANDLE: u32 = 0xFFFF_FFFF;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RopBuffer {
    /// Concatenated ROP requests or responses.
    pub rops: Vec<u8>,
    pub handles: Vec<u32>,
}

impl RopBuffer {
    pub fn new(rops: Vec<u8>, handles: Vec<u32>) -> Self {
        Self { rops, handles }
    }

    /// Builds a buffer from already-encoded ROPs.
    pub fn from_rops<E: Encode>(rops: &[E], handles: Vec<u32>) -> Result<Self, CodecError> {
        let mut w = WireWriter::with_capacity(rops.iter().map(Encode::size).sum());
        for rop in rops {
            rop.encode(&mut w)?;
        }
        Ok(Self {
            rops: w.as_slice().to_vec(),
            handles,
        })
    }

    /// Decodes every ROP in the list. A ROP that runs past the end of the
    /// list is an underrun even if handle bytes follow.
    pub fn decode_rops<D: Decode>(&self) -> Result<Vec<D>, CodecError> {
        let mut r = WireReader::new(&self.rops);
        let mut out = Vec::new();
        while !r.is_empty() {
            out.push(D::decode(&mut r)?);
        }
        Ok(out)
    }

    /// Resolves a handle index against the handle table.
    pub fn handle(&self, index: u8) -> Option<u32> {
        self.handles
            .get(index as usize)
            .copied()
            .filter(|h| *h != INVALID_HANDLE)
    }
}

impl Encode for RopBuffer {
    fn size(&self) -> usize {
        ROP_SIZE_LEN + self.rops.len() + self.handles.len() * 4
    }

    fn encode(&self, w: &mut WireWriter) -> Result<(), CodecError> {
        w.put_u16(u16_len("RopSize", ROP_SIZE_LEN + self.rops.len())?);
        w.put_slice(&self.rops);
        for handle in &self.handles {
            w.put_u32(*handle);
        }
        Ok(())
    }
}

impl Decode for RopBuffer {
    /// Consumes the rest of the input: whatever follows the ROP list is the
    /// handle table.
    fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
        let available = r.remaining();
        let rop_size = r.read_u16()? as usize;
        if rop_size < ROP_SIZE_LEN || rop_size > available {
            return Err(CodecError::LengthMismatch {
                field: "RopSize",
                declared: rop_size,
                actual: available,
            });
        }
        let rops = r.take(rop_size - ROP_SIZE_LEN)?.to_vec();
        let tail = r.remaining();
        if tail % 4 != 0 {
            return Err(CodecError::LengthMismatch {
                field: "ServerObjectHandleTable",
                declared: tail - tail % 4,
                actual: tail,
            });
        }
        let handles = (0..tail / 4)
            .map(|_| r.read_u32())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rops, handles })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rop::RopHeader;
    use crate::table::{QueryPositionRequest, ReleaseRequest, TableRequest};

    #[test]
    fn test_buffer_layout() {
        let buf = RopBuffer::new(vec![0x17, 0, 0], vec![0x0000_0042]);
        let bytes = buf.to_bytes().unwrap();
        assert_eq!(bytes.as_ref(), &[5, 0, 0x17, 0, 0, 0x42, 0, 0, 0]);
        let (decoded, consumed) = RopBuffer::decode_at(&bytes, 0).unwrap();
        assert_eq!(decoded, buf);
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn test_rop_size_too_small() {
        let err = RopBuffer::decode_at(&[1, 0], 0).unwrap_err();
        assert!(matches!(err, CodecError::LengthMismatch { field: "RopSize", .. }));
    }

    #[test]
    fn test_rop_size_beyond_buffer() {
        let err = RopBuffer::decode_at(&[9, 0, 1, 2], 0).unwrap_err();
        assert!(matches!(err, CodecError::LengthMismatch { field: "RopSize", .. }));
    }

    #[test]
    fn test_ragged_handle_table() {
        let err = RopBuffer::decode_at(&[2, 0, 1, 2, 3], 0).unwrap_err();
        assert!(matches!(
            err,
            CodecError::LengthMismatch {
                field: "ServerObjectHandleTable",
                ..
            }
        ));
    }

    #[test]
    fn test_decode_rop_list() {
        let requests = vec![
            TableRequest::QueryPosition(QueryPositionRequest {
                header: RopHeader::new(0, 0),
            }),
            TableRequest::Release(ReleaseRequest {
                header: RopHeader::new(0, 1),
            }),
        ];
        let buf = RopBuffer::from_rops(&requests, vec![10, INVALID_HANDLE]).unwrap();
        let decoded: Vec<TableRequest> = buf.decode_rops().unwrap();
        assert_eq!(decoded, requests);
        assert_eq!(buf.handle(0), Some(10));
        assert_eq!(buf.handle(1), None);
        assert_eq!(buf.handle(2), None);
    }

    #[test]
    fn test_truncated_rop_in_list() {
        // QueryRows needs 7 bytes; only 4 are in the list.
        let buf = RopBuffer::new(vec![0x15, 0, 0, 0], vec![]);
        let err = buf.decode_rops::<TableRequest>().unwrap_err();
        assert!(matches!(err, CodecError::Underrun { .. }));
    }
}
