//! Little-endian wire primitives and the encode/decode contracts.
//!
//! Every ROP structure implements [`Encode`] and [`Decode`] (or the
//! context-carrying [`EncodeWith`]/[`DecodeWith`] when its layout depends on
//! a column set). `size()` is the exact number of bytes `encode` writes, and
//! decoding consumes exactly that many bytes for equivalent content.

use crate::error::CodecError;
use bytes::{BufMut, Bytes, BytesMut};

/// Byte length of a narrow string including its 1-byte terminator.
pub fn narrow_size(s: &str) -> usize {
    s.chars().count() + 1
}

/// Byte length of a wide string including its 2-byte terminator.
pub fn wide_size(s: &str) -> usize {
    (s.encode_utf16().count() + 1) * 2
}

/// Cursor over an immutable input buffer.
#[derive(Debug, Clone)]
pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Starts reading at `offset`. An offset past the end is an underrun.
    pub fn at(buf: &'a [u8], offset: usize) -> Result<Self, CodecError> {
        if offset > buf.len() {
            return Err(CodecError::Underrun {
                offset,
                needed: 0,
                remaining: 0,
            });
        }
        Ok(Self { buf, pos: offset })
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Returns the next byte without consuming it.
    pub fn peek_u8(&self) -> Result<u8, CodecError> {
        self.buf.get(self.pos).copied().ok_or(CodecError::Underrun {
            offset: self.pos,
            needed: 1,
            remaining: 0,
        })
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining() < n {
            return Err(CodecError::Underrun {
                offset: self.pos,
                needed: n,
                remaining: self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take_array::<1>()?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, CodecError> {
        Ok(u16::from_le_bytes(self.take_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, CodecError> {
        Ok(u32::from_le_bytes(self.take_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32, CodecError> {
        Ok(i32::from_le_bytes(self.take_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, CodecError> {
        Ok(u64::from_le_bytes(self.take_array()?))
    }

    pub fn read_i64(&mut self) -> Result<i64, CodecError> {
        Ok(i64::from_le_bytes(self.take_array()?))
    }

    pub fn read_f64(&mut self) -> Result<f64, CodecError> {
        Ok(f64::from_le_bytes(self.take_array()?))
    }

    /// Reads a single byte that must be 0 or 1.
    pub fn read_bool(&mut self, field: &'static str) -> Result<bool, CodecError> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(CodecError::InvalidEnum {
                field,
                value: other as u32,
            }),
        }
    }

    pub fn read_guid(&mut self) -> Result<[u8; 16], CodecError> {
        self.take_array()
    }

    /// Reads a `u16` count followed by that many bytes.
    pub fn read_sized_bytes(&mut self) -> Result<Vec<u8>, CodecError> {
        let len = self.read_u16()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    /// Reads an 8-bit string up to and including its zero terminator.
    pub fn read_narrow_string(&mut self) -> Result<String, CodecError> {
        let start = self.pos;
        let rest = &self.buf[start..];
        let end = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(CodecError::UnterminatedString {
                offset: start,
                wide: false,
            })?;
        let s = rest[..end].iter().map(|&b| b as char).collect();
        self.pos += end + 1;
        Ok(s)
    }

    /// Reads a UTF-16LE string up to and including its zero code unit.
    pub fn read_wide_string(&mut self) -> Result<String, CodecError> {
        let start = self.pos;
        let rest = &self.buf[start..];
        let mut units = Vec::new();
        let mut terminated = false;
        for pair in rest.chunks_exact(2) {
            let unit = u16::from_le_bytes([pair[0], pair[1]]);
            if unit == 0 {
                terminated = true;
                break;
            }
            units.push(unit);
        }
        if !terminated {
            return Err(CodecError::UnterminatedString {
                offset: start,
                wide: true,
            });
        }
        let s = String::from_utf16(&units).map_err(|_| CodecError::InvalidUtf16 { offset: start })?;
        self.pos += (units.len() + 1) * 2;
        Ok(s)
    }

    /// Fails if any input remains.
    pub fn finish(&self) -> Result<(), CodecError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(CodecError::TrailingBytes(n)),
        }
    }
}

/// Growable output buffer.
#[derive(Debug, Default)]
pub struct WireWriter {
    buf: BytesMut,
}

impl WireWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }

    pub fn put_u8(&mut self, v: u8) {
        self.buf.put_u8(v);
    }

    pub fn put_u16(&mut self, v: u16) {
        self.buf.put_u16_le(v);
    }

    pub fn put_u32(&mut self, v: u32) {
        self.buf.put_u32_le(v);
    }

    pub fn put_i32(&mut self, v: i32) {
        self.buf.put_i32_le(v);
    }

    pub fn put_u64(&mut self, v: u64) {
        self.buf.put_u64_le(v);
    }

    pub fn put_i64(&mut self, v: i64) {
        self.buf.put_i64_le(v);
    }

    pub fn put_f64(&mut self, v: f64) {
        self.buf.put_f64_le(v);
    }

    pub fn put_bool(&mut self, v: bool) {
        self.buf.put_u8(v as u8);
    }

    pub fn put_slice(&mut self, bytes: &[u8]) {
        self.buf.put_slice(bytes);
    }

    /// Overwrites a previously written `u16` at `offset`.
    pub fn patch_u16(&mut self, offset: usize, v: u16) {
        self.buf[offset..offset + 2].copy_from_slice(&v.to_le_bytes());
    }

    /// Writes a `u16` length prefix followed by the bytes.
    pub fn put_sized_bytes(&mut self, field: &'static str, bytes: &[u8]) -> Result<(), CodecError> {
        let len = u16_len(field, bytes.len())?;
        self.put_u16(len);
        self.put_slice(bytes);
        Ok(())
    }

    pub fn put_narrow_string(&mut self, s: &str) -> Result<(), CodecError> {
        for c in s.chars() {
            let code = c as u32;
            if code == 0 {
                return Err(CodecError::UnencodableString {
                    reason: "interior NUL",
                });
            }
            if code > 0xFF {
                return Err(CodecError::UnencodableString {
                    reason: "character outside the 8-bit range",
                });
            }
            self.buf.put_u8(code as u8);
        }
        self.buf.put_u8(0);
        Ok(())
    }

    pub fn put_wide_string(&mut self, s: &str) -> Result<(), CodecError> {
        for unit in s.encode_utf16() {
            if unit == 0 {
                return Err(CodecError::UnencodableString {
                    reason: "interior NUL",
                });
            }
            self.buf.put_u16_le(unit);
        }
        self.buf.put_u16_le(0);
        Ok(())
    }
}

/// Converts a length to a `u16` count field.
pub fn u16_len(field: &'static str, len: usize) -> Result<u16, CodecError> {
    u16::try_from(len).map_err(|_| CodecError::TooManyElements {
        field,
        count: len,
        max: u16::MAX as usize,
    })
}

/// Converts a length to a `u8` count field.
pub fn u8_len(field: &'static str, len: usize) -> Result<u8, CodecError> {
    u8::try_from(len).map_err(|_| CodecError::TooManyElements {
        field,
        count: len,
        max: u8::MAX as usize,
    })
}

/// A structure with a context-free wire layout.
pub trait Encode {
    /// Exact encoded length in bytes.
    fn size(&self) -> usize;

    fn encode(&self, w: &mut WireWriter) -> Result<(), CodecError>;

    fn to_bytes(&self) -> Result<Bytes, CodecError> {
        let mut w = WireWriter::with_capacity(self.size());
        self.encode(&mut w)?;
        Ok(w.into_bytes())
    }
}

pub trait Decode: Sized {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError>;

    /// Decodes at `offset`, returning the value and the bytes consumed.
    fn decode_at(buf: &[u8], offset: usize) -> Result<(Self, usize), CodecError> {
        let mut r = WireReader::at(buf, offset)?;
        let value = Self::decode(&mut r)?;
        Ok((value, r.position() - offset))
    }
}

/// A structure whose layout depends on caller-supplied context.
pub trait EncodeWith<C: ?Sized> {
    fn size_with(&self, ctx: &C) -> usize;

    fn encode_with(&self, w: &mut WireWriter, ctx: &C) -> Result<(), CodecError>;

    fn to_bytes_with(&self, ctx: &C) -> Result<Bytes, CodecError> {
        let mut w = WireWriter::with_capacity(self.size_with(ctx));
        self.encode_with(&mut w, ctx)?;
        Ok(w.into_bytes())
    }
}

pub trait DecodeWith<C: ?Sized>: Sized {
    fn decode_with(r: &mut WireReader<'_>, ctx: &C) -> Result<Self, CodecError>;

    fn decode_at_with(buf: &[u8], offset: usize, ctx: &C) -> Result<(Self, usize), CodecError> {
        let mut r = WireReader::at(buf, offset)?;
        let value = Self::decode_with(&mut r, ctx)?;
        Ok((value, r.position() - offset))
    }
}
