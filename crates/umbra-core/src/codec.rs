//! Varint buffer codec for the wire format.
//!
//! Transactions and blocks serialize through [`BufferWriter`] /
//! [`BufferReader`] rather than a generic format so that field widths are
//! exactly what the fee wizard sees: integer fields use unsigned LEB128
//! varints, whose width depends on the value — this is what makes the fee
//! computation a fixed point (the fee changes its own encoded width).

use crate::constants::MAX_WIRE_FIELD_LEN;
use crate::error::CodecError;

/// Append-only byte buffer for wire serialization.
#[derive(Debug, Default)]
pub struct BufferWriter {
    buf: Vec<u8>,
}

impl BufferWriter {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Consume the writer, returning the serialized bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    /// Write raw bytes with no length prefix (fixed-width fields).
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Write an unsigned LEB128 varint (1–10 bytes).
    pub fn write_uvarint(&mut self, mut value: u64) {
        while value >= 0x80 {
            self.buf.push((value as u8) | 0x80);
            value >>= 7;
        }
        self.buf.push(value as u8);
    }

    /// Write a length-prefixed byte vector.
    pub fn write_var_bytes(&mut self, bytes: &[u8]) {
        self.write_uvarint(bytes.len() as u64);
        self.write_bytes(bytes);
    }
}

/// Cursor over a byte slice for wire deserialization.
#[derive(Debug)]
pub struct BufferReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> BufferReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Current read offset.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Fail if any bytes remain unconsumed.
    pub fn finish(&self) -> Result<(), CodecError> {
        if self.remaining() != 0 {
            return Err(CodecError::TrailingBytes(self.remaining()));
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        let byte = *self
            .buf
            .get(self.pos)
            .ok_or(CodecError::UnexpectedEof(self.pos))?;
        self.pos += 1;
        Ok(byte)
    }

    /// Read exactly `len` raw bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining() < len {
            return Err(CodecError::UnexpectedEof(self.pos));
        }
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    /// Read a fixed 32-byte array.
    pub fn read_array32(&mut self) -> Result<[u8; 32], CodecError> {
        let mut out = [0u8; 32];
        out.copy_from_slice(self.read_bytes(32)?);
        Ok(out)
    }

    /// Read a fixed 20-byte array.
    pub fn read_array20(&mut self) -> Result<[u8; 20], CodecError> {
        let mut out = [0u8; 20];
        out.copy_from_slice(self.read_bytes(20)?);
        Ok(out)
    }

    /// Read an unsigned LEB128 varint.
    pub fn read_uvarint(&mut self) -> Result<u64, CodecError> {
        let mut value: u64 = 0;
        let mut shift = 0u32;
        loop {
            if shift >= 70 {
                return Err(CodecError::VarintOverflow);
            }
            let byte = self.read_u8()?;
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
        }
    }

    /// Read a length-prefixed byte vector, bounded by
    /// [`MAX_WIRE_FIELD_LEN`].
    pub fn read_var_bytes(&mut self) -> Result<Vec<u8>, CodecError> {
        let len = self.read_uvarint()? as usize;
        if len > MAX_WIRE_FIELD_LEN {
            return Err(CodecError::InvalidLength { got: len, max: MAX_WIRE_FIELD_LEN });
        }
        Ok(self.read_bytes(len)?.to_vec())
    }
}

/// Encoded width of a u64 as an unsigned LEB128 varint, in bytes.
pub fn uvarint_len(value: u64) -> usize {
    if value == 0 {
        return 1;
    }
    (70 - value.leading_zeros() as usize) / 7
}
