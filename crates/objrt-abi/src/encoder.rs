//! Load-unit encoding and decoding primitives
//!
//! All multi-byte integers are little-endian. Strings are a `u32` byte length
//! followed by UTF-8 bytes; an absent optional string is written as the
//! length [`ABSENT`].

use thiserror::Error;

/// Length marker used for an absent optional string
pub const ABSENT: u32 = 0xFFFF_FFFF;

/// Errors that can occur while decoding a load unit payload
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// Unexpected end of input
    #[error("Unexpected end of load unit at offset {0}")]
    UnexpectedEnd(usize),

    /// Invalid UTF-8 string
    #[error("Invalid UTF-8 string at offset {0}")]
    InvalidUtf8(usize),

    /// Unknown tag byte for a tagged record
    #[error("Invalid {kind} tag {tag} at offset {offset}")]
    InvalidTag {
        /// What kind of record was being decoded
        kind: &'static str,
        /// The tag byte that was read
        tag: u8,
        /// Offset of the tag byte
        offset: usize,
    },

    /// Nested records exceed the supported depth
    #[error("Records nested too deeply at offset {0}")]
    NestingTooDeep(usize),
}

/// Writer for load-unit records
pub struct UnitWriter {
    pub(crate) buffer: Vec<u8>,
}

impl UnitWriter {
    /// Create a new writer
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Create a new writer with capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Get the bytes written so far
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Consume the writer and return its bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Current write offset
    pub fn offset(&self) -> usize {
        self.buffer.len()
    }

    /// Emit a raw byte
    pub fn emit_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    /// Emit a 32-bit unsigned integer
    pub fn emit_u32(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Emit a 64-bit signed integer
    pub fn emit_i64(&mut self, value: i64) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Emit a 64-bit float
    pub fn emit_f64(&mut self, value: f64) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Emit a raw byte slice without a length prefix
    pub fn emit_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Emit a length-prefixed string
    pub fn emit_string(&mut self, value: &str) {
        self.emit_u32(value.len() as u32);
        self.buffer.extend_from_slice(value.as_bytes());
    }

    /// Emit an optional string ([`ABSENT`] marks `None`)
    pub fn emit_opt_string(&mut self, value: Option<&str>) {
        match value {
            Some(s) => self.emit_string(s),
            None => self.emit_u32(ABSENT),
        }
    }

    /// Emit a count prefix for a list
    pub fn emit_count(&mut self, count: usize) {
        self.emit_u32(count as u32);
    }

    /// Reserve space for a u32 (returns offset for later patching)
    pub fn reserve_u32(&mut self) -> usize {
        let offset = self.offset();
        self.emit_u32(0);
        offset
    }

    /// Patch a previously reserved u32
    pub fn patch_u32(&mut self, offset: usize, value: u32) {
        self.buffer[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }
}

impl Default for UnitWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Reader for load-unit records
pub struct UnitReader<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> UnitReader<'a> {
    /// Create a new reader over `buffer`
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            position: 0,
        }
    }

    /// Current read position
    pub fn position(&self) -> usize {
        self.position
    }

    /// Bytes left to read
    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.position)
    }

    /// Check if there are more bytes to read
    pub fn has_more(&self) -> bool {
        self.position < self.buffer.len()
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8], DecodeError> {
        if count > self.remaining() {
            return Err(DecodeError::UnexpectedEnd(self.position));
        }
        let buffer: &'a [u8] = self.buffer;
        let bytes = &buffer[self.position..self.position + count];
        self.position += count;
        Ok(bytes)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    /// Read a single byte
    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    /// Read a 32-bit unsigned integer
    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.take_array()?))
    }

    /// Read a 64-bit signed integer
    pub fn read_i64(&mut self) -> Result<i64, DecodeError> {
        Ok(i64::from_le_bytes(self.take_array()?))
    }

    /// Read a 64-bit float
    pub fn read_f64(&mut self) -> Result<f64, DecodeError> {
        Ok(f64::from_le_bytes(self.take_array()?))
    }

    /// Read a fixed-size byte array
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        self.take_array()
    }

    /// Read a length-prefixed string
    pub fn read_string(&mut self) -> Result<String, DecodeError> {
        let len = self.read_u32()? as usize;
        self.read_string_body(len)
    }

    /// Read an optional string written by [`UnitWriter::emit_opt_string`]
    pub fn read_opt_string(&mut self) -> Result<Option<String>, DecodeError> {
        let len = self.read_u32()?;
        if len == ABSENT {
            return Ok(None);
        }
        self.read_string_body(len as usize).map(Some)
    }

    fn read_string_body(&mut self, len: usize) -> Result<String, DecodeError> {
        let start = self.position;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::InvalidUtf8(start))
    }

    /// Read a list count.
    ///
    /// Every element occupies at least one byte, so a count larger than the
    /// remaining input is reported as truncation instead of being trusted as an
    /// allocation size.
    pub fn read_count(&mut self) -> Result<usize, DecodeError> {
        let at = self.position;
        let count = self.read_u32()? as usize;
        if count > self.remaining() {
            return Err(DecodeError::UnexpectedEnd(at));
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_emission() {
        let mut writer = UnitWriter::new();
        writer.emit_u8(0x42);
        writer.emit_u32(0xABCD_EF01);

        let bytes = writer.buffer();
        assert_eq!(bytes[0], 0x42);
        assert_eq!(bytes[1], 0x01); // Little-endian
        assert_eq!(bytes[2], 0xEF);
        assert_eq!(bytes[3], 0xCD);
        assert_eq!(bytes[4], 0xAB);
    }

    #[test]
    fn test_optional_strings() {
        let mut writer = UnitWriter::new();
        writer.emit_opt_string(Some("NSObject"));
        writer.emit_opt_string(None);
        writer.emit_opt_string(Some(""));

        let bytes = writer.into_bytes();
        let mut reader = UnitReader::new(&bytes);
        assert_eq!(reader.read_opt_string().unwrap().as_deref(), Some("NSObject"));
        assert_eq!(reader.read_opt_string().unwrap(), None);
        assert_eq!(reader.read_opt_string().unwrap().as_deref(), Some(""));
        assert!(!reader.has_more());
    }

    #[test]
    fn test_patch_reserved() {
        let mut writer = UnitWriter::new();
        let at = writer.reserve_u32();
        writer.emit_u8(7);
        writer.patch_u32(at, 99);

        let bytes = writer.into_bytes();
        let mut reader = UnitReader::new(&bytes);
        assert_eq!(reader.read_u32().unwrap(), 99);
        assert_eq!(reader.read_u8().unwrap(), 7);
    }

    #[test]
    fn test_read_past_end() {
        let mut reader = UnitReader::new(&[1, 2]);
        assert_eq!(reader.read_u32(), Err(DecodeError::UnexpectedEnd(0)));
    }

    #[test]
    fn test_invalid_utf8() {
        let mut writer = UnitWriter::new();
        writer.emit_u32(2);
        writer.emit_bytes(&[0xC3, 0x28]);
        let bytes = writer.into_bytes();

        let mut reader = UnitReader::new(&bytes);
        assert_eq!(reader.read_string(), Err(DecodeError::InvalidUtf8(4)));
    }

    #[test]
    fn test_count_larger_than_input() {
        let mut writer = UnitWriter::new();
        writer.emit_u32(1_000_000);
        let bytes = writer.into_bytes();

        let mut reader = UnitReader::new(&bytes);
        assert_eq!(reader.read_count(), Err(DecodeError::UnexpectedEnd(0)));
    }
}
