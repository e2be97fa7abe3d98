//! Big-endian byte-stream primitives used by every table parser.
//!
//! OpenType/AAT tables are packed big-endian binary with no alignment
//! padding. A [`Reader`] is a zero-copy cursor over a borrowed byte slice;
//! `consume_*` advances the cursor and returns a value, `peek_*` reads
//! without advancing. `drop`/`take` produce sub-slices relative to the
//! *original* buffer the reader was built from, which is how offset tables
//! (most of them) are resolved: an offset is always relative to some base,
//! never to the current cursor position.

use crate::errors::{Error, Location, Result};

/// A borrowed, zero-copy cursor over font table bytes.
#[derive(Clone, Copy)]
pub struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.pos)
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Returns the whole underlying buffer the reader was built on, ignoring
    /// the cursor. Used to resolve offsets relative to a table's own start.
    pub fn whole(&self) -> &'a [u8] {
        self.bytes
    }

    /// A new reader over `self.whole()` advanced by `offset` bytes,
    /// independent of this reader's own cursor position.
    pub fn drop(&self, offset: usize) -> Reader<'a> {
        let start = offset.min(self.bytes.len());
        Reader { bytes: &self.bytes[start..], pos: 0 }
    }

    /// A reader over the first `len` bytes of `self.whole()`.
    pub fn take(&self, len: usize) -> Reader<'a> {
        let end = len.min(self.bytes.len());
        Reader { bytes: &self.bytes[..end], pos: 0 }
    }

    pub fn slice(&self, start: usize, len: usize) -> &'a [u8] {
        let start = start.min(self.bytes.len());
        let end = (start + len).min(self.bytes.len());
        &self.bytes[start..end]
    }

    pub fn remove_prefix(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.bytes.len());
    }

    fn take_n(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.bytes.len() {
            return Err(Error::parse(
                Location::default(),
                format!("unexpected end of font table data (wanted {n} bytes, had {})", self.remaining()),
            ));
        }
        let s = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(s)
    }

    pub fn consume_u8(&mut self) -> Result<u8> {
        Ok(self.take_n(1)?[0])
    }

    pub fn consume_i8(&mut self) -> Result<i8> {
        Ok(self.consume_u8()? as i8)
    }

    pub fn consume_u16(&mut self) -> Result<u16> {
        let b = self.take_n(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn consume_i16(&mut self) -> Result<i16> {
        Ok(self.consume_u16()? as i16)
    }

    pub fn consume_u24(&mut self) -> Result<u32> {
        let b = self.take_n(3)?;
        Ok(u32::from_be_bytes([0, b[0], b[1], b[2]]))
    }

    pub fn consume_u32(&mut self) -> Result<u32> {
        let b = self.take_n(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn consume_i32(&mut self) -> Result<i32> {
        Ok(self.consume_u32()? as i32)
    }

    pub fn consume_u64(&mut self) -> Result<u64> {
        let b = self.take_n(8)?;
        Ok(u64::from_be_bytes(b.try_into().unwrap()))
    }

    pub fn consume_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.take_n(n)
    }

    fn peek_n(&self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.bytes.len() {
            return Err(Error::parse(Location::default(), "unexpected end of font table data while peeking"));
        }
        Ok(&self.bytes[self.pos..self.pos + n])
    }

    pub fn peek_u8(&self) -> Result<u8> {
        Ok(self.peek_n(1)?[0])
    }

    pub fn peek_u16(&self) -> Result<u16> {
        let b = self.peek_n(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn peek_i16(&self) -> Result<i16> {
        Ok(self.peek_u16()? as i16)
    }

    pub fn peek_u32(&self) -> Result<u32> {
        let b = self.peek_n(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Reads a big-endian unsigned value of 1, 2, 4, or 8 bytes, used by
    /// AAT lookup tables whose element width is chosen per-table.
    pub fn consume_uint(&mut self, size: u8) -> Result<u64> {
        match size {
            1 => Ok(self.consume_u8()? as u64),
            2 => Ok(self.consume_u16()? as u64),
            4 => Ok(self.consume_u32()? as u64),
            8 => Ok(self.consume_u64()?),
            _ => Err(Error::internal(format!("invalid lookup element size {size}"))),
        }
    }

    pub fn peek_uint(&self, size: u8) -> Result<u64> {
        let mut r = *self;
        r.consume_uint(size)
    }
}

/// Peek helpers operating directly on a slice at a byte offset, used by the
/// handful of call sites (kern format 2's class-table lookups) that index
/// directly rather than walking a cursor.
pub fn peek_i16_at(bytes: &[u8], offset: usize) -> Result<i16> {
    Reader::new(bytes).drop(offset).peek_i16()
}

pub fn peek_u16_at(bytes: &[u8], offset: usize) -> Result<u16> {
    Reader::new(bytes).drop(offset).peek_u16()
}
