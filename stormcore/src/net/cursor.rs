use crate::net::support::{ErrorKind, NetError, NetResult};
use byteorder::{BigEndian, ByteOrder};

/// Bounds-checked big-endian reader over one complete frame. Every take
/// validates the remaining length, so a declared length that would overrun
/// the frame surfaces as `Fatal(Truncated)` instead of a silent overflow.
pub struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    #[inline]
    pub fn new(data: &'a [u8]) -> Cursor<'a> {
        Cursor { data, pos: 0 }
    }

    /// Bytes left in the frame.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    #[inline]
    pub fn take_u8(&mut self) -> NetResult<u8> {
        let raw = self.take_slice(1)?;
        Ok(raw[0])
    }

    #[inline]
    pub fn take_u16(&mut self) -> NetResult<u16> {
        let raw = self.take_slice(2)?;
        Ok(BigEndian::read_u16(raw))
    }

    #[inline]
    pub fn take_u32(&mut self) -> NetResult<u32> {
        let raw = self.take_slice(4)?;
        Ok(BigEndian::read_u32(raw))
    }

    #[inline]
    pub fn take_slice(&mut self, count: usize) -> NetResult<&'a [u8]> {
        if count > self.remaining() {
            return Err(NetError::Fatal(ErrorKind::Truncated));
        }
        let slice = &self.data[self.pos..self.pos + count];
        self.pos += count;
        Ok(slice)
    }

    #[inline]
    pub fn skip(&mut self, count: usize) -> NetResult<()> {
        self.take_slice(count).map(|_| ())
    }
}
