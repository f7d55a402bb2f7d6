use crate::net::support::{ErrorKind, NetError, NetResult};
use byteorder::{BigEndian, ByteOrder};

/// A flat framed I/O buffer with an explicit write cursor (`idx`) and read
/// cursor (`start_idx`). The invariant `0 <= start_idx <= idx <= size`
/// holds at all times.
///
/// Incoming bytes are appended at `idx`; the decode loop consumes whole
/// frames by advancing `start_idx` and compacts with `rebase` once no
/// further complete frame is present. The write side doubles as the PDU
/// build area: messages are appended with the `put_*` helpers and length
/// fields are back-patched with `patch_u16`.
pub struct FrameBuffer {
    data: Vec<u8>,
    idx: usize,
    start_idx: usize,
}

impl FrameBuffer {
    #[inline]
    pub fn new(size: usize) -> FrameBuffer {
        FrameBuffer {
            data: vec![0; size],
            idx: 0,
            start_idx: 0,
        }
    }

    /// Total capacity of the buffer.
    #[inline]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Current write cursor (high-water mark).
    #[inline]
    pub fn idx(&self) -> usize {
        self.idx
    }

    /// Current read cursor.
    #[inline]
    pub fn start_idx(&self) -> usize {
        self.start_idx
    }

    /// Number of unread bytes between the two cursors.
    #[inline]
    pub fn available(&self) -> usize {
        self.idx - self.start_idx
    }

    /// Remaining free capacity behind the write cursor.
    #[inline]
    pub fn free(&self) -> usize {
        self.data.len() - self.idx
    }

    /// Appends raw bytes at the write cursor. Fails when the bytes do not
    /// fit; the caller maps this to its protocol's resource error.
    #[inline]
    pub fn push(&mut self, bytes: &[u8]) -> NetResult<()> {
        if self.idx + bytes.len() > self.data.len() {
            return Err(NetError::Fatal(ErrorKind::BufferExhausted));
        }
        self.data[self.idx..self.idx + bytes.len()].copy_from_slice(bytes);
        self.idx += bytes.len();
        Ok(())
    }

    /// The unread range `[start_idx, idx)`.
    #[inline]
    pub fn unread(&self) -> &[u8] {
        &self.data[self.start_idx..self.idx]
    }

    /// The written range `[0, idx)`. This is what a transport send covers.
    #[inline]
    pub fn written(&self) -> &[u8] {
        &self.data[..self.idx]
    }

    /// Advances the read cursor past `count` consumed bytes.
    #[inline]
    pub fn consume(&mut self, count: usize) {
        debug_assert!(self.start_idx + count <= self.idx);
        self.start_idx += count;
    }

    /// Copies the unread tail to offset zero and resets both cursors. The
    /// only form of compaction; runs after the decode loop stalls.
    pub fn rebase(&mut self) {
        let size = self.idx - self.start_idx;
        if size > 0 {
            self.data.copy_within(self.start_idx..self.idx, 0);
        }
        self.start_idx = 0;
        self.idx = size;
    }

    /// Resets both cursors, discarding all content.
    #[inline]
    pub fn reset(&mut self) {
        self.idx = 0;
        self.start_idx = 0;
    }

    #[inline]
    pub fn put_u8(&mut self, value: u8) -> NetResult<()> {
        self.push(&[value])
    }

    #[inline]
    pub fn put_u16(&mut self, value: u16) -> NetResult<()> {
        let mut raw = [0u8; 2];
        BigEndian::write_u16(&mut raw, value);
        self.push(&raw)
    }

    #[inline]
    pub fn put_u32(&mut self, value: u32) -> NetResult<()> {
        let mut raw = [0u8; 4];
        BigEndian::write_u32(&mut raw, value);
        self.push(&raw)
    }

    #[inline]
    pub fn put_slice(&mut self, bytes: &[u8]) -> NetResult<()> {
        self.push(bytes)
    }

    /// Overwrites a previously written big-endian u16, used to back-patch
    /// PDU and message length fields.
    #[inline]
    pub fn patch_u16(&mut self, at: usize, value: u16) {
        debug_assert!(at + 2 <= self.idx);
        BigEndian::write_u16(&mut self.data[at..at + 2], value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_consume() {
        let mut buffer = FrameBuffer::new(16);

        buffer.push(&[1, 2, 3, 4]).unwrap();
        assert_eq!(buffer.available(), 4);
        assert_eq!(buffer.unread(), &[1, 2, 3, 4]);

        buffer.consume(2);
        assert_eq!(buffer.available(), 2);
        assert_eq!(buffer.unread(), &[3, 4]);
        assert_eq!(buffer.start_idx(), 2);
        assert_eq!(buffer.idx(), 4);
    }

    #[test]
    fn test_push_exhaustion() {
        let mut buffer = FrameBuffer::new(4);

        buffer.push(&[1, 2, 3]).unwrap();
        let result = buffer.push(&[4, 5]);

        assert_eq!(result, Err(NetError::Fatal(ErrorKind::BufferExhausted)));
        // Nothing was written by the failed push.
        assert_eq!(buffer.unread(), &[1, 2, 3]);
    }

    #[test]
    fn test_rebase_preserves_unread_range() {
        let mut buffer = FrameBuffer::new(16);

        buffer.push(&[10, 20, 30, 40, 50]).unwrap();
        buffer.consume(3);

        buffer.rebase();

        assert_eq!(buffer.start_idx(), 0);
        assert_eq!(buffer.idx(), 2);
        assert_eq!(buffer.unread(), &[40, 50]);
    }

    #[test]
    fn test_rebase_empty() {
        let mut buffer = FrameBuffer::new(8);

        buffer.push(&[1, 2]).unwrap();
        buffer.consume(2);
        buffer.rebase();

        assert_eq!(buffer.start_idx(), 0);
        assert_eq!(buffer.idx(), 0);
        assert_eq!(buffer.available(), 0);
    }

    #[test]
    fn test_rebase_restores_capacity() {
        let mut buffer = FrameBuffer::new(8);

        buffer.push(&[0; 8]).unwrap();
        buffer.consume(6);
        assert_eq!(buffer.free(), 0);

        buffer.rebase();

        assert_eq!(buffer.free(), 6);
        buffer.push(&[1, 2, 3]).unwrap();
        assert_eq!(buffer.unread(), &[0, 0, 1, 2, 3]);
    }

    #[test]
    fn test_put_and_patch() {
        let mut buffer = FrameBuffer::new(32);

        buffer.put_u16(0).unwrap();
        buffer.put_u8(7).unwrap();
        buffer.put_u32(0x01020304).unwrap();
        buffer.put_slice(&[0xAA, 0xBB]).unwrap();
        buffer.patch_u16(0, (buffer.idx() - 2) as u16);

        assert_eq!(buffer.written(), &[0, 7, 7, 1, 2, 3, 4, 0xAA, 0xBB]);
    }
}
