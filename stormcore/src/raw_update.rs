use byteorder::{BigEndian, ByteOrder};
use std::fs;
use std::io;
use std::path::Path;

/// Frame layout the loader walks to precompute message counts. The blob
/// itself is injected verbatim and never re-parsed.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum RawUpdateFormat {
    Bgp,
    Ldp,
}

/// An immutable, memory-resident blob of pre-encoded wire messages plus the
/// counters the stats paths add when the blob drains.
pub struct RawUpdate {
    pub file: String,
    pub buf: Vec<u8>,
    pub pdus: u32,
    pub messages: u32,
}

impl RawUpdate {
    /// Loads a raw-update file as one contiguous blob. Descriptors are
    /// never shared; each session performs its own load.
    pub fn load<P: AsRef<Path>>(path: P, format: RawUpdateFormat) -> io::Result<RawUpdate> {
        let buf = fs::read(&path)?;
        Ok(Self::from_bytes(
            &path.as_ref().to_string_lossy(),
            buf,
            format,
        ))
    }

    pub fn from_bytes(file: &str, buf: Vec<u8>, format: RawUpdateFormat) -> RawUpdate {
        let (pdus, messages) = match format {
            RawUpdateFormat::Bgp => Self::count_bgp(&buf),
            RawUpdateFormat::Ldp => Self::count_ldp(&buf),
        };
        RawUpdate {
            file: file.to_string(),
            buf,
            pdus,
            messages,
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Counts back-to-back BGP frames via the length field at offset 16.
    /// The file author is trusted; counting stops at the first frame that
    /// does not lie fully inside the blob.
    fn count_bgp(buf: &[u8]) -> (u32, u32) {
        let mut messages = 0u32;
        let mut at = 0usize;
        while at + crate::bgp::MIN_MESSAGE_SIZE <= buf.len() {
            let length = BigEndian::read_u16(&buf[at + 16..at + 18]) as usize;
            if length < crate::bgp::MIN_MESSAGE_SIZE || at + length > buf.len() {
                break;
            }
            messages += 1;
            at += length;
        }
        (messages, messages)
    }

    /// Counts LDP PDUs via the PDU length at offset 2 and the messages
    /// inside each PDU via their message headers.
    fn count_ldp(buf: &[u8]) -> (u32, u32) {
        let mut pdus = 0u32;
        let mut messages = 0u32;
        let mut at = 0usize;
        while at + crate::ldp::PDU_HEADER_SIZE <= buf.len() {
            let pdu_len = BigEndian::read_u16(&buf[at + 2..at + 4]) as usize;
            let total = pdu_len + 4;
            if pdu_len < 6 || at + total > buf.len() {
                break;
            }
            pdus += 1;

            let mut msg_at = at + crate::ldp::PDU_HEADER_SIZE;
            let pdu_end = at + total;
            while msg_at + crate::ldp::MSG_HEADER_SIZE <= pdu_end {
                let msg_len = BigEndian::read_u16(&buf[msg_at + 2..msg_at + 4]) as usize;
                if msg_at + 4 + msg_len > pdu_end {
                    break;
                }
                messages += 1;
                msg_at += 4 + msg_len;
            }

            at += total;
        }
        (pdus, messages)
    }
}

/// Ordered chain of raw-update descriptors attached to one session. The
/// pump sends the current descriptor, advances on transport idle and clears
/// `sending` once the chain drains.
pub struct RawUpdateChain {
    updates: Vec<RawUpdate>,
    current: usize,
    pub sending: bool,
}

impl RawUpdateChain {
    pub fn new() -> RawUpdateChain {
        RawUpdateChain {
            updates: Vec::new(),
            current: 0,
            sending: false,
        }
    }

    pub fn attach(&mut self, update: RawUpdate) {
        self.updates.push(update);
    }

    /// Replaces the chain contents; the next pump run starts from the new
    /// head.
    pub fn replace(&mut self, updates: Vec<RawUpdate>) {
        self.updates = updates;
        self.current = 0;
        self.sending = false;
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.updates.len()
    }

    /// The descriptor the pump is (or would be) sending.
    pub fn current(&self) -> Option<&RawUpdate> {
        self.updates.get(self.current)
    }

    /// Moves to the next descriptor. Returns true while another descriptor
    /// is pending.
    pub fn advance(&mut self) -> bool {
        if self.current < self.updates.len() {
            self.current += 1;
        }
        self.current < self.updates.len()
    }

    /// Restarts the chain from the head, e.g. on session reconnect.
    pub fn rewind(&mut self) {
        self.current = 0;
        self.sending = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bgp_frame(msg_type: u8, length: u16) -> Vec<u8> {
        let mut frame = vec![0xFF; 16];
        frame.extend_from_slice(&length.to_be_bytes());
        frame.push(msg_type);
        frame.resize(length as usize, 0);
        frame
    }

    #[test]
    fn test_count_bgp_messages() {
        let mut blob = Vec::new();
        blob.extend(bgp_frame(2, 23));
        blob.extend(bgp_frame(2, 40));
        blob.extend(bgp_frame(4, 19));

        let update = RawUpdate::from_bytes("test", blob, RawUpdateFormat::Bgp);

        assert_eq!(update.messages, 3);
        assert_eq!(update.pdus, 3);
    }

    #[test]
    fn test_count_bgp_stops_on_truncated_tail() {
        let mut blob = bgp_frame(2, 23);
        blob.extend(&bgp_frame(2, 40)[..20]);

        let update = RawUpdate::from_bytes("test", blob, RawUpdateFormat::Bgp);

        assert_eq!(update.messages, 1);
    }

    #[test]
    fn test_count_ldp_pdus_and_messages() {
        // One PDU carrying two keepalive messages (8 bytes each).
        let mut blob = Vec::new();
        blob.extend(&1u16.to_be_bytes()); // version
        blob.extend(&22u16.to_be_bytes()); // pdu length: 6 id + 2 * 8
        blob.extend(&[10, 0, 0, 1]); // lsr id
        blob.extend(&0u16.to_be_bytes()); // label space
        for _ in 0..2 {
            blob.extend(&0x0201u16.to_be_bytes()); // keepalive
            blob.extend(&4u16.to_be_bytes()); // message length
            blob.extend(&1u32.to_be_bytes()); // message id
        }

        let update = RawUpdate::from_bytes("test", blob, RawUpdateFormat::Ldp);

        assert_eq!(update.pdus, 1);
        assert_eq!(update.messages, 2);
    }

    #[test]
    fn test_chain_advance() {
        let mut chain = RawUpdateChain::new();
        chain.attach(RawUpdate::from_bytes("a", Vec::new(), RawUpdateFormat::Bgp));
        chain.attach(RawUpdate::from_bytes("b", Vec::new(), RawUpdateFormat::Bgp));

        assert_eq!(chain.current().unwrap().file, "a");
        assert!(chain.advance());
        assert_eq!(chain.current().unwrap().file, "b");
        assert!(!chain.advance());
        assert!(chain.current().is_none());

        chain.rewind();
        assert_eq!(chain.current().unwrap().file, "a");
    }
}
