use crate::bgp::{self, Session};
use crate::net::support::NetResult;
use crate::net::transport::TxSource;
use std::net::IpAddr;

/// Wire size of the OPEN message this engine emits: header, fixed body and
/// one capability parameter carrying the 4-byte AS.
const OPEN_MESSAGE_SIZE: u16 = 19 + 10 + 8;

impl Session {
    /// Resets the write buffer unless the transport is still draining it.
    pub(crate) fn reset_write_buffer(&mut self) {
        if self.tcpc.as_ref().map_or(false, |t| t.is_sending()) {
            return;
        }
        self.write_buf.reset();
    }

    pub(crate) fn push_marker(&mut self) -> NetResult<()> {
        self.write_buf.put_slice(&[0xFF; 16])
    }

    /// OPEN with the 4-byte-AS capability. The 2-byte AS field carries
    /// AS_TRANS when the local AS does not fit.
    pub(crate) fn push_open(&mut self) -> NetResult<()> {
        let local_as = self.config.local_as;
        let as_field = if local_as > u32::from(u16::MAX) {
            bgp::AS_TRANS
        } else {
            local_as as u16
        };

        self.push_marker()?;
        self.write_buf.put_u16(OPEN_MESSAGE_SIZE)?;
        self.write_buf.put_u8(bgp::MSG_OPEN)?;
        self.write_buf.put_u8(4)?; // version
        self.write_buf.put_u16(as_field)?;
        self.write_buf.put_u16(self.config.hold_time)?;
        self.write_buf.put_u32(self.router_id())?;
        self.write_buf.put_u8(8)?; // optional parameters length
        self.write_buf.put_u8(bgp::PARAM_CAPABILITY)?;
        self.write_buf.put_u8(6)?;
        self.write_buf.put_u8(bgp::CAPABILITY_4_BYTE_AS)?;
        self.write_buf.put_u8(4)?;
        self.write_buf.put_u32(local_as)
    }

    pub(crate) fn push_keepalive(&mut self) -> NetResult<()> {
        self.push_marker()?;
        self.write_buf.put_u16(bgp::MIN_MESSAGE_SIZE as u16)?;
        self.write_buf.put_u8(bgp::MSG_KEEPALIVE)
    }

    pub(crate) fn push_notification(&mut self, code: u8, subcode: u8) -> NetResult<()> {
        self.push_marker()?;
        self.write_buf.put_u16(21)?;
        self.write_buf.put_u8(bgp::MSG_NOTIFICATION)?;
        self.write_buf.put_u8(code)?;
        self.write_buf.put_u8(subcode)
    }

    /// Posts the write buffer on the transport.
    pub(crate) fn send_write_buf(&mut self) -> bool {
        let len = self.write_buf.idx();
        self.tcpc
            .as_mut()
            .map_or(false, |t| t.send(TxSource::WriteBuf, len))
    }

    fn router_id(&self) -> u32 {
        if self.config.router_id != 0 {
            return self.config.router_id;
        }
        match self.config.local_address {
            IpAddr::V4(addr) => u32::from(addr),
            IpAddr::V6(_) => 0,
        }
    }
}
