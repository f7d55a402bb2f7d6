//! Write-side LDP PDU framing. A PDU is opened with `pdu_init`, messages
//! are appended, and `pdu_close` back-patches the PDU length. Message
//! lengths are patched the same way when each message is closed.

use crate::ldp::{self, Session};
use crate::net::support::NetResult;
use std::net::IpAddr;

impl Session {
    /// Opens a PDU: version, length placeholder and the local LDP
    /// identifier.
    pub(crate) fn pdu_init(&mut self) -> NetResult<()> {
        self.pdu_start_idx = self.write_buf.idx();
        self.write_buf.put_u16(ldp::PDU_VERSION)?;
        self.write_buf.put_u16(0)?;
        self.write_buf.put_slice(&self.local.lsr_id.octets())?;
        self.write_buf.put_u16(self.local.label_space_id)
    }

    /// Patches the PDU length (everything after the length field).
    pub(crate) fn pdu_close(&mut self) {
        let length = self.write_buf.idx() - self.pdu_start_idx - 4;
        self.write_buf.patch_u16(self.pdu_start_idx + 2, length as u16);
    }

    fn msg_init(&mut self, msg_type: u16) -> NetResult<()> {
        self.msg_start_idx = self.write_buf.idx();
        self.message_id += 1;
        self.write_buf.put_u16(msg_type)?;
        self.write_buf.put_u16(0)?;
        self.write_buf.put_u32(self.message_id)
    }

    fn msg_close(&mut self) {
        let length = self.write_buf.idx() - self.msg_start_idx - 4;
        self.write_buf.patch_u16(self.msg_start_idx + 2, length as u16);
    }

    /// Initialization message carrying the Common Session Parameters TLV
    /// with the locally offered keepalive and max PDU length.
    pub(crate) fn push_init_message(&mut self) -> NetResult<()> {
        self.msg_init(ldp::MSG_INITIALIZATION)?;
        self.write_buf.put_u16(ldp::TLV_COMMON_SESSION_PARAMETERS)?;
        self.write_buf.put_u16(14)?;
        self.write_buf.put_u16(1)?; // protocol version
        self.write_buf.put_u16(self.local.keepalive_time)?;
        self.write_buf.put_u8(0)?; // A/D flags
        self.write_buf.put_u8(0)?; // path vector limit
        self.write_buf.put_u16(self.local.max_pdu_len)?;
        self.write_buf.put_slice(&self.peer.lsr_id.octets())?;
        self.write_buf.put_u16(self.peer.label_space_id)?;
        self.msg_close();
        Ok(())
    }

    pub(crate) fn push_keepalive_message(&mut self) -> NetResult<()> {
        self.msg_init(ldp::MSG_KEEPALIVE)?;
        self.msg_close();
        Ok(())
    }

    /// Notification with a Status TLV; the fatal bit travels inside the
    /// status code itself.
    pub(crate) fn push_notification_message(&mut self, status: u32) -> NetResult<()> {
        self.msg_init(ldp::MSG_NOTIFICATION)?;
        self.write_buf.put_u16(ldp::TLV_STATUS)?;
        self.write_buf.put_u16(10)?;
        self.write_buf.put_u32(status)?;
        self.write_buf.put_u32(0)?; // offending message id
        self.write_buf.put_u16(0)?; // offending message type
        self.msg_close();
        Ok(())
    }

    /// Address message advertising the local transport address, emitted on
    /// reaching OPERATIONAL.
    pub(crate) fn push_address_message(&mut self) -> NetResult<()> {
        self.msg_init(ldp::MSG_ADDRESS)?;
        match self.local.transport_address {
            IpAddr::V4(addr) => {
                self.write_buf.put_u16(ldp::TLV_ADDRESS_LIST)?;
                self.write_buf.put_u16(2 + 4)?;
                self.write_buf.put_u16(1)?; // family: IPv4
                self.write_buf.put_slice(&addr.octets())?;
            }
            IpAddr::V6(addr) => {
                self.write_buf.put_u16(ldp::TLV_ADDRESS_LIST)?;
                self.write_buf.put_u16(2 + 16)?;
                self.write_buf.put_u16(2)?; // family: IPv6
                self.write_buf.put_slice(&addr.octets())?;
            }
        }
        self.msg_close();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LdpConfig;
    use ion::logging;
    use std::net::Ipv4Addr;

    fn make_session() -> Session {
        let config = LdpConfig {
            lsr_id: Ipv4Addr::new(10, 10, 10, 10),
            ipv4_transport_address: Ipv4Addr::new(10, 0, 0, 1),
            keepalive_time: 30,
            ..LdpConfig::default()
        };
        let mut session = Session::new(0, &config, &logging::discard());
        session.peer.lsr_id = Ipv4Addr::new(10, 10, 10, 20);
        session.peer.label_space_id = 0;
        session
    }

    #[test]
    fn test_keepalive_pdu_layout() {
        let mut session = make_session();

        session.pdu_init().unwrap();
        session.push_keepalive_message().unwrap();
        session.pdu_close();

        let pdu = session.write_buf.written();
        assert_eq!(pdu.len(), 18);
        // Version 1, PDU length 14 (lsr-id + label-space + message).
        assert_eq!(&pdu[0..2], &1u16.to_be_bytes());
        assert_eq!(&pdu[2..4], &14u16.to_be_bytes());
        assert_eq!(&pdu[4..8], &[10, 10, 10, 10]);
        assert_eq!(&pdu[8..10], &0u16.to_be_bytes());
        // Keepalive message: type, length 4 (message id only), id 1.
        assert_eq!(&pdu[10..12], &ldp::MSG_KEEPALIVE.to_be_bytes());
        assert_eq!(&pdu[12..14], &4u16.to_be_bytes());
        assert_eq!(&pdu[14..18], &1u32.to_be_bytes());
    }

    #[test]
    fn test_init_message_layout() {
        let mut session = make_session();

        session.pdu_init().unwrap();
        session.push_init_message().unwrap();
        session.pdu_close();

        let pdu = session.write_buf.written();
        // Message header at offset 10: type, length 4 + 18 (CSP TLV).
        assert_eq!(&pdu[10..12], &ldp::MSG_INITIALIZATION.to_be_bytes());
        assert_eq!(&pdu[12..14], &22u16.to_be_bytes());
        // CSP TLV at offset 18.
        assert_eq!(&pdu[18..20], &ldp::TLV_COMMON_SESSION_PARAMETERS.to_be_bytes());
        assert_eq!(&pdu[20..22], &14u16.to_be_bytes());
        assert_eq!(&pdu[22..24], &1u16.to_be_bytes());
        assert_eq!(&pdu[24..26], &30u16.to_be_bytes());
        assert_eq!(&pdu[28..30], &ldp::MAX_PDU_LEN_INIT.to_be_bytes());
        // Receiver LDP identifier.
        assert_eq!(&pdu[30..34], &[10, 10, 10, 20]);
        assert_eq!(&pdu[34..36], &0u16.to_be_bytes());
    }

    #[test]
    fn test_notification_message_layout() {
        let mut session = make_session();
        let status = ldp::STATUS_SHUTDOWN | ldp::STATUS_FATAL_ERROR;

        session.pdu_init().unwrap();
        session.push_notification_message(status).unwrap();
        session.pdu_close();

        let pdu = session.write_buf.written();
        assert_eq!(&pdu[10..12], &ldp::MSG_NOTIFICATION.to_be_bytes());
        assert_eq!(&pdu[18..20], &ldp::TLV_STATUS.to_be_bytes());
        assert_eq!(&pdu[20..22], &10u16.to_be_bytes());
        assert_eq!(&pdu[22..26], &status.to_be_bytes());
    }

    #[test]
    fn test_address_message_layout() {
        let mut session = make_session();

        session.pdu_init().unwrap();
        session.push_address_message().unwrap();
        session.pdu_close();

        let pdu = session.write_buf.written();
        assert_eq!(&pdu[10..12], &ldp::MSG_ADDRESS.to_be_bytes());
        assert_eq!(&pdu[18..20], &ldp::TLV_ADDRESS_LIST.to_be_bytes());
        assert_eq!(&pdu[20..22], &6u16.to_be_bytes());
        assert_eq!(&pdu[22..24], &1u16.to_be_bytes());
        assert_eq!(&pdu[24..28], &[10, 0, 0, 1]);
    }

    #[test]
    fn test_message_ids_are_monotonic() {
        let mut session = make_session();

        session.pdu_init().unwrap();
        session.push_init_message().unwrap();
        session.push_keepalive_message().unwrap();
        session.pdu_close();

        let pdu = session.write_buf.written();
        // Init message id 1, keepalive message id 2.
        assert_eq!(&pdu[14..18], &1u32.to_be_bytes());
        let keepalive_at = 10 + 8 + 18;
        assert_eq!(&pdu[keepalive_at + 4..keepalive_at + 8], &2u32.to_be_bytes());
    }

    #[test]
    fn test_coalesced_pdus_share_buffer() {
        let mut session = make_session();

        session.pdu_init().unwrap();
        session.push_keepalive_message().unwrap();
        session.pdu_close();
        let first_end = session.write_buf.idx();

        session.pdu_init().unwrap();
        session.push_keepalive_message().unwrap();
        session.pdu_close();

        let pdu = session.write_buf.written();
        // Both PDUs are intact and contiguous.
        assert_eq!(&pdu[2..4], &14u16.to_be_bytes());
        assert_eq!(&pdu[first_end + 2..first_end + 4], &14u16.to_be_bytes());
        assert_eq!(pdu.len(), 2 * first_end);
    }
}
