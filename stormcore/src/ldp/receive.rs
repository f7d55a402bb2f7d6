use crate::context::Context;
use crate::ldp::{self, Event, Session, State};
use crate::net::cursor::Cursor;
use crate::net::support::NetResult;
use byteorder::{BigEndian, ByteOrder};
use ion::logging;

impl Session {
    /// Receive entry point. `Some(bytes)` appends to the read buffer;
    /// `None` is the drain signal: run the decode loop on whatever is
    /// buffered.
    pub fn received(&mut self, ctx: &mut Context, data: Option<&[u8]>) {
        match data {
            Some(bytes) => {
                if self.read_buf.push(bytes).is_err() {
                    logging::error!(self.log, "receive error (read buffer exhausted)");
                    if self.error_code == 0 {
                        self.error_code = ldp::STATUS_INTERNAL_ERROR | ldp::STATUS_FATAL_ERROR;
                    }
                    self.close(ctx);
                }
            }
            None => self.read(ctx),
        }
    }

    fn read(&mut self, ctx: &mut Context) {
        loop {
            let available = self.read_buf.available();
            if available < ldp::PDU_HEADER_SIZE {
                break;
            }

            let unread = self.read_buf.unread();
            let version = BigEndian::read_u16(&unread[0..2]);
            let pdu_length = BigEndian::read_u16(&unread[2..4]) as usize;
            let total = pdu_length + 4;

            if version != ldp::PDU_VERSION
                || pdu_length < 6
                || pdu_length > self.max_pdu_len as usize
            {
                self.decode_error(ctx);
                return;
            }

            // Full PDU on the wire to consume?
            if total > available {
                break;
            }

            let pdu = unread[..total].to_vec();
            self.stats.pdu_rx += 1;
            self.restart_keepalive_timeout(ctx);

            if self.pdu_messages(ctx, &pdu).is_err() {
                self.decode_error(ctx);
                return;
            }
            if self.state >= State::Closing {
                return;
            }

            self.read_buf.consume(total);
        }
        self.read_buf.rebase();
    }

    /// Iterates the messages inside one PDU. Unknown message types are
    /// counted and skipped; their payloads stay opaque.
    fn pdu_messages(&mut self, ctx: &mut Context, pdu: &[u8]) -> NetResult<()> {
        let mut cursor = Cursor::new(&pdu[ldp::PDU_HEADER_SIZE..]);

        while cursor.remaining() >= ldp::MSG_HEADER_SIZE {
            // The U-bit is not part of the type value.
            let msg_type = cursor.take_u16()? & 0x7FFF;
            let msg_length = cursor.take_u16()? as usize;
            let mut body = Cursor::new(cursor.take_slice(msg_length)?);
            let _message_id = body.take_u32()?;

            self.stats.message_rx += 1;
            logging::debug!(self.log, "read message";
                            "peer" => ldp::ldp_id(self.peer.lsr_id, self.peer.label_space_id),
                            "type" => msg_type);

            match msg_type {
                ldp::MSG_INITIALIZATION => {
                    self.init_message(&mut body)?;
                    self.fsm(ctx, Event::RxInitialized);
                }
                ldp::MSG_KEEPALIVE => {
                    self.stats.keepalive_rx += 1;
                    self.fsm(ctx, Event::RxKeepalive);
                }
                ldp::MSG_NOTIFICATION => {
                    self.notification_message(ctx, &mut body)?;
                    return Ok(());
                }
                _ => {}
            }

            if self.state >= State::Closing {
                return Ok(());
            }
        }
        Ok(())
    }

    /// Extracts the peer's offered session parameters from the Common
    /// Session Parameters TLV.
    fn init_message(&mut self, body: &mut Cursor) -> NetResult<()> {
        while body.remaining() >= 4 {
            // Mask the U/F bits off the TLV type.
            let tlv_type = body.take_u16()? & 0x3FFF;
            let tlv_length = body.take_u16()? as usize;
            let mut value = Cursor::new(body.take_slice(tlv_length)?);

            if tlv_type == ldp::TLV_COMMON_SESSION_PARAMETERS {
                let _protocol_version = value.take_u16()?;
                self.peer.keepalive_time = value.take_u16()?;
                let _flags = value.take_u8()?;
                let _path_vector_limit = value.take_u8()?;
                self.peer.max_pdu_len = value.take_u16()?;
            }
        }
        Ok(())
    }

    /// An inbound NOTIFICATION closes the session; `close` still owes the
    /// peer the usual shutdown notification while the session is live.
    fn notification_message(&mut self, ctx: &mut Context, body: &mut Cursor) -> NetResult<()> {
        let mut status = 0;
        if body.remaining() >= 8 {
            let tlv_type = body.take_u16()? & 0x3FFF;
            let _tlv_length = body.take_u16()?;
            if tlv_type == ldp::TLV_STATUS {
                status = body.take_u32()?;
            }
        }

        logging::info!(self.log, "notification received";
                       "peer" => ldp::ldp_id(self.peer.lsr_id, self.peer.label_space_id),
                       "status" => ldp::status_name(status));

        self.error_code = 0;
        self.close(ctx);
        Ok(())
    }

    fn decode_error(&mut self, ctx: &mut Context) {
        logging::info!(self.log, "invalid PDU received";
                       "peer" => ldp::ldp_id(self.peer.lsr_id, self.peer.label_space_id));
        if self.error_code == 0 {
            self.error_code = ldp::STATUS_INTERNAL_ERROR | ldp::STATUS_FATAL_ERROR;
        }
        self.close(ctx);
    }
}
