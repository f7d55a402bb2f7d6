use crate::bgp::{self, Session, State};
use crate::context::Context;
use crate::net::cursor::Cursor;
use crate::net::support::{ErrorKind, NetError, NetResult};
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
                        self.error_code = 6; // Cease
                        self.error_subcode = 8; // Out of Resources
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
            if available < bgp::MIN_MESSAGE_SIZE {
                break;
            }

            let unread = self.read_buf.unread();
            let length = BigEndian::read_u16(&unread[16..18]) as usize;
            if length < bgp::MIN_MESSAGE_SIZE || length > bgp::MAX_MESSAGE_SIZE {
                self.decode_error(ctx);
                return;
            }

            // Full message on the wire to consume?
            if length > available {
                break;
            }

            let frame = unread[..length].to_vec();
            let msg_type = frame[18];

            self.stats.message_rx += 1;
            logging::debug!(self.log, "read message"; "type" => bgp::msg_name(msg_type));

            match msg_type {
                bgp::MSG_OPEN => {
                    self.stats.open_rx += 1;
                    if self.open(ctx, &frame).is_err() {
                        self.decode_error(ctx);
                        return;
                    }
                }
                bgp::MSG_NOTIFICATION => {
                    self.stats.notification_rx += 1;
                    if self.notification(ctx, &frame).is_err() {
                        self.decode_error(ctx);
                    }
                    return;
                }
                bgp::MSG_KEEPALIVE => {
                    self.stats.keepalive_rx += 1;
                    if self.state == State::OpenConfirm {
                        self.establish(ctx);
                    }
                }
                bgp::MSG_UPDATE => {
                    self.stats.update_rx += 1;
                }
                _ => {}
            }

            self.restart_hold_timer(ctx);
            self.read_buf.consume(length);
        }
        self.read_buf.rebase();
    }

    fn decode_error(&mut self, ctx: &mut Context) {
        logging::info!(self.log, "invalid message received");
        if self.error_code == 0 {
            self.error_code = 1; // Message Header Error
            self.error_subcode = 2; // Bad Message Length
        }
        self.close(ctx);
    }

    /// OPEN decode: fixed fields, then the optional parameters as
    /// (type, length, value) tuples with capability code 65 honored.
    fn open(&mut self, ctx: &mut Context, frame: &[u8]) -> NetResult<()> {
        if frame.len() < 29 {
            return Err(NetError::Fatal(ErrorKind::Truncated));
        }

        let mut cursor = Cursor::new(&frame[19..]);
        let _version = cursor.take_u8()?;
        self.peer.asn = u32::from(cursor.take_u16()?);
        self.peer.hold_time = cursor.take_u16()?;
        self.peer.id = cursor.take_u32()?;

        let opt_length = cursor.take_u8()? as usize;
        let mut params = Cursor::new(cursor.take_slice(opt_length)?);
        while params.remaining() >= 2 {
            let param_type = params.take_u8()?;
            let param_length = params.take_u8()? as usize;
            let value = params.take_slice(param_length)?;
            if param_type == bgp::PARAM_CAPABILITY {
                self.capabilities(value)?;
            }
        }

        logging::info!(self.log, "open message received";
                       "peer_as" => self.peer.asn,
                       "hold_time" => self.peer.hold_time);

        self.open_confirm(ctx);
        Ok(())
    }

    /// Iterates the capability triples inside one capability parameter.
    /// Code 65 (4-byte AS) overwrites the peer AS; unknown codes are
    /// skipped.
    fn capabilities(&mut self, value: &[u8]) -> NetResult<()> {
        let mut cursor = Cursor::new(value);
        while cursor.remaining() > 0 {
            let code = cursor.take_u8()?;
            let length = cursor.take_u8()? as usize;
            let body = cursor.take_slice(length)?;
            if code == bgp::CAPABILITY_4_BYTE_AS {
                if length != 4 {
                    return Err(NetError::Fatal(ErrorKind::Truncated));
                }
                self.peer.asn = BigEndian::read_u32(body);
            }
        }
        Ok(())
    }

    /// NOTIFICATION forces a close with no outbound NOTIFICATION of our
    /// own.
    fn notification(&mut self, ctx: &mut Context, frame: &[u8]) -> NetResult<()> {
        if frame.len() < 21 {
            return Err(NetError::Fatal(ErrorKind::Truncated));
        }
        let code = frame[19];
        let subcode = frame[20];

        logging::info!(self.log, "notification received";
                       "error" => bgp::error_name(code),
                       "code" => code,
                       "subcode" => subcode);

        self.error_code = 0;
        self.error_subcode = 0;
        self.close(ctx);
        Ok(())
    }
}
