use crate::bgp::{self, State, Stats};
use crate::config::BgpPeerConfig;
use crate::context::Context;
use crate::net::buffer::FrameBuffer;
use crate::net::transport::{TcpCtx, TcpError, TcpOwner, TxSource};
use crate::raw_update::RawUpdateChain;
use crate::timer::TimerHandle;
use crate::{Job, SessionId};
use ion::logging::{self, Logger};
use std::time::{Duration, Instant};

/// Peer identity learned from the OPEN message.
#[derive(Debug, Default, Clone)]
pub struct Peer {
    pub asn: u32,
    pub id: u32,
    pub hold_time: u16,
}

/// One configured BGP neighbor. Cycles CLOSED -> IDLE -> ... ->
/// ESTABLISHED -> CLOSING any number of times until teardown.
pub struct Session {
    pub id: SessionId,
    pub config: BgpPeerConfig,
    pub state: State,
    pub tcpc: Option<TcpCtx>,
    pub read_buf: FrameBuffer,
    pub write_buf: FrameBuffer,
    pub peer: Peer,
    pub stats: Stats,
    pub raw_updates: RawUpdateChain,
    pub error_code: u8,
    pub error_subcode: u8,
    pub teardown: bool,
    pub established: Option<Instant>,
    pub update_start: Option<Instant>,
    pub update_stop: Option<Instant>,
    pub(crate) connect_timer: TimerHandle,
    pub(crate) keepalive_timer: TimerHandle,
    pub(crate) hold_timer: TimerHandle,
    pub(crate) update_timer: TimerHandle,
    pub(crate) close_timer: TimerHandle,
    pub log: Logger,
}

/// Establishment deadline once the transport connect has been posted.
const CONNECT_DEADLINE: u64 = 60;
/// Reconnect delay after a close, and the raw-update send retry period.
const RECONNECT_DELAY: u64 = 5;
const UPDATE_RETRY: u64 = 1;

impl Session {
    pub fn new(id: SessionId, config: BgpPeerConfig, log: &Logger) -> Session {
        let session_log = log.new(logging::o!(
            "interface" => config.interface.clone(),
            "local" => config.local_address.to_string(),
            "peer" => config.peer_address.to_string()
        ));

        Session {
            id,
            config,
            state: State::Closed,
            tcpc: None,
            read_buf: FrameBuffer::new(bgp::BUF_SIZE),
            write_buf: FrameBuffer::new(bgp::BUF_SIZE),
            peer: Peer::default(),
            stats: Stats::default(),
            raw_updates: RawUpdateChain::new(),
            error_code: 0,
            error_subcode: 0,
            teardown: false,
            established: None,
            update_start: None,
            update_stop: None,
            connect_timer: TimerHandle::NULL,
            keepalive_timer: TimerHandle::NULL,
            hold_timer: TimerHandle::NULL,
            update_timer: TimerHandle::NULL,
            close_timer: TimerHandle::NULL,
            log: session_log,
        }
    }

    /// Timers a session is allowed to hold in each state:
    /// (connect, keepalive, hold, update, close).
    fn allowed_timers(state: State) -> (bool, bool, bool, bool, bool) {
        match state {
            State::Closed => (false, false, false, false, false),
            State::Idle | State::Connect | State::Active => (true, false, false, false, false),
            State::OpenSent => (true, false, true, false, false),
            State::OpenConfirm => (true, true, true, false, false),
            State::Established => (false, true, true, true, false),
            State::Closing => (false, false, false, false, true),
        }
    }

    pub(crate) fn state_change(&mut self, ctx: &mut Context, new_state: State) {
        if self.state == new_state {
            return;
        }

        logging::info!(self.log, "session state changed";
                       "from" => self.state.name(),
                       "to" => new_state.name());
        self.state = new_state;

        if new_state == State::Established {
            self.established = Some(ctx.now);
        }

        // Leaving a state drops every timer the new state does not hold.
        let (connect, keepalive, hold, update, close) = Self::allowed_timers(new_state);
        if !connect {
            ctx.wheel.cancel(&mut self.connect_timer);
        }
        if !keepalive {
            ctx.wheel.cancel(&mut self.keepalive_timer);
        }
        if !hold {
            ctx.wheel.cancel(&mut self.hold_timer);
        }
        if !update {
            ctx.wheel.cancel(&mut self.update_timer);
        }
        if !close {
            ctx.wheel.cancel(&mut self.close_timer);
        }
    }

    /// (Re)starts the session from CLOSED: clears transient state and arms
    /// the connect supervisor after `delay` seconds.
    pub fn session_connect(&mut self, ctx: &mut Context, delay: u64) {
        if self.teardown || self.state != State::Closed {
            return;
        }

        self.tcpc = None;
        self.read_buf.reset();
        self.write_buf.reset();
        self.peer = Peer {
            asn: self.config.peer_as,
            id: 0,
            hold_time: 0,
        };
        self.error_code = 0;
        self.error_subcode = 0;
        self.raw_updates.rewind();
        self.established = None;
        self.update_start = None;
        self.update_stop = None;

        self.state_change(ctx, State::Idle);
        ctx.wheel.arm(
            &mut self.connect_timer,
            Job::BgpConnect(self.id),
            Duration::from_secs(delay),
            None,
            ctx.now,
        );
    }

    /// Connect supervisor. Waits out the global init phase, posts the
    /// transport connect from IDLE, and treats its own expiry in any other
    /// pre-ESTABLISHED state as the establishment deadline.
    pub fn connect_job(&mut self, ctx: &mut Context) {
        let mut timeout = RECONNECT_DELAY;

        if ctx.init_phase {
            // Wait for all network interfaces to be resolved.
            timeout = 1;
        } else if self.state == State::Idle {
            self.tcpc = Some(TcpCtx::connect(
                TcpOwner::Bgp(self.id),
                &self.config.interface,
                self.config.local_address,
                self.config.peer_address,
                bgp::PORT,
                self.config.tos,
            ));
            self.state_change(ctx, State::Connect);
            // Close the session if not established within the deadline.
            timeout = CONNECT_DEADLINE;
        } else if self.state == State::Established {
            return;
        } else {
            logging::info!(self.log, "connect timeout");
            self.close(ctx);
            return;
        }

        ctx.wheel.arm(
            &mut self.connect_timer,
            Job::BgpConnect(self.id),
            Duration::from_secs(timeout),
            None,
            ctx.now,
        );
    }

    /// Transport connected: send OPEN and move to OPENSENT.
    pub fn connected(&mut self, ctx: &mut Context) {
        ctx.session_up();
        self.reset_write_buffer();
        if self.push_open().is_err() {
            self.close(ctx);
            return;
        }
        if self.send_write_buf() {
            self.stats.message_tx += 1;
        }
        self.state_change(ctx, State::OpenSent);
        self.restart_hold_timer(ctx);
    }

    pub(crate) fn restart_hold_timer(&mut self, ctx: &mut Context) {
        ctx.wheel.arm(
            &mut self.hold_timer,
            Job::BgpHold(self.id),
            Duration::from_secs(u64::from(self.config.hold_time)),
            None,
            ctx.now,
        );
    }

    /// Entered on a valid OPEN: confirm with a KEEPALIVE and start the
    /// keepalive transmitter.
    pub(crate) fn open_confirm(&mut self, ctx: &mut Context) {
        self.state_change(ctx, State::OpenConfirm);

        let interval = (u64::from(self.config.hold_time) / 3).max(1);
        ctx.wheel.arm(
            &mut self.keepalive_timer,
            Job::BgpKeepalive(self.id),
            Duration::from_secs(interval),
            Some(Duration::from_secs(interval)),
            ctx.now,
        );

        self.reset_write_buffer();
        if self.push_keepalive().is_ok() && self.send_write_buf() {
            self.stats.keepalive_tx += 1;
            self.stats.message_tx += 1;
        }
    }

    /// KEEPALIVE received in OPENCONFIRM: session is up, start the
    /// raw-update pump.
    pub(crate) fn establish(&mut self, ctx: &mut Context) {
        self.state_change(ctx, State::Established);
        ctx.wheel.arm(
            &mut self.update_timer,
            Job::BgpUpdate(self.id),
            Duration::from_secs(0),
            None,
            ctx.now,
        );
    }

    pub fn keepalive_job(&mut self, _ctx: &mut Context) {
        if self.state != State::OpenConfirm && self.state != State::Established {
            return;
        }
        if self.tcpc.as_ref().map_or(false, |t| t.is_idle()) {
            self.reset_write_buffer();
            if self.push_keepalive().is_ok() && self.send_write_buf() {
                self.stats.keepalive_tx += 1;
                self.stats.message_tx += 1;
            }
        }
    }

    pub fn hold_job(&mut self, ctx: &mut Context) {
        logging::info!(self.log, "hold timer expired");
        if self.error_code == 0 {
            self.error_code = 4; // Hold Timer Expired
            self.error_subcode = 0;
        }
        self.close(ctx);
    }

    /// Raw-update pump: pushes the whole current descriptor onto the
    /// transport and waits for the idle event. A refused send retries on a
    /// short timer.
    pub fn update_job(&mut self, ctx: &mut Context) {
        if self.state != State::Established {
            return;
        }
        let len = match self.raw_updates.current() {
            Some(update) if !self.raw_updates.sending => update.len(),
            _ => return,
        };

        let posted = self
            .tcpc
            .as_mut()
            .map_or(false, |t| t.send(TxSource::RawUpdate, len));

        if posted {
            self.raw_updates.sending = true;
            self.update_start = Some(ctx.now);
            logging::info!(self.log, "raw update start"; "bytes" => len);
        } else {
            ctx.wheel.arm(
                &mut self.update_timer,
                Job::BgpUpdate(self.id),
                Duration::from_secs(UPDATE_RETRY),
                None,
                ctx.now,
            );
        }
    }

    /// Transport idle: the current raw-update blob drained.
    pub fn idle(&mut self, ctx: &mut Context) {
        if !self.raw_updates.sending {
            return;
        }
        self.update_stop = Some(ctx.now);
        self.raw_updates.sending = false;

        if let Some(update) = self.raw_updates.current() {
            self.stats.update_tx += u64::from(update.messages);
            self.stats.message_tx += u64::from(update.messages);
            let secs = self
                .update_start
                .map_or(0, |start| ion::time::elapsed_secs(start, ctx.now));
            logging::info!(self.log, "raw update stop"; "seconds" => secs);
        }

        if self.raw_updates.advance() && self.state == State::Established {
            ctx.wheel.arm(
                &mut self.update_timer,
                Job::BgpUpdate(self.id),
                Duration::from_secs(0),
                None,
                ctx.now,
            );
        }
    }

    /// Transport failure: the link is unusable, close without an outbound
    /// NOTIFICATION.
    pub fn error(&mut self, ctx: &mut Context, err: TcpError) {
        logging::info!(self.log, "transport error"; "error" => ?err);
        self.error_code = 0;
        self.error_subcode = 0;
        self.close(ctx);
    }

    /// Closes the session, emitting a NOTIFICATION first when a non-zero
    /// error is pending and the peer is reachable. The deferred close job
    /// releases the transport after the drain guard.
    pub fn close(&mut self, ctx: &mut Context) {
        if self.state == State::Closing || self.state == State::Closed {
            return;
        }

        logging::info!(self.log, "close session";
                       "error_code" => self.error_code,
                       "error_subcode" => self.error_subcode);

        let talking = matches!(
            self.state,
            State::OpenSent | State::OpenConfirm | State::Established
        );
        if self.error_code != 0 && talking && self.tcpc.is_some() {
            self.reset_write_buffer();
            let code = self.error_code;
            let subcode = self.error_subcode;
            if self.push_notification(code, subcode).is_ok() && self.send_write_buf() {
                self.stats.message_tx += 1;
            }
        }

        ctx.wheel.arm(
            &mut self.close_timer,
            Job::BgpClose(self.id),
            Duration::from_secs(u64::from(self.config.teardown_time)),
            None,
            ctx.now,
        );
        self.state_change(ctx, State::Closing);
    }

    /// Deferred close: release the transport and schedule the reconnect.
    pub fn close_job(&mut self, ctx: &mut Context) {
        ctx.session_down();
        self.tcpc = None;
        self.state_change(ctx, State::Closed);
        if !self.teardown && self.config.reconnect {
            self.session_connect(ctx, RECONNECT_DELAY);
        }
    }

    /// Operator teardown: graceful close, no reconnect.
    pub fn teardown(&mut self, ctx: &mut Context) {
        self.teardown = true;
        if self.state == State::Closed || self.state == State::Closing {
            return;
        }
        if self.error_code == 0 {
            self.error_code = 6; // Cease
            self.error_subcode = 2; // Administrative Shutdown
        }
        self.close(ctx);
    }

    /// Operator disconnect: close now, reconnect per configuration.
    pub fn disconnect(&mut self, ctx: &mut Context) {
        if self.state == State::Closed || self.state == State::Closing {
            return;
        }
        if self.error_code == 0 {
            self.error_code = 6; // Cease
            self.error_subcode = 4; // Administrative Reset
        }
        self.close(ctx);
    }

    /// Set of currently armed timers, for the state assertions in tests
    /// and the control channel.
    pub fn armed_timers(&self, ctx: &Context) -> (bool, bool, bool, bool, bool) {
        (
            ctx.wheel.is_armed(self.connect_timer),
            ctx.wheel.is_armed(self.keepalive_timer),
            ctx.wheel.is_armed(self.hold_timer),
            ctx.wheel.is_armed(self.update_timer),
            ctx.wheel.is_armed(self.close_timer),
        )
    }
}
