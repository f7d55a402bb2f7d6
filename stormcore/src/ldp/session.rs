use crate::config::LdpConfig;
use crate::context::Context;
use crate::ldp::{self, Event, HelloInfo, State, Stats};
use crate::net::buffer::FrameBuffer;
use crate::net::transport::{TcpCtx, TcpError, TcpOwner, TxSource};
use crate::raw_update::{RawUpdate, RawUpdateChain, RawUpdateFormat};
use crate::timer::TimerHandle;
use crate::{Job, SessionId};
use ion::logging::{self, Logger};
use std::net::{IpAddr, Ipv4Addr};
use std::time::{Duration, Instant};

/// One side of the session: speaker identity plus the session parameters
/// it offers. The peer side is learned from discovery and INIT.
#[derive(Debug, Clone)]
pub struct Side {
    pub lsr_id: Ipv4Addr,
    pub label_space_id: u16,
    pub transport_address: IpAddr,
    pub keepalive_time: u16,
    pub max_pdu_len: u16,
}

impl Side {
    fn unknown() -> Side {
        Side {
            lsr_id: Ipv4Addr::UNSPECIFIED,
            label_space_id: 0,
            transport_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            keepalive_time: 0,
            max_pdu_len: 0,
        }
    }
}

pub struct Session {
    pub id: SessionId,
    pub interface: String,
    pub local: Side,
    pub peer: Side,
    /// Active side connects, passive side listens; elected from the
    /// transport addresses on discovery.
    pub active: bool,
    pub state: State,
    pub tcpc: Option<TcpCtx>,
    pub listen_tcpc: Option<TcpCtx>,
    pub read_buf: FrameBuffer,
    pub write_buf: FrameBuffer,
    /// Negotiated values once OPERATIONAL.
    pub max_pdu_len: u16,
    pub keepalive_time: u16,
    pub tos: u8,
    pub raw_update_file: Option<String>,
    pub stats: Stats,
    pub state_transitions: u32,
    pub raw_updates: RawUpdateChain,
    pub error_code: u32,
    pub teardown: bool,
    pub operational: Option<Instant>,
    pub update_start: Option<Instant>,
    pub update_stop: Option<Instant>,
    pub(crate) message_id: u32,
    pub(crate) pdu_start_idx: usize,
    pub(crate) msg_start_idx: usize,
    pub(crate) connect_timer: TimerHandle,
    pub(crate) keepalive_timer: TimerHandle,
    pub(crate) keepalive_timeout_timer: TimerHandle,
    pub(crate) update_timer: TimerHandle,
    pub(crate) close_timer: TimerHandle,
    pub log: Logger,
}

/// Connect supervisor periods: idle retry, init-phase wait and the session
/// establishment deadline.
const CONNECT_RETRY: u64 = 5;
const CONNECT_INIT_PHASE: u64 = 1;
const CONNECT_DEADLINE: u64 = 60;
/// Drain window after an outbound NOTIFICATION, and the reconnect delay.
const CLOSE_DRAIN: u64 = 3;
const RECONNECT_DELAY: u64 = 5;
const UPDATE_RETRY: u64 = 1;

impl Session {
    pub fn new(id: SessionId, config: &LdpConfig, log: &Logger) -> Session {
        let local = Side {
            lsr_id: config.lsr_id,
            label_space_id: 0,
            transport_address: IpAddr::V4(config.ipv4_transport_address),
            keepalive_time: config.keepalive_time,
            max_pdu_len: ldp::MAX_PDU_LEN_INIT,
        };

        let session_log = log.new(logging::o!(
            "local" => ldp::ldp_id(config.lsr_id, 0)
        ));

        Session {
            id,
            interface: String::new(),
            local,
            peer: Side::unknown(),
            active: false,
            state: State::Closed,
            tcpc: None,
            listen_tcpc: None,
            read_buf: FrameBuffer::new(ldp::BUF_SIZE),
            write_buf: FrameBuffer::new(ldp::BUF_SIZE),
            max_pdu_len: ldp::MAX_PDU_LEN_INIT,
            keepalive_time: config.keepalive_time,
            tos: config.tos,
            raw_update_file: config.raw_update_file.clone(),
            stats: Stats::default(),
            state_transitions: 0,
            raw_updates: RawUpdateChain::new(),
            error_code: 0,
            teardown: false,
            operational: None,
            update_start: None,
            update_stop: None,
            message_id: 0,
            pdu_start_idx: 0,
            msg_start_idx: 0,
            connect_timer: TimerHandle::NULL,
            keepalive_timer: TimerHandle::NULL,
            keepalive_timeout_timer: TimerHandle::NULL,
            update_timer: TimerHandle::NULL,
            close_timer: TimerHandle::NULL,
            log: session_log,
        }
    }

    /// Applies a discovery hello: fixes the peer identity, loads the
    /// raw-update chain on first contact, elects the role and starts the
    /// connect/listen machinery.
    pub(crate) fn hello_init(
        &mut self,
        ctx: &mut Context,
        config: &LdpConfig,
        interface: &str,
        source: IpAddr,
        hello: &HelloInfo,
    ) {
        self.interface = interface.to_string();

        self.peer.lsr_id = hello.lsr_id;
        self.peer.label_space_id = hello.label_space_id;
        self.peer.transport_address = hello.transport_address.unwrap_or(source);
        self.peer.keepalive_time = 0;
        self.peer.max_pdu_len = 0;

        self.max_pdu_len = self.local.max_pdu_len;
        self.keepalive_time = self.local.keepalive_time;

        if self.raw_updates.is_empty() {
            if let Some(file) = &config.raw_update_file {
                match RawUpdate::load(file, RawUpdateFormat::Ldp) {
                    Ok(update) => self.raw_updates.attach(update),
                    Err(err) => {
                        logging::error!(self.log, "raw update load failed";
                                        "file" => file.as_str(), "error" => %err);
                    }
                }
            }
        }

        self.active = ldp::active_role(&self.local.transport_address, &self.peer.transport_address);

        logging::info!(self.log, "session discovered";
                       "peer" => ldp::ldp_id(self.peer.lsr_id, self.peer.label_space_id),
                       "active" => self.active);

        self.session_connect(ctx, 0);
    }

    /// Timers a session is allowed to hold in each state:
    /// (connect, keepalive, keepalive_timeout, update, close).
    fn allowed_timers(state: State) -> (bool, bool, bool, bool, bool) {
        match state {
            State::Closed => (false, false, false, false, false),
            State::Idle | State::Listen | State::Connect => (true, false, false, false, false),
            State::Initialized | State::OpenSent | State::OpenRec => {
                (true, false, true, false, false)
            }
            State::Operational => (false, true, true, true, false),
            State::Closing | State::Error => (false, false, false, false, true),
        }
    }

    pub(crate) fn state_change(&mut self, ctx: &mut Context, new_state: State) {
        if self.state == new_state {
            return;
        }

        if self.state == State::Operational || new_state == State::Operational {
            self.state_transitions += 1;
        }

        logging::info!(self.log, "session state changed";
                       "peer" => ldp::ldp_id(self.peer.lsr_id, self.peer.label_space_id),
                       "from" => self.state.name(),
                       "to" => new_state.name());
        self.state = new_state;

        let (connect, keepalive, keepalive_timeout, update, close) = Self::allowed_timers(new_state);
        if !connect {
            ctx.wheel.cancel(&mut self.connect_timer);
        }
        if !keepalive {
            ctx.wheel.cancel(&mut self.keepalive_timer);
        }
        if !keepalive_timeout {
            ctx.wheel.cancel(&mut self.keepalive_timeout_timer);
        }
        if !update {
            ctx.wheel.cancel(&mut self.update_timer);
        }
        if !close {
            ctx.wheel.cancel(&mut self.close_timer);
        }
    }

    /// (Re)starts the session from CLOSED, resetting transient state and
    /// entering the role-specific opening path.
    pub fn session_connect(&mut self, ctx: &mut Context, delay: u64) {
        if self.teardown || self.state != State::Closed {
            return;
        }

        self.tcpc = None;
        self.listen_tcpc = None;
        self.read_buf.reset();
        self.write_buf.reset();
        self.pdu_start_idx = 0;
        self.msg_start_idx = 0;
        self.message_id = 0;
        self.error_code = 0;
        self.max_pdu_len = self.local.max_pdu_len;
        self.keepalive_time = self.local.keepalive_time;
        self.raw_updates.rewind();
        self.operational = None;
        self.update_start = None;
        self.update_stop = None;

        if self.active {
            self.state_change(ctx, State::Idle);
            ctx.wheel.arm(
                &mut self.connect_timer,
                Job::LdpConnect(self.id),
                Duration::from_secs(delay),
                None,
                ctx.now,
            );
        } else {
            self.listen(ctx);
        }
    }

    fn listen(&mut self, ctx: &mut Context) {
        self.listen_tcpc = Some(TcpCtx::listen(
            TcpOwner::Ldp(self.id),
            &self.interface,
            self.local.transport_address,
            ldp::PORT,
            self.tos,
        ));
        self.state_change(ctx, State::Listen);
        ctx.wheel.arm(
            &mut self.connect_timer,
            Job::LdpConnect(self.id),
            Duration::from_secs(CONNECT_DEADLINE),
            None,
            ctx.now,
        );
    }

    /// Connect supervisor: short period during the global init phase,
    /// transport connect from IDLE with a 60 s establishment deadline,
    /// self-cancelling at OPERATIONAL; the deadline in any other state
    /// closes the session.
    pub fn connect_job(&mut self, ctx: &mut Context) {
        let mut timeout = CONNECT_RETRY;

        if ctx.init_phase {
            // Wait for all network interfaces to be resolved.
            timeout = CONNECT_INIT_PHASE;
        } else if self.state == State::Idle {
            self.tcpc = Some(TcpCtx::connect(
                TcpOwner::Ldp(self.id),
                &self.interface,
                self.local.transport_address,
                self.peer.transport_address,
                ldp::PORT,
                self.tos,
            ));
            self.state_change(ctx, State::Connect);
            // Close the session if not established within the deadline.
            timeout = CONNECT_DEADLINE;
        } else if self.state == State::Operational {
            return;
        } else {
            logging::info!(self.log, "connect timeout";
                           "peer" => ldp::ldp_id(self.peer.lsr_id, self.peer.label_space_id));
            self.close(ctx);
            return;
        }

        ctx.wheel.arm(
            &mut self.connect_timer,
            Job::LdpConnect(self.id),
            Duration::from_secs(timeout),
            None,
            ctx.now,
        );
    }

    /// Accept callback on the listen context. Refused (the I/O layer
    /// aborts the connection) unless the session is in LISTEN.
    pub fn accepted(&mut self, tcpc: TcpCtx) -> bool {
        if self.state == State::Listen {
            self.tcpc = Some(tcpc);
            true
        } else {
            false
        }
    }

    pub fn connected(&mut self, ctx: &mut Context) {
        ctx.session_up();
        self.fsm(ctx, Event::Start);
    }

    pub fn error(&mut self, ctx: &mut Context, err: TcpError) {
        logging::info!(self.log, "transport error";
                       "peer" => ldp::ldp_id(self.peer.lsr_id, self.peer.label_space_id),
                       "error" => ?err);
        self.state_change(ctx, State::Error);
        self.close(ctx);
    }

    /// The session FSM; only the state-changing transitions act, anything
    /// else is a no-op except an unexpected INIT, which is fatal.
    pub fn fsm(&mut self, ctx: &mut Context, event: Event) {
        match event {
            Event::Start => {
                self.state_change(ctx, State::Initialized);
                if self.active {
                    self.reset_write_buffer();
                    let sent = self.pdu_init().is_ok()
                        && self.push_init_message().is_ok()
                        && {
                            self.pdu_close();
                            self.session_send()
                        };
                    if sent {
                        self.stats.pdu_tx += 1;
                        self.stats.message_tx += 1;
                    }
                    self.state_change(ctx, State::OpenSent);
                }
            }
            Event::RxInitialized => match self.state {
                State::Initialized => {
                    self.reset_write_buffer();
                    let sent = self.pdu_init().is_ok()
                        && self.push_init_message().is_ok()
                        && self.push_keepalive_message().is_ok()
                        && {
                            self.pdu_close();
                            self.session_send()
                        };
                    if sent {
                        self.stats.pdu_tx += 1;
                        self.stats.message_tx += 2;
                        self.stats.keepalive_tx += 1;
                    }
                    self.state_change(ctx, State::OpenRec);
                }
                State::OpenSent => {
                    self.reset_write_buffer();
                    let sent = self.pdu_init().is_ok()
                        && self.push_keepalive_message().is_ok()
                        && {
                            self.pdu_close();
                            self.session_send()
                        };
                    if sent {
                        self.stats.pdu_tx += 1;
                        self.stats.message_tx += 1;
                        self.stats.keepalive_tx += 1;
                    }
                    self.state_change(ctx, State::OpenRec);
                }
                _ => {
                    if self.error_code == 0 {
                        self.error_code = ldp::STATUS_INTERNAL_ERROR | ldp::STATUS_FATAL_ERROR;
                    }
                    self.close(ctx);
                }
            },
            Event::RxKeepalive => {
                if self.state == State::OpenRec {
                    self.operational(ctx);
                    self.reset_write_buffer();
                    let sent = self.pdu_init().is_ok()
                        && self.push_address_message().is_ok()
                        && {
                            self.pdu_close();
                            self.session_send()
                        };
                    if sent {
                        self.stats.pdu_tx += 1;
                        self.stats.message_tx += 1;
                    }
                }
            }
        }
    }

    /// Entering OPERATIONAL: negotiate session parameters and start the
    /// keepalive transmitter and raw-update pump.
    fn operational(&mut self, ctx: &mut Context) {
        self.state_change(ctx, State::Operational);
        self.operational = Some(ctx.now);

        // Select max PDU length.
        if self.peer.max_pdu_len > 255 && self.peer.max_pdu_len < self.local.max_pdu_len {
            self.max_pdu_len = self.peer.max_pdu_len;
        } else {
            self.max_pdu_len = self.local.max_pdu_len;
        }

        // Select keepalive time.
        if self.peer.keepalive_time > 0 && self.peer.keepalive_time < self.local.keepalive_time {
            self.keepalive_time = self.peer.keepalive_time;
        } else {
            self.keepalive_time = self.local.keepalive_time;
        }

        let interval = ((u64::from(self.keepalive_time) + 2) / 3).max(1);
        ctx.wheel.arm(
            &mut self.keepalive_timer,
            Job::LdpKeepalive(self.id),
            Duration::from_secs(interval),
            Some(Duration::from_secs(interval)),
            ctx.now,
        );
        self.restart_keepalive_timeout(ctx);

        ctx.wheel.arm(
            &mut self.update_timer,
            Job::LdpUpdate(self.id),
            Duration::from_secs(0),
            None,
            ctx.now,
        );
    }

    /// Posts the write buffer, coalescing into an in-flight transmission
    /// when the transport is still draining this buffer and its committed
    /// length trails the write cursor.
    pub(crate) fn session_send(&mut self) -> bool {
        let idx = self.write_buf.idx();
        match self.tcpc.as_mut() {
            Some(tcpc)
                if tcpc.is_sending()
                    && tcpc.tx.source == TxSource::WriteBuf
                    && tcpc.tx.len < idx =>
            {
                tcpc.tx.len = idx;
                true
            }
            Some(tcpc) => tcpc.send(TxSource::WriteBuf, idx),
            None => false,
        }
    }

    /// Resets the write buffer unless the transport still points at it.
    pub(crate) fn reset_write_buffer(&mut self) {
        if self.tcpc.as_ref().map_or(false, |t| t.is_sending()) {
            return;
        }
        self.write_buf.reset();
    }

    pub(crate) fn restart_keepalive_timeout(&mut self, ctx: &mut Context) {
        ctx.wheel.arm(
            &mut self.keepalive_timeout_timer,
            Job::LdpKeepaliveTimeout(self.id),
            Duration::from_secs(u64::from(self.keepalive_time)),
            None,
            ctx.now,
        );
    }

    pub fn keepalive_job(&mut self, _ctx: &mut Context) {
        if self.state != State::Operational {
            return;
        }
        if self.tcpc.as_ref().map_or(false, |t| t.is_idle()) {
            self.reset_write_buffer();
            let sent = self.pdu_init().is_ok()
                && self.push_keepalive_message().is_ok()
                && {
                    self.pdu_close();
                    self.session_send()
                };
            if sent {
                self.stats.pdu_tx += 1;
                self.stats.message_tx += 1;
                self.stats.keepalive_tx += 1;
            }
        }
    }

    pub fn keepalive_timeout_job(&mut self, ctx: &mut Context) {
        logging::info!(self.log, "keepalive timer expired";
                       "peer" => ldp::ldp_id(self.peer.lsr_id, self.peer.label_space_id));
        if self.error_code == 0 {
            self.error_code = ldp::STATUS_KEEPALIVE_TIMER_EXPIRED | ldp::STATUS_FATAL_ERROR;
        }
        self.close(ctx);
    }

    /// Raw-update pump; a refused send retries on a short timer.
    pub fn update_job(&mut self, ctx: &mut Context) {
        if self.state != State::Operational {
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
            logging::info!(self.log, "raw update start";
                           "peer" => ldp::ldp_id(self.peer.lsr_id, self.peer.label_space_id),
                           "bytes" => len);
        } else {
            ctx.wheel.arm(
                &mut self.update_timer,
                Job::LdpUpdate(self.id),
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
            self.stats.pdu_tx += u64::from(update.pdus);
            self.stats.message_tx += u64::from(update.messages);
            let secs = self
                .update_start
                .map_or(0, |start| ion::time::elapsed_secs(start, ctx.now));
            logging::info!(self.log, "raw update stop";
                           "peer" => ldp::ldp_id(self.peer.lsr_id, self.peer.label_space_id),
                           "seconds" => secs);
        }

        if self.raw_updates.advance() && self.state == State::Operational {
            ctx.wheel.arm(
                &mut self.update_timer,
                Job::LdpUpdate(self.id),
                Duration::from_secs(0),
                None,
                ctx.now,
            );
        }
    }

    /// Closes the session. A NOTIFICATION is owed only when the peer was
    /// actually being talked to (strictly between CONNECT and CLOSING);
    /// the deferred close job releases the transports and schedules the
    /// reconnect.
    pub fn close(&mut self, ctx: &mut Context) {
        logging::info!(self.log, "close session";
                       "peer" => ldp::ldp_id(self.peer.lsr_id, self.peer.label_space_id));

        ctx.wheel.cancel(&mut self.connect_timer);
        ctx.wheel.cancel(&mut self.keepalive_timer);
        ctx.wheel.cancel(&mut self.keepalive_timeout_timer);
        ctx.wheel.cancel(&mut self.update_timer);

        if self.error_code == 0 {
            self.error_code = ldp::STATUS_SHUTDOWN | ldp::STATUS_FATAL_ERROR;
        }

        let mut delay = 0;
        if self.state > State::Connect && self.state < State::Closing {
            logging::info!(self.log, "send notification message";
                           "peer" => ldp::ldp_id(self.peer.lsr_id, self.peer.label_space_id),
                           "status" => ldp::status_name(self.error_code));

            self.reset_write_buffer();
            let code = self.error_code;
            let sent = self.pdu_init().is_ok()
                && self.push_notification_message(code).is_ok()
                && {
                    self.pdu_close();
                    self.session_send()
                };
            if sent {
                self.stats.pdu_tx += 1;
                self.stats.message_tx += 1;
            }
            self.state_change(ctx, State::Closing);
            delay = CLOSE_DRAIN;
        }

        ctx.wheel.arm(
            &mut self.close_timer,
            Job::LdpClose(self.id),
            Duration::from_secs(delay),
            None,
            ctx.now,
        );
    }

    /// Deferred close: release transports, go CLOSED and reconnect unless
    /// tearing down.
    pub fn close_job(&mut self, ctx: &mut Context) {
        ctx.session_down();

        self.listen_tcpc = None;
        if self.state > State::Idle {
            self.tcpc = None;
        }
        self.state_change(ctx, State::Closed);
        if !self.teardown {
            self.session_connect(ctx, RECONNECT_DELAY);
        }
    }

    pub fn teardown(&mut self, ctx: &mut Context) {
        self.teardown = true;
        if self.state == State::Closed || self.state == State::Closing {
            return;
        }
        self.close(ctx);
    }

    pub fn disconnect(&mut self, ctx: &mut Context) {
        if self.state == State::Closed || self.state == State::Closing {
            return;
        }
        self.close(ctx);
    }

    /// Set of currently armed timers, for the state assertions in tests.
    pub fn armed_timers(&self, ctx: &Context) -> (bool, bool, bool, bool, bool) {
        (
            ctx.wheel.is_armed(self.connect_timer),
            ctx.wheel.is_armed(self.keepalive_timer),
            ctx.wheel.is_armed(self.keepalive_timeout_timer),
            ctx.wheel.is_armed(self.update_timer),
            ctx.wheel.is_armed(self.close_timer),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::transport::TcpState;
    use ion::logging;

    fn config() -> LdpConfig {
        LdpConfig {
            lsr_id: Ipv4Addr::new(10, 10, 10, 10),
            ipv4_transport_address: Ipv4Addr::new(10, 0, 0, 1),
            keepalive_time: 30,
            ..LdpConfig::default()
        }
    }

    fn hello(transport: &str) -> HelloInfo {
        HelloInfo {
            lsr_id: Ipv4Addr::new(10, 10, 10, 20),
            label_space_id: 0,
            transport_address: Some(transport.parse().unwrap()),
        }
    }

    fn discovered(transport: &str) -> (Context, Session) {
        let mut ctx = Context::new(logging::discard(), Instant::now());
        ctx.init_phase = false;
        let config = config();
        let mut session = Session::new(0, &config, &logging::discard());
        session.hello_init(
            &mut ctx,
            &config,
            "eth0",
            "10.0.0.9".parse().unwrap(),
            &hello(transport),
        );
        (ctx, session)
    }

    fn run_due(ctx: &mut Context, session: &mut Session) {
        while let Some(job) = ctx.wheel.next_due(ctx.now) {
            match job {
                Job::LdpConnect(_) => session.connect_job(ctx),
                Job::LdpKeepalive(_) => session.keepalive_job(ctx),
                Job::LdpKeepaliveTimeout(_) => session.keepalive_timeout_job(ctx),
                Job::LdpUpdate(_) => session.update_job(ctx),
                Job::LdpClose(_) => session.close_job(ctx),
                _ => panic!("unexpected job"),
            }
        }
    }

    #[test]
    fn test_role_election_passive_listens() {
        // S4: the lower transport address takes the passive role.
        let (ctx, session) = discovered("10.0.0.2");

        assert!(!session.active);
        assert_eq!(session.state, State::Listen);
        assert!(session.listen_tcpc.is_some());
        assert_eq!(session.armed_timers(&ctx), (true, false, false, false, false));
    }

    #[test]
    fn test_role_election_active_connects() {
        let (mut ctx, mut session) = discovered("10.0.0.0");

        assert!(session.active);
        assert_eq!(session.state, State::Idle);

        run_due(&mut ctx, &mut session);
        assert_eq!(session.state, State::Connect);
        assert!(session.tcpc.is_some());
    }

    #[test]
    fn test_active_fsm_start_sends_init() {
        let (mut ctx, mut session) = discovered("10.0.0.0");
        run_due(&mut ctx, &mut session);

        session.tcpc.as_mut().unwrap().state = TcpState::Idle;
        session.connected(&mut ctx);

        assert_eq!(session.state, State::OpenSent);
        assert_eq!(session.stats.pdu_tx, 1);
        assert_eq!(session.stats.message_tx, 1);
        assert_eq!(ctx.routing_sessions, 1);
    }

    #[test]
    fn test_passive_fsm_start_waits_for_init() {
        let (mut ctx, mut session) = discovered("10.0.0.2");

        let tcpc = TcpCtx::accepted(
            TcpOwner::Ldp(0),
            "eth0",
            session.local.transport_address,
            session.peer.transport_address,
            ldp::PORT,
        );
        assert!(session.accepted(tcpc));
        session.connected(&mut ctx);

        assert_eq!(session.state, State::Initialized);
        assert_eq!(session.stats.pdu_tx, 0);
    }

    #[test]
    fn test_accept_refused_outside_listen() {
        let (mut ctx, mut session) = discovered("10.0.0.0");
        run_due(&mut ctx, &mut session);

        let tcpc = TcpCtx::accepted(
            TcpOwner::Ldp(0),
            "eth0",
            session.local.transport_address,
            session.peer.transport_address,
            ldp::PORT,
        );
        assert!(!session.accepted(tcpc));
    }

    #[test]
    fn test_keepalive_negotiation() {
        // S5: negotiated keepalive is the peer's lower offer.
        let (mut ctx, mut session) = discovered("10.0.0.0");
        run_due(&mut ctx, &mut session);
        session.tcpc.as_mut().unwrap().state = TcpState::Idle;
        session.connected(&mut ctx);

        session.peer.keepalive_time = 15;
        session.peer.max_pdu_len = 4096;
        session.fsm(&mut ctx, Event::RxInitialized);
        assert_eq!(session.state, State::OpenRec);

        session.tcpc.as_mut().unwrap().complete_send();
        session.fsm(&mut ctx, Event::RxKeepalive);

        assert_eq!(session.state, State::Operational);
        assert_eq!(session.keepalive_time, 15);
        assert_eq!(session.max_pdu_len, 4096);
        assert_eq!(session.armed_timers(&ctx), (false, true, true, true, false));
    }

    #[test]
    fn test_keepalive_negotiation_zero_peer() {
        let (mut ctx, mut session) = discovered("10.0.0.0");
        run_due(&mut ctx, &mut session);
        session.tcpc.as_mut().unwrap().state = TcpState::Idle;
        session.connected(&mut ctx);

        session.peer.keepalive_time = 0;
        session.fsm(&mut ctx, Event::RxInitialized);
        session.tcpc.as_mut().unwrap().complete_send();
        session.fsm(&mut ctx, Event::RxKeepalive);

        assert_eq!(session.keepalive_time, 30);
    }

    #[test]
    fn test_max_pdu_negotiation_small_peer_value_ignored() {
        let (mut ctx, mut session) = discovered("10.0.0.0");
        run_due(&mut ctx, &mut session);
        session.tcpc.as_mut().unwrap().state = TcpState::Idle;
        session.connected(&mut ctx);

        session.peer.keepalive_time = 30;
        session.peer.max_pdu_len = 200;
        session.fsm(&mut ctx, Event::RxInitialized);
        session.tcpc.as_mut().unwrap().complete_send();
        session.fsm(&mut ctx, Event::RxKeepalive);

        assert_eq!(session.max_pdu_len, ldp::MAX_PDU_LEN_INIT);
    }

    #[test]
    fn test_unexpected_init_is_fatal() {
        let (mut ctx, mut session) = discovered("10.0.0.0");
        run_due(&mut ctx, &mut session);
        session.tcpc.as_mut().unwrap().state = TcpState::Idle;
        session.connected(&mut ctx);

        session.peer.keepalive_time = 30;
        session.fsm(&mut ctx, Event::RxInitialized);
        session.tcpc.as_mut().unwrap().complete_send();
        session.fsm(&mut ctx, Event::RxKeepalive);

        // A second INIT while OPERATIONAL is a protocol violation.
        session.fsm(&mut ctx, Event::RxInitialized);

        assert_eq!(session.state, State::Closing);
        assert_eq!(
            session.error_code,
            ldp::STATUS_INTERNAL_ERROR | ldp::STATUS_FATAL_ERROR
        );
        assert_eq!(session.armed_timers(&ctx), (false, false, false, false, true));
    }

    #[test]
    fn test_send_coalescing() {
        // Property 6: two back-to-back sends against a draining write
        // buffer become one enlarged transmission.
        let (mut ctx, mut session) = discovered("10.0.0.0");
        run_due(&mut ctx, &mut session);
        session.tcpc.as_mut().unwrap().state = TcpState::Idle;

        session.pdu_init().unwrap();
        session.push_keepalive_message().unwrap();
        session.pdu_close();
        assert!(session.session_send());
        let first_len = session.tcpc.as_ref().unwrap().tx.len;
        assert_eq!(first_len, session.write_buf.idx());

        // The transport is still SENDING; appending another PDU must
        // extend the committed length in place.
        session.pdu_init().unwrap();
        session.push_keepalive_message().unwrap();
        session.pdu_close();
        assert!(session.session_send());

        let tcpc = session.tcpc.as_ref().unwrap();
        assert!(tcpc.is_sending());
        assert_eq!(tcpc.tx.len, session.write_buf.idx());
        assert!(tcpc.tx.len > first_len);
        assert_eq!(tcpc.tx.len, 2 * first_len);
    }

    #[test]
    fn test_keepalive_timeout_closes_session() {
        let (mut ctx, mut session) = discovered("10.0.0.0");
        run_due(&mut ctx, &mut session);
        session.tcpc.as_mut().unwrap().state = TcpState::Idle;
        session.connected(&mut ctx);
        session.peer.keepalive_time = 30;
        session.fsm(&mut ctx, Event::RxInitialized);
        session.tcpc.as_mut().unwrap().complete_send();
        session.fsm(&mut ctx, Event::RxKeepalive);

        session.keepalive_timeout_job(&mut ctx);

        assert_eq!(session.state, State::Closing);
        assert_eq!(
            session.error_code,
            ldp::STATUS_KEEPALIVE_TIMER_EXPIRED | ldp::STATUS_FATAL_ERROR
        );
    }

    #[test]
    fn test_close_before_talking_sends_no_notification() {
        let (mut ctx, mut session) = discovered("10.0.0.0");
        run_due(&mut ctx, &mut session);

        // Still in CONNECT: no NOTIFICATION owed, immediate close job.
        session.close(&mut ctx);

        assert_eq!(session.state, State::Connect);
        assert_eq!(session.stats.pdu_tx, 0);
        assert!(ctx.wheel.is_armed(session.close_timer));

        session.close_job(&mut ctx);
        assert_eq!(session.state, State::Idle);
        assert!(ctx.wheel.is_armed(session.connect_timer));
    }

    #[test]
    fn test_teardown_ends_in_closed() {
        let (mut ctx, mut session) = discovered("10.0.0.0");
        run_due(&mut ctx, &mut session);
        session.tcpc.as_mut().unwrap().state = TcpState::Idle;
        session.connected(&mut ctx);

        session.teardown(&mut ctx);
        assert_eq!(session.state, State::Closing);
        // The fallback status is Shutdown, fatal.
        assert_eq!(
            session.error_code,
            ldp::STATUS_SHUTDOWN | ldp::STATUS_FATAL_ERROR
        );

        session.close_job(&mut ctx);
        assert_eq!(session.state, State::Closed);
        assert_eq!(session.armed_timers(&ctx), (false, false, false, false, false));
    }

    #[test]
    fn test_state_transitions_counter() {
        let (mut ctx, mut session) = discovered("10.0.0.0");
        run_due(&mut ctx, &mut session);
        session.tcpc.as_mut().unwrap().state = TcpState::Idle;
        session.connected(&mut ctx);
        session.peer.keepalive_time = 30;
        session.fsm(&mut ctx, Event::RxInitialized);
        session.tcpc.as_mut().unwrap().complete_send();
        assert_eq!(session.state_transitions, 0);

        session.fsm(&mut ctx, Event::RxKeepalive);
        assert_eq!(session.state_transitions, 1);

        session.close(&mut ctx);
        assert_eq!(session.state_transitions, 2);
    }
}
