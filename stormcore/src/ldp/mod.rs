//! LDP peering engine: discovered sessions with active/passive role
//! election by transport address, PDU framing, keepalive supervision and
//! raw-update injection. Label mappings travel opaquely via raw updates.

pub mod ctrl;
pub mod pdu;
pub mod receive;
pub mod session;

use crate::config::LdpConfig;
use crate::context::Context;
use crate::SessionId;
use hashbrown::HashMap;
use ion::logging::{self, Logger};
use lazy_static::lazy_static;
use std::net::{IpAddr, Ipv4Addr};

pub use session::Session;

pub const PORT: u16 = 646;
pub const PDU_VERSION: u16 = 1;
/// Version, PDU length, LSR-id and label-space fields.
pub const PDU_HEADER_SIZE: usize = 10;
/// Message type, message length and message id fields.
pub const MSG_HEADER_SIZE: usize = 8;
pub const MAX_PDU_LEN_INIT: u16 = 4096;
pub const BUF_SIZE: usize = 256 * 1024;
pub const DEFAULT_KEEPALIVE_TIME: u16 = 30;

pub const MSG_NOTIFICATION: u16 = 0x0001;
pub const MSG_HELLO: u16 = 0x0100;
pub const MSG_INITIALIZATION: u16 = 0x0200;
pub const MSG_KEEPALIVE: u16 = 0x0201;
pub const MSG_ADDRESS: u16 = 0x0300;
pub const MSG_LABEL_MAPPING: u16 = 0x0400;

pub const TLV_ADDRESS_LIST: u16 = 0x0101;
pub const TLV_STATUS: u16 = 0x0300;
pub const TLV_COMMON_SESSION_PARAMETERS: u16 = 0x0500;

/// RFC 5036 status code space; `STATUS_FATAL_ERROR` is the E-bit OR'd onto
/// the code.
pub const STATUS_SHUTDOWN: u32 = 0x0000_000A;
pub const STATUS_KEEPALIVE_TIMER_EXPIRED: u32 = 0x0000_0014;
pub const STATUS_INTERNAL_ERROR: u32 = 0x0000_001E;
pub const STATUS_FATAL_ERROR: u32 = 0x8000_0000;

lazy_static! {
    pub static ref STATUS_NAMES: HashMap<u32, &'static str> = {
        let mut names = HashMap::new();
        names.insert(STATUS_SHUTDOWN, "Shutdown");
        names.insert(STATUS_KEEPALIVE_TIMER_EXPIRED, "KeepAlive Timer Expired");
        names.insert(STATUS_INTERNAL_ERROR, "Internal Error");
        names
    };
}

pub fn status_name(status: u32) -> &'static str {
    STATUS_NAMES
        .get(&(status & !STATUS_FATAL_ERROR))
        .copied()
        .unwrap_or("unknown")
}

/// Session states ordered by liveness; `close` uses the ordering to decide
/// whether a NOTIFICATION is owed.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd)]
pub enum State {
    Closed,
    Idle,
    Listen,
    Connect,
    Initialized,
    OpenSent,
    OpenRec,
    Operational,
    Closing,
    Error,
}

impl State {
    pub fn name(self) -> &'static str {
        match self {
            State::Closed => "closed",
            State::Idle => "idle",
            State::Listen => "listen",
            State::Connect => "connect",
            State::Initialized => "initialized",
            State::OpenSent => "open-sent",
            State::OpenRec => "open-received",
            State::Operational => "operational",
            State::Closing => "closing",
            State::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Event {
    Start,
    RxInitialized,
    RxKeepalive,
}

#[derive(Debug, Default, Clone)]
pub struct Stats {
    pub pdu_rx: u64,
    pub pdu_tx: u64,
    pub message_rx: u64,
    pub message_tx: u64,
    pub keepalive_rx: u64,
    pub keepalive_tx: u64,
}

/// Discovery hello content the engine consumes; the hello adjacency
/// machinery itself lives with the interface layer.
#[derive(Debug, Clone)]
pub struct HelloInfo {
    pub lsr_id: Ipv4Addr,
    pub label_space_id: u16,
    pub transport_address: Option<IpAddr>,
}

/// The peer with the numerically greater transport address takes the
/// active role and connects; the other listens.
pub fn active_role(local: &IpAddr, peer: &IpAddr) -> bool {
    match (local, peer) {
        (IpAddr::V4(local), IpAddr::V4(peer)) => u32::from(*local) > u32::from(*peer),
        (IpAddr::V6(local), IpAddr::V6(peer)) => local.octets() > peer.octets(),
        _ => false,
    }
}

/// "lsr-id:label-space" speaker notation used in logs and control output.
pub fn ldp_id(lsr_id: Ipv4Addr, label_space_id: u16) -> String {
    format!("{}:{}", lsr_id, label_space_id)
}

pub struct Engine {
    pub config: Option<LdpConfig>,
    pub sessions: Vec<Session>,
    pub log: Logger,
}

impl Engine {
    pub fn new(config: Option<LdpConfig>, log: &Logger) -> Engine {
        Engine {
            config,
            sessions: Vec::new(),
            log: log.new(logging::o!("proto" => "ldp")),
        }
    }

    /// Discovery hello: finds or creates the session for the announced
    /// LDP identifier, then (re)runs identity setup and role election.
    pub fn hello_received(
        &mut self,
        ctx: &mut Context,
        interface: &str,
        source: IpAddr,
        hello: &HelloInfo,
    ) -> Option<SessionId> {
        let config = self.config.clone()?;

        let existing = self.sessions.iter().position(|session| {
            session.peer.lsr_id == hello.lsr_id
                && session.peer.label_space_id == hello.label_space_id
        });

        let id = match existing {
            Some(id) => id,
            None => {
                let id = self.sessions.len();
                let session = Session::new(id, &config, &self.log);
                self.sessions.push(session);
                id
            }
        };

        self.sessions[id].hello_init(ctx, &config, interface, source, hello);
        Some(id)
    }

    /// Initiate a graceful close of all sessions.
    pub fn teardown(&mut self, ctx: &mut Context) {
        for session in self.sessions.iter_mut() {
            session.teardown(ctx);
        }
    }

    pub fn session(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(id)
    }
}
