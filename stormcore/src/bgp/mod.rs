//! BGP peering engine: a framed TCP session speaking a subset of BGP-4
//! with capability negotiation and raw-update injection. UPDATE payloads
//! are opaque; the engine counts them and moves on.

pub mod ctrl;
pub mod receive;
pub mod send;
pub mod session;

use crate::config::BgpPeerConfig;
use crate::context::Context;
use crate::raw_update::{RawUpdate, RawUpdateFormat};
use crate::SessionId;
use hashbrown::HashMap;
use ion::logging::{self, Logger};
use lazy_static::lazy_static;
use std::io;

pub use session::Session;

pub const PORT: u16 = 179;
pub const MIN_MESSAGE_SIZE: usize = 19;
pub const MAX_MESSAGE_SIZE: usize = 4096;
pub const BUF_SIZE: usize = 256 * 1024;
pub const DEFAULT_AS: u32 = 65000;
pub const DEFAULT_HOLD_TIME: u16 = 90;
pub const DEFAULT_TEARDOWN_TIME: u16 = 5;

pub const MSG_OPEN: u8 = 1;
pub const MSG_UPDATE: u8 = 2;
pub const MSG_NOTIFICATION: u8 = 3;
pub const MSG_KEEPALIVE: u8 = 4;

pub const PARAM_CAPABILITY: u8 = 2;
pub const CAPABILITY_4_BYTE_AS: u8 = 65;
/// AS_TRANS, sent in the 2-byte AS field when the local AS does not fit.
pub const AS_TRANS: u16 = 23456;

lazy_static! {
    pub static ref MSG_NAMES: HashMap<u8, &'static str> = {
        let mut names = HashMap::new();
        names.insert(MSG_OPEN, "open");
        names.insert(MSG_UPDATE, "update");
        names.insert(MSG_NOTIFICATION, "notification");
        names.insert(MSG_KEEPALIVE, "keepalive");
        names
    };
    pub static ref NOTIFICATION_ERROR_NAMES: HashMap<u8, &'static str> = {
        let mut names = HashMap::new();
        names.insert(1, "Message Header Error");
        names.insert(2, "OPEN Message Error");
        names.insert(3, "UPDATE Message Error");
        names.insert(4, "Hold Timer Expired");
        names.insert(5, "FSM Error");
        names.insert(6, "Cease");
        names
    };
    pub static ref HDR_ERROR_NAMES: HashMap<u8, &'static str> = {
        let mut names = HashMap::new();
        names.insert(1, "Connection Not Synchronized");
        names.insert(2, "Bad Message Length");
        names.insert(3, "Bad Message Type");
        names
    };
    pub static ref CEASE_ERROR_NAMES: HashMap<u8, &'static str> = {
        let mut names = HashMap::new();
        names.insert(1, "Maximum Number of Prefixes Reached");
        names.insert(2, "Administrative Shutdown");
        names.insert(3, "Peer De-configured");
        names.insert(4, "Administrative Reset");
        names.insert(5, "Connection Rejected");
        names.insert(6, "Other Configuration Change");
        names.insert(7, "Connection Collision Resolution");
        names.insert(8, "Out of Resources");
        names
    };
}

pub fn msg_name(msg_type: u8) -> &'static str {
    MSG_NAMES.get(&msg_type).copied().unwrap_or("unknown")
}

pub fn error_name(code: u8) -> &'static str {
    NOTIFICATION_ERROR_NAMES.get(&code).copied().unwrap_or("unknown")
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum State {
    Closed,
    Idle,
    Connect,
    Active,
    OpenSent,
    OpenConfirm,
    Established,
    Closing,
}

impl State {
    pub fn name(self) -> &'static str {
        match self {
            State::Closed => "closed",
            State::Idle => "idle",
            State::Connect => "connect",
            State::Active => "active",
            State::OpenSent => "open-sent",
            State::OpenConfirm => "open-confirm",
            State::Established => "established",
            State::Closing => "closing",
        }
    }
}

/// Monotonic per-session counters; never reset for the lifetime of the
/// session object, including across reconnects.
#[derive(Debug, Default, Clone)]
pub struct Stats {
    pub message_rx: u64,
    pub message_tx: u64,
    pub keepalive_rx: u64,
    pub keepalive_tx: u64,
    pub update_rx: u64,
    pub update_tx: u64,
    pub open_rx: u64,
    pub notification_rx: u64,
}

pub struct Engine {
    pub sessions: Vec<Session>,
    pub log: Logger,
}

impl Engine {
    /// Builds one session per configured neighbor, loading its raw-update
    /// chain. A failed load rejects the configuration.
    pub fn new(configs: &[BgpPeerConfig], log: &Logger) -> io::Result<Engine> {
        let engine_log = log.new(logging::o!("proto" => "bgp"));
        let mut sessions = Vec::with_capacity(configs.len());

        for (id, config) in configs.iter().enumerate() {
            let mut session = Session::new(id, config.clone(), &engine_log);
            if let Some(file) = &config.raw_update_file {
                let update = RawUpdate::load(file, RawUpdateFormat::Bgp)?;
                session.raw_updates.attach(update);
            }
            sessions.push(session);
        }

        Ok(Engine {
            sessions,
            log: engine_log,
        })
    }

    /// Starts the connect supervisor on every configured session.
    pub fn start(&mut self, ctx: &mut Context) {
        for id in 0..self.sessions.len() {
            self.sessions[id].session_connect(ctx, 0);
        }
    }

    /// Initiates a graceful close of all sessions.
    pub fn teardown(&mut self, ctx: &mut Context) {
        for session in self.sessions.iter_mut() {
            session.teardown(ctx);
        }
    }

    pub fn session(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(id)
    }
}
