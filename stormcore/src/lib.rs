//! Routing-protocol emulation core of a network-device load generator.
//! Three engines (BGP, LDP, IS-IS) share one cooperative timer wheel and a
//! callback-driven stream transport; everything runs on a single thread.

#![allow(clippy::len_without_is_empty)]
#![allow(clippy::new_without_default)]

pub mod bgp;
pub mod config;
pub mod context;
pub mod ctrl;
pub mod isis;
pub mod ldp;
pub mod net;
pub mod raw_update;
pub mod timer;

use crate::config::CoreConfig;
use crate::context::Context;
use crate::net::transport::{TcpCtx, TcpError, TcpOwner, TcpState};
use ion::logging::Logger;
use serde_json::Value;
use std::io;
use std::time::Instant;

pub type SessionId = usize;
pub type AdjacencyId = usize;
pub type InterfaceId = usize;
pub type PeerId = usize;

/// Deferred work dispatched by the timer wheel. Each variant names the
/// engine callback and the object it runs against.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Job {
    BgpConnect(SessionId),
    BgpKeepalive(SessionId),
    BgpHold(SessionId),
    BgpUpdate(SessionId),
    BgpClose(SessionId),
    LdpConnect(SessionId),
    LdpKeepalive(SessionId),
    LdpKeepaliveTimeout(SessionId),
    LdpUpdate(SessionId),
    LdpClose(SessionId),
    IsisHello(InterfaceId),
    IsisCsnp(AdjacencyId),
    IsisLspTx(AdjacencyId),
    IsisLspRetry(AdjacencyId),
}

/// The protocol core: run context plus the three engines. The embedding
/// process owns the wall clock and the I/O layer; it calls `advance` to
/// run due timer jobs and the `tcp_*` methods to deliver transport events.
pub struct Core {
    pub ctx: Context,
    pub bgp: bgp::Engine,
    pub ldp: ldp::Engine,
    pub isis: isis::Engine,
}

impl Core {
    pub fn new(config: CoreConfig, log: Logger, now: Instant) -> io::Result<Core> {
        let bgp = bgp::Engine::new(&config.bgp, &log)?;
        let ldp = ldp::Engine::new(config.ldp.clone(), &log);
        let isis = isis::Engine::new(config.isis.clone().unwrap_or_default(), &log);

        Ok(Core {
            ctx: Context::new(log, now),
            bgp,
            ldp,
            isis,
        })
    }

    /// Starts the configured machinery: BGP connect supervisors and IS-IS
    /// interfaces. LDP sessions start on discovery hellos.
    pub fn start(&mut self, now: Instant) {
        self.ctx.now = now;
        self.bgp.start(&mut self.ctx);

        let interfaces = self.isis.config.interfaces.clone();
        for interface in &interfaces {
            if !self.isis.attach_interface(&mut self.ctx, interface) {
                ion::logging::error!(self.ctx.log, "interface rejected";
                                     "interface" => interface.name.clone());
            }
        }
    }

    /// Clears the init-phase flag once the I/O layer reports all
    /// interfaces resolved.
    pub fn set_init_phase(&mut self, init_phase: bool) {
        self.ctx.init_phase = init_phase;
    }

    /// Marks the whole core as tearing down and closes everything.
    pub fn teardown(&mut self) {
        self.ctx.teardown = true;
        self.bgp.teardown(&mut self.ctx);
        self.ldp.teardown(&mut self.ctx);
        self.isis.teardown(&mut self.ctx);
    }

    /// Runs every timer job due at `now`. Events within a session stay
    /// totally ordered; a job armed by another job at the same instant
    /// runs in the same call.
    pub fn advance(&mut self, now: Instant) {
        self.ctx.now = now;
        while let Some(job) = self.ctx.wheel.next_due(now) {
            self.dispatch(job);
        }
    }

    fn dispatch(&mut self, job: Job) {
        match job {
            Job::BgpConnect(id) => {
                if let Some(session) = self.bgp.sessions.get_mut(id) {
                    session.connect_job(&mut self.ctx);
                }
            }
            Job::BgpKeepalive(id) => {
                if let Some(session) = self.bgp.sessions.get_mut(id) {
                    session.keepalive_job(&mut self.ctx);
                }
            }
            Job::BgpHold(id) => {
                if let Some(session) = self.bgp.sessions.get_mut(id) {
                    session.hold_job(&mut self.ctx);
                }
            }
            Job::BgpUpdate(id) => {
                if let Some(session) = self.bgp.sessions.get_mut(id) {
                    session.update_job(&mut self.ctx);
                }
            }
            Job::BgpClose(id) => {
                if let Some(session) = self.bgp.sessions.get_mut(id) {
                    session.close_job(&mut self.ctx);
                }
            }
            Job::LdpConnect(id) => {
                if let Some(session) = self.ldp.sessions.get_mut(id) {
                    session.connect_job(&mut self.ctx);
                }
            }
            Job::LdpKeepalive(id) => {
                if let Some(session) = self.ldp.sessions.get_mut(id) {
                    session.keepalive_job(&mut self.ctx);
                }
            }
            Job::LdpKeepaliveTimeout(id) => {
                if let Some(session) = self.ldp.sessions.get_mut(id) {
                    session.keepalive_timeout_job(&mut self.ctx);
                }
            }
            Job::LdpUpdate(id) => {
                if let Some(session) = self.ldp.sessions.get_mut(id) {
                    session.update_job(&mut self.ctx);
                }
            }
            Job::LdpClose(id) => {
                if let Some(session) = self.ldp.sessions.get_mut(id) {
                    session.close_job(&mut self.ctx);
                }
            }
            Job::IsisHello(id) => self.isis.hello_job(&mut self.ctx, id),
            Job::IsisCsnp(id) => self.isis.csnp_job(&mut self.ctx, id),
            Job::IsisLspTx(id) => self.isis.lsp_tx_job(&mut self.ctx, id),
            Job::IsisLspRetry(id) => self.isis.lsp_retry_job(&mut self.ctx, id),
        }
    }

    /// Transport connected. The context goes idle and the owner's session
    /// runs its connected transition.
    pub fn tcp_connected(&mut self, owner: TcpOwner) {
        match owner {
            TcpOwner::Bgp(id) => {
                if let Some(session) = self.bgp.sessions.get_mut(id) {
                    if let Some(tcpc) = session.tcpc.as_mut() {
                        tcpc.state = TcpState::Idle;
                    }
                    session.connected(&mut self.ctx);
                }
            }
            TcpOwner::Ldp(id) => {
                if let Some(session) = self.ldp.sessions.get_mut(id) {
                    if let Some(tcpc) = session.tcpc.as_mut() {
                        tcpc.state = TcpState::Idle;
                    }
                    session.connected(&mut self.ctx);
                }
            }
        }
    }

    /// Connection accepted on a listen context (LDP passive side). A false
    /// return tells the I/O layer to abort the connection.
    pub fn tcp_accepted(&mut self, owner: TcpOwner, tcpc: TcpCtx) -> bool {
        match owner {
            TcpOwner::Ldp(id) => self
                .ldp
                .sessions
                .get_mut(id)
                .map_or(false, |session| session.accepted(tcpc)),
            TcpOwner::Bgp(_) => false,
        }
    }

    /// Received bytes, or with `None` the drain signal to run the decode
    /// loop.
    pub fn tcp_received(&mut self, owner: TcpOwner, data: Option<&[u8]>) {
        match owner {
            TcpOwner::Bgp(id) => {
                if let Some(session) = self.bgp.sessions.get_mut(id) {
                    session.received(&mut self.ctx, data);
                }
            }
            TcpOwner::Ldp(id) => {
                if let Some(session) = self.ldp.sessions.get_mut(id) {
                    session.received(&mut self.ctx, data);
                }
            }
        }
    }

    /// The in-flight transmission drained; drives the raw-update pump.
    pub fn tcp_idle(&mut self, owner: TcpOwner) {
        match owner {
            TcpOwner::Bgp(id) => {
                if let Some(session) = self.bgp.sessions.get_mut(id) {
                    if let Some(tcpc) = session.tcpc.as_mut() {
                        tcpc.complete_send();
                    }
                    session.idle(&mut self.ctx);
                }
            }
            TcpOwner::Ldp(id) => {
                if let Some(session) = self.ldp.sessions.get_mut(id) {
                    if let Some(tcpc) = session.tcpc.as_mut() {
                        tcpc.complete_send();
                    }
                    session.idle(&mut self.ctx);
                }
            }
        }
    }

    /// Transport failure; the owner's session closes itself.
    pub fn tcp_error(&mut self, owner: TcpOwner, err: TcpError) {
        match owner {
            TcpOwner::Bgp(id) => {
                if let Some(session) = self.bgp.sessions.get_mut(id) {
                    session.error(&mut self.ctx, err);
                }
            }
            TcpOwner::Ldp(id) => {
                if let Some(session) = self.ldp.sessions.get_mut(id) {
                    session.error(&mut self.ctx, err);
                }
            }
        }
    }

    /// Control-channel entry point.
    pub fn ctrl(&mut self, request: &Value) -> Value {
        ctrl::dispatch(self, request)
    }
}
