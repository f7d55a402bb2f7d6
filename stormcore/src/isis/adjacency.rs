use crate::config::IsisInterfaceConfig;
use crate::context::Context;
use crate::isis::{self, AdjacencyState, Engine, LspId, PduOut};
use crate::timer::TimerHandle;
use crate::{AdjacencyId, InterfaceId, Job, PeerId};
use ion::logging::{self, Logger};
use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

/// Neighbor descriptor. On point-to-point links one peer is shared by the
/// level-1 and level-2 adjacency objects; broadcast adjacencies own their
/// peer.
pub struct Peer {
    pub system_id: [u8; 6],
    pub hold_time: u16,
    pub last_hello: Option<Instant>,
}

impl Peer {
    pub fn new() -> Peer {
        Peer {
            system_id: [0; 6],
            hold_time: isis::DEFAULT_HOLD_TIME,
            last_hello: None,
        }
    }
}

/// A network interface attached to the IS-IS instance. The hello timer is
/// interface-scoped and keeps running while adjacencies are down so the
/// neighborship can re-form.
pub struct Interface {
    pub id: InterfaceId,
    pub config: IsisInterfaceConfig,
    pub adjacency: [Option<AdjacencyId>; isis::LEVELS],
    pub peer: Option<PeerId>,
    pub(crate) hello_timer: TimerHandle,
}

/// One adjacency per (interface, level).
pub struct Adjacency {
    pub id: AdjacencyId,
    pub interface: InterfaceId,
    pub level: u8,
    pub levels: u8,
    pub p2p: bool,
    pub peer: PeerId,
    pub state: AdjacencyState,
    pub priority: u8,
    pub metric: u32,
    pub pseudo_node_id: u8,
    pub adjacency_sid: u32,
    pub window_size: u16,
    /// LSP-ids awaiting transmission, drained window-size at a time.
    pub flood_tree: BTreeSet<LspId>,
    /// LSP-ids awaiting partial-SNP acknowledgement, with send time for
    /// retry ageing. Point-to-point only.
    pub psnp_tree: BTreeMap<LspId, Instant>,
    pub(crate) timer_tx: TimerHandle,
    pub(crate) timer_retry: TimerHandle,
    pub(crate) timer_csnp: TimerHandle,
    pub(crate) timer_csnp_next: TimerHandle,
    pub log: Logger,
}

impl Engine {
    /// Attaches an interface: allocates one adjacency per configured level
    /// bit, the shared peer on point-to-point links, a pseudo-node-id on
    /// broadcast links, and starts the hello schedule. Rejects an empty or
    /// out-of-range level mask.
    pub fn attach_interface(&mut self, ctx: &mut Context, config: &IsisInterfaceConfig) -> bool {
        if config.level == 0 || config.level > 3 {
            return false;
        }

        logging::info!(self.log, "add network interface";
                       "interface" => config.name.clone(),
                       "level" => isis::level_string(config.level));

        let interface_id = self.interfaces.len();
        let shared_peer = if config.p2p {
            Some(self.alloc_peer())
        } else {
            self.next_pseudo_node_id += 1;
            None
        };

        let mut interface = Interface {
            id: interface_id,
            config: config.clone(),
            adjacency: [None; isis::LEVELS],
            peer: shared_peer,
            hello_timer: TimerHandle::NULL,
        };

        for i in 0..isis::LEVELS {
            let level = (i + 1) as u8;
            if config.level & level == 0 {
                continue;
            }

            let peer = match shared_peer {
                Some(peer) => peer,
                None => self.alloc_peer(),
            };

            let (priority, metric) = if level == isis::LEVEL_1 {
                (config.l1_priority, config.l1_metric)
            } else {
                (config.l2_priority, config.l2_metric)
            };

            let adjacency_id = self.adjacencies.len();
            let adjacency = Adjacency {
                id: adjacency_id,
                interface: interface_id,
                level,
                levels: config.level,
                p2p: config.p2p,
                peer,
                state: AdjacencyState::Down,
                priority,
                metric,
                pseudo_node_id: if config.p2p {
                    0
                } else {
                    self.next_pseudo_node_id
                },
                adjacency_sid: config.adjacency_sid,
                window_size: self.config.lsp_tx_window_size,
                flood_tree: BTreeSet::new(),
                psnp_tree: BTreeMap::new(),
                timer_tx: TimerHandle::NULL,
                timer_retry: TimerHandle::NULL,
                timer_csnp: TimerHandle::NULL,
                timer_csnp_next: TimerHandle::NULL,
                log: self.log.new(logging::o!(
                    "interface" => config.name.clone(),
                    "level" => isis::level_string(level)
                )),
            };
            interface.adjacency[i] = Some(adjacency_id);
            self.adjacencies.push(adjacency);
        }

        ctx.wheel.arm(
            &mut interface.hello_timer,
            Job::IsisHello(interface_id),
            Duration::from_secs(0),
            Some(Duration::from_secs(self.config.hello_interval)),
            ctx.now,
        );

        self.interfaces.push(interface);
        true
    }

    /// Hello schedule: emit the level hellos and expire peers whose hold
    /// time ran out.
    pub fn hello_job(&mut self, ctx: &mut Context, interface_id: InterfaceId) {
        let (p2p, adjacency_ids) = {
            let interface = &self.interfaces[interface_id];
            (interface.config.p2p, interface.adjacency)
        };

        if p2p {
            self.tx_queue.push(PduOut::HelloP2p {
                interface: interface_id,
            });
        }

        for slot in adjacency_ids.iter() {
            let adjacency_id = match slot {
                Some(id) => *id,
                None => continue,
            };
            if !p2p {
                let level = self.adjacencies[adjacency_id].level;
                self.tx_queue.push(PduOut::Hello {
                    interface: interface_id,
                    level,
                });
            }

            // Hold supervision rides on the hello schedule.
            let expired = {
                let adjacency = &self.adjacencies[adjacency_id];
                let peer = &self.peers[adjacency.peer];
                adjacency.state == AdjacencyState::Up
                    && peer.last_hello.map_or(false, |at| {
                        ion::time::elapsed_secs(at, ctx.now) >= u64::from(peer.hold_time)
                    })
            };
            if expired {
                self.adjacency_down(ctx, adjacency_id, "hold timeout");
            }
        }
    }

    /// Inbound hello: refresh the peer and bring matching level
    /// adjacencies up.
    pub fn hello_received(
        &mut self,
        ctx: &mut Context,
        interface_id: InterfaceId,
        level_mask: u8,
        system_id: [u8; 6],
        hold_time: u16,
    ) {
        let adjacency_ids = self.interfaces[interface_id].adjacency;

        for slot in adjacency_ids.iter() {
            let adjacency_id = match slot {
                Some(id) => *id,
                None => continue,
            };
            let adjacency = &self.adjacencies[adjacency_id];
            if adjacency.level & level_mask == 0 {
                continue;
            }

            let peer = &mut self.peers[adjacency.peer];
            peer.system_id = system_id;
            peer.hold_time = hold_time;
            peer.last_hello = Some(ctx.now);

            self.adjacency_up(ctx, adjacency_id);
        }
    }

    /// Brings an adjacency UP: CSNP schedule (periodic plus an immediate
    /// nudge), the LSP transmit window and, on P2P, the retry scan.
    pub fn adjacency_up(&mut self, ctx: &mut Context, adjacency_id: AdjacencyId) {
        let adjacency = &mut self.adjacencies[adjacency_id];
        if adjacency.state == AdjacencyState::Up {
            return;
        }

        logging::info!(adjacency.log, "adjacency UP";
                       "peer" => isis::system_id_string(self.peers[adjacency.peer].system_id));
        adjacency.state = AdjacencyState::Up;

        ctx.wheel.arm(
            &mut adjacency.timer_csnp,
            Job::IsisCsnp(adjacency_id),
            Duration::from_secs(self.config.csnp_interval),
            Some(Duration::from_secs(self.config.csnp_interval)),
            ctx.now,
        );
        ctx.wheel.arm(
            &mut adjacency.timer_csnp_next,
            Job::IsisCsnp(adjacency_id),
            Duration::from_millis(10),
            None,
            ctx.now,
        );
        ctx.wheel.arm(
            &mut adjacency.timer_tx,
            Job::IsisLspTx(adjacency_id),
            Duration::from_millis(self.config.lsp_tx_interval_ms),
            Some(Duration::from_millis(self.config.lsp_tx_interval_ms)),
            ctx.now,
        );
        if adjacency.p2p {
            ctx.wheel.arm(
                &mut adjacency.timer_retry,
                Job::IsisLspRetry(adjacency_id),
                Duration::from_secs(self.config.lsp_retry_interval),
                Some(Duration::from_secs(self.config.lsp_retry_interval)),
                ctx.now,
            );
        }

        ctx.session_up();
    }

    /// Brings an adjacency DOWN: cancels the four periodic jobs and
    /// releases the routing-session slot. Idempotent via the state guard;
    /// stale timer jobs re-read the state on entry and become no-ops.
    pub fn adjacency_down(&mut self, ctx: &mut Context, adjacency_id: AdjacencyId, reason: &str) {
        let adjacency = &mut self.adjacencies[adjacency_id];
        if adjacency.state == AdjacencyState::Down {
            return;
        }
        adjacency.state = AdjacencyState::Down;

        logging::info!(adjacency.log, "adjacency DOWN";
                       "peer" => isis::system_id_string(self.peers[adjacency.peer].system_id),
                       "reason" => reason.to_string());

        ctx.wheel.cancel(&mut adjacency.timer_tx);
        ctx.wheel.cancel(&mut adjacency.timer_retry);
        ctx.wheel.cancel(&mut adjacency.timer_csnp);
        ctx.wheel.cancel(&mut adjacency.timer_csnp_next);

        ctx.session_down();
    }

    /// Takes every adjacency down, e.g. on operator teardown.
    pub fn teardown(&mut self, ctx: &mut Context) {
        for adjacency_id in 0..self.adjacencies.len() {
            self.adjacency_down(ctx, adjacency_id, "teardown");
        }
        for interface in self.interfaces.iter_mut() {
            ctx.wheel.cancel(&mut interface.hello_timer);
        }
    }

    /// Armed-timer view for tests and control output:
    /// (tx, retry, csnp, csnp_next).
    pub fn armed_timers(&self, ctx: &Context, adjacency_id: AdjacencyId) -> (bool, bool, bool, bool) {
        let adjacency = &self.adjacencies[adjacency_id];
        (
            ctx.wheel.is_armed(adjacency.timer_tx),
            ctx.wheel.is_armed(adjacency.timer_retry),
            ctx.wheel.is_armed(adjacency.timer_csnp),
            ctx.wheel.is_armed(adjacency.timer_csnp_next),
        )
    }
}
