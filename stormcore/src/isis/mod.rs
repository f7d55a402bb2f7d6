//! IS-IS adjacency engine: link-layer neighborships per (interface,
//! level), flooding windows and CSNP/PSNP synchronisation bookkeeping.
//! The wire encoding of the PDUs is owned by the interface layer; this
//! engine schedules and accounts them.

pub mod adjacency;
pub mod ctrl;
pub mod flood;

use crate::config::IsisConfig;
use crate::{AdjacencyId, InterfaceId, PeerId};
use ion::logging::{self, Logger};

pub use adjacency::{Adjacency, Interface, Peer};

pub const LEVEL_1: u8 = 1;
pub const LEVEL_2: u8 = 2;
pub const LEVELS: usize = 2;

pub const DEFAULT_CSNP_INTERVAL: u64 = 30;
pub const DEFAULT_LSP_TX_INTERVAL_MS: u64 = 10;
pub const DEFAULT_LSP_RETRY_INTERVAL: u64 = 5;
pub const DEFAULT_LSP_TX_WINDOW_SIZE: u16 = 10;
pub const DEFAULT_HELLO_INTERVAL: u64 = 10;
/// Default neighbor hold time assumed until hellos say otherwise.
pub const DEFAULT_HOLD_TIME: u16 = 30;

/// The 8-byte (system-id, pseudonode, fragment) LSP identifier packed into
/// an integer so the flood and PSNP trees order naturally.
pub type LspId = u64;

pub fn lsp_id(system_id: [u8; 6], pseudo_node: u8, fragment: u8) -> LspId {
    let mut raw = [0u8; 8];
    raw[..6].copy_from_slice(&system_id);
    raw[6] = pseudo_node;
    raw[7] = fragment;
    u64::from_be_bytes(raw)
}

pub fn system_id_string(system_id: [u8; 6]) -> String {
    format!(
        "{:02x}{:02x}.{:02x}{:02x}.{:02x}{:02x}",
        system_id[0], system_id[1], system_id[2], system_id[3], system_id[4], system_id[5]
    )
}

pub fn level_string(level: u8) -> &'static str {
    match level {
        1 => "L1",
        2 => "L2",
        3 => "L1L2",
        _ => "unknown",
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum AdjacencyState {
    Down,
    Init,
    Up,
}

impl AdjacencyState {
    pub fn name(self) -> &'static str {
        match self {
            AdjacencyState::Down => "down",
            AdjacencyState::Init => "init",
            AdjacencyState::Up => "up",
        }
    }
}

/// PDU descriptors queued toward the interface layer, which owns the wire
/// encoding.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum PduOut {
    HelloP2p { interface: InterfaceId },
    Hello { interface: InterfaceId, level: u8 },
    Csnp { interface: InterfaceId, level: u8 },
    Psnp { interface: InterfaceId, level: u8, lsp_ids: Vec<LspId> },
    Lsp { interface: InterfaceId, level: u8, lsp_id: LspId },
}

pub struct Engine {
    pub config: IsisConfig,
    pub interfaces: Vec<Interface>,
    pub adjacencies: Vec<Adjacency>,
    pub peers: Vec<Peer>,
    pub tx_queue: Vec<PduOut>,
    pub(crate) next_pseudo_node_id: u8,
    pub log: Logger,
}

impl Engine {
    pub fn new(config: IsisConfig, log: &Logger) -> Engine {
        Engine {
            config,
            interfaces: Vec::new(),
            adjacencies: Vec::new(),
            peers: Vec::new(),
            tx_queue: Vec::new(),
            next_pseudo_node_id: 0,
            log: log.new(logging::o!("proto" => "isis")),
        }
    }

    /// Hands the queued PDU descriptors to the interface layer.
    pub fn drain_tx(&mut self) -> Vec<PduOut> {
        std::mem::replace(&mut self.tx_queue, Vec::new())
    }

    pub fn adjacency(&self, id: AdjacencyId) -> Option<&Adjacency> {
        self.adjacencies.get(id)
    }

    pub(crate) fn alloc_peer(&mut self) -> PeerId {
        let id = self.peers.len();
        self.peers.push(Peer::new());
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lsp_id_orders_by_system_id_first() {
        let low = lsp_id([0, 0, 0, 0, 0, 1], 0xFF, 0xFF);
        let high = lsp_id([0, 0, 0, 0, 0, 2], 0, 0);
        assert!(low < high);
    }

    #[test]
    fn test_lsp_id_fragment_order() {
        let base = lsp_id([1, 2, 3, 4, 5, 6], 0, 0);
        let fragment = lsp_id([1, 2, 3, 4, 5, 6], 0, 1);
        assert!(base < fragment);
    }

    #[test]
    fn test_system_id_notation() {
        assert_eq!(system_id_string([0x19, 0x21, 0, 0, 0, 7]), "1921.0000.0007");
    }
}
