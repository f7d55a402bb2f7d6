//! Flooding and synchronisation bookkeeping: the per-adjacency flood tree
//! drains up to the transmit window per tick, P2P transmissions wait in
//! the PSNP tree for acknowledgement, and the retry scan re-floods what
//! the peer never acknowledged.

use crate::context::Context;
use crate::isis::{AdjacencyState, Engine, LspId, PduOut};
use crate::AdjacencyId;
use ion::logging;

impl Engine {
    /// Queues an LSP for flooding on one adjacency.
    pub fn flood(&mut self, adjacency_id: AdjacencyId, lsp_id: LspId) {
        self.adjacencies[adjacency_id].flood_tree.insert(lsp_id);
    }

    /// Queues an LSP for flooding on every adjacency of the matching
    /// level.
    pub fn flood_level(&mut self, level: u8, lsp_id: LspId) {
        for adjacency in self.adjacencies.iter_mut() {
            if adjacency.level == level {
                adjacency.flood_tree.insert(lsp_id);
            }
        }
    }

    /// CSNP job; also serves the immediate nudge armed on adjacency UP.
    /// Each job re-reads the state, so a stale timer cannot resurrect a
    /// downed adjacency.
    pub fn csnp_job(&mut self, _ctx: &mut Context, adjacency_id: AdjacencyId) {
        let adjacency = &self.adjacencies[adjacency_id];
        if adjacency.state != AdjacencyState::Up {
            return;
        }
        self.tx_queue.push(PduOut::Csnp {
            interface: adjacency.interface,
            level: adjacency.level,
        });
    }

    /// LSP transmit job: drains up to window-size flood-tree entries per
    /// tick. On P2P the sent ids move to the PSNP tree to await
    /// acknowledgement.
    pub fn lsp_tx_job(&mut self, ctx: &mut Context, adjacency_id: AdjacencyId) {
        let adjacency = &mut self.adjacencies[adjacency_id];
        if adjacency.state != AdjacencyState::Up {
            return;
        }

        let window: Vec<LspId> = adjacency
            .flood_tree
            .iter()
            .take(adjacency.window_size as usize)
            .copied()
            .collect();

        for lsp_id in window {
            adjacency.flood_tree.remove(&lsp_id);
            if adjacency.p2p {
                adjacency.psnp_tree.insert(lsp_id, ctx.now);
            }
            self.tx_queue.push(PduOut::Lsp {
                interface: adjacency.interface,
                level: adjacency.level,
                lsp_id,
            });
        }
    }

    /// Retry scan (P2P): anything sitting unacknowledged in the PSNP tree
    /// for a full retry interval goes back onto the flood tree.
    pub fn lsp_retry_job(&mut self, ctx: &mut Context, adjacency_id: AdjacencyId) {
        let retry_interval = self.config.lsp_retry_interval;
        let adjacency = &mut self.adjacencies[adjacency_id];
        if adjacency.state != AdjacencyState::Up {
            return;
        }

        let expired: Vec<LspId> = adjacency
            .psnp_tree
            .iter()
            .filter(|(_, sent)| ion::time::elapsed_secs(**sent, ctx.now) >= retry_interval)
            .map(|(lsp_id, _)| *lsp_id)
            .collect();

        if !expired.is_empty() {
            logging::debug!(adjacency.log, "lsp retry"; "count" => expired.len());
        }
        for lsp_id in expired {
            adjacency.psnp_tree.remove(&lsp_id);
            adjacency.flood_tree.insert(lsp_id);
        }
    }

    /// Inbound PSNP: the listed LSPs are acknowledged and leave the PSNP
    /// tree.
    pub fn psnp_received(&mut self, adjacency_id: AdjacencyId, lsp_ids: &[LspId]) {
        let adjacency = &mut self.adjacencies[adjacency_id];
        for lsp_id in lsp_ids {
            adjacency.psnp_tree.remove(lsp_id);
        }
    }

    /// Inbound CSNP: LSPs the peer already advertises need no flooding.
    pub fn csnp_received(&mut self, adjacency_id: AdjacencyId, lsp_ids: &[LspId]) {
        let adjacency = &mut self.adjacencies[adjacency_id];
        for lsp_id in lsp_ids {
            adjacency.flood_tree.remove(lsp_id);
        }
    }

    /// Inbound LSP on P2P: acknowledge it with a PSNP and drop any pending
    /// retransmission of the same LSP.
    pub fn lsp_received(&mut self, adjacency_id: AdjacencyId, lsp_id: LspId) {
        let adjacency = &mut self.adjacencies[adjacency_id];
        if adjacency.state != AdjacencyState::Up {
            return;
        }
        adjacency.flood_tree.remove(&lsp_id);
        if adjacency.p2p {
            self.tx_queue.push(PduOut::Psnp {
                interface: adjacency.interface,
                level: adjacency.level,
                lsp_ids: vec![lsp_id],
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{IsisConfig, IsisInterfaceConfig};
    use crate::isis::lsp_id;
    use ion::logging as ilog;
    use std::time::{Duration, Instant};

    fn up_engine(p2p: bool) -> (Context, Engine) {
        let mut ctx = Context::new(ilog::discard(), Instant::now());
        let config = IsisConfig {
            lsp_tx_window_size: 3,
            lsp_retry_interval: 5,
            ..IsisConfig::default()
        };
        let mut engine = Engine::new(config, &ilog::discard());
        let interface = IsisInterfaceConfig {
            name: "eth0".to_string(),
            level: 1,
            p2p,
            ..IsisInterfaceConfig::default()
        };
        engine.attach_interface(&mut ctx, &interface);
        engine.hello_received(&mut ctx, 0, 1, [1, 1, 1, 1, 1, 1], 30);
        engine.drain_tx();
        (ctx, engine)
    }

    #[test]
    fn test_tx_drains_up_to_window_size() {
        let (mut ctx, mut engine) = up_engine(true);

        for fragment in 0..5 {
            engine.flood(0, lsp_id([1, 2, 3, 4, 5, 6], 0, fragment));
        }

        engine.lsp_tx_job(&mut ctx, 0);
        let sent = engine.drain_tx();

        assert_eq!(sent.len(), 3);
        assert_eq!(engine.adjacencies[0].flood_tree.len(), 2);
        assert_eq!(engine.adjacencies[0].psnp_tree.len(), 3);

        // Ids drain in LSP-id order.
        assert_eq!(
            sent[0],
            PduOut::Lsp {
                interface: 0,
                level: 1,
                lsp_id: lsp_id([1, 2, 3, 4, 5, 6], 0, 0)
            }
        );
    }

    #[test]
    fn test_broadcast_tx_skips_psnp_tree() {
        let (mut ctx, mut engine) = up_engine(false);

        engine.flood(0, lsp_id([1, 2, 3, 4, 5, 6], 0, 0));
        engine.lsp_tx_job(&mut ctx, 0);

        assert!(engine.adjacencies[0].psnp_tree.is_empty());
        assert_eq!(engine.drain_tx().len(), 1);
    }

    #[test]
    fn test_retry_refloods_unacknowledged() {
        let (mut ctx, mut engine) = up_engine(true);
        let id = lsp_id([1, 2, 3, 4, 5, 6], 0, 0);

        engine.flood(0, id);
        engine.lsp_tx_job(&mut ctx, 0);
        assert!(engine.adjacencies[0].psnp_tree.contains_key(&id));

        // Young entries are not retried.
        engine.lsp_retry_job(&mut ctx, 0);
        assert!(engine.adjacencies[0].flood_tree.is_empty());

        ctx.now += Duration::from_secs(5);
        engine.lsp_retry_job(&mut ctx, 0);
        assert!(engine.adjacencies[0].flood_tree.contains(&id));
        assert!(engine.adjacencies[0].psnp_tree.is_empty());
    }

    #[test]
    fn test_psnp_acknowledges() {
        let (mut ctx, mut engine) = up_engine(true);
        let id = lsp_id([1, 2, 3, 4, 5, 6], 0, 0);

        engine.flood(0, id);
        engine.lsp_tx_job(&mut ctx, 0);
        engine.psnp_received(0, &[id]);

        assert!(engine.adjacencies[0].psnp_tree.is_empty());

        // Acknowledged entries never come back through retry.
        ctx.now += Duration::from_secs(10);
        engine.lsp_retry_job(&mut ctx, 0);
        assert!(engine.adjacencies[0].flood_tree.is_empty());
    }

    #[test]
    fn test_csnp_received_prunes_flood_tree() {
        let (_ctx, mut engine) = up_engine(true);
        let known = lsp_id([1, 2, 3, 4, 5, 6], 0, 0);
        let fresh = lsp_id([1, 2, 3, 4, 5, 6], 0, 1);

        engine.flood(0, known);
        engine.flood(0, fresh);
        engine.csnp_received(0, &[known]);

        assert!(!engine.adjacencies[0].flood_tree.contains(&known));
        assert!(engine.adjacencies[0].flood_tree.contains(&fresh));
    }

    #[test]
    fn test_lsp_received_is_acknowledged_on_p2p() {
        let (_ctx, mut engine) = up_engine(true);
        let id = lsp_id([2, 2, 2, 2, 2, 2], 0, 0);

        engine.lsp_received(0, id);

        let sent = engine.drain_tx();
        assert_eq!(
            sent,
            vec![PduOut::Psnp {
                interface: 0,
                level: 1,
                lsp_ids: vec![id]
            }]
        );
    }

    #[test]
    fn test_jobs_are_noops_when_down() {
        let (mut ctx, mut engine) = up_engine(true);
        engine.flood(0, lsp_id([1, 1, 1, 1, 1, 1], 0, 0));
        engine.adjacency_down(&mut ctx, 0, "test");
        engine.drain_tx();

        engine.lsp_tx_job(&mut ctx, 0);
        engine.csnp_job(&mut ctx, 0);
        engine.lsp_retry_job(&mut ctx, 0);

        assert!(engine.drain_tx().is_empty());
        // The flood backlog stays put for the next UP.
        assert_eq!(engine.adjacencies[0].flood_tree.len(), 1);
    }
}
