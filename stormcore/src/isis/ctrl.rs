use crate::context::Context;
use crate::ctrl::ok_response;
use crate::isis::{self, Engine};
use serde_json::{json, Value};

/// Enumerate all adjacencies with identity, state and flooding backlog.
pub fn adjacencies(ctx: &Context, engine: &Engine) -> Value {
    let adjacencies: Vec<Value> = engine
        .adjacencies
        .iter()
        .map(|adjacency| {
            let interface = &engine.interfaces[adjacency.interface];
            let peer = &engine.peers[adjacency.peer];
            json!({
                "interface": interface.config.name,
                "level": isis::level_string(adjacency.level),
                "p2p": adjacency.p2p,
                "state": adjacency.state.name(),
                "peer-system-id": isis::system_id_string(peer.system_id),
                "priority": adjacency.priority,
                "metric": adjacency.metric,
                "pseudo-node-id": adjacency.pseudo_node_id,
                "adjacency-sid": adjacency.adjacency_sid,
                "flood-tree": adjacency.flood_tree.len(),
                "psnp-tree": adjacency.psnp_tree.len(),
                "last-hello-seconds": peer.last_hello
                    .map(|at| ion::time::elapsed_secs(at, ctx.now)),
            })
        })
        .collect();

    ok_response(json!({ "adjacencies": adjacencies }))
}

/// Take every adjacency down.
pub fn teardown(ctx: &mut Context, engine: &mut Engine) -> Value {
    engine.teardown(ctx);
    ok_response(json!({ "adjacencies": engine.adjacencies.len() }))
}
