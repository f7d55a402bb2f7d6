use crate::context::Context;
use crate::ctrl::{error_response, ok_response};
use crate::ldp::{self, Engine};
use crate::raw_update::{RawUpdate, RawUpdateFormat};
use serde_json::{json, Value};

/// Enumerate all sessions with identity, state and counters.
pub fn sessions(ctx: &Context, engine: &Engine) -> Value {
    let sessions: Vec<Value> = engine
        .sessions
        .iter()
        .map(|session| {
            json!({
                "interface": session.interface,
                "local": ldp::ldp_id(session.local.lsr_id, session.local.label_space_id),
                "peer": ldp::ldp_id(session.peer.lsr_id, session.peer.label_space_id),
                "local-address": session.local.transport_address.to_string(),
                "peer-address": session.peer.transport_address.to_string(),
                "active": session.active,
                "state": session.state.name(),
                "state-transitions": session.state_transitions,
                "keepalive-time": session.keepalive_time,
                "max-pdu-len": session.max_pdu_len,
                "raw-update-sending": session.raw_updates.sending,
                "operational-seconds": session.operational
                    .map(|at| ion::time::elapsed_secs(at, ctx.now)),
                "stats": {
                    "pdu-rx": session.stats.pdu_rx,
                    "pdu-tx": session.stats.pdu_tx,
                    "message-rx": session.stats.message_rx,
                    "message-tx": session.stats.message_tx,
                    "keepalive-rx": session.stats.keepalive_rx,
                    "keepalive-tx": session.stats.keepalive_tx,
                },
            })
        })
        .collect();

    ok_response(json!({ "sessions": sessions }))
}

/// Initiate a graceful close of all sessions.
pub fn teardown(ctx: &mut Context, engine: &mut Engine) -> Value {
    engine.teardown(ctx);
    ok_response(json!({ "sessions": engine.sessions.len() }))
}

fn matches(session: &ldp::Session, arguments: &Value) -> bool {
    if let Some(peer) = arguments.get("peer").and_then(Value::as_str) {
        if ldp::ldp_id(session.peer.lsr_id, session.peer.label_space_id) != peer {
            return false;
        }
    }
    true
}

/// Attach a freshly loaded raw-update chain to the matched sessions.
pub fn raw_update(engine: &mut Engine, arguments: &Value) -> Value {
    let file = match arguments.get("file").and_then(Value::as_str) {
        Some(file) => file,
        None => return error_response(400, "missing argument: file"),
    };

    let mut matched = 0;
    for session in engine.sessions.iter_mut() {
        if !matches(session, arguments) {
            continue;
        }
        match RawUpdate::load(file, RawUpdateFormat::Ldp) {
            Ok(update) => {
                session.raw_updates.replace(vec![update]);
                matched += 1;
            }
            Err(err) => return error_response(500, &format!("failed to load {}: {}", file, err)),
        }
    }
    if matched == 0 {
        return error_response(404, "no session matched");
    }
    ok_response(json!({ "sessions": matched }))
}

/// Force close matched sessions; they reconnect after discovery.
pub fn disconnect(ctx: &mut Context, engine: &mut Engine, arguments: &Value) -> Value {
    let mut matched = 0;
    for session in engine.sessions.iter_mut() {
        if matches(session, arguments) {
            session.disconnect(ctx);
            matched += 1;
        }
    }
    if matched == 0 {
        return error_response(404, "no session matched");
    }
    ok_response(json!({ "sessions": matched }))
}
