use crate::bgp::Engine;
use crate::context::Context;
use crate::ctrl::{error_response, ok_response};
use crate::raw_update::{RawUpdate, RawUpdateFormat};
use serde_json::{json, Value};

/// Enumerate all sessions with identity, state and counters.
pub fn sessions(ctx: &Context, engine: &Engine) -> Value {
    let sessions: Vec<Value> = engine
        .sessions
        .iter()
        .map(|session| {
            json!({
                "interface": session.config.interface,
                "local-address": session.config.local_address.to_string(),
                "peer-address": session.config.peer_address.to_string(),
                "local-as": session.config.local_as,
                "peer-as": session.peer.asn,
                "peer-router-id": session.peer.id,
                "peer-hold-time": session.peer.hold_time,
                "state": session.state.name(),
                "raw-update-sending": session.raw_updates.sending,
                "established-seconds": session.established
                    .map(|at| ion::time::elapsed_secs(at, ctx.now)),
                "stats": {
                    "message-rx": session.stats.message_rx,
                    "message-tx": session.stats.message_tx,
                    "keepalive-rx": session.stats.keepalive_rx,
                    "keepalive-tx": session.stats.keepalive_tx,
                    "update-rx": session.stats.update_rx,
                    "update-tx": session.stats.update_tx,
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

fn matches(session: &crate::bgp::Session, arguments: &Value) -> bool {
    if let Some(peer) = arguments.get("peer-address").and_then(Value::as_str) {
        if session.config.peer_address.to_string() != peer {
            return false;
        }
    }
    if let Some(interface) = arguments.get("interface").and_then(Value::as_str) {
        if session.config.interface != interface {
            return false;
        }
    }
    true
}

/// Attach a freshly loaded raw-update chain to the matched sessions. Each
/// session gets its own load; descriptors are never shared.
pub fn raw_update(engine: &mut Engine, arguments: &Value) -> Value {
    let file = match arguments.get("file").and_then(Value::as_str) {
        Some(file) => file,
        None => return error_response(400, "missing argument: file"),
    };
    raw_update_files(engine, &[file.to_string()], arguments)
}

/// Same as `raw_update` with an ordered list of files.
pub fn raw_update_list(engine: &mut Engine, arguments: &Value) -> Value {
    let files: Vec<String> = match arguments.get("files").and_then(Value::as_array) {
        Some(files) => files
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        None => return error_response(400, "missing argument: files"),
    };
    if files.is_empty() {
        return error_response(400, "empty file list");
    }
    raw_update_files(engine, &files, arguments)
}

fn raw_update_files(engine: &mut Engine, files: &[String], arguments: &Value) -> Value {
    let mut matched = 0;
    for session in engine.sessions.iter_mut() {
        if !matches(session, arguments) {
            continue;
        }
        let mut updates = Vec::with_capacity(files.len());
        for file in files {
            match RawUpdate::load(file, RawUpdateFormat::Bgp) {
                Ok(update) => updates.push(update),
                Err(err) => {
                    return error_response(500, &format!("failed to load {}: {}", file, err))
                }
            }
        }
        session.raw_updates.replace(updates);
        matched += 1;
    }
    if matched == 0 {
        return error_response(404, "no session matched");
    }
    ok_response(json!({ "sessions": matched }))
}

/// Force close matched sessions; they reconnect per configuration.
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
