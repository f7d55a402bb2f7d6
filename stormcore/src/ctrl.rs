//! JSON control channel. Requests arrive as
//! `{"command": <name>, "arguments": {...}}` values; every response is
//! either `{"status": "ok", ...}` or `{"status": "error", "code": N,
//! "message": ...}`.

use crate::Core;
use serde_json::{json, Value};

pub fn ok_response(mut body: Value) -> Value {
    if let Some(map) = body.as_object_mut() {
        map.insert("status".to_string(), json!("ok"));
        map.insert(
            "timestamp".to_string(),
            json!(chrono::Utc::now().to_rfc3339()),
        );
    }
    body
}

pub fn error_response(code: u16, message: &str) -> Value {
    json!({
        "status": "error",
        "code": code,
        "message": message,
    })
}

/// Dispatches one operator request against the core.
pub fn dispatch(core: &mut Core, request: &Value) -> Value {
    let command = match request.get("command").and_then(Value::as_str) {
        Some(command) => command,
        None => return error_response(400, "missing command"),
    };
    let empty = json!({});
    let arguments = request.get("arguments").unwrap_or(&empty);

    match command {
        "bgp-sessions" => crate::bgp::ctrl::sessions(&core.ctx, &core.bgp),
        "bgp-teardown" => crate::bgp::ctrl::teardown(&mut core.ctx, &mut core.bgp),
        "bgp-raw-update" => crate::bgp::ctrl::raw_update(&mut core.bgp, arguments),
        "bgp-raw-update-list" => crate::bgp::ctrl::raw_update_list(&mut core.bgp, arguments),
        "bgp-disconnect" => crate::bgp::ctrl::disconnect(&mut core.ctx, &mut core.bgp, arguments),
        "ldp-sessions" => crate::ldp::ctrl::sessions(&core.ctx, &core.ldp),
        "ldp-teardown" => crate::ldp::ctrl::teardown(&mut core.ctx, &mut core.ldp),
        "ldp-raw-update" => crate::ldp::ctrl::raw_update(&mut core.ldp, arguments),
        "ldp-disconnect" => crate::ldp::ctrl::disconnect(&mut core.ctx, &mut core.ldp, arguments),
        "isis-adjacencies" => crate::isis::ctrl::adjacencies(&core.ctx, &core.isis),
        "isis-teardown" => crate::isis::ctrl::teardown(&mut core.ctx, &mut core.isis),
        _ => error_response(400, "unknown command"),
    }
}
