use crate::events;
use crate::ipc::error::{get_required_i64, require_db, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Value};

fn events_list(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_db(state)?;
    let cmid = get_required_i64(&req.params, "cmid")?;
    let limit = req
        .params
        .get("limit")
        .and_then(|v| v.as_i64())
        .unwrap_or(50)
        .clamp(1, 500);

    let mut valid = Vec::new();
    let mut rejected = Vec::new();
    for item in events::list_recent(conn, cmid, limit).map_err(HandlerErr::query)? {
        match item {
            Ok(ev) => valid.push(ev),
            Err(e) => {
                tracing::warn!(cmid, error = %e, "rejecting malformed logged event");
                rejected.push(e.to_string());
            }
        }
    }
    Ok(json!({ "events": valid, "rejected": rejected }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "events.list" => Some(respond(&req.id, events_list(state, req))),
        _ => None,
    }
}
