use crate::ipc::error::{require_grouptool, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::render;
use crate::session::DEFAULT_SESSION;
use crate::sortlist::{Sortlist, SortlistError, SortlistParams};
use serde_json::{json, Value};

fn sortlist_open(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = state
        .db
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))?;
    let grouptool = require_grouptool(conn, &req.params)?;
    let params: SortlistParams = serde_json::from_value(req.params.clone())
        .map_err(|e| HandlerErr::bad_params(format!("invalid sortlist params: {}", e)))?;
    let session_key = req
        .params
        .get("sessionId")
        .and_then(|v| v.as_str())
        .unwrap_or(DEFAULT_SESSION);
    let session = state.sessions.session_mut(session_key);

    let list = Sortlist::build(conn, &grouptool, session, &params).map_err(|e| match e {
        SortlistError::InvalidRow { .. } => HandlerErr::new("invalid_row", e.to_string()),
        _ => HandlerErr::query(e),
    })?;
    let mut value = serde_json::to_value(&list).map_err(HandlerErr::query)?;
    value["rows"] = json!(render::row_contexts(&list.groups));
    value["sessionId"] = json!(session_key);
    Ok(value)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "sortlist.open" => Some(respond(&req.id, sortlist_open(state, req))),
        _ => None,
    }
}
