use crate::ipc::error::{get_required_i64, require_db, require_grouptool, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::reorder::{self, Direction, OrderEntry, ReorderError};
use crate::sortlist;
use serde_json::{json, Value};

/// Domain failures travel back as `{ "error": ... }` inside an ok envelope so
/// the list can show them as a banner; storage failures stay envelope errors.
fn domain_result(result: Result<String, ReorderError>) -> Result<Value, HandlerErr> {
    match result {
        Ok(message) => Ok(json!({ "message": message })),
        Err(e @ (ReorderError::Db(_) | ReorderError::Other(_) | ReorderError::Event(_))) => {
            Err(e.into())
        }
        Err(e) => {
            tracing::info!(error = %e, "ordering request rejected");
            Ok(json!({ "error": e.to_string() }))
        }
    }
}

fn reorder_groups(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_db(state)?;
    let grouptool = require_grouptool(conn, &req.params)?;
    let raw = req
        .params
        .get("order")
        .cloned()
        .ok_or_else(|| HandlerErr::bad_params("missing order"))?;
    let entries: Vec<OrderEntry> = serde_json::from_value(raw)
        .map_err(|e| HandlerErr::bad_params(format!("invalid order: {}", e)))?;

    domain_result(
        reorder::reorder_groups(conn, grouptool.id, &entries)
            .map(|_| format!("Reordered {} groups", entries.len())),
    )
}

fn swap_groups(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_db(state)?;
    let grouptool = require_grouptool(conn, &req.params)?;
    let a = get_required_i64(&req.params, "a")?;
    let b = get_required_i64(&req.params, "b")?;

    domain_result(
        reorder::swap_groups(conn, grouptool.id, a, b)
            .map(|_| format!("Swapped groups {} and {}", a, b)),
    )
}

fn sortlist_move(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_db(state)?;
    let grouptool = require_grouptool(conn, &req.params)?;
    let group_id = get_required_i64(&req.params, "groupId")?;
    let direction: Direction = req
        .params
        .get("direction")
        .cloned()
        .ok_or_else(|| HandlerErr::bad_params("missing direction"))
        .and_then(|v| {
            serde_json::from_value(v)
                .map_err(|_| HandlerErr::bad_params("direction must be up or down"))
        })?;

    let outcome = sortlist::apply_legacy_move(conn, grouptool.id, group_id, direction)
        .map_err(HandlerErr::update)?;
    Ok(json!({
        "outcome": outcome,
        "notification": outcome.notice()
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "groups.reorder" | "reorder_groups" => reorder_groups(state, req),
        "groups.swap" | "swap_groups" => swap_groups(state, req),
        "sortlist.move" => sortlist_move(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
