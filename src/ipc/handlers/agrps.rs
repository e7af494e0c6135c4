use crate::ipc::error::{
    get_optional_i64, get_required_i64, require_db, require_grouptool, respond, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::reorder;
use serde_json::{json, Value};

fn agrps_activate(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_db(state)?;
    let grouptool = require_grouptool(conn, &req.params)?;
    let group_id = get_required_i64(&req.params, "groupId")?;
    let grpsize = get_optional_i64(&req.params, "grpsize")?;
    let agrp = reorder::activate_group(conn, &grouptool, group_id, grpsize)?;
    Ok(json!({ "agrp": agrp }))
}

fn agrps_set_active(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_db(state)?;
    let grouptool = require_grouptool(conn, &req.params)?;
    let group_id = get_required_i64(&req.params, "groupId")?;
    let active = req
        .params
        .get("active")
        .and_then(|v| v.as_bool())
        .ok_or_else(|| HandlerErr::bad_params("missing active"))?;
    let agrp = reorder::set_active(conn, grouptool.id, group_id, active)?;
    Ok(json!({ "agrp": agrp }))
}

fn agrps_delete(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_db(state)?;
    let grouptool = require_grouptool(conn, &req.params)?;
    let group_id = get_required_i64(&req.params, "groupId")?;
    let event = reorder::delete_agrp(conn, &grouptool, group_id)?;
    Ok(json!({
        "ok": true,
        "agrpId": event.agrp_id(),
        "event": {
            "name": crate::events::AgrpDeleted::NAME,
            "description": event.description(),
            "url": event.url()
        }
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "agrps.activate" => agrps_activate(state, req),
        "agrps.setActive" => agrps_set_active(state, req),
        "agrps.delete" => agrps_delete(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
