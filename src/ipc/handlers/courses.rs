use crate::grouptool::{self, NewGrouptool};
use crate::ipc::error::{
    get_bool, get_optional_i64, get_required_i64, get_required_str, require_db, respond,
    HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::{json, Value};

fn require_course(conn: &Connection, params: &Value) -> Result<i64, HandlerErr> {
    let course_id = get_required_i64(params, "courseId")?;
    if !grouptool::course_exists(conn, course_id).map_err(HandlerErr::query)? {
        return Err(HandlerErr::new("not_found", "course not found")
            .with_details(json!({ "courseId": course_id })));
    }
    Ok(course_id)
}

fn courses_create(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_db(state)?;
    let name = get_required_str(&req.params, "name")?;
    let course_id = grouptool::create_course(conn, &name).map_err(|e| {
        HandlerErr::new("db_insert_failed", e.to_string()).with_details(json!({ "table": "courses" }))
    })?;
    Ok(json!({ "courseId": course_id, "name": name }))
}

fn groups_create(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_db(state)?;
    let course_id = require_course(conn, &req.params)?;
    let name = get_required_str(&req.params, "name")?;
    let group_id = grouptool::create_group(conn, course_id, &name).map_err(|e| {
        HandlerErr::new("db_insert_failed", e.to_string()).with_details(json!({ "table": "groups" }))
    })?;
    Ok(json!({ "groupId": group_id, "name": name }))
}

fn groupings_create(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_db(state)?;
    let course_id = require_course(conn, &req.params)?;
    let name = get_required_str(&req.params, "name")?;

    let mut group_ids = Vec::new();
    if let Some(v) = req.params.get("groupIds") {
        let arr = v
            .as_array()
            .ok_or_else(|| HandlerErr::bad_params("groupIds must be an array"))?;
        for item in arr {
            let gid = item
                .as_i64()
                .ok_or_else(|| HandlerErr::bad_params("groupIds must be integers"))?;
            group_ids.push(gid);
        }
    }
    let foreign =
        grouptool::foreign_groups(conn, course_id, &group_ids).map_err(HandlerErr::query)?;
    if !foreign.is_empty() {
        return Err(HandlerErr::bad_params("groupIds contains groups of another course")
            .with_details(json!({ "groupIds": foreign })));
    }

    let grouping_id = grouptool::create_grouping(conn, course_id, &name, &group_ids).map_err(
        |e| {
            HandlerErr::new("db_insert_failed", e.to_string())
                .with_details(json!({ "table": "groupings" }))
        },
    )?;
    Ok(json!({ "groupingId": grouping_id, "name": name }))
}

fn grouptool_create(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_db(state)?;
    let course_id = require_course(conn, &req.params)?;
    let cmid = get_required_i64(&req.params, "cmid")?;
    if cmid <= 0 {
        return Err(HandlerErr::bad_params("cmid must be positive"));
    }
    if grouptool::find_by_cmid(conn, cmid)
        .map_err(HandlerErr::query)?
        .is_some()
    {
        return Err(HandlerErr::bad_params("cmid already in use")
            .with_details(json!({ "cmid": cmid })));
    }
    let grpsize = get_optional_i64(&req.params, "grpsize")?;
    if grpsize.is_some_and(|n| n <= 0) {
        return Err(HandlerErr::bad_params("grpsize must be positive"));
    }

    let new = NewGrouptool {
        course_id,
        cmid,
        name: req
            .params
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or("Grouptool")
            .to_string(),
        use_size: get_bool(&req.params, "useSize", false),
        use_individual: get_bool(&req.params, "useIndividual", false),
        grpsize,
    };
    let created = grouptool::create_grouptool(conn, &new).map_err(|e| {
        HandlerErr::new("db_insert_failed", e.to_string())
            .with_details(json!({ "table": "grouptools" }))
    })?;
    tracing::info!(cmid, grouptool_id = created.id, "grouptool instance created");
    Ok(json!({ "grouptool": created }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "courses.create" => courses_create(state, req),
        "groups.create" => groups_create(state, req),
        "groupings.create" => groupings_create(state, req),
        "grouptool.create" => grouptool_create(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
