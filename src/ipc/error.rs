use crate::grouptool::{self, Grouptool};
use crate::ipc::types::AppState;
use crate::reorder::ReorderError;
use rusqlite::Connection;
use serde_json::json;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        Self::new("bad_params", message)
    }

    pub fn query(e: impl ToString) -> Self {
        Self::new("db_query_failed", e.to_string())
    }

    pub fn update(e: impl ToString) -> Self {
        Self::new("db_update_failed", e.to_string())
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<ReorderError> for HandlerErr {
    fn from(e: ReorderError) -> Self {
        let code = match &e {
            ReorderError::NotFound(_) => "not_found",
            ReorderError::DuplicateGroup(_)
            | ReorderError::NotPermutation { .. }
            | ReorderError::Incomplete { .. }
            | ReorderError::MixedPartition { .. }
            | ReorderError::ForeignGroup(_) => "bad_params",
            ReorderError::Event(_) => "event_invalid",
            ReorderError::Db(_) | ReorderError::Other(_) => "db_update_failed",
        };
        Self::new(code, e.to_string())
    }
}

/// Collapse a handler result into the response envelope.
pub fn respond(id: &str, result: Result<serde_json::Value, HandlerErr>) -> serde_json::Value {
    match result {
        Ok(v) => ok(id, v),
        Err(e) => e.response(id),
    }
}

pub fn require_db(state: &AppState) -> Result<&Connection, HandlerErr> {
    state
        .db
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

pub fn get_required_i64(params: &serde_json::Value, key: &str) -> Result<i64, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_i64().or_else(|| v.as_str().and_then(|s| s.trim().parse().ok())))
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    let s = params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))?;
    if s.is_empty() {
        return Err(HandlerErr::bad_params(format!("{} must not be empty", key)));
    }
    Ok(s)
}

pub fn get_optional_i64(params: &serde_json::Value, key: &str) -> Result<Option<i64>, HandlerErr> {
    match params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be an integer or null", key))),
    }
}

pub fn get_bool(params: &serde_json::Value, key: &str, default: bool) -> bool {
    params.get(key).and_then(|v| v.as_bool()).unwrap_or(default)
}

/// Grouptool instance addressed by `params.cmid`.
pub fn require_grouptool(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<Grouptool, HandlerErr> {
    let cmid = get_required_i64(params, "cmid")?;
    grouptool::find_by_cmid(conn, cmid)
        .map_err(HandlerErr::query)?
        .ok_or_else(|| {
            HandlerErr::new("not_found", "grouptool instance not found")
                .with_details(json!({ "cmid": cmid }))
        })
}
