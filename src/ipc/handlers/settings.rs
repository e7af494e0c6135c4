use crate::db;
use crate::grouptool::{DEFAULT_GRPSIZE, GRPSIZE_SETTING};
use crate::ipc::error::{require_db, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::{json, Map, Value};

#[derive(Clone, Copy)]
enum SettingsSection {
    Grouptool,
}

impl SettingsSection {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "grouptool" => Some(Self::Grouptool),
            _ => None,
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Grouptool => GRPSIZE_SETTING,
        }
    }

    fn default_value(self) -> Value {
        match self {
            Self::Grouptool => json!({ "grpsize": DEFAULT_GRPSIZE }),
        }
    }
}

fn load_section(conn: &Connection, section: SettingsSection) -> anyhow::Result<Value> {
    let mut value = section.default_value();
    if let (Some(stored), Some(target)) = (
        db::settings_get_json(conn, section.key())?,
        value.as_object_mut(),
    ) {
        if let Some(obj) = stored.as_object() {
            for (k, v) in obj {
                target.insert(k.clone(), v.clone());
            }
        }
    }
    Ok(value)
}

fn merge_section_patch(
    section: SettingsSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let target = current
        .as_object_mut()
        .ok_or_else(|| "internal settings object must be a JSON object".to_string())?;
    for (k, v) in patch {
        match (section, k.as_str()) {
            (SettingsSection::Grouptool, "grpsize") => {
                let Some(n) = v.as_i64().filter(|n| *n > 0) else {
                    return Err("grpsize must be a positive integer".to_string());
                };
                target.insert(k.clone(), json!(n));
            }
            _ => return Err(format!("unknown setting: {}", k)),
        }
    }
    Ok(())
}

fn settings_get(state: &mut AppState, _req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_db(state)?;
    let grouptool = load_section(conn, SettingsSection::Grouptool).map_err(HandlerErr::query)?;
    Ok(json!({ "grouptool": grouptool }))
}

fn settings_update(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_db(state)?;
    let section_raw = req
        .params
        .get("section")
        .and_then(|v| v.as_str())
        .ok_or_else(|| HandlerErr::bad_params("missing section"))?;
    let section = SettingsSection::parse(section_raw)
        .ok_or_else(|| HandlerErr::bad_params("unknown section"))?;
    let patch = req
        .params
        .get("patch")
        .and_then(|v| v.as_object())
        .ok_or_else(|| HandlerErr::bad_params("patch must be an object"))?;

    let mut current = load_section(conn, section).map_err(HandlerErr::query)?;
    merge_section_patch(section, &mut current, patch).map_err(HandlerErr::bad_params)?;
    db::settings_set_json(conn, section.key(), &current).map_err(HandlerErr::update)?;
    tracing::info!(section = section_raw, "settings updated");
    Ok(json!({ "ok": true, "value": current }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "settings.get" => Some(respond(&req.id, settings_get(state, req))),
        "settings.update" => Some(respond(&req.id, settings_update(state, req))),
        _ => None,
    }
}
