//! Audit events for active-group lifecycle changes.
//!
//! Events are validated when they are built; a malformed event never reaches
//! `event_log`, and the reader re-validates stored rows through the same
//! constructor.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

pub const EDU_LEVEL_TEACHING: i64 = 1;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EventError {
    #[error("CMID must be specified")]
    MissingCmid,
    #[error("Group-ID must be specified")]
    MissingGroupId,
    #[error("Active-Group-ID must be specified")]
    MissingAgrpId,
    #[error("unexpected event name {0}")]
    UnknownEvent(String),
    #[error("malformed event payload: {0}")]
    Payload(String),
}

/// Payload carried in the `other` field of an `agrp_deleted` event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgrpDeletedData {
    #[serde(default)]
    pub agrpid: Option<i64>,
    #[serde(default)]
    pub groupid: Option<i64>,
    #[serde(default)]
    pub cmid: Option<i64>,
    #[serde(default)]
    pub grouptoolid: Option<i64>,
    #[serde(default)]
    pub courseid: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgrpDeleted {
    pub object_id: i64,
    pub context_instance_id: i64,
    pub other: AgrpDeletedData,
}

fn present(v: Option<i64>) -> Option<i64> {
    v.filter(|id| *id != 0)
}

impl AgrpDeleted {
    pub const NAME: &'static str = "agrp_deleted";
    pub const CRUD: &'static str = "d";
    pub const OBJECT_TABLE: &'static str = "grouptool_agrps";

    pub fn create(data: AgrpDeletedData) -> Result<Self, EventError> {
        let cmid = present(data.cmid).ok_or(EventError::MissingCmid)?;
        present(data.groupid).ok_or(EventError::MissingGroupId)?;
        let object_id = present(data.agrpid).ok_or(EventError::MissingAgrpId)?;
        Ok(Self {
            object_id,
            context_instance_id: cmid,
            other: data,
        })
    }

    pub fn agrp_id(&self) -> i64 {
        self.object_id
    }

    pub fn group_id(&self) -> i64 {
        self.other.groupid.unwrap_or_default()
    }

    pub fn url(&self) -> String {
        format!("/mod/grouptool/view.php?id={}&tab=overview", self.context_instance_id)
    }

    pub fn description(&self) -> String {
        format!(
            "The active group with id '{}' representing group with id '{}' in grouptool with the course module id '{}' has been deleted.",
            self.agrp_id(),
            self.group_id(),
            self.context_instance_id
        )
    }

    /// Tuple kept for log consumers that still read the pre-event format:
    /// course, table, action, url, object id, context instance.
    pub fn legacy_log_data(&self) -> (Option<i64>, &'static str, String, String, i64, i64) {
        (
            self.other.courseid,
            Self::OBJECT_TABLE,
            format!("agrp deleted id '{}'", self.agrp_id()),
            format!("view.php?id={}&tab=overview", self.context_instance_id),
            self.object_id,
            self.context_instance_id,
        )
    }

    pub fn emit(&self, conn: &Connection) -> anyhow::Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let other_json = serde_json::to_string(&self.other)?;
        conn.execute(
            "INSERT INTO event_log(
                id, event_name, crud, edu_level, object_table, object_id,
                context_instance_id, other_json, created_at
             ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)",
            (
                &id,
                Self::NAME,
                Self::CRUD,
                EDU_LEVEL_TEACHING,
                Self::OBJECT_TABLE,
                self.object_id,
                self.context_instance_id,
                &other_json,
                chrono::Utc::now().to_rfc3339(),
            ),
        )?;
        tracing::info!(
            event = Self::NAME,
            agrp_id = self.agrp_id(),
            group_id = self.group_id(),
            cmid = self.context_instance_id,
            "event emitted"
        );
        Ok(id)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggedEvent {
    pub id: String,
    pub event_name: String,
    pub crud: String,
    pub object_id: i64,
    pub context_instance_id: i64,
    pub description: String,
    pub url: String,
    pub created_at: String,
}

/// Read back the newest events for a module context, oldest first. Rows that
/// no longer validate are reported as errors instead of being skipped.
pub fn list_recent(
    conn: &Connection,
    cmid: i64,
    limit: i64,
) -> anyhow::Result<Vec<Result<LoggedEvent, EventError>>> {
    let mut stmt = conn.prepare(
        "SELECT id, event_name, crud, other_json, created_at
         FROM (
           SELECT rowid AS rid, id, event_name, crud, other_json, created_at
           FROM event_log
           WHERE context_instance_id = ?
           ORDER BY rowid DESC
           LIMIT ?
         )
         ORDER BY rid ASC",
    )?;
    let rows = stmt
        .query_map((cmid, limit), |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, String>(2)?,
                r.get::<_, String>(3)?,
                r.get::<_, String>(4)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows
        .into_iter()
        .map(|(id, name, crud, other_json, created_at)| {
            if name != AgrpDeleted::NAME {
                return Err(EventError::UnknownEvent(name));
            }
            let data: AgrpDeletedData = serde_json::from_str(&other_json)
                .map_err(|e| EventError::Payload(e.to_string()))?;
            let ev = AgrpDeleted::create(data)?;
            Ok(LoggedEvent {
                id,
                event_name: name,
                crud,
                object_id: ev.object_id,
                context_instance_id: ev.context_instance_id,
                description: ev.description(),
                url: ev.url(),
                created_at,
            })
        })
        .collect())
}
