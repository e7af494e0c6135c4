use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("grouptool.sqlite3");
    let conn = Connection::open(db_path)?;
    init_schema(&conn)?;
    Ok(conn)
}

/// Create (or migrate) every table the sidecar uses. Split from `open_db` so
/// unit tests can run against `Connection::open_in_memory()`.
pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS courses(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS groups(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            course_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            FOREIGN KEY(course_id) REFERENCES courses(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_groups_course ON groups(course_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS groupings(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            course_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            FOREIGN KEY(course_id) REFERENCES courses(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS groupings_groups(
            grouping_id INTEGER NOT NULL,
            group_id INTEGER NOT NULL,
            PRIMARY KEY(grouping_id, group_id),
            FOREIGN KEY(grouping_id) REFERENCES groupings(id),
            FOREIGN KEY(group_id) REFERENCES groups(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_groupings_groups_group ON groupings_groups(group_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS grouptools(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            course_id INTEGER NOT NULL,
            cmid INTEGER NOT NULL UNIQUE,
            name TEXT NOT NULL,
            use_size INTEGER NOT NULL DEFAULT 0,
            use_individual INTEGER NOT NULL DEFAULT 0,
            grpsize INTEGER,
            FOREIGN KEY(course_id) REFERENCES courses(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS grouptool_agrps(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            grouptool_id INTEGER NOT NULL,
            group_id INTEGER NOT NULL,
            sort_order INTEGER NOT NULL,
            grpsize INTEGER,
            FOREIGN KEY(grouptool_id) REFERENCES grouptools(id),
            FOREIGN KEY(group_id) REFERENCES groups(id),
            UNIQUE(grouptool_id, group_id)
        )",
        [],
    )?;
    // Workspaces created before the active flag existed treat every agrp as active.
    ensure_agrps_active(conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_agrps_grouptool_sort ON grouptool_agrps(grouptool_id, sort_order)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS event_log(
            id TEXT PRIMARY KEY,
            event_name TEXT NOT NULL,
            crud TEXT NOT NULL,
            edu_level INTEGER NOT NULL,
            object_table TEXT NOT NULL,
            object_id INTEGER NOT NULL,
            context_instance_id INTEGER NOT NULL,
            other_json TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_event_log_context ON event_log(context_instance_id)",
        [],
    )?;

    Ok(())
}

fn ensure_agrps_active(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "grouptool_agrps", "active")? {
        return Ok(());
    }
    conn.execute(
        "ALTER TABLE grouptool_agrps ADD COLUMN active INTEGER NOT NULL DEFAULT 1",
        [],
    )?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}
