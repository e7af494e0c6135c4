use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;

/// Fallback group size when neither the instance nor the site config sets one.
pub const DEFAULT_GRPSIZE: i64 = 3;
pub const GRPSIZE_SETTING: &str = "grouptool.grpsize";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Grouptool {
    pub id: i64,
    pub course_id: i64,
    pub cmid: i64,
    pub name: String,
    pub use_size: bool,
    pub use_individual: bool,
    pub grpsize: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct NewGrouptool {
    pub course_id: i64,
    pub cmid: i64,
    pub name: String,
    pub use_size: bool,
    pub use_individual: bool,
    pub grpsize: Option<i64>,
}

impl Grouptool {
    fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: r.get(0)?,
            course_id: r.get(1)?,
            cmid: r.get(2)?,
            name: r.get(3)?,
            use_size: r.get::<_, i64>(4)? != 0,
            use_individual: r.get::<_, i64>(5)? != 0,
            grpsize: r.get(6)?,
        })
    }
}

pub fn create_course(conn: &Connection, name: &str) -> rusqlite::Result<i64> {
    conn.execute("INSERT INTO courses(name) VALUES(?)", [name])?;
    Ok(conn.last_insert_rowid())
}

pub fn course_exists(conn: &Connection, course_id: i64) -> rusqlite::Result<bool> {
    conn.query_row("SELECT 1 FROM courses WHERE id = ?", [course_id], |r| {
        r.get::<_, i64>(0)
    })
    .optional()
    .map(|v| v.is_some())
}

pub fn create_group(conn: &Connection, course_id: i64, name: &str) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO groups(course_id, name) VALUES(?, ?)",
        (course_id, name),
    )?;
    Ok(conn.last_insert_rowid())
}

/// Group ids of `group_ids` that do not belong to `course_id`.
pub fn foreign_groups(
    conn: &Connection,
    course_id: i64,
    group_ids: &[i64],
) -> rusqlite::Result<Vec<i64>> {
    let mut stmt = conn.prepare("SELECT course_id FROM groups WHERE id = ?")?;
    let mut out = Vec::new();
    for gid in group_ids {
        let owner: Option<i64> = stmt.query_row([gid], |r| r.get(0)).optional()?;
        if owner != Some(course_id) {
            out.push(*gid);
        }
    }
    Ok(out)
}

pub fn create_grouping(
    conn: &Connection,
    course_id: i64,
    name: &str,
    group_ids: &[i64],
) -> rusqlite::Result<i64> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO groupings(course_id, name) VALUES(?, ?)",
        (course_id, name),
    )?;
    let grouping_id = tx.last_insert_rowid();
    for gid in group_ids {
        tx.execute(
            "INSERT OR IGNORE INTO groupings_groups(grouping_id, group_id) VALUES(?, ?)",
            (grouping_id, gid),
        )?;
    }
    tx.commit()?;
    Ok(grouping_id)
}

pub fn create_grouptool(conn: &Connection, new: &NewGrouptool) -> rusqlite::Result<Grouptool> {
    conn.execute(
        "INSERT INTO grouptools(course_id, cmid, name, use_size, use_individual, grpsize)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            new.course_id,
            new.cmid,
            &new.name,
            new.use_size as i64,
            new.use_individual as i64,
            new.grpsize,
        ),
    )?;
    Ok(Grouptool {
        id: conn.last_insert_rowid(),
        course_id: new.course_id,
        cmid: new.cmid,
        name: new.name.clone(),
        use_size: new.use_size,
        use_individual: new.use_individual,
        grpsize: new.grpsize,
    })
}

pub fn find_by_cmid(conn: &Connection, cmid: i64) -> rusqlite::Result<Option<Grouptool>> {
    conn.query_row(
        "SELECT id, course_id, cmid, name, use_size, use_individual, grpsize
         FROM grouptools
         WHERE cmid = ?",
        [cmid],
        Grouptool::from_row,
    )
    .optional()
}

/// Instance size if set, otherwise the site setting, otherwise `DEFAULT_GRPSIZE`.
pub fn global_grpsize(conn: &Connection, grouptool: &Grouptool) -> anyhow::Result<i64> {
    if let Some(size) = grouptool.grpsize.filter(|s| *s > 0) {
        return Ok(size);
    }
    let configured = crate::db::settings_get_json(conn, GRPSIZE_SETTING)?
        .and_then(|v| v.get("grpsize").and_then(|s| s.as_i64()))
        .filter(|s| *s > 0);
    Ok(configured.unwrap_or(DEFAULT_GRPSIZE))
}
