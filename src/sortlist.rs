//! View model for the sortable group list of one grouptool instance.

use crate::grouptool::{self, Grouptool};
use crate::reorder::{self, Direction};
use crate::session::ClientSession;
use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    Active,
    Inactive,
    #[default]
    #[serde(alias = "none")]
    All,
}

impl StatusFilter {
    fn sql(self) -> &'static str {
        match self {
            StatusFilter::Active => " AND agrp.active = 1",
            StatusFilter::Inactive => " AND agrp.active = 0",
            StatusFilter::All => "",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeDisplay {
    Explicit(i64),
    /// Instance/site default standing in for a missing per-group size; shown
    /// with a trailing `*`.
    Fallback(i64),
    Unlimited,
}

impl SizeDisplay {
    pub fn resolve(grouptool: &Grouptool, own: Option<i64>, global: i64) -> Self {
        if grouptool.use_size && (!grouptool.use_individual || own.is_none()) {
            return SizeDisplay::Fallback(global);
        }
        match own {
            Some(n) => SizeDisplay::Explicit(n),
            None => SizeDisplay::Unlimited,
        }
    }

    pub fn label(&self) -> Option<String> {
        match self {
            SizeDisplay::Explicit(n) => Some(n.to_string()),
            SizeDisplay::Fallback(n) => Some(format!("{}*", n)),
            SizeDisplay::Unlimited => None,
        }
    }
}

impl Serialize for SizeDisplay {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        self.label().serialize(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupingRef {
    pub id: i64,
    pub name: String,
}

/// One aggregated row as it comes back from the join.
#[derive(Debug, Clone)]
pub struct RawGroupRow {
    pub group_id: i64,
    pub agrp_id: Option<i64>,
    pub grouptool_id: Option<i64>,
    pub name: String,
    pub size: Option<i64>,
    pub sort_order: Option<i64>,
    pub status: Option<i64>,
}

impl RawGroupRow {
    fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            group_id: r.get(0)?,
            agrp_id: r.get(1)?,
            grouptool_id: r.get(2)?,
            name: r.get(3)?,
            size: r.get(4)?,
            sort_order: r.get(5)?,
            status: r.get(6)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewRow {
    pub group_id: i64,
    pub agrp_id: Option<i64>,
    pub grouptool_id: Option<i64>,
    pub name: String,
    pub size: SizeDisplay,
    pub stored_sort_order: Option<i64>,
    /// Running 1-based position in the rendered list.
    pub order: i64,
    pub active: bool,
    pub groupings: Vec<GroupingRef>,
    pub selected: bool,
}

impl ViewRow {
    pub fn from_raw(
        raw: RawGroupRow,
        order: i64,
        size: SizeDisplay,
        groupings: Vec<GroupingRef>,
    ) -> Result<Self, SortlistError> {
        if raw.name.trim().is_empty() {
            return Err(SortlistError::InvalidRow {
                group_id: raw.group_id,
                reason: "empty group name",
            });
        }
        if raw.agrp_id.is_some() && raw.sort_order.is_none() {
            return Err(SortlistError::InvalidRow {
                group_id: raw.group_id,
                reason: "active group without sort order",
            });
        }
        Ok(Self {
            group_id: raw.group_id,
            agrp_id: raw.agrp_id,
            grouptool_id: raw.grouptool_id,
            name: raw.name,
            size,
            stored_sort_order: raw.sort_order,
            order,
            active: raw.status.unwrap_or(0) != 0,
            groupings,
            selected: false,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SortlistError {
    #[error("group {group_id}: {reason}")]
    InvalidRow { group_id: i64, reason: &'static str },
    #[error(transparent)]
    Db(#[from] rusqlite::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassAction {
    Select,
    Deselect,
    Toggle,
}

impl ClassAction {
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "select" => Some(Self::Select),
            "deselect" => Some(Self::Deselect),
            "toggle" => Some(Self::Toggle),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum MoveOutcome {
    #[serde(rename_all = "camelCase")]
    Moved {
        group_id: i64,
        neighbour_group_id: i64,
    },
    #[serde(rename_all = "camelCase")]
    CouldNotMove { group_id: i64, direction: Direction },
}

impl MoveOutcome {
    pub fn notice(&self) -> Option<Notice> {
        match self {
            MoveOutcome::Moved { .. } => None,
            MoveOutcome::CouldNotMove { direction, .. } => Some(match direction {
                Direction::Up => Notice::problem("couldnt_move_up", "Couldn't move group up!"),
                Direction::Down => {
                    Notice::problem("couldnt_move_down", "Couldn't move group down!")
                }
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub kind: &'static str,
    pub key: &'static str,
    pub message: &'static str,
}

impl Notice {
    fn problem(key: &'static str, message: &'static str) -> Self {
        Self {
            kind: "notifyproblem",
            key,
            message,
        }
    }
}

/// Legacy single-step move (`moveup`/`movedown`). A missing record or
/// neighbour is reported, never an error, and leaves the order untouched.
pub fn apply_legacy_move(
    conn: &Connection,
    grouptool_id: i64,
    group_id: i64,
    direction: Direction,
) -> rusqlite::Result<MoveOutcome> {
    let not_moved = MoveOutcome::CouldNotMove {
        group_id,
        direction,
    };
    let Some(a) = reorder::find_agrp(conn, grouptool_id, group_id)? else {
        return Ok(not_moved);
    };
    let Some(b) = reorder::find_neighbour(conn, grouptool_id, &a, direction)? else {
        return Ok(not_moved);
    };
    reorder::swap_records(conn, &a, &b)?;
    Ok(MoveOutcome::Moved {
        group_id,
        neighbour_group_id: b.group_id,
    })
}

fn groupings_of_group(
    conn: &Connection,
    course_id: i64,
    group_id: i64,
) -> rusqlite::Result<Vec<GroupingRef>> {
    let mut stmt = conn.prepare_cached(
        "SELECT DISTINCT g.id, g.name
         FROM groupings_groups gg
         JOIN groupings g ON gg.grouping_id = g.id
         WHERE g.course_id = ? AND gg.group_id = ?
         ORDER BY g.name ASC, g.id ASC",
    )?;
    let rows = stmt
        .query_map((course_id, group_id), |r| {
            Ok(GroupingRef {
                id: r.get(0)?,
                name: r.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Groupings of the course that contain at least one group.
pub fn course_groupings(conn: &Connection, course_id: i64) -> rusqlite::Result<Vec<GroupingRef>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT g.id, g.name
         FROM groupings_groups gg
         JOIN groupings g ON gg.grouping_id = g.id
         WHERE g.course_id = ?
         ORDER BY g.name ASC, g.id ASC",
    )?;
    let rows = stmt
        .query_map([course_id], |r| {
            Ok(GroupingRef {
                id: r.get(0)?,
                name: r.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Every group of the course joined with its active-group record, ordered by
/// status, stored order and name. `order` is rewritten as `1..=n` in that
/// output order.
pub fn load_groups(
    conn: &Connection,
    grouptool: &Grouptool,
    filter: StatusFilter,
) -> Result<Vec<ViewRow>, SortlistError> {
    let sql = format!(
        "SELECT grp.id,
                MAX(agrp.id),
                MAX(agrp.grouptool_id),
                MAX(grp.name) AS grp_name,
                MAX(agrp.grpsize),
                MAX(agrp.sort_order) AS stored_order,
                MAX(agrp.active) AS status
         FROM groups grp
         LEFT JOIN grouptool_agrps agrp
              ON agrp.group_id = grp.id AND agrp.grouptool_id = ?
         WHERE grp.course_id = ?{}
         GROUP BY grp.id
         ORDER BY status DESC, stored_order ASC, grp_name ASC, grp.id ASC",
        filter.sql()
    );
    let mut stmt = conn.prepare(&sql)?;
    let raw = stmt
        .query_map((grouptool.id, grouptool.course_id), RawGroupRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    let global = grouptool::global_grpsize(conn, grouptool)?;
    let mut rows = Vec::with_capacity(raw.len());
    for (idx, r) in raw.into_iter().enumerate() {
        let groupings = groupings_of_group(conn, grouptool.course_id, r.group_id)?;
        let size = SizeDisplay::resolve(grouptool, r.size, global);
        rows.push(ViewRow::from_raw(r, idx as i64 + 1, size, groupings)?);
    }
    Ok(rows)
}

/// Group ids covered by the given groupings. Grouping `0` stands for every
/// group in `rows`.
fn groups_in_groupings(
    conn: &Connection,
    course_id: i64,
    groupings: &[i64],
    rows: &[ViewRow],
) -> rusqlite::Result<BTreeSet<i64>> {
    let mut out = BTreeSet::new();
    let mut stmt = conn.prepare(
        "SELECT gg.group_id
         FROM groupings_groups gg
         JOIN groupings g ON gg.grouping_id = g.id
         WHERE g.course_id = ? AND g.id = ?",
    )?;
    for gid in groupings {
        if *gid == 0 {
            out.extend(rows.iter().map(|r| r.group_id));
            continue;
        }
        let ids = stmt
            .query_map((course_id, gid), |r| r.get::<_, i64>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        out.extend(ids);
    }
    Ok(out)
}

pub fn apply_class_action(
    selection: &mut BTreeMap<i64, bool>,
    targets: &BTreeSet<i64>,
    action: ClassAction,
) {
    for gid in targets {
        let next = match action {
            ClassAction::Select => true,
            ClassAction::Deselect => false,
            ClassAction::Toggle => !selection.get(gid).copied().unwrap_or(false),
        };
        selection.insert(*gid, next);
    }
}

/// Request parameters understood by [`Sortlist::build`]. Field names follow
/// the query-string names of the classic form.
#[derive(Debug, Clone, Deserialize)]
pub struct SortlistParams {
    #[serde(default)]
    pub filter: StatusFilter,
    #[serde(default)]
    pub moveup: Option<i64>,
    #[serde(default)]
    pub movedown: Option<i64>,
    #[serde(default)]
    pub selected: Option<BTreeMap<i64, bool>>,
    /// Defaults to grouping `0`, every group.
    #[serde(default = "all_groupings")]
    pub groupings: Vec<i64>,
    #[serde(default)]
    pub class_action: Option<String>,
    #[serde(default)]
    pub do_class_action: bool,
}

fn all_groupings() -> Vec<i64> {
    vec![0]
}

impl Default for SortlistParams {
    fn default() -> Self {
        Self {
            filter: StatusFilter::default(),
            moveup: None,
            movedown: None,
            selected: None,
            groupings: all_groupings(),
            class_action: None,
            do_class_action: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Sortlist {
    pub cmid: i64,
    pub course_id: i64,
    pub grouptool_id: i64,
    pub filter: StatusFilter,
    pub use_size: bool,
    pub use_individual: bool,
    pub global_size: i64,
    pub groups: Vec<ViewRow>,
    pub groupings: Vec<GroupingRef>,
    pub moves: Vec<MoveOutcome>,
    pub notifications: Vec<Notice>,
}

impl Sortlist {
    /// Apply any legacy move command, then load the list and reconcile the
    /// selection against `session`.
    pub fn build(
        conn: &Connection,
        grouptool: &Grouptool,
        session: &mut ClientSession,
        params: &SortlistParams,
    ) -> Result<Self, SortlistError> {
        let mut moves = Vec::new();
        let legacy = [
            (params.moveup, Direction::Up),
            (params.movedown, Direction::Down),
        ];
        for (group_id, direction) in legacy {
            if let Some(gid) = group_id.filter(|g| *g != 0) {
                let outcome = apply_legacy_move(conn, grouptool.id, gid, direction)?;
                tracing::info!(group_id = gid, ?direction, ?outcome, "legacy move");
                moves.push(outcome);
            }
        }
        let notifications = moves.iter().filter_map(MoveOutcome::notice).collect();

        let mut groups = load_groups(conn, grouptool, params.filter)?;
        let mut selection = session.reconcile(params.selected.clone());

        if params.do_class_action && !params.groupings.is_empty() {
            match params.class_action.as_deref().and_then(ClassAction::parse) {
                Some(action) => {
                    let targets =
                        groups_in_groupings(conn, grouptool.course_id, &params.groupings, &groups)?;
                    apply_class_action(&mut selection, &targets, action);
                    session.overwrite_selection(selection.clone());
                }
                None => tracing::warn!(
                    action = ?params.class_action,
                    "ignoring unknown class action"
                ),
            }
        }

        for row in &mut groups {
            row.selected = selection.get(&row.group_id).copied().unwrap_or(false);
        }

        Ok(Self {
            cmid: grouptool.cmid,
            course_id: grouptool.course_id,
            grouptool_id: grouptool.id,
            filter: params.filter,
            use_size: grouptool.use_size,
            use_individual: grouptool.use_individual,
            global_size: grouptool::global_grpsize(conn, grouptool)?,
            groups,
            groupings: course_groupings(conn, grouptool.course_id)?,
            moves,
            notifications,
        })
    }
}
