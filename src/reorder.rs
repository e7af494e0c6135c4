//! Persistence of active-group ordering.
//!
//! `sort_order` is kept unique and dense per grouptool instance and active
//! flag. Every mutation here runs in a single transaction so a failure leaves
//! the previous order intact.

use crate::events::{AgrpDeleted, AgrpDeletedData, EventError};
use crate::grouptool::{self, Grouptool};
use rusqlite::{Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, thiserror::Error)]
pub enum ReorderError {
    #[error("no active group registered for group {0}")]
    NotFound(i64),
    #[error("group {0} is listed more than once")]
    DuplicateGroup(i64),
    #[error("order values must be a permutation of 1..={expected}")]
    NotPermutation { expected: usize },
    #[error("order must list all {expected} {partition} groups, got {got}")]
    Incomplete {
        partition: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("groups {a} and {b} are not both active or both inactive")]
    MixedPartition { a: i64, b: i64 },
    #[error("group {0} does not belong to this course")]
    ForeignGroup(i64),
    #[error(transparent)]
    Event(#[from] EventError),
    #[error(transparent)]
    Db(#[from] rusqlite::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    fn step(self) -> i64 {
        match self {
            Direction::Up => -1,
            Direction::Down => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderEntry {
    #[serde(rename = "groupid", alias = "groupId")]
    pub group_id: i64,
    pub order: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgrpRef {
    pub id: i64,
    pub group_id: i64,
    pub sort_order: i64,
    pub active: bool,
}

impl AgrpRef {
    fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: r.get(0)?,
            group_id: r.get(1)?,
            sort_order: r.get(2)?,
            active: r.get::<_, i64>(3)? != 0,
        })
    }
}

pub fn find_agrp(
    conn: &Connection,
    grouptool_id: i64,
    group_id: i64,
) -> rusqlite::Result<Option<AgrpRef>> {
    conn.query_row(
        "SELECT id, group_id, sort_order, active
         FROM grouptool_agrps
         WHERE grouptool_id = ? AND group_id = ?",
        (grouptool_id, group_id),
        AgrpRef::from_row,
    )
    .optional()
}

/// The record one step away from `of` within its active-flag partition.
pub fn find_neighbour(
    conn: &Connection,
    grouptool_id: i64,
    of: &AgrpRef,
    direction: Direction,
) -> rusqlite::Result<Option<AgrpRef>> {
    conn.query_row(
        "SELECT id, group_id, sort_order, active
         FROM grouptool_agrps
         WHERE grouptool_id = ? AND sort_order = ? AND active = ? AND id <> ?
         LIMIT 1",
        (
            grouptool_id,
            of.sort_order + direction.step(),
            of.active as i64,
            of.id,
        ),
        AgrpRef::from_row,
    )
    .optional()
}

/// Exchange the `sort_order` of exactly two records of the same partition.
/// Applying it twice restores the previous order.
pub fn swap_groups(
    conn: &Connection,
    grouptool_id: i64,
    group_a: i64,
    group_b: i64,
) -> Result<(AgrpRef, AgrpRef), ReorderError> {
    let a = find_agrp(conn, grouptool_id, group_a)?.ok_or(ReorderError::NotFound(group_a))?;
    let b = find_agrp(conn, grouptool_id, group_b)?.ok_or(ReorderError::NotFound(group_b))?;
    if a.active != b.active {
        return Err(ReorderError::MixedPartition {
            a: group_a,
            b: group_b,
        });
    }
    swap_records(conn, &a, &b)?;
    Ok((
        AgrpRef {
            sort_order: b.sort_order,
            ..a
        },
        AgrpRef {
            sort_order: a.sort_order,
            ..b
        },
    ))
}

pub(crate) fn swap_records(conn: &Connection, a: &AgrpRef, b: &AgrpRef) -> rusqlite::Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "UPDATE grouptool_agrps SET sort_order = ? WHERE id = ?",
        (b.sort_order, a.id),
    )?;
    tx.execute(
        "UPDATE grouptool_agrps SET sort_order = ? WHERE id = ?",
        (a.sort_order, b.id),
    )?;
    tx.commit()?;
    tracing::debug!(a = a.id, b = b.id, "swapped sort_order");
    Ok(())
}

/// Write every submitted order value. The submission is validated in full
/// before the first write: ids must be registered and distinct, and for each
/// partition it touches it must list every record of that partition with
/// order values exactly `1..=k`. Untouched partitions keep their order.
pub fn reorder_groups(
    conn: &Connection,
    grouptool_id: i64,
    entries: &[OrderEntry],
) -> Result<usize, ReorderError> {
    if entries.is_empty() {
        return Ok(0);
    }

    let mut seen = HashSet::new();
    let mut partitions: BTreeMap<bool, Vec<(AgrpRef, i64)>> = BTreeMap::new();
    for entry in entries {
        if !seen.insert(entry.group_id) {
            return Err(ReorderError::DuplicateGroup(entry.group_id));
        }
        let agrp = find_agrp(conn, grouptool_id, entry.group_id)?
            .ok_or(ReorderError::NotFound(entry.group_id))?;
        partitions
            .entry(agrp.active)
            .or_default()
            .push((agrp, entry.order));
    }

    for (active, records) in &partitions {
        // Every listed id is distinct and carries this flag, so equal counts
        // mean the whole partition was submitted.
        let expected = partition_size(conn, grouptool_id, *active)?;
        if records.len() != expected {
            return Err(ReorderError::Incomplete {
                partition: partition_label(*active),
                expected,
                got: records.len(),
            });
        }
        let mut orders: Vec<i64> = records.iter().map(|(_, order)| *order).collect();
        orders.sort_unstable();
        if orders
            .iter()
            .enumerate()
            .any(|(i, order)| *order != i as i64 + 1)
        {
            return Err(ReorderError::NotPermutation {
                expected: records.len(),
            });
        }
    }

    let tx = conn.unchecked_transaction()?;
    let mut changed = 0;
    for (agrp, order) in partitions.values().flatten() {
        if agrp.sort_order != *order {
            changed += tx.execute(
                "UPDATE grouptool_agrps SET sort_order = ? WHERE id = ?",
                (order, agrp.id),
            )?;
        }
    }
    tx.commit()?;
    tracing::info!(grouptool_id, rows = entries.len(), changed, "groups reordered");
    Ok(changed)
}

fn partition_label(active: bool) -> &'static str {
    if active {
        "active"
    } else {
        "inactive"
    }
}

fn partition_size(conn: &Connection, grouptool_id: i64, active: bool) -> rusqlite::Result<usize> {
    conn.query_row(
        "SELECT COUNT(*) FROM grouptool_agrps WHERE grouptool_id = ? AND active = ?",
        (grouptool_id, active as i64),
        |r| r.get::<_, i64>(0),
    )
    .map(|n| n as usize)
}

fn next_sort_order(conn: &Connection, grouptool_id: i64, active: bool) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COALESCE(MAX(sort_order), 0) + 1
         FROM grouptool_agrps
         WHERE grouptool_id = ? AND active = ?",
        (grouptool_id, active as i64),
        |r| r.get(0),
    )
}

fn close_gap(conn: &Connection, grouptool_id: i64, removed: &AgrpRef) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE grouptool_agrps
         SET sort_order = sort_order - 1
         WHERE grouptool_id = ? AND active = ? AND sort_order > ?",
        (grouptool_id, removed.active as i64, removed.sort_order),
    )
}

/// Register `group_id` with the instance (appended last among active
/// groups). Re-activating an inactive record moves it to the active end.
pub fn activate_group(
    conn: &Connection,
    grouptool: &Grouptool,
    group_id: i64,
    grpsize: Option<i64>,
) -> Result<AgrpRef, ReorderError> {
    if !grouptool::foreign_groups(conn, grouptool.course_id, &[group_id])?.is_empty() {
        return Err(ReorderError::ForeignGroup(group_id));
    }

    if let Some(existing) = find_agrp(conn, grouptool.id, group_id)? {
        if grpsize.is_some() {
            conn.execute(
                "UPDATE grouptool_agrps SET grpsize = ? WHERE id = ?",
                (grpsize, existing.id),
            )?;
        }
        return set_active(conn, grouptool.id, group_id, true);
    }

    let tx = conn.unchecked_transaction()?;
    let sort_order = next_sort_order(&tx, grouptool.id, true)?;
    tx.execute(
        "INSERT INTO grouptool_agrps(grouptool_id, group_id, sort_order, grpsize, active)
         VALUES(?, ?, ?, ?, 1)",
        (grouptool.id, group_id, sort_order, grpsize),
    )?;
    let id = tx.last_insert_rowid();
    tx.commit()?;
    Ok(AgrpRef {
        id,
        group_id,
        sort_order,
        active: true,
    })
}

pub fn set_active(
    conn: &Connection,
    grouptool_id: i64,
    group_id: i64,
    active: bool,
) -> Result<AgrpRef, ReorderError> {
    let current =
        find_agrp(conn, grouptool_id, group_id)?.ok_or(ReorderError::NotFound(group_id))?;
    if current.active == active {
        return Ok(current);
    }

    let tx = conn.unchecked_transaction()?;
    close_gap(&tx, grouptool_id, &current)?;
    let sort_order = next_sort_order(&tx, grouptool_id, active)?;
    tx.execute(
        "UPDATE grouptool_agrps SET active = ?, sort_order = ? WHERE id = ?",
        (active as i64, sort_order, current.id),
    )?;
    tx.commit()?;
    Ok(AgrpRef {
        sort_order,
        active,
        ..current
    })
}

/// Remove the record, close the gap it leaves and log `agrp_deleted`. The
/// event is built before commit; if it does not validate nothing is deleted.
pub fn delete_agrp(
    conn: &Connection,
    grouptool: &Grouptool,
    group_id: i64,
) -> Result<AgrpDeleted, ReorderError> {
    let agrp =
        find_agrp(conn, grouptool.id, group_id)?.ok_or(ReorderError::NotFound(group_id))?;

    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM grouptool_agrps WHERE id = ?", [agrp.id])?;
    close_gap(&tx, grouptool.id, &agrp)?;

    let event = AgrpDeleted::create(AgrpDeletedData {
        agrpid: Some(agrp.id),
        groupid: Some(agrp.group_id),
        cmid: Some(grouptool.cmid),
        grouptoolid: Some(grouptool.id),
        courseid: Some(grouptool.course_id),
    })?;
    event.emit(&tx)?;
    tx.commit()?;
    Ok(event)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db;
    use crate::grouptool::{create_course, create_group, create_grouptool, NewGrouptool};

    pub(crate) fn fixture(names: &[&str]) -> (Connection, Grouptool, Vec<i64>) {
        let conn = Connection::open_in_memory().unwrap();
        db::init_schema(&conn).unwrap();
        let course = create_course(&conn, "Course").unwrap();
        let gt = create_grouptool(
            &conn,
            &NewGrouptool {
                course_id: course,
                cmid: 42,
                name: "GT".into(),
                ..Default::default()
            },
        )
        .unwrap();
        let ids = names
            .iter()
            .map(|n| {
                let gid = create_group(&conn, course, n).unwrap();
                activate_group(&conn, &gt, gid, None).unwrap();
                gid
            })
            .collect();
        (conn, gt, ids)
    }

    fn order_of(conn: &Connection, gt: &Grouptool, gid: i64) -> i64 {
        find_agrp(conn, gt.id, gid).unwrap().unwrap().sort_order
    }

    /// `(group_id, active, sort_order)` of every record, by group id.
    pub(crate) fn stored(conn: &Connection, gt: &Grouptool) -> Vec<(i64, bool, i64)> {
        let mut stmt = conn
            .prepare(
                "SELECT group_id, active, sort_order FROM grouptool_agrps
                 WHERE grouptool_id = ? ORDER BY group_id",
            )
            .unwrap();
        let rows = stmt
            .query_map([gt.id], |r| {
                Ok((r.get(0)?, r.get::<_, i64>(1)? != 0, r.get(2)?))
            })
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        rows
    }

    /// Each partition holds exactly `1..=k`.
    pub(crate) fn assert_dense(conn: &Connection, gt: &Grouptool) {
        for active in [true, false] {
            let mut orders: Vec<i64> = stored(conn, gt)
                .into_iter()
                .filter(|(_, a, _)| *a == active)
                .map(|(_, _, o)| o)
                .collect();
            orders.sort_unstable();
            let expected: Vec<i64> = (1..=orders.len() as i64).collect();
            assert_eq!(orders, expected, "partition active={}", active);
        }
    }

    #[test]
    fn activation_appends_dense_orders() {
        let (conn, gt, ids) = fixture(&["A", "B", "C"]);
        let orders: Vec<i64> = ids.iter().map(|g| order_of(&conn, &gt, *g)).collect();
        assert_eq!(orders, vec![1, 2, 3]);
    }

    #[test]
    fn swap_is_self_inverse() {
        let (conn, gt, ids) = fixture(&["A", "B", "C"]);
        swap_groups(&conn, gt.id, ids[0], ids[2]).unwrap();
        assert_eq!(order_of(&conn, &gt, ids[0]), 3);
        assert_eq!(order_of(&conn, &gt, ids[2]), 1);
        assert_eq!(order_of(&conn, &gt, ids[1]), 2);

        swap_groups(&conn, gt.id, ids[0], ids[2]).unwrap();
        assert_eq!(order_of(&conn, &gt, ids[0]), 1);
        assert_eq!(order_of(&conn, &gt, ids[2]), 3);
    }

    #[test]
    fn swap_with_unknown_group_changes_nothing() {
        let (conn, gt, ids) = fixture(&["A", "B"]);
        let err = swap_groups(&conn, gt.id, ids[0], 999).unwrap_err();
        assert!(matches!(err, ReorderError::NotFound(999)));
        assert_eq!(order_of(&conn, &gt, ids[0]), 1);
    }

    #[test]
    fn reorder_applies_permutation_and_is_idempotent() {
        let (conn, gt, ids) = fixture(&["A", "B", "C"]);
        let entries = vec![
            OrderEntry { group_id: ids[2], order: 1 },
            OrderEntry { group_id: ids[0], order: 2 },
            OrderEntry { group_id: ids[1], order: 3 },
        ];
        assert_eq!(reorder_groups(&conn, gt.id, &entries).unwrap(), 3);
        assert_eq!(reorder_groups(&conn, gt.id, &entries).unwrap(), 0);
        assert_eq!(order_of(&conn, &gt, ids[2]), 1);
        assert_eq!(order_of(&conn, &gt, ids[0]), 2);
        assert_eq!(order_of(&conn, &gt, ids[1]), 3);
    }

    #[test]
    fn reorder_rejects_bad_submissions_without_writing() {
        let (conn, gt, ids) = fixture(&["A", "B"]);
        let dup = vec![
            OrderEntry { group_id: ids[0], order: 2 },
            OrderEntry { group_id: ids[0], order: 1 },
        ];
        assert!(matches!(
            reorder_groups(&conn, gt.id, &dup),
            Err(ReorderError::DuplicateGroup(_))
        ));

        let gap = vec![
            OrderEntry { group_id: ids[0], order: 2 },
            OrderEntry { group_id: ids[1], order: 3 },
        ];
        assert!(matches!(
            reorder_groups(&conn, gt.id, &gap),
            Err(ReorderError::NotPermutation { expected: 2 })
        ));

        let unknown = vec![
            OrderEntry { group_id: ids[1], order: 1 },
            OrderEntry { group_id: 999, order: 2 },
        ];
        assert!(matches!(
            reorder_groups(&conn, gt.id, &unknown),
            Err(ReorderError::NotFound(999))
        ));

        assert_eq!(order_of(&conn, &gt, ids[0]), 1);
        assert_eq!(order_of(&conn, &gt, ids[1]), 2);
        assert_eq!(reorder_groups(&conn, gt.id, &[]).unwrap(), 0);
    }

    #[test]
    fn deactivation_moves_record_between_partitions() {
        let (conn, gt, ids) = fixture(&["A", "B", "C"]);
        let moved = set_active(&conn, gt.id, ids[0], false).unwrap();
        assert_eq!(moved.sort_order, 1);
        assert!(!moved.active);
        assert_eq!(order_of(&conn, &gt, ids[1]), 1);
        assert_eq!(order_of(&conn, &gt, ids[2]), 2);

        let back = activate_group(&conn, &gt, ids[0], None).unwrap();
        assert_eq!(back.sort_order, 3);
        assert!(back.active);
    }

    #[test]
    fn neighbour_lookup_stays_in_partition() {
        let (conn, gt, ids) = fixture(&["A", "B", "C", "D", "E"]);
        for gid in &ids[2..] {
            set_active(&conn, gt.id, *gid, false).unwrap();
        }
        let a = find_agrp(&conn, gt.id, ids[0]).unwrap().unwrap();
        let below = find_neighbour(&conn, gt.id, &a, Direction::Down).unwrap().unwrap();
        assert_eq!(below.group_id, ids[1]);
        assert!(find_neighbour(&conn, gt.id, &a, Direction::Up).unwrap().is_none());

        // B is last among active groups; E holds sort_order 3 inactive.
        let b = find_agrp(&conn, gt.id, ids[1]).unwrap().unwrap();
        assert!(find_neighbour(&conn, gt.id, &b, Direction::Down).unwrap().is_none());
        let c = find_agrp(&conn, gt.id, ids[2]).unwrap().unwrap();
        assert!(find_neighbour(&conn, gt.id, &c, Direction::Up).unwrap().is_none());
    }

    #[test]
    fn partial_reorder_is_rejected_without_writing() {
        let (conn, gt, ids) = fixture(&["A", "B", "C"]);
        let before = stored(&conn, &gt);
        let partial = vec![
            OrderEntry { group_id: ids[2], order: 1 },
            OrderEntry { group_id: ids[0], order: 2 },
        ];
        assert!(matches!(
            reorder_groups(&conn, gt.id, &partial),
            Err(ReorderError::Incomplete {
                partition: "active",
                expected: 3,
                got: 2
            })
        ));
        assert_eq!(stored(&conn, &gt), before);
        assert_dense(&conn, &gt);
    }

    #[test]
    fn reorder_of_mixed_list_numbers_each_partition() {
        let (conn, gt, ids) = fixture(&["A", "B", "C", "D"]);
        set_active(&conn, gt.id, ids[2], false).unwrap();
        set_active(&conn, gt.id, ids[3], false).unwrap();

        let entries = vec![
            OrderEntry { group_id: ids[1], order: 1 },
            OrderEntry { group_id: ids[0], order: 2 },
            OrderEntry { group_id: ids[3], order: 1 },
            OrderEntry { group_id: ids[2], order: 2 },
        ];
        assert_eq!(reorder_groups(&conn, gt.id, &entries).unwrap(), 4);
        assert_eq!(
            stored(&conn, &gt),
            vec![
                (ids[0], true, 2),
                (ids[1], true, 1),
                (ids[2], false, 2),
                (ids[3], false, 1)
            ]
        );
        assert_dense(&conn, &gt);

        // Only the inactive partition, listed in full, leaves the active one alone.
        let inactive_only = vec![
            OrderEntry { group_id: ids[2], order: 1 },
            OrderEntry { group_id: ids[3], order: 2 },
        ];
        assert_eq!(reorder_groups(&conn, gt.id, &inactive_only).unwrap(), 2);
        assert_eq!(order_of(&conn, &gt, ids[1]), 1);
        assert_dense(&conn, &gt);

        // Active orders running on past the active partition are not a permutation.
        let continued = vec![
            OrderEntry { group_id: ids[0], order: 1 },
            OrderEntry { group_id: ids[1], order: 2 },
            OrderEntry { group_id: ids[2], order: 3 },
            OrderEntry { group_id: ids[3], order: 4 },
        ];
        assert!(matches!(
            reorder_groups(&conn, gt.id, &continued),
            Err(ReorderError::NotPermutation { expected: 2 })
        ));
        assert_dense(&conn, &gt);
    }

    #[test]
    fn swap_across_partitions_is_rejected() {
        let (conn, gt, ids) = fixture(&["A", "B", "C"]);
        set_active(&conn, gt.id, ids[2], false).unwrap();
        let before = stored(&conn, &gt);

        let err = swap_groups(&conn, gt.id, ids[1], ids[2]).unwrap_err();
        assert!(matches!(err, ReorderError::MixedPartition { .. }));
        assert_eq!(stored(&conn, &gt), before);
        assert_dense(&conn, &gt);
    }

    #[test]
    fn delete_closes_gap_and_logs_event() {
        let (conn, gt, ids) = fixture(&["A", "B", "C"]);
        let event = delete_agrp(&conn, &gt, ids[0]).unwrap();
        assert_eq!(event.group_id(), ids[0]);
        assert_eq!(event.context_instance_id, 42);
        assert!(find_agrp(&conn, gt.id, ids[0]).unwrap().is_none());
        assert_eq!(order_of(&conn, &gt, ids[1]), 1);
        assert_eq!(order_of(&conn, &gt, ids[2]), 2);

        let logged: i64 = conn
            .query_row("SELECT COUNT(*) FROM event_log", [], |r| r.get(0))
            .unwrap();
        assert_eq!(logged, 1);
    }

    #[test]
    fn activating_foreign_group_is_rejected() {
        let (conn, gt, _) = fixture(&["A"]);
        let other = create_course(&conn, "Other").unwrap();
        let foreign = create_group(&conn, other, "X").unwrap();
        assert!(matches!(
            activate_group(&conn, &gt, foreign, None),
            Err(ReorderError::ForeignGroup(_))
        ));
    }
}
