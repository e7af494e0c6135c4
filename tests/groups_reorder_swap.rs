mod test_support;

use serde_json::json;
use test_support::{error_code, listed_ids, request, request_ok, seed_course, spawn_sidecar};

#[test]
fn reorder_applies_full_permutation_and_is_idempotent() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let seeded = seed_course(
        &mut stdin,
        &mut reader,
        "grouptool-reorder",
        json!({ "cmid": 11 }),
        &["Alpha", "Beta", "Gamma"],
    );
    let (a, b, c) = (seeded.group_ids[0], seeded.group_ids[1], seeded.group_ids[2]);
    let order = json!([
        { "groupid": c, "order": 1 },
        { "groupid": a, "order": 2 },
        { "groupid": b, "order": 3 }
    ]);

    let first = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "groups.reorder",
        json!({ "cmid": seeded.cmid, "order": order.clone() }),
    );
    assert_eq!(first["message"], "Reordered 3 groups");
    let list = request_ok(&mut stdin, &mut reader, "2", "sortlist.open", json!({ "cmid": seeded.cmid }));
    assert_eq!(listed_ids(&list), vec![c, a, b]);

    let again = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "reorder_groups",
        json!({ "cmid": seeded.cmid, "order": order }),
    );
    assert!(again.get("error").is_none());
    let list = request_ok(&mut stdin, &mut reader, "4", "sortlist.open", json!({ "cmid": seeded.cmid }));
    assert_eq!(listed_ids(&list), vec![c, a, b]);

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn rejected_reorder_leaves_order_untouched() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let seeded = seed_course(
        &mut stdin,
        &mut reader,
        "grouptool-reorder-reject",
        json!({ "cmid": 12 }),
        &["Alpha", "Beta"],
    );
    let (a, b) = (seeded.group_ids[0], seeded.group_ids[1]);

    let gap = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "groups.reorder",
        json!({ "cmid": seeded.cmid, "order": [
            { "groupid": b, "order": 1 },
            { "groupid": a, "order": 3 }
        ] }),
    );
    assert!(gap["error"].as_str().expect("error").contains("permutation"));

    let unknown = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "groups.reorder",
        json!({ "cmid": seeded.cmid, "order": [
            { "groupid": b, "order": 1 },
            { "groupid": 99999, "order": 2 }
        ] }),
    );
    assert!(unknown.get("error").is_some());

    let list = request_ok(&mut stdin, &mut reader, "3", "sortlist.open", json!({ "cmid": seeded.cmid }));
    assert_eq!(listed_ids(&list), vec![a, b]);

    let empty = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "groups.reorder",
        json!({ "cmid": seeded.cmid, "order": [] }),
    );
    assert_eq!(empty["message"], "Reordered 0 groups");

    let missing = request(&mut stdin, &mut reader, "5", "groups.reorder", json!({ "cmid": seeded.cmid }));
    assert_eq!(error_code(&missing), Some("bad_params"));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn swap_twice_restores_order_and_unknown_group_changes_nothing() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let seeded = seed_course(
        &mut stdin,
        &mut reader,
        "grouptool-swap",
        json!({ "cmid": 13 }),
        &["Alpha", "Beta", "Gamma"],
    );
    let (a, b, c) = (seeded.group_ids[0], seeded.group_ids[1], seeded.group_ids[2]);

    let swapped = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "groups.swap",
        json!({ "cmid": seeded.cmid, "a": a, "b": b }),
    );
    assert_eq!(swapped["message"], format!("Swapped groups {} and {}", a, b));
    let list = request_ok(&mut stdin, &mut reader, "2", "sortlist.open", json!({ "cmid": seeded.cmid }));
    assert_eq!(listed_ids(&list), vec![b, a, c]);

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "swap_groups",
        json!({ "cmid": seeded.cmid, "a": a, "b": b }),
    );
    let list = request_ok(&mut stdin, &mut reader, "4", "sortlist.open", json!({ "cmid": seeded.cmid }));
    assert_eq!(listed_ids(&list), vec![a, b, c]);

    let failed = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "groups.swap",
        json!({ "cmid": seeded.cmid, "a": c, "b": 424242 }),
    );
    assert!(failed["error"].as_str().expect("error").contains("424242"));
    let list = request_ok(&mut stdin, &mut reader, "6", "sortlist.open", json!({ "cmid": seeded.cmid }));
    assert_eq!(listed_ids(&list), vec![a, b, c]);

    let no_tool = request(
        &mut stdin,
        &mut reader,
        "7",
        "groups.swap",
        json!({ "cmid": 999, "a": a, "b": b }),
    );
    assert_eq!(error_code(&no_tool), Some("not_found"));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn legacy_move_reports_boundary_and_swaps_neighbours() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let seeded = seed_course(
        &mut stdin,
        &mut reader,
        "grouptool-legacy-move",
        json!({ "cmid": 14 }),
        &["Alpha", "Beta"],
    );
    let (a, b) = (seeded.group_ids[0], seeded.group_ids[1]);

    let top = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "sortlist.move",
        json!({ "cmid": seeded.cmid, "groupId": a, "direction": "up" }),
    );
    assert_eq!(top["outcome"]["outcome"], "couldNotMove");
    assert_eq!(top["notification"]["key"], "couldnt_move_up");

    let down = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "sortlist.move",
        json!({ "cmid": seeded.cmid, "groupId": a, "direction": "down" }),
    );
    assert_eq!(down["outcome"]["outcome"], "moved");
    assert!(down["notification"].is_null());

    let list = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "sortlist.open",
        json!({ "cmid": seeded.cmid, "moveup": a }),
    );
    assert_eq!(listed_ids(&list), vec![a, b]);
    assert_eq!(list["moves"][0]["outcome"], "moved");

    let bad = request(
        &mut stdin,
        &mut reader,
        "4",
        "sortlist.move",
        json!({ "cmid": seeded.cmid, "groupId": a, "direction": "sideways" }),
    );
    assert_eq!(error_code(&bad), Some("bad_params"));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn partition_boundaries_reject_partial_reorder_and_mixed_swap() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let seeded = seed_course(
        &mut stdin,
        &mut reader,
        "grouptool-partitions",
        json!({ "cmid": 15 }),
        &["A", "B", "C", "D", "E"],
    );
    let ids = seeded.group_ids.clone();
    for (i, gid) in ids[2..].iter().enumerate() {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("deactivate-{}", i),
            "agrps.setActive",
            json!({ "cmid": seeded.cmid, "groupId": gid, "active": false }),
        );
    }

    let partial = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "groups.reorder",
        json!({ "cmid": seeded.cmid, "order": [{ "groupid": ids[1], "order": 1 }] }),
    );
    assert!(partial["error"].as_str().expect("error").contains("all 2 active"));

    let mixed = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "groups.swap",
        json!({ "cmid": seeded.cmid, "a": ids[1], "b": ids[2] }),
    );
    assert!(mixed.get("error").is_some());

    let edge = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "sortlist.move",
        json!({ "cmid": seeded.cmid, "groupId": ids[1], "direction": "down" }),
    );
    assert_eq!(edge["outcome"]["outcome"], "couldNotMove");

    let list = request_ok(&mut stdin, &mut reader, "4", "sortlist.open", json!({ "cmid": seeded.cmid }));
    assert_eq!(listed_ids(&list), ids);
    let stored: Vec<(bool, i64)> = list["groups"]
        .as_array()
        .expect("groups")
        .iter()
        .map(|g| {
            (
                g["active"].as_bool().expect("active"),
                g["storedSortOrder"].as_i64().expect("storedSortOrder"),
            )
        })
        .collect();
    assert_eq!(
        stored,
        vec![(true, 1), (true, 2), (false, 1), (false, 2), (false, 3)]
    );

    drop(stdin);
    let _ = child.wait();
}
