//! Template contexts for the sortable list. The host templating engine turns
//! these into markup; nothing here produces HTML directly.

use crate::sortlist::{GroupingRef, ViewRow};
use serde::Serialize;

pub const ROW_TEMPLATE: &str = "mod_grouptool/sortlist_entry";
pub const SUCCESS_TEMPLATE: &str = "core/notification_success";
pub const ERROR_TEMPLATE: &str = "core/notification_error";

pub fn hidden_field_name(group_id: i64) -> String {
    format!("order[{}]", group_id)
}

/// `class0` is carried by every checkbox; `classN` per grouping `N`.
pub fn checkbox_classes(groupings: &[GroupingRef]) -> String {
    std::iter::once("class0".to_string())
        .chain(groupings.iter().map(|g| format!("class{}", g.id)))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Visibility of the up/down anchors for the row at `index` of `len` rows.
pub fn move_controls(index: usize, len: usize) -> (bool, bool) {
    (index > 0, index + 1 < len)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowContext {
    pub data_id: i64,
    pub order: i64,
    pub name: String,
    pub size: Option<String>,
    pub hidden_input_name: String,
    pub checkbox_classes: String,
    pub selected: bool,
    pub show_move_up: bool,
    pub show_move_down: bool,
    pub groupings: Vec<String>,
}

pub fn row_contexts(rows: &[ViewRow]) -> Vec<RowContext> {
    let len = rows.len();
    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            let (up, down) = move_controls(i, len);
            RowContext {
                data_id: row.group_id,
                order: row.order,
                name: row.name.clone(),
                size: row.size.label(),
                hidden_input_name: hidden_field_name(row.group_id),
                checkbox_classes: checkbox_classes(&row.groupings),
                selected: row.selected,
                show_move_up: up,
                show_move_down: down,
                groupings: row.groupings.iter().map(|g| g.name.clone()).collect(),
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationContext {
    pub template: &'static str,
    pub message: String,
    pub extraclasses: &'static str,
}

pub fn notification_context(message: &str, is_error: bool) -> NotificationContext {
    NotificationContext {
        template: if is_error { ERROR_TEMPLATE } else { SUCCESS_TEMPLATE },
        message: message.to_string(),
        extraclasses: "infonode",
    }
}
