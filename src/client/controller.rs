use super::transport::{RemoteCall, TransportError};
use crate::render::{self, NotificationContext};
use crate::reorder::{Direction, OrderEntry};
use crate::sortlist::ClassAction;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragOptions {
    pub vertical_only: bool,
    /// Delay before a press turns into a drag, so plain clicks still work.
    pub delay: Duration,
    pub opacity: f32,
    pub handle: &'static str,
    pub items: &'static str,
    pub helper: &'static str,
}

pub const DRAG_OPTIONS: DragOptions = DragOptions {
    vertical_only: true,
    delay: Duration::from_millis(150),
    opacity: 0.5,
    handle: "[data-drag]",
    items: ".mod_grouptool_sortlist_entry",
    helper: "clone",
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRow {
    pub id: i64,
    /// `None` for course groups not registered with the instance.
    pub agrp_id: Option<i64>,
    pub active: bool,
    pub order: i64,
    pub name: String,
    /// Grouping ids; every row also carries class `0`.
    pub classes: Vec<i64>,
    pub selected: bool,
}

impl ListRow {
    fn has_class(&self, class: i64) -> bool {
        class == 0 || self.classes.contains(&class)
    }

    /// Rows of a `sortlist.open` result.
    pub fn from_sortlist(result: &Value) -> Result<Vec<Self>, ClientError> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Grouping {
            id: i64,
        }
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Row {
            group_id: i64,
            #[serde(default)]
            agrp_id: Option<i64>,
            #[serde(default)]
            active: bool,
            order: i64,
            name: String,
            #[serde(default)]
            groupings: Vec<Grouping>,
            #[serde(default)]
            selected: bool,
        }

        let groups = result
            .get("groups")
            .cloned()
            .ok_or_else(|| ClientError::Response("missing groups".into()))?;
        let rows: Vec<Row> =
            serde_json::from_value(groups).map_err(|e| ClientError::Response(e.to_string()))?;
        Ok(rows
            .into_iter()
            .map(|r| ListRow {
                id: r.group_id,
                agrp_id: r.agrp_id,
                active: r.active,
                order: r.order,
                name: r.name,
                classes: r.groupings.into_iter().map(|g| g.id).collect(),
                selected: r.selected,
            })
            .collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Error,
}

/// Transient banner shown above the list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
    pub auto_dismiss: Duration,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Success,
            message: message.into(),
            auto_dismiss: Duration::from_secs(5),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Error,
            message: message.into(),
            auto_dismiss: Duration::from_secs(60),
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind == NotificationKind::Error
    }

    pub fn context(&self) -> NotificationContext {
        render::notification_context(&self.message, self.is_error())
    }

    fn from_result(result: &Value) -> Result<Self, ClientError> {
        if let Some(e) = result.get("error").and_then(|v| v.as_str()) {
            return Ok(Self::error(e));
        }
        match result.get("message").and_then(|v| v.as_str()) {
            Some(m) => Ok(Self::success(m)),
            None => Err(ClientError::Response(
                "result carries neither message nor error".into(),
            )),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("no row at position {0}")]
    NoRow(usize),
    #[error("row {index} has no neighbour {direction:?}")]
    NoNeighbour { index: usize, direction: Direction },
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("unexpected response: {0}")]
    Response(String),
}

/// Ordered row model of one sortable list. The model is the authority on
/// order; hidden form values and row attributes are derived from it.
pub struct SortlistController<T> {
    cmid: i64,
    rows: Vec<ListRow>,
    remote: T,
}

impl<T: RemoteCall> SortlistController<T> {
    pub fn initialize(cmid: i64, rows: Vec<ListRow>, remote: T) -> Self {
        tracing::info!(cmid, rows = rows.len(), "initialize grouptool sortlist");
        Self { cmid, rows, remote }
    }

    pub fn rows(&self) -> &[ListRow] {
        &self.rows
    }

    pub fn remote_mut(&mut self) -> &mut T {
        &mut self.remote
    }

    pub fn drag_options(&self) -> DragOptions {
        DRAG_OPTIONS
    }

    /// Order submission for the registered rows. Active and inactive rows
    /// are numbered separately, each from 1, in list order.
    pub fn payload(&self) -> Vec<OrderEntry> {
        let (mut active, mut inactive) = (0, 0);
        let mut out = Vec::with_capacity(self.rows.len());
        for row in self.rows.iter().filter(|r| r.agrp_id.is_some()) {
            let counter = if row.active { &mut active } else { &mut inactive };
            *counter += 1;
            out.push(OrderEntry {
                group_id: row.id,
                order: *counter,
            });
        }
        out
    }

    /// `order[<id>]` values for the form fallback without scripting.
    pub fn hidden_fields(&self) -> Vec<(String, i64)> {
        self.rows
            .iter()
            .map(|r| (render::hidden_field_name(r.id), r.order))
            .collect()
    }

    /// `(show_up, show_down)` per row.
    pub fn move_controls(&self) -> Vec<(bool, bool)> {
        (0..self.rows.len())
            .map(|i| render::move_controls(i, self.rows.len()))
            .collect()
    }

    pub fn selected_ids(&self) -> Vec<i64> {
        self.rows.iter().filter(|r| r.selected).map(|r| r.id).collect()
    }

    /// Drop of the row dragged from `from` onto position `to`: renumber every
    /// row by position and submit the order of the registered rows. A list
    /// without registered rows makes no call.
    pub fn on_drag_end(&mut self, from: usize, to: usize) -> Result<Option<Notification>, ClientError> {
        if self.rows.is_empty() {
            return Ok(None);
        }
        let len = self.rows.len();
        if from >= len {
            return Err(ClientError::NoRow(from));
        }
        if to >= len {
            return Err(ClientError::NoRow(to));
        }

        let row = self.rows.remove(from);
        self.rows.insert(to, row);
        for (i, row) in self.rows.iter_mut().enumerate() {
            row.order = i as i64 + 1;
        }

        let payload = self.payload();
        if payload.is_empty() {
            return Ok(None);
        }
        let result = self.remote.call(
            "groups.reorder",
            json!({ "cmid": self.cmid, "order": payload }),
        )?;
        let notification = Notification::from_result(&result)?;
        if notification.is_error() {
            tracing::info!(error = %notification.message, "reorder groups returned an error");
        } else {
            tracing::info!(message = %notification.message, "reorder groups succeeded");
        }
        Ok(Some(notification))
    }

    /// Swap the row at `index` with its neighbour. Nothing is sent when the
    /// neighbour does not exist; the model only changes after the server
    /// confirmed the swap.
    pub fn on_move_step(
        &mut self,
        index: usize,
        direction: Direction,
    ) -> Result<Notification, ClientError> {
        if index >= self.rows.len() {
            return Err(ClientError::NoRow(index));
        }
        let other = match direction {
            Direction::Up => index.checked_sub(1),
            Direction::Down => Some(index + 1).filter(|i| *i < self.rows.len()),
        }
        .ok_or(ClientError::NoNeighbour { index, direction })?;

        let result = self.remote.call(
            "groups.swap",
            json!({
                "cmid": self.cmid,
                "a": self.rows[index].id,
                "b": self.rows[other].id,
            }),
        )?;
        let notification = Notification::from_result(&result)?;
        if notification.is_error() {
            return Ok(notification);
        }

        let (this_order, other_order) = (self.rows[index].order, self.rows[other].order);
        self.rows.swap(index, other);
        self.rows[index].order = this_order;
        self.rows[other].order = other_order;
        tracing::info!(message = %notification.message, "swapped groups");
        Ok(notification)
    }

    /// Apply `select`/`deselect`/`toggle` to every row in any of
    /// `grouping_ids`. Returns the number of rows touched; unknown tokens
    /// touch none.
    pub fn on_checkbox_controller_action(&mut self, token: &str, grouping_ids: &[i64]) -> usize {
        let Some(action) = ClassAction::parse(token) else {
            tracing::warn!(token, "undefined new checkbox state");
            return 0;
        };
        let mut touched = 0;
        for row in self
            .rows
            .iter_mut()
            .filter(|r| grouping_ids.iter().any(|g| r.has_class(*g)))
        {
            row.selected = match action {
                ClassAction::Select => true,
                ClassAction::Deselect => false,
                ClassAction::Toggle => !row.selected,
            };
            touched += 1;
        }
        touched
    }

    pub fn select_all(&mut self) -> usize {
        self.on_checkbox_controller_action("select", &[0])
    }

    pub fn select_none(&mut self) -> usize {
        self.on_checkbox_controller_action("deselect", &[0])
    }
}
