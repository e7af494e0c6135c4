//! Client half of the sortable list: an ordered row model that drives the
//! sidecar's reorder and swap methods.

mod controller;
mod transport;

pub use controller::{
    ClientError, DragOptions, ListRow, Notification, NotificationKind, SortlistController,
    DRAG_OPTIONS,
};
pub use transport::{RemoteCall, SidecarClient, TransportError};
