use std::collections::{BTreeMap, HashMap};

pub const DEFAULT_SESSION: &str = "default";

/// Per-client state that survives between requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientSession {
    selected: BTreeMap<i64, bool>,
}

impl ClientSession {
    pub fn selected(&self) -> &BTreeMap<i64, bool> {
        &self.selected
    }

    pub fn is_selected(&self, group_id: i64) -> bool {
        self.selected.get(&group_id).copied().unwrap_or(false)
    }

    /// Replace the stored selection wholesale; entries are never merged.
    pub fn overwrite_selection(&mut self, selected: BTreeMap<i64, bool>) {
        self.selected = selected;
    }

    /// An explicit selection wins and is stored; otherwise the stored one is
    /// returned unchanged.
    pub fn reconcile(&mut self, explicit: Option<BTreeMap<i64, bool>>) -> BTreeMap<i64, bool> {
        if let Some(sel) = explicit {
            self.overwrite_selection(sel);
        }
        self.selected.clone()
    }
}

#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: HashMap<String, ClientSession>,
}

impl SessionStore {
    /// Session for `key`, created empty on first use.
    pub fn session_mut(&mut self, key: &str) -> &mut ClientSession {
        self.sessions.entry(key.to_string()).or_default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
