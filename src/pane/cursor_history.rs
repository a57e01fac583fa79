//! Cursor history (§3 "Cursor history", §4.5): `path-URI → last-cursor-
//! filename`, persisted by `crate::state` and consulted on directory
//! entry/exit.

use std::collections::HashMap;

use crate::path::Path;

/// In-memory mirror of the persisted mapping; `crate::state` loads this
/// at startup and saves it at shutdown (or on a save-on-change policy —
/// left to the caller).
#[derive(Debug, Clone, Default)]
pub struct CursorHistory {
    entries: HashMap<String, String>,
}

impl CursorHistory {
    pub fn new() -> Self {
        CursorHistory::default()
    }

    pub fn from_entries(entries: HashMap<String, String>) -> Self {
        CursorHistory { entries }
    }

    pub fn entries(&self) -> &HashMap<String, String> {
        &self.entries
    }

    /// Called when the pane leaves `path` with `current_name` under the
    /// cursor.
    pub fn record(&mut self, path: &Path, current_name: &str) {
        self.entries.insert(path.to_uri_string(), current_name.to_string());
    }

    /// Called when the pane enters `path`; the caller passes the result
    /// to `PaneState::restore_cursor_to` if present.
    pub fn lookup(&self, path: &Path) -> Option<&str> {
        self.entries.get(&path.to_uri_string()).map(String::as_str)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn record_then_lookup_round_trips() {
        let mut history = CursorHistory::new();
        let path = Path::parse("/home/user/docs");
        history.record(&path, "report.pdf");
        assert_eq!(history.lookup(&path), Some("report.pdf"));
    }

    #[test]
    fn unknown_path_has_no_record() {
        let history = CursorHistory::new();
        assert_eq!(history.lookup(&Path::parse("/unseen")), None);
    }
}
