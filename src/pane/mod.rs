//! Pane model (§4.5, §3 "Pane state"): the listing a single side of the
//! split view displays, plus cursor/selection/sort/filter state and
//! cursor-history restore.

pub mod cursor_history;

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::path::{DirEntry, Path};
use crate::util::glob_match_ci;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortMode {
    Name,
    Size,
    Mtime,
    Extension,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortState {
    pub mode: SortMode,
    pub reverse: bool,
}

impl Default for SortState {
    fn default() -> Self {
        SortState { mode: SortMode::Name, reverse: false }
    }
}

/// One displayed row. Wraps `DirEntry` with the synthetic `..` row the
/// backend never produces (§3: "only one `..` per listing and always
/// first when present").
#[derive(Debug, Clone, PartialEq)]
pub struct ListRow {
    pub path: Path,
    pub name: String,
    pub size: Option<u64>,
    pub mtime: Option<DateTime<Utc>>,
    pub is_dir: bool,
    pub is_symlink: bool,
    pub is_hidden: bool,
    pub is_parent: bool,
}

impl ListRow {
    fn parent(parent_path: Path) -> Self {
        ListRow {
            path: parent_path,
            name: "..".to_string(),
            size: None,
            mtime: None,
            is_dir: true,
            is_symlink: false,
            is_hidden: false,
            is_parent: true,
        }
    }

    fn from_entry(entry: DirEntry) -> Self {
        ListRow {
            path: entry.path,
            name: entry.name,
            size: entry.size,
            mtime: entry.mtime,
            is_dir: entry.is_dir,
            is_symlink: entry.is_symlink,
            is_hidden: entry.is_hidden,
            is_parent: false,
        }
    }

    /// `..` is never selectable, never a rename/delete target (§3).
    pub fn is_selectable(&self) -> bool {
        !self.is_parent
    }
}

/// `{ path, entries, cursor_index, scroll_offset, selection, sort,
/// filter_pattern, show_hidden }` from §3, with `raw_entries` holding
/// the backend's last listing so sort/filter/show-hidden can be
/// reapplied without a re-fetch.
#[derive(Debug, Clone)]
pub struct PaneState {
    path: Path,
    raw_entries: Vec<DirEntry>,
    entries: Vec<ListRow>,
    cursor_index: usize,
    scroll_offset: usize,
    selection: HashSet<String>,
    sort: SortState,
    filter_pattern: String,
    show_hidden: bool,
}

impl PaneState {
    pub fn new(path: Path) -> Self {
        PaneState {
            path,
            raw_entries: Vec::new(),
            entries: Vec::new(),
            cursor_index: 0,
            scroll_offset: 0,
            selection: HashSet::new(),
            sort: SortState::default(),
            filter_pattern: String::new(),
            show_hidden: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &[ListRow] {
        &self.entries
    }

    pub fn cursor_index(&self) -> usize {
        self.cursor_index
    }

    pub fn scroll_offset(&self) -> usize {
        self.scroll_offset
    }

    pub fn sort(&self) -> SortState {
        self.sort
    }

    pub fn filter_pattern(&self) -> &str {
        &self.filter_pattern
    }

    pub fn show_hidden(&self) -> bool {
        self.show_hidden
    }

    pub fn selection(&self) -> &HashSet<String> {
        &self.selection
    }

    /// Replaces the pane's directory and listing wholesale (navigation
    /// into a new directory); cursor/scroll/selection reset, the caller
    /// is expected to follow up with `restore_cursor_to` from cursor
    /// history.
    pub fn navigate(&mut self, path: Path, raw_entries: Vec<DirEntry>) {
        self.path = path;
        self.raw_entries = raw_entries;
        self.selection.clear();
        self.rebuild();
        self.cursor_index = 0;
        self.scroll_offset = 0;
    }

    /// Re-fetched listing for the *same* directory (after a file
    /// operation); preserves cursor identity by name when possible
    /// instead of resetting to the top.
    pub fn refresh(&mut self, raw_entries: Vec<DirEntry>) {
        let current_name = self.current_entry_name().map(str::to_string);
        self.raw_entries = raw_entries;
        self.rebuild();
        if let Some(name) = current_name {
            self.restore_cursor_to(&name);
        } else {
            self.clamp_cursor();
        }
    }

    pub fn set_sort(&mut self, sort: SortState) {
        let current_name = self.current_entry_name().map(str::to_string);
        self.sort = sort;
        self.rebuild();
        if let Some(name) = current_name {
            self.restore_cursor_to(&name);
        } else {
            self.clamp_cursor();
        }
    }

    /// Glob applied to `name` case-insensitively (§3); never mutates
    /// `raw_entries`.
    pub fn set_filter_pattern(&mut self, pattern: String) {
        self.filter_pattern = pattern;
        self.rebuild();
        self.clamp_cursor();
    }

    pub fn set_show_hidden(&mut self, show_hidden: bool) {
        self.show_hidden = show_hidden;
        self.rebuild();
        self.clamp_cursor();
    }

    fn rebuild(&mut self) {
        let mut rows: Vec<ListRow> = self
            .raw_entries
            .iter()
            .filter(|e| self.show_hidden || !e.is_hidden)
            .filter(|e| self.filter_pattern.is_empty() || glob_match_ci(&self.filter_pattern, &e.name))
            .cloned()
            .map(ListRow::from_entry)
            .collect();
        sort_rows(&mut rows, self.sort);

        let mut entries = Vec::with_capacity(rows.len() + 1);
        if !self.path.parts().is_empty() {
            entries.push(ListRow::parent(self.path.parent()));
        }
        entries.extend(rows);
        self.entries = entries;
    }

    fn clamp_cursor(&mut self) {
        if self.entries.is_empty() {
            self.cursor_index = 0;
        } else if self.cursor_index >= self.entries.len() {
            self.cursor_index = self.entries.len() - 1;
        }
    }

    pub fn cursor_row(&self) -> Option<&ListRow> {
        self.entries.get(self.cursor_index)
    }

    /// Name recorded for cursor-history on leaving this directory (§4.5);
    /// `..` never counts as the current entry.
    pub fn current_entry_name(&self) -> Option<&str> {
        self.cursor_row().filter(|r| r.is_selectable()).map(|r| r.name.as_str())
    }

    pub fn move_cursor(&mut self, delta: isize) {
        if self.entries.is_empty() {
            self.cursor_index = 0;
            return;
        }
        let len = self.entries.len() as isize;
        let mut next = self.cursor_index as isize + delta;
        next = next.clamp(0, len - 1);
        self.cursor_index = next as usize;
    }

    pub fn set_cursor_index(&mut self, index: usize) {
        self.cursor_index = index;
        self.clamp_cursor();
    }

    /// §4.5 cursor history restore: recorded filename if still present,
    /// else the entry sorted immediately before where it would have
    /// been (§3).
    pub fn restore_cursor_to(&mut self, name: &str) {
        if let Some(pos) = self.entries.iter().position(|r| r.name == name) {
            self.cursor_index = pos;
            return;
        }
        self.cursor_index = self.predecessor_index(name);
        self.clamp_cursor();
    }

    /// Index of the last selectable row that would sort before `name`
    /// under the current sort direction, falling back to the first
    /// selectable row if none would. Name is the only attribute cursor
    /// history retains for the vanished entry, so this orders by name
    /// regardless of the active sort mode.
    fn predecessor_index(&self, name: &str) -> usize {
        let key = name.to_lowercase();
        let mut predecessor = None;
        for (idx, row) in self.entries.iter().enumerate() {
            if !row.is_selectable() {
                continue;
            }
            let row_key = row.name.to_lowercase();
            let before = if self.sort.reverse { row_key > key } else { row_key < key };
            if before {
                predecessor = Some(idx);
            }
        }
        predecessor.unwrap_or_else(|| self.entries.iter().position(|r| r.is_selectable()).unwrap_or(0))
    }

    pub fn toggle_selection(&mut self, name: &str) {
        if self.entries.iter().any(|r| r.name == name && r.is_selectable()) {
            if !self.selection.remove(name) {
                self.selection.insert(name.to_string());
            }
        }
    }

    pub fn select_all(&mut self) {
        self.selection = self.entries.iter().filter(|r| r.is_selectable()).map(|r| r.name.clone()).collect();
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Effective selection for batch operations: the explicit selection
    /// set if non-empty, else the single cursor row (§6 "if no explicit
    /// selection, the selection contains the single cursor-row name").
    pub fn effective_selection(&self) -> Vec<&ListRow> {
        if self.selection.is_empty() {
            self.cursor_row().filter(|r| r.is_selectable()).into_iter().collect()
        } else {
            self.entries.iter().filter(|r| self.selection.contains(&r.name)).collect()
        }
    }
}

fn sort_rows(rows: &mut [ListRow], sort: SortState) {
    rows.sort_by(|a, b| {
        // Directories before files regardless of sort mode, matching
        // every file manager's listing convention; ties broken by mode.
        let dir_order = b.is_dir.cmp(&a.is_dir);
        if dir_order != std::cmp::Ordering::Equal {
            return dir_order;
        }
        let ordering = match sort.mode {
            SortMode::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            SortMode::Size => a.size.unwrap_or(0).cmp(&b.size.unwrap_or(0)),
            SortMode::Mtime => a.mtime.cmp(&b.mtime),
            SortMode::Extension => extension_of(&a.name).cmp(&extension_of(&b.name)),
        };
        if sort.reverse {
            ordering.reverse()
        } else {
            ordering
        }
    });
}

fn extension_of(name: &str) -> String {
    std::path::Path::new(name).extension().map(|e| e.to_string_lossy().to_lowercase()).unwrap_or_default()
}
