//! Key-binding table (§6, §4.5): action → configurable key specs, plus
//! the (hardcoded, not user-configurable) selection requirement each
//! action carries.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::input::{Key, Modifiers};

/// Bindable actions. New variants should also get an entry in
/// `default_bindings` and `selection_requirement`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    MoveUp,
    MoveDown,
    MovePageUp,
    MovePageDown,
    MoveHome,
    MoveEnd,
    EnterDirectory,
    GoParent,
    SwitchPane,
    ToggleSelection,
    SelectAll,
    ClearSelection,
    Copy,
    Move,
    Delete,
    Rename,
    MkDir,
    MkFile,
    CreateArchive,
    ExtractArchive,
    FilterEntries,
    ToggleHidden,
    CycleSort,
    ReverseSort,
    SearchFilename,
    SearchContent,
    JumpToPath,
    OpenFile,
    ViewFile,
    EditFile,
    ShowDrives,
    Refresh,
    Quit,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::MoveUp => "move_up",
            Action::MoveDown => "move_down",
            Action::MovePageUp => "move_page_up",
            Action::MovePageDown => "move_page_down",
            Action::MoveHome => "move_home",
            Action::MoveEnd => "move_end",
            Action::EnterDirectory => "enter_directory",
            Action::GoParent => "go_parent",
            Action::SwitchPane => "switch_pane",
            Action::ToggleSelection => "toggle_selection",
            Action::SelectAll => "select_all",
            Action::ClearSelection => "clear_selection",
            Action::Copy => "copy",
            Action::Move => "move",
            Action::Delete => "delete",
            Action::Rename => "rename",
            Action::MkDir => "mkdir",
            Action::MkFile => "mkfile",
            Action::CreateArchive => "create_archive",
            Action::ExtractArchive => "extract_archive",
            Action::FilterEntries => "filter_entries",
            Action::ToggleHidden => "toggle_hidden",
            Action::CycleSort => "cycle_sort",
            Action::ReverseSort => "reverse_sort",
            Action::SearchFilename => "search_filename",
            Action::SearchContent => "search_content",
            Action::JumpToPath => "jump_to_path",
            Action::OpenFile => "open_file",
            Action::ViewFile => "view_file",
            Action::EditFile => "edit_file",
            Action::ShowDrives => "show_drives",
            Action::Refresh => "refresh",
            Action::Quit => "quit",
        }
    }

    /// Whether the current pane selection must satisfy `any` / `none` /
    /// `required` before the resolver invokes this action (§4.5). This
    /// is a property of the action, not user policy, so it is code, not
    /// config.
    pub fn selection_requirement(self) -> SelectionRequirement {
        match self {
            Action::Copy | Action::Move | Action::Delete | Action::CreateArchive => SelectionRequirement::Any,
            Action::Rename => SelectionRequirement::Required,
            Action::SelectAll => SelectionRequirement::None,
            _ => SelectionRequirement::Any,
        }
    }

    const ALL: [Action; 33] = [
        Action::MoveUp,
        Action::MoveDown,
        Action::MovePageUp,
        Action::MovePageDown,
        Action::MoveHome,
        Action::MoveEnd,
        Action::EnterDirectory,
        Action::GoParent,
        Action::SwitchPane,
        Action::ToggleSelection,
        Action::SelectAll,
        Action::ClearSelection,
        Action::Copy,
        Action::Move,
        Action::Delete,
        Action::Rename,
        Action::MkDir,
        Action::MkFile,
        Action::CreateArchive,
        Action::ExtractArchive,
        Action::FilterEntries,
        Action::ToggleHidden,
        Action::CycleSort,
        Action::ReverseSort,
        Action::SearchFilename,
        Action::SearchContent,
        Action::JumpToPath,
        Action::OpenFile,
        Action::ViewFile,
        Action::EditFile,
        Action::ShowDrives,
        Action::Refresh,
        Action::Quit,
    ];
}

/// `any`: fires regardless of selection. `none`: fires only with an
/// empty selection (and no cursor-row fallback). `required`: fires only
/// with a non-empty effective selection (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionRequirement {
    Any,
    None,
    Required,
}

/// One key combination, stored as its human-readable spec string (e.g.
/// `"Ctrl+C"`, `"F5"`, `"Enter"`) so the TOML file stays readable;
/// parsed on demand via `parse`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeySpec(pub String);

impl KeySpec {
    pub fn new(spec: impl Into<String>) -> Self {
        KeySpec(spec.into())
    }

    pub fn parse(&self) -> Option<(Key, Modifiers)> {
        let mut modifiers = Modifiers::default();
        let mut rest = self.0.as_str();
        loop {
            if let Some(stripped) = rest.strip_prefix("Ctrl+") {
                modifiers.ctrl = true;
                rest = stripped;
            } else if let Some(stripped) = rest.strip_prefix("Alt+") {
                modifiers.alt = true;
                rest = stripped;
            } else if let Some(stripped) = rest.strip_prefix("Shift+") {
                modifiers.shift = true;
                rest = stripped;
            } else {
                break;
            }
        }
        let key = Key::parse_name(rest)?;
        Some((key, modifiers))
    }
}

/// The built-in key map (A.4), used both as the `Config` default and as
/// the fallback for a partially-specified user config.
pub fn default_bindings() -> HashMap<String, Vec<KeySpec>> {
    let mut map = HashMap::new();
    let mut bind = |action: Action, specs: &[&str]| {
        map.insert(action.as_str().to_string(), specs.iter().map(|s| KeySpec::new(*s)).collect());
    };
    bind(Action::MoveUp, &["Up", "k"]);
    bind(Action::MoveDown, &["Down", "j"]);
    bind(Action::MovePageUp, &["PageUp"]);
    bind(Action::MovePageDown, &["PageDown"]);
    bind(Action::MoveHome, &["Home"]);
    bind(Action::MoveEnd, &["End"]);
    bind(Action::EnterDirectory, &["Enter", "Right"]);
    bind(Action::GoParent, &["Backspace", "Left"]);
    bind(Action::SwitchPane, &["Tab"]);
    bind(Action::ToggleSelection, &["Insert", "Space"]);
    bind(Action::SelectAll, &["Ctrl+A"]);
    bind(Action::ClearSelection, &["Ctrl+D"]);
    bind(Action::Copy, &["F5"]);
    bind(Action::Move, &["F6"]);
    bind(Action::Delete, &["F8", "Delete"]);
    bind(Action::Rename, &["F2", "Shift+F6"]);
    bind(Action::MkDir, &["F7"]);
    bind(Action::MkFile, &["Shift+F7"]);
    bind(Action::CreateArchive, &["Ctrl+F5"]);
    bind(Action::ExtractArchive, &["Ctrl+F6"]);
    bind(Action::FilterEntries, &["Ctrl+F"]);
    bind(Action::ToggleHidden, &["Ctrl+H"]);
    bind(Action::CycleSort, &["Ctrl+S"]);
    bind(Action::ReverseSort, &["Ctrl+Shift+S"]);
    bind(Action::SearchFilename, &["F3"]);
    bind(Action::SearchContent, &["Alt+F7"]);
    bind(Action::JumpToPath, &["Ctrl+G"]);
    bind(Action::OpenFile, &["F4"]);
    bind(Action::ViewFile, &["F3"]);
    bind(Action::EditFile, &["Shift+F4"]);
    bind(Action::ShowDrives, &["Alt+F1"]);
    bind(Action::Refresh, &["Ctrl+R"]);
    bind(Action::Quit, &["F10", "Ctrl+Q"]);
    map
}
