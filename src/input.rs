//! Input event model and router (§4.5, §6): a `Command | Text` event
//! stream from an external input collaborator, command-vs-text dispatch
//! and selection-aware key-binding resolution.

use crate::config::{Action, Config, SelectionRequirement};
use crate::dialog::{Dialog, DialogKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
}

/// A decoded key identity, independent of the terminal backend that
/// produced it (§6: "the core does not handle key decoding" — this is
/// the decoded form the collaborator hands over).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    Enter,
    Esc,
    Tab,
    Backspace,
    Delete,
    Insert,
    F(u8),
}

impl Key {
    pub fn parse_name(name: &str) -> Option<Key> {
        match name {
            "Up" => Some(Key::Up),
            "Down" => Some(Key::Down),
            "Left" => Some(Key::Left),
            "Right" => Some(Key::Right),
            "Home" => Some(Key::Home),
            "End" => Some(Key::End),
            "PageUp" => Some(Key::PageUp),
            "PageDown" => Some(Key::PageDown),
            "Enter" => Some(Key::Enter),
            "Esc" | "Escape" => Some(Key::Esc),
            "Tab" => Some(Key::Tab),
            "Backspace" => Some(Key::Backspace),
            "Delete" => Some(Key::Delete),
            "Insert" => Some(Key::Insert),
            "Space" => Some(Key::Char(' ')),
            other if other.len() >= 2 && other.starts_with('F') && other[1..].parse::<u8>().is_ok() => {
                other[1..].parse::<u8>().ok().map(Key::F)
            }
            other if other.chars().count() == 1 => other.chars().next().map(|c| Key::Char(c.to_ascii_lowercase())),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    ScrollUp,
    ScrollDown,
}

/// One event from the (external) input collaborator (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Command(Key, Modifiers),
    Text(char),
    Mouse(MouseButton, u16, u16),
    Resize(u16, u16),
}

/// Outcome of routing one event: either a resolved action (for the main
/// pane/dialog-stack-level command dispatch to execute) or a note that
/// the event was consumed by a dialog's text widget / discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    Action(Action),
    DialogCancelled,
    DialogSubmitted,
    TextConsumed,
    Discarded,
    Resized(u16, u16),
}

/// Whether the active selection (on the focused pane) satisfies an
/// action's `SelectionRequirement` (§4.5).
pub fn selection_satisfies(requirement: SelectionRequirement, has_effective_selection: bool) -> bool {
    match requirement {
        SelectionRequirement::Any => true,
        SelectionRequirement::None => !has_effective_selection,
        SelectionRequirement::Required => has_effective_selection,
    }
}

/// Routes one input event given the current dialog stack's topmost
/// dialog (if any) and the focused pane's effective-selection state.
///
/// - If a dialog is open and its kind owns a text widget, `Text` events
///   go to the widget; `Command(Esc, _)` cancels it, `Command(Enter,_)`
///   submits it; everything else is looked up in the key map as usual.
/// - With no dialog open, `Command` events resolve against the key map
///   (gated by selection requirement); `Text` events are discarded
///   (§4.5: "if no text widget, they are discarded").
pub fn route(
    event: InputEvent,
    top_dialog: Option<&mut Dialog>,
    config: &Config,
    has_effective_selection: bool,
) -> RouteOutcome {
    match event {
        InputEvent::Resize(rows, cols) => RouteOutcome::Resized(rows, cols),
        InputEvent::Mouse(..) => RouteOutcome::Discarded,
        InputEvent::Text(ch) => {
            if let Some(dialog) = top_dialog {
                if let Some(widget) = text_widget_mut(&mut dialog.kind) {
                    widget.insert(ch);
                    dialog.request_redraw();
                    return RouteOutcome::TextConsumed;
                }
            }
            RouteOutcome::Discarded
        }
        InputEvent::Command(Key::Esc, _) if top_dialog.is_some() => RouteOutcome::DialogCancelled,
        InputEvent::Command(Key::Enter, _) if top_dialog.as_ref().and_then(|d| text_widget_ref(&d.kind)).is_some() => {
            RouteOutcome::DialogSubmitted
        }
        InputEvent::Command(key, modifiers) => {
            if let Some(dialog) = top_dialog {
                if let Some(widget) = text_widget_mut(&mut dialog.kind) {
                    if apply_edit_motion(widget, key) {
                        dialog.request_redraw();
                        return RouteOutcome::TextConsumed;
                    }
                }
            }
            resolve_action(key, modifiers, config, has_effective_selection)
                .map(RouteOutcome::Action)
                .unwrap_or(RouteOutcome::Discarded)
        }
    }
}

fn resolve_action(key: Key, modifiers: Modifiers, config: &Config, has_effective_selection: bool) -> Option<Action> {
    for action in ALL_ACTIONS {
        let action = *action;
        if !config.keys_for(action).iter().any(|spec| spec.parse() == Some((key, modifiers))) {
            continue;
        }
        if selection_satisfies(action.selection_requirement(), has_effective_selection) {
            return Some(action);
        }
    }
    None
}

fn text_widget_mut(kind: &mut DialogKind) -> Option<&mut crate::dialog::text_edit::TextEdit> {
    match kind {
        DialogKind::JumpToPath { input, .. }
        | DialogKind::Search { input, .. }
        | DialogKind::SingleLineInput { input, .. } => Some(input),
        DialogKind::BatchRename { pattern, .. } => Some(pattern),
        _ => None,
    }
}

fn text_widget_ref(kind: &DialogKind) -> Option<&crate::dialog::text_edit::TextEdit> {
    match kind {
        DialogKind::JumpToPath { input, .. }
        | DialogKind::Search { input, .. }
        | DialogKind::SingleLineInput { input, .. } => Some(input),
        DialogKind::BatchRename { pattern, .. } => Some(pattern),
        _ => None,
    }
}

fn apply_edit_motion(widget: &mut crate::dialog::text_edit::TextEdit, key: Key) -> bool {
    match key {
        Key::Left => widget.move_left(),
        Key::Right => widget.move_right(),
        Key::Home => widget.home(),
        Key::End => widget.end(),
        Key::Backspace => widget.backspace(),
        Key::Delete => widget.delete(),
        Key::Up => widget.move_up(),
        Key::Down => widget.move_down(),
        _ => return false,
    }
    true
}

const ALL_ACTIONS: &[Action] = &[
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
