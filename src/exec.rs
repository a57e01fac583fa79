//! File-association dispatch and external process execution (§6).

use std::collections::HashMap;
use std::process::{Command as ProcessCommand, ExitStatus};

use crate::config::{resolve_association, FileAction, FileAssociation};
use crate::error::{TfmError, TfmResult};
use crate::path::Path;

/// The two panes' paths plus whichever is active, as needed to populate
/// `TFM_LEFT_DIR`/`TFM_RIGHT_DIR`/`TFM_THIS_DIR`/`TFM_OTHER_DIR` (§6).
pub struct PaneContext<'a> {
    pub left_dir: &'a Path,
    pub right_dir: &'a Path,
    pub active_is_left: bool,
    pub left_selected: &'a [String],
    pub right_selected: &'a [String],
}

impl PaneContext<'_> {
    fn this_dir(&self) -> &Path {
        if self.active_is_left {
            self.left_dir
        } else {
            self.right_dir
        }
    }

    fn other_dir(&self) -> &Path {
        if self.active_is_left {
            self.right_dir
        } else {
            self.left_dir
        }
    }

    fn this_selected(&self) -> &[String] {
        if self.active_is_left {
            self.left_selected
        } else {
            self.right_selected
        }
    }

    fn other_selected(&self) -> &[String] {
        if self.active_is_left {
            self.right_selected
        } else {
            self.left_selected
        }
    }
}

/// Displayed path string for an env var: the local filesystem path for
/// local panes, the URI string for remote ones (§6: "for remote paths,
/// the URI string").
fn env_path_string(path: &Path) -> String {
    if path.is_remote() {
        path.to_uri_string()
    } else {
        path.key().to_string()
    }
}

/// Shell-quoted space-joined selection list (§6); empty selection on an
/// empty listing yields an empty string, a non-empty one falls back to
/// the single cursor-row name (handled by the caller via
/// `PaneState::effective_selection`, already reflected in `selected`).
fn env_selected_string(selected: &[String]) -> String {
    shell_words::join(selected)
}

/// Builds the full environment variable set for a spawned associated
/// program (§6).
pub fn build_environment(ctx: &PaneContext<'_>) -> HashMap<String, String> {
    let mut env = HashMap::new();
    env.insert("TFM_LEFT_DIR".to_string(), env_path_string(ctx.left_dir));
    env.insert("TFM_RIGHT_DIR".to_string(), env_path_string(ctx.right_dir));
    env.insert("TFM_THIS_DIR".to_string(), env_path_string(ctx.this_dir()));
    env.insert("TFM_OTHER_DIR".to_string(), env_path_string(ctx.other_dir()));
    env.insert("TFM_LEFT_SELECTED".to_string(), env_selected_string(ctx.left_selected));
    env.insert("TFM_RIGHT_SELECTED".to_string(), env_selected_string(ctx.right_selected));
    env.insert("TFM_THIS_SELECTED".to_string(), env_selected_string(ctx.this_selected()));
    env.insert("TFM_OTHER_SELECTED".to_string(), env_selected_string(ctx.other_selected()));
    env.insert("TFM_ACTIVE".to_string(), "1".to_string());
    env
}

/// Working directory for the spawned process, plus whether a
/// remote-pane fallback notice should be surfaced to the user (§6:
/// "if remote, the process's own working directory, with a user-visible
/// notice that fallback occurred").
pub fn working_directory(active_dir: &Path) -> (Option<std::path::PathBuf>, Option<String>) {
    if active_dir.is_remote() {
        let notice = format!("'{active_dir}' is remote; the launched program's working directory was left unchanged");
        (None, Some(notice))
    } else {
        (Some(std::path::PathBuf::from(active_dir.key())), None)
    }
}

/// Resolves and spawns the associated program for `action` on `name`,
/// waiting for it to exit. Returns `Unsupported` if no association
/// matches or the matching entry disables that action.
pub fn launch(
    associations: &[FileAssociation],
    name: &str,
    action: FileAction,
    ctx: &PaneContext<'_>,
) -> TfmResult<ExitStatus> {
    let argv = resolve_association(associations, name, action)
        .ok_or_else(|| TfmError::Unsupported(format!("no file association for '{name}'")))?;
    let Some((program, args)) = argv.split_first() else {
        return Err(TfmError::Unsupported(format!("empty argv in file association for '{name}'")));
    };

    let mut command = ProcessCommand::new(program);
    command.args(args);
    command.envs(build_environment(ctx));

    let (cwd, _notice) = working_directory(ctx.this_dir());
    if let Some(cwd) = cwd {
        command.current_dir(cwd);
    }

    command.status().map_err(TfmError::from)
}

#[cfg(test)]
mod test {
    use super::*;

    fn ctx<'a>(left: &'a Path, right: &'a Path, left_sel: &'a [String], right_sel: &'a [String]) -> PaneContext<'a> {
        PaneContext { left_dir: left, right_dir: right, active_is_left: true, left_selected: left_sel, right_selected: right_sel }
    }

    #[test]
    fn this_and_other_follow_active_pane() {
        let left = Path::parse("/home/left");
        let right = Path::parse("/home/right");
        let env = build_environment(&ctx(&left, &right, &[], &[]));
        assert_eq!(env["TFM_THIS_DIR"], "/home/left");
        assert_eq!(env["TFM_OTHER_DIR"], "/home/right");
        assert_eq!(env["TFM_ACTIVE"], "1");
    }

    #[test]
    fn remote_dir_uses_uri_string_and_flags_fallback() {
        let remote = Path::parse("s3://bucket/prefix/");
        let (cwd, notice) = working_directory(&remote);
        assert!(cwd.is_none());
        assert!(notice.is_some());
        assert_eq!(env_path_string(&remote), remote.to_uri_string());
    }

    #[test]
    fn selection_list_is_shell_quoted_and_space_joined() {
        let names = vec!["a file.txt".to_string(), "plain.txt".to_string()];
        assert_eq!(env_selected_string(&names), "'a file.txt' plain.txt");
    }

    #[test]
    fn empty_selection_yields_empty_string() {
        assert_eq!(env_selected_string(&[]), "");
    }

    #[test]
    fn launch_without_matching_association_is_unsupported() {
        let left = Path::parse("/home/left");
        let right = Path::parse("/home/right");
        let result = launch(&[], "unmatched.bin", FileAction::Open, &ctx(&left, &right, &[], &[]));
        assert!(matches!(result, Err(TfmError::Unsupported(_))));
    }
}
