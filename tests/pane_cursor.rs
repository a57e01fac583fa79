//! Pane cursor invariant: `cursor_index` always indexes a real row
//! (or is `0` on an empty listing) across navigate/refresh/sort/filter/
//! show-hidden transitions (Testable Property 10).

use tfm::pane::{PaneState, SortMode, SortState};
use tfm::path::{DirEntry, Path};

fn entry(name: &str, is_dir: bool, is_hidden: bool, size: u64) -> DirEntry {
    DirEntry {
        path: Path::parse(&format!("/root/{name}")),
        name: name.to_string(),
        size: Some(size),
        mtime: None,
        is_dir,
        is_symlink: false,
        is_hidden,
    }
}

fn assert_cursor_valid(pane: &PaneState) {
    if pane.entries().is_empty() {
        assert_eq!(pane.cursor_index(), 0);
    } else {
        assert!(pane.cursor_index() < pane.entries().len());
    }
}

#[test]
fn cursor_stays_valid_through_a_full_transition_sequence() {
    let mut pane = PaneState::new(Path::parse("/root"));
    assert_cursor_valid(&pane);

    pane.navigate(
        Path::parse("/root/sub"),
        vec![entry("a.txt", false, false, 10), entry("b.txt", false, false, 30), entry(".c", false, true, 5)],
    );
    assert_cursor_valid(&pane);

    pane.move_cursor(100);
    assert_cursor_valid(&pane);

    pane.set_sort(SortState { mode: SortMode::Size, reverse: true });
    assert_cursor_valid(&pane);

    pane.set_filter_pattern("*.txt".to_string());
    assert_cursor_valid(&pane);

    pane.set_show_hidden(true);
    assert_cursor_valid(&pane);

    pane.set_filter_pattern("nomatch*".to_string());
    assert_cursor_valid(&pane);

    pane.refresh(vec![]);
    assert_cursor_valid(&pane);

    pane.move_cursor(-50);
    assert_cursor_valid(&pane);
}

#[test]
fn select_all_on_empty_directory_is_a_no_op() {
    let mut pane = PaneState::new(Path::parse("/root"));
    pane.navigate(Path::parse("/root/empty"), vec![]);
    pane.select_all();
    assert!(pane.selection().is_empty());
    assert!(pane.effective_selection().is_empty());
}

#[test]
fn empty_filter_pattern_shows_every_entry() {
    let mut pane = PaneState::new(Path::parse("/root"));
    pane.navigate(Path::parse("/root"), vec![entry("a.txt", false, false, 1), entry("b.md", false, false, 1)]);
    pane.set_filter_pattern("*.txt".to_string());
    assert_eq!(pane.entries().len(), 2); // ".." + a.txt
    pane.set_filter_pattern(String::new());
    assert_eq!(pane.entries().len(), 3); // ".." + a.txt + b.md
}

#[test]
fn filter_with_no_matches_leaves_only_the_parent_row() {
    let mut pane = PaneState::new(Path::parse("/root"));
    pane.navigate(Path::parse("/root/sub"), vec![entry("a.txt", false, false, 1)]);
    pane.set_filter_pattern("*.nomatch".to_string());
    assert_eq!(pane.entries().len(), 1);
    assert_eq!(pane.entries()[0].name, "..");
}

#[test]
fn restore_cursor_to_a_deleted_name_lands_on_its_sorted_predecessor() {
    let mut pane = PaneState::new(Path::parse("/root"));
    pane.navigate(
        Path::parse("/root"),
        vec![entry("a.txt", false, false, 1), entry("c.txt", false, false, 1), entry("e.txt", false, false, 1)],
    );
    // "c.txt" was the cursor row, then got removed elsewhere; refreshing
    // without it present should land on its sorted predecessor "a.txt",
    // not silently keep whatever index it used to occupy.
    pane.set_cursor_index(2); // "c.txt" (index 0 is "..")
    pane.refresh(vec![entry("a.txt", false, false, 1), entry("e.txt", false, false, 1)]);
    assert_eq!(pane.current_entry_name(), Some("a.txt"));
}

#[test]
fn sort_toggling_is_idempotent_on_entry_count() {
    let mut pane = PaneState::new(Path::parse("/root"));
    pane.navigate(
        Path::parse("/root"),
        vec![entry("z.txt", false, false, 1), entry("a.txt", false, false, 2), entry("m.txt", false, false, 3)],
    );
    let before = pane.entries().len();
    pane.set_sort(SortState { mode: SortMode::Size, reverse: false });
    pane.set_sort(SortState { mode: SortMode::Name, reverse: true });
    pane.set_sort(SortState { mode: SortMode::Name, reverse: false });
    assert_eq!(pane.entries().len(), before);
    let names: Vec<_> = pane.entries().iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["..", "a.txt", "m.txt", "z.txt"]);
}
