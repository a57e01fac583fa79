//! Single-line text edit widget (§4.5): `(text, cursor)` plus the
//! handful of motions every rename/filter/jump-to-path input needs.

/// Byte-index cursor over a `String`, always aligned to a `char`
/// boundary — every mutation moves in whole-`char` steps so this never
/// splits a multi-byte UTF-8 sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextEdit {
    text: String,
    cursor: usize,
    max_len: Option<usize>,
    /// When enabled by the host dialog, Up/Down map to Home/End (§4.5).
    up_down_as_home_end: bool,
}

impl TextEdit {
    pub fn new() -> Self {
        TextEdit::default()
    }

    pub fn with_text(text: impl Into<String>) -> Self {
        let text = text.into();
        let cursor = text.len();
        TextEdit { text, cursor, max_len: None, up_down_as_home_end: false }
    }

    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = Some(max_len);
        self
    }

    pub fn with_up_down_as_home_end(mut self, enabled: bool) -> Self {
        self.up_down_as_home_end = enabled;
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.cursor = self.text.len();
    }

    pub fn insert(&mut self, ch: char) {
        if let Some(max) = self.max_len {
            if self.text.chars().count() >= max {
                return;
            }
        }
        self.text.insert(self.cursor, ch);
        self.cursor += ch.len_utf8();
    }

    pub fn backspace(&mut self) {
        if let Some((prev, _)) = self.char_before_cursor() {
            self.text.remove(prev);
            self.cursor = prev;
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.text.len() {
            self.text.remove(self.cursor);
        }
    }

    pub fn move_left(&mut self) {
        if let Some((prev, _)) = self.char_before_cursor() {
            self.cursor = prev;
        }
    }

    pub fn move_right(&mut self) {
        if let Some(next) = self.next_char_boundary() {
            self.cursor = next;
        }
    }

    pub fn home(&mut self) {
        self.cursor = 0;
    }

    pub fn end(&mut self) {
        self.cursor = self.text.len();
    }

    /// Dispatches Up/Down as Home/End when the host dialog enabled it;
    /// otherwise a no-op (§4.5: "optional Up/Down mapped to Home/End
    /// when enabled by host").
    pub fn move_up(&mut self) {
        if self.up_down_as_home_end {
            self.home();
        }
    }

    pub fn move_down(&mut self) {
        if self.up_down_as_home_end {
            self.end();
        }
    }

    fn char_before_cursor(&self) -> Option<(usize, char)> {
        self.text[..self.cursor].char_indices().next_back()
    }

    fn next_char_boundary(&self) -> Option<usize> {
        self.text[self.cursor..].chars().next().map(|c| self.cursor + c.len_utf8())
    }

    /// Horizontal scroll offset so `cursor` stays visible inside a
    /// `width`-cell window (§4.5 rendering note). Returns the byte
    /// offset of the first visible char.
    pub fn scroll_offset(&self, width: usize) -> usize {
        if width == 0 {
            return 0;
        }
        let cursor_col = self.text[..self.cursor].chars().count();
        if cursor_col < width {
            return 0;
        }
        let first_visible_col = cursor_col - width + 1;
        self.text.char_indices().nth(first_visible_col).map(|(idx, _)| idx).unwrap_or(0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn insert_advances_cursor_by_char_width() {
        let mut edit = TextEdit::new();
        edit.insert('é');
        edit.insert('a');
        assert_eq!(edit.text(), "éa");
        assert_eq!(edit.cursor(), 'é'.len_utf8() + 1);
    }

    #[test]
    fn backspace_removes_preceding_char_not_byte() {
        let mut edit = TextEdit::with_text("café");
        edit.backspace();
        assert_eq!(edit.text(), "caf");
    }

    #[test]
    fn home_and_end_move_to_bounds() {
        let mut edit = TextEdit::with_text("hello");
        edit.home();
        assert_eq!(edit.cursor(), 0);
        edit.end();
        assert_eq!(edit.cursor(), 5);
    }

    #[test]
    fn max_len_rejects_further_inserts() {
        let mut edit = TextEdit::new().with_max_len(2);
        edit.insert('a');
        edit.insert('b');
        edit.insert('c');
        assert_eq!(edit.text(), "ab");
    }

    #[test]
    fn up_down_map_to_home_end_only_when_enabled() {
        let mut edit = TextEdit::with_text("hello").with_up_down_as_home_end(true);
        edit.move_up();
        assert_eq!(edit.cursor(), 0);
        edit.move_down();
        assert_eq!(edit.cursor(), 5);

        let mut plain = TextEdit::with_text("hello");
        plain.move_up();
        assert_eq!(plain.cursor(), 5);
    }

    #[test]
    fn delete_removes_char_at_cursor() {
        let mut edit = TextEdit::with_text("hello");
        edit.home();
        edit.delete();
        assert_eq!(edit.text(), "ello");
        assert_eq!(edit.cursor(), 0);
    }
}
