//! Small helpers shared across engines that don't deserve their own
//! top-level module: glob matching, text-file detection, and
//! archive-extraction path sanitization.

pub mod archive_path;
pub mod text_detect;

use glob::Pattern;

/// Case-insensitive glob match against a single name (§3: "filter is a
/// glob applied to `name` case-insensitively").
pub fn glob_match_ci(pattern: &str, name: &str) -> bool {
    match Pattern::new(&pattern.to_lowercase()) {
        Ok(p) => p.matches(&name.to_lowercase()),
        Err(_) => false,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn glob_match_is_case_insensitive() {
        assert!(glob_match_ci("*.TXT", "notes.txt"));
        assert!(!glob_match_ci("*.txt", "notes.md"));
    }
}
