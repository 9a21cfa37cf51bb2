//! Text helpers shared by search filters and the fuzzy resolver.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
    static ref NON_WORD: Regex = Regex::new(r"[^\p{L}\p{N}\s]").unwrap();
}

/// Lowercase, trim and collapse internal whitespace.
pub fn normalize(input: &str) -> String {
    WHITESPACE
        .replace_all(input.trim(), " ")
        .to_lowercase()
}

/// Split into lowercase words with punctuation removed.
pub fn words(input: &str) -> Vec<String> {
    let cleaned = NON_WORD.replace_all(input, " ");
    normalize(&cleaned)
        .split(' ')
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// Escape `%` and `_` so user input can be embedded in a `LIKE` pattern.
pub fn like_pattern(input: &str) -> String {
    let escaped = input
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_whitespace() {
        assert_eq!(normalize("  Update   GHL\tReport "), "update ghl report");
    }

    #[test]
    fn words_strip_punctuation() {
        assert_eq!(words("Check 'cursor' install!"), vec!["check", "cursor", "install"]);
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }
}
