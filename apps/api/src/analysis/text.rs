//! Shared text helpers: phrase pattern compilation, whole-phrase matching, context windows.

use std::ops::Range;

use regex::{Regex, RegexBuilder};

use crate::analysis::AnalysisError;

/// Characters of surrounding text captured on each side of a match.
pub const CONTEXT_RADIUS_CHARS: usize = 30;

/// Compiled-program ceiling for a single user phrase.
const PHRASE_REGEX_SIZE_LIMIT: usize = 1 << 20;

/// Compiles a user-supplied phrase into a case-insensitive literal pattern.
///
/// Every word is escaped, so regex metacharacters in the phrase match literally.
/// Internal whitespace runs match any whitespace run in the text.
pub fn compile_phrase(phrase: &str) -> Result<Regex, AnalysisError> {
    let words: Vec<String> = phrase.split_whitespace().map(regex::escape).collect();
    if words.is_empty() {
        return Err(AnalysisError::InvalidPattern {
            phrase: phrase.to_string(),
            reason: "phrase is blank".to_string(),
        });
    }

    RegexBuilder::new(&words.join(r"\s+"))
        .case_insensitive(true)
        .size_limit(PHRASE_REGEX_SIZE_LIMIT)
        .build()
        .map_err(|e| AnalysisError::InvalidPattern {
            phrase: phrase.to_string(),
            reason: e.to_string(),
        })
}

/// Finds every match of `re` whose edges sit on a non-alphanumeric character
/// or on the start/end of the text. Results are ordered left to right.
pub fn find_whole_matches(re: &Regex, text: &str) -> Vec<Range<usize>> {
    let mut found = Vec::new();
    let mut pos = 0;

    while pos <= text.len() {
        let Some(m) = re.find_at(text, pos) else {
            break;
        };
        if m.start() < m.end() && on_word_edges(text, m.start(), m.end()) {
            found.push(m.range());
            pos = m.end();
        } else {
            // Retry one char later so an overlapping candidate is not skipped.
            pos = next_char_boundary(text, m.start());
        }
    }

    found
}

/// True when neither neighbour of `start..end` is alphanumeric.
pub fn on_word_edges(text: &str, start: usize, end: usize) -> bool {
    let before_ok = text[..start]
        .chars()
        .next_back()
        .map_or(true, |c| !c.is_alphanumeric());
    let after_ok = text[end..]
        .chars()
        .next()
        .map_or(true, |c| !c.is_alphanumeric());
    before_ok && after_ok
}

/// Returns up to `radius` characters before and after `start..end`, match included.
pub fn context_window(text: &str, start: usize, end: usize, radius: usize) -> String {
    let ctx_start = text[..start]
        .char_indices()
        .rev()
        .take(radius)
        .last()
        .map_or(start, |(i, _)| i);
    let ctx_end = text[end..]
        .char_indices()
        .nth(radius)
        .map_or(text.len(), |(i, _)| end + i);

    text[ctx_start..ctx_end].to_string()
}

fn next_char_boundary(text: &str, pos: usize) -> usize {
    text[pos..]
        .chars()
        .next()
        .map_or(text.len() + 1, |c| pos + c.len_utf8())
}

/// Uppercases the first letter of `replacement` when `matched` starts with an uppercase letter.
pub fn match_leading_case(matched: &str, replacement: &str) -> String {
    let starts_upper = matched.chars().next().is_some_and(char::is_uppercase);
    if !starts_upper {
        return replacement.to_string();
    }
    let mut chars = replacement.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_phrase_escapes_metacharacters() {
        let re = compile_phrase("C++").unwrap();
        assert!(re.is_match("Expert in c++ and Rust"));
        assert!(!re.is_match("Expert in c and Rust"));
    }

    #[test]
    fn test_compile_phrase_rejects_blank() {
        let err = compile_phrase("   ").unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidPattern { .. }));
    }

    #[test]
    fn test_compile_phrase_flexible_whitespace() {
        let re = compile_phrase("machine learning").unwrap();
        assert!(re.is_match("Machine\n  Learning pipelines"));
    }

    #[test]
    fn test_find_whole_matches_respects_word_edges() {
        let re = compile_phrase("rust").unwrap();
        let text = "Rust, trusted rustacean; rust.";
        let found = find_whole_matches(&re, text);
        let words: Vec<&str> = found.iter().map(|r| &text[r.clone()]).collect();
        assert_eq!(words, vec!["Rust", "rust"]);
    }

    #[test]
    fn test_find_whole_matches_retries_after_rejected_candidate() {
        let re = compile_phrase("aa").unwrap();
        // "aaa" rejects every candidate, the standalone "aa" still matches.
        let text = "aaa aa";
        let found = find_whole_matches(&re, text);
        assert_eq!(found, vec![4..6]);
    }

    #[test]
    fn test_context_window_clamps_to_text() {
        let text = "short text";
        assert_eq!(context_window(text, 0, 5, 30), "short text");
    }

    #[test]
    fn test_context_window_radius() {
        let text = "0123456789MATCH9876543210";
        assert_eq!(context_window(text, 10, 15, 3), "789MATCH987");
    }

    #[test]
    fn test_context_window_multibyte_safe() {
        let text = "ééé key ééé";
        let start = text.find("key").unwrap();
        assert_eq!(context_window(text, start, start + 3, 2), "é key é");
    }

    #[test]
    fn test_match_leading_case() {
        assert_eq!(match_leading_case("Worked", "spearheaded"), "Spearheaded");
        assert_eq!(match_leading_case("worked", "spearheaded"), "spearheaded");
    }
}
