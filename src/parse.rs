//! Parsers for free-form model output.
//!
//! Two parsers live here:
//!
//! - [`segment_statements`] turns a block of text into an ordered list of
//!   atomic, self-contained [`Statement`]s, grouping lines under
//!   bullet/numbered headers.
//! - [`BooleanParser`] turns free-form yes/no language into a strict
//!   boolean, with an optional fallback value.
//!
//! Both are pure and deterministic: no two calls with equal input differ.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::error::{Error, Result};

/// Bullet-header pattern: a leading integer or `*`, optionally followed
/// by one of `.`, `:`, or whitespace. A matching line opens a new
/// statement group.
const BULLET_PATTERN: &str = r"^\s*(\d+|\*)[.:\s]?";

fn bullet_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(BULLET_PATTERN).expect("bullet pattern is valid"))
}

/// An atomic, self-contained factual sentence extracted from a larger
/// text. Statements carry no provenance beyond their text and compare
/// for equality as normalized strings (trimmed, leading bullet markers
/// stripped).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Statement(String);

impl Statement {
    /// Create a statement, normalizing the text.
    pub fn new(text: impl AsRef<str>) -> Self {
        Self(normalize(text.as_ref()))
    }

    /// The normalized statement text.
    pub fn text(&self) -> &str {
        &self.0
    }

    /// Whether the statement is empty after normalization.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Statement {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

fn normalize(text: &str) -> String {
    text.trim().trim_start_matches('*').trim_start().to_string()
}

/// Take the substring up to the first period or newline, whichever
/// occurs first. Bounds boolean parsing to the first sentence, since
/// models sometimes add trailing explanation despite instructions.
pub fn first_sentence(text: &str) -> &str {
    let period = text.find('.').unwrap_or(text.len());
    let newline = text.find('\n').unwrap_or(text.len());
    &text[..period.min(newline)]
}

/// Segment a block of text into an ordered list of atomic statements.
///
/// Lines are trimmed and empty lines dropped. A line matching the
/// bullet-header pattern opens a new statement group starting with the
/// text after the header; an unmatched line is appended (space-joined)
/// to the current open group, allowing multi-line statements. Input with
/// no bullet markers yields at most one statement; empty input yields an
/// empty list. Ordering is preserved.
pub fn segment_statements(text: &str) -> Vec<Statement> {
    let lines = text
        .split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty());

    // Group 0 collects any leading unmarked lines; dropped when empty.
    let mut groups: Vec<Vec<String>> = vec![Vec::new()];

    for line in lines {
        match bullet_regex().find(line) {
            Some(header) => {
                groups.push(vec![line[header.end()..].trim().to_string()]);
            }
            None => {
                groups
                    .last_mut()
                    .expect("groups is never empty")
                    .push(line.to_string());
            }
        }
    }

    groups
        .into_iter()
        .filter(|group| !group.is_empty())
        .map(|group| Statement::new(group.join(" ")))
        .filter(|statement| !statement.is_empty())
        .collect()
}

/// Parses free-form yes/no model output into a strict boolean.
///
/// Normalizes to lowercase, bounds the search to the first sentence,
/// then searches for the substrings `"yes"`/`"true"` (true) and
/// `"no"`/`"false"` (false), in that order. The search is a substring
/// search, not a token match: a response like "not false" matches
/// `"false"` and returns false. This is a documented approximation of
/// the source behavior, preserved deliberately.
#[derive(Debug, Clone, Copy, Default)]
pub struct BooleanParser {
    fallback: Option<bool>,
}

impl BooleanParser {
    /// A strict parser: unrecognizable output is a [`Error::Parse`].
    pub fn strict() -> Self {
        Self { fallback: None }
    }

    /// A parser that returns `fallback` instead of failing.
    pub fn with_fallback(fallback: bool) -> Self {
        Self {
            fallback: Some(fallback),
        }
    }

    /// Parse model output into a boolean.
    pub fn parse(&self, text: &str) -> Result<bool> {
        let lowered = text.trim().to_lowercase();
        let sentence = first_sentence(&lowered);

        let parsed = if sentence.contains("yes") || sentence.contains("true") {
            Ok(true)
        } else if sentence.contains("no") || sentence.contains("false") {
            Ok(false)
        } else {
            Err(Error::parse(text))
        };

        match (parsed, self.fallback) {
            (Ok(value), _) => Ok(value),
            (Err(err), None) => Err(err),
            (Err(err), Some(fallback)) => {
                tracing::warn!("boolean parse failed, using fallback {fallback}: {err}");
                Ok(fallback)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn texts(statements: &[Statement]) -> Vec<&str> {
        statements.iter().map(Statement::text).collect()
    }

    #[test]
    fn test_segment_empty_input() {
        assert!(segment_statements("").is_empty());
        assert!(segment_statements("   \n\n  ").is_empty());
    }

    #[test]
    fn test_segment_star_bullets() {
        let statements = segment_statements("* a\n* b");
        assert_eq!(texts(&statements), vec!["a", "b"]);
    }

    #[test]
    fn test_segment_numbered_bullets() {
        let statements = segment_statements("1. The sky is blue.\n2: Water is wet.\n3 Rust is fast.");
        assert_eq!(
            texts(&statements),
            vec!["The sky is blue.", "Water is wet.", "Rust is fast."]
        );
    }

    #[test]
    fn test_segment_trailing_unmarked_line_joins_group() {
        let statements = segment_statements("1. a\n2. b\nc");
        assert_eq!(texts(&statements), vec!["a", "b c"]);
    }

    #[test]
    fn test_segment_no_bullets_yields_one_statement() {
        let statements = segment_statements("first line\nsecond line\nthird line");
        assert_eq!(texts(&statements), vec!["first line second line third line"]);
    }

    #[test]
    fn test_segment_leading_unmarked_lines_seed_group_zero() {
        let statements = segment_statements("intro text\n* a\n* b");
        assert_eq!(texts(&statements), vec!["intro text", "a", "b"]);
    }

    #[test]
    fn test_segment_drops_empty_groups() {
        // A bare bullet opens a group with no content.
        let statements = segment_statements("* \n* real content");
        assert_eq!(texts(&statements), vec!["real content"]);
    }

    #[test]
    fn test_segment_idempotent_on_single_statement() {
        let first = segment_statements("just one statement here");
        assert_eq!(first.len(), 1);
        let again = segment_statements(first[0].text());
        assert_eq!(first, again);
    }

    #[test]
    fn test_statement_normalization() {
        assert_eq!(Statement::new("  * a fact  ").text(), "a fact");
        assert_eq!(Statement::new("** doubled"), Statement::new("doubled"));
    }

    #[test]
    fn test_first_sentence() {
        assert_eq!(first_sentence("yes. and more"), "yes");
        assert_eq!(first_sentence("yes\nno"), "yes");
        assert_eq!(first_sentence("no terminator"), "no terminator");
        assert_eq!(first_sentence(""), "");
    }

    #[test]
    fn test_boolean_yes() {
        assert!(BooleanParser::strict().parse("Yes.").unwrap());
        assert!(BooleanParser::strict().parse("True").unwrap());
        assert!(BooleanParser::strict().parse("  YES, certainly").unwrap());
    }

    #[test]
    fn test_boolean_no() {
        assert!(!BooleanParser::strict().parse("no, that's wrong").unwrap());
        assert!(!BooleanParser::strict().parse("False.").unwrap());
    }

    #[test]
    fn test_boolean_first_sentence_bound() {
        // The "no" after the period is out of scope.
        assert!(BooleanParser::strict().parse("yes. no").unwrap());
    }

    #[test]
    fn test_boolean_unparseable_raises() {
        let err = BooleanParser::strict().parse("maybe").unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn test_boolean_fallback() {
        assert!(!BooleanParser::with_fallback(false).parse("maybe").unwrap());
        assert!(BooleanParser::with_fallback(true).parse("maybe").unwrap());
        // Fallback does not override a recognized token.
        assert!(!BooleanParser::with_fallback(true).parse("no").unwrap());
    }

    #[test]
    fn test_boolean_negation_hazard_preserved() {
        // Substring search, not token match: "not false" reads as false.
        assert!(!BooleanParser::strict().parse("not false").unwrap());
    }
}
