//! Shell-glob matching of service names against discovery patterns.
//!
//! Supported syntax:
//!
//! | Pattern   | Matches                                   |
//! |-----------|-------------------------------------------|
//! | `*`       | any run of characters, including `/`      |
//! | `?`       | exactly one character                     |
//! | `[abc]`   | one character from the class              |
//! | `[!abc]`  | one character not in the class            |
//! | `[a-z]`   | one character in the range                |
//!
//! Everything else is literal.  That includes `{`, `}` and `\`, a `[` with
//! no closing `]`, and a `^` at the start of a class.  `**` is the same as
//! `*`.
//!
//! Matching is always case-sensitive, on every platform, so a query behaves
//! the same no matter which host the card runs on.
//!
//! Patterns are compiled with `globset`, whose own dialect is richer (brace
//! alternation, recursive `**/`).  `to_glob` rewrites a pattern into the
//! subset above before compiling.

use globset::{GlobBuilder, GlobMatcher};
use thiserror::Error;
use tracing::debug;

/// Error returned when a discovery pattern is not a valid glob.
#[derive(Debug, Error)]
#[error("invalid discovery pattern {pattern:?}: {source}")]
pub struct PatternError {
    pattern: String,
    #[source]
    source: globset::Error,
}

/// A compiled discovery pattern.
#[derive(Debug, Clone)]
pub struct ServicePattern {
    source: String,
    matcher: GlobMatcher,
}

impl ServicePattern {
    /// Compiles `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError`] if the pattern is malformed, e.g. it contains
    /// an unclosed character class.
    pub fn new(pattern: &str) -> Result<Self, PatternError> {
        let glob = GlobBuilder::new(&to_glob(pattern))
            .case_insensitive(false)
            .literal_separator(false)
            .backslash_escape(false)
            .build()
            .map_err(|source| PatternError {
                pattern: pattern.to_string(),
                source,
            })?;

        Ok(Self {
            source: pattern.to_string(),
            matcher: glob.compile_matcher(),
        })
    }

    /// Returns `true` if `name` matches the pattern.
    pub fn matches(&self, name: &str) -> bool {
        self.matcher.is_match(name)
    }

    /// Returns the source text of the pattern.
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// Rewrites a shell pattern into globset syntax with the same meaning.
///
/// - runs of `*` collapse to one `*`;
/// - `{` and `}` become the one-character classes `[{]` and `[}]`;
/// - a `[` without a closing `]` becomes `[[]`;
/// - a class starting with `^` has the `^` moved to its end, since globset
///   reads a leading `^` as negation.
fn to_glob(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() + 8);
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '*' => {
                out.push('*');
                while chars.get(i + 1) == Some(&'*') {
                    i += 1;
                }
            }
            '{' => out.push_str("[{]"),
            '}' => out.push_str("[}]"),
            '[' => match class_end(&chars, i) {
                Some(end) => {
                    push_class(&mut out, &chars[i + 1..end]);
                    i = end;
                }
                None => out.push_str("[[]"),
            },
            c => out.push(c),
        }
        i += 1;
    }
    out
}

/// Index of the `]` closing the class opened at `open`.
///
/// A `]` directly after `[` or `[!` belongs to the class.
fn class_end(chars: &[char], open: usize) -> Option<usize> {
    let mut j = open + 1;
    if chars.get(j) == Some(&'!') {
        j += 1;
    }
    if chars.get(j) == Some(&']') {
        j += 1;
    }
    (j..chars.len()).find(|&k| chars[k] == ']')
}

fn push_class(out: &mut String, body: &[char]) {
    match body {
        // A class holding only `^` is the literal `^`.
        ['^'] => out.push('^'),
        ['^', rest @ ..] => {
            out.push('[');
            out.extend(rest);
            out.push_str("^]");
        }
        _ => {
            out.push('[');
            out.extend(body);
            out.push(']');
        }
    }
}

/// Matches `name` against `pattern` in one call.
///
/// A pattern that does not compile matches nothing.
pub fn matches_service(pattern: &str, name: &str) -> bool {
    match ServicePattern::new(pattern) {
        Ok(compiled) => compiled.matches(name),
        Err(e) => {
            debug!("{e}");
            false
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const SERVICE: &str = "rtmc-tcp-1.0-emulator";

    #[test]
    fn test_star_suffix_matches_service_name() {
        assert!(matches_service("rtmc*", SERVICE));
    }

    #[test]
    fn test_literal_pattern_matches_only_itself() {
        assert!(matches_service(SERVICE, SERVICE));
        assert!(!matches_service("rtmc", SERVICE));
    }

    #[test]
    fn test_unrelated_pattern_does_not_match() {
        assert!(!matches_service("bad_query", SERVICE));
    }

    #[test]
    fn test_question_mark_matches_single_character() {
        assert!(matches_service("rtmc-tcp-?.0-emulator", SERVICE));
        assert!(!matches_service("rtmc-tcp-??.0-emulator", SERVICE));
    }

    #[test]
    fn test_character_class_and_negation() {
        assert!(matches_service("rtmc-[tu]cp-*", SERVICE));
        assert!(!matches_service("rtmc-[!t]cp-*", SERVICE));
        assert!(matches_service("rtmc-tcp-[0-9].0-*", SERVICE));
    }

    #[test]
    fn test_matching_is_case_sensitive() {
        assert!(!matches_service("RTMC*", SERVICE));
    }

    #[test]
    fn test_star_crosses_path_separators() {
        assert!(matches_service("a*c", "a/b/c"));
    }

    #[test]
    fn test_lone_star_matches_everything() {
        assert!(matches_service("*", SERVICE));
        assert!(matches_service("*", ""));
    }

    #[test]
    fn test_empty_pattern_matches_only_empty_name() {
        assert!(matches_service("", ""));
        assert!(!matches_service("", SERVICE));
    }

    #[test]
    fn test_unclosed_class_is_a_literal_bracket() {
        // Arrange / Act
        let compiled = ServicePattern::new("rtmc[").unwrap();

        // Assert
        assert!(compiled.matches("rtmc["));
        assert!(!compiled.matches("rtmc"));
        assert!(matches_service("[rtmc*", "[rtmc-tcp"));
    }

    #[test]
    fn test_braces_are_literal_not_alternation() {
        assert!(!matches_service("rtmc{-tcp,-udp}*", SERVICE));
        assert!(!matches_service("{rtmc,x}*", SERVICE));
        assert!(matches_service("rtmc-{x}", "rtmc-{x}"));
        assert!(matches_service("rtmc[{]x*", "rtmc{x-1"));
    }

    #[test]
    fn test_double_star_is_not_recursive() {
        assert!(!matches_service("**/rtmc*", SERVICE));
        assert!(matches_service("**/rtmc*", "lab/rtmc-1"));
        assert!(matches_service("rtmc**", SERVICE));
        assert!(matches_service("**", SERVICE));
    }

    #[test]
    fn test_leading_caret_in_class_is_literal() {
        assert!(matches_service("[^r]tmc", "rtmc"));
        assert!(matches_service("[^r]tmc", "^tmc"));
        assert!(!matches_service("[^r]tmc", "xtmc"));
        assert!(matches_service("[^]", "^"));
    }

    #[test]
    fn test_closing_bracket_first_in_class_is_literal() {
        assert!(matches_service("[]]", "]"));
        assert!(matches_service("[!]]", "x"));
        assert!(!matches_service("[!]]", "]"));
    }

    #[test]
    fn test_reversed_range_is_rejected_and_matches_nothing() {
        assert!(ServicePattern::new("[z-a]").is_err());
        assert!(!matches_service("[z-a]", "m"));
    }

    #[test]
    fn test_backslash_is_literal() {
        assert!(matches_service(r"rtmc\*", r"rtmc\x"));
        assert!(!matches_service(r"rtmc\*", "rtmcx"));
    }

    #[test]
    fn test_as_str_returns_source_pattern() {
        let compiled = ServicePattern::new("rtmc*").unwrap();
        assert_eq!(compiled.as_str(), "rtmc*");
    }
}
