//! Canonicalization applied to every value before pattern matching.
//!
//! Injection filters are commonly evaded by splitting keywords with block
//! comments (`UNION/**/SELECT`) or by padding with unusual whitespace
//! (`or\t1=1`, `or%00 1=1`). Normalizing first lets every detection pattern
//! assume single spaces between tokens.

use once_cell::sync::Lazy;
use regex::Regex;

/// `/* ... */`, shortest match, not spanning line breaks.
static BLOCK_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"/\*.*?\*/").expect("valid regex"));

/// Any run of whitespace, including NUL, vertical tab and form feed.
static WHITESPACE_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"( |\t|\r|\n|\v|\f|\x00|\s)+").expect("valid regex"));

/// Replace block comments with a space and collapse whitespace runs into a
/// single space.
///
/// The output is a fixed point: `normalize(&normalize(s)) == normalize(s)`.
/// A comment whose delimiters were separated only by a line break becomes a
/// single-line comment once whitespace is collapsed, so the pass repeats until
/// no comment remains.
pub fn normalize(input: &str) -> String {
    settle(strip_and_collapse(input))
}

/// Every form of `input` that detection runs against: the single-pass
/// normalization and, when further passes change it, the fixed point.
///
/// A pattern that keys on a comment opener (`'/*`) only sees it in the
/// single-pass form; the fixed point has already replaced it with a space.
pub fn normalized_forms(input: &str) -> Vec<String> {
    let once = strip_and_collapse(input);
    if BLOCK_COMMENT.is_match(&once) {
        let fixed = settle(strip_and_collapse(&once));
        vec![once, fixed]
    } else {
        vec![once]
    }
}

fn settle(mut text: String) -> String {
    while BLOCK_COMMENT.is_match(&text) {
        text = strip_and_collapse(&text);
    }
    text
}

fn strip_and_collapse(input: &str) -> String {
    let stripped = BLOCK_COMMENT.replace_all(input, " ");
    WHITESPACE_RUN.replace_all(&stripped, " ").into_owned()
}
