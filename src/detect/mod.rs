//! SQL-injection detection core.
//!
//! - [`normalize`] canonicalizes raw input (block comments, whitespace runs)
//! - [`patterns`] builds the ordered regex catalog for a [`DialectSet`]
//! - [`inspect`] walks query, form and JSON payloads leaf by leaf
//!
//! [`is_match`] is the standalone entry point used outside the request path,
//! e.g. by the corpus coverage checker.

pub mod inspect;
pub mod normalize;
pub mod patterns;

use crate::dialect::DialectSet;

use self::normalize::normalized_forms;
use self::patterns::PatternSet;

/// Trait for matchers that decide whether normalized text carries an
/// injection payload.
pub trait Detector: Send + Sync {
    fn is_match(&self, normalized: &str) -> bool;

    /// Normalize raw `text` and test each of its [`normalized_forms`].
    fn detects(&self, text: &str) -> bool {
        normalized_forms(text).iter().any(|form| self.is_match(form))
    }
}

/// Normalize `text` and test it against the catalog for `dialects`.
pub fn is_match(text: &str, dialects: DialectSet) -> bool {
    PatternSet::shared(dialects).detects(text)
}
