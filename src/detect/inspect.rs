//! Structural inspection of request payloads.
//!
//! Query strings, form bodies and JSON bodies are all converted into an
//! [`InspectedValue`] tree and walked the same way: every leaf string is
//! normalized and tested, keys are never inspected, and non-string scalars
//! never match.

use std::borrow::Cow;

use serde_json::Value;

use super::Detector;

/// Default bound on structural nesting.
///
/// Matches the nesting limit of the JSON parser, so any body that parses is
/// also fully walked.
pub const DEFAULT_MAX_DEPTH: usize = 128;

/// A request payload reduced to the shapes that matter for detection.
#[derive(Debug, Clone, PartialEq)]
pub enum InspectedValue {
    /// A string leaf; the only shape that is ever matched.
    Text(String),
    /// A number, boolean or null leaf.
    Opaque,
    /// Keyed entries in source order. Keys may repeat (form fields).
    Map(Vec<(String, InspectedValue)>),
    /// An ordered sequence.
    List(Vec<InspectedValue>),
}

/// The body was not valid JSON. Carries the parser's message for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotJson(pub String);

impl std::fmt::Display for NotJson {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "body is not valid JSON: {}", self.0)
    }
}

impl std::error::Error for NotJson {}

impl InspectedValue {
    /// Parse a JSON document.
    ///
    /// The body is decoded with [`decode_text`] first, so a leading byte
    /// order mark or an invalid UTF-8 sequence does not stop the walk.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, NotJson> {
        serde_json::from_str::<Value>(&decode_text(bytes))
            .map(Self::from)
            .map_err(|e| NotJson(e.to_string()))
    }

    /// A flat mapping of string pairs, e.g. decoded query or form fields.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        InspectedValue::Map(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), InspectedValue::Text(v.into())))
                .collect(),
        )
    }

    /// Decode an `application/x-www-form-urlencoded` string (query or form body).
    pub fn from_urlencoded(input: &[u8]) -> Self {
        Self::from_pairs(url::form_urlencoded::parse(input).into_owned())
    }
}

/// Decode body bytes as UTF-8 text.
///
/// A leading UTF-8 byte order mark is dropped and invalid sequences become
/// U+FFFD.
pub fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    String::from_utf8_lossy(bytes)
}

impl From<Value> for InspectedValue {
    fn from(value: Value) -> Self {
        match value {
            Value::String(s) => InspectedValue::Text(s),
            Value::Null | Value::Bool(_) | Value::Number(_) => InspectedValue::Opaque,
            Value::Array(items) => {
                InspectedValue::List(items.into_iter().map(InspectedValue::from).collect())
            }
            Value::Object(map) => InspectedValue::Map(
                map.into_iter()
                    .map(|(k, v)| (k, InspectedValue::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Outcome of walking one [`InspectedValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inspection {
    /// No leaf matched.
    Clean,
    /// At least one leaf matched.
    Matched,
    /// No leaf matched, but some branch was deeper than the limit and was not
    /// walked. Callers treat this as [`Inspection::Clean`].
    TooDeep,
}

impl Inspection {
    pub fn is_match(self) -> bool {
        self == Inspection::Matched
    }
}

/// Walk `value`, normalizing and testing every string leaf with `detector`.
///
/// Stops at the first matching leaf. Branches nested more than `max_depth`
/// levels are skipped rather than recursed into.
pub fn inspect<D>(value: &InspectedValue, detector: &D, max_depth: usize) -> Inspection
where
    D: Detector + ?Sized,
{
    walk(value, detector, 0, max_depth)
}

/// `true` when any string leaf of `value` matches, using [`DEFAULT_MAX_DEPTH`].
pub fn matches<D>(value: &InspectedValue, detector: &D) -> bool
where
    D: Detector + ?Sized,
{
    inspect(value, detector, DEFAULT_MAX_DEPTH).is_match()
}

fn walk<D>(value: &InspectedValue, detector: &D, depth: usize, max_depth: usize) -> Inspection
where
    D: Detector + ?Sized,
{
    match value {
        InspectedValue::Text(s) => {
            if detector.detects(s) {
                Inspection::Matched
            } else {
                Inspection::Clean
            }
        }
        InspectedValue::Opaque => Inspection::Clean,
        InspectedValue::Map(entries) => {
            walk_children(entries.iter().map(|(_, v)| v), detector, depth, max_depth)
        }
        InspectedValue::List(items) => walk_children(items.iter(), detector, depth, max_depth),
    }
}

fn walk_children<'a, I, D>(children: I, detector: &D, depth: usize, max_depth: usize) -> Inspection
where
    I: Iterator<Item = &'a InspectedValue>,
    D: Detector + ?Sized,
{
    if depth >= max_depth {
        return Inspection::TooDeep;
    }
    let mut outcome = Inspection::Clean;
    for child in children {
        match walk(child, detector, depth + 1, max_depth) {
            Inspection::Matched => return Inspection::Matched,
            Inspection::TooDeep => outcome = Inspection::TooDeep,
            Inspection::Clean => {}
        }
    }
    outcome
}
