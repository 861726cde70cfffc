//! Attachment text normalization ahead of scoring.
//!
//! Each pass is a function `&str -> String` applied in sequence. Passes only
//! ever replace a character with a single space, so token boundaries survive
//! and the result is stable under re-normalization. There is no trimming and
//! no case folding; the classifier sees the text otherwise as extracted.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use noticescore_shared::MissingTextPolicy;

/// Text scored for a null attachment under [`MissingTextPolicy::Placeholder`].
pub const NULL_TEXT_PLACEHOLDER: &str = "None";

/// Normalize already-textual input.
pub fn normalize(text: &str) -> String {
    let mut result = remove_punctuation(text);
    result = remove_formatting(&result);
    result
}

/// Coerce a raw feed value to text, then normalize it.
pub fn normalize_value(value: &Value, policy: MissingTextPolicy) -> String {
    normalize(&coerce_text(value, policy))
}

/// Render any raw text value as a string so the classifier always gets text.
///
/// Strings pass through untouched. Null becomes [`NULL_TEXT_PLACEHOLDER`]
/// (or the empty string under [`MissingTextPolicy::Empty`]), booleans become
/// `True`/`False`, and numbers or structures use their JSON text.
pub fn coerce_text(value: &Value, policy: MissingTextPolicy) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => match policy {
            MissingTextPolicy::Placeholder => NULL_TEXT_PLACEHOLDER.to_string(),
            MissingTextPolicy::Empty => String::new(),
        },
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Pass 1: ASCII punctuation
// ---------------------------------------------------------------------------

/// Replace each ASCII punctuation character with a space.
fn remove_punctuation(text: &str) -> String {
    static PUNCT_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[[:punct:]]").expect("valid regex"));

    PUNCT_RE.replace_all(text, " ").into_owned()
}

// ---------------------------------------------------------------------------
// Pass 2: Formatting characters
// ---------------------------------------------------------------------------

/// Replace tab, LF, CR, VT and FF with a space.
fn remove_formatting(text: &str) -> String {
    static FORMAT_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[\t\n\r\x0B\x0C]").expect("valid regex"));

    FORMAT_RE.replace_all(text, " ").into_owned()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
