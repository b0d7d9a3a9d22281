//! Input sanitizers applied to every incoming parameter, whether or not it
//! also has a validation predicate.

use std::sync::LazyLock;

use regex::Regex;

static SCRIPT_STYLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)\s*>").unwrap());

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[a-zA-Z/!?][^>]*(>|$)").unwrap());

static OCTET: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"%[a-fA-F0-9]{2}").unwrap());

static LINE_WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\r\n\t ]+").unwrap());

static INLINE_WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\t ]+").unwrap());

/// Absolute value of the nearest integer. Non-finite input maps to 0.
pub fn absint(value: f64) -> i64 {
    if !value.is_finite() {
        return 0;
    }
    let rounded = value.round();
    if rounded.abs() >= i64::MAX as f64 {
        return i64::MAX;
    }
    (rounded as i64).abs()
}

fn strip_markup(input: &str) -> String {
    let without_blocks = SCRIPT_STYLE.replace_all(input, "");
    TAG.replace_all(&without_blocks, "").into_owned()
}

/// Single-line free text: markup and percent-encoded octets removed,
/// all whitespace runs (including line breaks) collapsed to one space.
pub fn sanitize_text_field(input: &str) -> String {
    let stripped = strip_markup(input);
    let stripped = OCTET.replace_all(&stripped, "");
    LINE_WHITESPACE.replace_all(&stripped, " ").trim().to_string()
}

/// Multi-line free text: like [`sanitize_text_field`] but paragraph breaks survive.
pub fn sanitize_textarea_field(input: &str) -> String {
    let stripped = strip_markup(&input.replace("\r\n", "\n").replace('\r', "\n"));
    let stripped = OCTET.replace_all(&stripped, "");
    stripped
        .split('\n')
        .map(|line| INLINE_WHITESPACE.replace_all(line, " ").trim().to_string())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Lowercase identifier made of `[a-z0-9_-]`.
pub fn sanitize_key(input: &str) -> String {
    input
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}
