//! Field extraction for the markup embedded in service messages.
//!
//! The producer's markup is loose and frequently drops optional parts, so
//! nothing here parses it as XML. Fields are recovered with ordered
//! substring cuts and a bounded tag pattern. Every function is total: a
//! missing marker, attribute or tag yields an empty string.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

static TITLE_TAG: LazyLock<Option<Regex>> = LazyLock::new(|| build_tag_pattern("title"));
static SUMMARY_TAG: LazyLock<Option<Regex>> = LazyLock::new(|| build_tag_pattern("summary"));
static NAME_TAG: LazyLock<Option<Regex>> = LazyLock::new(|| build_tag_pattern("name"));

/// Text strictly after the first `marker`, or `""` if `marker` is absent.
pub fn slice_after_marker<'a>(text: &'a str, marker: &str) -> &'a str {
    match text.find(marker) {
        Some(pos) => &text[pos + marker.len()..],
        None => "",
    }
}

/// Text strictly before the first `marker`, or `""` if `marker` is absent.
pub fn slice_before_marker<'a>(text: &'a str, marker: &str) -> &'a str {
    match text.find(marker) {
        Some(pos) => &text[..pos],
        None => "",
    }
}

/// Value of the first `name="..."` in `text`.
pub fn extract_attribute<'a>(text: &'a str, name: &str) -> &'a str {
    let opener = format!("{name}=\"");
    let Some(start) = text.find(&opener) else {
        return "";
    };
    let rest = &text[start + opener.len()..];
    match rest.find('"') {
        Some(end) => &rest[..end],
        None => "",
    }
}

/// Body of the first `<tag ...>BODY</tag>`. The body is returned as-is.
pub fn extract_first_tag_body(text: &str, tag: &str) -> String {
    let Some(pattern) = tag_pattern(tag) else {
        return String::new();
    };
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|body| body.as_str().to_string())
        .unwrap_or_default()
}

/// Bodies of every `<tag ...>BODY</tag>`, trimmed, in document order.
pub fn extract_all_tag_bodies(text: &str, tag: &str) -> Vec<String> {
    let Some(pattern) = tag_pattern(tag) else {
        return Vec::new();
    };
    pattern
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|body| body.as_str().trim().to_string())
        .collect()
}

/// Pattern for `tag`. The forward-message tags are compiled once; anything
/// else is built on demand.
fn tag_pattern(tag: &str) -> Option<Cow<'static, Regex>> {
    let cached = match tag {
        "title" => &*TITLE_TAG,
        "summary" => &*SUMMARY_TAG,
        "name" => &*NAME_TAG,
        _ => return build_tag_pattern(tag).map(Cow::Owned),
    };
    cached.as_ref().map(Cow::Borrowed)
}

/// `<tag>` or `<tag attrs...>`, then the shortest body up to `</tag>`.
/// The body may span lines and contain stray `<` / `>`.
fn build_tag_pattern(tag: &str) -> Option<Regex> {
    if tag.is_empty() {
        return None;
    }
    let tag = regex::escape(tag);
    Regex::new(&format!(r"(?s)<{tag}(?:\s[^>]*)?>(.*?)</{tag}\s*>")).ok()
}
