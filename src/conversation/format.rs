//! Response classifier: is a model reply JSON, XML, or free text?
//!
//! Pure and total. Priority is JSON, then XML, then text.

use std::sync::LazyLock;

use regex::Regex;

use super::xml;

static ANY_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());

/// Tolerated XML fragment: starts with an opening tag, ends with a closing one.
static FRAGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^\s*<\w+.*>.*</\w+>\s*$").unwrap());

/// Classification of one reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Json,
    Xml,
    Text,
}

/// Classify a raw model reply.
pub fn detect_format(response: &str) -> ResponseFormat {
    let response = response.trim();
    if is_json(response) {
        ResponseFormat::Json
    } else if is_xml(response) {
        ResponseFormat::Xml
    } else {
        ResponseFormat::Text
    }
}

/// Strip a ```` ```<lang> ```` … ```` ``` ```` fence wrapping the whole text.
///
/// Returns the text unchanged when it is not fenced that way.
pub fn strip_code_fence<'a>(text: &'a str, lang: &str) -> &'a str {
    let trimmed = text.trim();
    let open = format!("```{lang}");
    if trimmed.len() >= open.len() + 3 && trimmed.starts_with(&open) && trimmed.ends_with("```") {
        trimmed[open.len()..trimmed.len() - 3].trim()
    } else {
        trimmed
    }
}

fn is_json(response: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(strip_code_fence(response, "json")).is_ok()
}

fn is_xml(response: &str) -> bool {
    let content = strip_code_fence(response, "xml");
    if !ANY_TAG.is_match(content) {
        return false;
    }
    xml::parse_document(content).is_ok() || FRAGMENT.is_match(content)
}
