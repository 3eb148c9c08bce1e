use serde_json::Value;
use tracing::debug;

use super::{Hints, non_empty_str};
use crate::Position;

pub(crate) const DEFAULT_NAME: &str = "Custom Automation";
const MAX_DESCRIPTION_CHARS: usize = 50;

/// Extract JSON from generator text that may be wrapped in markdown code
/// fences or surrounded by prose.
pub fn extract_json(text: &str) -> &str {
    let trimmed = text.trim();
    if let Some(start) = trimmed.find("```json") {
        let after_fence = &trimmed[start + 7..];
        if let Some(end) = after_fence.find("```") {
            return after_fence[..end].trim();
        }
    }
    if let Some(start) = trimmed.find("```") {
        let after_fence = &trimmed[start + 3..];
        if let Some(end) = after_fence.find("```") {
            return after_fence[..end].trim();
        }
    }
    // Prose around a bare object: take the outermost braces.
    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}'))
        && start < end
    {
        return &trimmed[start..=end];
    }
    trimmed
}

/// Parse generator text into a candidate value. Unparseable text becomes
/// `null`, which normalizes to the fallback skeleton.
pub fn parse_candidate(text: &str) -> Value {
    match serde_json::from_str(extract_json(text)) {
        Ok(value) => value,
        Err(e) => {
            debug!("Candidate text is not JSON: {}", e);
            Value::Null
        }
    }
}

/// Default layout: one row, left to right in sequence order.
pub(crate) fn layout_position(index: usize) -> Position {
    Position {
        x: 240.0 + (index as f64) * 220.0,
        y: 300.0,
    }
}

/// Resolve the document name from the candidate's own name, then the hints.
pub(crate) fn document_name(candidate: Option<&Value>, hints: &Hints) -> String {
    if let Some(name) = candidate
        .and_then(non_empty_str)
        .filter(|n| !n.trim().eq_ignore_ascii_case("unnamed"))
    {
        return name.to_string();
    }
    if !hints.name.trim().is_empty() {
        return hints.name.clone();
    }
    let description = hints.description.trim();
    if description.is_empty() {
        return DEFAULT_NAME.to_string();
    }
    format!(
        "{} - {}",
        DEFAULT_NAME,
        truncate(description, MAX_DESCRIPTION_CHARS)
    )
}

/// Cut `text` to at most `max` chars, marking the cut with `...`.
pub(crate) fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept)
}

/// Lowercase ASCII alphanumerics joined by single dashes, for webhook paths.
pub(crate) fn sanitize_path(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            result.push(ch.to_ascii_lowercase());
        } else {
            result.push('-');
        }
    }
    let collapsed: String = result
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    if collapsed.is_empty() {
        return "automation".to_string();
    }
    collapsed
}
