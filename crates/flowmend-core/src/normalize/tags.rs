use serde_json::Value;

use super::{fresh_id, non_empty_str};
use crate::Tag;

/// Turn a tags-like value into structured tag records.
///
/// Bare strings become full records; partial records get exactly their
/// missing `id`/`createdAt`/`updatedAt` filled. Entries that are neither, or
/// that have no usable name, are dropped.
pub(crate) fn normalize_tags(raw: Option<&Value>, now: &str) -> Vec<Tag> {
    match raw {
        Some(Value::Array(entries)) => entries.iter().filter_map(|e| to_tag(e, now)).collect(),
        // A lone tag instead of a list.
        Some(single @ (Value::String(_) | Value::Object(_))) => {
            to_tag(single, now).into_iter().collect()
        }
        _ => Vec::new(),
    }
}

fn to_tag(entry: &Value, now: &str) -> Option<Tag> {
    match entry {
        Value::String(name) => {
            non_empty_str(entry)?;
            Some(Tag {
                id: fresh_id(),
                name: name.clone(),
                created_at: now.to_string(),
                updated_at: now.to_string(),
            })
        }
        Value::Object(record) => {
            let name = record.get("name").and_then(non_empty_str)?;
            let field = |key: &str| record.get(key).and_then(non_empty_str).map(str::to_string);
            Some(Tag {
                id: field("id").unwrap_or_else(fresh_id),
                name: name.to_string(),
                created_at: field("createdAt").unwrap_or_else(|| now.to_string()),
                updated_at: field("updatedAt").unwrap_or_else(|| now.to_string()),
            })
        }
        _ => None,
    }
}
